//! # GlobalSecret
//!
//! Base64-encoded secret payload propagated into matching namespaces as
//! immutable Secrets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crd::{GlobalStatus, NamespacesRegex, SourceObject};

/// GlobalSecret Custom Resource Definition
///
/// Values in `data` are base64 encoded, exactly as in a core `Secret`.
///
/// # Example
///
/// ```yaml
/// apiVersion: globals.octopilot.io/v1beta2
/// kind: GlobalSecret
/// metadata:
///   name: registry-credentials
///   namespace: platform
/// spec:
///   type: kubernetes.io/dockerconfigjson
///   namespaces:
///     avoidregex: ["^kube-"]
///     matchregex: ["^team-"]
///   data:
///     .dockerconfigjson: eyJhdXRocyI6e319
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "GlobalSecret",
    group = "globals.octopilot.io",
    version = "v1beta2",
    namespaced,
    status = "crate::crd::GlobalStatus",
    shortname = "gs",
    shortname = "gss",
    printcolumn = r#"{"name":"Type", "type":"string", "jsonPath":".spec.type"}, {"name":"Immutable", "type":"boolean", "jsonPath":".spec.immutable"}, {"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GlobalSecretSpec {
    /// Informational flag shown in `kubectl get`; derived Secrets are always immutable
    #[serde(default)]
    pub immutable: bool,
    /// Namespace selection rules
    pub namespaces: NamespacesRegex,
    /// Type of the derived Secrets
    #[serde(default, rename = "type")]
    pub secret_type: SecretType,
    /// Base64-encoded values, decoded into the derived Secret's `data`
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

/// Secret types accepted for derived Secrets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum SecretType {
    #[default]
    Opaque,
    #[serde(rename = "kubernetes.io/service-account-token")]
    ServiceAccountToken,
    #[serde(rename = "kubernetes.io/dockercfg")]
    DockerCfg,
    #[serde(rename = "kubernetes.io/dockerconfigjson")]
    DockerConfigJson,
    #[serde(rename = "kubernetes.io/basic-auth")]
    BasicAuth,
    #[serde(rename = "kubernetes.io/ssh-auth")]
    SshAuth,
    #[serde(rename = "kubernetes.io/tls")]
    Tls,
    #[serde(rename = "bootstrap.kubernetes.io/token")]
    BootstrapToken,
}

impl SecretType {
    /// Wire value written to `Secret.type`
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretType::Opaque => "Opaque",
            SecretType::ServiceAccountToken => "kubernetes.io/service-account-token",
            SecretType::DockerCfg => "kubernetes.io/dockercfg",
            SecretType::DockerConfigJson => "kubernetes.io/dockerconfigjson",
            SecretType::BasicAuth => "kubernetes.io/basic-auth",
            SecretType::SshAuth => "kubernetes.io/ssh-auth",
            SecretType::Tls => "kubernetes.io/tls",
            SecretType::BootstrapToken => "bootstrap.kubernetes.io/token",
        }
    }
}

impl SourceObject for GlobalSecret {
    fn namespace_filter(&self) -> &NamespacesRegex {
        &self.spec.namespaces
    }

    fn current_status(&self) -> Option<&GlobalStatus> {
        self.status.as_ref()
    }
}
