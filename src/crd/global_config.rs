//! # GlobalConfig
//!
//! Key/value document propagated into matching namespaces as immutable ConfigMaps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::crd::{GlobalStatus, NamespacesRegex, SourceObject};

/// GlobalConfig Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: globals.octopilot.io/v1beta2
/// kind: GlobalConfig
/// metadata:
///   name: platform-endpoints
///   namespace: platform
/// spec:
///   namespaces:
///     avoidregex: ["^kube-"]
///     matchregex: [".*"]
///   data:
///     LOG_ENDPOINT: https://logs.internal
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "GlobalConfig",
    group = "globals.octopilot.io",
    version = "v1beta2",
    namespaced,
    status = "crate::crd::GlobalStatus",
    shortname = "gc",
    shortname = "gcs",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Matched", "type":"integer", "jsonPath":".status.matchedNamespaces"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GlobalConfigSpec {
    /// Namespace selection rules
    pub namespaces: NamespacesRegex,
    /// Data copied verbatim into every derived ConfigMap
    #[serde(default)]
    pub data: BTreeMap<String, String>,
}

impl SourceObject for GlobalConfig {
    fn namespace_filter(&self) -> &NamespacesRegex {
        &self.spec.namespaces
    }

    fn current_status(&self) -> Option<&GlobalStatus> {
        self.status.as_ref()
    }
}
