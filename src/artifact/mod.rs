//! # Derived Artifacts
//!
//! Capability interface over the per-namespace copies a source produces, so the
//! planner, drift reconciler and finalizer are written once for both kinds.
//!
//! - `config_map.rs` - `GlobalConfig` → `ConfigMap`
//! - `secret.rs` - `GlobalSecret` → `Secret`

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::NamespaceResourceScope;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::config::ReconcileSettings;
use crate::controller::reconciler::planner::DesiredArtifact;
use crate::crd::SourceObject;

mod config_map;
mod secret;

pub use config_map::ConfigMapKind;
pub use secret::{SecretContent, SecretKind};

/// Source payload that cannot be turned into artifact content
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("data key '{key}' is not valid base64: {source}")]
    InvalidBase64 {
        key: String,
        #[source]
        source: base64::DecodeError,
    },
    #[error("data key '{0}' must consist of alphanumeric characters, '-', '_' or '.'")]
    InvalidKey(String),
    #[error("content could not be encoded for digesting: {0}")]
    Encoding(String),
}

/// What differs between ConfigMap-like and Secret-like propagation
pub trait ArtifactKind: Send + Sync + 'static {
    /// Custom resource carrying the payload
    type Source: SourceObject;
    /// Object written into target namespaces
    type Object: Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + fmt::Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;
    /// Kind-specific content, digested and copied into every object
    type Content: Clone + fmt::Debug + PartialEq + Serialize + Send + Sync + 'static;

    /// Short kind name used in logs and metric labels
    const NAME: &'static str;

    /// Turn the source payload into artifact content
    fn encode_payload(source: &Self::Source) -> Result<Self::Content, PayloadError>;

    /// Build the object to create from a planned artifact
    fn build_object(desired: &DesiredArtifact<Self::Content>) -> Self::Object;

    /// Periodic re-assertion interval after a successful reconciliation
    fn resync_interval(settings: &ReconcileSettings) -> Option<Duration>;
}

/// Ownership labels binding an artifact to its source
#[must_use]
pub fn ownership_labels(owner_uid: &str, settings: &ReconcileSettings) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            settings.owner_schema_label.clone(),
            settings.schema_version.clone(),
        ),
        (settings.owner_uid_label.clone(), owner_uid.to_string()),
        (
            crate::constants::LABEL_MANAGED_BY.to_string(),
            crate::constants::MANAGED_BY.to_string(),
        ),
    ])
}

/// Version marker stored on an existing artifact
pub fn version_marker<'a, O: Resource>(object: &'a O, settings: &ReconcileSettings) -> Option<&'a str> {
    annotation(object.meta(), &settings.version_annotation)
}

/// Owner UID label stored on an existing artifact
pub fn owner_uid<'a, O: Resource>(object: &'a O, settings: &ReconcileSettings) -> Option<&'a str> {
    object
        .meta()
        .labels
        .as_ref()
        .and_then(|labels| labels.get(&settings.owner_uid_label))
        .map(String::as_str)
}

fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.annotations
        .as_ref()
        .and_then(|annotations| annotations.get(key))
        .map(String::as_str)
}

/// Metadata shared by every derived object
pub(crate) fn object_meta<C>(desired: &DesiredArtifact<C>) -> ObjectMeta {
    ObjectMeta {
        name: Some(desired.name.clone()),
        namespace: Some(desired.namespace.clone()),
        labels: Some(desired.labels.clone()),
        annotations: Some(desired.annotations.clone()),
        ..ObjectMeta::default()
    }
}

/// Keys accepted by the API server for ConfigMap and Secret data
pub(crate) fn validate_key(key: &str) -> Result<(), PayloadError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(PayloadError::InvalidKey(key.to_string()))
    }
}
