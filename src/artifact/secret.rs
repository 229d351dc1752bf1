//! # Secret Artifacts
//!
//! Values arrive base64 encoded on the `GlobalSecret` and are decoded into raw
//! bytes for the derived Secret's `data`. Decoding is a plain byte transform.

use std::collections::BTreeMap;
use std::time::Duration;

use base64::Engine as _;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use serde::Serialize;

use super::{object_meta, validate_key, ArtifactKind, PayloadError};
use crate::config::ReconcileSettings;
use crate::controller::reconciler::planner::DesiredArtifact;
use crate::crd::{GlobalSecret, SecretType};

/// Decoded content of a derived Secret
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretContent {
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    pub data: BTreeMap<String, ByteString>,
}

/// `GlobalSecret` propagated as immutable Secrets
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretKind;

impl ArtifactKind for SecretKind {
    type Source = GlobalSecret;
    type Object = Secret;
    type Content = SecretContent;

    const NAME: &'static str = "globalsecret";

    fn encode_payload(source: &GlobalSecret) -> Result<SecretContent, PayloadError> {
        let mut data = BTreeMap::new();
        for (key, value) in &source.spec.data {
            validate_key(key)?;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(value.trim())
                .map_err(|source| PayloadError::InvalidBase64 {
                    key: key.clone(),
                    source,
                })?;
            data.insert(key.clone(), ByteString(bytes));
        }
        Ok(SecretContent {
            secret_type: source.spec.secret_type,
            data,
        })
    }

    fn build_object(desired: &DesiredArtifact<SecretContent>) -> Secret {
        Secret {
            metadata: object_meta(desired),
            type_: Some(desired.content.secret_type.as_str().to_string()),
            data: Some(desired.content.data.clone()),
            immutable: Some(true),
            ..Secret::default()
        }
    }

    fn resync_interval(settings: &ReconcileSettings) -> Option<Duration> {
        settings.secret_resync
    }
}
