//! # ConfigMap Artifacts

use std::collections::BTreeMap;
use std::time::Duration;

use k8s_openapi::api::core::v1::ConfigMap;

use super::{object_meta, validate_key, ArtifactKind, PayloadError};
use crate::config::ReconcileSettings;
use crate::controller::reconciler::planner::DesiredArtifact;
use crate::crd::GlobalConfig;

/// `GlobalConfig` propagated as immutable ConfigMaps
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigMapKind;

impl ArtifactKind for ConfigMapKind {
    type Source = GlobalConfig;
    type Object = ConfigMap;
    type Content = BTreeMap<String, String>;

    const NAME: &'static str = "globalconfig";

    fn encode_payload(source: &GlobalConfig) -> Result<Self::Content, PayloadError> {
        for key in source.spec.data.keys() {
            validate_key(key)?;
        }
        Ok(source.spec.data.clone())
    }

    fn build_object(desired: &DesiredArtifact<Self::Content>) -> ConfigMap {
        ConfigMap {
            metadata: object_meta(desired),
            data: Some(desired.content.clone()),
            immutable: Some(true),
            ..ConfigMap::default()
        }
    }

    fn resync_interval(settings: &ReconcileSettings) -> Option<Duration> {
        settings.config_resync
    }
}
