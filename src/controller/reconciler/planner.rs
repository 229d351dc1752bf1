//! # Artifact Planner
//!
//! Computes the desired derived artifacts from a namespace partition. Pure and
//! deterministic: identical inputs give identical output.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use super::selector::NamespacePartition;
use crate::artifact::{ownership_labels, PayloadError};
use crate::config::ReconcileSettings;
use crate::crd::SourceIdentity;

/// One artifact that should exist in one namespace
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredArtifact<C> {
    pub namespace: String,
    pub name: String,
    /// Version marker the artifact must carry to count as current
    pub version: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub content: C,
}

/// Desired state of every namespace for one source
///
/// Namespaces in `artifacts` must hold a current artifact; namespaces in
/// `avoided` must hold none.
#[derive(Debug, Clone, PartialEq)]
pub struct DesiredState<C> {
    pub source: SourceIdentity,
    pub version: String,
    pub artifacts: BTreeMap<String, DesiredArtifact<C>>,
    pub avoided: Vec<String>,
}

impl<C> DesiredState<C> {
    #[must_use]
    pub fn artifact(&self, namespace: &str) -> Option<&DesiredArtifact<C>> {
        self.artifacts.get(namespace)
    }
}

/// Hex sha256 over the canonical JSON encoding of the content
pub fn content_digest<C: Serialize>(content: &C) -> Result<String, PayloadError> {
    let bytes = serde_json::to_vec(content).map_err(|e| PayloadError::Encoding(e.to_string()))?;
    Ok(format!("{:x}", Sha256::digest(&bytes)))
}

/// Plan the artifacts for every must-match namespace
pub fn plan<C: Serialize + Clone>(
    source: &SourceIdentity,
    version: &str,
    content: &C,
    partition: &NamespacePartition,
    settings: &ReconcileSettings,
) -> Result<DesiredState<C>, PayloadError> {
    let digest = content_digest(content)?;
    let labels = ownership_labels(&source.uid, settings);
    let annotations = BTreeMap::from([
        (settings.version_annotation.clone(), version.to_string()),
        (settings.digest_annotation.clone(), digest),
        (settings.source_annotation.clone(), source.key().to_string()),
    ]);

    // Fresh value per namespace, nothing shared between entries
    let artifacts = partition
        .must_match
        .iter()
        .map(|namespace| {
            (
                namespace.clone(),
                DesiredArtifact {
                    namespace: namespace.clone(),
                    name: source.name.clone(),
                    version: version.to_string(),
                    labels: labels.clone(),
                    annotations: annotations.clone(),
                    content: content.clone(),
                },
            )
        })
        .collect();

    Ok(DesiredState {
        source: source.clone(),
        version: version.to_string(),
        artifacts,
        avoided: partition.must_avoid.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ANNOTATION_SOURCE, ANNOTATION_SOURCE_VERSION, LABEL_OWNER_UID};

    fn identity() -> SourceIdentity {
        SourceIdentity {
            namespace: "platform".to_string(),
            name: "settings".to_string(),
            uid: "uid-123".to_string(),
        }
    }

    fn partition() -> NamespacePartition {
        NamespacePartition {
            must_match: vec!["team-b".to_string(), "team-a".to_string()],
            must_avoid: vec!["kube-system".to_string()],
        }
    }

    fn content() -> BTreeMap<String, String> {
        BTreeMap::from([("LOG_LEVEL".to_string(), "debug".to_string())])
    }

    #[test]
    fn test_plan_is_deterministic() {
        let settings = ReconcileSettings::default();
        let first = plan(&identity(), "4", &content(), &partition(), &settings).unwrap();
        let second = plan(&identity(), "4", &content(), &partition(), &settings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_plan_covers_every_matched_namespace() {
        let state = plan(
            &identity(),
            "4",
            &content(),
            &partition(),
            &ReconcileSettings::default(),
        )
        .unwrap();
        assert_eq!(
            state.artifacts.keys().cloned().collect::<Vec<_>>(),
            vec!["team-a".to_string(), "team-b".to_string()]
        );
        assert_eq!(state.avoided, vec!["kube-system".to_string()]);

        let artifact = state.artifact("team-a").unwrap();
        assert_eq!(artifact.name, "settings");
        assert_eq!(artifact.version, "4");
        assert_eq!(
            artifact.labels.get(LABEL_OWNER_UID).map(String::as_str),
            Some("uid-123")
        );
        assert_eq!(
            artifact.annotations.get(ANNOTATION_SOURCE_VERSION).map(String::as_str),
            Some("4")
        );
        assert_eq!(
            artifact.annotations.get(ANNOTATION_SOURCE).map(String::as_str),
            Some("platform/settings")
        );
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = content_digest(&content()).unwrap();
        let mut changed = content();
        changed.insert("LOG_LEVEL".to_string(), "info".to_string());
        let b = content_digest(&changed).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
