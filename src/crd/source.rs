//! # Source Objects
//!
//! Capabilities shared by `GlobalConfig` and `GlobalSecret` so that namespace
//! selection, finalization and status handling are written once.

use std::fmt;

use k8s_openapi::NamespaceResourceScope;
use kube::{Resource, ResourceExt};
use serde::{de::DeserializeOwned, Serialize};

use crate::crd::{GlobalStatus, NamespacesRegex};

/// A user-authored resource whose payload is copied into other namespaces
pub trait SourceObject:
    Resource<DynamicType = (), Scope = NamespaceResourceScope>
    + Clone
    + fmt::Debug
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Namespace selection rules of this source
    fn namespace_filter(&self) -> &NamespacesRegex;

    /// Last written status, if any
    fn current_status(&self) -> Option<&GlobalStatus>;

    /// Lookup key (`namespace/name`)
    fn key(&self) -> SourceKey {
        SourceKey::new(
            self.namespace().unwrap_or_default(),
            self.name_any(),
        )
    }

    /// Identity used for ownership labels; `None` until the API server assigned a UID
    fn identity(&self) -> Option<SourceIdentity> {
        let uid = self.uid()?;
        Some(SourceIdentity {
            namespace: self.namespace().unwrap_or_default(),
            name: self.name_any(),
            uid,
        })
    }

    /// Monotonic version token recorded on derived artifacts
    ///
    /// `metadata.generation` only advances on spec changes, so finalizer and
    /// status writes never make existing artifacts stale.
    fn version_token(&self) -> String {
        let meta = self.meta();
        meta.generation
            .map(|generation| generation.to_string())
            .or_else(|| meta.resource_version.clone())
            .unwrap_or_else(|| "0".to_string())
    }

    /// Whether deletion was requested (set once, never unset)
    fn deletion_requested(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }

    /// Whether the given finalizer is present
    fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers().iter().any(|f| f == finalizer)
    }
}

/// Namespace-scoped name of a source object
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey {
    pub namespace: String,
    pub name: String,
}

impl SourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identity of a source as recorded on the artifacts it owns
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceIdentity {
    pub namespace: String,
    pub name: String,
    pub uid: String,
}

impl SourceIdentity {
    #[must_use]
    pub fn key(&self) -> SourceKey {
        SourceKey::new(self.namespace.clone(), self.name.clone())
    }
}
