//! # Cluster Store
//!
//! Collaborator interfaces the reconciler consumes from the cluster:
//! namespace listing, derived artifact CRUD, and source object updates.
//!
//! `KubeStore` implements all of them against the Kubernetes API. Tests swap in
//! an in-memory implementation.

use async_trait::async_trait;
use thiserror::Error;

use crate::crd::{GlobalStatus, SourceKey};

mod kube_store;

pub use kube_store::KubeStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a single store call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("conflict writing {0}: object was modified concurrently")]
    Conflict(String),
    #[error("transient store failure: {0}")]
    Transient(String),
    #[error("unexpected store failure: {0}")]
    Unexpected(String),
}

impl StoreError {
    /// Classify a Kubernetes API error
    ///
    /// `what` names the object the call was about, e.g. `ConfigMap team-a/settings`.
    pub fn from_kube(err: kube::Error, what: impl Into<String>) -> Self {
        let what = what.into();
        match err {
            kube::Error::Api(api_err) => match api_err.code {
                404 => StoreError::NotFound(what),
                409 if api_err.reason == "AlreadyExists" => StoreError::AlreadyExists(what),
                409 => StoreError::Conflict(what),
                408 | 429 | 500..=599 => {
                    StoreError::Transient(format!("{what}: {}", api_err.message))
                }
                _ => StoreError::Unexpected(format!(
                    "{what}: {} ({})",
                    api_err.message, api_err.code
                )),
            },
            // Everything below the API layer (connect, TLS, timeouts) is worth retrying
            other => StoreError::Transient(format!("{what}: {other}")),
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Lists every namespace of the cluster
#[async_trait]
pub trait NamespaceLister: Send + Sync {
    async fn list_namespaces(&self) -> StoreResult<Vec<String>>;
}

/// CRUD over derived artifacts of one kind
#[async_trait]
pub trait ArtifactStore<O: Send + Sync + 'static>: Send + Sync {
    /// Fetch the artifact at `namespace/name`, `None` when absent
    async fn get_artifact(&self, namespace: &str, name: &str) -> StoreResult<Option<O>>;

    /// Create an artifact; fails with `AlreadyExists` if something raced us
    async fn create_artifact(&self, artifact: &O) -> StoreResult<()>;

    /// Delete an artifact; succeeds silently when already absent
    async fn delete_artifact(&self, namespace: &str, name: &str) -> StoreResult<()>;

    /// List artifacts in all namespaces carrying `owner_label=owner_uid`
    async fn list_artifacts_by_owner(&self, owner_label: &str, owner_uid: &str)
        -> StoreResult<Vec<O>>;
}

/// Read and update access to source objects
#[async_trait]
pub trait SourceStore<S: Send + Sync + 'static>: Send + Sync {
    /// Fetch a source, `None` when it no longer exists
    async fn get_source(&self, key: &SourceKey) -> StoreResult<Option<S>>;

    /// Replace a source; fails with `Conflict` when its resource version is stale
    async fn update_source(&self, source: &S) -> StoreResult<S>;

    /// Write the status subresource
    async fn patch_status(&self, key: &SourceKey, status: &GlobalStatus) -> StoreResult<()>;
}
