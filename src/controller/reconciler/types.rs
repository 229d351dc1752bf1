//! # Types
//!
//! Core types for the reconciler.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use super::drift::DriftReport;
use super::filter::PatternError;
use super::finalizer::FinalizerError;
use super::selector::SelectError;
use crate::artifact::{ArtifactKind, PayloadError};
use crate::config::{ReconcileSettings, SharedControllerConfig};
use crate::controller::backoff::FibonacciBackoff;
use crate::store::{ArtifactStore, KubeStore, NamespaceLister, SourceStore, StoreError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcilerError {
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] PayloadError),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("{failed} of {attempted} namespace(s) did not converge, first: {first}")]
    PartialConvergence {
        failed: usize,
        attempted: usize,
        first: String,
    },
    #[error("reconciliation exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

/// How the error policy treats a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Needs operator intervention; retried slowly
    Terminal,
    /// Optimistic-concurrency collision; retried almost immediately
    Conflict,
    /// Retried with per-resource backoff
    Retryable,
}

impl ErrorClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Terminal => "terminal",
            ErrorClass::Conflict => "conflict",
            ErrorClass::Retryable => "retryable",
        }
    }
}

impl ReconcilerError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            ReconcilerError::InvalidPattern(_) | ReconcilerError::InvalidPayload(_) => {
                ErrorClass::Terminal
            }
            ReconcilerError::Conflict(_) => ErrorClass::Conflict,
            ReconcilerError::Transient(_)
            | ReconcilerError::PartialConvergence { .. }
            | ReconcilerError::DeadlineExceeded(_)
            | ReconcilerError::Unexpected(_) => ErrorClass::Retryable,
        }
    }

    /// Build the error for a drift pass with failures
    #[must_use]
    pub fn partial(report: &DriftReport) -> Self {
        ReconcilerError::PartialConvergence {
            failed: report.failures.len(),
            attempted: report.attempted(),
            first: report
                .failures
                .first()
                .map(|f| format!("{}: {}", f.namespace, f.error))
                .unwrap_or_default(),
        }
    }
}

impl From<StoreError> for ReconcilerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => ReconcilerError::Conflict(what),
            StoreError::Transient(msg) => ReconcilerError::Transient(msg),
            other @ (StoreError::NotFound(_)
            | StoreError::AlreadyExists(_)
            | StoreError::Unexpected(_)) => ReconcilerError::Unexpected(other.to_string()),
        }
    }
}

impl From<SelectError> for ReconcilerError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::Pattern(e) => ReconcilerError::InvalidPattern(e),
            SelectError::List(e) => e.into(),
        }
    }
}

impl From<FinalizerError> for ReconcilerError {
    fn from(err: FinalizerError) -> Self {
        match err {
            FinalizerError::Store(e) => e.into(),
            FinalizerError::Conflict { .. } => ReconcilerError::Conflict(err.to_string()),
            FinalizerError::Sweep { .. } => ReconcilerError::Transient(err.to_string()),
        }
    }
}

/// Backoff state for a specific resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl Default for BackoffState {
    fn default() -> Self {
        Self::new()
    }
}

impl BackoffState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            // 1 minute min, 10 minutes max
            backoff: FibonacciBackoff::new(1, 10),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared context of one controller (one artifact kind)
pub struct Reconciler<K: ArtifactKind> {
    pub sources: Arc<dyn SourceStore<K::Source>>,
    pub artifacts: Arc<dyn ArtifactStore<K::Object>>,
    pub namespaces: Arc<dyn NamespaceLister>,
    pub config: SharedControllerConfig,
    // Backoff state per resource (identified by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl<K: ArtifactKind> Clone for Reconciler<K> {
    fn clone(&self) -> Self {
        Self {
            sources: Arc::clone(&self.sources),
            artifacts: Arc::clone(&self.artifacts),
            namespaces: Arc::clone(&self.namespaces),
            config: Arc::clone(&self.config),
            backoff_states: Arc::clone(&self.backoff_states),
        }
    }
}

impl<K: ArtifactKind> std::fmt::Debug for Reconciler<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &K::NAME)
            .finish_non_exhaustive()
    }
}

impl<K: ArtifactKind> Reconciler<K>
where
    KubeStore: SourceStore<K::Source> + ArtifactStore<K::Object>,
{
    /// Context backed by the Kubernetes API
    #[must_use]
    pub fn new(store: KubeStore, config: SharedControllerConfig) -> Self {
        let store = Arc::new(store);
        Self::with_stores(
            Arc::clone(&store) as Arc<dyn SourceStore<K::Source>>,
            Arc::clone(&store) as Arc<dyn ArtifactStore<K::Object>>,
            store as Arc<dyn NamespaceLister>,
            config,
        )
    }
}

impl<K: ArtifactKind> Reconciler<K> {
    /// Context over arbitrary collaborators
    #[must_use]
    pub fn with_stores(
        sources: Arc<dyn SourceStore<K::Source>>,
        artifacts: Arc<dyn ArtifactStore<K::Object>>,
        namespaces: Arc<dyn NamespaceLister>,
        config: SharedControllerConfig,
    ) -> Self {
        Self {
            sources,
            artifacts,
            namespaces,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Snapshot of the current configuration for one invocation
    pub async fn settings(&self) -> ReconcileSettings {
        self.config.read().await.reconcile_settings()
    }

    /// Snapshot without waiting, `None` while a reload holds the lock
    #[must_use]
    pub fn try_settings(&self) -> Option<ReconcileSettings> {
        self.config
            .try_read()
            .ok()
            .map(|config| config.reconcile_settings())
    }
}
