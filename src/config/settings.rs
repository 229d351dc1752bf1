//! # Reconcile Settings
//!
//! Everything a reconciliation needs to know about the deployment, passed in
//! explicitly instead of living in process-wide state.

use std::time::Duration;

use crate::constants::{
    ANNOTATION_CONTENT_DIGEST, ANNOTATION_SOURCE, ANNOTATION_SOURCE_VERSION, API_VERSION,
    DEFAULT_CONFIG_RESYNC_INTERVAL_SECS, DEFAULT_FINALIZER, DEFAULT_MAX_CONFLICT_RETRIES,
    DEFAULT_NAMESPACE_CONCURRENCY, DEFAULT_RECONCILE_TIMEOUT_SECS, DEFAULT_SECRET_RESYNC_INTERVAL_SECS,
    DEFAULT_TERMINAL_ERROR_REQUEUE_SECS, LABEL_OWNER_SCHEMA_VERSION, LABEL_OWNER_UID,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Finalizer guarding source deletion
    pub finalizer: String,
    /// Label carrying the owner's schema version
    pub owner_schema_label: String,
    /// Value written to `owner_schema_label`
    pub schema_version: String,
    /// Label carrying the owner's UID, used for the finalizer sweep
    pub owner_uid_label: String,
    /// Annotation carrying the version marker
    pub version_annotation: String,
    /// Annotation carrying the content digest
    pub digest_annotation: String,
    /// Annotation pointing back at the source
    pub source_annotation: String,
    pub namespace_concurrency: usize,
    pub config_resync: Option<Duration>,
    pub secret_resync: Option<Duration>,
    pub reconcile_timeout: Duration,
    pub max_conflict_retries: u32,
    pub terminal_error_requeue: Duration,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            finalizer: DEFAULT_FINALIZER.to_string(),
            owner_schema_label: LABEL_OWNER_SCHEMA_VERSION.to_string(),
            schema_version: API_VERSION.to_string(),
            owner_uid_label: LABEL_OWNER_UID.to_string(),
            version_annotation: ANNOTATION_SOURCE_VERSION.to_string(),
            digest_annotation: ANNOTATION_CONTENT_DIGEST.to_string(),
            source_annotation: ANNOTATION_SOURCE.to_string(),
            namespace_concurrency: DEFAULT_NAMESPACE_CONCURRENCY,
            config_resync: (DEFAULT_CONFIG_RESYNC_INTERVAL_SECS > 0)
                .then(|| Duration::from_secs(DEFAULT_CONFIG_RESYNC_INTERVAL_SECS)),
            secret_resync: Some(Duration::from_secs(DEFAULT_SECRET_RESYNC_INTERVAL_SECS)),
            reconcile_timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
            terminal_error_requeue: Duration::from_secs(DEFAULT_TERMINAL_ERROR_REQUEUE_SECS),
        }
    }
}
