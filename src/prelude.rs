//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use global_config_controller::prelude::*;
//! ```

// CRD types - most commonly used
pub use crate::crd::*;

// Artifact kinds - one controller each
pub use crate::artifact::{ArtifactKind, ConfigMapKind, PayloadError, SecretContent, SecretKind};

// Collaborator traits - implement these to run the reconciler against another backend
pub use crate::store::{ArtifactStore, KubeStore, NamespaceLister, SourceStore, StoreError};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile, reconcile_source, BackoffState, DriftReconciler, FinalizerLifecycle,
    NamespaceFilter, Outcome, Reconciler, ReconcilerError,
};

// Config types - for configuration management
pub use crate::config::{
    ControllerConfig, ReconcileSettings, ServerConfig, SharedControllerConfig, SharedServerConfig,
};
