//! # Reconciler
//!
//! Namespace selection and drift reconciliation for `GlobalConfig` and
//! `GlobalSecret`, written once over `ArtifactKind`.
//!
//! - `filter.rs` - Classifies one namespace name against avoid/match patterns
//! - `selector.rs` - Partitions all namespaces into must-match and must-avoid
//! - `planner.rs` - Computes the desired artifact per matched namespace
//! - `drift.rs` - Creates, recreates and deletes artifacts to reach the plan
//! - `finalizer.rs` - Deletion guard and owner sweep
//! - `status.rs` - Status projection
//! - `reconcile.rs` - Orchestrates one invocation
//! - `types.rs` - Context, errors and backoff state

pub mod drift;
pub mod filter;
pub mod finalizer;
pub mod planner;
pub mod reconcile;
pub mod selector;
pub mod status;
pub mod types;

pub use drift::{ArtifactAction, DriftReconciler, DriftReport};
pub use filter::{Classification, NamespaceFilter, PatternError};
pub use finalizer::{FinalizerLifecycle, SweepReport};
pub use planner::{DesiredArtifact, DesiredState};
pub use reconcile::{reconcile, reconcile_source, Outcome, ReconcileOutcome};
pub use selector::NamespacePartition;
pub use types::{BackoffState, ErrorClass, Reconciler, ReconcilerError};
