//! # Metrics
//!
//! Prometheus metrics for monitoring the controller. Every metric carries the
//! source kind (`globalconfig` or `globalsecret`) as its `kind` label.
//!
//! ## Metrics Exposed
//!
//! - `global_config_reconciliations_total` - Reconciliations started
//! - `global_config_reconciliation_errors_total` - Failed reconciliations by error class
//! - `global_config_reconciliation_duration_seconds` - Duration of reconciliations
//! - `global_config_artifacts_created_total` - Derived artifacts created in a namespace without one
//! - `global_config_artifacts_deleted_total` - Derived artifacts deleted (avoided namespaces and finalizer sweeps)
//! - `global_config_artifacts_recreated_total` - Stale derived artifacts replaced by delete-then-create
//! - `global_config_artifacts_managed` - Current derived artifacts per source
//! - `global_config_finalizer_sweeps_total` - Completed finalizer sweeps
//! - `global_config_requeues_total` - Requeues by reason

use std::sync::LazyLock;

use anyhow::Result;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry};

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "global_config_reconciliations_total",
            "Total number of reconciliations",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "global_config_reconciliation_errors_total",
            "Total number of reconciliation errors by error class",
        ),
        &["kind", "class"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "global_config_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static ARTIFACTS_CREATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "global_config_artifacts_created_total",
            "Total number of derived artifacts created",
        ),
        &["kind"],
    )
    .expect("Failed to create ARTIFACTS_CREATED_TOTAL metric - this should never happen")
});

static ARTIFACTS_DELETED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "global_config_artifacts_deleted_total",
            "Total number of derived artifacts deleted",
        ),
        &["kind"],
    )
    .expect("Failed to create ARTIFACTS_DELETED_TOTAL metric - this should never happen")
});

static ARTIFACTS_RECREATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "global_config_artifacts_recreated_total",
            "Total number of stale derived artifacts recreated",
        ),
        &["kind"],
    )
    .expect("Failed to create ARTIFACTS_RECREATED_TOTAL metric - this should never happen")
});

static ARTIFACTS_MANAGED: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "global_config_artifacts_managed",
            "Current number of derived artifacts per source",
        ),
        &["kind", "source"],
    )
    .expect("Failed to create ARTIFACTS_MANAGED metric - this should never happen")
});

static FINALIZER_SWEEPS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "global_config_finalizer_sweeps_total",
            "Total number of completed finalizer sweeps",
        ),
        &["kind"],
    )
    .expect("Failed to create FINALIZER_SWEEPS_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("global_config_requeues_total", "Total number of requeues by reason"),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Only fails when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(ARTIFACTS_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARTIFACTS_DELETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARTIFACTS_RECREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ARTIFACTS_MANAGED.clone()))?;
    REGISTRY.register(Box::new(FINALIZER_SWEEPS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;

    Ok(())
}

/// Metrics registry exposed on `/metrics`
pub fn registry() -> &'static Registry {
    &REGISTRY
}

pub fn increment_reconciliations(kind: &str) {
    RECONCILIATIONS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_reconciliation_errors(kind: &str, class: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[kind, class])
        .inc();
}

pub fn observe_reconciliation_duration(kind: &str, duration: f64) {
    RECONCILIATION_DURATION
        .with_label_values(&[kind])
        .observe(duration);
}

pub fn increment_artifacts_created(kind: &str, count: u64) {
    ARTIFACTS_CREATED_TOTAL.with_label_values(&[kind]).inc_by(count);
}

pub fn increment_artifacts_deleted(kind: &str, count: u64) {
    ARTIFACTS_DELETED_TOTAL.with_label_values(&[kind]).inc_by(count);
}

pub fn increment_artifacts_recreated(kind: &str, count: u64) {
    ARTIFACTS_RECREATED_TOTAL
        .with_label_values(&[kind])
        .inc_by(count);
}

pub fn set_artifacts_managed(kind: &str, source: &str, count: i64) {
    ARTIFACTS_MANAGED
        .with_label_values(&[kind, source])
        .set(count);
}

/// Drop the per-source gauge once the source is gone
pub fn clear_artifacts_managed(kind: &str, source: &str) {
    // Absent label values are not an error worth reporting
    let _ = ARTIFACTS_MANAGED.remove_label_values(&[kind, source]);
}

pub fn increment_finalizer_sweeps(kind: &str) {
    FINALIZER_SWEEPS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}
