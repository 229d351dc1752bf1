//! # Reconciliation Logic
//!
//! Sequences one invocation for one source:
//!
//! 1. Load the source; a missing source was already cleaned up.
//! 2. Deletion requested: sweep owned artifacts and release the finalizer.
//! 3. Otherwise add the finalizer, select namespaces, plan, and converge.
//!
//! Errors are classified by `error_policy`; this module only reports them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::Resource;
use kube_runtime::controller::Action;
use tracing::{debug, info, info_span, warn, Instrument};

use super::drift::{ArtifactAction, DriftReconciler, DriftReport};
use super::finalizer::{FinalizerLifecycle, SweepReport};
use super::planner::plan;
use super::selector::select;
use super::status::{
    self, Placement, StatusReport, REASON_INVALID_PATTERN, REASON_INVALID_PAYLOAD,
    REASON_PARTIAL_CONVERGENCE, REASON_TRANSIENT,
};
use super::types::{ErrorClass, Reconciler, ReconcilerError};
use crate::artifact::ArtifactKind;
use crate::config::ReconcileSettings;
use crate::crd::{DeployedArtifact, SourceKey, SourceObject};
use crate::observability::metrics;
use crate::store::SourceStore;

/// What one invocation did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The source no longer exists
    Gone,
    /// Deletion was requested but our finalizer was already released
    Released,
    /// Owned artifacts were swept and the finalizer removed
    Finalized(SweepReport),
    /// Every namespace converged
    Converged(DriftReport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub outcome: Outcome,
    /// Periodic re-assertion, `None` waits for the next event
    pub requeue_after: Option<Duration>,
}

impl ReconcileOutcome {
    fn done(outcome: Outcome) -> Self {
        Self {
            outcome,
            requeue_after: None,
        }
    }
}

/// Entry point for `kube_runtime::Controller`
///
/// Bounds the invocation by the configured deadline. Dropping the inner future
/// on timeout aborts every outstanding store call.
pub async fn reconcile<K: ArtifactKind>(
    source: Arc<K::Source>,
    ctx: Arc<Reconciler<K>>,
) -> Result<Action, ReconcilerError> {
    let start = Instant::now();
    let key = source.key();
    let span = info_span!(
        "reconcile",
        resource.kind = K::NAME,
        resource.name = %key.name,
        resource.namespace = %key.namespace,
        resource.generation = ?source.meta().generation,
    );

    async move {
        metrics::increment_reconciliations(K::NAME);
        let settings = ctx.settings().await;

        let result = match tokio::time::timeout(
            settings.reconcile_timeout,
            reconcile_source(&ctx, &key, &settings),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ReconcilerError::DeadlineExceeded(settings.reconcile_timeout)),
        };

        metrics::observe_reconciliation_duration(K::NAME, start.elapsed().as_secs_f64());

        let outcome = result?;
        if let Ok(mut states) = ctx.backoff_states.lock() {
            states.remove(&key.to_string());
        }

        let action = match outcome.requeue_after {
            Some(interval) => {
                debug!("Re-asserting {} in {:?}", key, interval);
                metrics::increment_requeues("resync");
                Action::requeue(interval)
            }
            None => Action::await_change(),
        };
        Ok::<Action, ReconcilerError>(action)
    }
    .instrument(span)
    .await
}

/// Run one invocation against the context's collaborators
pub async fn reconcile_source<K: ArtifactKind>(
    ctx: &Reconciler<K>,
    key: &SourceKey,
    settings: &ReconcileSettings,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let Some(source) = ctx.sources.get_source(key).await? else {
        debug!("{} {} no longer exists", K::NAME, key);
        metrics::clear_artifacts_managed(K::NAME, &key.to_string());
        return Ok(ReconcileOutcome::done(Outcome::Gone));
    };

    let lifecycle = FinalizerLifecycle::new(Arc::clone(&ctx.sources), settings);

    if source.deletion_requested() {
        if !source.has_finalizer(&settings.finalizer) {
            debug!("{} {} is being deleted and already released", K::NAME, key);
            return Ok(ReconcileOutcome::done(Outcome::Released));
        }
        info!("🧹 {} {} is being deleted, sweeping owned artifacts", K::NAME, key);
        let report = lifecycle.finalize(source, Arc::clone(&ctx.artifacts)).await?;
        metrics::increment_finalizer_sweeps(K::NAME);
        metrics::increment_artifacts_deleted(K::NAME, report.deleted as u64);
        metrics::clear_artifacts_managed(K::NAME, &key.to_string());
        info!(
            "✅ Finalized {} {}: {} artifact(s) deleted",
            K::NAME,
            key,
            report.deleted
        );
        return Ok(ReconcileOutcome::done(Outcome::Finalized(report)));
    }

    // The finalizer must be in place before the first artifact exists
    let Some(source) = lifecycle.ensure_present(source).await? else {
        return Ok(ReconcileOutcome::done(Outcome::Gone));
    };

    let identity = source.identity().ok_or_else(|| {
        ReconcilerError::Unexpected(format!("{} {key} has no UID", K::NAME))
    })?;
    let version = source.version_token();

    let content = match K::encode_payload(&source) {
        Ok(content) => content,
        Err(e) => {
            write_status(
                ctx.sources.as_ref(),
                &source,
                StatusReport::not_ready(REASON_INVALID_PAYLOAD, e.to_string(), None),
            )
            .await;
            return Err(e.into());
        }
    };

    let partition = match select(ctx.namespaces.as_ref(), source.namespace_filter()).await {
        Ok(partition) => partition,
        Err(e) => {
            let err = ReconcilerError::from(e);
            let reason = match err.class() {
                ErrorClass::Terminal => REASON_INVALID_PATTERN,
                ErrorClass::Conflict | ErrorClass::Retryable => REASON_TRANSIENT,
            };
            write_status(
                ctx.sources.as_ref(),
                &source,
                StatusReport::not_ready(reason, err.to_string(), None),
            )
            .await;
            return Err(err);
        }
    };

    let desired = plan(&identity, &version, &content, &partition, settings)?;
    let report = DriftReconciler::<K>::new(Arc::clone(&ctx.artifacts), settings)
        .reconcile(&desired)
        .await;

    metrics::increment_artifacts_created(K::NAME, report.count(ArtifactAction::Created) as u64);
    metrics::increment_artifacts_recreated(K::NAME, report.count(ArtifactAction::Recreated) as u64);
    metrics::increment_artifacts_deleted(K::NAME, report.count(ArtifactAction::Deleted) as u64);

    let deployed: Vec<DeployedArtifact> = report
        .deployed_namespaces()
        .map(|namespace| DeployedArtifact {
            namespace: namespace.to_string(),
            name: identity.name.clone(),
            version: version.clone(),
        })
        .collect();
    metrics::set_artifacts_managed(
        K::NAME,
        &key.to_string(),
        i64::try_from(deployed.len()).unwrap_or(i64::MAX),
    );
    let placement = Placement {
        deployed,
        matched: partition.must_match.len(),
        avoided: partition.must_avoid.len(),
    };

    if !report.is_converged() {
        let err = ReconcilerError::partial(&report);
        write_status(
            ctx.sources.as_ref(),
            &source,
            StatusReport::not_ready(REASON_PARTIAL_CONVERGENCE, err.to_string(), Some(placement)),
        )
        .await;
        return Err(err);
    }

    info!(
        created = report.count(ArtifactAction::Created),
        recreated = report.count(ArtifactAction::Recreated),
        unchanged = report.count(ArtifactAction::Unchanged),
        deleted = report.count(ArtifactAction::Deleted),
        "✅ Reconciled {} {} at version {}",
        K::NAME,
        key,
        version
    );
    let message = format!(
        "{} of {} namespace(s) hold version {version}",
        placement.deployed.len(),
        placement.matched
    );
    write_status(
        ctx.sources.as_ref(),
        &source,
        StatusReport::ready(message, placement),
    )
    .await;

    Ok(ReconcileOutcome {
        outcome: Outcome::Converged(report),
        requeue_after: K::resync_interval(settings),
    })
}

/// Patch the status subresource when it changed
///
/// Failures are logged only; the artifacts themselves are already converged.
async fn write_status<S: SourceObject>(
    sources: &dyn SourceStore<S>,
    source: &S,
    report: StatusReport,
) {
    let now = chrono::Utc::now().to_rfc3339();
    let current = source.current_status();
    let next = status::project(current, source.meta().generation, report, &now);
    if !status::differs(current, &next) {
        return;
    }
    if let Err(e) = sources.patch_status(&source.key(), &next).await {
        warn!("Failed to update status of {}: {}", source.key(), e);
    }
}
