//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use kube_runtime::controller::Action;
use tracing::{error, info, warn};

use crate::artifact::ArtifactKind;
use crate::constants::CONFLICT_REQUEUE_SECS;
use crate::controller::reconciler::{BackoffState, ErrorClass, Reconciler, ReconcilerError};
use crate::crd::SourceObject;
use crate::observability::metrics;

/// Decide when a failed source is retried
///
/// - Terminal (bad pattern or payload): slow requeue until the resource is fixed
/// - Conflict: retry almost immediately with a fresh read
/// - Retryable: per-resource Fibonacci backoff, reset by the next success
pub fn handle_reconciliation_error<K: ArtifactKind>(
    obj: Arc<K::Source>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler<K>>,
) -> Action {
    let key = obj.key();
    let class = error.class();
    metrics::increment_reconciliation_errors(K::NAME, class.as_str());

    match class {
        ErrorClass::Terminal => {
            // This callback is synchronous; fall back to the defaults while a reload holds the lock
            let requeue = ctx.try_settings().unwrap_or_default().terminal_error_requeue;
            error!(
                resource.kind = K::NAME,
                resource.name = %key.name,
                resource.namespace = %key.namespace,
                error = %error,
                "❌ {} {} needs attention, retrying in {}s",
                K::NAME,
                key,
                requeue.as_secs()
            );
            metrics::increment_requeues("terminal");
            Action::requeue(requeue)
        }
        ErrorClass::Conflict => {
            info!(
                resource.kind = K::NAME,
                resource.name = %key.name,
                resource.namespace = %key.namespace,
                "Conflict reconciling {}: {}, retrying",
                key,
                error
            );
            metrics::increment_requeues("conflict");
            Action::requeue(Duration::from_secs(CONFLICT_REQUEUE_SECS))
        }
        ErrorClass::Retryable => {
            let (backoff_seconds, error_count) = match ctx.backoff_states.lock() {
                Ok(mut states) => {
                    let state = states
                        .entry(key.to_string())
                        .or_insert_with(BackoffState::new);
                    state.increment_error();
                    (state.backoff.next_backoff_seconds(), state.error_count)
                }
                Err(e) => {
                    warn!("Failed to lock backoff_states: {}, using default backoff", e);
                    (60, 0)
                }
            };

            let next_trigger_time = chrono::Utc::now()
                + chrono::Duration::seconds(i64::try_from(backoff_seconds).unwrap_or(i64::MAX));
            warn!(
                resource.kind = K::NAME,
                resource.name = %key.name,
                resource.namespace = %key.namespace,
                error = %error,
                error_count,
                "🔄 Reconciliation of {} failed, retrying at {} (in {}s)",
                key,
                next_trigger_time.to_rfc3339(),
                backoff_seconds
            );
            metrics::increment_requeues("error-backoff");
            Action::requeue(Duration::from_secs(backoff_seconds))
        }
    }
}

/// Classify a watch stream error and decide whether to restart the watch
///
/// Returns `None` to filter out the error (allow restart) or `Some(())` to continue.
pub async fn handle_watch_stream_error(
    error_string: &str,
    backoff: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    watch_restart_delay_secs: u64,
) -> Option<()> {
    // 404 first: a plain-text 404 body surfaces as a serde error mentioning WatchFailed
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 =
        (error_string.contains("401") || error_string.contains("Unauthorized")) && !is_not_found;
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests");

    if is_401 {
        error!(
            error = %error_string,
            "❌ Watch authentication failed (401) - check the controller's ClusterRole and ServiceAccount token"
        );
        warn!(
            "⏳ Waiting {}s before retrying watch (RBAC may need time to propagate)...",
            watch_restart_delay_secs
        );
        tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
        None
    } else if is_410 {
        warn!("Watch resource version expired (410), watch will restart");
        None
    } else if is_429 {
        let current_backoff = backoff.load(Ordering::Relaxed);
        warn!(
            "API server throttling or reinitializing (429), backing off for {}ms before restart...",
            current_backoff
        );
        tokio::time::sleep(Duration::from_millis(current_backoff)).await;
        backoff.store(
            current_backoff.saturating_mul(2).min(max_backoff_ms),
            Ordering::Relaxed,
        );
        None
    } else if is_not_found {
        warn!(
            "Watched resource not found (404) - is the GlobalConfig/GlobalSecret CRD installed? Error: {}",
            error_string
        );
        Some(())
    } else {
        error!("Controller stream error: {}", error_string);
        tokio::time::sleep(Duration::from_secs(watch_restart_delay_secs)).await;
        None
    }
}
