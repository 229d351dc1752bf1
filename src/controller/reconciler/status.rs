//! # Status
//!
//! Projects the outcome of a reconciliation onto `GlobalStatus`.
//!
//! Status is written only when it differs from what is stored, ignoring
//! timestamps. Every write bumps the resource version and would otherwise wake
//! the controller again.

use crate::crd::{Condition, DeployedArtifact, GlobalStatus};

pub const CONDITION_READY: &str = "Ready";

pub const REASON_RECONCILED: &str = "Reconciled";
pub const REASON_INVALID_PATTERN: &str = "InvalidNamespacePattern";
pub const REASON_INVALID_PAYLOAD: &str = "InvalidPayload";
pub const REASON_PARTIAL_CONVERGENCE: &str = "PartialConvergence";
pub const REASON_TRANSIENT: &str = "TransientError";

/// What a reconciliation learned, before it is merged with the stored status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub ready: bool,
    pub reason: &'static str,
    pub message: String,
    /// `None` keeps the previously recorded artifacts and counts
    pub placement: Option<Placement>,
}

/// Where artifacts currently live
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    pub deployed: Vec<DeployedArtifact>,
    pub matched: usize,
    pub avoided: usize,
}

impl StatusReport {
    #[must_use]
    pub fn ready(message: impl Into<String>, placement: Placement) -> Self {
        Self {
            ready: true,
            reason: REASON_RECONCILED,
            message: message.into(),
            placement: Some(placement),
        }
    }

    #[must_use]
    pub fn not_ready(
        reason: &'static str,
        message: impl Into<String>,
        placement: Option<Placement>,
    ) -> Self {
        Self {
            ready: false,
            reason,
            message: message.into(),
            placement,
        }
    }
}

/// Merge a report into the previous status
///
/// `lastTransitionTime` only moves when the Ready condition flips.
#[must_use]
pub fn project(
    previous: Option<&GlobalStatus>,
    generation: Option<i64>,
    report: StatusReport,
    now: &str,
) -> GlobalStatus {
    let status = if report.ready { "True" } else { "False" };
    let previous_ready = previous.and_then(|p| p.condition(CONDITION_READY));
    let last_transition_time = match previous_ready {
        Some(c) if c.status == status => c.last_transition_time.clone(),
        _ => Some(now.to_string()),
    };

    let mut next = GlobalStatus {
        conditions: vec![Condition {
            r#type: CONDITION_READY.to_string(),
            status: status.to_string(),
            last_transition_time,
            reason: Some(report.reason.to_string()),
            message: Some(report.message),
        }],
        observed_generation: generation,
        last_reconcile_time: Some(now.to_string()),
        ..previous.cloned().unwrap_or_default()
    };

    if let Some(placement) = report.placement {
        let mut deployed = placement.deployed;
        deployed.sort_by(|a, b| a.namespace.cmp(&b.namespace));
        next.deployed = deployed;
        next.matched_namespaces = Some(i32::try_from(placement.matched).unwrap_or(i32::MAX));
        next.avoided_namespaces = Some(i32::try_from(placement.avoided).unwrap_or(i32::MAX));
    }
    next
}

/// Whether `desired` differs from `current` in anything but timestamps
#[must_use]
pub fn differs(current: Option<&GlobalStatus>, desired: &GlobalStatus) -> bool {
    match current {
        None => true,
        Some(current) => without_timestamps(current) != without_timestamps(desired),
    }
}

fn without_timestamps(status: &GlobalStatus) -> GlobalStatus {
    let mut status = status.clone();
    status.last_reconcile_time = None;
    for condition in &mut status.conditions {
        condition.last_transition_time = None;
    }
    status
}
