//! # Status
//!
//! Status types shared by `GlobalConfig` and `GlobalSecret`.

use serde::{Deserialize, Serialize};

/// Observed state of a source object
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStatus {
    /// Conditions represent the latest available observations
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Generation that produced this status
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last reconciliation time (RFC3339)
    #[serde(default)]
    pub last_reconcile_time: Option<String>,
    /// Derived artifacts known to be current, in namespace order
    #[serde(default)]
    pub deployed: Vec<DeployedArtifact>,
    /// Number of namespaces selected to receive a copy
    #[serde(default)]
    pub matched_namespaces: Option<i32>,
    /// Number of namespaces excluded from receiving a copy
    #[serde(default)]
    pub avoided_namespaces: Option<i32>,
}

impl GlobalStatus {
    /// Look up a condition by type
    #[must_use]
    pub fn condition(&self, condition_type: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }
}

/// A derived artifact written by the controller
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeployedArtifact {
    pub namespace: String,
    pub name: String,
    /// Version marker carried by the artifact
    pub version: String,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition
    pub r#type: String,
    /// Status of the condition (True, False, Unknown)
    pub status: String,
    /// Last transition time
    #[serde(default)]
    pub last_transition_time: Option<String>,
    /// Reason for the condition
    #[serde(default)]
    pub reason: Option<String>,
    /// Message describing the condition
    #[serde(default)]
    pub message: Option<String>,
}
