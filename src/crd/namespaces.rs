//! # Namespace Selection Rules

use serde::{Deserialize, Serialize};

/// Ordered avoid/match regex lists deciding which namespaces receive a copy
///
/// Avoid patterns win over match patterns. A namespace matching neither list
/// is treated as avoided. Patterns are unanchored: `kube-` matches
/// `kube-system`; write `^default$` to match a single name exactly.
///
/// ```yaml
/// namespaces:
///   avoidregex: ["^kube-.*"]
///   matchregex: ["^team-.*", "^default$"]
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct NamespacesRegex {
    /// Patterns of namespaces that must never receive a copy
    #[serde(rename = "avoidregex", default)]
    pub avoid_regex: Vec<String>,
    /// Patterns of namespaces that receive a copy unless avoided
    #[serde(rename = "matchregex", default)]
    pub match_regex: Vec<String>,
}
