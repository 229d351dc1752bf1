//! # Namespace Filter
//!
//! Classifies a namespace name against ordered avoid and match pattern sets.
//!
//! Avoid patterns are evaluated first and win over match patterns. Patterns are
//! unanchored: `team-` matches `my-team-a`; write `^team-.*$` for whole names.

use regex::Regex;
use thiserror::Error;

use crate::crd::NamespacesRegex;

/// Result of classifying one namespace name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// An avoid pattern matched
    Avoid,
    /// No avoid pattern matched, a match pattern did
    Match,
    /// Nothing matched; callers treat this as `Avoid`
    Neither,
}

impl Classification {
    /// Whether the namespace should receive an artifact
    #[must_use]
    pub fn receives_artifact(self) -> bool {
        self == Classification::Match
    }
}

/// A namespace pattern that is not a valid regular expression
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid namespace pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: String,
}

/// Compiled avoid and match pattern sets
#[derive(Debug, Clone)]
pub struct NamespaceFilter {
    avoid: Vec<Regex>,
    matches: Vec<Regex>,
}

impl NamespaceFilter {
    /// Compile both pattern sets; any malformed pattern fails the whole filter
    pub fn compile(spec: &NamespacesRegex) -> Result<Self, PatternError> {
        Ok(Self {
            avoid: compile_all(&spec.avoid_regex)?,
            matches: compile_all(&spec.match_regex)?,
        })
    }

    #[must_use]
    pub fn classify(&self, name: &str) -> Classification {
        if self.avoid.iter().any(|re| re.is_match(name)) {
            Classification::Avoid
        } else if self.matches.iter().any(|re| re.is_match(name)) {
            Classification::Match
        } else {
            Classification::Neither
        }
    }
}

/// Classify a single name against raw pattern strings
pub fn classify(
    name: &str,
    avoid_patterns: &[String],
    match_patterns: &[String],
) -> Result<Classification, PatternError> {
    let filter = NamespaceFilter {
        avoid: compile_all(avoid_patterns)?,
        matches: compile_all(match_patterns)?,
    };
    Ok(filter.classify(name))
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, PatternError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| PatternError {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })
        })
        .collect()
}
