//! # Namespace Selector
//!
//! Partitions every namespace of the cluster into must-match and must-avoid.

use thiserror::Error;
use tracing::debug;

use super::filter::{NamespaceFilter, PatternError};
use crate::crd::NamespacesRegex;
use crate::store::{NamespaceLister, StoreError};

/// Partition of all namespaces, each list in listing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespacePartition {
    pub must_match: Vec<String>,
    pub must_avoid: Vec<String>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectError {
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error("listing namespaces failed: {0}")]
    List(#[from] StoreError),
}

/// Partition an already listed set of namespaces
///
/// Every input name lands in exactly one of the two lists.
#[must_use]
pub fn partition(namespaces: &[String], filter: &NamespaceFilter) -> NamespacePartition {
    let (must_match, must_avoid): (Vec<String>, Vec<String>) = namespaces
        .iter()
        .cloned()
        .partition(|name| filter.classify(name).receives_artifact());
    NamespacePartition {
        must_match,
        must_avoid,
    }
}

/// List namespaces once and partition them
///
/// Patterns are compiled before listing so a malformed pattern fails without I/O.
/// No partial partition is ever returned.
pub async fn select(
    lister: &dyn NamespaceLister,
    spec: &NamespacesRegex,
) -> Result<NamespacePartition, SelectError> {
    let filter = NamespaceFilter::compile(spec)?;
    let namespaces = lister.list_namespaces().await?;
    let result = partition(&namespaces, &filter);
    debug!(
        matched = result.must_match.len(),
        avoided = result.must_avoid.len(),
        "Partitioned namespaces"
    );
    Ok(result)
}
