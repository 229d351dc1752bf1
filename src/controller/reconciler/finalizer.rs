//! # Finalizer Lifecycle
//!
//! Guards source deletion until every derived artifact has been swept.
//!
//! The finalizer is added before the first artifact is created. On deletion
//! every artifact carrying the source's owner UID is deleted, and only when all
//! of those deletes succeeded (or found nothing) is the finalizer removed. A
//! failed sweep leaves the finalizer in place; the next attempt resumes it.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::{stream, StreamExt};
use kube::{Resource, ResourceExt};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::ReconcileSettings;
use crate::crd::SourceObject;
use crate::store::{ArtifactStore, SourceStore, StoreError, StoreResult};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FinalizerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to delete {failed} owned artifact(s), first: {first}")]
    Sweep { failed: usize, first: String },
    #[error("finalizer update on {key} kept conflicting after {attempts} attempt(s)")]
    Conflict { key: String, attempts: u32 },
}

/// Result of a completed sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Owned artifacts deleted by this sweep
    pub deleted: usize,
}

/// Change applied to the source's finalizer list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Add,
    Remove,
}

impl Edit {
    /// Returns whether the list changed
    fn apply<S: SourceObject>(self, source: &mut S, finalizer: &str) -> bool {
        match self {
            Edit::Add if source.has_finalizer(finalizer) => false,
            Edit::Add => {
                source.finalizers_mut().push(finalizer.to_string());
                true
            }
            Edit::Remove => {
                let before = source.finalizers().len();
                source.finalizers_mut().retain(|f| f != finalizer);
                source.finalizers().len() != before
            }
        }
    }
}

/// Adds and removes the deletion guard on source objects
pub struct FinalizerLifecycle<'a, S: SourceObject> {
    sources: Arc<dyn SourceStore<S>>,
    settings: &'a ReconcileSettings,
}

impl<S: SourceObject> std::fmt::Debug for FinalizerLifecycle<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizerLifecycle")
            .field("finalizer", &self.settings.finalizer)
            .finish_non_exhaustive()
    }
}

impl<'a, S: SourceObject> FinalizerLifecycle<'a, S> {
    pub fn new(sources: Arc<dyn SourceStore<S>>, settings: &'a ReconcileSettings) -> Self {
        Self { sources, settings }
    }

    /// Add the finalizer if absent
    ///
    /// Returns the up-to-date source, or `None` when it disappeared meanwhile.
    pub async fn ensure_present(&self, source: S) -> Result<Option<S>, FinalizerError> {
        self.mutate(source, Edit::Add).await
    }

    /// Sweep every owned artifact, then remove the finalizer
    pub async fn finalize<O>(
        &self,
        source: S,
        artifacts: Arc<dyn ArtifactStore<O>>,
    ) -> Result<SweepReport, FinalizerError>
    where
        O: Resource + Send + Sync + 'static,
    {
        let report = match source.uid() {
            Some(uid) => self.sweep(&uid, artifacts).await?,
            // Without a UID nothing can carry our owner label
            None => SweepReport::default(),
        };

        self.mutate(source, Edit::Remove).await?;
        Ok(report)
    }

    async fn sweep<O>(
        &self,
        uid: &str,
        artifacts: Arc<dyn ArtifactStore<O>>,
    ) -> Result<SweepReport, FinalizerError>
    where
        O: Resource + Send + Sync + 'static,
    {
        let owned = artifacts
            .list_artifacts_by_owner(&self.settings.owner_uid_label, uid)
            .await?;

        let mut deletes: Vec<BoxFuture<'static, (String, String, StoreResult<()>)>> =
            Vec::with_capacity(owned.len());
        for object in &owned {
            let artifacts = Arc::clone(&artifacts);
            let namespace = object.namespace().unwrap_or_default();
            let name = object.name_any();
            deletes.push(
                async move {
                    let result = artifacts.delete_artifact(&namespace, &name).await;
                    (namespace, name, result)
                }
                .boxed(),
            );
        }

        let results: Vec<_> = stream::iter(deletes)
            .buffered(self.settings.namespace_concurrency.max(1))
            .collect()
            .await;

        let mut deleted = 0;
        let mut failures: Vec<String> = Vec::new();
        for (namespace, name, result) in results {
            match result {
                Ok(()) => {
                    info!(namespace = %namespace, name = %name, "🗑️  Swept owned artifact");
                    deleted += 1;
                }
                Err(e) => {
                    warn!(namespace = %namespace, name = %name, error = %e, "Failed to sweep owned artifact");
                    failures.push(format!("{namespace}/{name}: {e}"));
                }
            }
        }

        match failures.first() {
            None => Ok(SweepReport { deleted }),
            Some(first) => Err(FinalizerError::Sweep {
                failed: failures.len(),
                first: first.clone(),
            }),
        }
    }

    /// Apply a finalizer edit, reloading and retrying on conflicts
    ///
    /// Sources the edit leaves unchanged are not written.
    async fn mutate(&self, mut source: S, edit: Edit) -> Result<Option<S>, FinalizerError> {
        let key = source.key();
        let finalizer = self.settings.finalizer.as_str();
        let mut attempts = 0;
        loop {
            let mut updated = source.clone();
            if !edit.apply(&mut updated, finalizer) {
                return Ok(Some(source));
            }
            attempts += 1;
            match self.sources.update_source(&updated).await {
                Ok(written) => return Ok(Some(written)),
                Err(StoreError::Conflict(_)) if attempts <= self.settings.max_conflict_retries => {
                    warn!(source = %key, attempt = attempts, "Conflict updating finalizer, reloading source");
                    match self.sources.get_source(&key).await? {
                        Some(fresh) => source = fresh,
                        None => return Ok(None),
                    }
                }
                Err(StoreError::Conflict(_)) => {
                    return Err(FinalizerError::Conflict {
                        key: key.to_string(),
                        attempts,
                    })
                }
                // Removing the last finalizer may let the object vanish under us
                Err(StoreError::NotFound(_)) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
