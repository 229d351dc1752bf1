//! # Drift Reconciler
//!
//! Drives every namespace of a `DesiredState` to convergence. Derived artifacts
//! are immutable, so a stale artifact is deleted and then created again; no
//! update call is ever issued.
//!
//! Namespaces are independent. One failing namespace never stops the others;
//! every namespace is attempted and the failures are reported together.

use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::{stream, StreamExt};
use kube::Resource;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::planner::{DesiredArtifact, DesiredState};
use crate::artifact::{owner_uid, version_marker, ArtifactKind};
use crate::config::ReconcileSettings;
use crate::store::{ArtifactStore, StoreError};

/// What happened in one namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactAction {
    /// No artifact existed, one was created
    Created,
    /// A stale artifact was deleted and created again
    Recreated,
    /// The artifact already carried the current version marker
    Unchanged,
    /// An artifact in an avoided namespace was deleted
    Deleted,
    /// Nothing to delete in an avoided namespace
    AlreadyAbsent,
}

impl ArtifactAction {
    /// Whether the namespace now holds a current artifact
    #[must_use]
    pub fn is_deployed(self) -> bool {
        matches!(
            self,
            ArtifactAction::Created | ArtifactAction::Recreated | ArtifactAction::Unchanged
        )
    }
}

/// Failure converging one namespace
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriftError {
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The stale artifact is gone but its replacement was not created
    #[error("stale artifact deleted but recreate failed: {0}")]
    RecreateIncomplete(StoreError),
    /// Something else created the artifact concurrently with a different marker
    #[error("artifact created concurrently with version marker {found:?}")]
    CreateRace { found: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceFailure {
    pub namespace: String,
    pub error: DriftError,
}

/// Aggregated result of one drift pass, in processing order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriftReport {
    pub actions: Vec<(String, ArtifactAction)>,
    pub failures: Vec<NamespaceFailure>,
}

impl DriftReport {
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn count(&self, action: ArtifactAction) -> usize {
        self.actions.iter().filter(|(_, a)| *a == action).count()
    }

    /// Namespaces holding a current artifact after this pass
    pub fn deployed_namespaces(&self) -> impl Iterator<Item = &str> {
        self.actions
            .iter()
            .filter(|(_, action)| action.is_deployed())
            .map(|(namespace, _)| namespace.as_str())
    }

    #[must_use]
    pub fn attempted(&self) -> usize {
        self.actions.len() + self.failures.len()
    }
}

type StepFuture = BoxFuture<'static, (String, Result<ArtifactAction, DriftError>)>;

/// Converges derived artifacts of one kind for one source
///
/// Holds owned handles so every per-namespace step is a `'static` future.
pub struct DriftReconciler<K: ArtifactKind> {
    store: Arc<dyn ArtifactStore<K::Object>>,
    settings: Arc<ReconcileSettings>,
    kind: PhantomData<fn() -> K>,
}

impl<K: ArtifactKind> Clone for DriftReconciler<K> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            settings: Arc::clone(&self.settings),
            kind: PhantomData,
        }
    }
}

impl<K: ArtifactKind> std::fmt::Debug for DriftReconciler<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriftReconciler")
            .field("kind", &K::NAME)
            .field("concurrency", &self.settings.namespace_concurrency)
            .finish_non_exhaustive()
    }
}

impl<K: ArtifactKind> DriftReconciler<K> {
    pub fn new(store: Arc<dyn ArtifactStore<K::Object>>, settings: &ReconcileSettings) -> Self {
        Self {
            store,
            settings: Arc::new(settings.clone()),
            kind: PhantomData,
        }
    }

    /// Converge every avoided and desired namespace
    ///
    /// Avoided namespaces are handled first so an artifact never lingers in a
    /// namespace that just left scope while new ones are being created.
    pub async fn reconcile(&self, desired: &DesiredState<K::Content>) -> DriftReport {
        let source_name = desired.source.name.clone();
        let mut steps: Vec<StepFuture> =
            Vec::with_capacity(desired.avoided.len() + desired.artifacts.len());

        for namespace in &desired.avoided {
            let this = self.clone();
            let namespace = namespace.clone();
            let name = source_name.clone();
            let uid = desired.source.uid.clone();
            steps.push(
                async move {
                    let result = this.remove(&namespace, &name, &uid).await;
                    (namespace, result)
                }
                .boxed(),
            );
        }
        for artifact in desired.artifacts.values() {
            let this = self.clone();
            let artifact = artifact.clone();
            steps.push(
                async move {
                    let result = this.converge(&artifact).await;
                    (artifact.namespace, result)
                }
                .boxed(),
            );
        }

        let results: Vec<(String, Result<ArtifactAction, DriftError>)> = stream::iter(steps)
            .buffered(self.settings.namespace_concurrency.max(1))
            .collect()
            .await;

        let mut report = DriftReport::default();
        for (namespace, result) in results {
            match result {
                Ok(action) => report.actions.push((namespace, action)),
                Err(error) => {
                    warn!(
                        kind = K::NAME,
                        namespace = %namespace,
                        name = %source_name,
                        error = %error,
                        "Failed to converge namespace"
                    );
                    report.failures.push(NamespaceFailure { namespace, error });
                }
            }
        }
        report
    }

    /// Delete whatever sits at the source's key in an avoided namespace
    async fn remove(
        &self,
        namespace: &str,
        name: &str,
        source_uid: &str,
    ) -> Result<ArtifactAction, DriftError> {
        let Some(existing) = self.store.get_artifact(namespace, name).await? else {
            return Ok(ArtifactAction::AlreadyAbsent);
        };

        if owner_uid(&existing, &self.settings) != Some(source_uid) {
            warn!(
                kind = K::NAME,
                namespace = %namespace,
                name = %name,
                owner = ?owner_uid(&existing, &self.settings),
                "Deleting artifact in avoided namespace that is not owned by this source"
            );
        }

        self.store.delete_artifact(namespace, name).await?;
        info!(kind = K::NAME, namespace = %namespace, name = %name, "🗑️  Deleted artifact from avoided namespace");
        Ok(ArtifactAction::Deleted)
    }

    /// Make sure a current artifact exists in a desired namespace
    async fn converge(
        &self,
        desired: &DesiredArtifact<K::Content>,
    ) -> Result<ArtifactAction, DriftError> {
        let namespace = desired.namespace.as_str();
        let name = desired.name.as_str();

        match self.store.get_artifact(namespace, name).await? {
            None => self.create(desired).await,
            Some(existing) if self.is_current(&existing, desired) => {
                debug!(kind = K::NAME, namespace = %namespace, name = %name, "Artifact is current");
                Ok(ArtifactAction::Unchanged)
            }
            Some(existing) => {
                info!(
                    kind = K::NAME,
                    namespace = %namespace,
                    name = %name,
                    found = ?version_marker(&existing, &self.settings),
                    desired = %desired.version,
                    "Artifact is stale, recreating"
                );
                self.store.delete_artifact(namespace, name).await?;
                // From here on the artifact is gone; a failed create must be retried
                self.store
                    .create_artifact(&K::build_object(desired))
                    .await
                    .map_err(DriftError::RecreateIncomplete)?;
                info!(kind = K::NAME, namespace = %namespace, name = %name, version = %desired.version, "♻️  Recreated artifact");
                Ok(ArtifactAction::Recreated)
            }
        }
    }

    async fn create(
        &self,
        desired: &DesiredArtifact<K::Content>,
    ) -> Result<ArtifactAction, DriftError> {
        let namespace = desired.namespace.as_str();
        let name = desired.name.as_str();

        match self.store.create_artifact(&K::build_object(desired)).await {
            Ok(()) => {
                info!(kind = K::NAME, namespace = %namespace, name = %name, version = %desired.version, "✅ Created artifact");
                Ok(ArtifactAction::Created)
            }
            Err(StoreError::AlreadyExists(_)) => {
                // Lost a race; accept the winner only if it is already current
                match self.store.get_artifact(namespace, name).await? {
                    Some(existing) if self.is_current(&existing, desired) => {
                        Ok(ArtifactAction::Unchanged)
                    }
                    existing => Err(DriftError::CreateRace {
                        found: existing.as_ref().and_then(|o| {
                            version_marker(o, &self.settings).map(ToString::to_string)
                        }),
                    }),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Current iff the marker matches and the artifact belongs to this source
    fn is_current(&self, existing: &K::Object, desired: &DesiredArtifact<K::Content>) -> bool {
        let desired_owner = desired.labels.get(&self.settings.owner_uid_label);
        version_marker(existing, &self.settings) == Some(desired.version.as_str())
            && owner_uid(existing, &self.settings) == desired_owner.map(String::as_str)
            && existing.meta().deletion_timestamp.is_none()
    }
}
