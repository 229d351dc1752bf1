//! # Watch Loop
//!
//! Runs one `kube_runtime::Controller` per artifact kind and restarts it when
//! its stream ends.
//!
//! Besides the sources themselves each controller watches:
//! - Namespaces: any namespace event re-queues every cached source, so new or
//!   removed namespaces converge without waiting for a resync.
//! - Derived artifacts carrying the owner-schema-version label: an out-of-band
//!   change re-queues the owning source.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::controller::Error as ControllerError;
use kube_runtime::reflector::{ObjectRef, Store};
use kube_runtime::{watcher, Controller};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::artifact::ArtifactKind;
use crate::config::SharedControllerConfig;
use crate::constants::{ANNOTATION_SOURCE, LABEL_OWNER_SCHEMA_VERSION, LABEL_OWNER_UID};
use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};

/// Run the controller for one artifact kind until shutdown
pub async fn run_watch_loop<K: ArtifactKind>(
    client: Client,
    reconciler: Arc<Reconciler<K>>,
    server_state: Arc<ServerState>,
    controller_config: SharedControllerConfig,
) -> Result<(), anyhow::Error> {
    let backoff_start_ms = controller_config.read().await.backoff_start_ms;
    let backoff_duration_ms = Arc::new(AtomicU64::new(backoff_start_ms));

    loop {
        if server_state.shutdown_requested() {
            info!("Shutdown requested, exiting {} watch loop", K::NAME);
            break;
        }

        let backoff = Arc::clone(&backoff_duration_ms);
        let config_for_filter = Arc::clone(&controller_config);

        let sources: Api<K::Source> = Api::all(client.clone());
        let controller = Controller::new(sources, watcher::Config::default().any_semantic());
        let namespace_cache = controller.store();
        let artifact_cache = controller.store();

        info!("Starting {} controller...", K::NAME);
        server_state.mark_ready();
        controller
            .watches(
                Api::<Namespace>::all(client.clone()),
                watcher::Config::default(),
                move |_namespace: Namespace| all_sources(&namespace_cache),
            )
            .watches(
                Api::<K::Object>::all(client.clone()),
                watcher::Config::default().labels(LABEL_OWNER_SCHEMA_VERSION),
                move |artifact: K::Object| owning_source::<K>(&artifact, &artifact_cache),
            )
            .shutdown_on_signal()
            .run(
                |obj, ctx| reconcile::<K>(obj, ctx),
                |obj, error, ctx| handle_reconciliation_error::<K>(obj, error, ctx),
                Arc::clone(&reconciler),
            )
            .filter_map(move |event| {
                let backoff = Arc::clone(&backoff);
                let config = Arc::clone(&config_for_filter);
                async move {
                    match event {
                        Ok((object, _action)) => {
                            let backoff_start = config.read().await.backoff_start_ms;
                            backoff.store(backoff_start, std::sync::atomic::Ordering::Relaxed);
                            debug!(object = %object, "watch.event.reconciled");
                            Some(())
                        }
                        // Already handled by the error policy
                        Err(ControllerError::ReconcilerFailed(error, object)) => {
                            debug!(object = %object, error = %error, "watch.event.reconciliation_failed");
                            Some(())
                        }
                        Err(ControllerError::ObjectNotFound(object)) => {
                            debug!(object = %object, "watch.event.object_gone");
                            Some(())
                        }
                        Err(e) => {
                            let error_string = format!("{e:?}");
                            let (max_backoff, restart_delay) = {
                                let config = config.read().await;
                                (config.backoff_max_ms, config.watch_restart_delay_secs)
                            };
                            handle_watch_stream_error(
                                &error_string,
                                &backoff,
                                max_backoff,
                                restart_delay,
                            )
                            .await
                        }
                    }
                }
            })
            .for_each(|()| futures::future::ready(()))
            .instrument(info_span!("controller.watch", resource.kind = K::NAME))
            .await;

        if server_state.shutdown_requested() {
            info!("Shutdown requested, exiting {} watch loop", K::NAME);
            break;
        }

        let delay_secs = controller_config
            .read()
            .await
            .watch_restart_delay_after_end_secs;
        warn!(
            "{} controller stream ended, restarting in {} seconds...",
            K::NAME,
            delay_secs
        );
        tokio::time::sleep(Duration::from_secs(delay_secs)).await;
    }

    info!("{} controller stopped gracefully", K::NAME);
    Ok(())
}

/// Every source currently in the controller's cache
fn all_sources<S>(cache: &Store<S>) -> Vec<ObjectRef<S>>
where
    S: Resource<DynamicType = ()> + Clone + 'static,
{
    cache
        .state()
        .iter()
        .map(|source| ObjectRef::from_obj(source.as_ref()))
        .collect()
}

/// Map a derived artifact back to the source that owns it
///
/// Prefers the source annotation; falls back to the owner UID label.
fn owning_source<K: ArtifactKind>(
    artifact: &K::Object,
    cache: &Store<K::Source>,
) -> Option<ObjectRef<K::Source>> {
    let by_annotation = artifact
        .annotations()
        .get(ANNOTATION_SOURCE)
        .and_then(|source| source.split_once('/'))
        .map(|(namespace, name)| ObjectRef::new(name).within(namespace));
    if by_annotation.is_some() {
        return by_annotation;
    }

    let uid = artifact.labels().get(LABEL_OWNER_UID)?;
    cache
        .state()
        .iter()
        .find(|source| source.uid().as_deref() == Some(uid.as_str()))
        .map(|source| ObjectRef::from_obj(source.as_ref()))
}
