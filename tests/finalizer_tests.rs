//! # Finalizer Tests
//!
//! Deletion of a source sweeps every owned artifact before the finalizer goes.

mod common;

use std::sync::Arc;

use common::{config_reconciler, global_config, namespaces, ClusterStore};
use global_config_controller::config::ReconcileSettings;
use global_config_controller::constants::DEFAULT_FINALIZER;
use global_config_controller::controller::reconciler::{
    reconcile_source, FinalizerLifecycle, Outcome, ReconcilerError, SweepReport,
};
use global_config_controller::crd::{GlobalConfig, SourceKey};
use k8s_openapi::api::core::v1::ConfigMap;
use global_config_controller::store::{ArtifactStore, SourceStore};
use kube::ResourceExt;

const SOURCE_NS: &str = "platform";
const SOURCE_NAME: &str = "endpoints";

fn deployed_store() -> Arc<ClusterStore> {
    let store = ClusterStore::with_namespaces(&["platform", "ns1", "ns2"]);
    store.put_source(global_config(
        SOURCE_NS,
        SOURCE_NAME,
        namespaces(&[], &["^ns"]),
        &[("URL", "https://example.internal")],
    ));
    store
}

async fn run(store: &Arc<ClusterStore>) -> Result<Outcome, ReconcilerError> {
    let ctx = config_reconciler(store);
    let settings = ctx.settings().await;
    reconcile_source(&ctx, &SourceKey::new(SOURCE_NS, SOURCE_NAME), &settings)
        .await
        .map(|outcome| outcome.outcome)
}

#[tokio::test]
async fn test_finalize_sweeps_then_releases() {
    let store = deployed_store();
    run(&store).await.expect("deploy should succeed");
    store.request_deletion::<GlobalConfig>(SOURCE_NS, SOURCE_NAME);
    store.reset_calls();

    let outcome = run(&store).await.expect("finalize should succeed");
    assert_eq!(outcome, Outcome::Finalized(SweepReport { deleted: 2 }));

    let calls = store.calls();
    assert_eq!(
        calls.deleted,
        vec!["ns1/endpoints".to_string(), "ns2/endpoints".to_string()]
    );
    assert!(store.artifact_namespaces::<ConfigMap>(SOURCE_NAME).is_empty());
    // Releasing the last finalizer lets the source go
    assert!(store.source::<GlobalConfig>(SOURCE_NS, SOURCE_NAME).is_none());
}

#[tokio::test]
async fn test_second_finalize_is_trivial() {
    let store = deployed_store();
    run(&store).await.expect("deploy should succeed");
    store.request_deletion::<GlobalConfig>(SOURCE_NS, SOURCE_NAME);
    let source: GlobalConfig = store.source(SOURCE_NS, SOURCE_NAME).unwrap();

    let settings = ReconcileSettings::default();
    let lifecycle = FinalizerLifecycle::<GlobalConfig>::new(Arc::clone(&store) as Arc<dyn SourceStore<GlobalConfig>>, &settings);

    let first = lifecycle
        .finalize::<ConfigMap>(source.clone(), Arc::clone(&store) as Arc<dyn ArtifactStore<ConfigMap>>)
        .await
        .expect("first finalize should succeed");
    assert_eq!(first.deleted, 2);

    // Retry with the same stale copy, as a requeued invocation would
    let second = lifecycle
        .finalize::<ConfigMap>(source, Arc::clone(&store) as Arc<dyn ArtifactStore<ConfigMap>>)
        .await
        .expect("second finalize should succeed");
    assert_eq!(second.deleted, 0);
}

#[tokio::test]
async fn test_failed_sweep_keeps_finalizer_until_retry_succeeds() {
    let store = deployed_store();
    run(&store).await.expect("deploy should succeed");
    store.request_deletion::<GlobalConfig>(SOURCE_NS, SOURCE_NAME);
    store.fail_deletes_in("ns2", 1);

    let err = run(&store).await.expect_err("sweep should fail");
    assert!(matches!(err, ReconcilerError::Transient(_)));

    // Every owned artifact was attempted, the finalizer stayed
    assert!(store.artifact::<ConfigMap>("ns1", SOURCE_NAME).is_none());
    assert!(store.artifact::<ConfigMap>("ns2", SOURCE_NAME).is_some());
    let source: GlobalConfig = store.source(SOURCE_NS, SOURCE_NAME).unwrap();
    assert!(source.finalizers().iter().any(|f| f == DEFAULT_FINALIZER));

    let outcome = run(&store).await.expect("retry should finalize");
    assert_eq!(outcome, Outcome::Finalized(SweepReport { deleted: 1 }));
    assert!(store.source::<GlobalConfig>(SOURCE_NS, SOURCE_NAME).is_none());
}

#[tokio::test]
async fn test_sweep_finds_artifacts_outside_current_selection() {
    let store = deployed_store();
    run(&store).await.expect("deploy should succeed");
    // Namespace patterns no longer match, artifacts still carry the owner label
    store.edit_source::<GlobalConfig>(SOURCE_NS, SOURCE_NAME, |source| {
        source.spec.namespaces.match_regex = vec!["^nothing$".to_string()];
    });
    store.request_deletion::<GlobalConfig>(SOURCE_NS, SOURCE_NAME);

    let outcome = run(&store).await.expect("finalize should succeed");
    assert_eq!(outcome, Outcome::Finalized(SweepReport { deleted: 2 }));
}

#[tokio::test]
async fn test_deletion_before_first_reconcile_leaves_nothing_behind() {
    let store = deployed_store();
    // Never reconciled: no finalizer, so the API server removes it at once
    store.request_deletion::<GlobalConfig>(SOURCE_NS, SOURCE_NAME);

    let outcome = run(&store).await.expect("missing source is not an error");
    assert_eq!(outcome, Outcome::Gone);
    assert!(store.calls().created.is_empty());
}

#[tokio::test]
async fn test_finalize_leaves_other_sources_alone() {
    let store = deployed_store();
    store.put_source(global_config(
        SOURCE_NS,
        "other",
        namespaces(&[], &["^ns"]),
        &[("K", "V")],
    ));
    run(&store).await.expect("deploy should succeed");
    let ctx = config_reconciler(&store);
    let settings = ctx.settings().await;
    reconcile_source(&ctx, &SourceKey::new(SOURCE_NS, "other"), &settings)
        .await
        .expect("deploy of the other source should succeed");

    store.request_deletion::<GlobalConfig>(SOURCE_NS, SOURCE_NAME);
    run(&store).await.expect("finalize should succeed");

    assert_eq!(
        store.artifact_namespaces::<ConfigMap>("other"),
        vec!["ns1".to_string(), "ns2".to_string()]
    );
}
