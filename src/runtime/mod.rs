//! # Runtime
//!
//! Controller runtime: initialization, one watch loop per artifact kind and
//! the error policy shared by both.

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;

use std::sync::Arc;

use anyhow::Result;
use futures::future::{self, BoxFuture, FutureExt};
use tracing::{info, warn};

use crate::artifact::{ArtifactKind, ConfigMapKind, SecretKind};
use crate::controller::reconciler::Reconciler;
use crate::crd::{GlobalConfig, GlobalSecret};
use crate::store::KubeStore;

pub use initialization::{initialize, summarize_existing_sources, InitializationResult};
pub use watch_loop::run_watch_loop;

/// Run every enabled controller until shutdown
pub async fn run(init: InitializationResult) -> Result<()> {
    let (enable_configs, enable_secrets) = {
        let config = init.controller_config.read().await;
        (config.enable_global_configs, config.enable_global_secrets)
    };

    let mut controllers: Vec<BoxFuture<'static, Result<()>>> = Vec::new();
    if enable_configs {
        summarize_existing_sources::<GlobalConfig>(&init.client, "GlobalConfig").await;
        controllers.push(spawn_kind::<ConfigMapKind>(&init));
    } else {
        info!("GlobalConfig controller disabled");
    }
    if enable_secrets {
        summarize_existing_sources::<GlobalSecret>(&init.client, "GlobalSecret").await;
        controllers.push(spawn_kind::<SecretKind>(&init));
    } else {
        info!("GlobalSecret controller disabled");
    }

    if controllers.is_empty() {
        warn!("No controllers enabled, nothing to do");
        return Ok(());
    }

    future::try_join_all(controllers).await?;
    Ok(())
}

fn spawn_kind<K: ArtifactKind>(init: &InitializationResult) -> BoxFuture<'static, Result<()>>
where
    KubeStore: crate::store::SourceStore<K::Source> + crate::store::ArtifactStore<K::Object>,
{
    let reconciler = Arc::new(Reconciler::<K>::new(
        KubeStore::new(init.client.clone()),
        Arc::clone(&init.controller_config),
    ));
    run_watch_loop::<K>(
        init.client.clone(),
        reconciler,
        Arc::clone(&init.server_state),
        Arc::clone(&init.controller_config),
    )
    .boxed()
}
