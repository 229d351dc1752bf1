//! # ConfigMap Watch
//!
//! Watches the controller ConfigMap and hot-reloads configuration.

use std::collections::BTreeMap;

use futures::{pin_mut, StreamExt};
use k8s_openapi::api::core::v1::ConfigMap;
use kube::Api;
use kube_runtime::watcher;
use tracing::{error, info, warn};

use crate::config::{ControllerConfig, ServerConfig, SharedControllerConfig, SharedServerConfig};

/// Start watching for ConfigMap changes and hot-reload configuration
///
/// Watches the named ConfigMap in the controller namespace. Changes are picked
/// up by the next reconciliation; the HTTP port only applies after a restart.
pub fn start_configmap_watch(
    client: kube::Client,
    namespace: &str,
    configmap_name: &str,
    controller_config: SharedControllerConfig,
    server_config: SharedServerConfig,
) {
    let namespace = namespace.to_string();
    let configmap_name = configmap_name.to_string();
    tokio::spawn(async move {
        let configmaps: Api<ConfigMap> = Api::namespaced(client, &namespace);

        info!(
            "Starting watch for ConfigMap '{}' in namespace '{}'",
            configmap_name, namespace
        );

        let watcher_config =
            watcher::Config::default().fields(&format!("metadata.name={configmap_name}"));
        let stream = watcher(configmaps, watcher_config);
        pin_mut!(stream);

        while let Some(event_result) = stream.next().await {
            match event_result {
                Ok(watcher::Event::Apply(configmap) | watcher::Event::InitApply(configmap)) => {
                    info!("ConfigMap '{}' changed, reloading configuration", configmap_name);
                    apply_configmap_data(
                        configmap.data.as_ref(),
                        |key| std::env::var(key).ok(),
                        &controller_config,
                        &server_config,
                    )
                    .await;
                }
                Ok(watcher::Event::Delete(_)) => {
                    warn!(
                        "ConfigMap '{}' was deleted, reverting to environment defaults",
                        configmap_name
                    );
                    apply_configmap_data(
                        None,
                        |key| std::env::var(key).ok(),
                        &controller_config,
                        &server_config,
                    )
                    .await;
                }
                Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
                Err(e) => {
                    // The watcher retries on its own
                    error!("Error watching ConfigMap: {}", e);
                }
            }
        }

        warn!("ConfigMap watch stream ended");
    });
}

/// Build configuration from ConfigMap data layered over the environment
///
/// ConfigMap keys are upper-cased so `namespace_concurrency` and
/// `NAMESPACE_CONCURRENCY` are equivalent.
#[must_use]
pub fn reload_from_configmap(
    data: Option<&BTreeMap<String, String>>,
    env: impl Fn(&str) -> Option<String>,
) -> (ControllerConfig, ServerConfig) {
    let overrides: BTreeMap<String, String> = data
        .into_iter()
        .flatten()
        .map(|(key, value)| (key.to_uppercase(), value.clone()))
        .collect();
    let lookup = |key: &str| overrides.get(key).cloned().or_else(|| env(key));
    (
        ControllerConfig::from_lookup(&lookup),
        ServerConfig::from_lookup(&lookup),
    )
}

/// Replace the shared configuration with one rebuilt from ConfigMap data
///
/// Startup-only settings keep their running values.
pub async fn apply_configmap_data(
    data: Option<&BTreeMap<String, String>>,
    env: impl Fn(&str) -> Option<String>,
    controller_config: &SharedControllerConfig,
    server_config: &SharedServerConfig,
) {
    let (mut new_controller_config, new_server_config) = reload_from_configmap(data, env);

    {
        let mut config = controller_config.write().await;
        new_controller_config.retain_startup_settings(&config);
        if *config == new_controller_config {
            return;
        }
        *config = new_controller_config.clone();
    }
    {
        let mut config = server_config.write().await;
        *config = new_server_config;
    }

    info!(
        namespace_concurrency = new_controller_config.namespace_concurrency,
        secret_resync_secs = new_controller_config.secret_resync_interval_secs,
        reconcile_timeout_secs = new_controller_config.reconcile_timeout_secs,
        "✅ Configuration reloaded"
    );
}
