//! # Initialization
//!
//! Controller initialization logic including rustls setup, tracing, metrics,
//! server startup, configuration hot-reload and Kubernetes client setup.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::{Client, ResourceExt};
use tracing::{error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{
    create_shared_config, start_configmap_watch, ControllerConfig, SharedControllerConfig,
    SharedServerConfig,
};
use crate::controller::server::{start_server, ServerState};
use crate::crd::SourceObject;
use crate::observability;

/// Initialization result containing all necessary components for the controllers
pub struct InitializationResult {
    /// Kubernetes client
    pub client: Client,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    /// Shared controller configuration (hot-reloadable)
    pub controller_config: SharedControllerConfig,
    /// Shared server configuration (hot-reloadable)
    pub server_config: SharedServerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_listening", &self.server_state.is_listening())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - ConfigMap watch for hot-reloadable settings
/// - Shutdown signal handling
pub async fn initialize() -> Result<InitializationResult> {
    // Must happen before any TLS connection; an already installed provider is fine
    let _ = rustls::crypto::ring::default_provider().install_default();

    let (controller_config, server_config) = create_shared_config();
    {
        let config = controller_config.read().await;
        init_tracing(&config)?;
    }

    info!("Starting Global Config Controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics().context("Failed to register metrics")?;

    let server_state = Arc::new(ServerState::default());
    let server_port = server_config.read().await.metrics_port;

    let server_state_clone = Arc::clone(&server_state);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Probes must be answerable before the first reconciliation
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let (namespace, config_map_name) = {
        let config = controller_config.read().await;
        (
            config.controller_namespace.clone(),
            config.config_map_name.clone(),
        )
    };
    info!(
        "Hot-reload enabled: watching ConfigMap '{}' in namespace '{}'",
        config_map_name, namespace
    );
    start_configmap_watch(
        client.clone(),
        &namespace,
        &config_map_name,
        Arc::clone(&controller_config),
        Arc::clone(&server_config),
    );

    spawn_shutdown_handler(Arc::clone(&server_state));

    info!("Controller initialized, starting watch loops...");

    Ok(InitializationResult {
        client,
        server_state,
        controller_config,
        server_config,
    })
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `LOG_LEVEL`; `LOG_FORMAT=json` switches to structured output.
fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "global_config_controller={}",
            config.log_level.to_lowercase()
        ))
    });

    let result = if config.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &SharedServerConfig,
) -> Result<()> {
    let (startup_timeout, poll_interval) = {
        let config = server_config.read().await;
        (config.startup_timeout(), config.poll_interval())
    };
    let start_time = std::time::Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_listening() {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// Fail readiness on SIGINT and stop the watch loops from restarting
fn spawn_shutdown_handler(server_state: Arc<ServerState>) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal, stopping controllers...");
                server_state.begin_shutdown();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });
}

/// Log the sources that exist at startup, grouped by namespace
///
/// The controllers reconcile every listed source on their first watch event,
/// so this only gives operators a picture of what is about to happen.
pub async fn summarize_existing_sources<S: SourceObject>(client: &Client, kind: &str) {
    let span = info_span!("controller.startup.summary", resource.kind = kind);
    let _guard = span.enter();

    let api: Api<S> = Api::all(client.clone());
    let list = match api.list(&ListParams::default()).await {
        Ok(list) => list,
        Err(e) => {
            error!("{} CRD is not queryable; {}. Is the CRD installed?", kind, e);
            warn!("Continuing despite CRD queryability check failure - controller will retry");
            return;
        }
    };

    if list.items.is_empty() {
        info!("No existing {} resources found, watch will pick up new resources", kind);
        return;
    }

    let mut by_namespace: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for item in &list.items {
        by_namespace
            .entry(item.namespace().unwrap_or_default())
            .or_default()
            .push(item.name_any());
    }

    info!("Startup Resource Summary");
    info!("Resource Kind: {}", kind);
    info!("Total Resources: {}", list.items.len());
    info!("Namespaces: {}", by_namespace.len());
    for (namespace, names) in &mut by_namespace {
        names.sort();
        info!("Namespace: {}", namespace);
        info!("  Resources ({}): {}", names.len(), abbreviate(names));
    }
}

/// Join up to three names, then summarize the rest
fn abbreviate(names: &[String]) -> String {
    match names.get(..3) {
        Some(head) if names.len() > 3 => format!("{}, ... ({} total)", head.join(", "), names.len()),
        _ => names.join(", "),
    }
}
