//! # Configuration
//!
//! Controller and server settings loaded from environment variables and
//! hot-reloaded from a ConfigMap.
//!
//! - `controller.rs` - `ControllerConfig`
//! - `server.rs` - `ServerConfig`
//! - `settings.rs` - `ReconcileSettings`, the per-invocation snapshot handed to the reconciler
//! - `watch.rs` - ConfigMap watch driving hot-reload

use std::sync::Arc;

use tokio::sync::RwLock;

mod controller;
mod server;
mod settings;
mod watch;

pub use controller::ControllerConfig;
pub use server::ServerConfig;
pub use settings::ReconcileSettings;
pub use watch::{apply_configmap_data, reload_from_configmap, start_configmap_watch};

/// Controller configuration shared between the watch loop and the ConfigMap watcher
pub type SharedControllerConfig = Arc<RwLock<ControllerConfig>>;

/// Server configuration shared between the HTTP server and the ConfigMap watcher
pub type SharedServerConfig = Arc<RwLock<ServerConfig>>;

/// Load both configurations from the environment and wrap them for sharing
#[must_use]
pub fn create_shared_config() -> (SharedControllerConfig, SharedServerConfig) {
    (
        Arc::new(RwLock::new(ControllerConfig::from_env())),
        Arc::new(RwLock::new(ServerConfig::from_env())),
    )
}

/// Parse a value or fall back to the default
pub(crate) fn parse_or_default<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Parse a boolean flag (`true`, `1`, `yes`, `on`) or fall back to the default
pub(crate) fn parse_bool_or_default(value: Option<String>, default: bool) -> bool {
    value
        .map(|v| {
            let v_lower = v.trim().to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}
