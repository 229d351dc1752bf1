//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::time::Duration;

use tracing::warn;

use super::{parse_bool_or_default, parse_or_default, ReconcileSettings};
use crate::constants::*;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Keys of the controller ConfigMap take precedence over the environment on hot-reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Exponential backoff starting value for watch restarts (milliseconds)
    pub backoff_start_ms: u64,
    /// Exponential backoff maximum value for watch restarts (milliseconds)
    pub backoff_max_ms: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// Watch stream restart delay after stream ends (seconds)
    pub watch_restart_delay_after_end_secs: u64,
    /// Namespace where the controller is deployed
    pub controller_namespace: String,
    /// Name of the ConfigMap holding hot-reloadable settings
    pub config_map_name: String,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Run the `GlobalConfig` controller
    pub enable_global_configs: bool,
    /// Run the `GlobalSecret` controller
    pub enable_global_secrets: bool,
    /// Periodic re-assertion of `GlobalConfig` sources (seconds, 0 disables)
    pub config_resync_interval_secs: u64,
    /// Periodic re-assertion of `GlobalSecret` sources (seconds, 0 disables)
    pub secret_resync_interval_secs: u64,
    /// Upper bound for one reconciliation invocation (seconds)
    pub reconcile_timeout_secs: u64,
    /// Namespaces converged concurrently within one invocation
    pub namespace_concurrency: usize,
    /// Reload-and-retry attempts after a source update conflict
    pub max_conflict_retries: u32,
    /// Requeue interval after a terminal error (seconds)
    pub terminal_error_requeue_secs: u64,
    /// Finalizer guarding source deletion (startup only, see `retain_startup_settings`)
    pub finalizer_name: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup with defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let str_or = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Self {
            backoff_start_ms: parse_or_default(lookup("BACKOFF_START_MS"), DEFAULT_BACKOFF_START_MS),
            backoff_max_ms: parse_or_default(lookup("BACKOFF_MAX_MS"), DEFAULT_BACKOFF_MAX_MS),
            watch_restart_delay_secs: parse_or_default(
                lookup("WATCH_RESTART_DELAY_SECS"),
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            watch_restart_delay_after_end_secs: parse_or_default(
                lookup("WATCH_RESTART_DELAY_AFTER_END_SECS"),
                DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS,
            ),
            controller_namespace: str_or("POD_NAMESPACE", DEFAULT_CONTROLLER_NAMESPACE),
            config_map_name: str_or("CONFIG_MAP_NAME", DEFAULT_CONFIG_MAP_NAME),
            log_level: str_or("LOG_LEVEL", "INFO"),
            log_format: str_or("LOG_FORMAT", "json"),
            enable_global_configs: parse_bool_or_default(lookup("ENABLE_GLOBAL_CONFIGS"), true),
            enable_global_secrets: parse_bool_or_default(lookup("ENABLE_GLOBAL_SECRETS"), true),
            config_resync_interval_secs: parse_or_default(
                lookup("CONFIG_RESYNC_INTERVAL_SECS"),
                DEFAULT_CONFIG_RESYNC_INTERVAL_SECS,
            ),
            secret_resync_interval_secs: parse_or_default(
                lookup("SECRET_RESYNC_INTERVAL_SECS"),
                DEFAULT_SECRET_RESYNC_INTERVAL_SECS,
            ),
            reconcile_timeout_secs: parse_or_default(
                lookup("RECONCILE_TIMEOUT_SECS"),
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            ),
            // Zero would stall the drift loop
            namespace_concurrency: parse_or_default(
                lookup("NAMESPACE_CONCURRENCY"),
                DEFAULT_NAMESPACE_CONCURRENCY,
            )
            .max(1),
            max_conflict_retries: parse_or_default(
                lookup("MAX_CONFLICT_RETRIES"),
                DEFAULT_MAX_CONFLICT_RETRIES,
            ),
            terminal_error_requeue_secs: parse_or_default(
                lookup("TERMINAL_ERROR_REQUEUE_SECS"),
                DEFAULT_TERMINAL_ERROR_REQUEUE_SECS,
            ),
            finalizer_name: str_or("FINALIZER_NAME", DEFAULT_FINALIZER),
        }
    }

    /// Snapshot of the settings one reconciliation runs with
    #[must_use]
    pub fn reconcile_settings(&self) -> ReconcileSettings {
        ReconcileSettings {
            finalizer: self.finalizer_name.clone(),
            namespace_concurrency: self.namespace_concurrency,
            config_resync: non_zero_secs(self.config_resync_interval_secs),
            secret_resync: non_zero_secs(self.secret_resync_interval_secs),
            reconcile_timeout: Duration::from_secs(self.reconcile_timeout_secs.max(1)),
            max_conflict_retries: self.max_conflict_retries,
            terminal_error_requeue: Duration::from_secs(self.terminal_error_requeue_secs),
            ..ReconcileSettings::default()
        }
    }

    /// Carry over settings that cannot change while the controller runs
    ///
    /// Sources already hold the running finalizer; only that name is ever
    /// swept and released, so a reloaded name is ignored.
    pub fn retain_startup_settings(&mut self, running: &ControllerConfig) {
        if self.finalizer_name != running.finalizer_name {
            warn!(
                running = %running.finalizer_name,
                requested = %self.finalizer_name,
                "FINALIZER_NAME only applies at startup, keeping the running finalizer"
            );
            self.finalizer_name.clone_from(&running.finalizer_name);
        }
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    /// Get watch restart delay after end duration
    #[must_use]
    pub fn watch_restart_delay_after_end_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_after_end_secs)
    }

    /// Get backoff start duration
    #[must_use]
    pub fn backoff_start_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_start_ms)
    }

    /// Get backoff max duration
    #[must_use]
    pub fn backoff_max_duration(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
