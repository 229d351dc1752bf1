//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// API group of the `GlobalConfig` and `GlobalSecret` resources
pub const API_GROUP: &str = "globals.octopilot.io";

/// API version of the custom resources, also recorded on every derived artifact
pub const API_VERSION: &str = "v1beta2";

/// Default finalizer guarding source deletion until derived artifacts are swept
pub const DEFAULT_FINALIZER: &str = "globals.octopilot.io/finalizer";

/// Label recording the schema version of the source that produced an artifact
pub const LABEL_OWNER_SCHEMA_VERSION: &str = "globals.octopilot.io/owner-schema-version";

/// Label recording the UID of the source that produced an artifact
pub const LABEL_OWNER_UID: &str = "globals.octopilot.io/owner-uid";

/// Standard managed-by label
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Value of the managed-by label
pub const MANAGED_BY: &str = "global-config-controller";

/// Annotation carrying the version marker (source version token at creation time)
pub const ANNOTATION_SOURCE_VERSION: &str = "globals.octopilot.io/source-version";

/// Annotation carrying the sha256 digest of the artifact content
pub const ANNOTATION_CONTENT_DIGEST: &str = "globals.octopilot.io/content-digest";

/// Annotation pointing back at the source (`namespace/name`)
pub const ANNOTATION_SOURCE: &str = "globals.octopilot.io/source";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Default exponential backoff starting value for watch restarts (milliseconds)
pub const DEFAULT_BACKOFF_START_MS: u64 = 1000;

/// Default exponential backoff maximum value for watch restarts (milliseconds)
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

/// Default delay before restarting watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Default delay before restarting watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_AFTER_END_SECS: u64 = 1;

/// Default periodic re-assertion interval for `GlobalConfig` (0 = event driven only)
pub const DEFAULT_CONFIG_RESYNC_INTERVAL_SECS: u64 = 0;

/// Default periodic re-assertion interval for `GlobalSecret`
pub const DEFAULT_SECRET_RESYNC_INTERVAL_SECS: u64 = 180;

/// Default upper bound for a single reconciliation invocation (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 120;

/// Default number of namespaces converged concurrently within one invocation
pub const DEFAULT_NAMESPACE_CONCURRENCY: usize = 8;

/// Default number of reload-and-retry attempts after an update conflict
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 3;

/// Default requeue interval after a terminal error that needs operator intervention (seconds)
pub const DEFAULT_TERMINAL_ERROR_REQUEUE_SECS: u64 = 600;

/// Requeue interval after an optimistic-concurrency conflict (seconds)
pub const CONFLICT_REQUEUE_SECS: u64 = 1;

/// Default name of the ConfigMap holding hot-reloadable controller settings
pub const DEFAULT_CONFIG_MAP_NAME: &str = "global-config-controller-config";

/// Default controller namespace
pub const DEFAULT_CONTROLLER_NAMESPACE: &str = "octopilot-system";
