use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration structure for panelsync
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// External study provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Reminder notification configuration
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Sweep, queue and finalization behaviour
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".panelsync/panelsync.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite:{}", self.path)
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// External study provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderConfig {
    /// Base URL of the provider REST API
    #[serde(default = "default_provider_base_url")]
    pub base_url: String,

    /// API token; usually supplied through `PANELSYNC_PROVIDER__API_TOKEN`
    #[serde(default)]
    pub api_token: Option<String>,

    /// Bound on every single provider call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Client-side rate limit on provider calls
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

fn default_provider_base_url() -> String {
    "https://api.prolific.com/api/v1".to_string()
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_requests_per_minute() -> u32 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_provider_base_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Reminder notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NotificationConfig {
    /// Webhook receiving completion reminders; reminders are only logged when unset
    #[serde(default)]
    pub webhook_url: Option<String>,

    #[serde(default = "default_notification_timeout_secs")]
    pub timeout_secs: u64,
}

const fn default_notification_timeout_secs() -> u64 {
    10
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            timeout_secs: default_notification_timeout_secs(),
        }
    }
}

/// Sweep, queue and finalization behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconcileConfig {
    /// Interval between periodic sweeps (daily by default)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Run a sweep immediately when the daemon starts
    #[serde(default = "default_true")]
    pub run_on_startup: bool,

    /// Tests reconciled concurrently within one sweep
    #[serde(default = "default_max_concurrent_tests")]
    pub max_concurrent_tests: usize,

    /// Enqueue an on-demand check per variation dispatch
    #[serde(default)]
    pub enqueue_on_dispatch: bool,

    /// Generate insights as soon as a test finalizes
    #[serde(default = "default_true")]
    pub generate_insights_on_complete: bool,

    /// How often the queue worker looks for new check jobs
    #[serde(default = "default_worker_poll_interval_secs")]
    pub worker_poll_interval_secs: u64,

    /// Consecutive failed sweeps after which the daemon stops
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,

    /// A running check job untouched for this long is handed out again
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,

    /// Failed check jobs are deleted after this long
    #[serde(default = "default_failed_job_retention_secs")]
    pub failed_job_retention_secs: u64,
}

const fn default_sweep_interval_secs() -> u64 {
    86_400
}

const fn default_true() -> bool {
    true
}

const fn default_max_concurrent_tests() -> usize {
    4
}

const fn default_worker_poll_interval_secs() -> u64 {
    30
}

const fn default_max_consecutive_failures() -> u32 {
    5
}

const fn default_claim_lease_secs() -> u64 {
    600
}

const fn default_failed_job_retention_secs() -> u64 {
    7 * 86_400
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            run_on_startup: true,
            max_concurrent_tests: default_max_concurrent_tests(),
            enqueue_on_dispatch: false,
            generate_insights_on_complete: true,
            worker_poll_interval_secs: default_worker_poll_interval_secs(),
            max_consecutive_failures: default_max_consecutive_failures(),
            claim_lease_secs: default_claim_lease_secs(),
            failed_job_retention_secs: default_failed_job_retention_secs(),
        }
    }
}

impl ReconcileConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_secs(self.worker_poll_interval_secs)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }

    pub fn failed_job_retention(&self) -> Duration {
        Duration::from_secs(self.failed_job_retention_secs)
    }
}
