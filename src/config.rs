//! Application configuration.
//!
//! A single typed [`Config`] value loaded once from the environment at
//! startup and threaded explicitly into constructors, rather than a global
//! settings singleton.

use std::path::PathBuf;
use std::time::Duration;

/// Default maximum upload size (500 MiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 500 * 1024 * 1024;

/// Default worker pool size.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 2;

/// Default per-task vision semaphore width.
pub const DEFAULT_MAX_CONCURRENT_DESCRIPTIONS: usize = 5;

/// Default vision attempt bound.
pub const DEFAULT_DESCRIPTION_MAX_RETRIES: u32 = 3;

/// Default vision backoff base, in seconds.
pub const DEFAULT_DESCRIPTION_RETRY_DELAY_SECS: f64 = 1.0;

/// Default webhook per-attempt timeout, in seconds.
pub const DEFAULT_WEBHOOK_TIMEOUT_SECS: f64 = 10.0;

/// Default webhook attempt bound.
pub const DEFAULT_WEBHOOK_MAX_RETRIES: u32 = 3;

/// Default webhook backoff base, in seconds.
pub const DEFAULT_WEBHOOK_RETRY_DELAY_SECS: f64 = 5.0;

/// Default janitor period, in minutes.
pub const DEFAULT_CLEANUP_INTERVAL_MINUTES: u64 = 15;

/// Default retention window, in hours.
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Application configuration, loaded once at startup.
///
/// Mirrors the environment table in spec §6. Every field has the documented
/// default; only `vision_api_key` has no default (absence disables C5).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root for task directories.
    pub data_dir: PathBuf,
    /// `SQLite` database file path.
    pub db_path: PathBuf,
    /// Admission byte ceiling.
    pub max_upload_size: u64,
    /// Worker pool size.
    pub max_concurrent_tasks: usize,
    /// Per-task vision semaphore width.
    pub max_concurrent_descriptions: usize,
    /// Vision attempt bound.
    pub description_max_retries: u32,
    /// Vision backoff base.
    pub description_retry_delay: Duration,
    /// Per-attempt webhook timeout.
    pub webhook_timeout: Duration,
    /// Webhook attempt bound.
    pub webhook_max_retries: u32,
    /// Webhook backoff base.
    pub webhook_retry_delay: Duration,
    /// Janitor sweep period.
    pub cleanup_interval: Duration,
    /// `expires_at` offset from `created_at`.
    pub retention: Duration,
    /// Listener host.
    pub host: String,
    /// Listener port.
    pub port: u16,
    /// Credential enabling the vision describer; absent disables it silently.
    pub vision_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/data"),
            db_path: PathBuf::from("/data/task_db.sqlite"),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            max_concurrent_descriptions: DEFAULT_MAX_CONCURRENT_DESCRIPTIONS,
            description_max_retries: DEFAULT_DESCRIPTION_MAX_RETRIES,
            description_retry_delay: Duration::from_secs_f64(DEFAULT_DESCRIPTION_RETRY_DELAY_SECS),
            webhook_timeout: Duration::from_secs_f64(DEFAULT_WEBHOOK_TIMEOUT_SECS),
            webhook_max_retries: DEFAULT_WEBHOOK_MAX_RETRIES,
            webhook_retry_delay: Duration::from_secs_f64(DEFAULT_WEBHOOK_RETRY_DELAY_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_MINUTES * 60),
            retention: Duration::from_secs((DEFAULT_RETENTION_HOURS * 3600) as u64),
            host: "0.0.0.0".to_string(),
            port: 8000,
            vision_api_key: None,
        }
    }
}

impl Config {
    /// Builds configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_dir = std::env::var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let db_path = std::env::var("DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("task_db.sqlite"));

        Self {
            max_upload_size: env_u64("MAX_UPLOAD_SIZE", defaults.max_upload_size),
            max_concurrent_tasks: env_usize("MAX_CONCURRENT_TASKS", defaults.max_concurrent_tasks),
            max_concurrent_descriptions: env_usize(
                "MAX_CONCURRENT_DESCRIPTIONS",
                defaults.max_concurrent_descriptions,
            ),
            description_max_retries: env_u32(
                "DESCRIPTION_MAX_RETRIES",
                defaults.description_max_retries,
            ),
            description_retry_delay: env_secs(
                "DESCRIPTION_RETRY_DELAY",
                DEFAULT_DESCRIPTION_RETRY_DELAY_SECS,
            ),
            webhook_timeout: env_secs("WEBHOOK_TIMEOUT", DEFAULT_WEBHOOK_TIMEOUT_SECS),
            webhook_max_retries: env_u32("WEBHOOK_MAX_RETRIES", defaults.webhook_max_retries),
            webhook_retry_delay: env_secs("WEBHOOK_RETRY_DELAY", DEFAULT_WEBHOOK_RETRY_DELAY_SECS),
            cleanup_interval: Duration::from_secs(
                env_u64("CLEANUP_INTERVAL_MINUTES", DEFAULT_CLEANUP_INTERVAL_MINUTES) * 60,
            ),
            retention: Duration::from_secs(
                (env_u64("RETENTION_HOURS", DEFAULT_RETENTION_HOURS as u64) * 3600),
            ),
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            vision_api_key: std::env::var("VISION_API_KEY").ok().filter(|s| !s.is_empty()),
            data_dir,
            db_path,
        }
    }

    /// Root directory holding per-task subdirectories (`<data_dir>/tasks`).
    #[must_use]
    pub fn tasks_dir(&self) -> PathBuf {
        self.data_dir.join("tasks")
    }

    /// Directory for a specific task.
    #[must_use]
    pub fn task_dir(&self, task_id: &str) -> PathBuf {
        self.tasks_dir().join(task_id)
    }

    /// Whether the vision describer is configured.
    #[must_use]
    pub fn vision_enabled(&self) -> bool {
        self.vision_api_key.is_some()
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_secs(key: &str, default_secs: f64) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<f64>().ok())
        .map_or_else(|| Duration::from_secs_f64(default_secs), Duration::from_secs_f64)
}
