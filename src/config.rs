//! Queue configuration with TOML loading.
//!
//! Every field has a default, so an empty document is a valid config and a
//! file only needs to name the limits it changes.
//!
//! # Example TOML
//!
//! ```toml
//! max_concurrent_tasks = 8
//! max_tracked_tasks = 200
//! result_retention_secs = 600
//! default_timeout_ms = 60000
//! cleanup_interval_secs = 30
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_MAIN_THREAD_TIMEOUT_MS, DEFAULT_MAX_CONCURRENT_TASKS,
    DEFAULT_MAX_TRACKED_TASKS, DEFAULT_RESULT_RETENTION_SECS, DEFAULT_TICK_INTERVAL_MS,
    DEFAULT_TIMEOUT_MS,
};
use crate::error::ConfigError;

/// Limits and intervals for a [`TaskQueue`](crate::TaskQueue).
///
/// Read-only once the queue is constructed.
///
/// # Defaults
///
/// | Field | Default |
/// |-------|---------|
/// | `max_concurrent_tasks` | 4 |
/// | `max_tracked_tasks` | 100 |
/// | `result_retention_secs` | 300 |
/// | `default_timeout_ms` | 120000 |
/// | `cleanup_interval_secs` | 60 |
/// | `tick_interval_ms` | 1000 |
/// | `main_thread_timeout_ms` | 30000 |
///
/// # Examples
///
/// ```
/// use toolqueue::QueueConfig;
///
/// let config = QueueConfig::from_toml("max_concurrent_tasks = 2").unwrap();
/// assert_eq!(config.max_concurrent_tasks, 2);
/// assert_eq!(config.max_tracked_tasks, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of tasks executing at once.
    pub max_concurrent_tasks: usize,
    /// Maximum number of non-terminal tasks; submissions beyond it are rejected.
    pub max_tracked_tasks: usize,
    /// How long a terminal task stays queryable before eviction.
    pub result_retention_secs: u64,
    /// Timeout applied when a submission does not name one.
    pub default_timeout_ms: u64,
    /// Minimum interval between timeout and retention sweeps.
    pub cleanup_interval_secs: u64,
    /// Upper bound on how long the scheduler sleeps without a wake signal.
    pub tick_interval_ms: u64,
    /// How long a worker waits for a main-thread tool call.
    pub main_thread_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: DEFAULT_MAX_CONCURRENT_TASKS,
            max_tracked_tasks: DEFAULT_MAX_TRACKED_TASKS,
            result_retention_secs: DEFAULT_RESULT_RETENTION_SECS,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            main_thread_timeout_ms: DEFAULT_MAIN_THREAD_TIMEOUT_MS,
        }
    }
}

impl QueueConfig {
    /// Parse a TOML string into a validated [`QueueConfig`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a [`QueueConfig`] from a file path.
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Parse`] if the TOML is malformed, or
    /// [`ConfigError::Validation`] if validation fails.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            source,
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Validate that the limits are usable.
    ///
    /// Checks:
    /// - `max_concurrent_tasks` and `max_tracked_tasks` are positive
    /// - `default_timeout_ms` and `tick_interval_ms` are positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Validation {
                message: "max_concurrent_tasks must be greater than 0".to_string(),
            });
        }
        if self.max_tracked_tasks == 0 {
            return Err(ConfigError::Validation {
                message: "max_tracked_tasks must be greater than 0".to_string(),
            });
        }
        if self.default_timeout_ms == 0 {
            return Err(ConfigError::Validation {
                message: "default_timeout_ms must be greater than 0".to_string(),
            });
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::Validation {
                message: "tick_interval_ms must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    /// Set the concurrency limit.
    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// Set the admission ceiling.
    pub fn with_max_tracked_tasks(mut self, max: usize) -> Self {
        self.max_tracked_tasks = max;
        self
    }

    /// Set the retention window, in seconds.
    pub fn with_result_retention_secs(mut self, secs: u64) -> Self {
        self.result_retention_secs = secs;
        self
    }

    /// Set the default per-task timeout, in milliseconds.
    pub fn with_default_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = ms;
        self
    }

    /// Set the sweep interval, in seconds.
    pub fn with_cleanup_interval_secs(mut self, secs: u64) -> Self {
        self.cleanup_interval_secs = secs;
        self
    }

    /// Set the scheduler tick bound, in milliseconds.
    pub fn with_tick_interval_ms(mut self, ms: u64) -> Self {
        self.tick_interval_ms = ms;
        self
    }

    /// Set the main-thread marshalling timeout, in milliseconds.
    pub fn with_main_thread_timeout_ms(mut self, ms: u64) -> Self {
        self.main_thread_timeout_ms = ms;
        self
    }

    /// Retention window as a [`Duration`].
    pub fn result_retention(&self) -> Duration {
        Duration::from_secs(self.result_retention_secs)
    }

    /// Default per-task timeout as a [`Duration`].
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }

    /// Sweep interval as a [`Duration`].
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Scheduler tick bound as a [`Duration`].
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Main-thread marshalling timeout as a [`Duration`].
    pub fn main_thread_timeout(&self) -> Duration {
        Duration::from_millis(self.main_thread_timeout_ms)
    }
}
