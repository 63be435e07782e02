//! Tuning for the command execution stack.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Timeouts, intervals and limits for one session's cli stack.
///
/// Durations deserialize from seconds given as numbers, e.g.
/// `{"command_timeout": 2.5}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    /// Deadline for a single command.
    #[serde(with = "seconds")]
    pub command_timeout: Duration,

    /// Idle time after which a heartbeat is sent.
    #[serde(with = "seconds")]
    pub heartbeat_interval: Duration,

    /// Deadline for a single heartbeat.
    #[serde(with = "seconds")]
    pub heartbeat_timeout: Duration,

    /// Pause after a failed heartbeat.
    #[serde(with = "seconds")]
    pub backoff_interval: Duration,

    /// Upper bound on waiting for in-flight work during close.
    #[serde(with = "seconds")]
    pub teardown_timeout: Duration,

    /// Longest silence tolerated while waiting for the prompt.
    #[serde(with = "seconds")]
    pub read_timeout: Duration,

    /// Commands the timeout layer lets run concurrently.
    pub worker_concurrency: usize,

    /// Bytes from the end of the buffer searched for the prompt.
    pub search_depth: usize,

    /// Capacity of the whole-response read cache. `None` disables it.
    pub read_cache_capacity: Option<usize>,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(60),
            heartbeat_timeout: Duration::from_secs(10),
            backoff_interval: Duration::from_secs(120),
            teardown_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(120),
            worker_concurrency: 4,
            search_depth: 1000,
            read_cache_capacity: None,
        }
    }
}

impl StackConfig {
    /// Reject settings the stack cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("command_timeout", self.command_timeout),
            ("heartbeat_interval", self.heartbeat_interval),
            ("heartbeat_timeout", self.heartbeat_timeout),
            ("backoff_interval", self.backoff_interval),
            ("read_timeout", self.read_timeout),
        ];
        if let Some((name, _)) = durations.iter().find(|(_, d)| d.is_zero()) {
            return Err(ConfigError::Invalid {
                message: format!("{} must be greater than zero", name),
            });
        }

        if self.worker_concurrency == 0 {
            return Err(ConfigError::Invalid {
                message: "worker_concurrency must be at least 1".to_string(),
            });
        }
        if self.search_depth == 0 {
            return Err(ConfigError::Invalid {
                message: "search_depth must be at least 1".to_string(),
            });
        }
        if self.read_cache_capacity == Some(0) {
            return Err(ConfigError::Invalid {
                message: "read_cache_capacity must be at least 1 when set".to_string(),
            });
        }
        Ok(())
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, de};

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}
