//! Runtime configuration types

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Coordinator settings
    pub coordinator: CoordinatorConfig,

    /// Worker settings
    pub worker: WorkerConfig,

    /// Large-message transport settings
    pub transport: TransportConfig,

    /// Batch input settings
    pub input: InputConfig,
}

impl RuntimeConfig {
    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: RuntimeConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.transport.fragment_size == 0 {
            return Err(Error::InvalidConfig {
                message: "transport.fragment_size must be positive".to_string(),
            });
        }
        if self.input.batch_size == 0 {
            return Err(Error::InvalidConfig {
                message: "input.batch_size must be positive".to_string(),
            });
        }
        if self.coordinator.max_workers == 0 {
            return Err(Error::InvalidConfig {
                message: "coordinator.max_workers must be positive".to_string(),
            });
        }
        if self.worker.heartbeat_interval.is_zero() {
            return Err(Error::InvalidConfig {
                message: "worker.heartbeat_interval must be positive".to_string(),
            });
        }
        if self.coordinator.dead_worker_check_interval.is_zero() {
            return Err(Error::InvalidConfig {
                message: "coordinator.dead_worker_check_interval must be positive".to_string(),
            });
        }
        if self.worker.heartbeat_interval >= self.coordinator.heartbeat_timeout {
            return Err(Error::InvalidConfig {
                message: format!(
                    "worker.heartbeat_interval ({}ms) must be shorter than coordinator.heartbeat_timeout ({}ms)",
                    self.worker.heartbeat_interval.as_millis(),
                    self.coordinator.heartbeat_timeout.as_millis()
                ),
            });
        }
        Ok(())
    }
}

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Address for the HTTP status API
    pub http_bind_address: String,

    /// Maximum number of workers
    pub max_workers: usize,

    /// Worker heartbeat timeout
    #[serde(with = "humantime_serde")]
    pub heartbeat_timeout: Duration,

    /// How often to check for dead workers
    #[serde(with = "humantime_serde")]
    pub dead_worker_check_interval: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            http_bind_address: "0.0.0.0:8080".to_string(),
            max_workers: 10000,
            heartbeat_timeout: Duration::from_secs(30),
            dead_worker_check_interval: Duration::from_secs(5),
        }
    }
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of workers started in the local cluster
    pub local_workers: usize,

    /// Heartbeat interval
    #[serde(with = "humantime_serde")]
    pub heartbeat_interval: Duration,

    /// Number of Tokio runtime threads
    pub runtime_threads: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            local_workers: 4,
            heartbeat_interval: Duration::from_secs(5),
            runtime_threads: 4,
        }
    }
}

/// Large-message transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Maximum fragment size in bytes
    pub fragment_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { fragment_size: 128 }
    }
}

/// Batch input configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// CSV file with one password record per line
    pub path: Option<String>,

    /// Field delimiter
    pub delimiter: char,

    /// Whether the first line is a header
    pub has_headers: bool,

    /// Lines per batch
    pub batch_size: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: ';',
            has_headers: true,
            batch_size: 100,
        }
    }
}

/// Duration serialization helper for human-readable formats
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
