// events2chart-config - Unified configuration for all binaries
//
// Supports configuration from multiple sources:
// 1. Environment variables (EVENTS2CHART_* prefix, highest priority)
// 2. Config file path from EVENTS2CHART_CONFIG env var
// 3. Config file contents from EVENTS2CHART_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.events2chart.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use events2chart_core::MetricSpec;

mod env;
mod sources;
mod validation;

pub use env::EnvSource;

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub poller: PollerConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

/// Analytics backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Field name the backend uses to order events in time.
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_timestamp_field() -> String {
    "timestamp".to_string()
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            base_url: None,
            project_id: None,
            write_key: None,
            read_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            timestamp_field: default_timestamp_field(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// HTTP analytics API (write/read key authenticated).
    Http,
    /// In-process backend for local runs and tests.
    Memory,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Http => write!(f, "http"),
            BackendKind::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "http" | "api" => Ok(BackendKind::Http),
            "memory" | "mem" => Ok(BackendKind::Memory),
            _ => anyhow::bail!("Unsupported backend kind: {}. Supported: http, memory", s),
        }
    }
}

/// Queue worker and claim-reaper tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    pub max_attempts: u32,
    pub idle_backoff_ms: u64,
    pub liveness_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl QueueConfig {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn liveness_timeout(&self) -> Duration {
        Duration::from_secs(self.liveness_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            idle_backoff_ms: 500,
            liveness_timeout_secs: 60,
            sweep_interval_secs: 15,
        }
    }
}

/// Cache poller cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    pub interval_secs: u64,
    pub ingestion_delay_secs: u64,
}

impl PollerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn ingestion_delay(&self) -> Duration {
        Duration::from_secs(self.ingestion_delay_secs)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            ingestion_delay_secs: 30,
        }
    }
}

/// Stream assembler tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub history_size: usize,
    pub wait_backoff_secs: u64,
}

impl StreamConfig {
    pub fn wait_backoff(&self) -> Duration {
        Duration::from_secs(self.wait_backoff_secs)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            history_size: 60,
            wait_backoff_secs: 2,
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            queue: QueueConfig::default(),
            poller: PollerConfig::default(),
            stream: StreamConfig::default(),
            metrics: Vec::new(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI --config flag)
    pub fn load_from_file_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
