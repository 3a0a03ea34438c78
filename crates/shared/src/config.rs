//! Configuration types for baserepo

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Which tracer backend the process wires into its repositories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryExporter {
    /// Spans become `tracing` spans handled by the installed subscriber
    #[default]
    Tracing,
    /// Spans are collected in memory
    Recording,
    /// Spans are discarded
    None,
}

/// Telemetry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelemetryConfig {
    /// Service name attached to every span
    pub service_name: String,

    /// Span name prefix (`<component>.<operation>`)
    pub component: String,

    /// Filter directive used when `RUST_LOG` is not set
    pub log_filter: String,

    pub exporter: TelemetryExporter,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "baserepo".to_string(),
            component: "repository".to_string(),
            log_filter: "info".to_string(),
            exporter: TelemetryExporter::default(),
        }
    }
}

/// In-memory store settings
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreConfig {
    /// Simulated latency applied to every store operation
    pub latency_ms: Option<u64>,
}

impl StoreConfig {
    pub fn latency(&self) -> Option<Duration> {
        self.latency_ms.map(Duration::from_millis)
    }
}

/// Top-level configuration file format (`baserepo.json` / `baserepo.yaml`)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BaseRepoConfig {
    pub telemetry: TelemetryConfig,
    pub store: StoreConfig,
}

impl BaseRepoConfig {
    /// Load configuration from a JSON or YAML file, chosen by extension
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}
