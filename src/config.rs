//! Composition-root configuration.
//!
//! Picks the history capacity and which sink the service reports to. The
//! service itself never looks at the environment; whoever builds it reads a
//! [`ServiceConfig`] (from defaults, JSON or environment variables) and calls
//! [`ErrorLogService::from_config`](crate::ErrorLogService::from_config).

use std::env;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::DEFAULT_CAPACITY;
use crate::logging::DEFAULT_MAX_FIELD_LEN;
use crate::sink::{ConsoleSink, ErrorSink, NoopSink, TelemetrySink};

pub const ENV_MODE: &str = "FSM_ERROR_LOG_MODE";
pub const ENV_CAPACITY: &str = "FSM_ERROR_LOG_CAPACITY";
pub const ENV_TELEMETRY_ENDPOINT: &str = "FSM_ERROR_LOG_TELEMETRY_ENDPOINT";

/// Endpoint used by the telemetry stub when none is configured.
pub const DEFAULT_TELEMETRY_ENDPOINT: &str = "stub://telemetry";

/// Error type for configuration loading and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// History must hold at least one record.
    #[error("history capacity must be at least 1")]
    ZeroCapacity,
    /// Unrecognized run mode.
    #[error("invalid run mode '{0}' (expected development, production or silent)")]
    InvalidMode(String),
    /// A numeric variable did not parse.
    #[error("invalid value for {key}: '{value}'")]
    InvalidNumber { key: &'static str, value: String },
    /// Telemetry endpoint set but blank.
    #[error("telemetry endpoint must not be empty")]
    EmptyEndpoint,
    /// Malformed JSON configuration.
    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Which side channel the service uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Human-readable diagnostics through `tracing`
    #[default]
    Development,
    /// Hand records to the telemetry sink
    Production,
    /// Record history only
    Silent,
}

impl FromStr for RunMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "silent" | "test" | "none" => Ok(Self::Silent),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

/// Remote collector settings for [`RunMode::Production`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub endpoint: String,
    /// Payloads queued before new ones are dropped
    pub outbox_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_TELEMETRY_ENDPOINT.to_string(),
            outbox_capacity: 256,
        }
    }
}

/// Settings for constructing an [`ErrorLogService`](crate::ErrorLogService).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub history_capacity: usize,
    pub mode: RunMode,
    pub telemetry: TelemetryConfig,
    /// Per-field bound for console output
    pub max_field_len: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_CAPACITY,
            mode: RunMode::default(),
            telemetry: TelemetryConfig::default(),
            max_field_len: DEFAULT_MAX_FIELD_LEN,
        }
    }
}

impl ServiceConfig {
    /// Defaults overridden by `FSM_ERROR_LOG_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(mode) = lookup(ENV_MODE) {
            config.mode = mode.parse()?;
        }
        if let Some(raw) = lookup(ENV_CAPACITY) {
            config.history_capacity = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
                key: ENV_CAPACITY,
                value: raw.clone(),
            })?;
        }
        if let Some(endpoint) = lookup(ENV_TELEMETRY_ENDPOINT) {
            config.telemetry.endpoint = endpoint;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document. Missing keys take defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.mode == RunMode::Production && self.telemetry.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        Ok(())
    }

    /// Sink matching the run mode.
    pub fn build_sink(&self) -> Arc<dyn ErrorSink> {
        match self.mode {
            RunMode::Development => Arc::new(ConsoleSink::new().with_max_field_len(self.max_field_len)),
            RunMode::Production => Arc::new(TelemetrySink::new(
                self.telemetry.endpoint.clone(),
                self.telemetry.outbox_capacity,
            )),
            RunMode::Silent => Arc::new(NoopSink),
        }
    }
}
