//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `dusthub.toml` in the working directory (or the file named by
//! `DUSTHUB_CONFIG`). Every field has a sensible default so the file is
//! optional; without it the daemon starts with an empty topology.
//! Environment variables take precedence over file values.

use std::time::Duration;

use serde::Deserialize;

use dusthub_app::services::IdentifySettings;
use dusthub_domain::error::ValidationError;
use dusthub_domain::sensor::SensorSettings;
use dusthub_domain::topology::Topology;

const DEFAULT_PATH: &str = "dusthub.toml";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Control loop timing.
    pub control: ControlConfig,
    /// Tuning applied to sensors that do not override it.
    pub sensor_defaults: SensorSettings,
    /// Boards and devices (`[[boards]]`, `[[sensors]]`, ...).
    #[serde(flatten)]
    pub topology: Topology,
}

/// HTTP listener configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// TCP port.
    pub port: u16,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Control loop configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Period of the orchestrator tick.
    pub tick_interval_ms: u64,
    /// Delay between a servo move and releasing its PWM output.
    pub gate_settle_ms: u64,
    /// Grace period granted to each background task on shutdown.
    pub shutdown_timeout_secs: u64,
    /// Back-and-forth moves of an identify sweep.
    pub identify_sweeps: u32,
    /// Pending manual commands before callers wait.
    pub command_capacity: usize,
    /// Events buffered per live-stream subscriber.
    pub event_capacity: usize,
}

impl Config {
    /// Load configuration from `dusthub.toml` (or `DUSTHUB_CONFIG`, if set)
    /// then apply environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("DUSTHUB_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = Self::from_file(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path, "no configuration file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(val) = var("DUSTHUB_HOST") {
            self.server.host = val;
        }
        if let Some(val) = var("DUSTHUB_PORT")
            && let Ok(port) = val.parse()
        {
            self.server.port = port;
        }
        if let Some(val) = var("DUSTHUB_BIND")
            && let Some((host, port)) = val.rsplit_once(':')
        {
            self.server.host = host.to_string();
            if let Ok(port) = port.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = var("DUSTHUB_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("port must be non-zero".to_string()));
        }
        if self.control.tick_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "tick_interval_ms must be non-zero".to_string(),
            ));
        }
        if self.control.event_capacity == 0 {
            return Err(ConfigError::Validation(
                "event_capacity must be non-zero".to_string(),
            ));
        }
        if let Some(board) = self
            .topology
            .boards
            .iter()
            .find(|board| !(board.sample_rate_hz.is_finite() && board.sample_rate_hz > 0.0))
        {
            return Err(ConfigError::Validation(format!(
                "board {} needs a positive sample_rate_hz",
                board.id
            )));
        }
        self.sensor_defaults.validate()?;
        self.topology.validate(&self.sensor_defaults)?;
        Ok(())
    }

    /// Return the `host:port` bind address.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ControlConfig {
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    #[must_use]
    pub fn gate_settle(&self) -> Duration {
        Duration::from_millis(self.gate_settle_ms)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    #[must_use]
    pub fn identify(&self) -> IdentifySettings {
        IdentifySettings {
            sweeps: self.identify_sweeps,
            ..IdentifySettings::default()
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "dusthubd=info,dusthub_app=info,dusthub_adapter_virtual=info,tower_http=debug"
                .to_string(),
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            gate_settle_ms: 100,
            shutdown_timeout_secs: 5,
            identify_sweeps: 20,
            command_capacity: 16,
            event_capacity: 256,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Invalid sensor settings or topology.
    #[error("invalid topology")]
    Topology(#[from] ValidationError),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
