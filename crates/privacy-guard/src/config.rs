//! Privacy guard configuration

use serde::{Deserialize, Serialize};
use signal_clients::ActuatorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use ::config::{Config, Environment, File};

use crate::GuardError;

/// Environment variable prefix, e.g. `PRIVACY_GUARD__INTERVAL_SECS=5`
pub const ENV_PREFIX: &str = "PRIVACY_GUARD";

/// Privacy guard configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Seconds between decision cycles
    pub interval_secs: f64,

    /// Face-count endpoint
    pub face_api_url: String,

    /// Central server storage base URL
    pub browser_server_url: String,

    /// OpenAI-compatible chat completion endpoint
    pub llm_url: String,

    /// Model (or workspace) name sent to the completion endpoint
    pub llm_model: String,

    /// Bearer token for the completion endpoint
    pub api_token: Option<String>,

    /// Brightness while dimmed (percent)
    pub dimmed_brightness: u8,

    /// Request timeouts (milliseconds)
    pub face_count_timeout_ms: u64,
    pub browser_timeout_ms: u64,
    pub llm_timeout_ms: u64,

    pub actuator: ActuatorKind,

    pub log_level: String,
    pub log_json: bool,

    /// Prometheus listener; no exporter when unset
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2.0,
            face_api_url: "http://127.0.0.1:8000/face-count".to_string(),
            browser_server_url: "http://localhost:3000/api/storage".to_string(),
            llm_url: "http://localhost:3001/api/v1/openai/chat/completions".to_string(),
            llm_model: "default".to_string(),
            api_token: None,
            dimmed_brightness: 30,
            face_count_timeout_ms: 3000,
            browser_timeout_ms: 3000,
            llm_timeout_ms: 10_000,
            actuator: ActuatorKind::Auto,
            log_level: "info".to_string(),
            log_json: false,
            metrics_addr: None,
        }
    }
}

impl GuardConfig {
    /// Load from an optional TOML file, then `PRIVACY_GUARD__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, GuardError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config: Self = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GuardError> {
        let representable = Duration::try_from_secs_f64(self.interval_secs).is_ok();
        if !representable || self.interval_secs <= 0.0 {
            return Err(GuardError::Config(format!(
                "interval_secs must be a positive number of seconds, got {}",
                self.interval_secs
            )));
        }
        if self.dimmed_brightness > 100 {
            return Err(GuardError::Config(format!(
                "dimmed_brightness must be at most 100, got {}",
                self.dimmed_brightness
            )));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs)
    }

    pub fn face_count_timeout(&self) -> Duration {
        Duration::from_millis(self.face_count_timeout_ms)
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_millis(self.browser_timeout_ms)
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }
}
