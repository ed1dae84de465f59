//! Face counter configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ::config::{Config, Environment, File};
use heatmap_decoder::DecoderConfig;

use crate::CounterError;

/// Environment variable prefix, e.g. `FACE_COUNTER__API_PORT=8001`
pub const ENV_PREFIX: &str = "FACE_COUNTER";

/// Face counter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// API bind host
    pub api_host: String,

    /// API bind port
    pub api_port: u16,

    /// Heatmap model (ONNX). Without one the detector counts nothing.
    pub model_path: Option<PathBuf>,

    /// Camera identifier reported with each count
    pub camera_id: u32,

    /// Minimum time between two published counts (seconds)
    pub publish_interval_secs: f64,

    /// Delay between frames (milliseconds)
    pub frame_interval_ms: u64,

    /// Heatmap decoding
    pub decoder: DecoderConfig,

    /// Remote face-count endpoint to publish to; counts go straight into
    /// this process's own API when unset
    pub publish_url: Option<String>,

    pub log_level: String,
    pub log_json: bool,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            api_host: "127.0.0.1".to_string(),
            api_port: 8000,
            model_path: None,
            camera_id: 0,
            publish_interval_secs: 1.0,
            frame_interval_ms: 100,
            decoder: DecoderConfig::default(),
            publish_url: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl CounterConfig {
    /// Load from an optional TOML file, then `FACE_COUNTER__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, CounterError> {
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
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CounterError> {
        let representable = Duration::try_from_secs_f64(self.publish_interval_secs).is_ok();
        if !representable || self.publish_interval_secs <= 0.0 {
            return Err(CounterError::Config(format!(
                "publish_interval_secs must be a positive number of seconds, got {}",
                self.publish_interval_secs
            )));
        }
        if !self.decoder.threshold.is_finite() {
            return Err(CounterError::Config("decoder.threshold must be finite".to_string()));
        }
        if self.decoder.box_size == 0 {
            return Err(CounterError::Config("decoder.box_size must be positive".to_string()));
        }
        Ok(())
    }

    /// `host:port` the API binds to
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs_f64(self.publish_interval_secs)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CounterConfig::default();
        assert_eq!(config.api_addr(), "127.0.0.1:8000");
        assert_eq!(config.publish_interval(), Duration::from_secs(1));
        assert_eq!(config.decoder.threshold, 0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        let config = CounterConfig {
            publish_interval_secs: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CounterError::Config(_))));

        let config = CounterConfig {
            publish_interval_secs: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = CounterConfig {
            publish_interval_secs: 1e20,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("face-counter-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "api_port = 8100\ncamera_id = 2\n\n[decoder]\nthreshold = 0.7\n",
        )
        .unwrap();

        let config = CounterConfig::load(Some(&path)).unwrap();
        assert_eq!(config.api_port, 8100);
        assert_eq!(config.camera_id, 2);
        assert_eq!(config.decoder.threshold, 0.7);
        assert_eq!(config.decoder.box_size, 100);
        assert_eq!(config.api_host, "127.0.0.1");

        std::fs::remove_file(&path).unwrap();
    }
}
