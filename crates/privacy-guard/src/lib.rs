//! Privacy Guard
//!
//! Dims the display while more than one person is looking at sensitive
//! content, and restores it afterwards:
//! - Signal hub that turns every signal failure into a safe default
//! - Decision engine with hysteresis over Normal / Dimmed
//! - Fixed-cadence poll loop with cooperative cancellation
//!
//! A dependency outage degrades to "never dims"; nothing in a cycle is fatal.

pub mod config;
pub mod engine;
pub mod poll_loop;
pub mod signals;

pub use config::GuardConfig;
pub use engine::{Actuation, CycleOutcome, Decision, DecisionEngine, GuardState, Reason, Verdict};
pub use poll_loop::{PollLoop, PollSummary};
pub use signals::{SensitivityCheck, SignalHub, Signals};

pub use signal_clients::init_logging;

use std::net::SocketAddr;
use thiserror::Error;
use tracing::info;

use signal_clients::SignalError;

/// Privacy guard error types
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Brightness actuation failed: {0}")]
    Actuation(#[source] SignalError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metrics exporter failed: {0}")]
    Metrics(String),
}

impl From<::config::ConfigError> for GuardError {
    fn from(err: ::config::ConfigError) -> Self {
        GuardError::Config(err.to_string())
    }
}

/// Serve Prometheus metrics on `addr` (`/metrics`)
pub fn init_metrics(addr: SocketAddr) -> Result<(), GuardError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| GuardError::Metrics(e.to_string()))?;
    info!("Prometheus metrics exporter listening on {}", addr);
    Ok(())
}
