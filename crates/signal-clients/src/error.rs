//! Signal Client Error Types

use std::time::Duration;
use thiserror::Error;

/// Errors raised at a signal client boundary
#[derive(Debug, Error)]
pub enum SignalError {
    /// Connection refused, DNS failure, broken pipe
    #[error("Transport error: {0}")]
    Transport(String),

    /// No response within the configured bound
    #[error("Timeout after {0}ms")]
    Timeout(u64),

    /// Non-success HTTP status
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    /// Body could not be parsed into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Source answered but reported no usable data
    #[error("Source rejected request: {0}")]
    Rejected(String),

    /// Brightness command failed
    #[error("Actuator error: {0}")]
    Actuator(String),

    /// Actuator not available on this platform
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl SignalError {
    /// Classify a reqwest failure, reporting timeouts against `timeout`
    pub(crate) fn from_http(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            SignalError::Timeout(timeout.as_millis() as u64)
        } else if let Some(status) = err.status() {
            SignalError::Status(status.as_u16())
        } else if err.is_decode() {
            SignalError::Decode(err.to_string())
        } else {
            SignalError::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for SignalError {
    fn from(err: std::io::Error) -> Self {
        SignalError::Actuator(err.to_string())
    }
}

impl From<serde_json::Error> for SignalError {
    fn from(err: serde_json::Error) -> Self {
        SignalError::Decode(err.to_string())
    }
}
