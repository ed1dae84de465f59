//! Signal Clients
//!
//! Thin clients for the independently-polled signals the privacy guard
//! combines, plus the display brightness actuator:
//! - Face-count source (latest published count, last write wins)
//! - Browser-snapshot source (latest tab event from the central server)
//! - Sensitivity-verdict source (OpenAI-compatible chat completion)
//! - Brightness actuators (WMI via PowerShell, Linux sysfs backlight, simulated)
//!
//! Every call returns `Result<_, SignalError>`. Converting a failure into a
//! safe default is left to the caller, which does it exactly once.

mod brightness;
mod browser;
mod error;
mod face_count;
mod logging;
mod sensitivity;

pub use brightness::{
    create_actuator, ActuatorKind, PowerShellBrightness, SimulatedBrightness, SysfsBacklight,
};
pub use browser::{snapshot_from_envelope, BrowserDataClient, BrowserSnapshot};
pub use error::SignalError;
pub use face_count::{FaceCountClient, FaceCountReading};
pub use logging::init_logging;
pub use sensitivity::{verdict_from_answer, SensitivityChecker};

use async_trait::async_trait;

/// Source of the latest published face count.
///
/// The value is whatever the counting process wrote last; there is no
/// ordering guarantee between reads, and a stale read is possible.
#[async_trait]
pub trait FaceCountSource: Send + Sync {
    async fn face_count(&self) -> Result<FaceCountReading, SignalError>;
}

/// Source of the most recently observed browser tab content
#[async_trait]
pub trait BrowserSource: Send + Sync {
    async fn snapshot(&self) -> Result<BrowserSnapshot, SignalError>;
}

/// Judges whether page content is sensitive
#[async_trait]
pub trait SensitivityOracle: Send + Sync {
    async fn is_sensitive(&self, content: &str, url: &str) -> Result<bool, SignalError>;
}

/// Display brightness control, in percent (0-100)
#[async_trait]
pub trait BrightnessActuator: Send + Sync {
    /// Current brightness
    async fn get(&self) -> Result<u8, SignalError>;

    /// Set brightness; values above 100 are clamped
    async fn set(&self, percent: u8) -> Result<(), SignalError>;
}
