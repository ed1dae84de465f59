//! Display Brightness Actuators

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{BrightnessActuator, SignalError};

/// Default timeout for a brightness command
const COMMAND_TIMEOUT_MS: u64 = 5000;

/// Linux backlight class directory
const BACKLIGHT_CLASS_DIR: &str = "/sys/class/backlight";

/// Actuator selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    /// PowerShell on Windows, sysfs backlight on Linux, simulated elsewhere
    #[default]
    Auto,
    #[serde(alias = "wmi")]
    PowerShell,
    Sysfs,
    Simulated,
}

/// Build the actuator for `kind`.
///
/// `Auto` falls back to a simulated display when the platform has no
/// supported control; explicit kinds fail instead.
pub async fn create_actuator(
    kind: ActuatorKind,
) -> Result<Box<dyn BrightnessActuator>, SignalError> {
    match kind {
        ActuatorKind::PowerShell => Ok(Box::new(PowerShellBrightness::new())),
        ActuatorKind::Sysfs => Ok(Box::new(SysfsBacklight::discover().await?)),
        ActuatorKind::Simulated => Ok(Box::new(SimulatedBrightness::new(100))),
        ActuatorKind::Auto => {
            if cfg!(windows) {
                return Ok(Box::new(PowerShellBrightness::new()));
            }
            match SysfsBacklight::discover().await {
                Ok(backlight) => Ok(Box::new(backlight)),
                Err(e) => {
                    warn!("No brightness control available ({}), using simulated display", e);
                    Ok(Box::new(SimulatedBrightness::new(100)))
                }
            }
        }
    }
}

/// Windows WMI brightness via PowerShell
pub struct PowerShellBrightness {
    timeout: Duration,
}

impl PowerShellBrightness {
    pub fn new() -> Self {
        info!("Using PowerShell WMI brightness control");
        Self {
            timeout: Duration::from_millis(COMMAND_TIMEOUT_MS),
        }
    }

    async fn run(&self, script: &str) -> Result<String, SignalError> {
        let mut command = Command::new("powershell");
        command.args(["-NoProfile", "-Command", script]);
        let output = output_within(command, self.timeout).await?;

        if !output.status.success() {
            return Err(SignalError::Actuator(format!(
                "powershell exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for PowerShellBrightness {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrightnessActuator for PowerShellBrightness {
    async fn get(&self) -> Result<u8, SignalError> {
        let stdout = self
            .run("(Get-WmiObject -Namespace root/WMI -Class WmiMonitorBrightness).CurrentBrightness")
            .await?;
        parse_percent(&stdout)
    }

    async fn set(&self, percent: u8) -> Result<(), SignalError> {
        let percent = percent.min(100);
        let script = format!(
            "(Get-WmiObject -Namespace root/WMI -Class WmiMonitorBrightnessMethods).WmiSetBrightness(1, {})",
            percent
        );
        self.run(&script).await?;
        debug!("WMI brightness set to {}%", percent);
        Ok(())
    }
}

/// Run `command` to completion, killing it if `timeout` elapses first
async fn output_within(
    mut command: Command,
    timeout: Duration,
) -> Result<std::process::Output, SignalError> {
    command.kill_on_drop(true);
    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| SignalError::Timeout(timeout.as_millis() as u64))??;
    Ok(output)
}

/// First line of command output as a percentage
fn parse_percent(stdout: &str) -> Result<u8, SignalError> {
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| SignalError::Decode("empty brightness output".to_string()))?;
    line.parse::<u8>()
        .map(|v| v.min(100))
        .map_err(|e| SignalError::Decode(format!("brightness '{}': {}", line, e)))
}

/// Linux backlight via `/sys/class/backlight/<device>`
pub struct SysfsBacklight {
    device: PathBuf,
}

impl SysfsBacklight {
    /// Use a specific backlight device directory
    pub fn new(device: impl Into<PathBuf>) -> Self {
        Self {
            device: device.into(),
        }
    }

    /// Pick the first device under the backlight class
    pub async fn discover() -> Result<Self, SignalError> {
        Self::discover_in(Path::new(BACKLIGHT_CLASS_DIR)).await
    }

    async fn discover_in(class_dir: &Path) -> Result<Self, SignalError> {
        let mut entries = tokio::fs::read_dir(class_dir).await.map_err(|e| {
            SignalError::Unsupported(format!("{}: {}", class_dir.display(), e))
        })?;

        let mut devices = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            devices.push(entry.path());
        }
        devices.sort();

        let device = devices.into_iter().next().ok_or_else(|| {
            SignalError::Unsupported(format!("no backlight under {}", class_dir.display()))
        })?;
        info!("Using sysfs backlight {}", device.display());
        Ok(Self::new(device))
    }

    async fn read_value(&self, name: &str) -> Result<u32, SignalError> {
        let raw = tokio::fs::read_to_string(self.device.join(name)).await?;
        raw.trim()
            .parse::<u32>()
            .map_err(|e| SignalError::Decode(format!("{}: {}", name, e)))
    }

    async fn max_brightness(&self) -> Result<u32, SignalError> {
        match self.read_value("max_brightness").await? {
            0 => Err(SignalError::Actuator("max_brightness is 0".to_string())),
            max => Ok(max),
        }
    }
}

#[async_trait]
impl BrightnessActuator for SysfsBacklight {
    async fn get(&self) -> Result<u8, SignalError> {
        let max = self.max_brightness().await?;
        let raw = self.read_value("brightness").await?.min(max);
        Ok(((raw as f64 * 100.0 / max as f64).round()) as u8)
    }

    async fn set(&self, percent: u8) -> Result<(), SignalError> {
        let percent = percent.min(100);
        let max = self.max_brightness().await?;
        let raw = (percent as f64 * max as f64 / 100.0).round() as u32;
        tokio::fs::write(self.device.join("brightness"), raw.to_string()).await?;
        debug!("Backlight set to {}% ({}/{})", percent, raw, max);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct SimulatedDisplay {
    brightness: u8,
    writes: Vec<u8>,
    fail_reads: bool,
    fail_writes: bool,
}

/// In-process display for dry runs and tests.
///
/// Clones share the same display, so a test can keep a handle while the
/// guard owns another.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBrightness {
    display: Arc<Mutex<SimulatedDisplay>>,
}

impl SimulatedBrightness {
    pub fn new(initial: u8) -> Self {
        Self {
            display: Arc::new(Mutex::new(SimulatedDisplay {
                brightness: initial.min(100),
                ..Default::default()
            })),
        }
    }

    /// Current simulated brightness
    pub fn brightness(&self) -> u8 {
        self.lock().brightness
    }

    /// Every value passed to a successful `set`, in order
    pub fn writes(&self) -> Vec<u8> {
        self.lock().writes.clone()
    }

    /// Make subsequent `get` calls fail
    pub fn fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Make subsequent `set` calls fail
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimulatedDisplay> {
        // A poisoned lock still holds a consistent display value
        self.display.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BrightnessActuator for SimulatedBrightness {
    async fn get(&self) -> Result<u8, SignalError> {
        let display = self.lock();
        if display.fail_reads {
            return Err(SignalError::Actuator("simulated read failure".to_string()));
        }
        Ok(display.brightness)
    }

    async fn set(&self, percent: u8) -> Result<(), SignalError> {
        let mut display = self.lock();
        if display.fail_writes {
            return Err(SignalError::Actuator("simulated write failure".to_string()));
        }
        let percent = percent.min(100);
        display.brightness = percent;
        display.writes.push(percent);
        debug!("Simulated brightness set to {}%", percent);
        Ok(())
    }
}
