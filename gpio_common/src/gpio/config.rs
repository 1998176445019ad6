//! GPIO driver configuration types.
//!
//! - `GpioConfig` - Main configuration loaded from `gpio.toml`
//! - `DriverSection` - Pin list and device node naming
//! - `RegisterSection` - Where and how the register block is mapped

use crate::config::{ConfigError, SharedConfig};
use crate::gpio::consts::{
    DEFAULT_BACKEND, DEFAULT_DEVICE_DIR, DEFAULT_DEVICE_PREFIX, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_REGISTER_DEVICE, GPIO_BASE_ADDRESS, MAX_PINS, MIN_REGISTER_SPAN, REGISTER_BLOCK_SIZE,
};
use crate::gpio::pin::PinNumber;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn default_device_prefix() -> String {
    DEFAULT_DEVICE_PREFIX.to_string()
}

fn default_device_dir() -> PathBuf {
    PathBuf::from(DEFAULT_DEVICE_DIR)
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

fn default_backend() -> String {
    DEFAULT_BACKEND.to_string()
}

fn default_register_device() -> PathBuf {
    PathBuf::from(DEFAULT_REGISTER_DEVICE)
}

fn default_base_address() -> u64 {
    GPIO_BASE_ADDRESS
}

fn default_block_size() -> usize {
    REGISTER_BLOCK_SIZE
}

/// Main configuration loaded from `gpio.toml`.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "rpi-gpio"
///
/// [driver]
/// pins = [17, 22]
///
/// [registers]
/// backend = "simulation"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GpioConfig {
    /// Logging and service identity.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Pins and device node layout.
    pub driver: DriverSection,

    /// Register block mapping.
    #[serde(default)]
    pub registers: RegisterSection,
}

/// Pins exposed as device nodes and how the nodes are named.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverSection {
    /// Ordered pin list. Raw integers: range checks happen in `validate`
    /// and again when the registry is built, so errors can name the index.
    pub pins: Vec<i64>,

    /// Node name prefix; node name is prefix + decimal pin number.
    #[serde(default = "default_device_prefix")]
    pub device_prefix: String,

    /// Directory device nodes are created in.
    #[serde(default = "default_device_dir")]
    pub device_dir: PathBuf,

    /// How often node services poll for pending writes.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl DriverSection {
    /// Section with default naming for the given pins.
    pub fn with_pins(pins: Vec<i64>) -> Self {
        Self {
            pins,
            device_prefix: default_device_prefix(),
            device_dir: default_device_dir(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Device node name for `pin`.
    pub fn node_name(&self, pin: PinNumber) -> String {
        format!("{}{}", self.device_prefix, pin)
    }
}

/// Register block mapping parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSection {
    /// Backend name ("mmio" or "simulation").
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Character device to map (`/dev/mem` or `/dev/gpiomem`).
    #[serde(default = "default_register_device")]
    pub device: PathBuf,

    /// Offset into `device`. Physical base address for `/dev/mem`,
    /// 0 for `/dev/gpiomem`.
    #[serde(default = "default_base_address")]
    pub base_address: u64,

    /// Mapped span in bytes.
    #[serde(default = "default_block_size")]
    pub size: usize,
}

impl Default for RegisterSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            device: default_register_device(),
            base_address: default_base_address(),
            size: default_block_size(),
        }
    }
}

impl GpioConfig {
    /// Configuration with defaults everywhere except the pin list.
    pub fn from_pins(pins: Vec<i64>) -> Self {
        Self {
            shared: SharedConfig::default(),
            driver: DriverSection::with_pins(pins),
            registers: RegisterSection::default(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `shared.service_name` is empty
    /// - `driver.device_prefix` is empty or contains a path separator
    /// - any pin is out of range, or there are more than `MAX_PINS`
    /// - `driver.poll_interval_ms` is 0
    /// - `registers.size` does not cover the set/clear registers
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.driver.device_prefix.is_empty() || self.driver.device_prefix.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "device_prefix '{}' must be a non-empty file name",
                self.driver.device_prefix
            )));
        }

        if self.driver.pins.len() > MAX_PINS {
            return Err(ConfigError::ValidationError(format!(
                "Too many pins: {} (max {})",
                self.driver.pins.len(),
                MAX_PINS
            )));
        }

        for (index, &value) in self.driver.pins.iter().enumerate() {
            PinNumber::new(value)
                .map_err(|e| ConfigError::ValidationError(format!("pins[{index}]: {e}")))?;
        }

        if self.driver.poll_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.registers.size < MIN_REGISTER_SPAN {
            return Err(ConfigError::ValidationError(format!(
                "register block size {} is smaller than the {} bytes the set/clear registers need",
                self.registers.size, MIN_REGISTER_SPAN
            )));
        }

        Ok(())
    }
}
