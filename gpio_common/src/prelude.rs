//! Prelude module for common re-exports.
//!
//! ```rust
//! use gpio_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, LogLevel, SharedConfig};
pub use crate::gpio::config::{DriverSection, GpioConfig, RegisterSection};

// ─── Pins ───────────────────────────────────────────────────────────
pub use crate::gpio::pin::{PinError, PinNumber};

// ─── Limits ─────────────────────────────────────────────────────────
pub use crate::gpio::consts::{GPIO_MAX, GPIO_MIN, MAX_BUFFER_SIZE, MAX_PINS};
