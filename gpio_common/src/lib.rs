//! rpi-gpio Common Library
//!
//! This crate provides shared constants, the validated pin type and
//! configuration loading utilities for all rpi-gpio workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Configuration loading traits and shared types
//! - [`gpio`] - GPIO register layout constants, pin numbers and driver configuration
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use gpio_common::prelude::*;
//!
//! let pin = PinNumber::new(17).unwrap();
//! assert_eq!(pin.get(), 17);
//! ```

pub mod config;
pub mod gpio;
pub mod prelude;
