//! GPIO register layout, pin numbers and driver configuration.
//!
//! This module contains the constants and configuration types shared by
//! the GPIO driver library and its daemon.

pub mod config;
pub mod consts;
pub mod pin;
