//! # GPIO Output Driver Library
//!
//! Memory-mapped GPIO output driver exposing one device node per pin.
//!
//! Writing `1` to a node drives its pin high, `0` drives it low, and
//! reading returns whatever was last written.
//!
//! # Module Structure
//!
//! - [`registers`] - Register map over a pluggable register block
//! - [`backends`] - Register block backends (`/dev/mem` mmio, simulation)
//! - [`pin_ops`] - Function select, set and clear
//! - [`registry`] - Validated pin list and per-pin state
//! - [`device`] - open/read/write/release multiplexer
//! - [`host`] - Device host boundary (memory, FIFO)
//! - [`lifecycle`] - Startup, rollback and teardown
//! - [`service`] - FIFO node service loop
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          GpioDriver                              │
//! │  ┌─────────────┐    ┌──────────────┐    ┌─────────────────────┐  │
//! │  │ DeviceHost  │◄───│  lifecycle   │───►│  Registry           │  │
//! │  │ (nodes)     │    │              │    │  (minor → pin)      │  │
//! │  └─────────────┘    └──────┬───────┘    └──────────▲──────────┘  │
//! │                            │                       │             │
//! │                            ▼                       │             │
//! │                   ┌────────────────┐      ┌────────┴─────────┐   │
//! │                   │  RegisterMap   │◄─────│  Multiplexer     │   │
//! │                   │  (mmio / sim)  │      │  (DeviceOps)     │   │
//! │                   └────────────────┘      └──────────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]

pub mod backends;
pub mod device;
pub mod host;
pub mod lifecycle;
pub mod pin_ops;
pub mod registers;
pub mod registry;
pub mod service;

// Re-export key types for convenience
pub use crate::backends::BackendRegistry;
pub use crate::device::{DeviceError, DeviceOps, Multiplexer, Session, WriteOutcome, WriteReport};
pub use crate::host::{DeviceHost, FifoHost, MemoryHost};
pub use crate::lifecycle::{DriverError, GpioDriver};
pub use crate::pin_ops::Level;
pub use crate::registers::{MapError, RegisterMap};
pub use crate::registry::{Minor, Registry, RegistryError};
pub use crate::service::NodeService;
