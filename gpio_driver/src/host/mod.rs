//! Device hosts: where device nodes become visible.
//!
//! The driver core registers itself and creates one node per pin through
//! the `DeviceHost` trait; it never depends on a particular host.
//!
//! - [`memory`] - In-process host for tests and embedding
//! - [`fifo`] - Named pipes in a device directory

pub mod fifo;
pub mod memory;

use crate::registry::Minor;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

pub use fifo::FifoHost;
pub use memory::{HostView, MemoryHost};

/// Errors reported by a device host.
#[derive(Debug, Error)]
pub enum HostError {
    /// The driver entry point could not be registered.
    #[error("failed to register driver '{name}': {reason}")]
    Registration {
        /// Driver name.
        name: String,
        /// Host-specific detail.
        reason: String,
    },

    /// A device node could not be created.
    #[error("failed to create device node '{name}': {reason}")]
    NodeCreation {
        /// Node name.
        name: String,
        /// Host-specific detail.
        reason: String,
    },
}

/// Identity a host hands out for a registered driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DriverId(pub u32);

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A created device node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeHandle {
    /// Driver the node belongs to.
    pub driver: DriverId,
    /// Routing identity.
    pub minor: Minor,
    /// User-visible name (prefix + pin).
    pub name: String,
}

/// Trait defining the host integration boundary.
///
/// # Lifecycle
///
/// 1. `register_driver()` - once, before any node exists
/// 2. `create_node()` - once per minor, in order
/// 3. `destroy_node()` - once per created node, reverse order
/// 4. `unregister_driver()` - once, after every node is gone
pub trait DeviceHost: Send {
    /// Host identifier (e.g., "memory", "fifo").
    fn name(&self) -> &'static str;

    /// Register the driver entry point.
    fn register_driver(&mut self, name: &str) -> Result<DriverId, HostError>;

    /// Make node `name` visible, routed to `minor`.
    fn create_node(
        &mut self,
        driver: DriverId,
        minor: Minor,
        name: &str,
    ) -> Result<NodeHandle, HostError>;

    /// Remove a node created by `create_node`.
    fn destroy_node(&mut self, node: &NodeHandle);

    /// Undo `register_driver`.
    fn unregister_driver(&mut self, driver: DriverId);

    /// Filesystem path of `node`, for hosts that expose one.
    fn node_path(&self, _node: &NodeHandle) -> Option<PathBuf> {
        None
    }
}
