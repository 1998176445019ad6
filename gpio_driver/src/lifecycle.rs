//! Driver instance and its startup/teardown lifecycle.
//!
//! `GpioDriver` is the single owned context holding the register map, the
//! pin registry, the host registration and the node table. There is no
//! module-level state; any number of instances can be built and dropped.
//!
//! # Startup
//!
//! 1. map registers (done by the caller or `start_with_backends`)
//! 2. validate pins and build the registry
//! 3. register the driver with the host
//! 4. allocate the node table
//! 5. per minor: create the node, then configure the pin as output
//!
//! Any failure after step 2 runs the teardown over whatever exists.
//!
//! # Teardown
//!
//! Destroy nodes (reverse order) → release node table → unregister driver
//! → unmap registers. Safe from any partial state and idempotent.

use crate::backends::BackendRegistry;
use crate::device::Multiplexer;
use crate::host::{DeviceHost, DriverId, HostError, NodeHandle};
use crate::pin_ops;
use crate::registers::{MapError, RegisterMap};
use crate::registry::{Minor, Registry, RegistryError};
use gpio_common::gpio::config::{DriverSection, GpioConfig};
use gpio_common::gpio::pin::PinNumber;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

/// Fatal driver startup errors.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Pin list rejected.
    #[error("invalid pin configuration: {0}")]
    Config(#[from] RegistryError),

    /// Register block could not be mapped.
    #[error("register mapping failed: {0}")]
    Map(#[from] MapError),

    /// Host refused the driver or one of its nodes.
    #[error("device registration failed: {0}")]
    Registration(#[from] HostError),

    /// Node table allocation failed.
    #[error("failed to allocate node table for {count} nodes")]
    Allocation {
        /// Requested node count.
        count: usize,
    },
}

/// State that exists only between a successful step 2 and teardown.
struct Live {
    registry: Registry,
    registers: RegisterMap,
}

/// A running GPIO driver instance.
pub struct GpioDriver {
    name: String,
    host: Box<dyn DeviceHost>,
    driver_id: Option<DriverId>,
    nodes: Vec<NodeHandle>,
    live: Option<Live>,
}

impl GpioDriver {
    /// Map registers with the configured backend, then `start`.
    ///
    /// # Errors
    /// `DriverError::Map` if mapping fails, otherwise as `start`.
    pub fn start_with_backends(
        config: &GpioConfig,
        backends: &BackendRegistry,
        host: Box<dyn DeviceHost>,
    ) -> Result<Self, DriverError> {
        let registers = backends
            .map(&config.registers.backend, &config.registers)
            .inspect_err(|e| error!("Failed to map GPIO registers: {}", e))?;
        Self::start(config, registers, host)
    }

    /// Bring the driver up over an already-mapped register block.
    ///
    /// On error everything built so far, including `registers`, has been
    /// released before this returns.
    pub fn start(
        config: &GpioConfig,
        registers: RegisterMap,
        host: Box<dyn DeviceHost>,
    ) -> Result<Self, DriverError> {
        info!(
            "Starting driver '{}' on {} host with {} pins",
            config.shared.service_name,
            host.name(),
            config.driver.pins.len()
        );

        let registry = Registry::build(&config.driver.pins).inspect_err(|_| {
            info!(
                "Valid gpio pins are {} to {} inclusive",
                gpio_common::gpio::consts::GPIO_MIN,
                gpio_common::gpio::consts::GPIO_MAX
            );
        })?;

        let mut driver = Self {
            name: config.shared.service_name.clone(),
            host,
            driver_id: None,
            nodes: Vec::new(),
            live: Some(Live {
                registry,
                registers,
            }),
        };

        match driver.bring_up(&config.driver) {
            Ok(()) => {
                info!("Driver '{}' started with {} nodes", driver.name, driver.nodes.len());
                Ok(driver)
            }
            Err(e) => {
                error!("Driver startup failed, rolling back: {}", e);
                driver.shutdown();
                Err(e)
            }
        }
    }

    fn bring_up(&mut self, section: &DriverSection) -> Result<(), DriverError> {
        let id = self.host.register_driver(&self.name)?;
        self.driver_id = Some(id);

        let Some(live) = self.live.as_ref() else {
            return Ok(());
        };

        let count = live.registry.len();
        self.nodes
            .try_reserve_exact(count)
            .map_err(|_| DriverError::Allocation { count })?;

        for slot in live.registry.iter() {
            let name = section.node_name(slot.pin());
            let node = self.host.create_node(id, slot.minor(), &name)?;
            info!("Created device {} (minor {})", name, slot.minor());
            self.nodes.push(node);

            pin_ops::set_output(&live.registers, slot.pin());
        }

        Ok(())
    }

    /// Tear everything down. Safe to call repeatedly and from any partial
    /// startup state.
    pub fn shutdown(&mut self) {
        if self.live.is_none() && self.driver_id.is_none() && self.nodes.is_empty() {
            return;
        }

        info!("Releasing driver '{}' resources", self.name);

        while let Some(node) = self.nodes.pop() {
            self.host.destroy_node(&node);
        }
        self.nodes = Vec::new();

        if let Some(id) = self.driver_id.take() {
            self.host.unregister_driver(id);
        }

        if let Some(Live {
            registry,
            registers,
        }) = self.live.take()
        {
            drop(registry);
            registers.unmap();
        }
    }

    /// Device operations, while the driver is running.
    pub fn device(&self) -> Option<Multiplexer<'_>> {
        self.live
            .as_ref()
            .map(|live| Multiplexer::new(&live.registry, &live.registers))
    }

    /// Whether the driver still owns its registers and registry.
    pub fn is_running(&self) -> bool {
        self.live.is_some()
    }

    /// Driver name registered with the host.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Created nodes in minor order.
    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    /// Filesystem path of each node, for hosts that expose one.
    pub fn node_paths(&self) -> Vec<(Minor, PathBuf)> {
        self.nodes
            .iter()
            .filter_map(|node| self.host.node_path(node).map(|path| (node.minor, path)))
            .collect()
    }

    /// Configured pins in minor order; empty after shutdown.
    pub fn pins(&self) -> Vec<PinNumber> {
        self.live
            .as_ref()
            .map(|live| live.registry.pins())
            .unwrap_or_default()
    }
}

impl Drop for GpioDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulation::SimulatedRegisters;
    use crate::device::DeviceOps;
    use crate::host::MemoryHost;
    use gpio_common::gpio::consts::REGISTER_BLOCK_SIZE;

    fn sim_registers() -> (RegisterMap, crate::backends::RegisterView) {
        let block = SimulatedRegisters::new(REGISTER_BLOCK_SIZE);
        let view = block.view();
        (RegisterMap::new(Box::new(block)).unwrap(), view)
    }

    #[test]
    fn start_creates_nodes_and_configures_outputs() {
        let (registers, regs) = sim_registers();
        let host = MemoryHost::new();
        let nodes = host.view();

        let config = GpioConfig::from_pins(vec![17, 22]);
        let driver = GpioDriver::start(&config, registers, Box::new(host)).unwrap();

        assert!(driver.is_running());
        assert_eq!(nodes.live_nodes(), vec!["led17", "led22"]);
        assert_eq!(regs.word(1), 0b001 << 21);
        assert_eq!(regs.word(2), 0b001 << 6);
        assert_eq!(driver.nodes()[1].minor, Minor::new(1));
        assert!(driver.node_paths().is_empty());
    }

    #[test]
    fn shutdown_is_idempotent_and_releases_everything() {
        let (registers, regs) = sim_registers();
        let host = MemoryHost::new();
        let nodes = host.view();

        let config = GpioConfig::from_pins(vec![17, 22, 4]);
        let mut driver = GpioDriver::start(&config, registers, Box::new(host)).unwrap();

        driver.shutdown();
        driver.shutdown();

        assert!(!driver.is_running());
        assert!(driver.device().is_none());
        assert!(driver.pins().is_empty());
        assert_eq!(nodes.destroyed_nodes(), vec!["led4", "led22", "led17"]);
        assert_eq!(nodes.registered_drivers(), 0);
        assert!(!regs.is_mapped());
    }

    #[test]
    fn invalid_pin_unmaps_before_registering() {
        let (registers, regs) = sim_registers();
        let host = MemoryHost::new();
        let nodes = host.view();

        let config = GpioConfig::from_pins(vec![17, 30]);
        let result = GpioDriver::start(&config, registers, Box::new(host));

        assert!(matches!(result, Err(DriverError::Config(_))));
        assert_eq!(nodes.registered_drivers(), 0);
        assert!(nodes.destroyed_nodes().is_empty());
        assert!(!regs.is_mapped());
    }

    #[test]
    fn device_routes_to_pins() {
        let (registers, regs) = sim_registers();
        let config = GpioConfig::from_pins(vec![17]);
        let driver = GpioDriver::start(&config, registers, Box::new(MemoryHost::new())).unwrap();

        let device = driver.device().unwrap();
        let mut session = device.open(Minor::new(0)).unwrap();
        device.write(&mut session, b"1").unwrap();
        device.release(session);
        assert!(regs.level(17));
    }
}
