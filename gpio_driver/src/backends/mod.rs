//! Register backends and the registry that selects one by name.
//!
//! - [`mmio`] - Real hardware registers mapped from a memory device
//! - [`simulation`] - In-memory registers for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `backends/`
//! 2. Implement `RegisterBlock` for its block type
//! 3. Register a factory in `BackendRegistry::with_builtin()`

pub mod mmio;
pub mod simulation;

use crate::registers::{MapError, RegisterMap};
use gpio_common::gpio::config::RegisterSection;
use std::collections::HashMap;
use tracing::info;

pub use mmio::MmioRegisters;
pub use simulation::{RegisterView, SimulatedRegisters};

/// Factory function type for mapping a register block.
pub type BackendFactory = fn(&RegisterSection) -> Result<RegisterMap, MapError>;

/// Registry of available register backends.
///
/// Constructed at startup, populated via `register()`, and consulted once
/// to map the register block. No global state.
pub struct BackendRegistry {
    factories: HashMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry holding the `mmio` and `simulation` backends.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("mmio", map_mmio);
        registry.register("simulation", map_simulation);
        registry
    }

    /// Register a backend factory.
    ///
    /// # Panics
    /// Panics if a backend with the same name is already registered.
    pub fn register(&mut self, name: &'static str, factory: BackendFactory) {
        if self.factories.contains_key(name) {
            panic!("Backend '{name}' is already registered");
        }
        self.factories.insert(name, factory);
    }

    /// Map a register block with the named backend.
    ///
    /// # Errors
    /// Returns `MapError::UnknownBackend` if no backend with the given name
    /// is registered, or whatever the backend itself reports.
    pub fn map(&self, name: &str, section: &RegisterSection) -> Result<RegisterMap, MapError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| MapError::UnknownBackend(name.to_string()))?;
        info!("Mapping registers with backend '{}'", name);
        factory(section)
    }

    /// List all registered backend names.
    pub fn list_backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

fn map_mmio(section: &RegisterSection) -> Result<RegisterMap, MapError> {
    RegisterMap::new(Box::new(MmioRegisters::from_section(section)?))
}

fn map_simulation(section: &RegisterSection) -> Result<RegisterMap, MapError> {
    RegisterMap::new(Box::new(SimulatedRegisters::new(section.size)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_backend(_section: &RegisterSection) -> Result<RegisterMap, MapError> {
        Err(MapError::UnknownBackend("always fails".to_string()))
    }

    #[test]
    fn builtin_backends_are_listed() {
        let mut names = BackendRegistry::with_builtin().list_backends();
        names.sort();
        assert_eq!(names, vec!["mmio", "simulation"]);
    }

    #[test]
    fn maps_simulation_backend() {
        let registry = BackendRegistry::with_builtin();
        let map = registry
            .map("simulation", &RegisterSection::default())
            .expect("simulation maps");
        assert_eq!(map.backend(), "simulation");
    }

    #[test]
    fn unknown_backend_is_error() {
        let registry = BackendRegistry::with_builtin();
        let result = registry.map("ethercat", &RegisterSection::default());
        assert!(matches!(result, Err(MapError::UnknownBackend(name)) if name == "ethercat"));
    }

    #[test]
    fn custom_backend_error_propagates() {
        let mut registry = BackendRegistry::new();
        registry.register("broken", failing_backend);
        assert!(registry.map("broken", &RegisterSection::default()).is_err());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_backend_panics() {
        let mut registry = BackendRegistry::new();
        registry.register("dup", failing_backend);
        registry.register("dup", failing_backend);
    }
}
