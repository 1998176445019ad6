//! In-process device host.
//!
//! Tracks registered drivers and live nodes in memory. Failures can be
//! injected at registration or at the N-th node creation to exercise the
//! driver's rollback path. A `HostView` shares the state so it can
//! be inspected after the host was moved into a driver.

use super::{DeviceHost, DriverId, HostError, NodeHandle};
use crate::registry::Minor;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryHostState {
    next_driver: u32,
    drivers: Vec<DriverId>,
    nodes: Vec<NodeHandle>,
    destroyed: Vec<String>,
    fail_registration: bool,
    fail_node_at: Option<usize>,
    created: usize,
}

/// Device host keeping everything in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Arc<Mutex<MemoryHostState>>,
}

/// Shared view of a `MemoryHost`.
#[derive(Debug, Clone)]
pub struct HostView {
    state: Arc<Mutex<MemoryHostState>>,
}

impl MemoryHost {
    /// Host that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `register_driver` fail.
    pub fn failing_registration(self) -> Self {
        self.state.lock().fail_registration = true;
        self
    }

    /// Make the node creation with 0-based attempt number `index` fail.
    pub fn failing_node_at(self, index: usize) -> Self {
        self.state.lock().fail_node_at = Some(index);
        self
    }

    /// Handle for inspecting the host after it has been handed off.
    pub fn view(&self) -> HostView {
        HostView {
            state: Arc::clone(&self.state),
        }
    }
}

impl DeviceHost for MemoryHost {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn register_driver(&mut self, name: &str) -> Result<DriverId, HostError> {
        let mut state = self.state.lock();
        if state.fail_registration {
            return Err(HostError::Registration {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let id = DriverId(state.next_driver);
        state.next_driver += 1;
        state.drivers.push(id);
        debug!("memory host: registered driver '{}' as {}", name, id);
        Ok(id)
    }

    fn create_node(
        &mut self,
        driver: DriverId,
        minor: Minor,
        name: &str,
    ) -> Result<NodeHandle, HostError> {
        let mut state = self.state.lock();
        let attempt = state.created;
        state.created += 1;

        if state.fail_node_at == Some(attempt) {
            return Err(HostError::NodeCreation {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let node = NodeHandle {
            driver,
            minor,
            name: name.to_string(),
        };
        state.nodes.push(node.clone());
        Ok(node)
    }

    fn destroy_node(&mut self, node: &NodeHandle) {
        let mut state = self.state.lock();
        state.nodes.retain(|live| live != node);
        state.destroyed.push(node.name.clone());
    }

    fn unregister_driver(&mut self, driver: DriverId) {
        self.state.lock().drivers.retain(|&id| id != driver);
    }
}

impl HostView {
    /// Names of live nodes, in creation order.
    pub fn live_nodes(&self) -> Vec<String> {
        self.state.lock().nodes.iter().map(|n| n.name.clone()).collect()
    }

    /// Names of destroyed nodes, in destruction order.
    pub fn destroyed_nodes(&self) -> Vec<String> {
        self.state.lock().destroyed.clone()
    }

    /// Number of registered drivers.
    pub fn registered_drivers(&self) -> usize {
        self.state.lock().drivers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_nodes_and_drivers() {
        let mut host = MemoryHost::new();
        let view = host.view();

        let id = host.register_driver("rpi-gpio").unwrap();
        let a = host.create_node(id, Minor::new(0), "led17").unwrap();
        let b = host.create_node(id, Minor::new(1), "led22").unwrap();
        assert_eq!(view.live_nodes(), vec!["led17", "led22"]);
        assert_eq!(view.registered_drivers(), 1);

        host.destroy_node(&b);
        host.destroy_node(&a);
        host.unregister_driver(id);
        assert!(view.live_nodes().is_empty());
        assert_eq!(view.destroyed_nodes(), vec!["led22", "led17"]);
        assert_eq!(view.registered_drivers(), 0);
        assert!(host.node_path(&a).is_none());
    }

    #[test]
    fn injected_node_failure_hits_requested_attempt() {
        let mut host = MemoryHost::new().failing_node_at(1);
        let id = host.register_driver("rpi-gpio").unwrap();
        assert!(host.create_node(id, Minor::new(0), "led17").is_ok());
        assert!(matches!(
            host.create_node(id, Minor::new(1), "led22"),
            Err(HostError::NodeCreation { .. })
        ));
    }

    #[test]
    fn injected_registration_failure() {
        let mut host = MemoryHost::new().failing_registration();
        assert!(matches!(
            host.register_driver("rpi-gpio"),
            Err(HostError::Registration { .. })
        ));
    }
}
