//! Node service: pumps FIFO node traffic into the device multiplexer.
//!
//! One thread per node. Each thread keeps the FIFO open read+write (so it
//! never sees EOF when writers come and go), polls it non-blocking, and
//! turns every chunk it reads into one open → write → release sequence.

use crate::device::{DeviceOps, Multiplexer, WriteOutcome};
use crate::registry::Minor;
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Largest chunk read from a node in one go (one atomic pipe write).
const FIFO_CHUNK: usize = 4096;

/// Node service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Node could not be opened.
    #[error("failed to open node {path:?}: {source}")]
    Open {
        /// Node path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Reading from a node failed.
    #[error("failed to read node {path:?}: {source}")]
    Read {
        /// Node path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// A node thread panicked.
    #[error("service thread for minor {minor} panicked")]
    Panicked {
        /// Node served by the thread.
        minor: Minor,
    },
}

/// Serves FIFO nodes until told to stop.
pub struct NodeService<'d> {
    device: Multiplexer<'d>,
    poll_interval: Duration,
}

impl<'d> NodeService<'d> {
    /// Service dispatching into `device`, sleeping `poll_interval` when idle.
    pub fn new(device: Multiplexer<'d>, poll_interval: Duration) -> Self {
        Self {
            device,
            poll_interval,
        }
    }

    /// Serve every node until `running` is cleared.
    ///
    /// A node that cannot be opened or read is fatal: its thread clears
    /// `running` so every other node stops too, and the first error is
    /// returned.
    pub fn run(&self, nodes: &[(Minor, PathBuf)], running: &AtomicBool) -> Result<(), ServiceError> {
        info!("Serving {} nodes", nodes.len());

        let results: Vec<Result<(), ServiceError>> = thread::scope(|scope| {
            let handles: Vec<_> = nodes
                .iter()
                .map(|(minor, path)| {
                    let minor = *minor;
                    (minor, scope.spawn(move || self.serve_node(minor, path, running)))
                })
                .collect();

            handles
                .into_iter()
                .map(|(minor, handle)| {
                    handle
                        .join()
                        .unwrap_or(Err(ServiceError::Panicked { minor }))
                })
                .collect()
        });

        info!("Node service stopped");
        results.into_iter().collect()
    }

    fn serve_node(&self, minor: Minor, path: &Path, running: &AtomicBool) -> Result<(), ServiceError> {
        let result = self.pump(minor, path, running);
        if let Err(e) = &result {
            error!("Node service for minor {} stopped: {}", minor, e);
            running.store(false, Ordering::SeqCst);
        }
        result
    }

    fn pump(&self, minor: Minor, path: &Path, running: &AtomicBool) -> Result<(), ServiceError> {
        let mut node = open_node(path)?;
        let mut chunk = [0u8; FIFO_CHUNK];
        debug!("Serving node {:?} (minor {})", path, minor);

        while running.load(Ordering::SeqCst) {
            match node.read(&mut chunk) {
                Ok(0) => thread::sleep(self.poll_interval),
                Ok(n) => self.dispatch(minor, &chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    thread::sleep(self.poll_interval)
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(ServiceError::Read {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }

        Ok(())
    }

    /// Feed one chunk through a full open/write/release cycle.
    pub fn dispatch(&self, minor: Minor, data: &[u8]) {
        let mut session = match self.device.open(minor) {
            Ok(session) => session,
            Err(e) => {
                warn!("Dropping {} bytes: {}", data.len(), e);
                return;
            }
        };

        match self.device.write(&mut session, data) {
            Ok(report) => match report.outcome {
                WriteOutcome::Applied(level) => {
                    debug!("Minor {} driven {}", minor, level)
                }
                WriteOutcome::Ignored(reason) => {
                    debug!("Minor {} write ignored: {}", minor, reason)
                }
            },
            Err(e) => warn!("Write to minor {} failed: {}", minor, e),
        }

        self.device.release(session);
    }
}

fn open_node(path: &Path) -> Result<File, ServiceError> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|source| ServiceError::Open {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulation::SimulatedRegisters;
    use crate::registers::RegisterMap;
    use crate::registry::Registry;
    use gpio_common::gpio::consts::REGISTER_BLOCK_SIZE;
    use nix::sys::stat::Mode;
    use nix::unistd::mkfifo;
    use std::io::Write;
    use std::time::Instant;
    use tempfile::TempDir;

    fn fixture(pins: &[i64]) -> (Registry, RegisterMap, crate::backends::RegisterView) {
        let block = SimulatedRegisters::new(REGISTER_BLOCK_SIZE);
        let view = block.view();
        let map = RegisterMap::new(Box::new(block)).unwrap();
        (Registry::build(pins).unwrap(), map, view)
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn dispatch_drives_pin_and_stores_echo() {
        let (registry, map, view) = fixture(&[17]);
        let device = Multiplexer::new(&registry, &map);
        let service = NodeService::new(device, Duration::from_millis(1));

        service.dispatch(Minor::new(0), b"1\n");
        assert!(view.level(17));
        assert_eq!(device.read_at(Minor::new(0), 16, 0).unwrap(), b"1\n");
    }

    #[test]
    fn dispatch_to_unknown_minor_is_dropped() {
        let (registry, map, view) = fixture(&[17]);
        let service = NodeService::new(Multiplexer::new(&registry, &map), Duration::from_millis(1));

        service.dispatch(Minor::new(9), b"1");
        assert!(!view.level(17));
    }

    #[test]
    fn serves_writes_arriving_on_fifo() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("led17");
        mkfifo(&path, Mode::from_bits_truncate(0o600)).unwrap();

        let (registry, map, view) = fixture(&[17]);
        let service = NodeService::new(Multiplexer::new(&registry, &map), Duration::from_millis(1));
        let running = AtomicBool::new(true);
        let nodes = vec![(Minor::new(0), path.clone())];

        thread::scope(|scope| {
            let server = scope.spawn(|| service.run(&nodes, &running));

            let mut writer = OpenOptions::new().write(true).open(&path).unwrap();
            writer.write_all(b"1").unwrap();
            assert!(wait_for(|| view.level(17)));

            writer.write_all(b"0").unwrap();
            assert!(wait_for(|| !view.level(17)));

            running.store(false, Ordering::SeqCst);
            assert!(server.join().unwrap().is_ok());
        });
    }

    #[test]
    fn missing_node_is_open_error() {
        let dir = TempDir::new().unwrap();
        let (registry, map, _view) = fixture(&[17]);
        let service = NodeService::new(Multiplexer::new(&registry, &map), Duration::from_millis(1));
        let running = AtomicBool::new(true);

        let result = service.run(&[(Minor::new(0), dir.path().join("missing"))], &running);
        assert!(matches!(result, Err(ServiceError::Open { .. })));
        assert!(!running.load(Ordering::SeqCst));
    }

    #[test]
    fn failing_node_stops_healthy_nodes() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("led17");
        mkfifo(&good, Mode::from_bits_truncate(0o600)).unwrap();

        let (registry, map, _view) = fixture(&[17, 22]);
        let service = NodeService::new(Multiplexer::new(&registry, &map), Duration::from_millis(1));
        let running = AtomicBool::new(true);
        let nodes = vec![
            (Minor::new(0), good),
            (Minor::new(1), dir.path().join("missing")),
        ];

        // Returns only because the failing node cleared `running`.
        let result = service.run(&nodes, &running);
        assert!(matches!(result, Err(ServiceError::Open { .. })));
        assert!(!running.load(Ordering::SeqCst));
    }
}
