//! Device host exposing nodes as named pipes.
//!
//! Each node becomes `<dev_dir>/<name>`, a FIFO any process can open and
//! write `0`/`1` to with ordinary file I/O. The daemon's node service reads
//! the other end and feeds each chunk to the device multiplexer.
//!
//! Nodes are write-only for everyone but the owning daemon (`NODE_MODE`):
//! the node service must be the only reader, since a second reader on a
//! pipe takes writes away from it. The read echo is therefore only
//! available in-process through `DeviceOps::read`. Root and the daemon's
//! own user bypass the group/other bits and must not open nodes for reading.
//!
//! A FIFO left behind by a process that never reached teardown is replaced
//! on the next `create_node`; any other file at a node path is an error.

use super::{DeviceHost, DriverId, HostError, NodeHandle};
use crate::registry::Minor;
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::fs;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Node permissions: owner read/write, group and other write-only.
pub const NODE_MODE: u32 = 0o622;

/// Device host backed by FIFOs in a directory.
#[derive(Debug)]
pub struct FifoHost {
    dev_dir: PathBuf,
    registered: Option<DriverId>,
}

impl FifoHost {
    /// Host creating nodes under `dev_dir`.
    pub fn new(dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
            registered: None,
        }
    }

    /// Directory nodes are created in.
    pub fn dev_dir(&self) -> &Path {
        &self.dev_dir
    }
}

impl DeviceHost for FifoHost {
    fn name(&self) -> &'static str {
        "fifo"
    }

    fn register_driver(&mut self, name: &str) -> Result<DriverId, HostError> {
        if self.registered.is_some() {
            return Err(HostError::Registration {
                name: name.to_string(),
                reason: format!("a driver is already registered in {:?}", self.dev_dir),
            });
        }

        fs::create_dir_all(&self.dev_dir).map_err(|e| HostError::Registration {
            name: name.to_string(),
            reason: format!("cannot create {:?}: {}", self.dev_dir, e),
        })?;

        let id = DriverId(0);
        self.registered = Some(id);
        info!("Registered driver '{}' with node directory {:?}", name, self.dev_dir);
        Ok(id)
    }

    fn create_node(
        &mut self,
        driver: DriverId,
        minor: Minor,
        name: &str,
    ) -> Result<NodeHandle, HostError> {
        let path = self.dev_dir.join(name);
        let creation_error = |reason: String| HostError::NodeCreation {
            name: name.to_string(),
            reason,
        };

        if let Ok(meta) = fs::symlink_metadata(&path) {
            if !meta.file_type().is_fifo() {
                return Err(creation_error(format!("{:?} exists and is not a FIFO", path)));
            }
            warn!("Replacing stale node {:?}", path);
            fs::remove_file(&path)
                .map_err(|e| creation_error(format!("remove stale {:?}: {}", path, e)))?;
        }

        mkfifo(&path, Mode::from_bits_truncate(NODE_MODE))
            .map_err(|e| creation_error(format!("mkfifo {:?}: {}", path, e)))?;

        // mkfifo applies the umask; set the mode exactly.
        if let Err(e) = fs::set_permissions(&path, fs::Permissions::from_mode(NODE_MODE)) {
            if let Err(rm) = fs::remove_file(&path) {
                warn!("Failed to remove node {:?}: {}", path, rm);
            }
            return Err(creation_error(format!("chmod {:?}: {}", path, e)));
        }

        debug!("Created node {:?} (minor {})", path, minor);
        Ok(NodeHandle {
            driver,
            minor,
            name: name.to_string(),
        })
    }

    fn destroy_node(&mut self, node: &NodeHandle) {
        let path = self.dev_dir.join(&node.name);
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed node {:?}", path),
            Err(e) => warn!("Failed to remove node {:?}: {}", path, e),
        }
    }

    fn unregister_driver(&mut self, driver: DriverId) {
        if self.registered == Some(driver) {
            self.registered = None;
            info!("Unregistered driver {}", driver);
        }
    }

    fn node_path(&self, node: &NodeHandle) -> Option<PathBuf> {
        Some(self.dev_dir.join(&node.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_and_removes_fifo_nodes() {
        let dir = TempDir::new().unwrap();
        let dev_dir = dir.path().join("dev");
        let mut host = FifoHost::new(&dev_dir);

        let id = host.register_driver("rpi-gpio").unwrap();
        let node = host.create_node(id, Minor::new(0), "led17").unwrap();

        let path = host.node_path(&node).unwrap();
        assert_eq!(path, dev_dir.join("led17"));
        assert!(fs::metadata(&path).unwrap().file_type().is_fifo());

        host.destroy_node(&node);
        assert!(!path.exists());
        host.unregister_driver(id);
    }

    #[test]
    fn nodes_are_write_only_for_group_and_other() {
        let dir = TempDir::new().unwrap();
        let mut host = FifoHost::new(dir.path());
        let id = host.register_driver("rpi-gpio").unwrap();
        let node = host.create_node(id, Minor::new(0), "led17").unwrap();

        let mode = fs::metadata(host.node_path(&node).unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, NODE_MODE);
        assert_eq!(mode & 0o044, 0);
        assert_eq!(mode & 0o022, 0o022);
    }

    #[test]
    fn stale_fifo_is_replaced() {
        let dir = TempDir::new().unwrap();
        let stale = dir.path().join("led17");
        mkfifo(&stale, Mode::from_bits_truncate(0o600)).unwrap();

        let mut host = FifoHost::new(dir.path());
        let id = host.register_driver("rpi-gpio").unwrap();
        let node = host.create_node(id, Minor::new(0), "led17").unwrap();

        let meta = fs::metadata(host.node_path(&node).unwrap()).unwrap();
        assert!(meta.file_type().is_fifo());
        assert_eq!(meta.permissions().mode() & 0o777, NODE_MODE);
    }

    #[test]
    fn regular_file_at_node_path_is_creation_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("led17"), b"").unwrap();
        let mut host = FifoHost::new(dir.path());

        let id = host.register_driver("rpi-gpio").unwrap();
        assert!(matches!(
            host.create_node(id, Minor::new(0), "led17"),
            Err(HostError::NodeCreation { .. })
        ));
        assert!(fs::metadata(dir.path().join("led17")).unwrap().is_file());
    }

    #[test]
    fn second_registration_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut host = FifoHost::new(dir.path());
        let id = host.register_driver("rpi-gpio").unwrap();
        assert!(host.register_driver("rpi-gpio").is_err());

        host.unregister_driver(id);
        assert!(host.register_driver("rpi-gpio").is_ok());
    }
}
