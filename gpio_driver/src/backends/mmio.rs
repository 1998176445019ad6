//! Memory-mapped register block backed by `/dev/mem` or `/dev/gpiomem`.

use crate::registers::{MapError, RegisterBlock};
use gpio_common::gpio::config::RegisterSection;
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr::NonNull;
use tracing::{debug, info};

/// Fallback when `sysconf(_SC_PAGESIZE)` reports nothing usable.
const FALLBACK_PAGE_SIZE: usize = 4096;

/// Hardware register block mapped from a memory character device.
pub struct MmioRegisters {
    /// Kept alive for the lifetime of `base`; unmapped on drop.
    _mmap: MmapMut,
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: `base` points into the mapping owned by `_mmap`, which lives as
// long as `self`. All access goes through volatile loads/stores of whole
// aligned words; concurrent access from several threads is what the
// hardware sees from several cores anyway, and read-modify-write callers
// serialize through `RegisterMap`'s per-word locks.
unsafe impl Send for MmioRegisters {}
unsafe impl Sync for MmioRegisters {}

impl MmioRegisters {
    /// Map `size` bytes of `device` starting at `offset`.
    ///
    /// The device is opened with `O_SYNC` so the kernel maps the span
    /// uncached.
    ///
    /// # Errors
    /// - `MapError::Unaligned` if `offset` is not page-aligned
    /// - `MapError::Open` if the device cannot be opened read/write
    /// - `MapError::Mmap` if the mapping fails
    pub fn map(device: &Path, offset: u64, size: usize) -> Result<Self, MapError> {
        let page_size = page_size();
        if offset % page_size as u64 != 0 {
            return Err(MapError::Unaligned { offset, page_size });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(device)
            .map_err(|source| MapError::Open {
                path: device.to_path_buf(),
                source,
            })?;

        let mut mmap = unsafe { MmapOptions::new().offset(offset).len(size).map_mut(&file) }
            .map_err(|source| MapError::Mmap {
                offset,
                size,
                source,
            })?;

        let base = NonNull::new(mmap.as_mut_ptr().cast::<u32>()).ok_or_else(|| MapError::Mmap {
            offset,
            size,
            source: std::io::Error::other("mmap returned a null mapping"),
        })?;

        info!("Mapped {} bytes of {:?} at {:#x}", size, device, offset);

        Ok(Self {
            _mmap: mmap,
            base,
            len: size,
        })
    }

    /// Map the block described by a `[registers]` config section.
    pub fn from_section(section: &RegisterSection) -> Result<Self, MapError> {
        Self::map(&section.device, section.base_address, section.size)
    }
}

impl RegisterBlock for MmioRegisters {
    fn backend(&self) -> &'static str {
        "mmio"
    }

    fn len_bytes(&self) -> usize {
        self.len
    }

    fn read_word(&self, index: usize) -> u32 {
        assert!(index < self.len / 4, "word {index} outside mapping");
        // SAFETY: in bounds of the live, page-aligned mapping.
        unsafe { self.base.as_ptr().add(index).read_volatile() }
    }

    fn write_word(&self, index: usize, value: u32) {
        assert!(index < self.len / 4, "word {index} outside mapping");
        // SAFETY: in bounds of the live, page-aligned mapping.
        unsafe { self.base.as_ptr().add(index).write_volatile(value) }
    }
}

impl Drop for MmioRegisters {
    fn drop(&mut self) {
        debug!("Releasing {}-byte register mapping", self.len);
    }
}

fn page_size() -> usize {
    // SAFETY: sysconf has no preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as usize
    } else {
        FALLBACK_PAGE_SIZE
    }
}
