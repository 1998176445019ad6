//! Mapped GPIO register block.
//!
//! `RegisterMap` owns one mapped register block (behind the `RegisterBlock`
//! trait) and exposes word access by byte offset. Every access is
//! bounds-checked against the mapped span; the MMIO backend performs the
//! actual volatile loads and stores.
//!
//! The map also owns one lock per function-select word so that
//! read-modify-write sequences on a shared word never interleave.

use gpio_common::gpio::consts::{FSEL_WORDS, MIN_REGISTER_SPAN, REGISTER_WORD_SIZE};
use parking_lot::{Mutex, MutexGuard};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, trace};

/// Errors raised while mapping a register block.
#[derive(Debug, Error)]
pub enum MapError {
    /// The register device could not be opened.
    #[error("failed to open register device {path:?}: {source}")]
    Open {
        /// Device path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// `mmap` of the register device failed.
    #[error("failed to map {size} bytes at {offset:#x}: {source}")]
    Mmap {
        /// Offset into the device.
        offset: u64,
        /// Requested span.
        size: usize,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Mapping offset is not page-aligned.
    #[error("register offset {offset:#x} is not aligned to the {page_size}-byte page size")]
    Unaligned {
        /// Requested offset.
        offset: u64,
        /// System page size.
        page_size: usize,
    },

    /// Mapped span does not reach the set/clear registers.
    #[error("register block of {size} bytes is smaller than the required {required} bytes")]
    BlockTooSmall {
        /// Mapped span.
        size: usize,
        /// Minimum span.
        required: usize,
    },

    /// No backend registered under the requested name.
    #[error("unknown register backend: {0}")]
    UnknownBackend(String),
}

/// A mapped span of 32-bit hardware registers.
///
/// Implementations must make every `read_word`/`write_word` a single,
/// uncached access that is not reordered with other accesses to the block.
pub trait RegisterBlock: Send + Sync {
    /// Backend identifier (e.g., "mmio", "simulation").
    fn backend(&self) -> &'static str;

    /// Mapped span in bytes.
    fn len_bytes(&self) -> usize;

    /// Load the word at `index` (word-granular, not byte offset).
    fn read_word(&self, index: usize) -> u32;

    /// Store `value` into the word at `index`.
    fn write_word(&self, index: usize, value: u32);
}

/// Owned view of the GPIO register block.
pub struct RegisterMap {
    block: Box<dyn RegisterBlock>,
    fsel_locks: [Mutex<()>; FSEL_WORDS],
}

impl RegisterMap {
    /// Wrap a mapped block.
    ///
    /// # Errors
    /// Returns `MapError::BlockTooSmall` if the block does not cover
    /// every register the driver touches.
    pub fn new(block: Box<dyn RegisterBlock>) -> Result<Self, MapError> {
        let size = block.len_bytes();
        if size < MIN_REGISTER_SPAN {
            return Err(MapError::BlockTooSmall {
                size,
                required: MIN_REGISTER_SPAN,
            });
        }

        info!("Register block mapped: backend={}, {} bytes", block.backend(), size);

        Ok(Self {
            block,
            fsel_locks: std::array::from_fn(|_| Mutex::new(())),
        })
    }

    /// Backend the block came from.
    pub fn backend(&self) -> &'static str {
        self.block.backend()
    }

    /// Read the register at byte `offset`.
    ///
    /// # Panics
    /// Panics if `offset` is unaligned or outside the mapped span.
    pub fn read(&self, offset: usize) -> u32 {
        self.block.read_word(self.word_index(offset))
    }

    /// Write `value` to the register at byte `offset`.
    ///
    /// # Panics
    /// Panics if `offset` is unaligned or outside the mapped span.
    pub fn write(&self, offset: usize, value: u32) {
        self.block.write_word(self.word_index(offset), value);
    }

    /// Exclusive access to function-select word `word` for a
    /// read-modify-write.
    pub(crate) fn lock_fsel(&self, word: usize) -> MutexGuard<'_, ()> {
        self.fsel_locks[word].lock()
    }

    /// Release the mapping.
    pub fn unmap(self) {
        info!("Unmapping register block (backend={})", self.block.backend());
    }

    fn word_index(&self, offset: usize) -> usize {
        assert!(
            offset % REGISTER_WORD_SIZE == 0 && offset + REGISTER_WORD_SIZE <= self.block.len_bytes(),
            "register offset {offset:#x} outside the {}-byte block",
            self.block.len_bytes()
        );
        trace!(offset, "register access");
        offset / REGISTER_WORD_SIZE
    }
}
