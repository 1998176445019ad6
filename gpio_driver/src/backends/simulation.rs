//! In-memory register block for development and testing without hardware.
//!
//! Words are plain atomics. Writes to `GPSET0`/`GPCLR0` additionally update
//! a simulated output-level word so tests can observe the pin state the
//! hardware would drive. Dropping the block marks it unmapped, which a
//! `RegisterView` can observe after the driver has released it.

use crate::registers::RegisterBlock;
use gpio_common::gpio::consts::{GPCLR0, GPSET0, REGISTER_WORD_SIZE};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::trace;

#[derive(Debug)]
struct SimulationState {
    words: Vec<AtomicU32>,
    levels: AtomicU32,
    mapped: AtomicBool,
}

/// Simulated GPIO register block.
#[derive(Debug)]
pub struct SimulatedRegisters {
    state: Arc<SimulationState>,
}

/// Read-only handle onto a `SimulatedRegisters` block that outlives it.
#[derive(Debug, Clone)]
pub struct RegisterView {
    state: Arc<SimulationState>,
}

impl SimulatedRegisters {
    /// Create a zeroed block spanning `size` bytes.
    pub fn new(size: usize) -> Self {
        let words = (0..size / REGISTER_WORD_SIZE)
            .map(|_| AtomicU32::new(0))
            .collect();
        Self {
            state: Arc::new(SimulationState {
                words,
                levels: AtomicU32::new(0),
                mapped: AtomicBool::new(true),
            }),
        }
    }

    /// Handle for inspecting the block from outside the driver.
    pub fn view(&self) -> RegisterView {
        RegisterView {
            state: Arc::clone(&self.state),
        }
    }
}

impl RegisterBlock for SimulatedRegisters {
    fn backend(&self) -> &'static str {
        "simulation"
    }

    fn len_bytes(&self) -> usize {
        self.state.words.len() * REGISTER_WORD_SIZE
    }

    fn read_word(&self, index: usize) -> u32 {
        self.state.words[index].load(Ordering::SeqCst)
    }

    fn write_word(&self, index: usize, value: u32) {
        self.state.words[index].store(value, Ordering::SeqCst);

        match index * REGISTER_WORD_SIZE {
            GPSET0 => {
                self.state.levels.fetch_or(value, Ordering::SeqCst);
            }
            GPCLR0 => {
                self.state.levels.fetch_and(!value, Ordering::SeqCst);
            }
            _ => {}
        }
        trace!(index, value = format_args!("{value:#010x}"), "simulated register write");
    }
}

impl Drop for SimulatedRegisters {
    fn drop(&mut self) {
        self.state.mapped.store(false, Ordering::SeqCst);
    }
}

impl RegisterView {
    /// Current value of word `index`.
    pub fn word(&self, index: usize) -> u32 {
        self.state.words[index].load(Ordering::SeqCst)
    }

    /// Preload word `index`, e.g. to seed neighbouring function-select fields.
    pub fn set_word(&self, index: usize, value: u32) {
        self.state.words[index].store(value, Ordering::SeqCst);
    }

    /// Simulated output level of `pin`.
    pub fn level(&self, pin: u8) -> bool {
        self.state.levels.load(Ordering::SeqCst) & (1 << pin) != 0
    }

    /// Whether the block is still owned by a register map.
    pub fn is_mapped(&self) -> bool {
        self.state.mapped.load(Ordering::SeqCst)
    }
}
