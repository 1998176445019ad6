//! Pin registry: minor identity to per-pin state.
//!
//! Built once at startup from the configured pin list and immutable in
//! shape afterwards: slots are never inserted or removed while devices are
//! live. Each slot's buffer sits behind its own lock.

use gpio_common::gpio::consts::{MAX_BUFFER_SIZE, MAX_PINS};
use gpio_common::gpio::pin::{PinError, PinNumber};
use parking_lot::Mutex;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info};

// ─── Error Types ────────────────────────────────────────────────────

/// Pin list validation error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// An element is outside the valid pin range.
    #[error("pins[{index}]: {source}")]
    InvalidPin {
        /// Position in the input list.
        index: usize,
        /// Range check failure.
        #[source]
        source: PinError,
    },

    /// The same pin appears twice.
    #[error("pins[{index}]: pin {pin} already configured at pins[{first}]")]
    DuplicatePin {
        /// Position of the repeat.
        index: usize,
        /// Index of the first occurrence.
        first: usize,
        /// The repeated pin.
        pin: PinNumber,
    },

    /// More pins than one driver instance can expose.
    #[error("too many pins: {count} (max {MAX_PINS})")]
    TooManyPins {
        /// Number of pins supplied.
        count: usize,
    },
}

// ─── Minor ──────────────────────────────────────────────────────────

/// Device identity: 0-based index of a pin in the configured list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Minor(u32);

impl Minor {
    /// Wrap a raw minor number.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw minor number.
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Slot index.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Minor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── PinState ───────────────────────────────────────────────────────

/// Mutable per-pin state: the last payload written to the node.
#[derive(Debug, Clone, Default)]
pub struct PinState {
    /// Last write payload, truncated to `MAX_BUFFER_SIZE`.
    pub buffer: heapless::Vec<u8, MAX_BUFFER_SIZE>,
}

impl PinState {
    /// Number of valid bytes in the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// One registry entry.
#[derive(Debug)]
pub struct PinSlot {
    minor: Minor,
    pin: PinNumber,
    state: Mutex<PinState>,
}

impl PinSlot {
    /// Identity of this slot.
    pub fn minor(&self) -> Minor {
        self.minor
    }

    /// Pin this slot drives.
    pub fn pin(&self) -> PinNumber {
        self.pin
    }

    /// Exclusive access to the slot's buffer.
    pub fn state(&self) -> parking_lot::MutexGuard<'_, PinState> {
        self.state.lock()
    }
}

// ─── Registry ───────────────────────────────────────────────────────

/// Fixed-length table of pin slots indexed by `Minor`.
#[derive(Debug)]
pub struct Registry {
    slots: Vec<PinSlot>,
}

impl Registry {
    /// Validate `pins` and build one slot per pin, in input order.
    ///
    /// # Errors
    /// Fails on the first invalid element; no partial registry is
    /// produced.
    pub fn build(pins: &[i64]) -> Result<Self, RegistryError> {
        if pins.len() > MAX_PINS {
            error!("{} pins configured, at most {} supported", pins.len(), MAX_PINS);
            return Err(RegistryError::TooManyPins { count: pins.len() });
        }

        let mut validated: Vec<PinNumber> = Vec::with_capacity(pins.len());
        for (index, &value) in pins.iter().enumerate() {
            let pin = PinNumber::new(value).map_err(|source| {
                error!("pins[{}]: {} rejected", index, value);
                RegistryError::InvalidPin { index, source }
            })?;

            if let Some(first) = validated.iter().position(|&p| p == pin) {
                error!("pins[{}]: pin {} repeats pins[{}]", index, pin, first);
                return Err(RegistryError::DuplicatePin { index, first, pin });
            }
            validated.push(pin);
        }

        let slots: Vec<PinSlot> = validated
            .into_iter()
            .enumerate()
            .map(|(index, pin)| PinSlot {
                minor: Minor::new(index as u32),
                pin,
                state: Mutex::new(PinState::default()),
            })
            .collect();

        for slot in &slots {
            debug!("  minor {} -> pin {}", slot.minor, slot.pin);
        }
        info!("Registry built with {} pins", slots.len());

        Ok(Self { slots })
    }

    /// Slot for `minor`, if it is live.
    pub fn get(&self, minor: Minor) -> Option<&PinSlot> {
        self.slots.get(minor.index())
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the registry holds no pins.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots in minor order.
    pub fn iter(&self) -> impl Iterator<Item = &PinSlot> {
        self.slots.iter()
    }

    /// Configured pins in minor order.
    pub fn pins(&self) -> Vec<PinNumber> {
        self.slots.iter().map(|slot| slot.pin).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpio_common::gpio::consts::{GPIO_MAX, GPIO_MIN};
    use proptest::prelude::*;
    use proptest::sample::{Index, subsequence};

    /// Any ordering of distinct valid pins.
    fn valid_pin_list() -> impl Strategy<Value = Vec<i64>> {
        let all: Vec<i64> = (i64::from(GPIO_MIN)..=i64::from(GPIO_MAX)).collect();
        let len = all.len();
        subsequence(all, 0..=len).prop_shuffle()
    }

    fn out_of_range_value() -> impl Strategy<Value = i64> {
        prop_oneof![
            i64::MIN..i64::from(GPIO_MIN),
            (i64::from(GPIO_MAX) + 1)..=i64::MAX,
        ]
    }

    #[test]
    fn build_assigns_minors_in_input_order() {
        let registry = Registry::build(&[22, 17, 4]).unwrap();
        assert_eq!(registry.len(), 3);

        let pins: Vec<u8> = registry.pins().iter().map(|p| p.get()).collect();
        assert_eq!(pins, vec![22, 17, 4]);

        let minors: Vec<u32> = registry.iter().map(|s| s.minor().get()).collect();
        assert_eq!(minors, vec![0, 1, 2]);
    }

    #[test]
    fn slots_start_with_empty_buffers() {
        let registry = Registry::build(&[17, 22]).unwrap();
        for slot in registry.iter() {
            assert!(slot.state().is_empty());
        }
    }

    #[test]
    fn build_is_deterministic() {
        let a = Registry::build(&[5, 6, 13]).unwrap();
        let b = Registry::build(&[5, 6, 13]).unwrap();
        assert_eq!(a.pins(), b.pins());
    }

    #[test]
    fn invalid_pin_reports_index_and_value() {
        let err = Registry::build(&[17, 22, 1, 40]).unwrap_err();
        assert_eq!(
            err,
            RegistryError::InvalidPin {
                index: 2,
                source: PinError::OutOfRange { value: 1 },
            }
        );
        assert!(err.to_string().starts_with("pins[2]"));
    }

    #[test]
    fn duplicate_pin_is_rejected() {
        let err = Registry::build(&[17, 22, 17]).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicatePin { index: 2, first: 0, .. }
        ));
    }

    #[test]
    fn too_many_pins_is_rejected() {
        let pins: Vec<i64> = (0..=MAX_PINS as i64).map(|i| 2 + i % 26).collect();
        assert!(matches!(
            Registry::build(&pins),
            Err(RegistryError::TooManyPins { count }) if count == MAX_PINS + 1
        ));
    }

    #[test]
    fn empty_list_builds_empty_registry() {
        let registry = Registry::build(&[]).unwrap();
        assert!(registry.is_empty());
        assert!(registry.get(Minor::new(0)).is_none());
    }

    #[test]
    fn get_out_of_bounds_is_none() {
        let registry = Registry::build(&[17]).unwrap();
        assert_eq!(registry.get(Minor::new(0)).unwrap().pin().get(), 17);
        assert!(registry.get(Minor::new(1)).is_none());
    }

    proptest! {
        #[test]
        fn valid_lists_build_in_order(pins in valid_pin_list()) {
            let registry = Registry::build(&pins).unwrap();
            prop_assert_eq!(registry.len(), pins.len());

            for (index, (slot, &value)) in registry.iter().zip(&pins).enumerate() {
                prop_assert_eq!(slot.minor(), Minor::new(index as u32));
                prop_assert_eq!(i64::from(slot.pin()), value);
                prop_assert!(slot.state().is_empty());
            }
        }

        #[test]
        fn one_out_of_range_value_fails_at_its_index(
            pins in valid_pin_list(),
            bad in out_of_range_value(),
            at in any::<Index>(),
        ) {
            let mut pins = pins;
            let index = at.index(pins.len() + 1);
            pins.insert(index, bad);

            prop_assert_eq!(
                Registry::build(&pins).unwrap_err(),
                RegistryError::InvalidPin {
                    index,
                    source: PinError::OutOfRange { value: bad },
                }
            );
        }
    }
}
