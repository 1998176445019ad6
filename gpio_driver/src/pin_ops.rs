//! Register arithmetic for configuring and driving output pins.
//!
//! Function-select layout: `GPFSEL0..GPFSEL5`, ten pins per word, three
//! bits per pin. Pin `p` lives in word `p / 10` at bit `(p % 10) * 3`.
//! `GPSET0`/`GPCLR0` are write-to-act: writing a 1 bit drives that pin
//! high/low and zero bits are ignored, so no read-modify-write is needed.

use crate::registers::RegisterMap;
use gpio_common::gpio::consts::{
    FSEL_FIELD_BITS, FSEL_MASK, FSEL_OUTPUT, GPCLR0, GPFSEL0, GPSET0, PINS_PER_FSEL_WORD,
    REGISTER_WORD_SIZE,
};
use gpio_common::gpio::pin::PinNumber;
use std::fmt;
use tracing::debug;

/// Output drive level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Pin driven low (written to `GPCLR0`).
    Low,
    /// Pin driven high (written to `GPSET0`).
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Function-select word holding `pin`'s field.
pub const fn fsel_word_index(pin: u8) -> usize {
    (pin / PINS_PER_FSEL_WORD) as usize
}

/// Bit offset of `pin`'s field within its function-select word.
pub const fn fsel_shift(pin: u8) -> u32 {
    (pin % PINS_PER_FSEL_WORD) as u32 * FSEL_FIELD_BITS
}

/// Function-select word with `pin`'s field replaced by `FSEL_OUTPUT`.
pub const fn with_output_field(word: u32, pin: u8) -> u32 {
    let shift = fsel_shift(pin);
    (word & !(FSEL_MASK << shift)) | (FSEL_OUTPUT << shift)
}

/// Configure `pin` as an output.
///
/// Holds the function-select word's lock across the read-modify-write so
/// a concurrent `set_output` on a neighbouring pin cannot lose an update.
pub fn set_output(registers: &RegisterMap, pin: PinNumber) {
    let word = fsel_word_index(pin.get());
    let offset = GPFSEL0 + word * REGISTER_WORD_SIZE;

    let _guard = registers.lock_fsel(word);
    let before = registers.read(offset);
    let after = with_output_field(before, pin.get());
    registers.write(offset, after);

    debug!(
        "set_output({}): GPFSEL{} {:#010x} -> {:#010x}",
        pin, word, before, after
    );
}

/// Drive `pin` high.
pub fn drive_high(registers: &RegisterMap, pin: PinNumber) {
    debug!("drive_high({})", pin);
    registers.write(GPSET0, pin.bit());
}

/// Drive `pin` low.
pub fn drive_low(registers: &RegisterMap, pin: PinNumber) {
    debug!("drive_low({})", pin);
    registers.write(GPCLR0, pin.bit());
}

/// Drive `pin` to `level`.
pub fn drive(registers: &RegisterMap, pin: PinNumber, level: Level) {
    match level {
        Level::High => drive_high(registers, pin),
        Level::Low => drive_low(registers, pin),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::simulation::{RegisterView, SimulatedRegisters};
    use gpio_common::gpio::consts::{GPIO_MAX, GPIO_MIN, REGISTER_BLOCK_SIZE};
    use proptest::prelude::*;

    fn sim_map() -> (RegisterMap, RegisterView) {
        let block = SimulatedRegisters::new(REGISTER_BLOCK_SIZE);
        let view = block.view();
        (RegisterMap::new(Box::new(block)).unwrap(), view)
    }

    fn pin(value: i64) -> PinNumber {
        PinNumber::new(value).unwrap()
    }

    #[test]
    fn word_and_shift_for_known_pins() {
        assert_eq!((fsel_word_index(2), fsel_shift(2)), (0, 6));
        assert_eq!((fsel_word_index(9), fsel_shift(9)), (0, 27));
        assert_eq!((fsel_word_index(10), fsel_shift(10)), (1, 0));
        assert_eq!((fsel_word_index(17), fsel_shift(17)), (1, 21));
        assert_eq!((fsel_word_index(27), fsel_shift(27)), (2, 21));
    }

    #[test]
    fn set_output_writes_field_in_correct_word() {
        let (map, view) = sim_map();
        set_output(&map, pin(17));
        assert_eq!(view.word(1), 0b001 << 21);
        assert_eq!(view.word(0), 0);
        assert_eq!(view.word(2), 0);
    }

    #[test]
    fn set_output_replaces_alternate_function() {
        let (map, view) = sim_map();
        // ALT0 (0b100) on pin 14, ALT5 (0b010) on pin 15.
        view.set_word(1, (0b100 << 12) | (0b010 << 15));
        set_output(&map, pin(14));
        assert_eq!(view.word(1), (0b001 << 12) | (0b010 << 15));
    }

    #[test]
    fn drive_high_and_low_write_single_bits() {
        let (map, view) = sim_map();
        set_output(&map, pin(17));
        set_output(&map, pin(22));

        drive_high(&map, pin(17));
        assert_eq!(view.word(GPSET0 / 4), 1 << 17);
        assert!(view.level(17));
        assert!(!view.level(22));

        drive_low(&map, pin(22));
        assert_eq!(view.word(GPCLR0 / 4), 1 << 22);
        assert!(view.level(17));
        assert!(!view.level(22));
    }

    #[test]
    fn drive_dispatches_on_level() {
        let (map, view) = sim_map();
        drive(&map, pin(5), Level::High);
        assert!(view.level(5));
        drive(&map, pin(5), Level::Low);
        assert!(!view.level(5));
        assert_eq!(Level::High.to_string(), "high");
    }

    proptest! {
        #[test]
        fn set_output_is_idempotent(p in GPIO_MIN..=GPIO_MAX, seed in any::<u32>()) {
            let once = with_output_field(seed, p);
            prop_assert_eq!(with_output_field(once, p), once);
        }

        #[test]
        fn set_output_leaves_other_fields_untouched(p in GPIO_MIN..=GPIO_MAX, seed in any::<u32>()) {
            let mask = FSEL_MASK << fsel_shift(p);
            let after = with_output_field(seed, p);
            prop_assert_eq!(after & !mask, seed & !mask);
            prop_assert_eq!((after & mask) >> fsel_shift(p), FSEL_OUTPUT);
        }

        #[test]
        fn set_output_on_live_map_is_idempotent(p in GPIO_MIN..=GPIO_MAX, seed in any::<u32>()) {
            let (map, view) = sim_map();
            let word = fsel_word_index(p);
            view.set_word(word, seed);

            set_output(&map, pin(p as i64));
            let once = view.word(word);
            set_output(&map, pin(p as i64));
            prop_assert_eq!(view.word(word), once);
        }
    }
}
