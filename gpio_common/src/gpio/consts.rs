//! GPIO constants.
//!
//! Register offsets follow the BCM2835 ARM Peripherals datasheet, section 6.1.
//! Single source of truth for all numeric limits and default paths.

use static_assertions::const_assert;

/// Canonical driver name (used for host registration and logging).
pub const DRIVER_NAME: &str = "rpi-gpio";

/// Physical base address of the GPIO register block (RPi 3 Model B v1.2).
pub const GPIO_BASE_ADDRESS: u64 = 0x3f20_0000;

/// Size of the mapped register block (one page).
pub const REGISTER_BLOCK_SIZE: usize = 4096;

/// Width of one register word in bytes.
pub const REGISTER_WORD_SIZE: usize = 4;

/// Byte offset of the first function-select register.
pub const GPFSEL0: usize = 0x00;

/// Number of function-select registers (10 pins each, 3 bits per pin).
pub const FSEL_WORDS: usize = 6;

/// Pins covered by one function-select register.
pub const PINS_PER_FSEL_WORD: u8 = 10;

/// Width of a function-select field in bits.
pub const FSEL_FIELD_BITS: u32 = 3;

/// Function-select field mask (before shifting).
pub const FSEL_MASK: u32 = 0b111;

/// Function-select value for "output".
pub const FSEL_OUTPUT: u32 = 0b001;

/// Byte offset of the output set register (pins 0-31).
pub const GPSET0: usize = 0x1c;

/// Byte offset of the output clear register (pins 0-31).
pub const GPCLR0: usize = 0x28;

/// Smallest register span a mapping must cover.
pub const MIN_REGISTER_SPAN: usize = GPCLR0 + REGISTER_WORD_SIZE;

/// Lowest pin number the driver accepts.
pub const GPIO_MIN: u8 = 2;

/// Highest pin number the driver accepts.
pub const GPIO_MAX: u8 = 27;

/// Maximum number of pins one driver instance exposes.
pub const MAX_PINS: usize = 32;

/// Per-node write buffer capacity in bytes.
pub const MAX_BUFFER_SIZE: usize = 1024;

/// Default device node name prefix (`/dev/led17`).
pub const DEFAULT_DEVICE_PREFIX: &str = "led";

/// Default directory device nodes are created in.
pub const DEFAULT_DEVICE_DIR: &str = "/dev";

/// Default character device used to map physical memory.
pub const DEFAULT_REGISTER_DEVICE: &str = "/dev/mem";

/// Default register backend name.
pub const DEFAULT_BACKEND: &str = "mmio";

/// Default FIFO poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/rpi-gpio/gpio.toml";

const_assert!(MIN_REGISTER_SPAN <= REGISTER_BLOCK_SIZE);
const_assert!(GPFSEL0 + FSEL_WORDS * REGISTER_WORD_SIZE <= GPSET0);
const_assert!((GPIO_MAX as usize) < 32);
const_assert!((GPIO_MAX / PINS_PER_FSEL_WORD) < FSEL_WORDS as u8);
