//! Validated GPIO pin numbers.

use crate::gpio::consts::{GPIO_MAX, GPIO_MIN};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Pin number validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PinError {
    /// Value outside `[GPIO_MIN, GPIO_MAX]`.
    #[error("pin {value} out of range (valid pins are {GPIO_MIN} to {GPIO_MAX} inclusive)")]
    OutOfRange {
        /// Rejected value.
        value: i64,
    },
}

/// A GPIO pin number in `[GPIO_MIN, GPIO_MAX]`.
///
/// Holding a `PinNumber` is proof the range check happened, so register
/// arithmetic on it never needs to re-validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct PinNumber(u8);

impl PinNumber {
    /// Validate `value` and wrap it.
    ///
    /// # Errors
    /// Returns `PinError::OutOfRange` if `value` is not a usable pin.
    pub fn new(value: i64) -> Result<Self, PinError> {
        if value < GPIO_MIN as i64 || value > GPIO_MAX as i64 {
            return Err(PinError::OutOfRange { value });
        }
        Ok(Self(value as u8))
    }

    /// Raw pin number.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Single-bit mask for the set/clear registers.
    pub const fn bit(self) -> u32 {
        1 << self.0
    }
}

impl TryFrom<i64> for PinNumber {
    type Error = PinError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PinNumber> for i64 {
    fn from(pin: PinNumber) -> Self {
        pin.0 as i64
    }
}

impl fmt::Display for PinNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
