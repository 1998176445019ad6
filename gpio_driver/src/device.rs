//! Device multiplexer: open/read/write/release routed by minor.
//!
//! # Wire protocol
//!
//! | Operation | Behaviour |
//! |-----------|-----------|
//! | `write`   | Buffer replaced by the payload (max 1024 bytes); a leading decimal `0` drives the pin low, `1` drives it high, anything else is consumed and ignored |
//! | `read`    | Echo of the last payload from the session's offset; empty at end |
//!
//! Reads never touch hardware: the echo is what the driver last accepted,
//! not a live level read-back.

use crate::pin_ops::{self, Level};
use crate::registers::RegisterMap;
use crate::registry::{Minor, PinSlot, Registry};
use gpio_common::gpio::consts::MAX_BUFFER_SIZE;
use gpio_common::gpio::pin::PinNumber;
use std::fmt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Per-call device errors. Never affect other devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Minor outside the live registry.
    #[error("no such device: minor {minor}")]
    NoSuchDevice {
        /// Requested identity.
        minor: Minor,
    },
}

/// Why a write was consumed without changing the pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Payload does not start with a decimal integer.
    Malformed,
    /// Payload is an integer other than 0 or 1.
    OutOfRange(i64),
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed input"),
            Self::OutOfRange(value) => write!(f, "value {value} is neither 0 nor 1"),
        }
    }
}

/// What a write did to the pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Pin driven to the given level.
    Applied(Level),
    /// Payload stored, pin unchanged.
    Ignored(IgnoreReason),
}

/// Result of a successful `write`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Bytes reported as consumed: always the full input length.
    pub consumed: usize,
    /// Effect on the pin.
    pub outcome: WriteOutcome,
}

/// An open handle on one device node.
#[derive(Debug, PartialEq, Eq)]
pub struct Session {
    minor: Minor,
    pin: PinNumber,
    offset: usize,
}

impl Session {
    /// Node this session is bound to.
    pub fn minor(&self) -> Minor {
        self.minor
    }

    /// Pin behind the node.
    pub fn pin(&self) -> PinNumber {
        self.pin
    }

    /// Current read position.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Move the read position (like `lseek(SEEK_SET)`).
    pub fn seek(&mut self, offset: usize) {
        self.offset = offset;
    }
}

/// The four operations a device node supports.
pub trait DeviceOps {
    /// Open the node for `minor`.
    fn open(&self, minor: Minor) -> Result<Session, DeviceError>;

    /// Read up to `max_len` bytes of the echo buffer from the session
    /// offset, advancing it.
    fn read(&self, session: &mut Session, max_len: usize) -> Result<Vec<u8>, DeviceError>;

    /// Replace the buffer with `data` and act on it.
    fn write(&self, session: &mut Session, data: &[u8]) -> Result<WriteReport, DeviceError>;

    /// Close the session. No hardware side effect.
    fn release(&self, session: Session);
}

/// Routes device operations to registry slots and the register map.
///
/// Borrowed from a running `GpioDriver`; it cannot outlive the mapping.
#[derive(Clone, Copy)]
pub struct Multiplexer<'a> {
    registry: &'a Registry,
    registers: &'a RegisterMap,
}

impl<'a> Multiplexer<'a> {
    /// Route over `registry`, driving pins through `registers`.
    pub fn new(registry: &'a Registry, registers: &'a RegisterMap) -> Self {
        Self {
            registry,
            registers,
        }
    }

    /// Number of device nodes.
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Whether there are no device nodes.
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Read with an explicit offset, without a session.
    pub fn read_at(
        &self,
        minor: Minor,
        max_len: usize,
        offset: usize,
    ) -> Result<Vec<u8>, DeviceError> {
        let slot = self.slot(minor)?;
        let state = slot.state();
        let len = state.len();

        if offset >= len {
            return Ok(Vec::new());
        }

        let end = offset + max_len.min(len - offset);
        let bytes = state.buffer[offset..end].to_vec();
        debug!("Read {} bytes from minor {}, offset {}", bytes.len(), minor, offset);
        Ok(bytes)
    }

    fn slot(&self, minor: Minor) -> Result<&'a PinSlot, DeviceError> {
        self.registry
            .get(minor)
            .ok_or(DeviceError::NoSuchDevice { minor })
    }
}

impl DeviceOps for Multiplexer<'_> {
    fn open(&self, minor: Minor) -> Result<Session, DeviceError> {
        let slot = self.slot(minor).inspect_err(|_| {
            error!("Invalid minor number: {}", minor);
        })?;

        info!("Device for GPIO pin {} opened", slot.pin());
        Ok(Session {
            minor,
            pin: slot.pin(),
            offset: 0,
        })
    }

    fn read(&self, session: &mut Session, max_len: usize) -> Result<Vec<u8>, DeviceError> {
        let bytes = self.read_at(session.minor, max_len, session.offset)?;
        session.offset += bytes.len();
        Ok(bytes)
    }

    fn write(&self, session: &mut Session, data: &[u8]) -> Result<WriteReport, DeviceError> {
        let slot = self.slot(session.minor)?;
        let pin = slot.pin();
        let kept = &data[..data.len().min(MAX_BUFFER_SIZE)];

        let mut state = slot.state();
        state.buffer = match heapless::Vec::from_slice(kept) {
            Ok(buffer) => buffer,
            Err(_) => {
                error!(
                    "Write of {} bytes to GPIO pin {} does not fit the buffer",
                    kept.len(),
                    pin
                );
                heapless::Vec::new()
            }
        };

        let outcome = match parse_decimal(&state.buffer) {
            None => WriteOutcome::Ignored(IgnoreReason::Malformed),
            Some(0) => WriteOutcome::Applied(Level::Low),
            Some(1) => WriteOutcome::Applied(Level::High),
            Some(value) => WriteOutcome::Ignored(IgnoreReason::OutOfRange(value)),
        };

        match outcome {
            WriteOutcome::Applied(level) => pin_ops::drive(self.registers, pin, level),
            WriteOutcome::Ignored(reason) => {
                warn!("Write to GPIO pin {} ignored: {}", pin, reason);
            }
        }
        drop(state);

        if data.len() > kept.len() {
            debug!(
                "Write to GPIO pin {} truncated from {} to {} bytes",
                pin,
                data.len(),
                kept.len()
            );
        }

        Ok(WriteReport {
            consumed: data.len(),
            outcome,
        })
    }

    fn release(&self, session: Session) {
        info!("Device for GPIO pin {} released", session.pin);
    }
}

/// Parse a leading decimal integer the way `sscanf("%d")` does: optional
/// leading whitespace, optional sign, at least one digit, anything after
/// the digits ignored. Values beyond `i64` saturate.
fn parse_decimal(bytes: &[u8]) -> Option<i64> {
    let mut rest = bytes;
    while let [first, tail @ ..] = rest {
        if !first.is_ascii_whitespace() && *first != 0x0b {
            break;
        }
        rest = tail;
    }

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }

    let magnitude = rest[..digits].iter().fold(0i64, |acc, &digit| {
        acc.saturating_mul(10).saturating_add(i64::from(digit - b'0'))
    });
    Some(if negative { -magnitude } else { magnitude })
}
