pub mod htu21d;
pub mod s8;

use thiserror_no_std::Error;

pub use htu21d::Htu21d;
pub use s8::{S8, S8Reading};

/// Errors raised by a single sensor transaction.
///
/// Drivers never retry; every variant is surfaced to the caller, which owns
/// the retry policy.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: CRC mismatch, possible communication fault")]
    Checksum { sensor: &'static str },
    #[error("{sensor}: malformed frame, expected {expected} bytes but received {received}")]
    MalformedFrame {
        sensor: &'static str,
        expected: usize,
        received: usize,
    },
    #[error("{sensor}: no response within the read timeout")]
    Timeout { sensor: &'static str },
    #[error("{sensor}: I2C error during {operation}: {kind:?}")]
    I2c {
        sensor: &'static str,
        operation: &'static str,
        kind: embedded_hal::i2c::ErrorKind,
    },
    #[error("{sensor}: serial error during {operation}: {kind:?}")]
    Serial {
        sensor: &'static str,
        operation: &'static str,
        kind: embedded_io::ErrorKind,
    },
}
