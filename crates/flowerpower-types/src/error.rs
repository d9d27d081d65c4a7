//! Error types for flowerpower-types.

use thiserror::Error;

/// Errors that can occur when decoding Flower Power history data.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in flowerpower-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Failed to parse data due to malformed or insufficient bytes.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Insufficient bytes for the expected data format.
    #[error("Insufficient bytes: expected {expected}, got {actual}")]
    InsufficientBytes {
        /// Expected number of bytes.
        expected: usize,
        /// Actual number of bytes received.
        actual: usize,
    },

    /// A record's raw code lies outside a calibration function's domain.
    #[error("Record {index}: {source}")]
    Calibration {
        /// Absolute index of the offending record.
        index: u32,
        /// The underlying calibration error.
        #[source]
        source: CalibrationError,
    },
}

/// Result type alias using flowerpower-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;

/// A raw sensor code for which a calibration curve is undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CalibrationError {
    /// The sunlight power law diverges at a raw code of zero.
    #[error("sunlight is undefined for raw code 0")]
    SunlightZero,
}

/// Errors returned by [`crate::merge::merge`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MergeError {
    /// The two logs come from different devices.
    #[error("Cannot merge logs of different devices: {left} and {right}")]
    AddressMismatch {
        /// Address of the first log.
        left: String,
        /// Address of the second log.
        right: String,
    },
}
