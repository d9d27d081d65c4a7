//! Error types for flowerpower-core.
//!
//! This module defines the errors that can occur while talking to a Flower
//! Power over Bluetooth Low Energy and while running the history download
//! protocol.
//!
//! # Recovery
//!
//! | Error Type | Strategy |
//! |------------|----------|
//! | [`Error::Timeout`] | Retry the whole download; the session is lost |
//! | [`Error::Disconnected`] | Reconnect and retry; nothing was stored |
//! | [`Error::Bluetooth`] | Retry, then check the adapter |
//! | [`Error::DeviceNotFound`] | Do not retry; device out of range or wrong address |
//! | [`Error::CharacteristicNotFound`] | Do not retry; not a Flower Power or unsupported firmware |
//! | [`Error::ProtocolViolation`] | Do not retry; report, the device broke a protocol assumption |
//! | [`Error::MissingFragment`] | Retry the download |
//! | [`Error::Parse`] | Do not retry; the history buffer is corrupt |
//!
//! A download never returns a partial log: any of the errors above means no
//! [`HistoryLog`](flowerpower_types::HistoryLog) was produced.

use std::time::Duration;

use thiserror::Error;

use crate::protocol::{EventKind, State};

/// Errors that can occur when downloading from Flower Power devices.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Device not found during scan or connection.
    #[error("Device not found: {0}")]
    DeviceNotFound(DeviceNotFoundReason),

    /// Operation attempted while not connected to device.
    #[error("Not connected to device")]
    NotConnected,

    /// Required BLE characteristic not found on device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// The state machine received an event it has no transition for.
    #[error("Protocol violation: no transition for event '{event}' in state '{state}'")]
    ProtocolViolation {
        /// State the machine was in.
        state: State,
        /// The offending event.
        event: EventKind,
    },

    /// A buffer fragment never arrived.
    #[error("Missing fragment {sequence} of {expected}")]
    MissingFragment {
        /// 1-based sequence number of the first missing fragment.
        sequence: u32,
        /// Number of fragments the buffer should consist of.
        expected: u32,
    },

    /// Failed to interpret data received from device.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// The reassembled history buffer could not be decoded.
    #[error("History decode failed: {0}")]
    Parse(#[from] flowerpower_types::ParseError),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// The device went away before the download finished.
    #[error("Device disconnected during download (state '{state}')")]
    Disconnected {
        /// State the machine was in when the link dropped.
        state: State,
    },

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,
}

/// Reason why a device was not found.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum DeviceNotFoundReason {
    /// Device with specified address not found.
    NotFound { identifier: String },
    /// Scan timed out before finding device.
    ScanTimeout { duration: Duration },
    /// No Bluetooth adapter available.
    NoAdapter,
}

impl std::fmt::Display for DeviceNotFoundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { identifier } => write!(f, "device '{}' not found", identifier),
            Self::ScanTimeout { duration } => write!(f, "scan timed out after {:?}", duration),
            Self::NoAdapter => write!(f, "no Bluetooth adapter available"),
        }
    }
}

impl Error {
    /// Create a device not found error for a specific identifier.
    pub fn device_not_found(identifier: impl Into<String>) -> Self {
        Self::DeviceNotFound(DeviceNotFoundReason::NotFound {
            identifier: identifier.into(),
        })
    }

    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create an invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData(message.into())
    }
}

/// Result type alias using flowerpower-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
