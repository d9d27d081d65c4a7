//! Platform-agnostic types for Parrot Flower Power sensors.
//!
//! This crate holds everything about the Flower Power history that does not
//! need a Bluetooth stack: GATT UUIDs, the calibration curves, the binary
//! history decoder, the measurement log model with its JSON schema, and the
//! merge of two logs.
//!
//! # Example
//!
//! ```
//! use flowerpower_types::{DecodeParams, decode_history};
//!
//! let mut buffer = vec![0u8; 16];
//! buffer[4..8].copy_from_slice(&100u32.to_be_bytes());
//! // air, light, ec, soil temp, vwc, battery
//! for code in [600u16, 800, 0, 610, 1500, 0] {
//!     buffer.extend_from_slice(&code.to_be_bytes());
//! }
//!
//! let params = DecodeParams {
//!     host_time: 1_600_000_000,
//!     device_time: 5_000,
//!     first_entry_index: 1,
//!     last_entry_index: 1,
//!     number_entries: 1,
//!     measurement_period: 900,
//! };
//! let measurements = decode_history(&buffer, &params).unwrap();
//! assert_eq!(measurements[0].index, 1);
//! assert_eq!(measurements[0].timestamp, 1_600_000_000 - 5_000 + 100);
//! ```

pub mod calibration;
pub mod error;
pub mod history;
pub mod merge;
pub mod types;
pub mod uuid;

pub use error::{CalibrationError, MergeError, ParseError, ParseResult};
pub use history::{DecodeParams, HEADER_SIZE, HistoryHeader, RECORD_SIZE, decode_history};
pub use merge::{measurements_contain, merge};
pub use types::{
    HistoryLog, MATCH_TOLERANCE_SECS, Measurement, RawData, RxControl, TxStatus, format_date,
};
pub use uuid as uuids;
pub use uuid::Characteristic;
