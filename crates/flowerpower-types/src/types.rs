//! Core types for Flower Power history data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

use crate::calibration;
use crate::error::CalibrationError;

/// Two measurements of the same index are the same sample if their
/// timestamps differ by less than this many seconds.
pub const MATCH_TOLERANCE_SECS: u64 = 300;

/// Transfer status reported by the device on the tx_status characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum TxStatus {
    /// No transfer in progress.
    Idle = 0,
    /// Buffer fragments are being sent.
    Transferring = 1,
    /// The device waits for the host to acknowledge a block.
    AwaitingAck = 2,
}

impl TryFrom<u8> for TxStatus {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(TxStatus::Idle),
            1 => Ok(TxStatus::Transferring),
            2 => Ok(TxStatus::AwaitingAck),
            other => Err(other),
        }
    }
}

/// Control byte written by the host to the rx_status characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum RxControl {
    Standby = 0,
    Receiving = 1,
    Ack = 2,
    Nack = 3,
    Cancel = 4,
    Error = 5,
}

impl TryFrom<u8> for RxControl {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        match value {
            0 => Ok(RxControl::Standby),
            1 => Ok(RxControl::Receiving),
            2 => Ok(RxControl::Ack),
            3 => Ok(RxControl::Nack),
            4 => Ok(RxControl::Cancel),
            5 => Ok(RxControl::Error),
            other => Err(other),
        }
    }
}

/// The four raw sensor codes of one history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct RawData {
    pub air_temperature: u16,
    pub soil_temperature: u16,
    #[cfg_attr(feature = "serde", serde(rename = "soil-moisture"))]
    pub soil_vwc: u16,
    #[cfg_attr(feature = "serde", serde(rename = "sunlight"))]
    pub light: u16,
}

/// One decoded, calibrated history record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct Measurement {
    /// Absolute record sequence number.
    pub index: u32,
    /// Local-time rendering of `timestamp`. Informational only.
    pub date: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Air temperature in °C.
    pub air_temperature: f64,
    /// Soil temperature in °C.
    pub soil_temperature: f64,
    /// Soil moisture in percent.
    pub soil_moisture: f64,
    /// Sunlight in mol·m⁻²·d⁻¹.
    pub sunlight: f64,
    #[cfg_attr(feature = "serde", serde(rename = "raw-values"))]
    pub raw: RawData,
}

impl Measurement {
    /// Calibrate raw codes into a measurement.
    ///
    /// # Errors
    ///
    /// Fails when a raw code is outside a calibration curve's domain.
    pub fn from_raw(index: u32, timestamp: i64, raw: RawData) -> Result<Self, CalibrationError> {
        Ok(Self {
            index,
            date: format_date(timestamp),
            timestamp,
            air_temperature: calibration::temperature(raw.air_temperature),
            soil_temperature: calibration::temperature(raw.soil_temperature),
            soil_moisture: calibration::soil_moisture(raw.soil_vwc),
            sunlight: calibration::sunlight(raw.light)?,
            raw,
        })
    }

    /// Whether `other` is the same sample as `self`.
    ///
    /// Indices and raw codes must be equal and timestamps within
    /// [`MATCH_TOLERANCE_SECS`]. Calibrated values are not compared; they
    /// are a pure function of the raw codes.
    #[must_use]
    pub fn matches(&self, other: &Measurement) -> bool {
        self.index == other.index
            && self.timestamp.abs_diff(other.timestamp) < MATCH_TOLERANCE_SECS
            && self.raw == other.raw
    }
}

/// A downloaded (or merged) measurement log of one device.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct HistoryLog {
    /// Bluetooth address of the device.
    pub address: String,
    pub first_entry_index: u32,
    pub last_entry_index: u32,
    pub session_start_index: u32,
    /// Seconds between records.
    #[cfg_attr(feature = "serde", serde(rename = "period"))]
    pub measurement_period: u32,
    pub session_id: u32,
    pub measurements: Vec<Measurement>,
}

impl HistoryLog {
    /// Number of measurements in the log.
    #[must_use]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    /// Whether the log holds no measurements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }
}

impl fmt::Display for HistoryLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} measurements (entries {}..={}, session {}, period {}s)",
            self.address,
            self.measurements.len(),
            self.first_entry_index,
            self.last_entry_index,
            self.session_id,
            self.measurement_period
        )
    }
}

/// Render a Unix timestamp as `YYYY-MM-DD HH:MM:SS` in local time.
///
/// Falls back to UTC when the local offset cannot be determined, and to the
/// bare number when the timestamp is out of range.
#[must_use]
pub fn format_date(timestamp: i64) -> String {
    let Ok(utc) = OffsetDateTime::from_unix_timestamp(timestamp) else {
        return timestamp.to_string();
    };
    let offset = UtcOffset::local_offset_at(utc).unwrap_or(UtcOffset::UTC);
    utc.to_offset(offset)
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| timestamp.to_string())
}
