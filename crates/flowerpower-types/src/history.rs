//! Binary history buffer decoding.
//!
//! The reassembled upload buffer starts with a 16-byte big-endian header
//! followed by fixed 12-byte big-endian record frames:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 2 | reserved |
//! | 2 | 2 | number of entries |
//! | 4 | 4 | time of the last entry (device clock) |
//! | 8 | 2 | first entry index |
//! | 10 | 2 | last entry index |
//! | 12 | 2 | session id |
//! | 14 | 2 | measurement period |
//!
//! Each record frame holds air temperature, light, soil EC, soil
//! temperature, soil VWC and battery codes, in that order.
//!
//! Only the header's last entry time is used when decoding. Indices, period
//! and entry count come from [`DecodeParams`], which the protocol layer fills
//! from characteristic reads; the header copies are kept in [`HistoryHeader`]
//! for diagnostics and never compared against them.

use bytes::Buf;

use crate::error::{ParseError, ParseResult};
use crate::types::{Measurement, RawData};

/// Size of the history header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Size of one record frame in bytes.
pub const RECORD_SIZE: usize = 12;

/// The parsed history header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryHeader {
    pub reserved: u16,
    pub num_entries: u16,
    /// Device clock value of the most recent record.
    pub last_entry_time: u32,
    pub first_entry_index: u16,
    pub last_entry_index: u16,
    pub session_id: u16,
    pub period: u16,
}

impl HistoryHeader {
    /// Parse the header from the start of a reassembled buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InsufficientBytes`] if `data` is shorter than
    /// [`HEADER_SIZE`].
    pub fn from_bytes(data: &[u8]) -> ParseResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(ParseError::InsufficientBytes {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let mut buf = data;
        Ok(HistoryHeader {
            reserved: buf.get_u16(),
            num_entries: buf.get_u16(),
            last_entry_time: buf.get_u32(),
            first_entry_index: buf.get_u16(),
            last_entry_index: buf.get_u16(),
            session_id: buf.get_u16(),
            period: buf.get_u16(),
        })
    }
}

/// Session parameters the decoder needs besides the byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeParams {
    /// Host clock (Unix seconds) when the device clock was read.
    pub host_time: i64,
    /// Device clock value read at `host_time`.
    pub device_time: i64,
    pub first_entry_index: u32,
    pub last_entry_index: u32,
    /// Number of record frames to decode.
    pub number_entries: u32,
    /// Seconds between records.
    pub measurement_period: u32,
}

impl DecodeParams {
    /// Unix time at which the device clock read zero, if representable.
    #[must_use]
    pub fn startup_time(&self) -> Option<i64> {
        self.host_time.checked_sub(self.device_time)
    }

    /// Unix timestamp of the record with absolute index `index`.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidData`] if the timestamp does not fit in
    /// an `i64`.
    pub fn record_timestamp(&self, last_entry_time: u32, index: u32) -> ParseResult<i64> {
        let behind = i64::from(self.last_entry_index) - i64::from(index);
        self.startup_time()
            .and_then(|startup| startup.checked_add(i64::from(last_entry_time)))
            .and_then(|t| {
                behind
                    .checked_mul(i64::from(self.measurement_period))
                    .and_then(|age| t.checked_sub(age))
            })
            .ok_or_else(|| {
                ParseError::InvalidData(format!(
                    "timestamp of record {index} overflows (last entry {}, period {}s)",
                    self.last_entry_index, self.measurement_period
                ))
            })
    }
}

/// Parse one 12-byte record frame into its raw codes.
///
/// Returns `None` for a frame shorter than [`RECORD_SIZE`].
#[must_use]
pub fn parse_record(frame: &[u8]) -> Option<RawData> {
    if frame.len() < RECORD_SIZE {
        return None;
    }
    let mut buf = frame;
    let air_temperature = buf.get_u16();
    let light = buf.get_u16();
    let _soil_ec = buf.get_u16();
    let soil_temperature = buf.get_u16();
    let soil_vwc = buf.get_u16();
    let _battery = buf.get_u16();
    Some(RawData {
        air_temperature,
        soil_temperature,
        soil_vwc,
        light,
    })
}

/// Decode a reassembled history buffer into calibrated measurements.
///
/// Record `i` gets index `first_entry_index + i`. Frames that fall past the
/// end of `data` (a truncated final buffer) are skipped.
///
/// # Errors
///
/// - [`ParseError::InsufficientBytes`] if the header is incomplete.
/// - [`ParseError::Calibration`] if a record carries a raw code outside a
///   calibration curve's domain.
/// - [`ParseError::InvalidData`] if a record index or timestamp overflows.
pub fn decode_history(data: &[u8], params: &DecodeParams) -> ParseResult<Vec<Measurement>> {
    let header = HistoryHeader::from_bytes(data)?;
    let records = &data[HEADER_SIZE..];

    // number_entries comes from the device; never reserve more than the buffer holds.
    let capacity = (params.number_entries as usize).min(records.len() / RECORD_SIZE + 1);
    let mut measurements = Vec::with_capacity(capacity);
    for i in 0..params.number_entries {
        let offset = i as usize * RECORD_SIZE;
        let Some(frame) = records.get(offset..) else {
            break;
        };
        let Some(raw) = parse_record(frame) else {
            continue;
        };

        let index = params.first_entry_index.checked_add(i).ok_or_else(|| {
            ParseError::InvalidData(format!(
                "record index overflows: {} + {i}",
                params.first_entry_index
            ))
        })?;
        let timestamp = params.record_timestamp(header.last_entry_time, index)?;
        let measurement = Measurement::from_raw(index, timestamp, raw)
            .map_err(|source| ParseError::Calibration { index, source })?;
        measurements.push(measurement);
    }

    Ok(measurements)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration;
    use crate::error::CalibrationError;

    const SCENARIO_HEADER: [u8; 16] = [
        0x00, 0x00, // reserved
        0x00, 0x02, // num_entries = 2
        0x00, 0x00, 0x00, 0x64, // last_entry_time = 100
        0x00, 0x0A, // first_entry_index = 10
        0x00, 0x0B, // last_entry_index = 11
        0x00, 0x01, // session_id = 1
        0x00, 0x3C, // period = 60
    ];

    fn scenario_params() -> DecodeParams {
        DecodeParams {
            host_time: 1_000,
            device_time: 400,
            first_entry_index: 10,
            last_entry_index: 11,
            number_entries: 2,
            measurement_period: 60,
        }
    }

    fn frame(raw: RawData) -> Vec<u8> {
        let mut out = Vec::with_capacity(RECORD_SIZE);
        for value in [
            raw.air_temperature,
            raw.light,
            0xBEEF,
            raw.soil_temperature,
            raw.soil_vwc,
            0xCAFE,
        ] {
            out.extend_from_slice(&value.to_be_bytes());
        }
        out
    }

    // --- Header tests ---

    #[test]
    fn test_parse_scenario_header() {
        let header = HistoryHeader::from_bytes(&SCENARIO_HEADER).unwrap();
        assert_eq!(header.num_entries, 2);
        assert_eq!(header.last_entry_time, 100);
        assert_eq!(header.first_entry_index, 10);
        assert_eq!(header.last_entry_index, 11);
        assert_eq!(header.session_id, 1);
        assert_eq!(header.period, 60);
    }

    #[test]
    fn test_header_too_short() {
        let err = HistoryHeader::from_bytes(&SCENARIO_HEADER[..15]).unwrap_err();
        assert!(matches!(
            err,
            ParseError::InsufficientBytes {
                expected: 16,
                actual: 15
            }
        ));
    }

    // --- Record tests ---

    #[test]
    fn test_parse_record_field_order() {
        let bytes = [
            0x01, 0x02, // air
            0x03, 0x04, // light
            0x05, 0x06, // ec
            0x07, 0x08, // soil temp
            0x09, 0x0A, // vwc
            0x0B, 0x0C, // battery
        ];
        let raw = parse_record(&bytes).unwrap();
        assert_eq!(raw.air_temperature, 0x0102);
        assert_eq!(raw.light, 0x0304);
        assert_eq!(raw.soil_temperature, 0x0708);
        assert_eq!(raw.soil_vwc, 0x090A);
    }

    #[test]
    fn test_parse_record_short_frame() {
        assert_eq!(parse_record(&[0u8; 11]), None);
    }

    // --- Decoding tests ---

    #[test]
    fn test_scenario_zero_records_fail_on_sunlight() {
        let mut data = SCENARIO_HEADER.to_vec();
        data.extend_from_slice(&[0u8; 24]);

        let err = decode_history(&data, &scenario_params()).unwrap_err();
        match err {
            ParseError::Calibration { index, source } => {
                assert_eq!(index, 10);
                assert_eq!(source, CalibrationError::SunlightZero);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_scenario_with_light_decodes_both_records() {
        let raw = RawData {
            light: 1,
            ..RawData::default()
        };
        let mut data = SCENARIO_HEADER.to_vec();
        data.extend(frame(raw));
        data.extend(frame(raw));

        let measurements = decode_history(&data, &scenario_params()).unwrap();
        assert_eq!(measurements.len(), 2);

        assert_eq!(measurements[0].index, 10);
        assert_eq!(measurements[1].index, 11);
        // startup 600 + last_entry_time 100 - (11 - index) * 60
        assert_eq!(measurements[0].timestamp, 640);
        assert_eq!(measurements[1].timestamp, 700);

        for m in &measurements {
            assert_eq!(m.air_temperature, -10.0);
            assert_eq!(m.soil_temperature, -10.0);
            assert_eq!(m.soil_moisture, calibration::soil_moisture(0));
            assert_eq!(m.sunlight, calibration::sunlight(1).unwrap());
            assert_eq!(m.raw, raw);
        }
    }

    #[test]
    fn test_truncated_final_frame_is_skipped() {
        let raw = RawData {
            air_temperature: 600,
            soil_temperature: 610,
            soil_vwc: 1500,
            light: 800,
        };
        let mut data = SCENARIO_HEADER.to_vec();
        data.extend(frame(raw));
        data.extend_from_slice(&frame(raw)[..7]);

        let measurements = decode_history(&data, &scenario_params()).unwrap();
        assert_eq!(measurements.len(), 1);
        assert_eq!(measurements[0].index, 10);
    }

    #[test]
    fn test_missing_frames_are_skipped() {
        let data = SCENARIO_HEADER.to_vec();
        let measurements = decode_history(&data, &scenario_params()).unwrap();
        assert!(measurements.is_empty());
    }

    #[test]
    fn test_header_copies_are_not_used() {
        // Header claims indices 10..=11 but the session says 200..=201.
        let raw = RawData {
            light: 42,
            ..RawData::default()
        };
        let mut data = SCENARIO_HEADER.to_vec();
        data.extend(frame(raw));
        data.extend(frame(raw));

        let params = DecodeParams {
            first_entry_index: 200,
            last_entry_index: 201,
            ..scenario_params()
        };
        let measurements = decode_history(&data, &params).unwrap();
        assert_eq!(measurements[0].index, 200);
        assert_eq!(measurements[1].index, 201);
    }

    #[test]
    fn test_extra_frames_beyond_number_entries_ignored() {
        let raw = RawData {
            light: 5,
            ..RawData::default()
        };
        let mut data = SCENARIO_HEADER.to_vec();
        for _ in 0..4 {
            data.extend(frame(raw));
        }
        let measurements = decode_history(&data, &scenario_params()).unwrap();
        assert_eq!(measurements.len(), 2);
    }

    #[test]
    fn test_record_timestamp_negative_offset() {
        let params = DecodeParams {
            host_time: 100,
            device_time: 1_000,
            first_entry_index: 1,
            last_entry_index: 3,
            number_entries: 3,
            measurement_period: 900,
        };
        assert_eq!(params.startup_time(), Some(-900));
        assert_eq!(
            params.record_timestamp(2_000, 1).unwrap(),
            -900 + 2_000 - 1_800
        );
    }

    #[test]
    fn test_huge_entry_count_with_empty_buffer() {
        let params = DecodeParams {
            last_entry_index: u32::MAX - 1,
            number_entries: u32::MAX,
            measurement_period: 900,
            ..DecodeParams::default()
        };
        let measurements = decode_history(&[0u8; HEADER_SIZE], &params).unwrap();
        assert!(measurements.is_empty());
    }

    #[test]
    fn test_timestamp_overflow_is_invalid_data() {
        let raw = RawData {
            light: 1,
            ..RawData::default()
        };
        let mut data = SCENARIO_HEADER.to_vec();
        data.extend(frame(raw));

        let params = DecodeParams {
            first_entry_index: 0,
            last_entry_index: u32::MAX,
            number_entries: u32::MAX,
            measurement_period: u32::MAX,
            ..DecodeParams::default()
        };
        let err = decode_history(&data, &params).unwrap_err();
        assert!(matches!(err, ParseError::InvalidData(_)), "unexpected error: {err}");
    }

    #[test]
    fn test_startup_time_overflow() {
        let params = DecodeParams {
            host_time: i64::MIN,
            device_time: 1,
            ..DecodeParams::default()
        };
        assert_eq!(params.startup_time(), None);
        assert!(params.record_timestamp(0, 0).is_err());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn raw_strategy() -> impl Strategy<Value = RawData> {
        (any::<u16>(), any::<u16>(), any::<u16>(), 1u16..=u16::MAX).prop_map(
            |(air_temperature, soil_temperature, soil_vwc, light)| RawData {
                air_temperature,
                soil_temperature,
                soil_vwc,
                light,
            },
        )
    }

    fn encode(header: &HistoryHeader, records: &[RawData]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&header.reserved.to_be_bytes());
        out.extend_from_slice(&header.num_entries.to_be_bytes());
        out.extend_from_slice(&header.last_entry_time.to_be_bytes());
        out.extend_from_slice(&header.first_entry_index.to_be_bytes());
        out.extend_from_slice(&header.last_entry_index.to_be_bytes());
        out.extend_from_slice(&header.session_id.to_be_bytes());
        out.extend_from_slice(&header.period.to_be_bytes());
        for r in records {
            for value in [r.air_temperature, r.light, 0, r.soil_temperature, r.soil_vwc, 0] {
                out.extend_from_slice(&value.to_be_bytes());
            }
        }
        out
    }

    proptest! {
        #[test]
        fn decode_reproduces_records(
            records in prop::collection::vec(raw_strategy(), 0..40),
            first in 0u32..100_000,
            last_entry_time in any::<u32>(),
            period in 1u32..3_600,
            host_time in 1_000_000_000i64..2_000_000_000,
            device_time in 0i64..10_000_000,
        ) {
            let n = records.len() as u32;
            let last = first + n.saturating_sub(1);
            let header = HistoryHeader {
                last_entry_time,
                ..HistoryHeader::default()
            };
            let params = DecodeParams {
                host_time,
                device_time,
                first_entry_index: first,
                last_entry_index: last,
                number_entries: n,
                measurement_period: period,
            };

            let data = encode(&header, &records);
            let measurements = decode_history(&data, &params).unwrap();

            prop_assert_eq!(measurements.len(), records.len());
            for (i, (m, raw)) in measurements.iter().zip(&records).enumerate() {
                let index = first + i as u32;
                prop_assert_eq!(m.index, index);
                prop_assert_eq!(&m.raw, raw);
                let expected = host_time - device_time + i64::from(last_entry_time)
                    - (i64::from(last) - i64::from(index)) * i64::from(period);
                prop_assert_eq!(m.timestamp, expected);
            }
        }

        #[test]
        fn decode_never_panics(
            data in prop::collection::vec(any::<u8>(), 0..200),
            host_time in any::<i64>(),
            device_time in any::<i64>(),
            first_entry_index in any::<u32>(),
            last_entry_index in any::<u32>(),
            number_entries in any::<u32>(),
            measurement_period in any::<u32>(),
        ) {
            let params = DecodeParams {
                host_time,
                device_time,
                first_entry_index,
                last_entry_index,
                number_entries,
                measurement_period,
            };
            let _ = decode_history(&data, &params);
        }
    }
}
