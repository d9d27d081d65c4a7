//! Merging two downloaded logs of the same device.

use crate::error::MergeError;
use crate::types::{HistoryLog, Measurement};

/// Whether any measurement in `measurements` is the same sample as `m`.
#[must_use]
pub fn measurements_contain(measurements: &[Measurement], m: &Measurement) -> bool {
    measurements.iter().any(|existing| existing.matches(m))
}

/// Merge two logs of the same device into a new, index-ordered log.
///
/// All of `a`'s measurements are kept; each of `b`'s is added unless an
/// equivalent one (see [`Measurement::matches`]) is already present. The
/// union is sorted by index with a stable sort, so duplicate indices keep
/// their insertion order. Header fields come from `a`.
///
/// # Errors
///
/// Returns [`MergeError::AddressMismatch`] if the logs belong to different
/// devices.
pub fn merge(a: &HistoryLog, b: &HistoryLog) -> Result<HistoryLog, MergeError> {
    if a.address != b.address {
        return Err(MergeError::AddressMismatch {
            left: a.address.clone(),
            right: b.address.clone(),
        });
    }

    let mut measurements = a.measurements.clone();
    for m in &b.measurements {
        if !measurements_contain(&measurements, m) {
            measurements.push(m.clone());
        }
    }
    measurements.sort_by_key(|m| m.index);

    Ok(HistoryLog {
        measurements,
        ..a.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RawData;

    const ADDRESS: &str = "A0:14:3D:00:00:01";

    fn measurement(index: u32, timestamp: i64, light: u16) -> Measurement {
        let raw = RawData {
            air_temperature: 500,
            soil_temperature: 510,
            soil_vwc: 1200,
            light,
        };
        Measurement::from_raw(index, timestamp, raw).unwrap()
    }

    fn log(address: &str, measurements: Vec<Measurement>) -> HistoryLog {
        HistoryLog {
            address: address.to_string(),
            first_entry_index: measurements.first().map_or(0, |m| m.index),
            last_entry_index: measurements.last().map_or(0, |m| m.index),
            session_start_index: 1,
            measurement_period: 900,
            session_id: 7,
            measurements,
        }
    }

    fn indices(log: &HistoryLog) -> Vec<u32> {
        log.measurements.iter().map(|m| m.index).collect()
    }

    #[test]
    fn test_merge_rejects_address_mismatch() {
        let a = log(ADDRESS, vec![measurement(1, 0, 10)]);
        let b = log("A0:14:3D:00:00:02", vec![measurement(1, 0, 10)]);
        let err = merge(&a, &b).unwrap_err();
        assert_eq!(
            err,
            MergeError::AddressMismatch {
                left: ADDRESS.to_string(),
                right: "A0:14:3D:00:00:02".to_string(),
            }
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = log(
            ADDRESS,
            vec![measurement(1, 0, 10), measurement(2, 900, 11)],
        );
        let merged = merge(&a, &a).unwrap();
        assert_eq!(merged, a);
    }

    #[test]
    fn test_merge_overlapping_logs() {
        let a = log(
            ADDRESS,
            vec![
                measurement(1, 0, 10),
                measurement(2, 900, 11),
                measurement(3, 1_800, 12),
            ],
        );
        // Downloaded later: the device clock offset drifted by a few seconds.
        let b = log(
            ADDRESS,
            vec![
                measurement(2, 903, 11),
                measurement(3, 1_803, 12),
                measurement(4, 2_703, 13),
            ],
        );
        let merged = merge(&a, &b).unwrap();
        assert_eq!(indices(&merged), vec![1, 2, 3, 4]);
        assert_eq!(merged.measurements[1].timestamp, 900);
    }

    #[test]
    fn test_merge_is_order_insensitive() {
        let a = log(ADDRESS, vec![measurement(5, 4_500, 1), measurement(1, 0, 2)]);
        let b = log(ADDRESS, vec![measurement(3, 1_800, 3), measurement(5, 4_500, 1)]);

        let ab = merge(&a, &b).unwrap();
        let ba = merge(&b, &a).unwrap();
        assert_eq!(indices(&ab), vec![1, 3, 5]);
        assert_eq!(ab.measurements, ba.measurements);
    }

    #[test]
    fn test_merge_header_from_first_log() {
        let mut a = log(ADDRESS, vec![measurement(1, 0, 10)]);
        a.session_id = 1;
        let mut b = log(ADDRESS, vec![measurement(2, 900, 10)]);
        b.session_id = 2;
        b.last_entry_index = 2;

        let merged = merge(&a, &b).unwrap();
        assert_eq!(merged.session_id, 1);
        assert_eq!(merged.last_entry_index, 1);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_merge_keeps_conflicting_duplicates_in_order() {
        // Same index, different raw codes: both kept, a's first.
        let a = log(ADDRESS, vec![measurement(4, 2_700, 10)]);
        let b = log(ADDRESS, vec![measurement(4, 2_700, 99)]);
        let merged = merge(&a, &b).unwrap();
        assert_eq!(indices(&merged), vec![4, 4]);
        assert_eq!(merged.measurements[0].raw.light, 10);
        assert_eq!(merged.measurements[1].raw.light, 99);
    }

    #[test]
    fn test_merge_distant_timestamp_is_new_sample() {
        let a = log(ADDRESS, vec![measurement(1, 0, 10)]);
        let b = log(ADDRESS, vec![measurement(1, 10_000, 10)]);
        assert_eq!(merge(&a, &b).unwrap().len(), 2);
    }

    #[test]
    fn test_merge_with_empty_log() {
        let a = log(ADDRESS, vec![measurement(2, 900, 10), measurement(1, 0, 10)]);
        let empty = log(ADDRESS, Vec::new());
        assert_eq!(indices(&merge(&a, &empty).unwrap()), vec![1, 2]);
        assert_eq!(indices(&merge(&empty, &a).unwrap()), vec![1, 2]);
    }

    #[test]
    fn test_measurements_contain() {
        let list = vec![measurement(1, 0, 10), measurement(2, 900, 11)];
        assert!(measurements_contain(&list, &measurement(2, 950, 11)));
        assert!(!measurements_contain(&list, &measurement(3, 1_800, 12)));
    }
}
