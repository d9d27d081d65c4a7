//! Per-download protocol state.
//!
//! A [`Session`] accumulates everything the download learns from the device:
//! the clock offset, the session parameters, and the history buffer
//! fragments. Fragments are kept in an arena indexed by their 1-based
//! sequence number so they may arrive in any order; [`Session::reassemble`]
//! checks that none is missing before concatenating them.

use bytes::{Buf, Bytes};
use tracing::debug;

use flowerpower_types::{DecodeParams, HistoryLog, Measurement, decode_history};

use crate::error::{Error, Result};

/// Payload bytes carried by one buffer fragment (after the sequence number).
pub const FRAGMENT_PAYLOAD_SIZE: usize = 18;

/// Size of the little-endian sequence number prefixing every fragment.
pub const SEQUENCE_SIZE: usize = 2;

/// Minimum size of the first fragment: sequence number plus buffer length.
pub const FIRST_FRAGMENT_MIN_SIZE: usize = SEQUENCE_SIZE + 4;

/// Mutable state of one download attempt.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Host clock (Unix seconds) when the device clock was read.
    pub host_time: i64,
    /// Device clock at `host_time`.
    pub device_time: i64,
    pub session_id: u32,
    /// Seconds between records.
    pub measurement_period: u32,
    pub session_start_index: u32,
    pub first_entry_index: u32,
    pub last_entry_index: u32,
    pub number_entries: u32,
    /// Total length of the reassembled buffer, from the first fragment.
    pub expected_length: u32,
    /// Fragments received so far, duplicates included.
    pub fragment_count: u32,
    /// Payload bytes received so far.
    pub bytes_received: usize,
    fragments: Vec<Option<Bytes>>,
    /// Decoded measurements, filled by [`Session::decode`].
    pub records: Vec<Measurement>,
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute and store the first entry index to request:
    /// `last_entry_index - number_entries + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] if the device reports more entries
    /// than its last index allows.
    pub fn compute_first_entry_index(&mut self) -> Result<u32> {
        let first = self
            .last_entry_index
            .checked_add(1)
            .and_then(|next| next.checked_sub(self.number_entries))
            .ok_or_else(|| {
                Error::invalid_data(format!(
                    "{} entries cannot end at index {}",
                    self.number_entries, self.last_entry_index
                ))
            })?;
        self.first_entry_index = first;
        Ok(first)
    }

    /// Handle the first buffer fragment: reset the arena, read the total
    /// buffer length and store the fragment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] if the fragment is too short to carry
    /// the buffer length or has sequence number 0.
    pub fn start_buffer(&mut self, fragment: Bytes) -> Result<u16> {
        if fragment.len() < FIRST_FRAGMENT_MIN_SIZE {
            return Err(Error::invalid_data(format!(
                "first fragment needs {} bytes, got {}",
                FIRST_FRAGMENT_MIN_SIZE,
                fragment.len()
            )));
        }

        let mut buf = &fragment[SEQUENCE_SIZE..];
        let expected_length = buf.get_u32_le();

        self.fragments.clear();
        self.fragment_count = 0;
        self.bytes_received = 0;
        self.expected_length = expected_length;
        debug!(expected_length, "history buffer started");

        self.store_fragment(fragment)
    }

    /// Store one buffer fragment under its sequence number.
    ///
    /// A fragment arriving twice replaces the earlier copy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidData`] if the fragment is shorter than its
    /// sequence number or the sequence number is 0.
    pub fn store_fragment(&mut self, fragment: Bytes) -> Result<u16> {
        let sequence = fragment_sequence(&fragment)?;
        if sequence == 0 {
            return Err(Error::invalid_data("fragment sequence numbers start at 1"));
        }

        let slot = usize::from(sequence) - 1;
        if slot >= self.fragments.len() {
            self.fragments.resize(slot + 1, None);
        }
        if self.fragments[slot].is_some() {
            debug!(sequence, "duplicate fragment replaces earlier copy");
        }

        self.bytes_received += (fragment.len() - SEQUENCE_SIZE).min(FRAGMENT_PAYLOAD_SIZE);
        self.fragment_count += 1;
        self.fragments[slot] = Some(fragment);
        Ok(sequence)
    }

    /// Highest sequence number stored so far, 0 if none.
    #[must_use]
    pub fn highest_sequence(&self) -> u32 {
        self.fragments.len() as u32
    }

    /// Number of fragments needed to carry `expected_length` bytes.
    #[must_use]
    pub fn expected_fragments(&self) -> u32 {
        (self.expected_length as usize).div_ceil(FRAGMENT_PAYLOAD_SIZE) as u32
    }

    /// Whether every fragment from 1 to the expected count has arrived.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        let total = self.highest_sequence().max(self.expected_fragments()) as usize;
        total <= self.fragments.len() && self.fragments[..total].iter().all(Option::is_some)
    }

    /// Concatenate the fragment payloads into the history buffer.
    ///
    /// Each payload is the fragment minus its sequence number, at most
    /// [`FRAGMENT_PAYLOAD_SIZE`] bytes, and the result is cut to exactly
    /// `expected_length` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingFragment`] naming the first gap when any
    /// sequence number from 1 up to the expected fragment count is absent.
    pub fn reassemble(&self) -> Result<Vec<u8>> {
        let expected = self.highest_sequence().max(self.expected_fragments());
        let length = self.expected_length as usize;
        let mut data = Vec::with_capacity(length);

        for sequence in 1..=expected {
            let fragment = self
                .fragments
                .get(sequence as usize - 1)
                .and_then(Option::as_ref)
                .ok_or(Error::MissingFragment { sequence, expected })?;

            let payload = &fragment[SEQUENCE_SIZE..];
            let take = payload
                .len()
                .min(FRAGMENT_PAYLOAD_SIZE)
                .min(length.saturating_sub(data.len()));
            data.extend_from_slice(&payload[..take]);
        }

        Ok(data)
    }

    /// Parameters for [`decode_history`] taken from this session.
    #[must_use]
    pub fn decode_params(&self) -> DecodeParams {
        DecodeParams {
            host_time: self.host_time,
            device_time: self.device_time,
            first_entry_index: self.first_entry_index,
            last_entry_index: self.last_entry_index,
            number_entries: self.number_entries,
            measurement_period: self.measurement_period,
        }
    }

    /// Reassemble the buffer and decode it into [`Session::records`].
    ///
    /// # Errors
    ///
    /// Propagates reassembly and decoding errors; `records` is left
    /// untouched on failure.
    pub fn decode(&mut self) -> Result<()> {
        let data = self.reassemble()?;
        self.records = decode_history(&data, &self.decode_params())?;
        debug!(records = self.records.len(), bytes = data.len(), "history decoded");
        Ok(())
    }

    /// Build the persisted log for the device at `address`.
    #[must_use]
    pub fn to_log(&self, address: &str) -> HistoryLog {
        HistoryLog {
            address: address.to_string(),
            first_entry_index: self.first_entry_index,
            last_entry_index: self.last_entry_index,
            session_start_index: self.session_start_index,
            measurement_period: self.measurement_period,
            session_id: self.session_id,
            measurements: self.records.clone(),
        }
    }
}

/// Read the little-endian sequence number of a fragment.
fn fragment_sequence(fragment: &[u8]) -> Result<u16> {
    if fragment.len() < SEQUENCE_SIZE {
        return Err(Error::invalid_data(format!(
            "fragment needs at least {} bytes, got {}",
            SEQUENCE_SIZE,
            fragment.len()
        )));
    }
    let mut buf = fragment;
    Ok(buf.get_u16_le())
}

/// Split a history buffer into wire fragments.
///
/// The inverse of [`Session::reassemble`]: every fragment carries a
/// little-endian sequence number starting at 1 followed by up to
/// [`FRAGMENT_PAYLOAD_SIZE`] bytes of `buffer`. The buffer's first four bytes
/// are expected to already hold its little-endian length.
#[must_use]
pub fn split_into_fragments(buffer: &[u8]) -> Vec<Bytes> {
    buffer
        .chunks(FRAGMENT_PAYLOAD_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let mut fragment = Vec::with_capacity(SEQUENCE_SIZE + chunk.len());
            fragment.extend_from_slice(&((i + 1) as u16).to_le_bytes());
            fragment.extend_from_slice(chunk);
            Bytes::from(fragment)
        })
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn buffer(len: usize) -> Vec<u8> {
        let mut data: Vec<u8> = (0..len).map(|i| (i * 7 % 256) as u8).collect();
        data[..4].copy_from_slice(&(len as u32).to_le_bytes());
        data
    }

    /// A buffer length and an arrival order for every fragment after the first.
    fn arrival_orders() -> impl Strategy<Value = (usize, Vec<usize>)> {
        (FIRST_FRAGMENT_MIN_SIZE..600).prop_flat_map(|len| {
            let count = len.div_ceil(FRAGMENT_PAYLOAD_SIZE);
            (Just(len), Just((1..count).collect::<Vec<_>>()).prop_shuffle())
        })
    }

    proptest! {
        #[test]
        fn reassembly_ignores_arrival_order((len, order) in arrival_orders()) {
            let data = buffer(len);
            let fragments = split_into_fragments(&data);
            let mut session = Session::new();
            session.start_buffer(fragments[0].clone()).unwrap();
            for i in order {
                session.store_fragment(fragments[i].clone()).unwrap();
            }
            prop_assert!(session.is_complete());
            prop_assert_eq!(session.reassemble().unwrap(), data);
        }

        #[test]
        fn missing_fragment_is_named(len in 19usize..600, seed in any::<usize>()) {
            let fragments = split_into_fragments(&buffer(len));
            let count = fragments.len();
            let skipped = 1 + seed % (count - 1);

            let mut session = Session::new();
            session.start_buffer(fragments[0].clone()).unwrap();
            for (i, fragment) in fragments.iter().enumerate().skip(1) {
                if i != skipped {
                    session.store_fragment(fragment.clone()).unwrap();
                }
            }

            match session.reassemble() {
                Err(Error::MissingFragment { sequence, expected }) => {
                    prop_assert_eq!(sequence as usize, skipped + 1);
                    prop_assert_eq!(expected as usize, count);
                }
                other => prop_assert!(false, "unexpected result {:?}", other),
            }
        }
    }
}
