//! Mock device implementation for testing.
//!
//! [`MockFlowerPower`] simulates the sensor's upload service in memory so the
//! full download path (driver, state machine, reassembly and decoding) can be
//! exercised without BLE hardware.
//!
//! Writing `Receiving` to rx_status makes the mock notify `Transferring`,
//! stream one block of buffer fragments and then notify `AwaitingAck`. Each
//! `Ack` releases the next block; after the last block the mock notifies
//! `Idle`.
//!
//! # Failure injection
//!
//! - [`MockFlowerPowerBuilder::initial_tx_status`]: start mid-transfer so the
//!   host has to cancel first.
//! - [`MockFlowerPowerBuilder::drop_fragment`]: never deliver one fragment.
//! - [`MockFlowerPowerBuilder::disconnect_after_fragments`]: drop the link
//!   mid-transfer.
//! - [`MockFlowerPowerBuilder::stall_after_fragments`]: stop responding.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::{Mutex, mpsc};

use flowerpower_types::{Characteristic, HEADER_SIZE, RECORD_SIZE, RawData, RxControl, TxStatus};

use crate::error::{Error, Result};
use crate::session::split_into_fragments;
use crate::traits::{FlowerPowerDevice, NotificationStream};

type Notification = (Characteristic, Bytes);

/// Mutable firmware state.
#[derive(Debug)]
struct Firmware {
    tx_status: u8,
    rx_status: u8,
    led: u8,
    transfer_start_index: Option<u32>,
    next_fragment: usize,
    fragments_sent: usize,
    stalled: bool,
    subscribed: HashSet<Characteristic>,
    subscribers: Vec<mpsc::UnboundedSender<Notification>>,
    led_writes: Vec<u8>,
    rx_writes: Vec<u8>,
}

impl Firmware {
    fn notify(&mut self, characteristic: Characteristic, data: Bytes) {
        if !self.subscribed.contains(&characteristic) {
            return;
        }
        self.subscribers
            .retain(|tx| tx.send((characteristic, data.clone())).is_ok());
    }

    fn notify_status(&mut self, status: TxStatus) {
        self.tx_status = status as u8;
        self.notify(Characteristic::TxStatus, Bytes::from(vec![status as u8]));
    }
}

/// A mock Flower Power for testing.
///
/// Implements [`FlowerPowerDevice`] for use in generic code and testing.
///
/// # Example
///
/// ```
/// use flowerpower_core::{DownloadOptions, MockFlowerPowerBuilder, download_history};
/// use flowerpower_types::RawData;
///
/// #[tokio::main]
/// async fn main() {
///     let raw = RawData {
///         air_temperature: 700,
///         soil_temperature: 700,
///         soil_vwc: 1_400,
///         light: 800,
///     };
///     let device = MockFlowerPowerBuilder::new().records(vec![raw; 3]).build();
///
///     let log = download_history(&device, DownloadOptions::default()).await.unwrap();
///     assert_eq!(log.len(), 3);
/// }
/// ```
pub struct MockFlowerPower {
    address: String,
    connected: AtomicBool,
    disconnect_count: AtomicU32,
    device_time: u32,
    session_id: u16,
    measurement_period: u16,
    session_start_index: u32,
    last_entry_index: u32,
    number_entries: u16,
    fragments: Vec<Bytes>,
    ack_interval: usize,
    drop_fragment: Option<u16>,
    disconnect_after_fragments: Option<usize>,
    stall_after_fragments: Option<usize>,
    firmware: Mutex<Firmware>,
}

impl std::fmt::Debug for MockFlowerPower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFlowerPower")
            .field("address", &self.address)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("number_entries", &self.number_entries)
            .field("fragments", &self.fragments.len())
            .finish()
    }
}

impl MockFlowerPower {
    /// Create a mock holding `records` with default session parameters.
    pub fn new(records: Vec<RawData>) -> Self {
        MockFlowerPowerBuilder::new().records(records).build()
    }

    /// Check whether the link is up.
    pub fn is_connected_sync(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// How many times the host asked to disconnect.
    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::Relaxed)
    }

    /// The history buffer fragments the mock will stream.
    pub fn fragments(&self) -> &[Bytes] {
        &self.fragments
    }

    /// Values written to the LED characteristic, in order.
    pub async fn led_writes(&self) -> Vec<u8> {
        self.firmware.lock().await.led_writes.clone()
    }

    /// Control bytes written to rx_status, in order.
    pub async fn rx_writes(&self) -> Vec<u8> {
        self.firmware.lock().await.rx_writes.clone()
    }

    /// The transfer start index the host requested, if any.
    pub async fn transfer_start_index(&self) -> Option<u32> {
        self.firmware.lock().await.transfer_start_index
    }

    /// Fragments delivered or dropped so far.
    pub async fn fragments_sent(&self) -> usize {
        self.firmware.lock().await.fragments_sent
    }

    /// Whether notifications are enabled for `characteristic`.
    pub async fn is_subscribed(&self, characteristic: Characteristic) -> bool {
        self.firmware
            .lock()
            .await
            .subscribed
            .contains(&characteristic)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected_sync() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn drop_link(&self, firmware: &mut Firmware) {
        self.connected.store(false, Ordering::Relaxed);
        firmware.subscribers.clear();
    }

    /// Stream the next block of fragments, then report the new status.
    fn send_block(&self, firmware: &mut Firmware) {
        let mut in_block = 0;
        while in_block < self.ack_interval && firmware.next_fragment < self.fragments.len() {
            let fragment = self.fragments[firmware.next_fragment].clone();
            firmware.next_fragment += 1;
            firmware.fragments_sent += 1;
            in_block += 1;

            let sequence = firmware.next_fragment as u16;
            if self.drop_fragment != Some(sequence) {
                firmware.notify(Characteristic::TxBuffer, fragment);
            }

            if self.disconnect_after_fragments == Some(firmware.fragments_sent) {
                self.drop_link(firmware);
                return;
            }
            if self.stall_after_fragments == Some(firmware.fragments_sent) {
                firmware.stalled = true;
                return;
            }
        }

        if firmware.next_fragment >= self.fragments.len() {
            firmware.notify_status(TxStatus::Idle);
        } else {
            firmware.notify_status(TxStatus::AwaitingAck);
        }
    }

    fn handle_rx_write(&self, firmware: &mut Firmware, value: u8) {
        firmware.rx_status = value;
        firmware.rx_writes.push(value);
        if firmware.stalled {
            return;
        }

        match RxControl::try_from(value) {
            Ok(RxControl::Receiving) => {
                firmware.next_fragment = 0;
                firmware.notify_status(TxStatus::Transferring);
                self.send_block(firmware);
            }
            Ok(RxControl::Ack) if firmware.tx_status == TxStatus::AwaitingAck as u8 => {
                firmware.notify_status(TxStatus::Transferring);
                self.send_block(firmware);
            }
            Ok(RxControl::Cancel) => firmware.tx_status = TxStatus::Idle as u8,
            _ => {}
        }
    }
}

#[async_trait]
impl FlowerPowerDevice for MockFlowerPower {
    fn address(&self) -> &str {
        &self.address
    }

    async fn is_connected(&self) -> bool {
        self.is_connected_sync()
    }

    async fn read(&self, characteristic: Characteristic) -> Result<Bytes> {
        self.ensure_connected()?;
        let firmware = self.firmware.lock().await;
        let value = match characteristic {
            Characteristic::Clock => self.device_time.to_le_bytes().to_vec(),
            Characteristic::SessionId => self.session_id.to_le_bytes().to_vec(),
            Characteristic::MeasurementPeriod => self.measurement_period.to_le_bytes().to_vec(),
            Characteristic::SessionStartIndex => self.session_start_index.to_le_bytes().to_vec(),
            Characteristic::LastEntryIndex => self.last_entry_index.to_le_bytes().to_vec(),
            Characteristic::NumberEntries => self.number_entries.to_le_bytes().to_vec(),
            Characteristic::TransferStartIndex => firmware
                .transfer_start_index
                .unwrap_or(0)
                .to_le_bytes()
                .to_vec(),
            Characteristic::TxStatus => vec![firmware.tx_status],
            Characteristic::RxStatus => vec![firmware.rx_status],
            Characteristic::Led => vec![firmware.led],
            Characteristic::TxBuffer => Vec::new(),
        };
        Ok(Bytes::from(value))
    }

    async fn write_byte(&self, characteristic: Characteristic, value: u8) -> Result<()> {
        self.ensure_connected()?;
        let mut firmware = self.firmware.lock().await;
        match characteristic {
            Characteristic::Led => {
                firmware.led = value;
                firmware.led_writes.push(value);
            }
            Characteristic::RxStatus => self.handle_rx_write(&mut firmware, value),
            other => {
                return Err(Error::invalid_data(format!(
                    "mock does not accept byte writes to {}",
                    other
                )));
            }
        }
        Ok(())
    }

    async fn write_u32_le(&self, characteristic: Characteristic, value: u32) -> Result<()> {
        self.ensure_connected()?;
        if characteristic != Characteristic::TransferStartIndex {
            return Err(Error::invalid_data(format!(
                "mock does not accept u32 writes to {}",
                characteristic
            )));
        }
        self.firmware.lock().await.transfer_start_index = Some(value);
        Ok(())
    }

    async fn register_notifications(&self, characteristic: Characteristic) -> Result<()> {
        self.ensure_connected()?;
        self.firmware.lock().await.subscribed.insert(characteristic);
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        self.ensure_connected()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.firmware.lock().await.subscribers.push(tx);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_count.fetch_add(1, Ordering::Relaxed);
        let mut firmware = self.firmware.lock().await;
        self.drop_link(&mut firmware);
        Ok(())
    }
}

/// Builder for creating mock devices with custom settings.
#[derive(Debug, Clone)]
pub struct MockFlowerPowerBuilder {
    address: Option<String>,
    device_time: u32,
    session_id: u16,
    measurement_period: u16,
    session_start_index: u32,
    last_entry_index: u32,
    last_entry_time: u32,
    records: Vec<RawData>,
    initial_tx_status: u8,
    ack_interval: usize,
    drop_fragment: Option<u16>,
    disconnect_after_fragments: Option<usize>,
    stall_after_fragments: Option<usize>,
}

impl Default for MockFlowerPowerBuilder {
    fn default() -> Self {
        Self {
            address: None,
            device_time: 86_400,
            session_id: 1,
            measurement_period: 900,
            session_start_index: 1,
            last_entry_index: 96,
            last_entry_time: 86_100,
            records: Vec::new(),
            initial_tx_status: TxStatus::Idle as u8,
            ack_interval: 16,
            drop_fragment: None,
            disconnect_after_fragments: None,
            stall_after_fragments: None,
        }
    }
}

impl MockFlowerPowerBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device address. Defaults to a random Parrot address.
    #[must_use]
    pub fn address(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    /// Set the device clock (seconds since power-on).
    #[must_use]
    pub fn device_time(mut self, device_time: u32) -> Self {
        self.device_time = device_time;
        self
    }

    /// Set the session id.
    #[must_use]
    pub fn session_id(mut self, session_id: u16) -> Self {
        self.session_id = session_id;
        self
    }

    /// Set the measurement period in seconds.
    #[must_use]
    pub fn measurement_period(mut self, period: u16) -> Self {
        self.measurement_period = period;
        self
    }

    /// Set the session start index.
    #[must_use]
    pub fn session_start_index(mut self, index: u32) -> Self {
        self.session_start_index = index;
        self
    }

    /// Set the index of the newest record.
    #[must_use]
    pub fn last_entry_index(mut self, index: u32) -> Self {
        self.last_entry_index = index;
        self
    }

    /// Set the device time of the newest record.
    #[must_use]
    pub fn last_entry_time(mut self, time: u32) -> Self {
        self.last_entry_time = time;
        self
    }

    /// Set the stored records, oldest first.
    #[must_use]
    pub fn records(mut self, records: Vec<RawData>) -> Self {
        self.records = records;
        self
    }

    /// Report this transfer status when the host first reads it.
    #[must_use]
    pub fn initial_tx_status(mut self, status: TxStatus) -> Self {
        self.initial_tx_status = status as u8;
        self
    }

    /// Fragments per block between acknowledgements.
    #[must_use]
    pub fn ack_interval(mut self, fragments: usize) -> Self {
        self.ack_interval = fragments.max(1);
        self
    }

    /// Never deliver the fragment with this (1-based) sequence number.
    #[must_use]
    pub fn drop_fragment(mut self, sequence: u16) -> Self {
        self.drop_fragment = Some(sequence);
        self
    }

    /// Drop the link after this many fragments.
    #[must_use]
    pub fn disconnect_after_fragments(mut self, count: usize) -> Self {
        self.disconnect_after_fragments = Some(count);
        self
    }

    /// Stop responding after this many fragments.
    #[must_use]
    pub fn stall_after_fragments(mut self, count: usize) -> Self {
        self.stall_after_fragments = Some(count);
        self
    }

    /// Encode the history buffer the firmware uploads.
    ///
    /// The first four bytes carry the buffer length (little-endian) in place
    /// of the header's leading fields.
    fn history_buffer(&self) -> Vec<u8> {
        let first_entry_index =
            (self.last_entry_index + 1).saturating_sub(self.records.len() as u32);

        let mut buf = BytesMut::with_capacity(HEADER_SIZE + RECORD_SIZE * self.records.len());
        buf.put_u32_le(0);
        buf.put_u32(self.last_entry_time);
        buf.put_u16(first_entry_index as u16);
        buf.put_u16(self.last_entry_index as u16);
        buf.put_u16(self.session_id);
        buf.put_u16(self.measurement_period);

        for raw in &self.records {
            buf.put_u16(raw.air_temperature);
            buf.put_u16(raw.light);
            buf.put_u16(0); // soil EC
            buf.put_u16(raw.soil_temperature);
            buf.put_u16(raw.soil_vwc);
            buf.put_u16(0); // battery
        }

        let len = buf.len() as u32;
        buf[..4].copy_from_slice(&len.to_le_bytes());
        buf.to_vec()
    }

    /// Build the mock device, connected.
    #[must_use]
    pub fn build(self) -> MockFlowerPower {
        let fragments = split_into_fragments(&self.history_buffer());
        let address = self.address.clone().unwrap_or_else(|| {
            format!(
                "A0:14:3D:{:02X}:{:02X}:{:02X}",
                rand::random::<u8>(),
                rand::random::<u8>(),
                rand::random::<u8>()
            )
        });

        MockFlowerPower {
            address,
            connected: AtomicBool::new(true),
            disconnect_count: AtomicU32::new(0),
            device_time: self.device_time,
            session_id: self.session_id,
            measurement_period: self.measurement_period,
            session_start_index: self.session_start_index,
            last_entry_index: self.last_entry_index,
            number_entries: self.records.len() as u16,
            fragments,
            ack_interval: self.ack_interval,
            drop_fragment: self.drop_fragment,
            disconnect_after_fragments: self.disconnect_after_fragments,
            stall_after_fragments: self.stall_after_fragments,
            firmware: Mutex::new(Firmware {
                tx_status: self.initial_tx_status,
                rx_status: RxControl::Standby as u8,
                led: 0,
                transfer_start_index: None,
                next_fragment: 0,
                fragments_sent: 0,
                stalled: false,
                subscribed: HashSet::new(),
                subscribers: Vec::new(),
                led_writes: Vec::new(),
                rx_writes: Vec::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn raw(light: u16) -> RawData {
        RawData {
            air_temperature: 700,
            soil_temperature: 710,
            soil_vwc: 1_400,
            light,
        }
    }

    #[test]
    fn test_history_buffer_layout() {
        let builder = MockFlowerPowerBuilder::new()
            .last_entry_index(11)
            .last_entry_time(100)
            .records(vec![raw(800), raw(900)]);
        let buffer = builder.history_buffer();

        assert_eq!(buffer.len(), HEADER_SIZE + 2 * RECORD_SIZE);
        assert_eq!(&buffer[..4], &(buffer.len() as u32).to_le_bytes());
        assert_eq!(&buffer[4..8], &100u32.to_be_bytes());
        assert_eq!(&buffer[8..10], &10u16.to_be_bytes());
        // second record's light field
        let second = HEADER_SIZE + RECORD_SIZE;
        assert_eq!(&buffer[second + 2..second + 4], &900u16.to_be_bytes());
    }

    #[test]
    fn test_builder_fragments() {
        let device = MockFlowerPowerBuilder::new()
            .records(vec![raw(800); 10])
            .build();
        // 16 + 120 bytes in 18-byte payloads
        assert_eq!(device.fragments().len(), 8);
        assert!(device.is_connected_sync());
        assert!(device.address().starts_with("A0:14:3D:"));
    }

    #[tokio::test]
    async fn test_reads_session_parameters() {
        let device = MockFlowerPowerBuilder::new()
            .device_time(5_000)
            .measurement_period(600)
            .last_entry_index(42)
            .records(vec![raw(1); 3])
            .build();

        let clock = device.read(Characteristic::Clock).await.unwrap();
        assert_eq!(clock.as_ref(), &5_000u32.to_le_bytes());
        let period = device.read(Characteristic::MeasurementPeriod).await.unwrap();
        assert_eq!(period.as_ref(), &600u16.to_le_bytes());
        let entries = device.read(Characteristic::NumberEntries).await.unwrap();
        assert_eq!(entries.as_ref(), &3u16.to_le_bytes());
        let status = device.read(Characteristic::TxStatus).await.unwrap();
        assert_eq!(status.as_ref(), &[0]);
    }

    #[tokio::test]
    async fn test_receiving_streams_first_block() {
        let device = MockFlowerPowerBuilder::new()
            .records(vec![raw(800); 10])
            .ack_interval(4)
            .build();
        let mut stream = device.notifications().await.unwrap();
        device
            .register_notifications(Characteristic::TxBuffer)
            .await
            .unwrap();
        device
            .register_notifications(Characteristic::TxStatus)
            .await
            .unwrap();

        device
            .write_byte(Characteristic::RxStatus, RxControl::Receiving as u8)
            .await
            .unwrap();

        let (c, data) = stream.next().await.unwrap();
        assert_eq!((c, data.as_ref()), (Characteristic::TxStatus, &[1u8][..]));
        for expected in 1u16..=4 {
            let (c, data) = stream.next().await.unwrap();
            assert_eq!(c, Characteristic::TxBuffer);
            assert_eq!(&data[..2], &expected.to_le_bytes());
        }
        let (c, data) = stream.next().await.unwrap();
        assert_eq!((c, data.as_ref()), (Characteristic::TxStatus, &[2u8][..]));
        assert_eq!(device.fragments_sent().await, 4);
    }

    #[tokio::test]
    async fn test_unsubscribed_notifications_are_not_sent() {
        let device = MockFlowerPower::new(vec![raw(800)]);
        let mut stream = device.notifications().await.unwrap();
        device
            .write_byte(Characteristic::RxStatus, RxControl::Receiving as u8)
            .await
            .unwrap();
        device.disconnect().await.unwrap();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_sets_idle() {
        let device = MockFlowerPowerBuilder::new()
            .initial_tx_status(TxStatus::Transferring)
            .build();
        let status = device.read(Characteristic::TxStatus).await.unwrap();
        assert_eq!(status.as_ref(), &[1]);

        device
            .write_byte(Characteristic::RxStatus, RxControl::Cancel as u8)
            .await
            .unwrap();
        let status = device.read(Characteristic::TxStatus).await.unwrap();
        assert_eq!(status.as_ref(), &[0]);
        assert_eq!(device.rx_writes().await, vec![RxControl::Cancel as u8]);
    }

    #[tokio::test]
    async fn test_disconnected_rejects_reads() {
        let device = MockFlowerPower::new(Vec::new());
        device.disconnect().await.unwrap();
        let err = device.read(Characteristic::Clock).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(device.disconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_rejects_unexpected_writes() {
        let device = MockFlowerPower::new(Vec::new());
        assert!(device.write_byte(Characteristic::Clock, 1).await.is_err());
        assert!(device.write_u32_le(Characteristic::Led, 1).await.is_err());
    }
}
