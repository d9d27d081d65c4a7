//! Trait abstraction for the device side of the download protocol.
//!
//! This module provides the [`FlowerPowerDevice`] trait that abstracts over
//! real Bluetooth devices and mock devices for testing.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;

use flowerpower_types::Characteristic;

use crate::error::Result;

/// Stream of `(characteristic, value)` notifications from a device.
pub type NotificationStream = Pin<Box<dyn Stream<Item = (Characteristic, Bytes)> + Send>>;

/// The characteristic operations the download protocol needs.
///
/// Characteristics are addressed by their logical name; implementations
/// resolve names to concrete handles once, when they connect.
///
/// # Example
///
/// ```ignore
/// use flowerpower_core::{FlowerPowerDevice, Result};
/// use flowerpower_types::Characteristic;
///
/// async fn session_id<D: FlowerPowerDevice>(device: &D) -> Result<Vec<u8>> {
///     Ok(device.read(Characteristic::SessionId).await?.to_vec())
/// }
/// ```
#[async_trait]
pub trait FlowerPowerDevice: Send + Sync {
    /// The device's Bluetooth address.
    fn address(&self) -> &str;

    /// Check if the device is connected.
    async fn is_connected(&self) -> bool;

    /// Read a characteristic value.
    async fn read(&self, characteristic: Characteristic) -> Result<Bytes>;

    /// Write a single byte, waiting for the device's acknowledgement.
    async fn write_byte(&self, characteristic: Characteristic, value: u8) -> Result<()>;

    /// Write a little-endian u32, waiting for the device's acknowledgement.
    async fn write_u32_le(&self, characteristic: Characteristic, value: u32) -> Result<()>;

    /// Enable notifications for a characteristic.
    async fn register_notifications(&self, characteristic: Characteristic) -> Result<()>;

    /// Stream of notifications for all subscribed characteristics.
    ///
    /// The stream ends when the device disconnects.
    async fn notifications(&self) -> Result<NotificationStream>;

    /// Disconnect from the device.
    async fn disconnect(&self) -> Result<()>;
}
