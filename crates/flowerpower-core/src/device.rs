//! Flower Power connection over btleplug.
//!
//! [`Device`] connects to a Flower Power, discovers its services, and
//! resolves every characteristic the download protocol uses into a
//! [`CharacteristicMap`] in one pass. A missing characteristic fails the
//! connection instead of surfacing halfway through a download.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Characteristic as GattCharacteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use flowerpower_types::Characteristic;

use crate::error::{Error, Result};
use crate::scan::{find_device, peripheral_identifier};
use crate::traits::{FlowerPowerDevice, NotificationStream};

/// Default time to look for the device before connecting.
const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for BLE connection operations.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE characteristic read operations.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE characteristic write operations.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for BLE connection timeouts.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use flowerpower_core::device::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .scan_timeout(Duration::from_secs(60))
///     .read_timeout(Duration::from_secs(15));
/// assert_eq!(config.scan_timeout, Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long to scan for the device.
    pub scan_timeout: Duration,
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
    /// Timeout for BLE read operations.
    pub read_timeout: Duration,
    /// Timeout for BLE write and subscribe operations.
    pub write_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan timeout.
    #[must_use]
    pub fn scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// Logical characteristics resolved to GATT handles.
#[derive(Debug, Clone)]
pub struct CharacteristicMap {
    entries: HashMap<Characteristic, GattCharacteristic>,
}

impl CharacteristicMap {
    /// Resolve every [`Characteristic`] among the discovered ones.
    ///
    /// A characteristic matches when both its UUID and its service UUID
    /// match.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CharacteristicNotFound`] for the first logical
    /// characteristic that has no match.
    pub fn resolve<'a>(
        discovered: impl IntoIterator<Item = &'a GattCharacteristic>,
        service_count: usize,
    ) -> Result<Self> {
        let discovered: Vec<&GattCharacteristic> = discovered.into_iter().collect();
        let mut entries = HashMap::with_capacity(Characteristic::ALL.len());

        for logical in Characteristic::ALL {
            let found = discovered
                .iter()
                .find(|c| c.uuid == logical.uuid() && c.service_uuid == logical.service())
                .ok_or_else(|| {
                    Error::characteristic_not_found(logical.uuid().to_string(), service_count)
                })?;
            debug!(characteristic = %logical, uuid = %found.uuid, "resolved");
            entries.insert(logical, (*found).clone());
        }

        Ok(Self { entries })
    }

    /// The GATT characteristic for a logical name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CharacteristicNotFound`] if the map was built
    /// without it.
    pub fn get(&self, characteristic: Characteristic) -> Result<&GattCharacteristic> {
        self.entries.get(&characteristic).ok_or_else(|| {
            Error::characteristic_not_found(characteristic.uuid().to_string(), 0)
        })
    }

    /// Number of resolved characteristics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A connected Flower Power.
///
/// Call [`Device::disconnect`] before dropping; a dropped, still-connected
/// device only gets a best-effort disconnect.
pub struct Device {
    #[allow(dead_code)]
    adapter: Adapter,
    peripheral: Peripheral,
    name: Option<String>,
    address: String,
    characteristics: CharacteristicMap,
    disconnected: AtomicBool,
    config: ConnectionConfig,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("characteristics", &self.characteristics.len())
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Scan for the device with the given address and connect to it.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use flowerpower_core::device::{ConnectionConfig, Device};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), Box<dyn std::error::Error>> {
    ///     let device = Device::connect("A0:14:3D:00:00:01", ConnectionConfig::default()).await?;
    ///     println!("Connected to {:?}", device);
    ///     device.disconnect().await?;
    ///     Ok(())
    /// }
    /// ```
    #[tracing::instrument(level = "info", skip_all, fields(address = %address))]
    pub async fn connect(address: &str, config: ConnectionConfig) -> Result<Self> {
        let (adapter, peripheral) = find_device(address, config.scan_timeout).await?;
        Self::from_peripheral(adapter, peripheral, config).await
    }

    /// Connect to an already-discovered peripheral.
    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(connect_timeout = ?config.connection_timeout)
    )]
    pub async fn from_peripheral(
        adapter: Adapter,
        peripheral: Peripheral,
        config: ConnectionConfig,
    ) -> Result<Self> {
        info!("Connecting to device...");
        timeout(config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::timeout("connect to device", config.connection_timeout))??;
        info!("Connected!");

        info!("Discovering services...");
        timeout(config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", config.discovery_timeout))??;

        let services = peripheral.services();
        debug!("Found {} services", services.len());
        let characteristics = match CharacteristicMap::resolve(
            services.iter().flat_map(|s| s.characteristics.iter()),
            services.len(),
        ) {
            Ok(map) => map,
            Err(e) => {
                if let Err(disconnect_err) = peripheral.disconnect().await {
                    debug!("Disconnect after failed resolution: {}", disconnect_err);
                }
                return Err(e);
            }
        };

        let properties = peripheral.properties().await?;
        let name = properties.as_ref().and_then(|p| p.local_name.clone());
        let address = peripheral_identifier(properties.as_ref(), &peripheral.id());

        Ok(Self {
            adapter,
            peripheral,
            name,
            address,
            characteristics,
            disconnected: AtomicBool::new(false),
            config,
        })
    }

    /// Get the device name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Get the device address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Get the current connection configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The resolved characteristics.
    pub fn characteristics(&self) -> &CharacteristicMap {
        &self.characteristics
    }

    /// Check if the device is connected (queries BLE stack state).
    pub async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    /// Disconnect from the device.
    #[tracing::instrument(level = "info", skip(self), fields(address = %self.address))]
    pub async fn disconnect(&self) -> Result<()> {
        info!("Disconnecting from device...");
        self.disconnected.store(true, Ordering::SeqCst);
        self.peripheral.disconnect().await?;
        Ok(())
    }

    /// Read a characteristic value.
    pub async fn read_characteristic(&self, characteristic: Characteristic) -> Result<Bytes> {
        let gatt = self.characteristics.get(characteristic)?;
        let data = timeout(self.config.read_timeout, self.peripheral.read(gatt))
            .await
            .map_err(|_| {
                Error::timeout(format!("read {}", characteristic), self.config.read_timeout)
            })??;
        Ok(Bytes::from(data))
    }

    /// Write a value to a characteristic, with response.
    pub async fn write_characteristic(
        &self,
        characteristic: Characteristic,
        data: &[u8],
    ) -> Result<()> {
        let gatt = self.characteristics.get(characteristic)?;
        timeout(
            self.config.write_timeout,
            self.peripheral.write(gatt, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| {
            Error::timeout(format!("write {}", characteristic), self.config.write_timeout)
        })??;
        Ok(())
    }

    /// Enable notifications for a characteristic.
    pub async fn subscribe(&self, characteristic: Characteristic) -> Result<()> {
        let gatt = self.characteristics.get(characteristic)?;
        timeout(self.config.write_timeout, self.peripheral.subscribe(gatt))
            .await
            .map_err(|_| {
                Error::timeout(
                    format!("subscribe to {}", characteristic),
                    self.config.write_timeout,
                )
            })??;
        Ok(())
    }

    /// Stream of notifications mapped to logical characteristics.
    ///
    /// Notifications from characteristics outside [`Characteristic::ALL`]
    /// are dropped.
    pub async fn notification_stream(&self) -> Result<NotificationStream> {
        let stream = self.peripheral.notifications().await?;
        Ok(Box::pin(stream.filter_map(|notification| async move {
            match Characteristic::from_uuid(notification.uuid) {
                Some(characteristic) => Some((characteristic, Bytes::from(notification.value))),
                None => {
                    debug!(uuid = %notification.uuid, "notification from unknown characteristic");
                    None
                }
            }
        })))
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return;
        }

        warn!(
            device_address = %self.address,
            "Device dropped without calling disconnect() - performing best-effort cleanup"
        );

        let peripheral = self.peripheral.clone();
        let address = self.address.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = peripheral.disconnect().await {
                    debug!(device_address = %address, error = %e, "Best-effort disconnect failed");
                }
            });
        }
    }
}

#[async_trait]
impl FlowerPowerDevice for Device {
    fn address(&self) -> &str {
        Device::address(self)
    }

    async fn is_connected(&self) -> bool {
        Device::is_connected(self).await
    }

    async fn read(&self, characteristic: Characteristic) -> Result<Bytes> {
        self.read_characteristic(characteristic).await
    }

    async fn write_byte(&self, characteristic: Characteristic, value: u8) -> Result<()> {
        self.write_characteristic(characteristic, &[value]).await
    }

    async fn write_u32_le(&self, characteristic: Characteristic, value: u32) -> Result<()> {
        self.write_characteristic(characteristic, &value.to_le_bytes())
            .await
    }

    async fn register_notifications(&self, characteristic: Characteristic) -> Result<()> {
        self.subscribe(characteristic).await
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        self.notification_stream().await
    }

    async fn disconnect(&self) -> Result<()> {
        Device::disconnect(self).await
    }
}
