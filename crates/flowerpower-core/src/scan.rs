//! Device discovery and scanning.
//!
//! Flower Power sensors carry Parrot's OUI, so nearby devices are recognized
//! by their address prefix rather than by advertised services.

use std::time::Duration;

use btleplug::api::{Central, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::{DeviceNotFoundReason, Error, Result};

/// Address prefix (OUI) of Parrot Flower Power devices.
pub const FLOWER_POWER_PREFIX: &str = "A0:14:3D";

/// Default discovery window for listing devices.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(60);

/// How often [`find_device`] checks the adapter while scanning.
const FIND_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Information about a discovered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Bluetooth address (or platform identifier where addresses are hidden).
    pub address: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Signal strength in dBm.
    pub rssi: Option<i16>,
}

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to scan.
    pub duration: Duration,
    /// Only report devices whose address starts with this prefix
    /// (case-insensitive). `None` reports everything.
    pub address_prefix: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_SCAN_DURATION,
            address_prefix: Some(FLOWER_POWER_PREFIX.to_string()),
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the scan duration in seconds.
    #[must_use]
    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Duration::from_secs(secs);
        self
    }

    /// Only report devices whose address starts with `prefix`.
    #[must_use]
    pub fn address_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.address_prefix = Some(prefix.into());
        self
    }

    /// Report every device.
    #[must_use]
    pub fn all_devices(mut self) -> Self {
        self.address_prefix = None;
        self
    }

    /// Whether `address` passes the prefix filter.
    pub fn accepts(&self, address: &str) -> bool {
        match &self.address_prefix {
            Some(prefix) => address
                .to_ascii_uppercase()
                .starts_with(&prefix.to_ascii_uppercase()),
            None => true,
        }
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Scan for Flower Power devices with default options.
pub async fn scan_for_devices() -> Result<Vec<DiscoveredDevice>> {
    scan_with_options(ScanOptions::default()).await
}

/// Scan with custom options.
pub async fn scan_with_options(options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
    let adapter = get_adapter().await?;
    scan_with_adapter(&adapter, options).await
}

/// Scan using an existing adapter.
///
/// Results are sorted by address.
#[tracing::instrument(level = "info", skip_all, fields(duration_secs = options.duration.as_secs()))]
pub async fn scan_with_adapter(
    adapter: &Adapter,
    options: ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    info!("Starting BLE scan for {} seconds...", options.duration.as_secs());

    adapter.start_scan(ScanFilter::default()).await?;
    sleep(options.duration).await;
    adapter.stop_scan().await?;

    let peripherals = adapter.peripherals().await?;
    let mut discovered = Vec::new();

    for peripheral in peripherals {
        match peripheral.properties().await {
            Ok(Some(properties)) => {
                let address = peripheral_identifier(Some(&properties), &peripheral.id());
                if !options.accepts(&address) {
                    continue;
                }
                info!("Found device: {}", address);
                discovered.push(DiscoveredDevice {
                    address,
                    name: properties.local_name,
                    rssi: properties.rssi,
                });
            }
            Ok(None) => {}
            Err(e) => debug!("Error processing peripheral: {}", e),
        }
    }

    discovered.sort_by(|a, b| a.address.cmp(&b.address));
    info!("Scan complete. Found {} device(s)", discovered.len());
    Ok(discovered)
}

/// Find the peripheral with `address`, scanning for at most `timeout`.
///
/// Peripherals the adapter already knows are returned without scanning.
#[tracing::instrument(level = "info", skip_all, fields(address = %address))]
pub async fn find_device(address: &str, timeout: Duration) -> Result<(Adapter, Peripheral)> {
    let adapter = get_adapter().await?;

    if let Some(peripheral) = find_peripheral(&adapter, address).await? {
        info!("Found device in cache (no scan needed)");
        return Ok((adapter, peripheral));
    }

    info!("Scanning up to {}s for {}", timeout.as_secs(), address);
    adapter.start_scan(ScanFilter::default()).await?;
    let deadline = Instant::now() + timeout;

    let found = loop {
        if let Some(peripheral) = find_peripheral(&adapter, address).await? {
            break Some(peripheral);
        }
        if Instant::now() >= deadline {
            break None;
        }
        sleep(FIND_POLL_INTERVAL).await;
    };

    if let Err(e) = adapter.stop_scan().await {
        debug!("Failed to stop scan: {}", e);
    }

    match found {
        Some(peripheral) => Ok((adapter, peripheral)),
        None => {
            warn!("Device not found within {:?}: {}", timeout, address);
            Err(Error::DeviceNotFound(DeviceNotFoundReason::ScanTimeout {
                duration: timeout,
            }))
        }
    }
}

async fn find_peripheral(adapter: &Adapter, address: &str) -> Result<Option<Peripheral>> {
    for peripheral in adapter.peripherals().await? {
        if let Ok(Some(properties)) = peripheral.properties().await {
            let identifier = peripheral_identifier(Some(&properties), &peripheral.id());
            if addresses_match(&identifier, address) {
                debug!("Matched {}", identifier);
                return Ok(Some(peripheral));
            }
        }
    }
    Ok(None)
}

/// Compare two addresses ignoring case and colon separators.
pub fn addresses_match(a: &str, b: &str) -> bool {
    let normalize = |s: &str| {
        s.chars()
            .filter(|c| *c != ':')
            .map(|c| c.to_ascii_lowercase())
            .collect::<String>()
    };
    normalize(a) == normalize(b)
}

/// The address to identify a peripheral by.
///
/// Platforms that hide MAC addresses report `00:00:00:00:00:00`; the
/// peripheral ID is used there instead.
pub fn peripheral_identifier(
    properties: Option<&PeripheralProperties>,
    id: &PeripheralId,
) -> String {
    match properties.map(|p| p.address.to_string()) {
        Some(address) if address != "00:00:00:00:00:00" => address,
        _ => format!("{:?}", id)
            .trim_start_matches("PeripheralId(")
            .trim_end_matches(')')
            .to_string(),
    }
}
