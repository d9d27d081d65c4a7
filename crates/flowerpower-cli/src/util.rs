//! Utility functions for CLI operations.

use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;

use anyhow::{Context, Result};
use flowerpower_core::scan::find_device;
use flowerpower_core::{ConnectionConfig, Device, HistoryLog};
use serde::Serialize;

use crate::style;

/// Serialize `value` as JSON indented with four spaces, followed by a newline.
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .context("Failed to serialize JSON")?;
    buf.push(b'\n');
    String::from_utf8(buf).context("Serialized JSON is not valid UTF-8")
}

/// Read a history log written by `download` or `merge`.
pub fn read_log(path: &Path) -> Result<HistoryLog> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse history log {}", path.display()))
}

/// Write a history log as pretty-printed JSON.
pub fn write_log(path: &Path, log: &HistoryLog) -> Result<()> {
    let content = to_pretty_json(log)?;
    fs::write(path, content).with_context(|| format!("Failed to write to {}", path.display()))
}

/// Find and connect to a sensor, showing a spinner unless `quiet`.
pub async fn connect_device(
    address: &str,
    config: ConnectionConfig,
    quiet: bool,
) -> Result<Device> {
    let spinner = if !quiet && io::stderr().is_terminal() {
        Some(style::connecting_spinner(address))
    } else {
        None
    };

    let result = find_device(address, config.scan_timeout).await;

    let (adapter, peripheral) = result.map_err(|e| {
        if let Some(sp) = &spinner {
            sp.finish_and_clear();
        }
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        anyhow::anyhow!(
            "Failed to find device: {}\n\nCause: {}\n\nPossible causes:\n  \
             - Bluetooth may be disabled -- check system settings\n  \
             - Sensor may be out of range -- try moving closer\n  \
             - Sensor may be connected to the Flower Power app on a phone\n  \
             - Address may be incorrect -- run 'flower-power list' to verify\n\n\
             Time: {}",
            address,
            e,
            timestamp
        )
    })?;

    if let Some(sp) = &spinner {
        sp.set_message("Connecting...".to_string());
    }

    let device = Device::from_peripheral(adapter, peripheral, config)
        .await
        .map_err(|e| {
            let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            anyhow::anyhow!(
                "Failed to connect to device: {}\n\nCause: {}\n\nPossible causes:\n  \
                 - Sensor may have gone out of range\n  \
                 - Firmware may not expose the history upload service\n  \
                 - Bluetooth connection was interrupted\n\n\
                 Time: {}",
                address,
                e,
                timestamp
            )
        });

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }

    device
}
