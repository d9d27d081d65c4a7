//! List command implementation.

use anyhow::{Context, Result};
use flowerpower_core::{DiscoveredDevice, ScanOptions, scan};

use crate::style;

pub async fn cmd_list(timeout: u64, all: bool, quiet: bool, no_color: bool) -> Result<()> {
    let spinner = if !quiet {
        Some(style::scanning_spinner(timeout))
    } else {
        None
    };

    let mut options = ScanOptions::default().duration_secs(timeout);
    if all {
        options = options.all_devices();
    }

    let devices = scan::scan_with_options(options)
        .await
        .context("Failed to scan for devices")?;

    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }

    print!("{}", format_devices(&devices, no_color));
    if devices.is_empty() && !quiet {
        eprintln!(
            "No Flower Power sensors found. Make sure they are in range and not paired to a phone."
        );
    }
    Ok(())
}

/// One line per device: address, signal and name.
pub fn format_devices(devices: &[DiscoveredDevice], no_color: bool) -> String {
    let mut out = String::new();
    for device in devices {
        out.push_str(&format!(
            "{:<17}  {}  {}\n",
            device.address,
            style::format_signal_bar(device.rssi, no_color),
            device.name.as_deref().unwrap_or("Unknown")
        ));
    }
    out
}
