//! Example: Scanning for Flower Power Devices
//!
//! Lists nearby devices whose address carries Parrot's prefix.
//!
//! Run with: `cargo run --example scan_devices`

use flowerpower_core::scan::{self, ScanOptions};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Scanning for Flower Power devices...");
    println!();

    let options = ScanOptions::default().duration_secs(10);
    let devices = scan::scan_with_options(options).await?;

    if devices.is_empty() {
        println!("No Flower Power devices found.");
        println!();
        println!("Make sure:");
        println!("  - The sensor's battery is charged");
        println!("  - Bluetooth is enabled on this computer");
        println!("  - The device is within range");
    } else {
        println!("Found {} device(s):", devices.len());
        println!();

        for device in &devices {
            let name = device.name.as_deref().unwrap_or("Unknown");
            let rssi = device
                .rssi
                .map(|r| format!("{} dBm", r))
                .unwrap_or_else(|| "N/A".to_string());

            println!("  {}", name);
            println!("    Address: {}", device.address);
            println!("    RSSI: {}", rssi);
            println!();
        }
    }

    Ok(())
}
