//! Example: Downloading the Measurement History
//!
//! Connects to a sensor, downloads every record it holds and prints them.
//!
//! Run with: `cargo run --example download_history -- <DEVICE_ADDRESS>`

use std::env;

use flowerpower_core::{ConnectionConfig, Device, DownloadOptions, download_history};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let address = if args.len() > 1 {
        &args[1]
    } else {
        eprintln!("Usage: {} <DEVICE_ADDRESS>", args[0]);
        eprintln!();
        eprintln!("Example:");
        eprintln!("  {} A0:14:3D:12:34:56", args[0]);
        std::process::exit(1);
    };

    println!("Connecting to {}...", address);
    let device = Device::connect(address, ConnectionConfig::default()).await?;
    println!("Connected!");
    println!();

    println!("Downloading history (this may take several minutes)...");
    let options = DownloadOptions::default().with_progress(|p| {
        println!("  {:>5.1}% ({} fragments)", p.fraction() * 100.0, p.fragments);
    });
    let log = download_history(&device, options).await?;

    println!();
    println!("{}", log);
    println!();
    println!(
        "{:<20} {:>7} {:>9} {:>9} {:>9} {:>9}",
        "Date", "Index", "Air °C", "Soil °C", "Moist %", "Light"
    );
    println!("{}", "-".repeat(68));

    for m in &log.measurements {
        println!(
            "{:<20} {:>7} {:>9.1} {:>9.1} {:>9.1} {:>9.2}",
            m.date, m.index, m.air_temperature, m.soil_temperature, m.soil_moisture, m.sunlight
        );
    }

    Ok(())
}
