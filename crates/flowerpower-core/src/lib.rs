//! Core BLE library for Parrot Flower Power plant sensors.
//!
//! This crate downloads the measurement history a Flower Power keeps in
//! flash. The download protocol is implemented twice over:
//!
//! - [`protocol::StateMachine`] is a sans-IO transition table. It consumes
//!   events (characteristic values, write acknowledgements, notifications)
//!   and returns the commands to execute next.
//! - [`download::download_history`] drives that machine against anything
//!   implementing [`FlowerPowerDevice`]: the btleplug-backed [`Device`] or the
//!   in-memory [`MockFlowerPower`].
//!
//! # Platform Differences
//!
//! On macOS, CoreBluetooth hides MAC addresses and devices are identified by
//! a per-host UUID instead. [`Device::address()`] returns whichever
//! identifier the platform offers.
//!
//! # Quick Start
//!
//! ```no_run
//! use flowerpower_core::{ConnectionConfig, Device, DownloadOptions, download_history};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = Device::connect("A0:14:3D:12:34:56", ConnectionConfig::default()).await?;
//!     let log = download_history(&device, DownloadOptions::default()).await?;
//!     println!("{} measurements", log.len());
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod download;
pub mod error;
pub mod mock;
pub mod protocol;
pub mod scan;
pub mod session;
pub mod traits;

// Core exports
pub use device::{CharacteristicMap, ConnectionConfig, Device};
pub use download::{DownloadOptions, DownloadProgress, ProgressCallback, download_history};
pub use error::{DeviceNotFoundReason, Error, Result};
pub use mock::{MockFlowerPower, MockFlowerPowerBuilder};
pub use protocol::{
    Command, Completion, Event, EventKind, HostClock, State, StateMachine, system_clock,
};
pub use scan::{DiscoveredDevice, ScanOptions};
pub use session::Session;
pub use traits::{FlowerPowerDevice, NotificationStream};

// Re-export from flowerpower-types
pub use flowerpower_types::uuid as uuids;
pub use flowerpower_types::{Characteristic, HistoryLog, Measurement, RawData};
