//! Command-line interface for Parrot Flower Power sensors.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `download <address> <file>` | Download one sensor's history as JSON |
//! | `download-using-config <list.json>` | Download every sensor in a device list |
//! | `merge <in1> <in2> <out>` | Merge two histories of the same sensor |
//! | `list` | Scan for nearby sensors |
//!
//! # Configuration
//!
//! Defaults are read from `~/.config/flowerpower/config.toml` (or the
//! platform equivalent):
//!
//! ```toml
//! scan_timeout = 30
//! stall_timeout = 60
//! list_window = 60
//! output_dir = "/var/lib/flowerpower"
//! ```
//!
//! Command-line flags override the file.
//!
//! # Device lists
//!
//! `download-using-config` reads a JSON list of sensors. Each output file is
//! named `<location-id>-<YYYYMMDD>-<id>.json`; entries whose file already
//! exists are skipped.
//!
//! ```json
//! [
//!     { "address": "A0:14:3D:12:34:56", "id": 7, "location": { "id": "greenhouse" } }
//! ]
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod style;
pub mod util;

// Re-export core dependencies for convenience
pub use flowerpower_core;
pub use flowerpower_types;
