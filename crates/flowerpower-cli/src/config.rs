//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STALL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LIST_WINDOW_SECS: u64 = 60;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Seconds to look for the target device before giving up
    #[serde(default = "default_scan_timeout")]
    pub scan_timeout: u64,

    /// Seconds without any protocol event before a download is abandoned
    #[serde(default = "default_stall_timeout")]
    pub stall_timeout: u64,

    /// Scan window for `list`, in seconds
    #[serde(default = "default_list_window")]
    pub list_window: u64,

    /// Where `download-using-config` writes its files
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Disable colored output
    #[serde(default)]
    pub no_color: bool,
}

fn default_scan_timeout() -> u64 {
    DEFAULT_SCAN_TIMEOUT_SECS
}

fn default_stall_timeout() -> u64 {
    DEFAULT_STALL_TIMEOUT_SECS
}

fn default_list_window() -> u64 {
    DEFAULT_LIST_WINDOW_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_timeout: DEFAULT_SCAN_TIMEOUT_SECS,
            stall_timeout: DEFAULT_STALL_TIMEOUT_SECS,
            list_window: DEFAULT_LIST_WINDOW_SECS,
            output_dir: None,
            no_color: false,
        }
    }
}

impl Config {
    /// Get config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flowerpower")
            .join("config.toml")
    }

    /// Load config from the default location, or return defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::path())
    }

    /// Load config from `path`. A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        eprintln!("Warning: Failed to parse config: {}", e);
                    }
                },
                Err(e) => {
                    eprintln!("Warning: Failed to read config: {}", e);
                }
            }
        }
        Self::default()
    }

    /// Output directory for batch downloads, defaulting to the current directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Resolve a timeout from an explicit flag, falling back to the configured value.
pub fn resolve_timeout(flag: Option<u64>, configured: u64) -> Duration {
    Duration::from_secs(flag.unwrap_or(configured))
}
