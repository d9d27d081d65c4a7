//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "flower-power")]
#[command(
    author,
    version,
    about = "Download and merge Parrot Flower Power measurement histories",
    long_about = None
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Download the stored history of one sensor into a JSON file
    Download {
        /// Device address (MAC address or, on macOS, peripheral UUID)
        address: String,

        /// Output file
        file: PathBuf,

        /// How long to look for the device, in seconds [default: from config, 30]
        #[arg(short = 'T', long)]
        scan_timeout: Option<u64>,

        /// Abandon the download after this many seconds without progress [default: from config, 60]
        #[arg(long)]
        stall_timeout: Option<u64>,
    },

    /// Download every sensor listed in a JSON device list
    #[command(name = "download-using-config")]
    DownloadUsingConfig {
        /// JSON list of `{address, id, location: {id}}` entries
        config: PathBuf,

        /// Directory for the output files [default: from config, or the current directory]
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// How long to look for each device, in seconds [default: from config, 30]
        #[arg(short = 'T', long)]
        scan_timeout: Option<u64>,
    },

    /// Merge two history files of the same sensor
    Merge {
        /// First history file
        in1: PathBuf,

        /// Second history file
        in2: PathBuf,

        /// Output file
        out: PathBuf,
    },

    /// List nearby Flower Power sensors
    List {
        /// Scan duration in seconds [default: from config, 60]
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Show every BLE device, not only Parrot addresses
        #[arg(short, long)]
        all: bool,
    },
}
