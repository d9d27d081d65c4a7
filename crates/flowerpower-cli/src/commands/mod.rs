//! Command implementations for the CLI.

mod download;
mod download_config;
mod list;
mod merge;

pub use download::{DownloadArgs, cmd_download};
pub use download_config::{
    DownloadConfigArgs, Label, Location, SensorEntry, cmd_download_config, load_entries,
};
pub use list::{cmd_list, format_devices};
pub use merge::cmd_merge;
