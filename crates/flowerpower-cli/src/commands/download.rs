//! Download command implementation.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use flowerpower_core::{ConnectionConfig, DownloadOptions, HistoryLog, download_history};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::style;
use crate::util::{connect_device, write_log};

/// Arguments for the download command.
pub struct DownloadArgs<'a> {
    pub address: &'a str,
    pub file: &'a Path,
    pub scan_timeout: Duration,
    pub stall_timeout: Duration,
    pub quiet: bool,
    pub no_color: bool,
}

pub async fn cmd_download(args: DownloadArgs<'_>) -> Result<()> {
    let DownloadArgs {
        address,
        file,
        scan_timeout,
        stall_timeout,
        quiet,
        no_color,
    } = args;

    let log = fetch_history(address, scan_timeout, stall_timeout, quiet).await?;
    write_log(file, &log)?;

    if !quiet {
        eprintln!(
            "{}",
            style::format_success(
                &format!("{} measurements written to {}", log.len(), file.display()),
                no_color
            )
        );
    }
    Ok(())
}

/// Connect to `address` and download its complete history.
pub(crate) async fn fetch_history(
    address: &str,
    scan_timeout: Duration,
    stall_timeout: Duration,
    quiet: bool,
) -> Result<HistoryLog> {
    let config = ConnectionConfig::default().scan_timeout(scan_timeout);
    let device = connect_device(address, config, quiet).await?;

    let pb = if !quiet {
        let pb = style::download_progress_bar();
        pb.set_message("Downloading history...");
        Some(pb)
    } else {
        None
    };

    // Ctrl-C cancels the session; the driver still disconnects the sensor.
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, cancelling download");
                cancel.cancel();
            }
        }
    });

    let mut options = DownloadOptions::default()
        .stall_timeout(stall_timeout)
        .cancel_token(cancel);
    if let Some(pb) = &pb {
        let pb = pb.clone();
        options = options.with_progress(move |progress| {
            pb.set_position((progress.fraction() * 100.0) as u64);
        });
    }

    let result = download_history(&device, options).await;
    interrupt.abort();

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    result.with_context(|| format!("Failed to download history from {}", address))
}
