use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use flowerpower_cli::cli::{Cli, Commands};
use flowerpower_cli::commands::{
    DownloadArgs, DownloadConfigArgs, cmd_download, cmd_download_config, cmd_list, cmd_merge,
};
use flowerpower_cli::config::{Config, resolve_timeout};

#[tokio::main]
async fn main() -> ExitCode {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    let filter = if cli.quiet {
        EnvFilter::new("warn")
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load();
    let quiet = cli.quiet;
    let no_color = cli.no_color || config.no_color;

    match cli.command {
        Commands::Download {
            address,
            file,
            scan_timeout,
            stall_timeout,
        } => {
            cmd_download(DownloadArgs {
                address: &address,
                file: &file,
                scan_timeout: resolve_timeout(scan_timeout, config.scan_timeout),
                stall_timeout: resolve_timeout(stall_timeout, config.stall_timeout),
                quiet,
                no_color,
            })
            .await
        }
        Commands::DownloadUsingConfig {
            config: list,
            output_dir,
            scan_timeout,
        } => {
            cmd_download_config(DownloadConfigArgs {
                config: &list,
                output_dir: output_dir.unwrap_or_else(|| config.output_dir()),
                scan_timeout: resolve_timeout(scan_timeout, config.scan_timeout),
                stall_timeout: resolve_timeout(None, config.stall_timeout),
                quiet,
                no_color,
            })
            .await
        }
        Commands::Merge { in1, in2, out } => cmd_merge(&in1, &in2, &out, quiet, no_color),
        Commands::List { timeout, all } => {
            cmd_list(timeout.unwrap_or(config.list_window), all, quiet, no_color).await
        }
    }
}
