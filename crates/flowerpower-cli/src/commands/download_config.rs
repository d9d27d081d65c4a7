//! Batch download driven by a JSON device list.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::download::fetch_history;
use crate::style;
use crate::util::write_log;

/// An identifier in the device list; either a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Number(i64),
    Text(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Number(n) => write!(f, "{}", n),
            Label::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: Label,
}

/// One sensor in the device list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorEntry {
    pub address: String,
    pub id: Label,
    pub location: Location,
}

impl SensorEntry {
    /// `<location-id>-<YYYYMMDD>-<id>.json`
    pub fn file_name(&self, date: NaiveDate) -> String {
        format!(
            "{}-{}-{}.json",
            self.location.id,
            date.format("%Y%m%d"),
            self.id
        )
    }
}

/// Load and parse a device list.
pub fn load_entries(path: &Path) -> Result<Vec<SensorEntry>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse device list {}", path.display()))
}

/// Arguments for the download-using-config command.
pub struct DownloadConfigArgs<'a> {
    pub config: &'a Path,
    pub output_dir: PathBuf,
    pub scan_timeout: Duration,
    pub stall_timeout: Duration,
    pub quiet: bool,
    pub no_color: bool,
}

pub async fn cmd_download_config(args: DownloadConfigArgs<'_>) -> Result<()> {
    let DownloadConfigArgs {
        config,
        output_dir,
        scan_timeout,
        stall_timeout,
        quiet,
        no_color,
    } = args;

    let entries = load_entries(config)?;
    let today = chrono::Local::now().date_naive();
    let mut failed = Vec::new();

    for entry in &entries {
        let target = output_dir.join(entry.file_name(today));
        if target.exists() {
            if !quiet {
                eprintln!(
                    "{}",
                    style::format_skipped(
                        &format!("{}: {} already exists", entry.address, target.display()),
                        no_color
                    )
                );
            }
            continue;
        }

        let result = match fetch_history(&entry.address, scan_timeout, stall_timeout, quiet).await
        {
            Ok(log) => write_log(&target, &log).map(|()| log.len()),
            Err(e) => Err(e),
        };

        match result {
            Ok(count) => {
                if !quiet {
                    eprintln!(
                        "{}",
                        style::format_success(
                            &format!(
                                "{}: {} measurements written to {}",
                                entry.address,
                                count,
                                target.display()
                            ),
                            no_color
                        )
                    );
                }
            }
            Err(e) => {
                warn!(address = %entry.address, "download failed: {:#}", e);
                eprintln!(
                    "{}",
                    style::format_failure(&format!("{}: {:#}", entry.address, e), no_color)
                );
                failed.push(entry.address.clone());
            }
        }
    }

    if !failed.is_empty() {
        bail!(
            "{} of {} downloads failed: {}",
            failed.len(),
            entries.len(),
            failed.join(", ")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    #[test]
    fn test_label_accepts_string_or_integer() {
        let labels: Vec<Label> = serde_json::from_str(r#"[12, "pot-3"]"#).unwrap();
        assert_eq!(labels, vec![Label::Number(12), Label::Text("pot-3".into())]);
        assert_eq!(labels[0].to_string(), "12");
        assert_eq!(labels[1].to_string(), "pot-3");
    }

    #[test]
    fn test_entry_file_name() {
        let entry: SensorEntry = serde_json::from_str(
            r#"{"address": "A0:14:3D:00:00:01", "id": 4, "location": {"id": "greenhouse"}}"#,
        )
        .unwrap();
        assert_eq!(entry.file_name(date()), "greenhouse-20240307-4.json");
    }

    #[test]
    fn test_entry_missing_location_rejected() {
        let result: std::result::Result<SensorEntry, _> =
            serde_json::from_str(r#"{"address": "A0:14:3D:00:00:01", "id": 4}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sensors.json");
        fs::write(
            &path,
            r#"[
                {"address": "A0:14:3D:00:00:01", "id": 1, "location": {"id": 10}},
                {"address": "A0:14:3D:00:00:02", "id": "b", "location": {"id": "roof"}}
            ]"#,
        )
        .unwrap();

        let entries = load_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].file_name(date()), "10-20240307-1.json");
        assert_eq!(entries[1].file_name(date()), "roof-20240307-b.json");
    }

    #[tokio::test]
    async fn test_existing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("sensors.json");
        fs::write(
            &list,
            r#"[{"address": "A0:14:3D:00:00:01", "id": 1, "location": {"id": 2}}]"#,
        )
        .unwrap();

        let today = chrono::Local::now().date_naive();
        let existing = dir.path().join(format!("2-{}-1.json", today.format("%Y%m%d")));
        fs::write(&existing, "{}").unwrap();

        // The only entry is skipped, so no Bluetooth access happens.
        cmd_download_config(DownloadConfigArgs {
            config: &list,
            output_dir: dir.path().to_path_buf(),
            scan_timeout: Duration::from_secs(1),
            stall_timeout: Duration::from_secs(1),
            quiet: true,
            no_color: true,
        })
        .await
        .unwrap();

        assert_eq!(fs::read_to_string(&existing).unwrap(), "{}");
    }
}
