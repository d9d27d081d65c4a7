//! Merge command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use flowerpower_types::merge;

use crate::style;
use crate::util::{read_log, write_log};

/// Merge the logs in `in1` and `in2` into `out`.
///
/// Nothing is written when the logs belong to different sensors.
pub fn cmd_merge(in1: &Path, in2: &Path, out: &Path, quiet: bool, no_color: bool) -> Result<()> {
    let a = read_log(in1)?;
    let b = read_log(in2)?;

    let merged = merge(&a, &b)
        .with_context(|| format!("Failed to merge {} and {}", in1.display(), in2.display()))?;
    write_log(out, &merged)?;

    if !quiet {
        eprintln!(
            "{}",
            style::format_success(
                &format!(
                    "{} + {} -> {} measurements written to {}",
                    a.len(),
                    b.len(),
                    merged.len(),
                    out.display()
                ),
                no_color
            )
        );
    }
    Ok(())
}
