//! Show details of matching snapshots

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snapback_core::{time, Repository};
use std::path::Path;

pub fn run(
    repository: &Path,
    archive_glob: Option<&str>,
    snapshot_glob: Option<&str>,
) -> Result<()> {
    // 1. Open the repository read-only
    let repo = Repository::open(repository, false)
        .with_context(|| format!("open repository: {}", repository.display()))?;

    // 2. Load every snapshot matching the globs
    let summaries = repo.find(archive_glob, snapshot_glob)?;

    println!("{}", "Snapshots".bold());
    if summaries.is_empty() {
        println!("  {}", "no matching snapshots".dimmed());
        return Ok(());
    }

    for summary in &summaries {
        println!(
            "{} {} {}",
            summary.archive.cyan(),
            summary.snapshot.yellow(),
            time::format_ticks(summary.time).dimmed()
        );
        println!("    data folder: {}", summary.data_folder_path);
        println!(
            "    {} folders, {} files, {}",
            summary.folder_count,
            summary.file_count,
            util::format_bytes(summary.total_bytes)
        );
    }
    println!();
    println!("{}", format!("Total: {} snapshots", summaries.len()).dimmed());
    Ok(())
}
