//! Back up a data folder into a repository archive

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snapback_core::{Repository, RunOptions};
use std::path::Path;
use std::time::Instant;

pub fn run(data_folder: &Path, repository: &Path, options: &RunOptions) -> Result<()> {
    let started = Instant::now();

    // 1. Open the repository, creating FILE/ and SNAPSHOT/ on first use
    let repo = Repository::open(repository, true)
        .with_context(|| format!("open repository: {}", repository.display()))?;

    // 2. Scan, deduplicate against the previous snapshot, copy new blobs
    let (snapshot_name, report) = repo.backup(data_folder, options)?;

    // 3. Summary
    println!("{}", "Backup".bold());
    println!(
        "  {} -> {} [{}]",
        data_folder.display(),
        repository.display(),
        options.archive_name.cyan()
    );
    println!("  Snapshot:  {}", snapshot_name.yellow());
    println!("  Files:     {}", report.files_total);
    println!(
        "  Unchanged: {} {}",
        report.files_skipped,
        "(fast path)".dimmed()
    );
    println!(
        "  Copied:    {} blobs, {}",
        report.blobs_copied,
        util::format_bytes(report.bytes_copied)
    );
    println!(
        "  Done in {:.2}s",
        started.elapsed().as_secs_f64()
    );

    if report.errors.is_empty() {
        println!("{} Backup complete", "✓".green());
    } else {
        println!(
            "{} Backup finished with {} errors",
            "⚠".yellow(),
            report.errors.len()
        );
        util::print_errors(&report.errors);
    }
    Ok(())
}
