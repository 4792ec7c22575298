//! Restore a snapshot into the data folder

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snapback_core::{Repository, RunOptions};
use std::path::Path;
use std::time::Instant;

pub fn run(data_folder: &Path, repository: &Path, options: &RunOptions) -> Result<()> {
    let started = Instant::now();

    // 1. Open the repository read-only (the store is not mutated)
    let repo = Repository::open(repository, false)
        .with_context(|| format!("open repository: {}", repository.display()))?;

    // 2. Scan the live folder, copy changed files out of the store, prune
    let report = repo.restore(data_folder, options)?;

    // 3. Summary
    println!("{}", "Restore".bold());
    println!(
        "  [{}] -> {}",
        options.archive_name.cyan(),
        data_folder.display()
    );
    println!("  Restored:  {}", report.files_restored);
    println!(
        "  Unchanged: {} {}",
        report.files_unchanged,
        "(left alone)".dimmed()
    );
    println!("  Deleted:   {} files", report.files_deleted);
    println!(
        "  Folders:   {} created, {} removed",
        report.folders_created, report.folders_removed
    );
    println!("  Done in {:.2}s", started.elapsed().as_secs_f64());

    if report.errors.is_empty() {
        println!("{} Restore complete", "✓".green());
    } else {
        println!(
            "{} Restore finished with {} errors",
            "⚠".yellow(),
            report.errors.len()
        );
        util::print_errors(&report.errors);
    }
    Ok(())
}
