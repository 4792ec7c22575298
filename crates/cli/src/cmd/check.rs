//! Verify that a snapshot's blobs are present in the store

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snapback_core::{Repository, RunOptions};
use std::path::Path;

pub fn run(repository: &Path, options: &RunOptions) -> Result<()> {
    // 1. Open the repository read-only
    let repo = Repository::open(repository, false)
        .with_context(|| format!("open repository: {}", repository.display()))?;

    // 2. Verify blob presence and sizes for the selected snapshot
    let report = repo.check(options)?;

    // 3. Summary
    println!("{}", "Check".bold());
    println!("  Archive: {}", options.archive_name.cyan());
    println!("  Files checked: {}", report.files_checked);
    if report.is_clean() {
        println!("{} All blobs present with the recorded sizes", "✓".green());
    } else {
        println!(
            "{} {} problems found",
            "⚠".yellow(),
            report.problems.len()
        );
        util::print_errors(&report.problems);
    }
    Ok(())
}
