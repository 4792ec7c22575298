//! Compare a snapshot against the live data folder

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use snapback_core::{DiffKind, Repository, RunOptions};
use std::path::Path;

pub fn run(data_folder: &Path, repository: &Path, options: &RunOptions) -> Result<()> {
    // 1. Open the repository read-only
    let repo = Repository::open(repository, false)
        .with_context(|| format!("open repository: {}", repository.display()))?;

    // 2. Scan the live folder and diff it against the snapshot
    let diffs = repo.compare(data_folder, options)?;

    // 3. Report, one line per difference
    println!("{}", "Compare".bold());
    println!(
        "  {} vs [{}]",
        data_folder.display(),
        options.archive_name.cyan()
    );
    println!();

    if diffs.is_empty() {
        println!("{} Data folder matches the snapshot", "✓".green());
        return Ok(());
    }

    for diff in &diffs {
        let label = diff.kind.label();
        match diff.kind {
            DiffKind::ChangedArchiveFile => {
                println!("  {} {}", format!("{:22}", label).yellow(), diff.path)
            }
            DiffKind::MissingArchiveFile | DiffKind::MissingArchiveFolder => {
                println!("  {} {}", format!("{:22}", label).red(), diff.path)
            }
            DiffKind::MissingDataFile | DiffKind::MissingDataFolder => {
                println!("  {} {}", format!("{:22}", label).cyan(), diff.path)
            }
        }
    }
    println!();
    println!("{} {} differences", "⚠".yellow(), diffs.len());
    Ok(())
}
