//! List archives and their snapshot names

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

    // 2. Catalog of archives and snapshot names
    let listings = repo.list(archive_glob, snapshot_glob)?;

    println!("{}", "Archives".bold());
    if listings.is_empty() {
        println!("  {}", "no matching archives".dimmed());
        return Ok(());
    }

    for listing in &listings {
        println!(
            "{} {}",
            listing.archive.cyan(),
            format!("({} snapshots)", listing.snapshots.len()).dimmed()
        );
        for name in &listing.snapshots {
            match time::parse_snapshot_name(name) {
                Ok(ticks) => println!(
                    "  {} {}",
                    name.yellow(),
                    time::format_ticks(ticks).dimmed()
                ),
                Err(_) => println!("  {}", name.yellow()),
            }
        }
    }
    Ok(())
}
