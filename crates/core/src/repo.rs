//! Repository orchestration
//!
//! A repository composes the history (`SNAPSHOT/`) and the store (`FILE/`)
//! and dispatches the six top-level operations: backup, check, compare,
//! restore, find and list.

use crate::archive::{self, Archive, History};
use crate::filter::{self, FilterConfig};
use crate::snapshot::{compare_snapshots, DiffEntry, Snapshot};
use crate::store::{BackupReport, CheckReport, RestoreReport, Store};
use crate::time;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Options threaded from the command line through scan, backup and restore.
/// No global state: every operation receives its configuration explicitly.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub archive_name: String,
    /// Snapshot to operate on; defaults to the most recent.
    pub snapshot_name: Option<String>,
    pub filters: FilterConfig,
    /// Fail on the first per-file error instead of collecting and
    /// continuing.
    pub abort_on_error: bool,
    /// Reserved: accepted on the command line, never consulted. File
    /// equality stays strict on size and mtime.
    pub precision: Option<f64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            archive_name: archive::DEFAULT_ARCHIVE.to_string(),
            snapshot_name: None,
            filters: FilterConfig::default(),
            abort_on_error: false,
            precision: None,
        }
    }
}

/// One archive with its snapshot names, as produced by `list`.
#[derive(Debug, Clone)]
pub struct ArchiveListing {
    pub archive: String,
    pub snapshots: Vec<String>,
}

/// Loaded snapshot details, as produced by `find`.
#[derive(Debug, Clone)]
pub struct SnapshotSummary {
    pub archive: String,
    pub snapshot: String,
    pub time: u64,
    pub data_folder_path: String,
    pub folder_count: usize,
    pub file_count: usize,
    pub total_bytes: u64,
}

pub struct Repository {
    root: PathBuf,
    pub history: History,
    pub store: Store,
}

impl Repository {
    /// Open a repository and index both subtrees. With `create` (backup),
    /// missing `FILE/` and `SNAPSHOT/` directories are created; read-only
    /// commands treat their absence as an error.
    pub fn open(root: &Path, create: bool) -> Result<Repository> {
        let store = Store::open(root, create)?;
        store.scan()?;
        let mut history = History::open(root, create)?;
        history.scan()?;
        Ok(Repository {
            root: root.to_path_buf(),
            history,
            store,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn archive(&self, name: &str) -> Result<&Archive> {
        self.history
            .archive(name)
            .with_context(|| format!("archive not found: {}", name))
    }

    fn load_for(&self, options: &RunOptions) -> Result<Snapshot> {
        let archive = self.archive(&options.archive_name)?;
        let name = archive.resolve_snapshot_name(options.snapshot_name.as_deref())?;
        archive.load_snapshot(name)
    }

    /// Scan a data folder with the invocation's filters.
    fn scan_data_folder(&self, data_folder: &Path, options: &RunOptions) -> Result<Snapshot> {
        Snapshot::scan(data_folder, &options.filters, time::ticks_now())
    }

    /// Back up `data_folder` into the named archive. Returns the new
    /// snapshot's name alongside the copy counters.
    pub fn backup(
        &self,
        data_folder: &Path,
        options: &RunOptions,
    ) -> Result<(String, BackupReport)> {
        if !archive::is_valid_archive_name(&options.archive_name) {
            bail!("invalid archive name: {}", options.archive_name);
        }
        let data_folder = data_folder
            .canonicalize()
            .with_context(|| format!("data folder: {}", data_folder.display()))?;

        let mut archive = Archive::open(&self.root, &options.archive_name, true)?;
        let previous = archive.load_last_snapshot()?;

        let mut snapshot = self.scan_data_folder(&data_folder, options)?;
        let report =
            self.store
                .backup_snapshot(&mut snapshot, previous.as_ref(), options.abort_on_error)?;
        let name = archive.write_snapshot(&snapshot)?;
        Ok((name, report))
    }

    /// Verify the blobs behind a snapshot.
    pub fn check(&self, options: &RunOptions) -> Result<CheckReport> {
        let snapshot = self.load_for(options)?;
        Ok(self.store.check_snapshot(&snapshot))
    }

    /// Compare a snapshot against the live data folder. Read-only.
    pub fn compare(&self, data_folder: &Path, options: &RunOptions) -> Result<Vec<DiffEntry>> {
        let snapshot = self.load_for(options)?;
        let live = self.scan_data_folder(data_folder, options)?;
        Ok(compare_snapshots(&snapshot, &live))
    }

    /// Restore a snapshot into the live data folder, pruning extraneous
    /// files and then empty extraneous folders.
    pub fn restore(&self, data_folder: &Path, options: &RunOptions) -> Result<RestoreReport> {
        let snapshot = self.load_for(options)?;
        let live = self.scan_data_folder(data_folder, options)?;
        self.store
            .restore_snapshot(&snapshot, &live, data_folder, options.abort_on_error)
    }

    /// Catalog of archives and snapshot names matching the optional globs.
    pub fn list(
        &self,
        archive_glob: Option<&str>,
        snapshot_glob: Option<&str>,
    ) -> Result<Vec<ArchiveListing>> {
        let archive_matcher = archive_glob.map(filter::compile_glob).transpose()?;
        let snapshot_matcher = snapshot_glob.map(filter::compile_glob).transpose()?;

        let mut listings = Vec::new();
        for archive in &self.history.archives {
            if let Some(matcher) = &archive_matcher {
                if !matcher.is_match(&archive.name) {
                    continue;
                }
            }
            let snapshots = archive
                .snapshot_names
                .iter()
                .filter(|name| {
                    snapshot_matcher
                        .as_ref()
                        .map(|m| m.is_match(name.as_str()))
                        .unwrap_or(true)
                })
                .cloned()
                .collect();
            listings.push(ArchiveListing {
                archive: archive.name.clone(),
                snapshots,
            });
        }
        Ok(listings)
    }

    /// Load every matching snapshot and summarise it.
    pub fn find(
        &self,
        archive_glob: Option<&str>,
        snapshot_glob: Option<&str>,
    ) -> Result<Vec<SnapshotSummary>> {
        let mut summaries = Vec::new();
        for listing in self.list(archive_glob, snapshot_glob)? {
            let archive = self.archive(&listing.archive)?;
            for name in &listing.snapshots {
                let snapshot = archive.load_snapshot(name)?;
                summaries.push(SnapshotSummary {
                    archive: listing.archive.clone(),
                    snapshot: name.clone(),
                    time: snapshot.time,
                    data_folder_path: snapshot.data_folder_path.clone(),
                    folder_count: snapshot.folders.len(),
                    file_count: snapshot.files.len(),
                    total_bytes: snapshot.files.iter().map(|f| f.byte_count).sum(),
                });
            }
        }
        Ok(summaries)
    }
}
