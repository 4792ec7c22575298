//! Archives and history: the `SNAPSHOT/` side of a repository
//!
//! An archive is a named folder under `SNAPSHOT/` holding `.dbs` snapshot
//! files. Snapshot names are timestamps, so the ascending name sort is the
//! chronological order. The history is the in-memory view of all archives,
//! rebuilt on every invocation.

use crate::fsutil;
use crate::snapshot::{Snapshot, SNAPSHOT_EXT};
use crate::time;
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the history directory inside a repository.
pub const SNAPSHOT_DIR: &str = "SNAPSHOT";

/// Archive used when none is named.
pub const DEFAULT_ARCHIVE: &str = "DEFAULT";

/// Archive names are identifiers: ASCII alphanumerics and underscores.
pub fn is_valid_archive_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A named, ordered collection of snapshots.
pub struct Archive {
    pub name: String,
    folder: PathBuf,
    /// Ascending (chronological) snapshot names, extension stripped.
    pub snapshot_names: Vec<String>,
}

impl Archive {
    /// Open an archive folder. With `create`, `SNAPSHOT/<name>/` is created
    /// as needed; otherwise its absence is an error.
    pub fn open(repo_root: &Path, name: &str, create: bool) -> Result<Archive> {
        let folder = repo_root.join(SNAPSHOT_DIR).join(name);
        if create {
            fsutil::mkdir_recursive(&folder)?;
        } else if !folder.is_dir() {
            bail!("archive not found: {}", name);
        }
        let mut archive = Archive {
            name: name.to_string(),
            folder,
            snapshot_names: Vec::new(),
        };
        archive.rescan()?;
        Ok(archive)
    }

    /// Re-list the `*.dbs` files of this archive.
    pub fn rescan(&mut self) -> Result<()> {
        self.snapshot_names.clear();
        let entries = fs::read_dir(&self.folder)
            .with_context(|| format!("read archive: {}", self.folder.display()))?;
        for entry in entries {
            let entry =
                entry.with_context(|| format!("read archive: {}", self.folder.display()))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(&format!(".{}", SNAPSHOT_EXT)) {
                self.snapshot_names.push(stem.to_string());
            }
        }
        self.snapshot_names.sort();
        Ok(())
    }

    /// The most recent snapshot name; an empty archive is an error.
    pub fn last_snapshot_name(&self) -> Result<&str> {
        self.snapshot_names
            .last()
            .map(String::as_str)
            .with_context(|| format!("archive '{}' has no snapshots", self.name))
    }

    /// Resolve an optional requested name to an existing snapshot, default
    /// to the most recent.
    pub fn resolve_snapshot_name(&self, requested: Option<&str>) -> Result<&str> {
        match requested {
            None => self.last_snapshot_name(),
            Some(name) => self
                .snapshot_names
                .iter()
                .find(|n| n.as_str() == name)
                .map(String::as_str)
                .with_context(|| {
                    format!("snapshot '{}' not found in archive '{}'", name, self.name)
                }),
        }
    }

    pub fn snapshot_path(&self, name: &str) -> PathBuf {
        self.folder.join(format!("{}.{}", name, SNAPSHOT_EXT))
    }

    pub fn load_snapshot(&self, name: &str) -> Result<Snapshot> {
        Snapshot::load(&self.snapshot_path(name))
    }

    /// Load the most recent snapshot, or `None` for an empty archive.
    pub fn load_last_snapshot(&self) -> Result<Option<Snapshot>> {
        match self.snapshot_names.last() {
            Some(name) => Ok(Some(self.load_snapshot(name)?)),
            None => Ok(None),
        }
    }

    /// Write a snapshot under its timestamp name and record it. Returns the
    /// snapshot name.
    pub fn write_snapshot(&mut self, snapshot: &Snapshot) -> Result<String> {
        let name = time::snapshot_name(snapshot.time);
        snapshot.save(&self.snapshot_path(&name))?;
        self.snapshot_names.push(name.clone());
        self.snapshot_names.sort();
        Ok(name)
    }
}

/// All archives of a repository, keyed by name.
pub struct History {
    repo_root: PathBuf,
    root: PathBuf,
    pub archives: Vec<Archive>,
}

impl History {
    /// Open the history of a repository. With `create`, `SNAPSHOT/` is
    /// created; otherwise its absence is an error.
    pub fn open(repo_root: &Path, create: bool) -> Result<History> {
        let root = repo_root.join(SNAPSHOT_DIR);
        if create {
            fsutil::mkdir_recursive(&root)?;
        } else if !root.is_dir() {
            bail!(
                "not a repository (no {}/ directory): {}",
                SNAPSHOT_DIR,
                repo_root.display()
            );
        }
        Ok(History {
            repo_root: repo_root.to_path_buf(),
            root,
            archives: Vec::new(),
        })
    }

    /// Enumerate the archive subfolders.
    pub fn scan(&mut self) -> Result<()> {
        self.archives.clear();
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("read history: {}", self.root.display()))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry =
                entry.with_context(|| format!("read history: {}", self.root.display()))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        for name in names {
            self.archives
                .push(Archive::open(&self.repo_root, &name, false)?);
        }
        Ok(())
    }

    pub fn archive(&self, name: &str) -> Option<&Archive> {
        self.archives.iter().find(|a| a.name == name)
    }
}
