//! Shared fixtures for integration tests
//!
//! Builders for small data-folder trees and helpers to inspect repository
//! and data state after operations.

#![allow(dead_code)]

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A data folder plus a repository folder, both temporary.
pub struct Workbench {
    pub data: TempDir,
    pub repo: TempDir,
}

impl Workbench {
    pub fn new() -> Result<Workbench> {
        Ok(Workbench {
            data: TempDir::new()?,
            repo: TempDir::new()?,
        })
    }

    pub fn data_path(&self) -> &Path {
        self.data.path()
    }

    pub fn repo_path(&self) -> &Path {
        self.repo.path()
    }

    /// Write a file below the data folder, creating parent directories.
    pub fn write(&self, rel: &str, content: &[u8]) -> Result<PathBuf> {
        let path = self.data.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn mkdir(&self, rel: &str) -> Result<PathBuf> {
        let path = self.data.path().join(rel);
        fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn remove(&self, rel: &str) -> Result<()> {
        Ok(fs::remove_file(self.data.path().join(rel))?)
    }

    pub fn read(&self, rel: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.data.path().join(rel))?)
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.data.path().join(rel).exists()
    }
}

/// Every `.dbf` blob name in the repository store, sorted.
pub fn store_blob_names(repo: &Path) -> Vec<String> {
    let mut names = Vec::new();
    for entry in walk_files(&repo.join("FILE")) {
        if entry.extension().map(|e| e == "dbf").unwrap_or(false) {
            names.push(entry.file_name().unwrap().to_string_lossy().into_owned());
        }
    }
    names.sort();
    names
}

/// Relative paths of every file below `root`, `/`-separated and sorted.
pub fn tree_listing(root: &Path) -> Vec<String> {
    let mut paths: Vec<String> = walk_files(root)
        .into_iter()
        .map(|p| {
            p.strip_prefix(root)
                .expect("walked file below root")
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    paths.sort();
    paths
}

fn walk_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files
}
