//! In-memory snapshot model: folder/file records, scanning, and the
//! tagged-section (de)serialisation
//!
//! A snapshot is the immutable record of one scan of a data folder. Folders
//! and files live in flat vectors; files point at their folder by index and
//! folders point at their parent by index, parents strictly preceding
//! children. Paths are not stored on disk - they are reconstructed on load
//! by walking the parent chain.

use crate::codec::{SectionReader, SectionWriter};
use crate::filter::{FilterConfig, FilterEngine};
use crate::fsutil;
use crate::hash::Sha256Hash;
use ahash::AHashMap;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Format version written into every snapshot.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Snapshot file extension (without dot).
pub const SNAPSHOT_EXT: &str = "dbs";

/// Serialised sentinel for "no parent folder".
const NO_PARENT: u32 = 0xFFFF_FFFF;

/// A directory in a snapshot. `path` is the relative logical path with a
/// trailing slash (empty for the root); it is derived, never serialised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub parent: Option<u32>,
    pub name: String,
    pub access_time: u64,
    pub modification_time: u64,
    pub attributes: u32,
    pub path: String,
}

/// A regular file in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub folder_index: u32,
    pub name: String,
    pub hash: Sha256Hash,
    pub byte_count: u64,
    pub access_time: u64,
    pub modification_time: u64,
    pub attributes: u32,
}

impl FileEntry {
    /// Fast-path equality: a file with the same size and mtime is assumed
    /// unchanged and its previous hash is adopted without re-reading.
    pub fn same_stamp(&self, other: &FileEntry) -> bool {
        self.byte_count == other.byte_count
            && self.modification_time == other.modification_time
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub version: u32,
    /// Scan time in ticks.
    pub time: u64,
    /// Absolute path of the scanned data folder.
    pub data_folder_path: String,
    /// Filter configuration that was in effect for the scan.
    pub filters: FilterConfig,
    pub folders: Vec<Folder>,
    pub files: Vec<FileEntry>,
}

impl Snapshot {
    /// Scan `data_folder` into a new snapshot. File hashes are left zeroed;
    /// the store fills or adopts them during backup.
    ///
    /// Within each directory, file records are emitted before any
    /// subdirectory is entered; subdirectories are visited pre-order in
    /// enumeration order. Symlinks are never followed nor recorded.
    pub fn scan(data_folder: &Path, filters: &FilterConfig, time: u64) -> Result<Snapshot> {
        let engine = FilterEngine::compile(filters)?;
        let root_info = fsutil::stat(data_folder)
            .with_context(|| format!("scan data folder: {}", data_folder.display()))?;
        if !root_info.is_dir {
            bail!("data folder is not a directory: {}", data_folder.display());
        }

        let mut snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            time,
            data_folder_path: data_folder.to_string_lossy().into_owned(),
            filters: filters.clone(),
            folders: vec![Folder {
                parent: None,
                name: root_info.name,
                access_time: root_info.access_time,
                modification_time: root_info.modification_time,
                attributes: root_info.attributes,
                path: String::new(),
            }],
            files: Vec::new(),
        };
        snapshot.scan_folder(data_folder, 0, &engine)?;
        Ok(snapshot)
    }

    fn scan_folder(&mut self, dir: &Path, folder_index: u32, engine: &FilterEngine) -> Result<()> {
        let folder_path = self.folders[folder_index as usize].path.clone();
        let candidate = format!("/{}", folder_path);
        let entries = fsutil::walk_shallow(dir)?;

        // Files of this directory first, then recursion.
        for entry in entries.iter().filter(|e| e.is_file && !e.is_symlink) {
            if !engine.file_in_scope(&candidate, &entry.name) {
                tracing::debug!("filtered out: {}{}", folder_path, entry.name);
                continue;
            }
            self.files.push(FileEntry {
                folder_index,
                name: entry.name.clone(),
                hash: Sha256Hash::zero(),
                byte_count: entry.size,
                access_time: entry.access_time,
                modification_time: entry.modification_time,
                attributes: entry.attributes,
            });
        }

        for entry in entries.iter().filter(|e| e.is_dir && !e.is_symlink) {
            let child_path = format!("{}{}/", folder_path, entry.name);
            if !engine.folder_included(&format!("/{}", child_path)) {
                tracing::debug!("filtered out: {}", child_path);
                continue;
            }
            let child_index = self.folders.len() as u32;
            self.folders.push(Folder {
                parent: Some(folder_index),
                name: entry.name.clone(),
                access_time: entry.access_time,
                modification_time: entry.modification_time,
                attributes: entry.attributes,
                path: child_path,
            });
            self.scan_folder(&dir.join(&entry.name), child_index, engine)?;
        }
        Ok(())
    }

    /// Relative logical path of a file (folder path + name).
    pub fn file_path(&self, file: &FileEntry) -> String {
        format!("{}{}", self.folders[file.folder_index as usize].path, file.name)
    }

    /// Absolute on-disk location of a file under `data_root`.
    pub fn file_abs_path(&self, data_root: &Path, file: &FileEntry) -> PathBuf {
        let folder = &self.folders[file.folder_index as usize];
        if folder.path.is_empty() {
            data_root.join(&file.name)
        } else {
            data_root.join(&folder.path).join(&file.name)
        }
    }

    /// Build the lookup maps used for diffing against another snapshot.
    pub fn build_index(&self) -> SnapshotIndex {
        let mut folder_by_path = AHashMap::with_capacity(self.folders.len());
        for (index, folder) in self.folders.iter().enumerate() {
            folder_by_path.insert(folder.path.clone(), index as u32);
        }
        let mut file_by_name: Vec<AHashMap<String, u32>> =
            vec![AHashMap::new(); self.folders.len()];
        for (index, file) in self.files.iter().enumerate() {
            file_by_name[file.folder_index as usize].insert(file.name.clone(), index as u32);
        }
        SnapshotIndex {
            folder_by_path,
            file_by_name,
        }
    }

    /// Serialise into the tagged-section stream format.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = SectionWriter::new();

        w.begin_section("Version");
        w.write_u32(self.version);

        w.begin_section("Time");
        w.write_varuint(self.time);

        w.begin_section("DataFolderPath");
        w.write_text(&self.data_folder_path);

        w.begin_section("FolderFilterArray");
        write_text_array(&mut w, &self.filters.folder_filters);

        w.begin_section("FolderFilterIsInclusiveArray");
        write_bool_array(&mut w, &self.filters.folder_filter_is_inclusive);

        w.begin_section("FileFilterArray");
        write_text_array(&mut w, &self.filters.file_filters);

        w.begin_section("FileFilterIsInclusiveArray");
        write_bool_array(&mut w, &self.filters.file_filter_is_inclusive);

        w.begin_section("SelectedFileFilterArray");
        write_text_array(&mut w, &self.filters.selected_file_filters);

        w.begin_section("FolderArray");
        w.write_u32(self.folders.len() as u32);
        for folder in &self.folders {
            w.write_u32(folder.parent.unwrap_or(NO_PARENT));
            w.write_text(&folder.name);
            w.write_varuint(folder.access_time);
            w.write_varuint(folder.modification_time);
            w.write_u32(folder.attributes);
        }

        w.begin_section("FileArray");
        w.write_u32(self.files.len() as u32);
        for file in &self.files {
            w.write_u32(file.folder_index);
            w.write_text(&file.name);
            w.write_hash(file.hash.as_bytes());
            w.write_varuint(file.byte_count);
            w.write_varuint(file.access_time);
            w.write_varuint(file.modification_time);
            w.write_u32(file.attributes);
        }

        w.finish()
    }

    /// Decode a snapshot, validating structure and reconstructing folder
    /// paths. The entire stream must be consumed.
    pub fn deserialize(bytes: &[u8]) -> Result<Snapshot> {
        let mut r = SectionReader::new(bytes)?;

        let version = read_or_default(&mut r, "Version", |r| r.read_u32())?;
        if version != SNAPSHOT_VERSION {
            bail!("unsupported snapshot version: {}", version);
        }
        let time = read_or_default(&mut r, "Time", |r| r.read_varuint())?;
        let data_folder_path = read_or_default(&mut r, "DataFolderPath", |r| r.read_text())?;

        let folder_filters = read_or_default(&mut r, "FolderFilterArray", read_text_array)?;
        let folder_filter_is_inclusive =
            read_or_default(&mut r, "FolderFilterIsInclusiveArray", read_bool_array)?;
        let file_filters = read_or_default(&mut r, "FileFilterArray", read_text_array)?;
        let file_filter_is_inclusive =
            read_or_default(&mut r, "FileFilterIsInclusiveArray", read_bool_array)?;
        let selected_file_filters =
            read_or_default(&mut r, "SelectedFileFilterArray", read_text_array)?;

        let mut folders = read_or_default(&mut r, "FolderArray", |r| {
            let count = r.read_u32()? as usize;
            let mut folders = Vec::with_capacity(count);
            for _ in 0..count {
                let parent = r.read_u32()?;
                folders.push(Folder {
                    parent: (parent != NO_PARENT).then_some(parent),
                    name: r.read_text()?,
                    access_time: r.read_varuint()?,
                    modification_time: r.read_varuint()?,
                    attributes: r.read_u32()?,
                    path: String::new(),
                });
            }
            Ok(folders)
        })?;

        let files = read_or_default(&mut r, "FileArray", |r| {
            let count = r.read_u32()? as usize;
            let mut files = Vec::with_capacity(count);
            for _ in 0..count {
                files.push(FileEntry {
                    folder_index: r.read_u32()?,
                    name: r.read_text()?,
                    hash: Sha256Hash::from_bytes(r.read_hash()?),
                    byte_count: r.read_varuint()?,
                    access_time: r.read_varuint()?,
                    modification_time: r.read_varuint()?,
                    attributes: r.read_u32()?,
                });
            }
            Ok(files)
        })?;

        if !r.is_exhausted() {
            match r.pending_tag() {
                Some(tag) => bail!("unrecognised snapshot section: {}", tag),
                None => bail!("snapshot has {} trailing bytes", r.remaining()),
            }
        }

        // Reconstruct paths and enforce the structural invariants: exactly
        // one root at index 0, parents strictly before children, file
        // folder references in range.
        for index in 0..folders.len() {
            match folders[index].parent {
                None => {
                    if index != 0 {
                        bail!("folder {} has no parent but is not the root", index);
                    }
                }
                Some(parent) => {
                    if index == 0 {
                        bail!("root folder has a parent");
                    }
                    if parent as usize >= index {
                        bail!(
                            "folder {} references parent {} that does not precede it",
                            index,
                            parent
                        );
                    }
                    folders[index].path =
                        format!("{}{}/", folders[parent as usize].path, folders[index].name);
                }
            }
        }
        if folders.is_empty() {
            bail!("snapshot has no root folder");
        }
        for (index, file) in files.iter().enumerate() {
            if file.folder_index as usize >= folders.len() {
                bail!(
                    "file {} references folder {} of {}",
                    index,
                    file.folder_index,
                    folders.len()
                );
            }
        }

        Ok(Snapshot {
            version,
            time,
            data_folder_path,
            filters: FilterConfig {
                folder_filters,
                folder_filter_is_inclusive,
                file_filters,
                file_filter_is_inclusive,
                selected_file_filters,
            },
            folders,
            files,
        })
    }

    /// Load a `.dbs` snapshot file.
    pub fn load(path: &Path) -> Result<Snapshot> {
        let bytes = fsutil::read_all(path)?;
        Snapshot::deserialize(&bytes)
            .with_context(|| format!("corrupt snapshot: {}", path.display()))
    }

    /// Write a `.dbs` snapshot file.
    pub fn save(&self, path: &Path) -> Result<()> {
        fsutil::write_all(path, &self.serialize())
    }
}

fn write_text_array(w: &mut SectionWriter, values: &[String]) {
    w.write_u32(values.len() as u32);
    for value in values {
        w.write_text(value);
    }
}

fn write_bool_array(w: &mut SectionWriter, values: &[bool]) {
    w.write_u32(values.len() as u32);
    for &value in values {
        w.write_bool(value);
    }
}

fn read_text_array(r: &mut SectionReader) -> Result<Vec<String>> {
    let count = r.read_u32()? as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(r.read_text()?);
    }
    Ok(values)
}

fn read_bool_array(r: &mut SectionReader) -> Result<Vec<bool>> {
    let count = r.read_u32()? as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        values.push(r.read_bool()?);
    }
    Ok(values)
}

/// Read a section, falling back to the type's default when it is absent.
/// Missing sections are tolerated (and logged) for forward compatibility.
fn read_or_default<T: Default>(
    r: &mut SectionReader,
    tag: &str,
    parse: impl FnOnce(&mut SectionReader) -> Result<T>,
) -> Result<T> {
    match r.read_section(tag, parse)? {
        Some(value) => Ok(value),
        None => {
            tracing::warn!("snapshot section missing: {}", tag);
            Ok(T::default())
        }
    }
}

/// Lookup maps over one snapshot: folder index by path, and per-folder file
/// index by name.
pub struct SnapshotIndex {
    folder_by_path: AHashMap<String, u32>,
    file_by_name: Vec<AHashMap<String, u32>>,
}

impl SnapshotIndex {
    pub fn folder_index(&self, folder_path: &str) -> Option<u32> {
        self.folder_by_path.get(folder_path).copied()
    }

    pub fn has_folder(&self, folder_path: &str) -> bool {
        self.folder_by_path.contains_key(folder_path)
    }

    /// Find a file by its folder path and name.
    pub fn file_index(&self, folder_path: &str, name: &str) -> Option<u32> {
        let folder = self.folder_index(folder_path)?;
        self.file_by_name[folder as usize].get(name).copied()
    }
}

/// One difference found by [`compare_snapshots`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    /// File recorded in the archive snapshot is absent from the data folder.
    MissingArchiveFile,
    /// File exists on both sides but size or mtime differ.
    ChangedArchiveFile,
    /// Folder recorded in the archive snapshot is absent from the data folder.
    MissingArchiveFolder,
    /// File in the data folder is not recorded in the archive snapshot.
    MissingDataFile,
    /// Folder in the data folder is not recorded in the archive snapshot.
    MissingDataFolder,
}

impl DiffKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiffKind::MissingArchiveFile => "Missing archive file",
            DiffKind::ChangedArchiveFile => "Changed archive file",
            DiffKind::MissingArchiveFolder => "Missing archive folder",
            DiffKind::MissingDataFile => "Missing data file",
            DiffKind::MissingDataFolder => "Missing data folder",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub kind: DiffKind,
    pub path: String,
}

/// Compare an archive snapshot against a freshly scanned data snapshot.
/// Read-only; mutates nothing.
pub fn compare_snapshots(archive: &Snapshot, data: &Snapshot) -> Vec<DiffEntry> {
    let archive_index = archive.build_index();
    let data_index = data.build_index();
    let mut diffs = Vec::new();

    for file in &archive.files {
        let folder_path = &archive.folders[file.folder_index as usize].path;
        match data_index.file_index(folder_path, &file.name) {
            None => diffs.push(DiffEntry {
                kind: DiffKind::MissingArchiveFile,
                path: archive.file_path(file),
            }),
            Some(index) => {
                if !file.same_stamp(&data.files[index as usize]) {
                    diffs.push(DiffEntry {
                        kind: DiffKind::ChangedArchiveFile,
                        path: archive.file_path(file),
                    });
                }
            }
        }
    }
    for folder in archive.folders.iter().skip(1) {
        if !data_index.has_folder(&folder.path) {
            diffs.push(DiffEntry {
                kind: DiffKind::MissingArchiveFolder,
                path: folder.path.clone(),
            });
        }
    }
    for file in &data.files {
        let folder_path = &data.folders[file.folder_index as usize].path;
        if archive_index.file_index(folder_path, &file.name).is_none() {
            diffs.push(DiffEntry {
                kind: DiffKind::MissingDataFile,
                path: data.file_path(file),
            });
        }
    }
    for folder in data.folders.iter().skip(1) {
        if !archive_index.has_folder(&folder.path) {
            diffs.push(DiffEntry {
                kind: DiffKind::MissingDataFolder,
                path: folder.path.clone(),
            });
        }
    }

    diffs
}
