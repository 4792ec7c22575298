//! Content-addressed blob store
//!
//! Blobs live under `FILE/<d1>/<d2>/<hex-hash>_<HEX-byte-count>.dbf`. The
//! two directory segments are derived from the first two hash bytes with a
//! 6-bit/8-bit split, which spreads typical hash distributions more evenly
//! than a naive byte split: at most 64 first-level and 256 second-level
//! directories.
//!
//! The store only ever grows. Re-running an interrupted backup is safe
//! because presence is keyed by the content-addressed name and the copy is
//! simply retried.

use crate::fsutil;
use crate::hash::{self, Sha256Hash};
use crate::snapshot::{FileEntry, Snapshot};
use anyhow::{bail, Context, Result};
use dashmap::DashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Name of the store directory inside a repository.
pub const STORE_DIR: &str = "FILE";

/// Blob file extension (without dot).
pub const BLOB_EXT: &str = "dbf";

/// Relative blob path for a content address, below the store directory.
pub fn blob_rel_path(hash: &Sha256Hash, byte_count: u64) -> PathBuf {
    let h = hash.as_bytes();
    let d1 = h[0] >> 2;
    let d2 = ((h[0] << 4) & 0xFF) | (h[1] >> 4);
    PathBuf::from(format!("{:02X}", d1))
        .join(format!("{:02X}", d2))
        .join(format!("{}_{:X}.{}", hash.to_hex(), byte_count, BLOB_EXT))
}

/// Parse `<64-hex>_<HEX>.dbf` back into its content address.
fn parse_blob_name(name: &str) -> Option<(Sha256Hash, u64)> {
    let stem = name.strip_suffix(&format!(".{}", BLOB_EXT))?;
    let (hash_part, count_part) = stem.split_once('_')?;
    let hash = Sha256Hash::from_hex(hash_part).ok()?;
    let byte_count = u64::from_str_radix(count_part, 16).ok()?;
    Some((hash, byte_count))
}

/// Outcome counters for a snapshot backup. Per-file failures are collected
/// rather than aborting unless the caller asked for abort-on-error.
#[derive(Debug, Default)]
pub struct BackupReport {
    pub files_total: usize,
    pub files_skipped: usize,
    pub blobs_copied: usize,
    pub bytes_copied: u64,
    pub errors: Vec<String>,
}

/// Outcome counters for a snapshot restore.
#[derive(Debug, Default)]
pub struct RestoreReport {
    pub files_restored: usize,
    pub files_unchanged: usize,
    pub files_deleted: usize,
    pub folders_created: usize,
    pub folders_removed: usize,
    pub errors: Vec<String>,
}

/// Outcome of a snapshot check.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub files_checked: usize,
    pub problems: Vec<String>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

pub struct Store {
    dir: PathBuf,
    present: DashSet<PathBuf>,
}

impl Store {
    /// Open the store of a repository. With `create`, the `FILE/` directory
    /// is created; otherwise its absence is an error.
    pub fn open(repo_root: &Path, create: bool) -> Result<Store> {
        let dir = repo_root.join(STORE_DIR);
        if create {
            fsutil::mkdir_recursive(&dir)?;
        } else if !dir.is_dir() {
            bail!(
                "not a repository (no {}/ directory): {}",
                STORE_DIR,
                repo_root.display()
            );
        }
        Ok(Store {
            dir,
            present: DashSet::new(),
        })
    }

    /// Index every valid blob below `FILE/`. Blobs whose recorded byte
    /// count disagrees with their on-disk size - and foreign files - are
    /// ignored (never deleted) and logged.
    pub fn scan(&self) -> Result<()> {
        for entry in WalkDir::new(&self.dir) {
            let entry = entry
                .with_context(|| format!("scan store: {}", self.dir.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            let Some((_, byte_count)) = parse_blob_name(&name) else {
                tracing::warn!("ignoring foreign file in store: {}", entry.path().display());
                continue;
            };
            let on_disk = entry
                .metadata()
                .with_context(|| format!("stat blob: {}", entry.path().display()))?
                .len();
            if on_disk != byte_count {
                tracing::warn!(
                    "ignoring blob with size mismatch ({} on disk, {} recorded): {}",
                    on_disk,
                    byte_count,
                    entry.path().display()
                );
                continue;
            }
            self.present.insert(entry.path().to_path_buf());
        }
        tracing::debug!("store indexed: {} blobs", self.present.len());
        Ok(())
    }

    /// Absolute path of the blob for a content address.
    pub fn blob_path(&self, hash: &Sha256Hash, byte_count: u64) -> PathBuf {
        self.dir.join(blob_rel_path(hash, byte_count))
    }

    /// Number of indexed blobs.
    pub fn blob_count(&self) -> usize {
        self.present.len()
    }

    /// Back up one data file: hash it, refresh the record's metadata, and
    /// copy it into the store unless the blob is already present. Returns
    /// true when a copy happened.
    pub fn backup_file(&self, file: &mut FileEntry, data_path: &Path) -> Result<bool> {
        let info = fsutil::stat(data_path)?;
        file.hash = hash::hash_file(data_path)?;
        file.byte_count = info.size;
        file.access_time = info.access_time;
        file.modification_time = info.modification_time;
        file.attributes = info.attributes;

        let blob = self.blob_path(&file.hash, file.byte_count);
        if self.present.contains(&blob) {
            return Ok(false);
        }
        if let Some(parent) = blob.parent() {
            fsutil::mkdir_recursive(parent)?;
        }
        fsutil::copy(data_path, &blob)?;
        self.present.insert(blob);
        Ok(true)
    }

    /// Back up a scanned snapshot, consulting `prev` to skip unchanged
    /// files: a file with the same relative path, size and mtime adopts the
    /// previous hash without being re-read.
    pub fn backup_snapshot(
        &self,
        snapshot: &mut Snapshot,
        prev: Option<&Snapshot>,
        abort_on_error: bool,
    ) -> Result<BackupReport> {
        let mut report = BackupReport {
            files_total: snapshot.files.len(),
            ..Default::default()
        };
        let prev_index = prev.map(|p| p.build_index());
        let data_root = PathBuf::from(&snapshot.data_folder_path);

        for index in 0..snapshot.files.len() {
            let folder_path = snapshot.folders[snapshot.files[index].folder_index as usize]
                .path
                .clone();
            if let (Some(prev), Some(prev_index)) = (prev, prev_index.as_ref()) {
                if let Some(old) = prev_index.file_index(&folder_path, &snapshot.files[index].name)
                {
                    let old = &prev.files[old as usize];
                    if snapshot.files[index].same_stamp(old) {
                        snapshot.files[index].hash = old.hash;
                        report.files_skipped += 1;
                        continue;
                    }
                }
            }

            let data_path = snapshot.file_abs_path(&data_root, &snapshot.files[index]);
            match self.backup_file(&mut snapshot.files[index], &data_path) {
                Ok(true) => {
                    report.blobs_copied += 1;
                    report.bytes_copied += snapshot.files[index].byte_count;
                }
                Ok(false) => {}
                Err(err) => {
                    let message =
                        format!("{}{}: {:#}", folder_path, snapshot.files[index].name, err);
                    if abort_on_error {
                        bail!("backup aborted: {}", message);
                    }
                    tracing::warn!("backup: {}", message);
                    report.errors.push(message);
                }
            }
        }
        Ok(report)
    }

    /// Restore `target` into the data folder described by `live`, a fresh
    /// scan of that folder. Unchanged files (same path, size, mtime) are
    /// left alone; everything else is copied out of the store and stamped
    /// with the recorded times and attributes. Afterwards the data folder
    /// is pruned: files absent from `target` are deleted, then folders
    /// absent from `target` are removed when empty - files strictly before
    /// folders.
    pub fn restore_snapshot(
        &self,
        target: &Snapshot,
        live: &Snapshot,
        data_root: &Path,
        abort_on_error: bool,
    ) -> Result<RestoreReport> {
        let mut report = RestoreReport::default();
        let target_index = target.build_index();
        let live_index = live.build_index();

        // Folders recorded in the target come back even when empty.
        for folder in target.folders.iter().skip(1) {
            let path = data_root.join(&folder.path);
            if !path.is_dir() {
                fsutil::mkdir_recursive(&path)?;
                report.folders_created += 1;
            }
        }

        for file in &target.files {
            let folder_path = &target.folders[file.folder_index as usize].path;
            if let Some(live_file) = live_index.file_index(folder_path, &file.name) {
                if file.same_stamp(&live.files[live_file as usize]) {
                    report.files_unchanged += 1;
                    continue;
                }
            }
            match self.restore_file(target, file, data_root) {
                Ok(()) => report.files_restored += 1,
                Err(err) => {
                    let message = format!("{}: {:#}", target.file_path(file), err);
                    if abort_on_error {
                        bail!("restore aborted: {}", message);
                    }
                    tracing::warn!("restore: {}", message);
                    report.errors.push(message);
                }
            }
        }

        // Prune pass, files first.
        for file in &live.files {
            let folder_path = &live.folders[file.folder_index as usize].path;
            if target_index.file_index(folder_path, &file.name).is_some() {
                continue;
            }
            let path = live.file_abs_path(data_root, file);
            match fsutil::remove_file(&path) {
                Ok(()) => report.files_deleted += 1,
                Err(err) => {
                    let message = format!("{}: {:#}", live.file_path(file), err);
                    if abort_on_error {
                        bail!("restore aborted: {}", message);
                    }
                    tracing::warn!("restore prune: {}", message);
                    report.errors.push(message);
                }
            }
        }

        // Children precede parents in reverse record order, so empty
        // directories unwind bottom-up.
        for folder in live.folders.iter().skip(1).rev() {
            if target_index.has_folder(&folder.path) {
                continue;
            }
            let path = data_root.join(&folder.path);
            if fsutil::dir_is_empty(&path).unwrap_or(false) {
                match fsutil::rmdir(&path) {
                    Ok(()) => report.folders_removed += 1,
                    Err(err) => {
                        tracing::warn!("restore prune: {}: {:#}", folder.path, err);
                        report.errors.push(format!("{}: {:#}", folder.path, err));
                    }
                }
            }
        }

        Ok(report)
    }

    fn restore_file(&self, target: &Snapshot, file: &FileEntry, data_root: &Path) -> Result<()> {
        let blob = self.blob_path(&file.hash, file.byte_count);
        if !self.present.contains(&blob) && !blob.is_file() {
            bail!("blob not in store: {}", blob.display());
        }
        let destination = target.file_abs_path(data_root, file);
        if destination.exists() {
            // An existing read-only destination would fail the copy.
            fsutil::make_writable(&destination)?;
        }
        fsutil::copy(&blob, &destination)?;
        fsutil::set_times(&destination, file.access_time, file.modification_time)?;
        // Attributes last: on Windows this re-arms the read-only bit only
        // after the times are in place.
        fsutil::set_attributes(&destination, file.attributes)?;
        Ok(())
    }

    /// Verify that every file of a snapshot has its blob in the store with
    /// the recorded size. Read-only.
    pub fn check_snapshot(&self, snapshot: &Snapshot) -> CheckReport {
        let mut report = CheckReport::default();
        for file in &snapshot.files {
            report.files_checked += 1;
            let blob = self.blob_path(&file.hash, file.byte_count);
            match fs::metadata(&blob) {
                Err(_) => {
                    report
                        .problems
                        .push(format!("{}: blob missing", snapshot.file_path(file)));
                }
                Ok(metadata) if metadata.len() != file.byte_count => {
                    report.problems.push(format!(
                        "{}: blob size {} does not match recorded {}",
                        snapshot.file_path(file),
                        metadata.len(),
                        file.byte_count
                    ));
                }
                Ok(_) => {}
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterConfig;
    use crate::hash::hash_bytes;

    fn scan(dir: &Path) -> Snapshot {
        Snapshot::scan(dir, &FilterConfig::default(), crate::time::ticks_now()).unwrap()
    }

    fn store_with_backup(repo: &Path, data: &Path) -> (Store, Snapshot) {
        let store = Store::open(repo, true).unwrap();
        store.scan().unwrap();
        let mut snapshot = scan(data);
        store.backup_snapshot(&mut snapshot, None, true).unwrap();
        (store, snapshot)
    }

    #[test]
    fn test_blob_rel_path_derivation() {
        // First two hash bytes 0xAB 0xCD: d1 = 0xAB >> 2 = 0x2A,
        // d2 = ((0xAB << 4) & 0xFF) | (0xCD >> 4) = 0xB0 | 0x0C = 0xBC.
        let mut bytes = [0u8; 32];
        bytes[0] = 0xAB;
        bytes[1] = 0xCD;
        let hash = Sha256Hash::from_bytes(bytes);
        let rel = blob_rel_path(&hash, 5);
        let rendered = rel.to_string_lossy().replace('\\', "/");
        assert!(rendered.starts_with("2A/BC/abcd"));
        assert!(rendered.ends_with("_5.dbf"));
    }

    #[test]
    fn test_blob_name_uppercase_byte_count() {
        let hash = hash_bytes(b"x");
        let rel = blob_rel_path(&hash, 0xDEAD);
        assert!(rel.to_string_lossy().ends_with("_DEAD.dbf"));
        let rel = blob_rel_path(&hash, 0);
        assert!(rel.to_string_lossy().ends_with("_0.dbf"));
    }

    #[test]
    fn test_parse_blob_name_roundtrip() {
        let hash = hash_bytes(b"roundtrip");
        let rel = blob_rel_path(&hash, 1234);
        let name = rel.file_name().unwrap().to_string_lossy();
        assert_eq!(parse_blob_name(&name), Some((hash, 1234)));
        assert_eq!(parse_blob_name("junk.dbf"), None);
        assert_eq!(parse_blob_name("nodot"), None);
    }

    #[test]
    fn test_open_requires_store_dir() {
        let repo = tempfile::tempdir().unwrap();
        assert!(Store::open(repo.path(), false).is_err());
        assert!(Store::open(repo.path(), true).is_ok());
        assert!(Store::open(repo.path(), false).is_ok());
    }

    #[test]
    fn test_duplicate_content_stored_once() {
        // Two names, identical 5-byte content: exactly one blob.
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("a.txt"), b"hello").unwrap();
        fs::write(data.path().join("b.txt"), b"hello").unwrap();

        let (store, snapshot) = store_with_backup(repo.path(), data.path());
        assert_eq!(store.blob_count(), 1);
        assert_eq!(snapshot.files[0].hash, hash_bytes(b"hello"));

        let expected = store.blob_path(&hash_bytes(b"hello"), 5);
        assert!(expected.is_file());
        assert!(expected.to_string_lossy().ends_with("_5.dbf"));
    }

    #[test]
    fn test_backup_fills_metadata() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("f.bin"), b"0123456789").unwrap();

        let (_, snapshot) = store_with_backup(repo.path(), data.path());
        let file = &snapshot.files[0];
        assert_eq!(file.byte_count, 10);
        assert_eq!(file.hash, hash_bytes(b"0123456789"));
        assert!(file.modification_time > 0);
    }

    #[test]
    fn test_fast_path_adopts_previous_hash() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let path = data.path().join("x.txt");
        fs::write(&path, b"one").unwrap();

        let (store, first) = store_with_backup(repo.path(), data.path());

        // Rewrite with different content but identical size and mtime: the
        // fast path must adopt the old hash without re-reading.
        let stamp = fsutil::stat(&path).unwrap();
        fs::write(&path, b"two").unwrap();
        fsutil::set_times(&path, stamp.access_time, stamp.modification_time).unwrap();

        let mut second = scan(data.path());
        let report = store
            .backup_snapshot(&mut second, Some(&first), true)
            .unwrap();
        assert_eq!(report.files_skipped, 1);
        assert_eq!(report.blobs_copied, 0);
        assert_eq!(second.files[0].hash, first.files[0].hash);
        assert_eq!(second.files[0].hash, hash_bytes(b"one"));
    }

    #[test]
    fn test_modified_file_gets_new_blob() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        let path = data.path().join("x.txt");
        fs::write(&path, b"one").unwrap();

        let (store, first) = store_with_backup(repo.path(), data.path());
        fs::write(&path, b"two-longer").unwrap();

        let mut second = scan(data.path());
        let report = store
            .backup_snapshot(&mut second, Some(&first), true)
            .unwrap();
        assert_eq!(report.blobs_copied, 1);
        assert_ne!(second.files[0].hash, first.files[0].hash);
        // The old blob stays: the store only grows.
        assert!(store.blob_path(&first.files[0].hash, 3).is_file());
        assert!(store.blob_path(&second.files[0].hash, 10).is_file());
    }

    #[test]
    fn test_backup_continues_past_unreadable_file() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("good.txt"), b"fine").unwrap();
        fs::write(data.path().join("gone.txt"), b"poof").unwrap();

        let store = Store::open(repo.path(), true).unwrap();
        store.scan().unwrap();
        let mut snapshot = scan(data.path());
        fs::remove_file(data.path().join("gone.txt")).unwrap();

        let report = store.backup_snapshot(&mut snapshot, None, false).unwrap();
        assert_eq!(report.blobs_copied, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("gone.txt"));

        // With abort-on-error the same situation is fatal.
        fs::write(data.path().join("gone.txt"), b"poof").unwrap();
        let mut snapshot = scan(data.path());
        fs::remove_file(data.path().join("gone.txt")).unwrap();
        assert!(store.backup_snapshot(&mut snapshot, None, true).is_err());
    }

    #[test]
    fn test_scan_ignores_malformed_blobs() {
        let repo = tempfile::tempdir().unwrap();
        let store = Store::open(repo.path(), true).unwrap();

        // A blob whose recorded size lies, and a foreign file.
        let hash = hash_bytes(b"lying");
        let lying = store.blob_path(&hash, 999);
        fs::create_dir_all(lying.parent().unwrap()).unwrap();
        fs::write(&lying, b"lying").unwrap();
        fs::write(repo.path().join(STORE_DIR).join("README"), b"hi").unwrap();

        store.scan().unwrap();
        assert_eq!(store.blob_count(), 0);
        // Ignored, not deleted.
        assert!(lying.is_file());
    }

    #[test]
    fn test_check_snapshot_reports_missing_and_mismatched() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("a.txt"), b"aaaa").unwrap();
        fs::write(data.path().join("b.txt"), b"bbbb-bbbb").unwrap();

        let (store, snapshot) = store_with_backup(repo.path(), data.path());
        let clean = store.check_snapshot(&snapshot);
        assert!(clean.is_clean());
        assert_eq!(clean.files_checked, 2);

        // Damage one blob and delete the other.
        let a = store.blob_path(&hash_bytes(b"aaaa"), 4);
        fs::remove_file(&a).unwrap();
        let b = store.blob_path(&hash_bytes(b"bbbb-bbbb"), 9);
        fs::write(&b, b"short").unwrap();

        let report = store.check_snapshot(&snapshot);
        assert_eq!(report.problems.len(), 2);
        assert!(report.problems.iter().any(|p| p.contains("blob missing")));
        assert!(report.problems.iter().any(|p| p.contains("does not match")));
    }

    #[test]
    fn test_restore_into_empty_folder() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::create_dir(data.path().join("sub")).unwrap();
        fs::create_dir(data.path().join("empty")).unwrap();
        fs::write(data.path().join("top.txt"), b"top").unwrap();
        fs::write(data.path().join("sub").join("inner.txt"), b"inner").unwrap();

        let (store, snapshot) = store_with_backup(repo.path(), data.path());

        let out = tempfile::tempdir().unwrap();
        let live = scan(out.path());
        let report = store
            .restore_snapshot(&snapshot, &live, out.path(), true)
            .unwrap();
        assert_eq!(report.files_restored, 2);
        assert_eq!(report.folders_created, 2);
        assert_eq!(
            fs::read(out.path().join("top.txt")).unwrap(),
            b"top"
        );
        assert_eq!(
            fs::read(out.path().join("sub").join("inner.txt")).unwrap(),
            b"inner"
        );
        // Empty folders recorded in the snapshot come back too.
        assert!(out.path().join("empty").is_dir());

        // Times and attributes are reproduced bit-for-bit.
        let original = &snapshot.files[0];
        let restored = fsutil::stat(&snapshot.file_abs_path(out.path(), original)).unwrap();
        assert_eq!(restored.modification_time, original.modification_time);
        #[cfg(unix)]
        assert_eq!(restored.attributes, original.attributes);
    }

    #[test]
    fn test_restore_prunes_extraneous() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("keep.txt"), b"keep").unwrap();

        let (store, snapshot) = store_with_backup(repo.path(), data.path());

        // The data folder drifts: an extra file and an extra folder appear.
        fs::write(data.path().join("extra.txt"), b"extra").unwrap();
        fs::create_dir_all(data.path().join("junk").join("deep")).unwrap();
        fs::write(data.path().join("junk").join("deep").join("d.txt"), b"d").unwrap();

        let live = scan(data.path());
        let report = store
            .restore_snapshot(&snapshot, &live, data.path(), true)
            .unwrap();
        assert_eq!(report.files_unchanged, 1);
        assert_eq!(report.files_deleted, 2);
        assert_eq!(report.folders_removed, 2);
        assert!(!data.path().join("extra.txt").exists());
        assert!(!data.path().join("junk").exists());
        assert!(data.path().join("keep.txt").is_file());
    }

    #[test]
    fn test_restore_keeps_nonempty_foreign_folder() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("keep.txt"), b"keep").unwrap();

        let (store, snapshot) = store_with_backup(repo.path(), data.path());

        // A foreign folder whose content the live scan cannot see (filters
        // would behave the same way): folder removal only applies when the
        // directory is empty by then.
        fs::create_dir(data.path().join("busy")).unwrap();
        fs::write(data.path().join("busy").join("seen.txt"), b"s").unwrap();

        let mut live = scan(data.path());
        // Drop the file record so the prune pass never deletes it.
        live.files.retain(|f| f.name != "seen.txt");

        let report = store
            .restore_snapshot(&snapshot, &live, data.path(), true)
            .unwrap();
        assert_eq!(report.folders_removed, 0);
        assert!(data.path().join("busy").join("seen.txt").is_file());
    }

    #[test]
    fn test_restore_idempotent() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("a.txt"), b"alpha").unwrap();
        fs::create_dir(data.path().join("d")).unwrap();
        fs::write(data.path().join("d").join("b.txt"), b"beta").unwrap();

        let (store, snapshot) = store_with_backup(repo.path(), data.path());

        let out = tempfile::tempdir().unwrap();
        let live = scan(out.path());
        store
            .restore_snapshot(&snapshot, &live, out.path(), true)
            .unwrap();

        // Second restore onto the result: nothing to copy, nothing to prune.
        let live = scan(out.path());
        let report = store
            .restore_snapshot(&snapshot, &live, out.path(), true)
            .unwrap();
        assert_eq!(report.files_restored, 0);
        assert_eq!(report.files_unchanged, 2);
        assert_eq!(report.files_deleted, 0);
        assert_eq!(report.folders_removed, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_restore_overwrites_readonly_destination() {
        use std::os::unix::fs::PermissionsExt;

        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("doc.txt"), b"recorded").unwrap();

        let (store, snapshot) = store_with_backup(repo.path(), data.path());

        let out = tempfile::tempdir().unwrap();
        fs::write(out.path().join("doc.txt"), b"stale").unwrap();
        fs::set_permissions(
            out.path().join("doc.txt"),
            fs::Permissions::from_mode(0o400),
        )
        .unwrap();

        let live = scan(out.path());
        let report = store
            .restore_snapshot(&snapshot, &live, out.path(), true)
            .unwrap();
        assert_eq!(report.files_restored, 1);
        assert_eq!(fs::read(out.path().join("doc.txt")).unwrap(), b"recorded");
    }

    #[test]
    fn test_restore_missing_blob_is_reported() {
        let repo = tempfile::tempdir().unwrap();
        let data = tempfile::tempdir().unwrap();
        fs::write(data.path().join("a.txt"), b"gone").unwrap();

        let (store, snapshot) = store_with_backup(repo.path(), data.path());
        fs::remove_file(store.blob_path(&hash_bytes(b"gone"), 4)).unwrap();

        // Re-open so the presence index forgets the blob as well.
        let store = Store::open(repo.path(), false).unwrap();
        store.scan().unwrap();

        let out = tempfile::tempdir().unwrap();
        let live = scan(out.path());
        let report = store
            .restore_snapshot(&snapshot, &live, out.path(), false)
            .unwrap();
        assert_eq!(report.files_restored, 0);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("blob not in store"));

        assert!(store
            .restore_snapshot(&snapshot, &live, out.path(), true)
            .is_err());
    }
}
