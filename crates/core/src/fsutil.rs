//! Filesystem adapter
//!
//! Thin wrappers over `std::fs` that attach the failing path to every error
//! and normalise platform differences (attribute masks, time stamps).
//! Symbolic links are reported but never followed.

use crate::time;
use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;

/// One entry of a shallow directory listing.
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub name: String,
    pub is_file: bool,
    pub is_dir: bool,
    pub is_symlink: bool,
    pub size: u64,
    /// Access time in ticks.
    pub access_time: u64,
    /// Modification time in ticks.
    pub modification_time: u64,
    /// Platform attribute mask: Unix permission mode, Windows file
    /// attribute flags.
    pub attributes: u32,
}

/// List the immediate children of `dir` in filesystem enumeration order.
/// Metadata comes from `symlink_metadata`, so links are never followed.
pub fn walk_shallow(dir: &Path) -> Result<Vec<DirEntryInfo>> {
    let mut entries = Vec::new();
    let read_dir =
        fs::read_dir(dir).with_context(|| format!("read directory: {}", dir.display()))?;
    for entry in read_dir {
        let entry = entry.with_context(|| format!("read directory: {}", dir.display()))?;
        let path = entry.path();
        let metadata = fs::symlink_metadata(&path)
            .with_context(|| format!("stat: {}", path.display()))?;
        let file_type = metadata.file_type();
        entries.push(DirEntryInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_file: file_type.is_file(),
            is_dir: file_type.is_dir(),
            is_symlink: file_type.is_symlink(),
            size: metadata.len(),
            access_time: access_ticks(&metadata),
            modification_time: modification_ticks(&metadata)?,
            attributes: attributes_of(&metadata),
        });
    }
    Ok(entries)
}

fn modification_ticks(metadata: &fs::Metadata) -> Result<u64> {
    let mtime = metadata.modified().context("modification time")?;
    Ok(time::system_time_to_ticks(mtime))
}

fn access_ticks(metadata: &fs::Metadata) -> u64 {
    // Some filesystems don't track atime; fall back to mtime.
    metadata
        .accessed()
        .or_else(|_| metadata.modified())
        .map(time::system_time_to_ticks)
        .unwrap_or(0)
}

#[cfg(unix)]
fn attributes_of(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(windows)]
fn attributes_of(metadata: &fs::Metadata) -> u32 {
    use std::os::windows::fs::MetadataExt;
    metadata.file_attributes()
}

/// Stat a single file and fill the metadata fields of a [`DirEntryInfo`].
pub fn stat(path: &Path) -> Result<DirEntryInfo> {
    let metadata =
        fs::symlink_metadata(path).with_context(|| format!("stat: {}", path.display()))?;
    let file_type = metadata.file_type();
    Ok(DirEntryInfo {
        name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        is_file: file_type.is_file(),
        is_dir: file_type.is_dir(),
        is_symlink: file_type.is_symlink(),
        size: metadata.len(),
        access_time: access_ticks(&metadata),
        modification_time: modification_ticks(&metadata)?,
        attributes: attributes_of(&metadata),
    })
}

pub fn read_all(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("read: {}", path.display()))
}

pub fn write_all(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).with_context(|| format!("write: {}", path.display()))
}

/// Copy file contents without carrying attributes over. `fs::copy` would
/// propagate the source permission bits, so this streams through open
/// handles instead and lets the destination keep default permissions.
pub fn copy(src: &Path, dst: &Path) -> Result<u64> {
    let mut reader =
        fs::File::open(src).with_context(|| format!("open for copy: {}", src.display()))?;
    let mut writer =
        fs::File::create(dst).with_context(|| format!("create for copy: {}", dst.display()))?;
    io::copy(&mut reader, &mut writer)
        .with_context(|| format!("copy {} -> {}", src.display(), dst.display()))
}

pub fn mkdir_recursive(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory: {}", path.display()))
}

/// Remove an empty directory.
pub fn rmdir(path: &Path) -> Result<()> {
    fs::remove_dir(path).with_context(|| format!("remove directory: {}", path.display()))
}

pub fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).with_context(|| format!("remove file: {}", path.display()))
}

/// True when the directory exists and has no entries.
pub fn dir_is_empty(path: &Path) -> Result<bool> {
    let mut read_dir =
        fs::read_dir(path).with_context(|| format!("read directory: {}", path.display()))?;
    Ok(read_dir.next().is_none())
}

/// Set a file's access and modification times from tick values.
pub fn set_times(path: &Path, access_ticks: u64, modification_ticks: u64) -> Result<()> {
    let file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("open for time update: {}", path.display()))?;
    let times = fs::FileTimes::new()
        .set_accessed(time::ticks_to_system_time(access_ticks))
        .set_modified(time::ticks_to_system_time(modification_ticks));
    file.set_times(times)
        .with_context(|| format!("set times: {}", path.display()))
}

/// Apply a recorded attribute mask.
#[cfg(unix)]
pub fn set_attributes(path: &Path, mask: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mask))
        .with_context(|| format!("set permissions: {}", path.display()))
}

/// Apply a recorded attribute mask. Only the read-only bit (0x1) is
/// reproducible through std on Windows.
#[cfg(windows)]
pub fn set_attributes(path: &Path, mask: u32) -> Result<()> {
    let metadata =
        fs::metadata(path).with_context(|| format!("stat: {}", path.display()))?;
    let mut permissions = metadata.permissions();
    permissions.set_readonly(mask & 0x1 != 0);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("set attributes: {}", path.display()))
}

/// Lift whatever would block an overwrite: full permissions on Unix, the
/// read-only bit on Windows. Used before restoring over an existing file;
/// the recorded attributes are applied again afterwards.
#[cfg(unix)]
pub fn make_writable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777))
        .with_context(|| format!("make writable: {}", path.display()))
}

#[cfg(windows)]
pub fn make_writable(path: &Path) -> Result<()> {
    let metadata =
        fs::metadata(path).with_context(|| format!("stat: {}", path.display()))?;
    let mut permissions = metadata.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)
        .with_context(|| format!("make writable: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_shallow_lists_children() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("a.txt"), b"alpha")?;
        fs::create_dir(dir.path().join("sub"))?;

        let mut entries = walk_shallow(dir.path())?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.txt");
        assert!(entries[0].is_file);
        assert_eq!(entries[0].size, 5);
        assert!(entries[0].modification_time > 0);
        assert_eq!(entries[1].name, "sub");
        assert!(entries[1].is_dir);
        Ok(())
    }

    #[test]
    fn test_walk_shallow_is_shallow() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("sub"))?;
        fs::write(dir.path().join("sub").join("nested.txt"), b"deep")?;

        let entries = walk_shallow(dir.path())?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "sub");
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_shallow_flags_symlinks() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("real.txt"), b"real")?;
        std::os::unix::fs::symlink(dir.path().join("real.txt"), dir.path().join("link.txt"))?;

        let entries = walk_shallow(dir.path())?;
        let link = entries.iter().find(|e| e.name == "link.txt").unwrap();
        assert!(link.is_symlink);
        assert!(!link.is_file);
        Ok(())
    }

    #[test]
    fn test_walk_shallow_missing_dir_errors() {
        let err = walk_shallow(Path::new("/no/such/directory")).unwrap_err();
        assert!(err.to_string().contains("read directory"));
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_does_not_preserve_mode() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let src = dir.path().join("src.bin");
        let dst = dir.path().join("dst.bin");
        fs::write(&src, b"payload")?;
        fs::set_permissions(&src, fs::Permissions::from_mode(0o400))?;

        copy(&src, &dst)?;
        assert_eq!(fs::read(&dst)?, b"payload");
        let dst_mode = fs::metadata(&dst)?.permissions().mode() & 0o777;
        assert_ne!(dst_mode, 0o400);
        Ok(())
    }

    #[test]
    fn test_set_times_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("stamped.txt");
        fs::write(&path, b"x")?;

        // 2020-05-06T07:08:09Z plus some ticks of fraction.
        let mtime = time::UNIX_EPOCH_TICKS + 1_588_748_889 * time::TICKS_PER_SECOND + 1_234_500;
        let atime = mtime + 42 * time::TICKS_PER_SECOND;
        set_times(&path, atime, mtime)?;

        let info = stat(&path)?;
        assert_eq!(info.modification_time, mtime);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_set_attributes_applies_mode() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("exec.sh");
        fs::write(&path, b"#!/bin/sh\n")?;
        set_attributes(&path, 0o755)?;
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o755);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_make_writable_unlocks_readonly_file() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("locked.txt");
        fs::write(&path, b"before")?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o400))?;

        make_writable(&path)?;
        fs::write(&path, b"after")?;
        assert_eq!(fs::read(&path)?, b"after");
        Ok(())
    }

    #[test]
    fn test_dir_is_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert!(dir_is_empty(dir.path())?);
        fs::write(dir.path().join("f"), b"")?;
        assert!(!dir_is_empty(dir.path())?);
        Ok(())
    }
}
