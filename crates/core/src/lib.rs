//! snapback-core - deduplicating snapshot backup engine
//!
//! A repository is a directory holding a content-addressed blob store
//! (`FILE/`) and named archives of immutable snapshots (`SNAPSHOT/`). Each
//! snapshot records the logical tree of a data folder; file bodies are
//! stored once per distinct content across all snapshots and archives.
//!
//! This crate provides the engine layers:
//! - the tagged-section stream codec for `.dbs` snapshot files
//! - the path/filter engine for include/exclude/select scanning
//! - the filesystem adapter (walk, hash, copy, times, attributes)
//! - the snapshot model and its (de)serialisation
//! - the content-addressed store with backup/restore/compare/check
//! - archive/history indexing and the repository composition root

pub mod archive;
pub mod codec;
pub mod filter;
pub mod fsutil;
pub mod hash;
pub mod repo;
pub mod snapshot;
pub mod store;
pub mod time;

// Re-export the main types for convenience
pub use archive::{Archive, History, DEFAULT_ARCHIVE};
pub use filter::{FilterConfig, FilterEngine};
pub use hash::Sha256Hash;
pub use repo::{ArchiveListing, Repository, RunOptions, SnapshotSummary};
pub use snapshot::{compare_snapshots, DiffEntry, DiffKind, FileEntry, Folder, Snapshot};
pub use store::{BackupReport, CheckReport, RestoreReport, Store};

/// Common result type used throughout snapback-core
pub type Result<T> = anyhow::Result<T>;
