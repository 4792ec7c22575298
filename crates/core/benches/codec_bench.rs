//! Performance benchmarks for the snapshot codec
//!
//! Run with: cargo bench --package snapback-core

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use snapback_core::filter::FilterConfig;
use snapback_core::hash::hash_bytes;
use snapback_core::snapshot::{FileEntry, Folder, Snapshot, SNAPSHOT_VERSION};

fn synthetic_snapshot(files_per_folder: usize, folder_count: usize) -> Snapshot {
    let mut folders = vec![Folder {
        parent: None,
        name: "data".to_string(),
        access_time: 1,
        modification_time: 2,
        attributes: 0o755,
        path: String::new(),
    }];
    for index in 1..folder_count {
        folders.push(Folder {
            parent: Some(0),
            name: format!("dir{:04}", index),
            access_time: 1,
            modification_time: 2,
            attributes: 0o755,
            path: format!("dir{:04}/", index),
        });
    }

    let mut files = Vec::new();
    for (folder_index, _) in folders.iter().enumerate() {
        for file in 0..files_per_folder {
            files.push(FileEntry {
                folder_index: folder_index as u32,
                name: format!("file{:04}.dat", file),
                hash: hash_bytes(format!("{}:{}", folder_index, file).as_bytes()),
                byte_count: (file as u64 + 1) * 1337,
                access_time: 638_000_000_000_000_000,
                modification_time: 638_000_000_000_000_001,
                attributes: 0o644,
            });
        }
    }

    Snapshot {
        version: SNAPSHOT_VERSION,
        time: 638_000_000_000_000_000,
        data_folder_path: "/home/user/data".to_string(),
        filters: FilterConfig::default(),
        folders,
        files,
    }
}

fn bench_snapshot_serialize(c: &mut Criterion) {
    let snapshot = synthetic_snapshot(10, 100);

    c.bench_function("snapshot_serialize_1k_files", |b| {
        b.iter(|| {
            let bytes = snapshot.serialize();
            black_box(bytes);
        });
    });

    let serialized = snapshot.serialize();
    c.bench_function("snapshot_deserialize_1k_files", |b| {
        b.iter(|| {
            let decoded = Snapshot::deserialize(&serialized).unwrap();
            black_box(decoded);
        });
    });
}

fn bench_snapshot_index(c: &mut Criterion) {
    let snapshot = synthetic_snapshot(10, 100);

    c.bench_function("snapshot_build_index_1k_files", |b| {
        b.iter(|| {
            let index = snapshot.build_index();
            black_box(index.file_index("dir0042/", "file0007.dat"));
        });
    });
}

criterion_group!(benches, bench_snapshot_serialize, bench_snapshot_index);
criterion_main!(benches);
