//! Benchmark utilities.

#![warn(missing_docs)]

use cvsync_codec::{FolderSyncInfo, ResourceSyncInfo};
use cvsync_core::{MemoryWorkspace, ResourcePath, StoreConfig, SyncMetadataStore};
use cvsync_storage::MemoryStorage;
use std::sync::Arc;

/// An in-memory store over a fresh workspace.
pub type BenchStore = SyncMetadataStore<Arc<MemoryStorage>>;

/// Generate `count` clean file records named `f0.c`, `f1.c`, ...
pub fn generate_records(count: usize) -> Vec<ResourceSyncInfo> {
    (0..count)
        .map(|i| ResourceSyncInfo::new(format!("f{}.c", i), format!("1.{}", i % 40 + 1), None))
        .collect()
}

/// Folder path for index `i`.
pub fn folder(i: usize) -> ResourcePath {
    ResourcePath::new(format!("dir{}", i)).unwrap_or_default()
}

/// A store with `folders` bound folders holding `files` records each.
pub fn populated_store(folders: usize, files: usize) -> (Arc<MemoryWorkspace>, BenchStore) {
    let workspace = Arc::new(MemoryWorkspace::new());
    let store = SyncMetadataStore::new(
        Arc::new(MemoryStorage::new()),
        workspace.clone(),
        StoreConfig::default(),
    );
    let op = store.begin_operation();
    let _ = store.set_folder_sync(&ResourcePath::root(), FolderSyncInfo::new(":local:/cvs", "bench"));
    for f in 0..folders {
        let dir = folder(f);
        workspace.create_folder(&dir);
        let _ = store.set_folder_sync(&dir, FolderSyncInfo::new(":local:/cvs", format!("bench/{}", dir.as_str())));
        for record in generate_records(files) {
            let file = dir.join(&record.name);
            workspace.create_file(&file, b"");
            let _ = store.set_resource_sync(&file, record);
        }
    }
    let _ = op.end();
    (workspace, store)
}
