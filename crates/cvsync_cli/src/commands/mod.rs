//! CLI command implementations.

pub mod inspect;
pub mod status;
pub mod verify;

use cvsync_core::{FsWorkspace, StoreConfig, SyncMetadataStore};
use cvsync_storage::FileStorage;
use std::path::Path;
use std::sync::Arc;

/// Opens the metadata store of the working copy at `path`.
pub fn open_store(path: &Path) -> Result<SyncMetadataStore<FileStorage>, Box<dyn std::error::Error>> {
    let workspace = Arc::new(FsWorkspace::open(path)?);
    let storage = FileStorage::open(path)?;
    Ok(SyncMetadataStore::new(storage, workspace, StoreConfig::default()))
}
