//! Synchronization metadata store.
//!
//! The store is the single owner of persisted sync records. It caches them
//! behind one reentrant lock and batches persistence: writes made inside an
//! [`Operation`] are committed, and broadcast on the change feed, when the
//! outermost operation ends.
//!
//! ## Nesting
//!
//! ```rust
//! use cvsync_core::{MemoryWorkspace, ResourcePath, StoreConfig, SyncMetadataStore};
//! use cvsync_codec::ResourceSyncInfo;
//! use cvsync_storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let store = SyncMetadataStore::new(
//!     MemoryStorage::new(),
//!     Arc::new(MemoryWorkspace::new()),
//!     StoreConfig::default(),
//! );
//!
//! let outer = store.begin_operation();
//! for name in ["a.c", "b.c"] {
//!     let path = ResourcePath::new(name).unwrap();
//!     store.set_resource_sync(&path, ResourceSyncInfo::new(name, "1.1", None)).unwrap();
//! }
//! assert_eq!(store.storage().write_count(), 0);
//! outer.end().unwrap();
//! assert_eq!(store.storage().write_count(), 1);
//! ```

mod cache;
mod ignore;
mod lifecycle;

pub use ignore::wildcard_match;

use crate::cancel::CancellationToken;
use crate::change_feed::{ChangeBatch, ChangeFeed};
use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::resource::{Resource, ResourcePath};
use crate::workspace::{ResourceKind, Workspace};
use cache::CacheState;
use cvsync_codec::{FolderSyncInfo, ResourceSyncInfo};
use cvsync_storage::{Slot, SyncStorage};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{error, warn};

/// Cached, batched access to sync metadata.
///
/// Construct one per project; there is no global instance.
pub struct SyncMetadataStore<S: SyncStorage> {
    storage: S,
    workspace: Arc<dyn Workspace>,
    state: ReentrantMutex<RefCell<CacheState>>,
    feed: ChangeFeed,
    config: StoreConfig,
}

/// A scoped store operation.
///
/// Holds the store lock. Operations nest on one thread; only the outermost
/// [`end`](Self::end) commits. Dropping without `end` commits too and logs
/// any failure.
#[must_use = "an operation commits when it ends"]
pub struct Operation<'a, S: SyncStorage> {
    store: &'a SyncMetadataStore<S>,
    guard: Option<ReentrantMutexGuard<'a, RefCell<CacheState>>>,
}

impl<S: SyncStorage> Operation<'_, S> {
    /// Ends the operation, committing if it is the outermost one.
    ///
    /// # Errors
    ///
    /// Returns the merged persistence failures of the commit.
    pub fn end(mut self) -> CoreResult<()> {
        self.finish()
    }

    fn finish(&mut self) -> CoreResult<()> {
        let Some(guard) = self.guard.take() else {
            return Ok(());
        };
        let mut st = guard.borrow_mut();
        st.depth = st.depth.saturating_sub(1);
        if st.depth > 0 {
            return Ok(());
        }
        self.store.commit(&mut st)
    }
}

impl<S: SyncStorage> Drop for Operation<'_, S> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            error!(error = %e, "failed to commit sync metadata");
        }
    }
}

impl<S: SyncStorage> SyncMetadataStore<S> {
    /// Creates a store over a persistence provider and a workspace.
    pub fn new(storage: S, workspace: Arc<dyn Workspace>, config: StoreConfig) -> Self {
        Self {
            storage,
            workspace,
            state: ReentrantMutex::new(RefCell::new(CacheState::default())),
            feed: ChangeFeed::with_max_history(config.feed_history),
            config,
        }
    }

    /// The persistence provider.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// The workspace the store describes.
    pub fn workspace(&self) -> &dyn Workspace {
        self.workspace.as_ref()
    }

    /// The store configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The change feed.
    pub fn change_feed(&self) -> &ChangeFeed {
        &self.feed
    }

    /// Subscribes to committed change batches.
    pub fn subscribe(&self) -> Receiver<ChangeBatch> {
        self.feed.subscribe()
    }

    /// Begins an operation. Blocks while another thread holds one.
    pub fn begin_operation(&self) -> Operation<'_, S> {
        let guard = self.state.lock();
        guard.borrow_mut().depth += 1;
        Operation {
            store: self,
            guard: Some(guard),
        }
    }

    /// Current nesting depth on the calling thread's operation, 0 if none.
    pub fn operation_depth(&self) -> usize {
        self.state.lock().borrow().depth
    }

    /// Runs `f` inside its own (possibly nested) operation.
    fn run<T>(&self, f: impl FnOnce(&mut CacheState) -> CoreResult<T>) -> CoreResult<T> {
        let op = self.begin_operation();
        let result = {
            let guard = self.state.lock();
            let mut st = guard.borrow_mut();
            f(&mut st)
        };
        let ended = op.end();
        match (result, ended) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(commit)) => {
                warn!(error = %commit, "commit failed after operation error");
                Err(e)
            }
        }
    }

    fn require_folder(&self, folder: &ResourcePath) -> CoreResult<()> {
        if self.workspace.kind(folder) == Some(ResourceKind::Folder) {
            Ok(())
        } else {
            Err(CoreError::resource_not_found(folder.as_str()))
        }
    }

    /// The folder's repository binding.
    ///
    /// For a folder that no longer exists, the phantom binding is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or decoded.
    pub fn folder_sync(&self, folder: &ResourcePath) -> CoreResult<Option<FolderSyncInfo>> {
        self.run(|st| {
            let slot = self.slot_of(folder);
            self.load_binding(st, slot, folder)
        })
    }

    /// Returns true if the folder has a repository binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or decoded.
    pub fn is_cvs_folder(&self, folder: &ResourcePath) -> CoreResult<bool> {
        Ok(self.folder_sync(folder)?.is_some())
    }

    /// Binds an existing folder to the repository.
    ///
    /// A directory entry for the folder is added to its parent if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder does not exist.
    pub fn set_folder_sync(&self, folder: &ResourcePath, info: FolderSyncInfo) -> CoreResult<()> {
        self.require_folder(folder)?;
        self.run(|st| {
            Self::store_binding(st, Slot::Live, folder, Some(info));
            if let Some(parent) = folder.parent() {
                let window = self.window(st, Slot::Live, &parent)?;
                if !window.entries.contains_key(folder.name()) {
                    window.entries.insert(
                        folder.name().to_string(),
                        ResourceSyncInfo::directory(folder.name()),
                    );
                    window.dirty = true;
                }
            }
            st.changed.insert(folder.clone());
            Ok(())
        })
    }

    /// Removes a folder's binding and the sync records of all its children.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder does not exist.
    pub fn delete_folder_sync(&self, folder: &ResourcePath) -> CoreResult<()> {
        self.require_folder(folder)?;
        self.run(|st| {
            Self::store_binding(st, Slot::Live, folder, None);
            let window = self.window(st, Slot::Live, folder)?;
            let children: Vec<String> = window.entries.keys().cloned().collect();
            if !children.is_empty() {
                window.entries.clear();
                window.dirty = true;
            }
            for name in children {
                st.changed.insert(folder.join(&name));
            }
            st.changed.insert(folder.clone());
            Ok(())
        })
    }

    /// The sync record of a resource, `None` if unmanaged.
    ///
    /// The project root never has one.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent's entries cannot be read or decoded.
    pub fn resource_sync(&self, resource: &ResourcePath) -> CoreResult<Option<ResourceSyncInfo>> {
        let Some(parent) = resource.parent() else {
            return Ok(None);
        };
        self.run(|st| {
            let slot = self.slot_of(&parent);
            let window = self.window(st, slot, &parent)?;
            Ok(window.entries.get(resource.name()).cloned())
        })
    }

    /// Replaces the sync record of a resource.
    ///
    /// The record is kept in the form it reads back from the Entries file
    /// (see [`cvsync_codec::canonical_record`]), so a later read returns
    /// the same value whether or not the folder was written out meanwhile.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is the root, the record's name does
    /// not match, the parent folder does not exist, or the record cannot
    /// be encoded.
    pub fn set_resource_sync(
        &self,
        resource: &ResourcePath,
        info: ResourceSyncInfo,
    ) -> CoreResult<()> {
        let Some(parent) = resource.parent() else {
            return Err(CoreError::invalid_operation(
                "the project root has no resource sync",
            ));
        };
        if info.name != resource.name() {
            return Err(CoreError::invalid_operation(format!(
                "record name {:?} does not match {}",
                info.name, resource
            )));
        }
        self.require_folder(&parent)?;
        // Keep the window identical to what a later decode produces
        let info = cvsync_codec::canonical_record(&info)?;

        self.run(|st| {
            let window = self.window(st, Slot::Live, &parent)?;
            window.entries.insert(info.name.clone(), info);
            window.dirty = true;
            st.changed.insert(resource.clone());
            Ok(())
        })
    }

    /// Removes the sync record of a resource, making it unmanaged.
    ///
    /// Works for children of phantom folders too.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is the root or the parent's
    /// entries cannot be read.
    pub fn delete_resource_sync(&self, resource: &ResourcePath) -> CoreResult<()> {
        let Some(parent) = resource.parent() else {
            return Err(CoreError::invalid_operation(
                "the project root has no resource sync",
            ));
        };
        self.run(|st| {
            let slot = self.slot_of(&parent);
            let window = self.window(st, slot, &parent)?;
            if window.entries.remove(resource.name()).is_some() {
                window.dirty = true;
                st.changed.insert(resource.clone());
            }
            Ok(())
        })
    }

    /// Children of a folder: existing resources plus phantoms.
    ///
    /// Phantoms are children that no longer exist but still have sync
    /// records. Control folders are never members.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be listed.
    pub fn members(&self, folder: &ResourcePath) -> CoreResult<Vec<Resource>> {
        self.run(|st| self.collect_members(st, folder))
    }

    fn collect_members(&self, st: &mut CacheState, folder: &ResourcePath) -> CoreResult<Vec<Resource>> {
        let mut members: BTreeMap<String, Resource> = BTreeMap::new();
        let slot = self.slot_of(folder);

        if slot == Slot::Live {
            for name in self.workspace.children(folder)? {
                if name == self.config.control_folder {
                    continue;
                }
                let path = folder.join(&name);
                if let Some(resource) = self.workspace.resource(&path) {
                    members.insert(name, resource);
                }
            }
        }

        let window = self.window(st, slot, folder)?;
        for (name, info) in &window.entries {
            if members.contains_key(name) || *name == self.config.control_folder {
                continue;
            }
            let path = folder.join(name);
            let resource = if info.is_directory() {
                Resource::Folder(path)
            } else {
                Resource::File(path)
            };
            members.insert(name.clone(), resource);
        }

        for phantom in self.phantom_folders(st)? {
            if phantom.parent().as_ref() != Some(folder) {
                continue;
            }
            let name = phantom.name().to_string();
            if !members.contains_key(&name) && !self.workspace.exists(&phantom) {
                members.insert(name, Resource::Folder(phantom));
            }
        }

        Ok(members.into_values().collect())
    }

    /// Persists pending changes under `root`.
    ///
    /// Only `root` itself is flushed unless `deep` is set. With
    /// `purge_cache`, the flushed folders are evicted from the cache.
    /// Every folder is attempted even when some fail.
    ///
    /// # Errors
    ///
    /// Returns the merged failures, or `Cancelled` if `cancel` fired.
    pub fn flush(
        &self,
        root: &ResourcePath,
        purge_cache: bool,
        deep: bool,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        cancel.check()?;
        self.run(|st| {
            Self::flush_window(st)?;
            let errors = self.persist(
                st,
                |(_, folder)| folder == root || (deep && folder.starts_with(root)),
                purge_cache,
                Some(cancel),
            );
            CoreError::merge(errors)
        })
    }
}
