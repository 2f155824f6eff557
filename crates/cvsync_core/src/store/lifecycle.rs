//! Resource lifecycle hooks: deletion and re-creation.
//!
//! Deleting a managed folder moves its records, and those of every folder
//! below it, into the phantom slot. Re-creating it with the same mapping
//! moves them back.

use super::cache::CacheState;
use super::SyncMetadataStore;
use crate::error::{CoreError, CoreResult};
use crate::resource::{Resource, ResourcePath};
use crate::workspace::ResourceKind;
use cvsync_codec::{FolderSyncInfo, ResourceSyncInfo};
use cvsync_storage::{Slot, SyncStorage};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Everything recorded for one folder in one slot.
struct FolderRecords {
    binding: Option<FolderSyncInfo>,
    ignores: Option<Vec<String>>,
    entries: BTreeMap<String, ResourceSyncInfo>,
}

impl FolderRecords {
    fn is_empty(&self) -> bool {
        self.binding.is_none() && self.ignores.is_none() && self.entries.is_empty()
    }
}

impl<S: SyncStorage> SyncMetadataStore<S> {
    /// Prepares sync records for the deletion of `resource`.
    ///
    /// Call before the resource is removed from the workspace. A managed
    /// file becomes an outgoing deletion; an added file is forgotten. A
    /// folder's records move to the phantom slot with the same treatment
    /// applied to the files inside.
    ///
    /// # Errors
    ///
    /// Returns an error for the project root or if records cannot be read.
    pub fn prepare_for_deletion(&self, resource: &Resource) -> CoreResult<()> {
        match resource {
            Resource::File(path) => self.prepare_file_deletion(path),
            Resource::Folder(path) if path.is_root() => Err(CoreError::invalid_operation(
                "the project root cannot be deleted",
            )),
            Resource::Folder(path) => {
                let folders = self.live_subtree(path)?;
                self.run(|st| {
                    let mut moved = 0usize;
                    for folder in &folders {
                        if self.move_to_phantom(st, folder)? {
                            moved += 1;
                        }
                    }
                    if moved > 0 {
                        info!(folder = %path, folders = moved, "moved sync records to phantom storage");
                    }
                    Ok(())
                })
            }
        }
    }

    /// Updates sync records after `resource` appeared in the workspace.
    ///
    /// A file recorded as deleted is managed again. A folder gets its
    /// phantom records back when its binding is absent or has the same
    /// mapping; otherwise the phantom subtree is discarded.
    ///
    /// # Errors
    ///
    /// Returns an error if records cannot be read.
    pub fn resource_created(&self, resource: &Resource) -> CoreResult<()> {
        match resource {
            Resource::File(path) => {
                let Some(info) = self.resource_sync(path)? else {
                    return Ok(());
                };
                if info.is_deleted() {
                    debug!(file = %path, "deleted file recreated");
                    self.set_resource_sync(path, info.convert_from_deletion())?;
                }
                Ok(())
            }
            Resource::Folder(path) if path.is_root() => Ok(()),
            Resource::Folder(path) => self.run(|st| self.restore_phantom(st, path)),
        }
    }

    fn prepare_file_deletion(&self, path: &ResourcePath) -> CoreResult<()> {
        let Some(info) = self.resource_sync(path)? else {
            return Ok(());
        };
        if info.is_added() {
            self.delete_resource_sync(path)
        } else if info.is_deleted() || info.is_directory() {
            Ok(())
        } else {
            self.set_resource_sync(path, info.convert_to_deletion())
        }
    }

    /// `folder` and every folder below it that exists now, parents first.
    fn live_subtree(&self, folder: &ResourcePath) -> CoreResult<Vec<ResourcePath>> {
        let mut out = Vec::new();
        let mut pending = vec![folder.clone()];
        while let Some(next) = pending.pop() {
            if self.workspace.kind(&next) != Some(ResourceKind::Folder) {
                continue;
            }
            for name in self.workspace.children(&next)?.into_iter().rev() {
                if name == self.config.control_folder {
                    continue;
                }
                pending.push(next.join(&name));
            }
            out.push(next);
        }
        Ok(out)
    }

    fn take_records(
        &self,
        st: &mut CacheState,
        slot: Slot,
        folder: &ResourcePath,
    ) -> CoreResult<FolderRecords> {
        let binding = self.load_binding(st, slot, folder)?;
        let ignores = self.load_ignores(st, slot, folder)?;
        let window = self.window(st, slot, folder)?;
        let entries = std::mem::take(&mut window.entries);
        let records = FolderRecords {
            binding,
            ignores,
            entries,
        };
        if !records.is_empty() {
            window.dirty = true;
            if records.binding.is_some() {
                Self::store_binding(st, slot, folder, None);
            }
            if records.ignores.is_some() {
                Self::store_ignores(st, slot, folder, None);
            }
            Self::flush_window(st)?;
        }
        Ok(records)
    }

    fn put_records(
        &self,
        st: &mut CacheState,
        slot: Slot,
        folder: &ResourcePath,
        records: FolderRecords,
    ) -> CoreResult<()> {
        if records.binding.is_some() {
            Self::store_binding(st, slot, folder, records.binding);
        }
        if records.ignores.is_some() {
            Self::store_ignores(st, slot, folder, records.ignores);
        }
        if !records.entries.is_empty() {
            let window = self.window(st, slot, folder)?;
            window.entries = records.entries;
            window.dirty = true;
        }
        Ok(())
    }

    fn move_to_phantom(&self, st: &mut CacheState, folder: &ResourcePath) -> CoreResult<bool> {
        let mut records = self.take_records(st, Slot::Live, folder)?;
        if records.is_empty() {
            return Ok(false);
        }

        records.entries.retain(|_, info| !info.is_added());
        for (name, info) in records.entries.iter_mut() {
            if !info.is_directory() && !info.is_deleted() {
                *info = info.convert_to_deletion();
            }
            st.changed.insert(folder.join(name));
        }
        st.changed.insert(folder.clone());

        debug!(folder = %folder, entries = records.entries.len(), "folder moved to phantom");
        self.put_records(st, Slot::Phantom, folder, records)?;
        Ok(true)
    }

    fn restore_phantom(&self, st: &mut CacheState, folder: &ResourcePath) -> CoreResult<()> {
        let phantom_binding = self.load_binding(st, Slot::Phantom, folder)?;
        let phantom_entries = !self.window(st, Slot::Phantom, folder)?.entries.is_empty();
        if phantom_binding.is_none() && !phantom_entries {
            return Ok(());
        }

        let live = self.load_binding(st, Slot::Live, folder)?;
        let same_mapping = match (&live, &phantom_binding) {
            (None, _) => true,
            (Some(live), Some(phantom)) => live.is_same_mapping(phantom),
            (Some(_), None) => false,
        };

        if !same_mapping {
            let doomed: Vec<ResourcePath> = self
                .phantom_folders(st)?
                .into_iter()
                .filter(|f| f.starts_with(folder))
                .collect();
            for phantom in &doomed {
                self.take_records(st, Slot::Phantom, phantom)?;
            }
            info!(folder = %folder, folders = doomed.len(), "discarded phantom records with a different mapping");
            return Ok(());
        }

        let mut records = self.take_records(st, Slot::Phantom, folder)?;
        if live.is_some() {
            records.binding = None;
        }
        let existing = !self.window(st, Slot::Live, folder)?.entries.is_empty();
        if existing {
            records.entries.clear();
        }
        for name in records.entries.keys() {
            st.changed.insert(folder.join(name));
        }
        st.changed.insert(folder.clone());
        info!(folder = %folder, "restored phantom sync records");
        self.put_records(st, Slot::Live, folder, records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::workspace::MemoryWorkspace;
    use cvsync_storage::MemoryStorage;
    use std::sync::Arc;

    fn p(path: &str) -> ResourcePath {
        ResourcePath::new(path).unwrap()
    }

    fn setup() -> (Arc<MemoryWorkspace>, SyncMetadataStore<Arc<MemoryStorage>>) {
        let ws = Arc::new(MemoryWorkspace::new());
        let store = SyncMetadataStore::new(
            Arc::new(MemoryStorage::new()),
            ws.clone(),
            StoreConfig::default(),
        );
        (ws, store)
    }

    fn managed_folder(ws: &MemoryWorkspace, store: &SyncMetadataStore<Arc<MemoryStorage>>) {
        ws.create_file(&p("src/a.c"), b"");
        ws.create_file(&p("src/new.c"), b"");
        ws.create_file(&p("src/lib/b.c"), b"");
        store
            .set_folder_sync(&p("src"), FolderSyncInfo::new(":local:/cvs", "proj/src"))
            .unwrap();
        store
            .set_folder_sync(&p("src/lib"), FolderSyncInfo::new(":local:/cvs", "proj/src/lib"))
            .unwrap();
        store
            .set_resource_sync(&p("src/a.c"), ResourceSyncInfo::new("a.c", "1.1", None))
            .unwrap();
        store
            .set_resource_sync(&p("src/new.c"), ResourceSyncInfo::added("new.c"))
            .unwrap();
        store
            .set_resource_sync(&p("src/lib/b.c"), ResourceSyncInfo::new("b.c", "1.4", None))
            .unwrap();
    }

    #[test]
    fn file_deletion_converts_or_forgets() {
        let (ws, store) = setup();
        managed_folder(&ws, &store);

        store.prepare_for_deletion(&Resource::File(p("src/a.c"))).unwrap();
        store.prepare_for_deletion(&Resource::File(p("src/new.c"))).unwrap();

        assert!(store.resource_sync(&p("src/a.c")).unwrap().unwrap().is_deleted());
        assert_eq!(store.resource_sync(&p("src/new.c")).unwrap(), None);
    }

    #[test]
    fn recreated_file_is_managed_again() {
        let (ws, store) = setup();
        managed_folder(&ws, &store);
        store.prepare_for_deletion(&Resource::File(p("src/a.c"))).unwrap();
        ws.remove(&p("src/a.c"));

        ws.create_file(&p("src/a.c"), b"");
        store.resource_created(&Resource::File(p("src/a.c"))).unwrap();

        let info = store.resource_sync(&p("src/a.c")).unwrap().unwrap();
        assert!(!info.is_deleted());
        assert_eq!(info.revision, "1.1");
    }

    #[test]
    fn folder_deletion_moves_subtree_to_phantom() {
        let (ws, store) = setup();
        managed_folder(&ws, &store);

        store.prepare_for_deletion(&Resource::Folder(p("src"))).unwrap();
        ws.remove(&p("src"));

        assert_eq!(
            store.folder_sync(&p("src")).unwrap().unwrap().repository,
            "proj/src"
        );
        assert!(store.resource_sync(&p("src/a.c")).unwrap().unwrap().is_deleted());
        assert_eq!(store.resource_sync(&p("src/new.c")).unwrap(), None);
        assert!(store.resource_sync(&p("src/lib/b.c")).unwrap().unwrap().is_deleted());
        assert!(store.storage().folders(Slot::Phantom).unwrap().contains(&"src/lib".to_string()));

        // The phantom folder is still a member of the root
        let members = store.members(&ResourcePath::root()).unwrap();
        assert_eq!(members, vec![Resource::Folder(p("src"))]);
        // And its phantom subfolder a member of it
        let members = store.members(&p("src")).unwrap();
        assert!(members.contains(&Resource::Folder(p("src/lib"))));
        assert!(members.contains(&Resource::File(p("src/a.c"))));
    }

    #[test]
    fn recreated_folder_with_same_mapping_restores() {
        let (ws, store) = setup();
        managed_folder(&ws, &store);
        store.prepare_for_deletion(&Resource::Folder(p("src"))).unwrap();
        ws.remove(&p("src"));

        ws.create_folder(&p("src"));
        store.resource_created(&Resource::Folder(p("src"))).unwrap();

        assert_eq!(
            store.folder_sync(&p("src")).unwrap().unwrap().repository,
            "proj/src"
        );
        assert!(store.resource_sync(&p("src/a.c")).unwrap().unwrap().is_deleted());
        assert!(!store
            .storage()
            .folders(Slot::Phantom)
            .unwrap()
            .contains(&"src".to_string()));
    }

    #[test]
    fn recreated_folder_with_other_mapping_discards() {
        let (ws, store) = setup();
        managed_folder(&ws, &store);
        store.prepare_for_deletion(&Resource::Folder(p("src"))).unwrap();
        ws.remove(&p("src"));

        ws.create_folder(&p("src"));
        store
            .set_folder_sync(&p("src"), FolderSyncInfo::new(":local:/cvs", "other/src"))
            .unwrap();
        store.resource_created(&Resource::Folder(p("src"))).unwrap();

        assert_eq!(
            store.folder_sync(&p("src")).unwrap().unwrap().repository,
            "other/src"
        );
        assert_eq!(store.resource_sync(&p("src/a.c")).unwrap(), None);
        assert!(store.storage().folders(Slot::Phantom).unwrap().is_empty());
    }

    #[test]
    fn root_cannot_be_deleted() {
        let (_ws, store) = setup();
        let err = store
            .prepare_for_deletion(&Resource::Folder(ResourcePath::root()))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidOperation { .. }));
    }
}
