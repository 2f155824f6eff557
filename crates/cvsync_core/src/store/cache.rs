//! Cache state behind the store lock.
//!
//! Folder records hold encoded bytes per folder and slot. The fast window
//! holds one folder's decoded children so repeated per-child access does
//! not re-decode the Entries record.

use super::SyncMetadataStore;
use crate::cancel::CancellationToken;
use crate::error::{CoreError, CoreResult};
use crate::resource::ResourcePath;
use crate::workspace::ResourceKind;
use cvsync_codec::{
    decode_entries, decode_folder_binding, decode_ignores, encode_entries, encode_folder_binding,
    encode_ignores, FolderSyncInfo, ResourceSyncInfo,
};
use cvsync_storage::{RecordKind, Slot, SyncStorage};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, warn};

pub(super) type FolderKey = (Slot, ResourcePath);

/// A lazily loaded value.
#[derive(Debug, Clone)]
pub(super) enum Cached<T> {
    /// Not read from storage yet.
    Unloaded,
    /// Known to be absent.
    Absent,
    /// Known value.
    Present(T),
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Cached::Unloaded
    }
}

impl<T> Cached<T> {
    fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Cached::Present(value),
            None => Cached::Absent,
        }
    }

    fn value(&self) -> Option<&T> {
        match self {
            Cached::Present(value) => Some(value),
            _ => None,
        }
    }

    fn is_unloaded(&self) -> bool {
        matches!(self, Cached::Unloaded)
    }
}

#[derive(Debug, Default)]
struct Dirty {
    binding: bool,
    entries: bool,
    ignores: bool,
}

/// The records of one folder in one slot.
#[derive(Debug, Default)]
pub(super) struct FolderRecord {
    binding: Cached<FolderSyncInfo>,
    entries: Cached<Vec<u8>>,
    ignores: Cached<Vec<String>>,
    dirty: Dirty,
}

impl FolderRecord {
    fn is_dirty(&self) -> bool {
        self.dirty.binding || self.dirty.entries || self.dirty.ignores
    }

    fn has_present(&self) -> bool {
        self.binding.value().is_some() || self.entries.value().is_some() || self.ignores.value().is_some()
    }

    fn is_fully_absent(&self) -> bool {
        matches!(self.binding, Cached::Absent)
            && matches!(self.entries, Cached::Absent)
            && matches!(self.ignores, Cached::Absent)
    }
}

/// The decoded children of the folder currently in the window.
#[derive(Debug)]
pub(super) struct FastWindow {
    pub slot: Slot,
    pub folder: ResourcePath,
    pub entries: BTreeMap<String, ResourceSyncInfo>,
    pub dirty: bool,
}

/// Everything guarded by the store lock.
#[derive(Debug, Default)]
pub(super) struct CacheState {
    /// Nesting depth of open operations.
    pub depth: usize,
    pub folders: HashMap<FolderKey, FolderRecord>,
    pub window: Option<FastWindow>,
    /// Resources touched since the outermost operation began.
    pub changed: BTreeSet<ResourcePath>,
}

impl<S: SyncStorage> SyncMetadataStore<S> {
    /// Slot holding the records of `folder`: live while it exists.
    pub(super) fn slot_of(&self, folder: &ResourcePath) -> Slot {
        if folder.is_root() || self.workspace.kind(folder) == Some(ResourceKind::Folder) {
            Slot::Live
        } else {
            Slot::Phantom
        }
    }

    pub(super) fn load_binding(
        &self,
        st: &mut CacheState,
        slot: Slot,
        folder: &ResourcePath,
    ) -> CoreResult<Option<FolderSyncInfo>> {
        let record = st.folders.entry((slot, folder.clone())).or_default();
        if record.binding.is_unloaded() {
            let bytes = self
                .storage
                .read(slot, folder.as_str(), RecordKind::FolderBinding)?;
            record.binding = match bytes {
                Some(bytes) => Cached::Present(decode_folder_binding(&bytes)?),
                None => Cached::Absent,
            };
        }
        Ok(record.binding.value().cloned())
    }

    pub(super) fn store_binding(
        st: &mut CacheState,
        slot: Slot,
        folder: &ResourcePath,
        info: Option<FolderSyncInfo>,
    ) {
        let record = st.folders.entry((slot, folder.clone())).or_default();
        record.binding = Cached::from_option(info);
        record.dirty.binding = true;
    }

    pub(super) fn load_ignores(
        &self,
        st: &mut CacheState,
        slot: Slot,
        folder: &ResourcePath,
    ) -> CoreResult<Option<Vec<String>>> {
        let record = st.folders.entry((slot, folder.clone())).or_default();
        if record.ignores.is_unloaded() {
            let bytes = self
                .storage
                .read(slot, folder.as_str(), RecordKind::IgnorePatterns)?;
            record.ignores = match bytes {
                Some(bytes) => Cached::Present(decode_ignores(&bytes)?),
                None => Cached::Absent,
            };
        }
        Ok(record.ignores.value().cloned())
    }

    pub(super) fn store_ignores(
        st: &mut CacheState,
        slot: Slot,
        folder: &ResourcePath,
        patterns: Option<Vec<String>>,
    ) {
        let record = st.folders.entry((slot, folder.clone())).or_default();
        record.ignores = Cached::from_option(patterns);
        record.dirty.ignores = true;
    }

    fn load_entries_bytes(
        &self,
        st: &mut CacheState,
        slot: Slot,
        folder: &ResourcePath,
    ) -> CoreResult<Option<Vec<u8>>> {
        let record = st.folders.entry((slot, folder.clone())).or_default();
        if record.entries.is_unloaded() {
            let bytes = self
                .storage
                .read(slot, folder.as_str(), RecordKind::ResourceEntries)?;
            record.entries = Cached::from_option(bytes);
        }
        Ok(record.entries.value().cloned())
    }

    /// Points the fast window at `folder`, flushing the previous one.
    pub(super) fn window<'s>(
        &self,
        st: &'s mut CacheState,
        slot: Slot,
        folder: &ResourcePath,
    ) -> CoreResult<&'s mut FastWindow> {
        let hit = st
            .window
            .as_ref()
            .is_some_and(|w| w.slot == slot && w.folder == *folder);
        if !hit {
            Self::flush_window(st)?;
            let entries = match self.load_entries_bytes(st, slot, folder)? {
                Some(bytes) => decode_entries(&bytes)?
                    .into_iter()
                    .map(|info| (info.name.clone(), info))
                    .collect(),
                None => BTreeMap::new(),
            };
            st.window = Some(FastWindow {
                slot,
                folder: folder.clone(),
                entries,
                dirty: false,
            });
        }
        st.window
            .as_mut()
            .ok_or_else(|| CoreError::metadata_missing(folder.as_str()))
    }

    /// Writes a dirty window back into its folder record.
    pub(super) fn flush_window(st: &mut CacheState) -> CoreResult<()> {
        let Some(window) = st.window.as_mut() else {
            return Ok(());
        };
        if !window.dirty {
            return Ok(());
        }
        let bytes = if window.entries.is_empty() {
            None
        } else {
            Some(encode_entries(window.entries.values())?)
        };
        window.dirty = false;

        let record = st
            .folders
            .entry((window.slot, window.folder.clone()))
            .or_default();
        record.entries = Cached::from_option(bytes);
        record.dirty.entries = true;
        Ok(())
    }

    /// Folders holding phantom records, as seen through the cache.
    pub(super) fn phantom_folders(&self, st: &CacheState) -> CoreResult<BTreeSet<ResourcePath>> {
        let mut folders: BTreeSet<ResourcePath> = self
            .storage
            .folders(Slot::Phantom)?
            .iter()
            .filter_map(|f| ResourcePath::new(f).ok())
            .collect();

        for ((slot, folder), record) in &st.folders {
            if *slot != Slot::Phantom {
                continue;
            }
            if record.has_present() {
                folders.insert(folder.clone());
            } else if record.is_fully_absent() {
                folders.remove(folder);
            }
        }
        if let Some(window) = &st.window {
            if window.slot == Slot::Phantom && !window.entries.is_empty() {
                folders.insert(window.folder.clone());
            }
        }
        Ok(folders)
    }

    /// Persists dirty records selected by `scope`.
    ///
    /// Every selected folder is attempted; failures are collected.
    pub(super) fn persist(
        &self,
        st: &mut CacheState,
        scope: impl Fn(&FolderKey) -> bool,
        purge: bool,
        cancel: Option<&CancellationToken>,
    ) -> Vec<CoreError> {
        let mut errors = Vec::new();
        let mut keys: Vec<FolderKey> = st
            .folders
            .iter()
            .filter(|(key, record)| scope(key) && (purge || record.is_dirty()))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();

        let mut written = 0usize;
        for key in &keys {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    errors.push(CoreError::Cancelled);
                    break;
                }
            }
            let Some(record) = st.folders.get_mut(key) else {
                continue;
            };
            written += self.persist_record(key, record, &mut errors);
        }

        if written > 0 {
            if let Err(source) = self.storage.flush() {
                errors.push(CoreError::Persistence {
                    path: String::new(),
                    operation: "flush",
                    source,
                });
            }
            debug!(records = written, "persisted sync metadata");
        }

        if purge {
            for key in &keys {
                if st.folders.get(key).is_some_and(|r| !r.is_dirty()) {
                    st.folders.remove(key);
                }
            }
            let evict = st
                .window
                .as_ref()
                .is_some_and(|w| !w.dirty && scope(&(w.slot, w.folder.clone())));
            if evict {
                st.window = None;
            }
        }
        errors
    }

    fn persist_record(
        &self,
        (slot, folder): &FolderKey,
        record: &mut FolderRecord,
        errors: &mut Vec<CoreError>,
    ) -> usize {
        let mut written = 0;
        if record.dirty.binding {
            let bytes = match record.binding.value().map(encode_folder_binding).transpose() {
                Ok(bytes) => bytes,
                Err(e) => {
                    errors.push(e.into());
                    return written;
                }
            };
            if self.apply(*slot, folder, RecordKind::FolderBinding, bytes, errors) {
                record.dirty.binding = false;
                written += 1;
            }
        }
        if record.dirty.entries {
            let bytes = record.entries.value().cloned();
            if self.apply(*slot, folder, RecordKind::ResourceEntries, bytes, errors) {
                record.dirty.entries = false;
                written += 1;
            }
        }
        if record.dirty.ignores {
            let bytes = record.ignores.value().map(|p| encode_ignores(p));
            if self.apply(*slot, folder, RecordKind::IgnorePatterns, bytes, errors) {
                record.dirty.ignores = false;
                written += 1;
            }
        }
        written
    }

    fn apply(
        &self,
        slot: Slot,
        folder: &ResourcePath,
        kind: RecordKind,
        bytes: Option<Vec<u8>>,
        errors: &mut Vec<CoreError>,
    ) -> bool {
        let (operation, result) = match &bytes {
            Some(bytes) => ("write", self.storage.write(slot, folder.as_str(), kind, bytes)),
            None => ("delete", self.storage.delete(slot, folder.as_str(), kind)),
        };
        match result {
            Ok(()) => true,
            Err(source) => {
                warn!(folder = %folder, ?slot, ?kind, error = %source, "failed to persist sync metadata");
                errors.push(CoreError::Persistence {
                    path: folder.to_string(),
                    operation,
                    source,
                });
                false
            }
        }
    }

    /// Commits at the end of the outermost operation.
    pub(super) fn commit(&self, st: &mut CacheState) -> CoreResult<()> {
        let mut errors = Vec::new();
        if let Err(e) = Self::flush_window(st) {
            errors.push(e);
        }
        errors.extend(self.persist(st, |_| true, false, None));

        let changed = std::mem::take(&mut st.changed);
        if !changed.is_empty() {
            let count = changed.len();
            let sequence = self.feed.emit(changed.into_iter().collect());
            debug!(sequence, resources = count, "broadcast sync changes");
        }
        CoreError::merge(errors)
    }
}
