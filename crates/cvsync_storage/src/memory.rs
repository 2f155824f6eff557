//! In-memory persistence provider for testing.

use crate::backend::{validate_folder, RecordKind, Slot, SyncStorage};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

type RecordKey = (Slot, String, RecordKind);

/// An in-memory persistence provider.
///
/// This provider keeps all records in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral workspaces that don't need persistence
///
/// It counts mutations so tests can observe when the metadata store commits,
/// and it can be told to reject writes under a folder to exercise failure
/// aggregation.
///
/// # Example
///
/// ```rust
/// use cvsync_storage::{MemoryStorage, RecordKind, Slot, SyncStorage};
///
/// let storage = MemoryStorage::new();
/// storage.write(Slot::Live, "", RecordKind::IgnorePatterns, b"*.o").unwrap();
/// assert_eq!(storage.write_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
    records: RwLock<BTreeMap<RecordKey, Vec<u8>>>,
    rejected: RwLock<BTreeSet<String>>,
    writes: AtomicU64,
    deletes: AtomicU64,
    flushes: AtomicU64,
}

impl MemoryStorage {
    /// Creates a new empty in-memory provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes so far.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of successful deletes so far.
    #[must_use]
    pub fn delete_count(&self) -> u64 {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Number of flushes so far.
    #[must_use]
    pub fn flush_count(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    /// Number of records currently held across both slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns true if no records are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Makes every later write or delete for `folder` fail with
    /// `PermissionDenied`, as an unwritable directory would.
    pub fn reject_writes(&self, folder: impl Into<String>) {
        self.rejected.write().insert(folder.into());
    }

    /// Accepts writes for every folder again.
    pub fn accept_all_writes(&self) {
        self.rejected.write().clear();
    }

    /// Removes all records and resets the counters.
    pub fn clear(&self) {
        self.records.write().clear();
        self.writes.store(0, Ordering::SeqCst);
        self.deletes.store(0, Ordering::SeqCst);
        self.flushes.store(0, Ordering::SeqCst);
    }

    fn check_writable(&self, folder: &str) -> StorageResult<()> {
        if self.rejected.read().contains(folder) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("folder {folder:?} is not writable"),
            )));
        }
        Ok(())
    }
}

impl SyncStorage for MemoryStorage {
    fn read(&self, slot: Slot, folder: &str, kind: RecordKind) -> StorageResult<Option<Vec<u8>>> {
        validate_folder(folder)?;
        Ok(self
            .records
            .read()
            .get(&(slot, folder.to_string(), kind))
            .cloned())
    }

    fn write(&self, slot: Slot, folder: &str, kind: RecordKind, data: &[u8]) -> StorageResult<()> {
        validate_folder(folder)?;
        self.check_writable(folder)?;
        self.records
            .write()
            .insert((slot, folder.to_string(), kind), data.to_vec());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete(&self, slot: Slot, folder: &str, kind: RecordKind) -> StorageResult<()> {
        validate_folder(folder)?;
        self.check_writable(folder)?;
        if self
            .records
            .write()
            .remove(&(slot, folder.to_string(), kind))
            .is_some()
        {
            self.deletes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn folders(&self, slot: Slot) -> StorageResult<Vec<String>> {
        let folders: BTreeSet<String> = self
            .records
            .read()
            .keys()
            .filter(|(s, _, _)| *s == slot)
            .map(|(_, folder, _)| folder.clone())
            .collect();
        Ok(folders.into_iter().collect())
    }

    fn flush(&self) -> StorageResult<()> {
        // In-memory provider has no pending writes
        self.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
