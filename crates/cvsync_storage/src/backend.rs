//! Persistence provider trait definition.

use crate::error::{StorageError, StorageResult};
use std::sync::Arc;

/// Which side of the live/phantom split a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    /// Metadata of a folder that exists in the workspace.
    Live,
    /// Metadata retained for a folder that was deleted from the workspace.
    Phantom,
}

/// The kind of record stored for a folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKind {
    /// The folder's own repository binding.
    FolderBinding,
    /// The sync entries of all children, stored as one unit.
    ResourceEntries,
    /// The folder's ignore pattern list.
    IgnorePatterns,
}

impl RecordKind {
    /// All record kinds, in persistence order.
    pub const ALL: [RecordKind; 3] = [
        RecordKind::FolderBinding,
        RecordKind::ResourceEntries,
        RecordKind::IgnorePatterns,
    ];
}

/// A byte-level persistence provider for sync metadata.
///
/// Providers are **opaque byte stores**. CVSync owns the record formats;
/// providers only keep the bytes for a `(slot, folder, kind)` key.
///
/// Folder paths are normalized relative paths: segments separated by `/`,
/// no leading or trailing separator, no `.` or `..` segments. The empty
/// string names the project root.
///
/// # Invariants
///
/// - `read` returns exactly the bytes of the last successful `write`
/// - `read` returns `None` after `delete` or before any `write`
/// - a `write` replaces the whole record atomically
///
/// # Implementors
///
/// - [`super::MemoryStorage`] - For testing
/// - [`super::FileStorage`] - For persistent storage
pub trait SyncStorage: Send + Sync {
    /// Reads a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or an I/O error occurs.
    fn read(&self, slot: Slot, folder: &str, kind: RecordKind) -> StorageResult<Option<Vec<u8>>>;

    /// Replaces a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid, a live record targets a
    /// missing folder, or an I/O error occurs.
    fn write(&self, slot: Slot, folder: &str, kind: RecordKind, data: &[u8]) -> StorageResult<()>;

    /// Removes a record. Removing an absent record succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or an I/O error occurs.
    fn delete(&self, slot: Slot, folder: &str, kind: RecordKind) -> StorageResult<()>;

    /// Lists every folder holding at least one record in `slot`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn folders(&self, slot: Slot) -> StorageResult<Vec<String>>;

    /// Makes all previous writes durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;
}

impl<T: SyncStorage + ?Sized> SyncStorage for Arc<T> {
    fn read(&self, slot: Slot, folder: &str, kind: RecordKind) -> StorageResult<Option<Vec<u8>>> {
        (**self).read(slot, folder, kind)
    }

    fn write(&self, slot: Slot, folder: &str, kind: RecordKind, data: &[u8]) -> StorageResult<()> {
        (**self).write(slot, folder, kind, data)
    }

    fn delete(&self, slot: Slot, folder: &str, kind: RecordKind) -> StorageResult<()> {
        (**self).delete(slot, folder, kind)
    }

    fn folders(&self, slot: Slot) -> StorageResult<Vec<String>> {
        (**self).folders(slot)
    }

    fn flush(&self) -> StorageResult<()> {
        (**self).flush()
    }
}

/// Checks that `folder` is a normalized relative path.
///
/// # Errors
///
/// Returns [`StorageError::InvalidPath`] otherwise.
pub fn validate_folder(folder: &str) -> StorageResult<()> {
    if folder.is_empty() {
        return Ok(());
    }
    let valid = !folder.contains('\\')
        && folder
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidPath {
            path: folder.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn validate_accepts_root_and_nested() {
        assert!(validate_folder("").is_ok());
        assert!(validate_folder("src").is_ok());
        assert!(validate_folder("src/main/java").is_ok());
    }

    #[test]
    fn validate_rejects_unnormalized() {
        for path in ["/src", "src/", "a//b", "a/../b", "./a", "a\\b"] {
            assert!(
                matches!(validate_folder(path), Err(StorageError::InvalidPath { .. })),
                "{path} should be rejected"
            );
        }
    }

    proptest! {
        #[test]
        fn joined_segments_validate(segments in prop::collection::vec("[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,8}", 1..5)) {
            prop_assume!(segments.iter().all(|s| s != "." && s != ".."));
            prop_assert!(validate_folder(&segments.join("/")).is_ok());
        }

        #[test]
        fn trailing_slash_never_validates(folder in "[a-z]{1,8}(/[a-z]{1,8}){0,3}") {
            let trailing = format!("{}/", folder);
            prop_assert!(validate_folder(&trailing).is_err());
        }
    }
}
