//! File-based persistence provider.
//!
//! Records are kept next to the working tree, the way CVS keeps them:
//!
//! ```text
//! <root>/
//! ├─ CVS/
//! │  ├─ cvsync.lock               # Advisory lock for single-writer
//! │  └─ Phantom/<folder>/CVS/     # Records of deleted folders
//! │     ├─ Binding
//! │     ├─ Entries
//! │     └─ Ignore
//! └─ <folder>/
//!    ├─ .cvsignore                # Ignore patterns
//!    └─ CVS/
//!       ├─ Binding                # Repository binding
//!       └─ Entries                # Children sync entries
//! ```

use crate::backend::{validate_folder, RecordKind, Slot, SyncStorage};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of the per-folder control directory.
pub const CONTROL_DIR: &str = "CVS";
const BINDING_FILE: &str = "Binding";
const ENTRIES_FILE: &str = "Entries";
const PHANTOM_IGNORE_FILE: &str = "Ignore";
const IGNORE_FILE: &str = ".cvsignore";
const PHANTOM_DIR: &str = "Phantom";
const LOCK_FILE: &str = "cvsync.lock";

/// A file-based persistence provider rooted at a project directory.
///
/// # Durability
///
/// Every write goes to a temporary file which is synced and then renamed
/// over the record, so a crash never leaves a half-written record.
///
/// # Locking
///
/// The provider holds an exclusive advisory lock on `<root>/CVS/cvsync.lock`
/// for its lifetime. Only one `FileStorage` can exist per root at a time.
///
/// # Example
///
/// ```no_run
/// use cvsync_storage::{FileStorage, RecordKind, Slot, SyncStorage};
/// use std::path::Path;
///
/// let storage = FileStorage::open(Path::new("checkout")).unwrap();
/// let entries = storage.read(Slot::Live, "src", RecordKind::ResourceEntries).unwrap();
/// ```
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
    /// Serializes writers within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    /// Opens the provider for the project at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `root` is not an existing directory
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(root: &Path) -> StorageResult<Self> {
        if !root.is_dir() {
            return Err(StorageError::MissingFolder {
                path: root.display().to_string(),
            });
        }

        let control = root.join(CONTROL_DIR);
        fs::create_dir_all(&control)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(control.join(LOCK_FILE))?;

        // Try to acquire exclusive lock (non-blocking)
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            root: root.to_path_buf(),
            _lock_file: lock_file,
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the project root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file backing a record.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder path is invalid.
    pub fn record_path(&self, slot: Slot, folder: &str, kind: RecordKind) -> StorageResult<PathBuf> {
        validate_folder(folder)?;
        let base = match slot {
            Slot::Live => join_folder(&self.root, folder),
            Slot::Phantom => join_folder(&self.root.join(CONTROL_DIR).join(PHANTOM_DIR), folder),
        };
        let path = match (slot, kind) {
            (_, RecordKind::FolderBinding) => base.join(CONTROL_DIR).join(BINDING_FILE),
            (_, RecordKind::ResourceEntries) => base.join(CONTROL_DIR).join(ENTRIES_FILE),
            (Slot::Live, RecordKind::IgnorePatterns) => base.join(IGNORE_FILE),
            (Slot::Phantom, RecordKind::IgnorePatterns) => {
                base.join(CONTROL_DIR).join(PHANTOM_IGNORE_FILE)
            }
        };
        Ok(path)
    }

    fn collect_folders(&self, slot: Slot, dir: &Path, relative: &str, out: &mut Vec<String>) -> io::Result<()> {
        let has_record = RecordKind::ALL.iter().any(|kind| {
            self.record_path(slot, relative, *kind)
                .map(|path| path.is_file())
                .unwrap_or(false)
        });
        if has_record {
            out.push(relative.to_string());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            // Non UTF-8 names cannot be CVS folders
            if let Some(name) = entry.file_name().to_str() {
                if name != CONTROL_DIR {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();

        for name in names {
            let child = if relative.is_empty() {
                name.clone()
            } else {
                format!("{relative}/{name}")
            };
            self.collect_folders(slot, &dir.join(&name), &child, out)?;
        }
        Ok(())
    }
}

fn join_folder(base: &Path, folder: &str) -> PathBuf {
    if folder.is_empty() {
        return base.to_path_buf();
    }
    folder.split('/').fold(base.to_path_buf(), |path, segment| path.join(segment))
}

impl SyncStorage for FileStorage {
    fn read(&self, slot: Slot, folder: &str, kind: RecordKind) -> StorageResult<Option<Vec<u8>>> {
        let path = self.record_path(slot, folder, kind)?;
        match fs::read(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, slot: Slot, folder: &str, kind: RecordKind, data: &[u8]) -> StorageResult<()> {
        let path = self.record_path(slot, folder, kind)?;
        if slot == Slot::Live && !join_folder(&self.root, folder).is_dir() {
            return Err(StorageError::MissingFolder {
                path: folder.to_string(),
            });
        }

        let _guard = self.write_lock.lock();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("record");
        let temp_path = path.with_file_name(format!("{file_name}.tmp"));

        let mut file = File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn delete(&self, slot: Slot, folder: &str, kind: RecordKind) -> StorageResult<()> {
        let path = self.record_path(slot, folder, kind)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn folders(&self, slot: Slot) -> StorageResult<Vec<String>> {
        let start = match slot {
            Slot::Live => self.root.clone(),
            Slot::Phantom => self.root.join(CONTROL_DIR).join(PHANTOM_DIR),
        };
        let mut out = Vec::new();
        if start.is_dir() {
            self.collect_folders(slot, &start, "", &mut out)?;
        }
        out.sort();
        Ok(out)
    }

    fn flush(&self) -> StorageResult<()> {
        // Writes are synced before rename; nothing is buffered
        Ok(())
    }
}
