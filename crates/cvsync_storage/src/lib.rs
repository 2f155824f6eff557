//! # CVSync Storage
//!
//! Persistence providers for CVSync synchronization metadata.
//!
//! This crate provides the lowest-level storage abstraction for CVSync.
//! Providers are **opaque byte stores** keyed by folder and record kind -
//! they do not interpret the records they hold.
//!
//! ## Design Principles
//!
//! - A folder owns three records: its repository binding, the sync entries
//!   of all its children (written as one atomic unit), and its ignore list
//! - Every record lives in one of two slots: [`Slot::Live`] for folders that
//!   exist on disk and [`Slot::Phantom`] for metadata retained after a
//!   folder was deleted
//! - Providers must be `Send + Sync`
//! - CVSync owns all record format interpretation
//!
//! ## Available Providers
//!
//! - [`MemoryStorage`] - For testing and ephemeral workspaces
//! - [`FileStorage`] - Persists records next to the working tree
//!
//! ## Example
//!
//! ```rust
//! use cvsync_storage::{MemoryStorage, RecordKind, Slot, SyncStorage};
//!
//! let storage = MemoryStorage::new();
//! storage
//!     .write(Slot::Live, "src", RecordKind::ResourceEntries, b"/a.c/1.1///\n")
//!     .unwrap();
//! let data = storage.read(Slot::Live, "src", RecordKind::ResourceEntries).unwrap();
//! assert_eq!(data.as_deref(), Some(&b"/a.c/1.1///\n"[..]));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{validate_folder, RecordKind, Slot, SyncStorage};
pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use memory::MemoryStorage;
