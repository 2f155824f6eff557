//! # CVSync Core
//!
//! Synchronization engine for CVS working copies.
//!
//! This crate provides:
//! - A metadata store caching per-folder sync records behind one reentrant
//!   lock, with nested operations, batched persistence and change
//!   notification
//! - Phantom records for deleted folders, restored on re-creation
//! - Three-way classification of resources into [`SyncKind`]s
//! - The remote tree model the reconciler builds
//!
//! The store never touches a concrete filesystem directly: resources are
//! reached through a [`Workspace`] and records through a
//! [`cvsync_storage::SyncStorage`] provider.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod change_feed;
mod classifier;
mod config;
mod error;
mod kind;
mod remote;
mod resource;
mod store;
mod workspace;

pub use cancel::CancellationToken;
pub use change_feed::{ChangeBatch, ChangeFeed};
pub use classifier::{ComparisonMode, ResourceComparator, SyncClassifier, TimestampComparator};
pub use config::{StoreConfig, DEFAULT_IGNORE_PATTERNS};
pub use error::{CoreError, CoreResult};
pub use kind::SyncKind;
pub use remote::{RemoteFile, RemoteFolder, RemoteNode, ServerSyncState};
pub use resource::{Resource, ResourcePath};
pub use store::{wildcard_match, Operation, SyncMetadataStore};
pub use workspace::{FsWorkspace, MemoryWorkspace, ResourceKind, Workspace};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
