//! Workspace resource access.
//!
//! The engine never touches a concrete filesystem directly. It asks a
//! [`Workspace`] whether resources exist, what a folder contains and when
//! a file was last modified.

mod fs;
mod memory;

pub use fs::FsWorkspace;
pub use memory::MemoryWorkspace;

use crate::error::CoreResult;
use crate::resource::{Resource, ResourcePath};
use chrono::{DateTime, Utc};

/// What a path refers to in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A regular file.
    File,
    /// A folder.
    Folder,
}

/// Access to the local resource tree.
///
/// # Implementors
///
/// - [`MemoryWorkspace`] - For testing
/// - [`FsWorkspace`] - A directory on disk
pub trait Workspace: Send + Sync {
    /// What `path` currently is, `None` if nothing exists there.
    fn kind(&self, path: &ResourcePath) -> Option<ResourceKind>;

    /// Returns true if anything exists at `path`.
    fn exists(&self, path: &ResourcePath) -> bool {
        self.kind(path).is_some()
    }

    /// Names of the children of a folder, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if `folder` is not an existing folder.
    fn children(&self, folder: &ResourcePath) -> CoreResult<Vec<String>>;

    /// Reads a file.
    ///
    /// # Errors
    ///
    /// Returns an error if `file` is not an existing file.
    fn read(&self, file: &ResourcePath) -> CoreResult<Vec<u8>>;

    /// Replaces a file's contents, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent folder does not exist.
    fn write(&self, file: &ResourcePath, data: &[u8]) -> CoreResult<()>;

    /// Last modification time of a file, truncated to whole seconds.
    ///
    /// # Errors
    ///
    /// Returns an error if the time cannot be read.
    fn modified_at(&self, file: &ResourcePath) -> CoreResult<Option<DateTime<Utc>>>;

    /// The resource at `path`, if it exists.
    fn resource(&self, path: &ResourcePath) -> Option<Resource> {
        match self.kind(path)? {
            ResourceKind::File => Some(Resource::File(path.clone())),
            ResourceKind::Folder => Some(Resource::Folder(path.clone())),
        }
    }
}
