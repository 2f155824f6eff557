//! In-memory workspace for testing.

use super::{ResourceKind, Workspace};
use crate::error::{CoreError, CoreResult};
use crate::resource::ResourcePath;
use chrono::{DateTime, SubsecRound, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Node {
    Folder,
    File {
        data: Vec<u8>,
        modified: DateTime<Utc>,
    },
}

/// An in-memory resource tree.
///
/// The root folder always exists. Creating a file creates its missing
/// parent folders. Modification times are settable so tests can simulate
/// edits without sleeping.
///
/// # Example
///
/// ```rust
/// use cvsync_core::{MemoryWorkspace, ResourcePath, Workspace};
///
/// let ws = MemoryWorkspace::new();
/// let file = ResourcePath::new("src/main.c").unwrap();
/// ws.create_file(&file, b"int main;");
/// assert!(ws.exists(&file.parent().unwrap()));
/// ```
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    nodes: RwLock<BTreeMap<ResourcePath, Node>>,
}

impl MemoryWorkspace {
    /// Creates a workspace holding only the root folder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a folder and its missing ancestors.
    pub fn create_folder(&self, path: &ResourcePath) {
        let mut nodes = self.nodes.write();
        Self::create_ancestors(&mut nodes, path);
        if !path.is_root() {
            nodes.insert(path.clone(), Node::Folder);
        }
    }

    /// Creates or replaces a file stamped with the current time.
    pub fn create_file(&self, path: &ResourcePath, data: &[u8]) {
        self.create_file_at(path, data, Utc::now().trunc_subsecs(0));
    }

    /// Creates or replaces a file with an explicit modification time.
    pub fn create_file_at(&self, path: &ResourcePath, data: &[u8], modified: DateTime<Utc>) {
        let mut nodes = self.nodes.write();
        Self::create_ancestors(&mut nodes, path);
        nodes.insert(
            path.clone(),
            Node::File {
                data: data.to_vec(),
                modified: modified.trunc_subsecs(0),
            },
        );
    }

    /// Sets the modification time of an existing file.
    ///
    /// Returns false if `path` is not a file.
    pub fn set_modified(&self, path: &ResourcePath, when: DateTime<Utc>) -> bool {
        match self.nodes.write().get_mut(path) {
            Some(Node::File { modified, .. }) => {
                *modified = when.trunc_subsecs(0);
                true
            }
            _ => false,
        }
    }

    /// Removes a resource and everything below it.
    pub fn remove(&self, path: &ResourcePath) {
        if path.is_root() {
            self.nodes.write().clear();
            return;
        }
        self.nodes.write().retain(|key, _| !key.starts_with(path));
    }

    fn create_ancestors(nodes: &mut BTreeMap<ResourcePath, Node>, path: &ResourcePath) {
        let mut current = path.parent();
        while let Some(folder) = current {
            if folder.is_root() {
                break;
            }
            current = folder.parent();
            nodes.insert(folder, Node::Folder);
        }
    }
}

impl Workspace for MemoryWorkspace {
    fn kind(&self, path: &ResourcePath) -> Option<ResourceKind> {
        if path.is_root() {
            return Some(ResourceKind::Folder);
        }
        self.nodes.read().get(path).map(|node| match node {
            Node::Folder => ResourceKind::Folder,
            Node::File { .. } => ResourceKind::File,
        })
    }

    fn children(&self, folder: &ResourcePath) -> CoreResult<Vec<String>> {
        if self.kind(folder) != Some(ResourceKind::Folder) {
            return Err(CoreError::resource_not_found(folder.as_str()));
        }
        let nodes = self.nodes.read();
        Ok(nodes
            .keys()
            .filter(|key| key.parent().as_ref() == Some(folder))
            .map(|key| key.name().to_string())
            .collect())
    }

    fn read(&self, file: &ResourcePath) -> CoreResult<Vec<u8>> {
        match self.nodes.read().get(file) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            _ => Err(CoreError::resource_not_found(file.as_str())),
        }
    }

    fn write(&self, file: &ResourcePath, data: &[u8]) -> CoreResult<()> {
        let parent = file
            .parent()
            .ok_or_else(|| CoreError::invalid_operation("cannot write the root"))?;
        if self.kind(&parent) != Some(ResourceKind::Folder) {
            return Err(CoreError::resource_not_found(parent.as_str()));
        }
        self.nodes.write().insert(
            file.clone(),
            Node::File {
                data: data.to_vec(),
                modified: Utc::now().trunc_subsecs(0),
            },
        );
        Ok(())
    }

    fn modified_at(&self, file: &ResourcePath) -> CoreResult<Option<DateTime<Utc>>> {
        match self.nodes.read().get(file) {
            Some(Node::File { modified, .. }) => Ok(Some(*modified)),
            _ => Ok(None),
        }
    }
}
