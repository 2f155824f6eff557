//! Remote tree model.
//!
//! A snapshot of what the repository holds for a subtree, as assembled by
//! the reconciler or derived from local base metadata.

use crate::resource::ResourcePath;
use cvsync_codec::CvsTag;
use serde::Serialize;
use std::collections::BTreeMap;

/// Merge classification the server reports for a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ServerSyncState {
    /// Nothing to report.
    #[default]
    UpToDate,
    /// The repository has a newer revision.
    RemoteChanges,
    /// Both sides changed and the server can merge them.
    MergeableConflict,
    /// Both sides changed and the server cannot merge them.
    Conflict,
    /// Removed locally, not yet committed.
    LocallyDeleted,
    /// Added locally, not yet committed.
    LocallyAdded,
    /// Modified locally with no remote change.
    LocallyModified,
    /// The server does not know the file.
    Unknown,
}

impl ServerSyncState {
    /// Returns true for the two conflict states.
    #[must_use]
    pub fn is_conflict(self) -> bool {
        matches!(self, Self::Conflict | Self::MergeableConflict)
    }
}

/// A file in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFile {
    /// Path relative to the project root.
    pub path: ResourcePath,
    /// Revision, `None` until fetched.
    pub revision: Option<String>,
    /// Sticky tag the revision was taken from.
    pub tag: Option<CvsTag>,
    /// Keyword substitution mode.
    pub keyword_mode: Option<String>,
    /// What the server reported for this file.
    pub server_state: ServerSyncState,
}

impl RemoteFile {
    /// Creates a file at `path` with a known revision.
    pub fn new(path: ResourcePath, revision: impl Into<String>) -> Self {
        Self {
            path,
            revision: Some(revision.into()),
            tag: None,
            keyword_mode: None,
            server_state: ServerSyncState::UpToDate,
        }
    }

    /// Creates a file whose revision is still to be fetched.
    pub fn pending(path: ResourcePath) -> Self {
        Self {
            path,
            revision: None,
            tag: None,
            keyword_mode: None,
            server_state: ServerSyncState::UpToDate,
        }
    }

    /// Returns a copy with the given server state.
    #[must_use]
    pub fn with_server_state(mut self, state: ServerSyncState) -> Self {
        self.server_state = state;
        self
    }

    /// Returns a copy with the given tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Option<CvsTag>) -> Self {
        self.tag = tag;
        self
    }
}

/// A folder in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemoteFolder {
    /// Path relative to the project root.
    pub path: ResourcePath,
    /// Repository path, when known.
    pub repository: Option<String>,
    /// Tag the folder was traversed with.
    pub tag: Option<CvsTag>,
    /// Children by name.
    pub children: BTreeMap<String, RemoteNode>,
}

impl RemoteFolder {
    /// Creates an empty folder.
    pub fn new(path: ResourcePath, tag: Option<CvsTag>) -> Self {
        Self {
            path,
            repository: None,
            tag,
            children: BTreeMap::new(),
        }
    }

    /// Adds or replaces a child.
    pub fn insert(&mut self, node: RemoteNode) {
        self.children.insert(node.name().to_string(), node);
    }

    /// Removes a child by name.
    pub fn remove(&mut self, name: &str) -> Option<RemoteNode> {
        self.children.remove(name)
    }

    /// Child by name.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&RemoteNode> {
        self.children.get(name)
    }

    /// Returns true if the folder has no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Node at `path`, which must lie at or below this folder.
    #[must_use]
    pub fn find(&self, path: &ResourcePath) -> Option<&RemoteNode> {
        let relative = path.relative_to(&self.path)?;
        if relative.is_empty() {
            return None;
        }
        let mut segments = relative.split('/');
        let mut node = self.children.get(segments.next()?)?;
        for segment in segments {
            match node {
                RemoteNode::Folder(folder) => node = folder.children.get(segment)?,
                RemoteNode::File(_) => return None,
            }
        }
        Some(node)
    }

    /// Mutable file at `path`, which must lie below this folder.
    pub fn file_mut(&mut self, path: &ResourcePath) -> Option<&mut RemoteFile> {
        let relative = path.relative_to(&self.path)?.to_string();
        let mut folder = self;
        let mut segments = relative.split('/').peekable();
        while let Some(segment) = segments.next() {
            let child = folder.children.get_mut(segment)?;
            match child {
                RemoteNode::File(file) if segments.peek().is_none() => return Some(file),
                RemoteNode::Folder(next) if segments.peek().is_some() => folder = next,
                _ => return None,
            }
        }
        None
    }

    /// Every file in this subtree, depth first.
    #[must_use]
    pub fn files(&self) -> Vec<&RemoteFile> {
        let mut out = Vec::new();
        self.collect_files(&mut out);
        out
    }

    fn collect_files<'a>(&'a self, out: &mut Vec<&'a RemoteFile>) {
        for node in self.children.values() {
            match node {
                RemoteNode::File(file) => out.push(file),
                RemoteNode::Folder(folder) => folder.collect_files(out),
            }
        }
    }
}

/// A node of the remote tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RemoteNode {
    /// A file.
    File(RemoteFile),
    /// A folder.
    Folder(RemoteFolder),
}

impl RemoteNode {
    /// Path of the node.
    #[must_use]
    pub fn path(&self) -> &ResourcePath {
        match self {
            RemoteNode::File(file) => &file.path,
            RemoteNode::Folder(folder) => &folder.path,
        }
    }

    /// Name of the node.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path().name()
    }

    /// Returns true for folders.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        matches!(self, RemoteNode::Folder(_))
    }

    /// The file, if this node is one.
    #[must_use]
    pub fn as_file(&self) -> Option<&RemoteFile> {
        match self {
            RemoteNode::File(file) => Some(file),
            RemoteNode::Folder(_) => None,
        }
    }

    /// The folder, if this node is one.
    #[must_use]
    pub fn as_folder(&self) -> Option<&RemoteFolder> {
        match self {
            RemoteNode::Folder(folder) => Some(folder),
            RemoteNode::File(_) => None,
        }
    }

    /// Remote-to-remote equality: folders are equal by containment,
    /// files by revision.
    #[must_use]
    pub fn same_as(&self, other: &RemoteNode) -> bool {
        match (self, other) {
            (RemoteNode::Folder(_), RemoteNode::Folder(_)) => true,
            (RemoteNode::File(a), RemoteNode::File(b)) => {
                a.revision.is_some() && a.revision == b.revision
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(path: &str) -> ResourcePath {
        ResourcePath::new(path).unwrap()
    }

    fn sample() -> RemoteFolder {
        let mut sub = RemoteFolder::new(p("a/sub"), None);
        sub.insert(RemoteNode::File(RemoteFile::new(p("a/sub/x.c"), "1.2")));
        let mut root = RemoteFolder::new(p("a"), None);
        root.insert(RemoteNode::Folder(sub));
        root.insert(RemoteNode::File(RemoteFile::pending(p("a/y.c"))));
        root
    }

    #[test]
    fn find_nested_nodes() {
        let tree = sample();
        assert!(tree.find(&p("a/sub")).unwrap().is_folder());
        assert_eq!(
            tree.find(&p("a/sub/x.c")).unwrap().as_file().unwrap().revision.as_deref(),
            Some("1.2")
        );
        assert!(tree.find(&p("a/sub/x.c/z")).is_none());
        assert!(tree.find(&p("b/x")).is_none());
        assert!(tree.find(&p("a")).is_none());
    }

    #[test]
    fn file_mut_updates_revision() {
        let mut tree = sample();
        tree.file_mut(&p("a/y.c")).unwrap().revision = Some("1.1".into());
        assert_eq!(
            tree.find(&p("a/y.c")).unwrap().as_file().unwrap().revision.as_deref(),
            Some("1.1")
        );
        assert!(tree.file_mut(&p("a/sub")).is_none());
    }

    #[test]
    fn files_lists_subtree() {
        let tree = sample();
        let paths: Vec<_> = tree.files().iter().map(|f| f.path.as_str().to_string()).collect();
        assert_eq!(paths, vec!["a/sub/x.c", "a/y.c"]);
    }

    #[test]
    fn remote_equality() {
        let folder_a = RemoteNode::Folder(RemoteFolder::new(p("a"), None));
        let folder_b = RemoteNode::Folder(RemoteFolder::new(p("a"), Some(CvsTag::branch("b"))));
        assert!(folder_a.same_as(&folder_b));

        let one = RemoteNode::File(RemoteFile::new(p("f"), "1.1"));
        let two = RemoteNode::File(RemoteFile::new(p("f"), "1.2"));
        let pending = RemoteNode::File(RemoteFile::pending(p("f")));
        assert!(one.same_as(&one.clone()));
        assert!(!one.same_as(&two));
        assert!(!pending.same_as(&pending.clone()));
        assert!(!one.same_as(&folder_a));
    }
}
