//! Sync record model.
//!
//! These are immutable values describing what CVS last recorded for a
//! resource ([`ResourceSyncInfo`]) and how a folder is bound to the
//! repository ([`FolderSyncInfo`]). Mutation always produces a new value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Revision string CVS uses for a locally added file.
pub const ADDED_REVISION: &str = "0";

/// What a sticky tag refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TagKind {
    /// A branch tag.
    Branch,
    /// A non-branch (version) tag.
    Version,
    /// A sticky date.
    Date,
}

/// A sticky CVS tag. Absence of a tag means HEAD.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CvsTag {
    /// What the tag names.
    pub kind: TagKind,
    /// Tag name, or the date text for [`TagKind::Date`].
    pub name: String,
}

impl CvsTag {
    /// Creates a branch tag.
    pub fn branch(name: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Branch,
            name: name.into(),
        }
    }

    /// Creates a version tag.
    pub fn version(name: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Version,
            name: name.into(),
        }
    }

    /// Creates a sticky date.
    pub fn date(name: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Date,
            name: name.into(),
        }
    }

    /// Returns true if both tags name the same thing, ignoring kind.
    ///
    /// Entries lines do not distinguish branch from version tags, so a tag
    /// read back from an Entries file may differ in kind only.
    #[must_use]
    pub fn same_name(&self, other: &CvsTag) -> bool {
        (self.kind == TagKind::Date) == (other.kind == TagKind::Date) && self.name == other.name
    }
}

impl fmt::Display for CvsTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// How a resource's working copy came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryType {
    /// Checked out or committed as is.
    Regular,
    /// Produced by a merge during update.
    Merged {
        /// Whether the merge left conflict markers.
        with_conflicts: bool,
    },
    /// Scheduled for removal (`cvs remove` not yet committed).
    Deleted,
}

/// Per-resource sync record, one line of a folder's Entries file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceSyncInfo {
    /// Base name, unique within the parent folder.
    pub name: String,
    /// CVS revision, or [`ADDED_REVISION`] for a local addition.
    pub revision: String,
    /// Modification time the revision corresponds to, `None` if never synced.
    pub timestamp: Option<DateTime<Utc>>,
    /// Keyword substitution mode, e.g. `-kb`.
    pub keyword_mode: Option<String>,
    /// File permissions as reported by the server.
    pub permissions: Option<String>,
    /// Sticky tag.
    pub tag: Option<CvsTag>,
    /// Regular, merged or deleted.
    pub entry_type: EntryType,
    is_directory: bool,
}

impl ResourceSyncInfo {
    /// Creates a regular file record.
    pub fn new(
        name: impl Into<String>,
        revision: impl Into<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            name: name.into(),
            revision: revision.into(),
            timestamp,
            keyword_mode: None,
            permissions: None,
            tag: None,
            entry_type: EntryType::Regular,
            is_directory: false,
        }
    }

    /// Creates a record for a locally added file.
    pub fn added(name: impl Into<String>) -> Self {
        Self::new(name, ADDED_REVISION, None)
    }

    /// Creates the record of a child folder.
    ///
    /// Folders have no revision; CVS folders exist identically on every
    /// branch, so the record only marks the name as a managed folder.
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: String::new(),
            timestamp: None,
            keyword_mode: None,
            permissions: None,
            tag: None,
            entry_type: EntryType::Regular,
            is_directory: true,
        }
    }

    /// Returns a copy with the given sticky tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Option<CvsTag>) -> Self {
        self.tag = tag;
        self
    }

    /// Returns a copy with the given keyword mode.
    #[must_use]
    pub fn with_keyword_mode(mut self, mode: Option<String>) -> Self {
        self.keyword_mode = mode;
        self
    }

    /// Returns a copy with the given permissions.
    #[must_use]
    pub fn with_permissions(mut self, permissions: Option<String>) -> Self {
        self.permissions = permissions;
        self
    }

    /// Returns a copy with the given entry type.
    #[must_use]
    pub fn with_entry_type(mut self, entry_type: EntryType) -> Self {
        self.entry_type = entry_type;
        self
    }

    /// Returns true if this record describes a folder.
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// Returns true if the file was added locally and never committed.
    #[must_use]
    pub fn is_added(&self) -> bool {
        !self.is_directory && self.revision == ADDED_REVISION
    }

    /// Returns true if the file is scheduled for removal.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.entry_type == EntryType::Deleted
    }

    /// Returns true if the working copy is the result of a merge.
    #[must_use]
    pub fn is_merged(&self) -> bool {
        matches!(self.entry_type, EntryType::Merged { .. })
    }

    /// Returns true if a merge left conflict markers in the working copy.
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        self.entry_type == EntryType::Merged {
            with_conflicts: true,
        }
    }

    /// Returns the record scheduling this file for removal.
    #[must_use]
    pub fn convert_to_deletion(&self) -> Self {
        let mut info = self.clone();
        if !info.is_directory && !info.is_added() {
            info.entry_type = EntryType::Deleted;
        }
        info
    }

    /// Returns the record undoing a scheduled removal.
    #[must_use]
    pub fn convert_from_deletion(&self) -> Self {
        let mut info = self.clone();
        if info.is_deleted() {
            info.entry_type = EntryType::Regular;
        }
        info
    }
}

/// Repository binding of a folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSyncInfo {
    /// Connection string, e.g. `:pserver:anon@cvs.example.org:/cvsroot`.
    pub root: String,
    /// Server-relative repository path.
    pub repository: String,
    /// Sticky tag of the folder, `None` for HEAD.
    pub tag: Option<CvsTag>,
    /// Whether new server-side siblings are excluded from updates.
    pub is_static: bool,
}

impl FolderSyncInfo {
    /// Creates a non-static HEAD binding.
    pub fn new(root: impl Into<String>, repository: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            repository: repository.into(),
            tag: None,
            is_static: false,
        }
    }

    /// Returns a copy with the given sticky tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Option<CvsTag>) -> Self {
        self.tag = tag;
        self
    }

    /// Returns a copy with the static flag set as given.
    #[must_use]
    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    /// Two bindings are the same mapping iff root and repository match.
    #[must_use]
    pub fn is_same_mapping(&self, other: &FolderSyncInfo) -> bool {
        self.root == other.root && self.repository == other.repository
    }

    /// Binding of a child folder named `name`, inheriting root and tag.
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let repository = if self.repository.is_empty() || self.repository == "." {
            name.to_string()
        } else {
            format!("{}/{}", self.repository, name)
        };
        Self {
            root: self.root.clone(),
            repository,
            tag: self.tag.clone(),
            is_static: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn added_record_flags() {
        let info = ResourceSyncInfo::added("new.c");
        assert!(info.is_added());
        assert!(!info.is_deleted());
        assert!(!info.is_merged());
        assert!(info.timestamp.is_none());
    }

    #[test]
    fn directory_record_is_not_added() {
        let info = ResourceSyncInfo::directory("src");
        assert!(info.is_directory());
        assert!(!info.is_added());
        assert!(info.revision.is_empty());
    }

    #[test]
    fn deletion_conversion_roundtrip() {
        let info = ResourceSyncInfo::new("a.c", "1.4", None);
        let deleted = info.convert_to_deletion();
        assert!(deleted.is_deleted());
        assert_eq!(deleted.revision, "1.4");
        assert_eq!(deleted.convert_from_deletion(), info);
    }

    #[test]
    fn added_file_is_not_converted_to_deletion() {
        let info = ResourceSyncInfo::added("a.c");
        assert!(!info.convert_to_deletion().is_deleted());
    }

    #[test]
    fn merged_with_conflicts() {
        let info = ResourceSyncInfo::new("a.c", "1.2", None).with_entry_type(EntryType::Merged {
            with_conflicts: true,
        });
        assert!(info.is_merged());
        assert!(info.has_conflicts());
    }

    #[test]
    fn same_mapping_ignores_tag() {
        let a = FolderSyncInfo::new(":local:/cvs", "proj/src");
        let b = a.clone().with_tag(Some(CvsTag::branch("dev"))).with_static(true);
        let c = FolderSyncInfo::new(":local:/cvs", "proj/doc");
        assert!(a.is_same_mapping(&b));
        assert!(!a.is_same_mapping(&c));
    }

    #[test]
    fn child_binding_extends_repository() {
        let parent = FolderSyncInfo::new(":local:/cvs", "proj").with_tag(Some(CvsTag::branch("b1")));
        let child = parent.child("src");
        assert_eq!(child.repository, "proj/src");
        assert_eq!(child.tag, parent.tag);
        assert_eq!(FolderSyncInfo::new("r", ".").child("x").repository, "x");
    }

    #[test]
    fn tag_same_name_ignores_branch_kind() {
        assert!(CvsTag::branch("v1").same_name(&CvsTag::version("v1")));
        assert!(!CvsTag::branch("v1").same_name(&CvsTag::date("v1")));
    }
}
