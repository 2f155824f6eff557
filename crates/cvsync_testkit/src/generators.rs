//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random sync records and store
//! operations that maintain the record format's invariants.

use crate::fixtures::TestProject;
use chrono::{DateTime, TimeZone, Utc};
use cvsync_codec::{CvsTag, EntryType, FolderSyncInfo, ResourceSyncInfo};
use cvsync_core::{CoreResult, ResourcePath};
use proptest::prelude::*;

/// Strategy for generating valid resource names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z_][a-zA-Z0-9_.-]{0,15}")
        .expect("Invalid regex")
        .prop_filter("Name must not be the control folder", |s| s != "CVS")
}

/// Strategy for generating trunk and branch revisions.
pub fn revision_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        (1u32..5, 1u32..200).prop_map(|(major, minor)| format!("{}.{}", major, minor)),
        (1u32..50, 2u32..10, 1u32..20)
            .prop_map(|(minor, branch, rev)| format!("1.{}.{}.{}", minor, branch * 2, rev)),
    ]
}

/// Strategy for generating whole-second timestamps.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..2_000_000_000).prop_map(|secs| {
        Utc.timestamp_opt(secs, 0)
            .single()
            .expect("Timestamp in range")
    })
}

/// Strategy for generating sticky tags.
pub fn tag_strategy() -> impl Strategy<Value = CvsTag> {
    let name = || prop::string::string_regex("[A-Za-z][A-Za-z0-9_-]{0,15}").expect("Invalid regex");
    prop_oneof![
        name().prop_map(|n| CvsTag::branch(n)),
        name().prop_map(|n| CvsTag::version(n)),
    ]
}

/// Strategy for generating file sync records named `name`.
pub fn resource_sync_strategy(name: String) -> impl Strategy<Value = ResourceSyncInfo> {
    (
        revision_strategy(),
        prop::option::of(timestamp_strategy()),
        prop::option::of(prop_oneof![Just("-kb".to_string()), Just("-ko".to_string())]),
        prop::option::of(tag_strategy()),
        0u8..4,
    )
        .prop_map(move |(revision, timestamp, keyword_mode, tag, state)| {
            let info = ResourceSyncInfo::new(name.clone(), revision, timestamp)
                .with_keyword_mode(keyword_mode)
                .with_tag(tag);
            match state {
                0 => ResourceSyncInfo::added(name.clone()),
                1 => info.convert_to_deletion(),
                2 => info.with_entry_type(EntryType::Merged {
                    with_conflicts: false,
                }),
                _ => info,
            }
        })
}

/// Strategy for generating folder bindings.
pub fn folder_sync_strategy() -> impl Strategy<Value = FolderSyncInfo> {
    (
        prop_oneof![
            Just(":local:/var/cvs".to_string()),
            Just(":pserver:anonymous@cvs.example.org:/cvsroot".to_string()),
            Just(":ext:dev@host:/srv/cvs".to_string()),
        ],
        prop::collection::vec(name_strategy(), 1..4),
        prop::option::of(tag_strategy()),
        any::<bool>(),
    )
        .prop_map(|(root, segments, tag, is_static)| {
            FolderSyncInfo::new(root, segments.join("/"))
                .with_tag(tag)
                .with_static(is_static)
        })
}

/// A store operation for sequence tests.
#[derive(Debug, Clone)]
pub enum StoreOp {
    /// Check out a file at a revision.
    Checkout {
        /// Folder index.
        folder: usize,
        /// File name.
        name: String,
        /// Revision.
        revision: String,
    },
    /// Schedule a file for addition.
    Add {
        /// Folder index.
        folder: usize,
        /// File name.
        name: String,
    },
    /// Delete a file's record.
    Forget {
        /// Folder index.
        folder: usize,
        /// File name.
        name: String,
    },
    /// Add an ignore pattern.
    Ignore {
        /// Folder index.
        folder: usize,
        /// Pattern.
        pattern: String,
    },
}

impl StoreOp {
    /// Folder index the operation targets.
    pub fn folder(&self) -> usize {
        match self {
            StoreOp::Checkout { folder, .. }
            | StoreOp::Add { folder, .. }
            | StoreOp::Forget { folder, .. }
            | StoreOp::Ignore { folder, .. } => *folder,
        }
    }
}

/// Strategy for a single store operation over `folders` folders.
pub fn store_op_strategy(folders: usize) -> impl Strategy<Value = StoreOp> {
    let folders = folders.max(1);
    prop_oneof![
        (0..folders, name_strategy(), revision_strategy()).prop_map(|(folder, name, revision)| {
            StoreOp::Checkout {
                folder,
                name,
                revision,
            }
        }),
        (0..folders, name_strategy()).prop_map(|(folder, name)| StoreOp::Add { folder, name }),
        (0..folders, name_strategy()).prop_map(|(folder, name)| StoreOp::Forget { folder, name }),
        (0..folders, prop::string::string_regex("\\*\\.[a-z]{1,3}").expect("Invalid regex"))
            .prop_map(|(folder, pattern)| StoreOp::Ignore { folder, pattern }),
    ]
}

/// Strategy for a sequence of store operations.
pub fn store_ops_strategy(folders: usize, max_ops: usize) -> impl Strategy<Value = Vec<StoreOp>> {
    prop::collection::vec(store_op_strategy(folders), 0..max_ops)
}

/// Folder path used for folder index `index`.
pub fn folder_for(index: usize) -> ResourcePath {
    ResourcePath::new(format!("dir{}", index)).expect("Valid folder name")
}

/// Applies an operation to a project whose folders were bound with
/// [`folder_for`].
///
/// # Errors
///
/// Returns the store error, if any.
pub fn apply_op(project: &TestProject, op: &StoreOp) -> CoreResult<()> {
    let folder = folder_for(op.folder());
    match op {
        StoreOp::Checkout { name, revision, .. } => {
            let file = folder.join(name);
            project.workspace.create_file(&file, revision.as_bytes());
            project
                .store
                .set_resource_sync(&file, ResourceSyncInfo::new(name.clone(), revision.clone(), None))
        }
        StoreOp::Add { name, .. } => {
            let file = folder.join(name);
            project.workspace.create_file(&file, b"");
            project
                .store
                .set_resource_sync(&file, ResourceSyncInfo::added(name.clone()))
        }
        StoreOp::Forget { name, .. } => project.store.delete_resource_sync(&folder.join(name)),
        StoreOp::Ignore { pattern, .. } => project.store.add_ignored(&folder, pattern),
    }
}
