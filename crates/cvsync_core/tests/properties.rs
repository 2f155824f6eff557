//! Behavioural properties of the store and classifier.

use chrono::{TimeZone, Utc};
use cvsync_codec::{canonical_record, CvsTag, EntryType, FolderSyncInfo, ResourceSyncInfo};
use cvsync_core::{
    CancellationToken, FsWorkspace, MemoryWorkspace, RemoteFile, RemoteFolder, RemoteNode,
    Resource, ResourcePath, StoreConfig, SyncClassifier, SyncKind, SyncMetadataStore, Workspace,
};
use cvsync_storage::{FileStorage, MemoryStorage, Slot, SyncStorage};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::sync::Arc;

fn p(path: &str) -> ResourcePath {
    ResourcePath::new(path).unwrap()
}

fn memory_store() -> (Arc<MemoryWorkspace>, SyncMetadataStore<Arc<MemoryStorage>>) {
    let ws = Arc::new(MemoryWorkspace::new());
    let store = SyncMetadataStore::new(
        Arc::new(MemoryStorage::new()),
        ws.clone(),
        StoreConfig::default(),
    );
    (ws, store)
}

#[test]
fn scenario_unmanaged_folder_conflicts_with_remote() {
    let (ws, store) = memory_store();
    ws.create_folder(&p("proj/src"));
    let remote = RemoteNode::Folder(RemoteFolder::new(p("proj/src"), None));

    let kind = SyncClassifier::new(&store)
        .classify(&Resource::Folder(p("proj/src")), Some(&remote))
        .unwrap();

    assert_eq!(kind, SyncKind::CONFLICTING | SyncKind::ADDITION);
}

#[test]
fn scenario_clean_file_is_in_sync() {
    let (ws, store) = memory_store();
    ws.create_file(&p("README"), b"hello");
    let stamp = ws.modified_at(&p("README")).unwrap();
    store
        .set_resource_sync(&p("README"), ResourceSyncInfo::new("README", "1.3", stamp))
        .unwrap();
    let remote = RemoteNode::File(RemoteFile::new(p("README"), "1.3"));

    let kind = SyncClassifier::new(&store)
        .classify(&Resource::File(p("README")), Some(&remote))
        .unwrap();

    assert_eq!(kind, SyncKind::IN_SYNC);
}

#[test]
fn scenario_missing_file_is_incoming_addition() {
    let (_ws, store) = memory_store();
    let remote = RemoteNode::File(RemoteFile::new(p("README"), "1.4"));

    let kind = SyncClassifier::new(&store)
        .classify(&Resource::File(p("README")), Some(&remote))
        .unwrap();

    assert_eq!(kind, SyncKind::INCOMING | SyncKind::ADDITION);
}

#[test]
fn records_survive_a_new_store_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let info = ResourceSyncInfo::new("main.c", "1.9", None);
    let binding = FolderSyncInfo::new(":pserver:anon@cvs.example.org:/cvsroot", "proj/src");

    {
        let ws = Arc::new(FsWorkspace::open(dir.path()).unwrap());
        std::fs::create_dir(dir.path().join("src")).unwrap();
        ws.write(&p("src/main.c"), b"int main;").unwrap();

        let store = SyncMetadataStore::new(
            FileStorage::open(dir.path()).unwrap(),
            ws,
            StoreConfig::default(),
        );
        let op = store.begin_operation();
        store.set_folder_sync(&p("src"), binding.clone()).unwrap();
        store.set_resource_sync(&p("src/main.c"), info.clone()).unwrap();
        op.end().unwrap();
    }

    let ws = Arc::new(FsWorkspace::open(dir.path()).unwrap());
    let store = SyncMetadataStore::new(
        FileStorage::open(dir.path()).unwrap(),
        ws,
        StoreConfig::default(),
    );
    assert_eq!(store.folder_sync(&p("src")).unwrap(), Some(binding));
    assert_eq!(store.resource_sync(&p("src/main.c")).unwrap(), Some(info));
    assert!(dir.path().join("src/CVS/Entries").is_file());

    // The control folder is metadata, not a member
    let members = store.members(&p("src")).unwrap();
    assert_eq!(members, vec![Resource::File(p("src/main.c"))]);
}

#[test]
fn phantom_records_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let ws = Arc::new(FsWorkspace::open(dir.path()).unwrap());
    std::fs::create_dir_all(dir.path().join("doc")).unwrap();
    ws.write(&p("doc/guide.txt"), b"guide").unwrap();

    let store = SyncMetadataStore::new(
        FileStorage::open(dir.path()).unwrap(),
        ws,
        StoreConfig::default(),
    );
    store
        .set_folder_sync(&p("doc"), FolderSyncInfo::new("root", "proj/doc"))
        .unwrap();
    store
        .set_resource_sync(&p("doc/guide.txt"), ResourceSyncInfo::new("guide.txt", "1.1", None))
        .unwrap();

    store.prepare_for_deletion(&Resource::Folder(p("doc"))).unwrap();
    std::fs::remove_dir_all(dir.path().join("doc")).unwrap();

    assert_eq!(store.storage().folders(Slot::Phantom).unwrap(), vec!["doc".to_string()]);
    assert!(store
        .resource_sync(&p("doc/guide.txt"))
        .unwrap()
        .unwrap()
        .is_deleted());

    let remote = RemoteNode::Folder(RemoteFolder::new(p("doc"), None));
    let kind = SyncClassifier::new(&store)
        .classify(&Resource::Folder(p("doc")), Some(&remote))
        .unwrap();
    assert_eq!(kind, SyncKind::IN_SYNC);
}

#[test]
fn pseudo_conflict_normalization_is_idempotent() {
    let (ws, store) = memory_store();
    ws.create_file(&p("lib/x.c"), b"");
    store
        .set_resource_sync(&p("lib/x.c"), ResourceSyncInfo::new("x.c", "1.1", None))
        .unwrap();
    ws.remove(&p("lib/x.c"));
    let classifier = SyncClassifier::new(&store);

    for _ in 0..2 {
        let kind = classifier.classify(&Resource::File(p("lib/x.c")), None).unwrap();
        assert_eq!(kind, SyncKind::IN_SYNC);
        assert_eq!(store.resource_sync(&p("lib/x.c")).unwrap(), None);
    }
}

#[test]
fn classify_tree_descends_into_remote_only_folders() {
    let (_ws, store) = memory_store();
    let mut sub = RemoteFolder::new(p("lib"), None);
    sub.insert(RemoteNode::File(RemoteFile::new(p("lib/util.c"), "1.1")));
    let mut root = RemoteFolder::new(ResourcePath::root(), None);
    root.insert(RemoteNode::Folder(sub));

    let result = SyncClassifier::new(&store)
        .classify_tree(&ResourcePath::root(), Some(&root), &CancellationToken::new())
        .unwrap();

    assert_eq!(
        result,
        vec![
            (Resource::Folder(p("lib")), SyncKind::INCOMING | SyncKind::ADDITION),
            (Resource::File(p("lib/util.c")), SyncKind::INCOMING | SyncKind::ADDITION),
        ]
    );
}

fn record_strategy() -> impl Strategy<Value = ResourceSyncInfo> {
    (
        "[a-z]{1,8}\\.c",
        (1u32..20, 1u32..50).prop_map(|(major, minor)| format!("{major}.{minor}")),
        prop::option::of((0i64..2_000_000_000, 0u32..1_000_000_000)),
        prop::option::of("-k[bkov]"),
        prop::option::of(("[A-Z][A-Z0-9_]{0,8}", any::<bool>())),
        0u8..5,
    )
        .prop_map(|(name, revision, stamp, mode, tag, state)| {
            let timestamp = stamp.and_then(|(secs, nanos)| Utc.timestamp_opt(secs, nanos).single());
            let tag = tag.map(|(name, branch)| {
                if branch {
                    CvsTag::branch(name)
                } else {
                    CvsTag::version(name)
                }
            });
            let info = ResourceSyncInfo::new(name.as_str(), revision, timestamp)
                .with_keyword_mode(mode)
                .with_tag(tag);
            match state {
                0 => ResourceSyncInfo::added(name),
                1 => info.convert_to_deletion(),
                2 => info.with_entry_type(EntryType::Merged { with_conflicts: false }),
                3 => info.with_entry_type(EntryType::Merged { with_conflicts: true }),
                _ => info,
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn set_then_get_returns_record(
        folder in "[a-z]{1,6}",
        info in record_strategy(),
        nested in any::<bool>(),
    ) {
        let (ws, store) = memory_store();
        let path = p(&folder).join(&info.name);
        ws.create_file(&path, b"");
        ws.create_folder(&p("zz_other"));
        let expected = canonical_record(&info).unwrap();

        let op = nested.then(|| store.begin_operation());
        store.set_resource_sync(&path, info.clone()).unwrap();
        prop_assert_eq!(store.resource_sync(&path).unwrap(), Some(expected.clone()));

        // Move the window away so the record is read back from its encoding
        store.resource_sync(&p("zz_other/x.c")).unwrap();
        prop_assert_eq!(store.resource_sync(&path).unwrap(), Some(expected.clone()));

        store.delete_resource_sync(&path).unwrap();
        prop_assert_eq!(store.resource_sync(&path).unwrap(), None);
        if let Some(op) = op {
            op.end().unwrap();
        }
    }

    #[test]
    fn nested_writes_commit_once(
        writes in prop::collection::vec(("[a-d]", "[a-z]{1,6}", 0usize..4), 1..16),
    ) {
        let (ws, store) = memory_store();
        let rx = store.subscribe();
        let mut expected = BTreeSet::new();
        let mut folders = BTreeSet::new();

        let depth = writes.iter().map(|(_, _, level)| *level).max().unwrap_or(0) + 1;
        let mut ops = Vec::new();
        for level in 0..depth {
            ops.push(store.begin_operation());
            for (folder, name, _) in writes.iter().filter(|(_, _, l)| *l == level) {
                let path = p(folder).join(name);
                ws.create_file(&path, b"");
                store
                    .set_resource_sync(&path, ResourceSyncInfo::new(name.as_str(), "1.1", None))
                    .unwrap();
                expected.insert(path);
                folders.insert(folder.clone());
            }
        }
        prop_assert_eq!(store.storage().flush_count(), 0);
        while let Some(op) = ops.pop() {
            op.end().unwrap();
        }

        prop_assert_eq!(store.storage().flush_count(), 1);
        prop_assert_eq!(store.storage().write_count(), folders.len() as u64);
        let batch = rx.try_recv().unwrap();
        prop_assert_eq!(batch.resources, expected.into_iter().collect::<Vec<_>>());
        prop_assert!(rx.try_recv().is_err());
    }
}

#[test]
fn representable_records_read_back_unchanged() {
    let (ws, store) = memory_store();
    ws.create_folder(&p("a"));
    ws.create_folder(&p("b"));
    let stamp = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let info = ResourceSyncInfo::new("x.c", "1.3", Some(stamp))
        .with_keyword_mode(Some("-kb".into()))
        .with_tag(Some(CvsTag::branch("dev")));

    let op = store.begin_operation();
    store.set_resource_sync(&p("a/x.c"), info.clone()).unwrap();
    store.resource_sync(&p("b/y.c")).unwrap();
    assert_eq!(store.resource_sync(&p("a/x.c")).unwrap(), Some(info));
    op.end().unwrap();
}

#[test]
fn version_tags_and_subseconds_are_stored_as_read_back() {
    let (ws, store) = memory_store();
    ws.create_folder(&p("a"));
    ws.create_folder(&p("b"));
    let stamp = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
    let info = ResourceSyncInfo::new("x.c", "1.3", Some(stamp)).with_tag(Some(CvsTag::version("REL_1")));

    let op = store.begin_operation();
    store.set_resource_sync(&p("a/x.c"), info).unwrap();
    let before = store.resource_sync(&p("a/x.c")).unwrap().unwrap();
    store.resource_sync(&p("b/y.c")).unwrap();
    let after = store.resource_sync(&p("a/x.c")).unwrap().unwrap();
    op.end().unwrap();

    assert_eq!(before, after);
    assert_eq!(after.timestamp, Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()));
    assert_eq!(after.tag, Some(CvsTag::branch("REL_1")));
}

#[test]
fn unwritable_record_is_rejected_and_siblings_stay_readable() {
    let (ws, store) = memory_store();
    ws.create_folder(&p("a"));
    ws.create_folder(&p("b"));
    store
        .set_resource_sync(&p("a/y.c"), ResourceSyncInfo::new("y.c", "1.1", None))
        .unwrap();

    let bad = ResourceSyncInfo::new("x.c", "1.1", None).with_keyword_mode(Some("-k/b".into()));
    assert!(store.set_resource_sync(&p("a/x.c"), bad).is_err());
    let bad_revision = ResourceSyncInfo::new("x.c", "-1.1", None);
    assert!(store.set_resource_sync(&p("a/x.c"), bad_revision).is_err());

    store.resource_sync(&p("b/z.c")).unwrap();
    let sibling = store.resource_sync(&p("a/y.c")).unwrap().unwrap();
    assert_eq!(sibling.revision, "1.1");
    assert!(store.resource_sync(&p("a/x.c")).unwrap().is_none());
}
