//! Fuzz testing harnesses for CVSync.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks.

use crate::fixtures::TestProject;
use cvsync_codec::{
    decode_entries, decode_folder_binding, decode_ignores, encode_entries, ResourceSyncInfo,
};
use cvsync_core::{Resource, ResourcePath, SyncClassifier};

/// Fuzz target for record decoding.
///
/// Tests that arbitrary byte sequences either decode or return a proper
/// error, never panic.
pub fn fuzz_record_decode(data: &[u8]) {
    let _ = decode_entries(data);
    let _ = decode_folder_binding(data);
    let _ = decode_ignores(data);
}

/// Fuzz target for Entries roundtrip.
///
/// Anything that decodes must re-encode to bytes that decode to the same
/// records.
pub fn fuzz_entries_roundtrip(data: &[u8]) {
    let Ok(records) = decode_entries(data) else {
        return;
    };
    let Ok(encoded) = encode_entries(&records) else {
        return;
    };
    let decoded = decode_entries(&encoded).expect("Re-encoded entries must decode");
    assert_eq!(records.len(), decoded.len(), "Roundtrip changed record count");
    for (a, b) in records.iter().zip(&decoded) {
        assert_eq!(a.name, b.name, "Roundtrip mismatch");
        assert_eq!(a.revision, b.revision, "Roundtrip mismatch");
        assert_eq!(a.entry_type, b.entry_type, "Roundtrip mismatch");
    }
}

/// Fuzz target for store operations.
///
/// Tests that arbitrary operation sequences don't cause panics and that
/// classification stays total.
pub fn fuzz_store_operations(data: &[u8]) {
    let project = TestProject::new();
    let folders = [ResourcePath::root(), project.bind_folder("a"), project.bind_folder("a/b")];

    for chunk in data.chunks(3) {
        let [op, target, arg] = match chunk {
            [op, target, arg] => [*op, *target, *arg],
            _ => return,
        };
        let folder = &folders[usize::from(target) % folders.len()];
        let name = format!("f{}", arg % 8);
        let file = folder.join(&name);

        match op % 6 {
            0 => {
                project.workspace.create_file(&file, &[arg]);
                let _ = project.store.set_resource_sync(
                    &file,
                    ResourceSyncInfo::new(name, format!("1.{}", arg % 5 + 1), None),
                );
            }
            1 => {
                project.workspace.create_file(&file, &[arg]);
                let _ = project
                    .store
                    .set_resource_sync(&file, ResourceSyncInfo::added(name));
            }
            2 => {
                let _ = project.store.prepare_for_deletion(&Resource::File(file.clone()));
                project.workspace.remove(&file);
            }
            3 => {
                let _ = project.store.delete_resource_sync(&file);
            }
            4 => {
                if !folder.is_root() {
                    let _ = project.store.prepare_for_deletion(&Resource::Folder(folder.clone()));
                    project.workspace.remove(folder);
                }
            }
            _ => {
                project.workspace.create_folder(folder);
                let _ = project.store.resource_created(&Resource::Folder(folder.clone()));
            }
        }
    }

    let classifier = SyncClassifier::new(&project.store);
    for folder in &folders {
        for name in (0..8).map(|i| format!("f{}", i)) {
            let _ = classifier.classify(&Resource::File(folder.join(&name)), None);
        }
    }
}
