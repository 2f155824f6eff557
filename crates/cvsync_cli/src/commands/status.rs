//! Status command implementation.

use super::open_store;
use cvsync_core::{CancellationToken, ResourcePath, SyncClassifier, SyncKind, SyncMetadataStore};
use cvsync_reconcile::{build_base_tree, ReconcileError};
use cvsync_storage::SyncStorage;
use serde::Serialize;
use std::path::Path;

/// One out-of-sync resource.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusEntry {
    /// Path relative to the working copy root.
    pub path: String,
    /// True for folders.
    pub folder: bool,
    /// Readable sync kind.
    pub kind: String,
    /// Raw sync kind bits.
    pub bits: u32,
}

/// Runs the status command.
pub fn run(path: &Path, folder: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let entries = collect(&store, &ResourcePath::new(folder)?)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        _ => {
            if entries.is_empty() {
                println!("No local changes");
            }
            for entry in &entries {
                println!("{} {}", status_letter(SyncKind::from_bits(entry.bits)), entry.path);
            }
        }
    }

    Ok(())
}

/// Classifies everything below `folder` against its base revisions.
pub fn collect<S: SyncStorage>(
    store: &SyncMetadataStore<S>,
    folder: &ResourcePath,
) -> Result<Vec<StatusEntry>, Box<dyn std::error::Error>> {
    let base = build_base_tree(store, folder)?.ok_or_else(|| ReconcileError::NotManaged {
        path: folder.to_string(),
    })?;
    let classified =
        SyncClassifier::new(store).classify_tree(folder, Some(&base), &CancellationToken::new())?;

    Ok(classified
        .into_iter()
        .map(|(resource, kind)| StatusEntry {
            path: resource.path().to_string(),
            folder: resource.is_folder(),
            kind: kind.to_string(),
            bits: kind.bits(),
        })
        .collect())
}

/// Single-letter code in the style of `cvs -n update`.
fn status_letter(kind: SyncKind) -> char {
    if kind.direction() == SyncKind::CONFLICTING {
        return 'C';
    }
    match kind.change() {
        SyncKind::ADDITION => 'A',
        SyncKind::DELETION => 'R',
        SyncKind::CHANGE => 'M',
        _ => '?',
    }
}
