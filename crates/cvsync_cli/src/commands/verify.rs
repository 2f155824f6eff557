//! Verify command implementation.

use cvsync_codec::{decode_entries, decode_folder_binding, decode_ignores};
use cvsync_storage::{FileStorage, RecordKind, Slot, SyncStorage};
use std::path::Path;
use tracing::debug;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records checked.
    pub records_checked: usize,
    /// Number of valid records.
    pub valid_records: usize,
    /// Number of corrupt records.
    pub corrupt_records: usize,
    /// List of errors found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.corrupt_records == 0 && self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, phantoms: bool) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying working copy at {:?}", path);
    println!();

    let storage = FileStorage::open(path)?;

    println!("Checking folder records...");
    let live = verify_slot(&storage, Slot::Live)?;
    print_result("Live", &live);

    let mut phantom = VerifyResult::default();
    if phantoms {
        println!("Checking phantom records...");
        phantom = verify_slot(&storage, Slot::Phantom)?;
        print_result("Phantom", &phantom);
    }

    println!();
    if live.is_ok() && phantom.is_ok() {
        println!("✓ Metadata verification passed");
        Ok(())
    } else {
        println!("✗ Metadata verification failed");
        Err("Verification failed".into())
    }
}

/// Decodes every record stored in `slot`.
pub fn verify_slot(
    storage: &dyn SyncStorage,
    slot: Slot,
) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let mut result = VerifyResult::default();
    let mut folders = storage.folders(slot)?;
    folders.sort();

    for folder in folders {
        for kind in RecordKind::ALL {
            let Some(bytes) = storage.read(slot, &folder, kind)? else {
                continue;
            };
            result.records_checked += 1;
            let decoded = match kind {
                RecordKind::FolderBinding => decode_folder_binding(&bytes).map(|_| ()),
                RecordKind::ResourceEntries => decode_entries(&bytes).map(|_| ()),
                RecordKind::IgnorePatterns => decode_ignores(&bytes).map(|_| ()),
            };
            match decoded {
                Ok(()) => result.valid_records += 1,
                Err(e) => {
                    result.corrupt_records += 1;
                    result.errors.push(format!("{}: {:?}: {}", display_folder(&folder), kind, e));
                }
            }
        }
        debug!(folder = %folder, "verified folder records");
    }

    Ok(result)
}

fn display_folder(folder: &str) -> &str {
    if folder.is_empty() {
        "/"
    } else {
        folder
    }
}

fn print_result(name: &str, result: &VerifyResult) {
    println!(
        "  {} records checked: {}, valid: {}, corrupt: {}",
        name, result.records_checked, result.valid_records, result.corrupt_records
    );
    for error in &result.errors {
        println!("    ERROR: {}", error);
    }
}
