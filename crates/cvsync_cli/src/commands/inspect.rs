//! Inspect command implementation.

use super::open_store;
use cvsync_core::{Resource, ResourcePath, SyncMetadataStore};
use cvsync_storage::{Slot, SyncStorage};
use serde::Serialize;
use std::path::Path;

/// Working copy inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Working copy path.
    pub path: String,
    /// Number of bound folders.
    pub folder_count: usize,
    /// Number of folders only present as phantom records.
    pub phantom_count: usize,
    /// Per-folder details.
    pub folders: Vec<FolderReport>,
}

/// Metadata of a single folder.
#[derive(Debug, Serialize)]
pub struct FolderReport {
    /// Path relative to the working copy root.
    pub path: String,
    /// True if the folder was deleted and only its records remain.
    pub phantom: bool,
    /// Connection string.
    pub root: String,
    /// Repository path.
    pub repository: String,
    /// Sticky tag, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Whether the folder is static.
    pub is_static: bool,
    /// Files at a committed revision.
    pub files: usize,
    /// Files scheduled for addition.
    pub added: usize,
    /// Files scheduled for removal.
    pub removed: usize,
    /// Subfolder entries.
    pub subfolders: usize,
    /// Folder-local ignore patterns.
    pub ignores: Vec<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, phantoms: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(path)?;
    let result = collect(&store, &path.display().to_string(), phantoms)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Gathers folder reports from the store.
pub fn collect<S: SyncStorage>(
    store: &SyncMetadataStore<S>,
    path: &str,
    phantoms: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let mut folders = Vec::new();

    let mut live = store.storage().folders(Slot::Live)?;
    live.sort();
    for folder in live {
        if let Some(report) = report_folder(store, &ResourcePath::new(&folder)?, false)? {
            folders.push(report);
        }
    }

    let phantom_folders = store.storage().folders(Slot::Phantom)?;
    let phantom_count = phantom_folders.len();
    if phantoms {
        let mut phantom_folders = phantom_folders;
        phantom_folders.sort();
        for folder in phantom_folders {
            if let Some(report) = report_folder(store, &ResourcePath::new(&folder)?, true)? {
                folders.push(report);
            }
        }
    }

    Ok(InspectResult {
        path: path.to_string(),
        folder_count: folders.iter().filter(|f| !f.phantom).count(),
        phantom_count,
        folders,
    })
}

fn report_folder<S: SyncStorage>(
    store: &SyncMetadataStore<S>,
    folder: &ResourcePath,
    phantom: bool,
) -> Result<Option<FolderReport>, Box<dyn std::error::Error>> {
    let Some(binding) = store.folder_sync(folder)? else {
        return Ok(None);
    };

    let mut report = FolderReport {
        path: folder.to_string(),
        phantom,
        root: binding.root,
        repository: binding.repository,
        tag: binding.tag.map(|t| t.name),
        is_static: binding.is_static,
        files: 0,
        added: 0,
        removed: 0,
        subfolders: 0,
        ignores: store.ignored_patterns(folder)?,
    };

    for member in store.members(folder)? {
        let Some(info) = store.resource_sync(member.path())? else {
            continue;
        };
        match member {
            Resource::Folder(_) => report.subfolders += 1,
            Resource::File(_) if info.is_added() => report.added += 1,
            Resource::File(_) if info.is_deleted() => report.removed += 1,
            Resource::File(_) => report.files += 1,
        }
    }
    Ok(Some(report))
}

fn print_text_output(result: &InspectResult) {
    println!("CVSync Working Copy Inspection");
    println!("==============================");
    println!();
    println!("Path: {}", result.path);
    println!("  Bound folders:   {}", result.folder_count);
    println!("  Phantom folders: {}", result.phantom_count);

    for folder in &result.folders {
        println!();
        let marker = if folder.phantom { " (phantom)" } else { "" };
        println!("{}{}", folder.path, marker);
        println!("  Repository: {}{}", folder.root, format_repository(&folder.repository));
        if let Some(tag) = &folder.tag {
            println!("  Tag:        {}", tag);
        }
        if folder.is_static {
            println!("  Static:     yes");
        }
        println!(
            "  Entries:    {} files, {} added, {} removed, {} folders",
            folder.files, folder.added, folder.removed, folder.subfolders
        );
        if !folder.ignores.is_empty() {
            println!("  Ignores:    {}", folder.ignores.join(" "));
        }
    }
}

fn format_repository(repository: &str) -> String {
    if repository.is_empty() {
        String::new()
    } else {
        format!(" {}", repository)
    }
}
