//! Test fixtures and project helpers.
//!
//! Provides convenience functions for setting up working copies with sync
//! metadata and common test scenarios.

use chrono::Duration;
use cvsync_codec::{FolderSyncInfo, ResourceSyncInfo};
use cvsync_core::{
    FsWorkspace, MemoryWorkspace, Resource, ResourcePath, StoreConfig, SyncMetadataStore,
    Workspace,
};
use cvsync_storage::{FileStorage, MemoryStorage};
use std::sync::Arc;
use tempfile::TempDir;

/// Connection string used by fixtures.
pub const TEST_ROOT: &str = ":local:/var/cvs";

/// Repository path of the fixture project root.
pub const TEST_REPOSITORY: &str = "proj";

/// Parses a path, panicking on invalid input.
pub fn path(text: &str) -> ResourcePath {
    ResourcePath::new(text).expect("Invalid fixture path")
}

/// An in-memory working copy whose root is bound to [`TEST_REPOSITORY`].
pub struct TestProject {
    /// The resource tree.
    pub workspace: Arc<MemoryWorkspace>,
    /// The persistence provider, shared with the store.
    pub storage: Arc<MemoryStorage>,
    /// The metadata store.
    pub store: SyncMetadataStore<Arc<MemoryStorage>>,
}

impl TestProject {
    /// Creates a project with a bound root.
    pub fn new() -> Self {
        let project = Self::unbound();
        project
            .store
            .set_folder_sync(
                &ResourcePath::root(),
                FolderSyncInfo::new(TEST_ROOT, TEST_REPOSITORY),
            )
            .expect("Failed to bind project root");
        project
    }

    /// Creates a project with no metadata at all.
    pub fn unbound() -> Self {
        let workspace = Arc::new(MemoryWorkspace::new());
        let storage = Arc::new(MemoryStorage::new());
        let store = SyncMetadataStore::new(
            Arc::clone(&storage),
            workspace.clone(),
            StoreConfig::default(),
        );
        Self {
            workspace,
            storage,
            store,
        }
    }

    /// Creates `folder` and binds it below its parent's repository path.
    pub fn bind_folder(&self, folder: &str) -> ResourcePath {
        let folder = path(folder);
        self.workspace.create_folder(&folder);
        let repository = format!("{}/{}", TEST_REPOSITORY, folder.as_str());
        self.store
            .set_folder_sync(&folder, FolderSyncInfo::new(TEST_ROOT, repository))
            .expect("Failed to bind folder");
        folder
    }

    /// Creates a clean checked-out file at `revision`, binding missing
    /// parent folders on the way.
    pub fn checkout(&self, file: &str, revision: &str) -> ResourcePath {
        let file = path(file);
        self.bind_parents(&file);
        self.workspace.create_file(&file, revision.as_bytes());
        let stamp = self
            .workspace
            .modified_at(&file)
            .expect("Failed to read modification time");
        self.store
            .set_resource_sync(&file, ResourceSyncInfo::new(file.name(), revision, stamp))
            .expect("Failed to record checkout");
        file
    }

    /// Creates a file scheduled for addition.
    pub fn add_file(&self, file: &str) -> ResourcePath {
        let file = path(file);
        self.bind_parents(&file);
        self.workspace.create_file(&file, b"new");
        self.store
            .set_resource_sync(&file, ResourceSyncInfo::added(file.name()))
            .expect("Failed to record addition");
        file
    }

    /// Creates a file with no sync record.
    pub fn unmanaged_file(&self, file: &str) -> ResourcePath {
        let file = path(file);
        self.workspace.create_file(&file, b"unmanaged");
        file
    }

    /// Moves the modification time of `file` forward by a minute.
    pub fn touch(&self, file: &ResourcePath) {
        let stamp = self
            .workspace
            .modified_at(file)
            .ok()
            .flatten()
            .expect("Cannot touch a missing file");
        self.workspace.set_modified(file, stamp + Duration::seconds(60));
    }

    /// Deletes `file` from the workspace after scheduling its removal.
    pub fn remove_file(&self, file: &ResourcePath) {
        self.store
            .prepare_for_deletion(&Resource::File(file.clone()))
            .expect("Failed to prepare deletion");
        self.workspace.remove(file);
    }

    /// Deletes `folder` from the workspace, keeping its records as phantoms.
    pub fn remove_folder(&self, folder: &ResourcePath) {
        self.store
            .prepare_for_deletion(&Resource::Folder(folder.clone()))
            .expect("Failed to prepare deletion");
        self.workspace.remove(folder);
    }

    fn bind_parents(&self, file: &ResourcePath) {
        let mut missing = Vec::new();
        let mut current = file.parent();
        while let Some(folder) = current {
            if folder.is_root() || self.store.is_cvs_folder(&folder).unwrap_or(false) {
                break;
            }
            current = folder.parent();
            missing.push(folder);
        }
        for folder in missing.into_iter().rev() {
            self.bind_folder(folder.as_str());
        }
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A working copy on disk with automatic cleanup.
pub struct DiskProject {
    /// The metadata store.
    pub store: SyncMetadataStore<FileStorage>,
    /// The resource tree.
    pub workspace: Arc<FsWorkspace>,
    dir: TempDir,
}

impl DiskProject {
    /// Creates an empty project in a temporary directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let (store, workspace) = Self::open_at(&dir);
        Self {
            store,
            workspace,
            dir,
        }
    }

    /// Returns the project root on disk.
    pub fn root(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Drops the store and opens a fresh one over the same directory.
    pub fn reopen(self) -> Self {
        let Self { store, dir, .. } = self;
        drop(store);
        let (store, workspace) = Self::open_at(&dir);
        Self {
            store,
            workspace,
            dir,
        }
    }

    fn open_at(dir: &TempDir) -> (SyncMetadataStore<FileStorage>, Arc<FsWorkspace>) {
        let workspace = Arc::new(FsWorkspace::open(dir.path()).expect("Failed to open workspace"));
        let storage = FileStorage::open(dir.path()).expect("Failed to open storage");
        let store = SyncMetadataStore::new(storage, workspace.clone(), StoreConfig::default());
        (store, workspace)
    }
}

impl Default for DiskProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a test with a fresh in-memory project.
///
/// # Example
///
/// ```rust
/// use cvsync_testkit::with_project;
///
/// with_project(|project| {
///     project.bind_folder("lib");
/// });
/// ```
pub fn with_project<F, R>(f: F) -> R
where
    F: FnOnce(&TestProject) -> R,
{
    let project = TestProject::new();
    f(&project)
}

/// Runs a test with a fresh project on disk.
pub fn with_disk_project<F, R>(f: F) -> R
where
    F: FnOnce(&DiskProject) -> R,
{
    let project = DiskProject::new();
    f(&project)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// A project with `folders` bound folders of `files` clean files each.
    pub fn checked_out_tree(folders: usize, files: usize) -> TestProject {
        let project = TestProject::new();
        for f in 0..folders {
            let folder = format!("dir{}", f);
            project.bind_folder(&folder);
            for i in 0..files {
                project.checkout(&format!("{}/file{}.c", folder, i), "1.1");
            }
        }
        project
    }

    /// A project holding one file of each local state below `src`:
    /// clean, modified, added, removed and unmanaged.
    pub fn mixed_changes() -> TestProject {
        let project = TestProject::new();
        project.checkout("src/clean.c", "1.1");
        let modified = project.checkout("src/modified.c", "1.2");
        project.touch(&modified);
        project.add_file("src/added.c");
        let removed = project.checkout("src/removed.c", "1.3");
        project.remove_file(&removed);
        project.unmanaged_file("src/notes.txt");
        project
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_binds_parents() {
        let project = TestProject::new();
        let file = project.checkout("a/b/c.txt", "1.7");

        assert!(project.store.is_cvs_folder(&path("a")).unwrap());
        assert!(project.store.is_cvs_folder(&path("a/b")).unwrap());
        let info = project.store.resource_sync(&file).unwrap().unwrap();
        assert_eq!(info.revision, "1.7");
        let binding = project.store.folder_sync(&path("a/b")).unwrap().unwrap();
        assert_eq!(binding.repository, "proj/a/b");
    }

    #[test]
    fn mixed_changes_scenario() {
        let project = scenarios::mixed_changes();
        let removed = project.store.resource_sync(&path("src/removed.c")).unwrap().unwrap();
        assert!(removed.is_deleted());
        assert!(!project.workspace.exists(&path("src/removed.c")));
        assert!(project.store.resource_sync(&path("src/notes.txt")).unwrap().is_none());
    }

    #[test]
    fn disk_project_survives_reopen() {
        let project = DiskProject::new();
        project
            .store
            .set_folder_sync(
                &ResourcePath::root(),
                FolderSyncInfo::new(TEST_ROOT, TEST_REPOSITORY),
            )
            .unwrap();

        let project = project.reopen();
        let binding = project.store.folder_sync(&ResourcePath::root()).unwrap();
        assert_eq!(binding.unwrap().repository, TEST_REPOSITORY);
    }

    #[test]
    fn with_project_provides_bound_root() {
        with_project(|project| {
            assert!(project.store.is_cvs_folder(&ResourcePath::root()).unwrap());
        });
    }
}
