//! Scripted CVS server for reconciliation tests.

use crate::fixtures::{path, TestProject};
use cvsync_core::{CancellationToken, RemoteFolder, Resource, ResourcePath, ServerSyncState, SyncKind};
use cvsync_reconcile::{DeltaEvent, DeltaScript, MockDeltaSource, ReconcileResult, RemoteTreeBuilder};

/// Builds the server side of one synchronization.
///
/// Paths are relative to the project root.
#[derive(Debug, Default)]
pub struct ScriptedServer {
    events: Vec<DeltaEvent>,
    folders: Vec<DeltaScript>,
    revisions: Vec<(ResourcePath, String)>,
}

impl ScriptedServer {
    /// Creates a server that reports no changes.
    pub fn new() -> Self {
        Self::default()
    }

    /// A newer revision of `file` was committed.
    #[must_use]
    pub fn commit(mut self, file: &str, revision: &str) -> Self {
        self.events
            .push(DeltaEvent::file(ServerSyncState::RemoteChanges, file));
        self.revisions.push((path(file), revision.to_string()));
        self
    }

    /// `file` was removed from the repository.
    #[must_use]
    pub fn remove(mut self, file: &str) -> Self {
        self.events.push(DeltaEvent::FileMissing(file.to_string()));
        self
    }

    /// `folder` was removed from the repository.
    #[must_use]
    pub fn remove_folder(mut self, folder: &str) -> Self {
        self.events
            .push(DeltaEvent::DirectoryMissing(folder.to_string()));
        self
    }

    /// A folder unknown to the client was created holding `files`, given as
    /// `(name, revision)` pairs.
    #[must_use]
    pub fn new_folder(mut self, folder: &str, files: &[(&str, &str)]) -> Self {
        let folder_path = path(folder);
        self.events.push(DeltaEvent::new_directory(folder));
        let mut script = DeltaScript::new(folder_path.clone()).narrow();
        for (name, revision) in files {
            script = script.event(DeltaEvent::file(ServerSyncState::UpToDate, *name));
            self.revisions
                .push((folder_path.join(name), revision.to_string()));
        }
        self.folders.push(script);
        self
    }

    /// Turns the recorded changes into a delta source.
    pub fn into_source(self) -> MockDeltaSource {
        let source = MockDeltaSource::new();
        let mut root = DeltaScript::new(ResourcePath::root());
        for event in self.events {
            root = root.event(event);
        }
        source.script(root);
        for script in self.folders {
            source.script(script);
        }
        for (file, revision) in self.revisions {
            source.set_revision(file, revision);
        }
        source
    }
}

impl TestProject {
    /// Builds the remote tree of the whole project against `source`.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation failure, if any.
    pub fn remote_tree(&self, source: &MockDeltaSource) -> ReconcileResult<Option<RemoteFolder>> {
        RemoteTreeBuilder::new(&self.store, source).build_remote_tree(
            &ResourcePath::root(),
            None,
            &CancellationToken::new(),
        )
    }

    /// Reconciles against `source` and classifies the whole project.
    ///
    /// # Errors
    ///
    /// Returns the reconciliation or classification failure, if any.
    pub fn synchronize(&self, source: &MockDeltaSource) -> ReconcileResult<Vec<(Resource, SyncKind)>> {
        RemoteTreeBuilder::new(&self.store, source).synchronize(
            &ResourcePath::root(),
            None,
            &CancellationToken::new(),
        )
    }
}
