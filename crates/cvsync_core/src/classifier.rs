//! Three-way synchronization classification.
//!
//! Compares the local workspace, the base recorded in the metadata store
//! and a remote node, and produces a [`SyncKind`].
//!
//! ```rust
//! use cvsync_core::{
//!     MemoryWorkspace, RemoteFile, RemoteNode, Resource, ResourcePath, StoreConfig,
//!     SyncClassifier, SyncKind, SyncMetadataStore,
//! };
//! use cvsync_storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let store = SyncMetadataStore::new(
//!     MemoryStorage::new(),
//!     Arc::new(MemoryWorkspace::new()),
//!     StoreConfig::default(),
//! );
//! let readme = ResourcePath::new("README").unwrap();
//! let remote = RemoteNode::File(RemoteFile::new(readme.clone(), "1.4"));
//!
//! let kind = SyncClassifier::new(&store)
//!     .classify(&Resource::File(readme), Some(&remote))
//!     .unwrap();
//! assert_eq!(kind, SyncKind::INCOMING | SyncKind::ADDITION);
//! ```

use crate::cancel::CancellationToken;
use crate::error::{CoreError, CoreResult};
use crate::kind::SyncKind;
use crate::remote::{RemoteFile, RemoteFolder, RemoteNode, ServerSyncState};
use crate::resource::{Resource, ResourcePath};
use crate::store::SyncMetadataStore;
use crate::workspace::{ResourceKind, Workspace};
use chrono::SubsecRound;
use cvsync_codec::ResourceSyncInfo;
use cvsync_storage::SyncStorage;
use std::collections::BTreeMap;
use tracing::debug;

/// Decides whether a local file differs from its recorded base.
pub trait ResourceComparator: Send + Sync {
    /// Returns true if `file` was modified since `base` was recorded.
    ///
    /// # Errors
    ///
    /// Returns an error if the local state cannot be read.
    fn is_modified(
        &self,
        workspace: &dyn Workspace,
        file: &ResourcePath,
        base: &ResourceSyncInfo,
    ) -> CoreResult<bool>;
}

/// Compares the file's modification time with the recorded timestamp.
///
/// A record without a timestamp always counts as modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampComparator;

impl ResourceComparator for TimestampComparator {
    fn is_modified(
        &self,
        workspace: &dyn Workspace,
        file: &ResourcePath,
        base: &ResourceSyncInfo,
    ) -> CoreResult<bool> {
        let Some(recorded) = base.timestamp else {
            return Ok(true);
        };
        // Entries timestamps have whole-second precision
        let modified = workspace.modified_at(file)?.map(|m| m.trunc_subsecs(0));
        Ok(modified != Some(recorded.trunc_subsecs(0)))
    }
}

/// How the classifier combines local, base and remote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComparisonMode {
    /// Local, base and remote.
    #[default]
    ThreeWay,
    /// Local against remote only; no direction is reported.
    TwoWay,
}

/// Classifies resources against a remote tree.
pub struct SyncClassifier<'a, S: SyncStorage> {
    store: &'a SyncMetadataStore<S>,
    comparator: Box<dyn ResourceComparator + 'a>,
    mode: ComparisonMode,
}

impl<'a, S: SyncStorage> SyncClassifier<'a, S> {
    /// Three-way classifier using timestamps to detect local changes.
    pub fn new(store: &'a SyncMetadataStore<S>) -> Self {
        Self {
            store,
            comparator: Box::new(TimestampComparator),
            mode: ComparisonMode::ThreeWay,
        }
    }

    /// Replaces the local modification check.
    #[must_use]
    pub fn with_comparator(mut self, comparator: impl ResourceComparator + 'a) -> Self {
        self.comparator = Box::new(comparator);
        self
    }

    /// Sets the comparison mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ComparisonMode) -> Self {
        self.mode = mode;
        self
    }

    fn workspace(&self) -> &dyn Workspace {
        self.store.workspace()
    }

    /// Classifies one resource.
    ///
    /// A delete on both sides unmanages the file and reports `IN_SYNC`.
    ///
    /// # Errors
    ///
    /// Returns `ClassificationFailed` naming the resource when metadata or
    /// the comparator fails.
    pub fn classify(&self, resource: &Resource, remote: Option<&RemoteNode>) -> CoreResult<SyncKind> {
        let result = match resource {
            Resource::Folder(path) => self.classify_folder(path, remote),
            Resource::File(path) => self.classify_file(path, remote),
        };
        result.map_err(|e| CoreError::classification_failed(resource.path().as_str(), e))
    }

    fn classify_folder(&self, folder: &ResourcePath, remote: Option<&RemoteNode>) -> CoreResult<SyncKind> {
        let exists = self.workspace().kind(folder) == Some(ResourceKind::Folder);
        if self.mode == ComparisonMode::TwoWay {
            return Ok(match (exists, remote.is_some()) {
                (true, false) => SyncKind::DELETION,
                (false, true) => SyncKind::ADDITION,
                _ => SyncKind::IN_SYNC,
            });
        }

        let is_cvs = self.store.is_cvs_folder(folder)?;
        let kind = if !exists {
            match remote {
                // Keep the phantom while it still carries file deletions
                Some(_) if is_cvs && self.phantom_has_files(folder)? => SyncKind::IN_SYNC,
                Some(_) => SyncKind::INCOMING | SyncKind::ADDITION,
                None => SyncKind::IN_SYNC,
            }
        } else {
            match (remote, is_cvs) {
                (None, true) => SyncKind::INCOMING | SyncKind::DELETION,
                (None, false) => SyncKind::OUTGOING | SyncKind::ADDITION,
                (Some(_), false) => SyncKind::CONFLICTING | SyncKind::ADDITION,
                (Some(_), true) => SyncKind::IN_SYNC,
            }
        };
        Ok(kind)
    }

    /// Returns true if the phantom subtree holds any file entry.
    ///
    /// Descent stops at the first folder that has file members.
    fn phantom_has_files(&self, folder: &ResourcePath) -> CoreResult<bool> {
        let members = self.store.members(folder)?;
        let mut folders = Vec::new();
        for member in members {
            match member {
                Resource::File(path) => {
                    if self.store.resource_sync(&path)?.is_some() {
                        return Ok(true);
                    }
                }
                Resource::Folder(path) => folders.push(path),
            }
        }
        for child in folders {
            if self.phantom_has_files(&child)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn classify_file(&self, file: &ResourcePath, remote: Option<&RemoteNode>) -> CoreResult<SyncKind> {
        let local = self.workspace().kind(file) == Some(ResourceKind::File);
        let record = self.store.resource_sync(file)?;
        let remote_file = remote.and_then(RemoteNode::as_file);

        let local_matches_remote = match (&record, remote_file) {
            (Some(info), Some(remote)) if local => self.local_matches_remote(file, info, remote)?,
            _ => false,
        };

        if self.mode == ComparisonMode::TwoWay {
            return Ok(match (local, remote.is_some()) {
                (true, false) => SyncKind::DELETION,
                (false, true) => SyncKind::ADDITION,
                (true, true) if !local_matches_remote => SyncKind::CHANGE,
                _ => SyncKind::IN_SYNC,
            });
        }

        // An added or folder record has no base revision
        let base = record
            .as_ref()
            .filter(|info| !info.is_added() && !info.is_directory());

        let mut kind = match (base, local, remote) {
            (None, false, None) => SyncKind::IN_SYNC,
            (None, true, None) => SyncKind::OUTGOING | SyncKind::ADDITION,
            (None, false, Some(_)) => SyncKind::INCOMING | SyncKind::ADDITION,
            (None, true, Some(_)) => {
                let mut kind = SyncKind::CONFLICTING | SyncKind::ADDITION;
                if local_matches_remote {
                    kind |= SyncKind::PSEUDO_CONFLICT;
                }
                kind
            }
            (Some(_), false, None) => {
                SyncKind::CONFLICTING | SyncKind::DELETION | SyncKind::PSEUDO_CONFLICT
            }
            (Some(base), false, Some(_)) => {
                if base_matches_remote(base, remote_file) {
                    SyncKind::OUTGOING | SyncKind::DELETION
                } else {
                    SyncKind::CONFLICTING | SyncKind::CHANGE
                }
            }
            (Some(base), true, None) => {
                if self.local_matches_base(file, base)? {
                    SyncKind::INCOMING | SyncKind::DELETION
                } else {
                    SyncKind::CONFLICTING | SyncKind::CHANGE
                }
            }
            (Some(base), true, Some(_)) => {
                match (
                    self.local_matches_base(file, base)?,
                    base_matches_remote(base, remote_file),
                ) {
                    (true, true) => SyncKind::IN_SYNC,
                    (true, false) => SyncKind::INCOMING | SyncKind::CHANGE,
                    (false, true) => SyncKind::OUTGOING | SyncKind::CHANGE,
                    (false, false) => {
                        let mut kind = SyncKind::CONFLICTING | SyncKind::CHANGE;
                        if local_matches_remote {
                            kind |= SyncKind::PSEUDO_CONFLICT;
                        }
                        kind
                    }
                }
            }
        };

        if !kind.contains(SyncKind::PSEUDO_CONFLICT) {
            match remote_file.map(|f| f.server_state) {
                Some(ServerSyncState::Conflict) => kind |= SyncKind::MANUAL_CONFLICT,
                Some(ServerSyncState::MergeableConflict) => kind |= SyncKind::AUTOMERGE_CONFLICT,
                _ => {}
            }
        }

        if kind == SyncKind::CONFLICTING | SyncKind::DELETION | SyncKind::PSEUDO_CONFLICT {
            debug!(file = %file, "deleted on both sides, unmanaging");
            self.store.delete_resource_sync(file)?;
            kind = SyncKind::IN_SYNC;
        }
        Ok(kind)
    }

    fn local_matches_base(&self, file: &ResourcePath, base: &ResourceSyncInfo) -> CoreResult<bool> {
        if base.is_deleted() || base.is_merged() {
            return Ok(false);
        }
        Ok(!self.comparator.is_modified(self.workspace(), file, base)?)
    }

    fn local_matches_remote(
        &self,
        file: &ResourcePath,
        info: &ResourceSyncInfo,
        remote: &RemoteFile,
    ) -> CoreResult<bool> {
        if info.is_added() || !self.local_matches_base(file, info)? {
            return Ok(false);
        }
        Ok(remote.revision.as_deref() == Some(info.revision.as_str()))
    }

    /// Records `remote` as the base of the local file, which then
    /// classifies as `IN_SYNC`.
    ///
    /// With no remote, the record is dropped; that requires the local file
    /// to be gone too.
    ///
    /// # Errors
    ///
    /// Returns `InvalidOperation` when only one side exists or the remote
    /// revision is unknown.
    pub fn make_in_sync(&self, file: &ResourcePath, remote: Option<&RemoteFile>) -> CoreResult<()> {
        let local = self.workspace().kind(file) == Some(ResourceKind::File);
        match (local, remote) {
            (false, None) => self.store.delete_resource_sync(file),
            (true, Some(remote)) => {
                let modified = self.workspace().modified_at(file)?;
                let info = self.base_from_remote(file, remote, modified)?;
                self.store.set_resource_sync(file, info)
            }
            _ => Err(CoreError::invalid_operation(format!(
                "{file} cannot be made in sync when only one side exists"
            ))),
        }
    }

    /// Records `remote` as the base while keeping local changes, so the
    /// file classifies as outgoing.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote revision is unknown or the record
    /// cannot be written.
    pub fn make_outgoing(&self, file: &ResourcePath, remote: Option<&RemoteFile>) -> CoreResult<()> {
        let local = self.workspace().kind(file) == Some(ResourceKind::File);
        match (local, remote) {
            (true, None) => self
                .store
                .set_resource_sync(file, ResourceSyncInfo::added(file.name())),
            (false, None) => self.store.delete_resource_sync(file),
            (true, Some(remote)) => {
                // No timestamp, so the local copy counts as modified
                let info = self.base_from_remote(file, remote, None)?;
                self.store.set_resource_sync(file, info)
            }
            (false, Some(remote)) => {
                let info = self.base_from_remote(file, remote, None)?;
                self.store.set_resource_sync(file, info.convert_to_deletion())
            }
        }
    }

    fn base_from_remote(
        &self,
        file: &ResourcePath,
        remote: &RemoteFile,
        timestamp: Option<chrono::DateTime<chrono::Utc>>,
    ) -> CoreResult<ResourceSyncInfo> {
        let revision = remote.revision.clone().ok_or_else(|| {
            CoreError::invalid_operation(format!("remote revision of {file} is unknown"))
        })?;
        let previous = self.store.resource_sync(file)?;
        let permissions = previous.and_then(|info| info.permissions);
        Ok(ResourceSyncInfo::new(file.name(), revision, timestamp)
            .with_tag(remote.tag.clone())
            .with_keyword_mode(remote.keyword_mode.clone())
            .with_permissions(permissions))
    }

    /// Classifies every resource below `root` that is out of sync.
    ///
    /// Walks the union of local members, phantoms and remote children.
    /// Ignored resources that exist only locally are skipped. The walk runs
    /// as one store operation.
    ///
    /// # Errors
    ///
    /// Returns the first classification failure, or `Cancelled`.
    pub fn classify_tree(
        &self,
        root: &ResourcePath,
        remote: Option<&RemoteFolder>,
        cancel: &CancellationToken,
    ) -> CoreResult<Vec<(Resource, SyncKind)>> {
        let op = self.store.begin_operation();
        let mut out = Vec::new();
        let walked = self.walk(root, remote, cancel, &mut out);
        let ended = op.end();
        walked?;
        ended?;
        debug!(root = %root, out_of_sync = out.len(), "classified tree");
        Ok(out)
    }

    fn walk(
        &self,
        folder: &ResourcePath,
        remote: Option<&RemoteFolder>,
        cancel: &CancellationToken,
        out: &mut Vec<(Resource, SyncKind)>,
    ) -> CoreResult<()> {
        cancel.check()?;

        let mut children: BTreeMap<String, (Option<Resource>, Option<&RemoteNode>)> = BTreeMap::new();
        let local_exists = self.workspace().kind(folder) == Some(ResourceKind::Folder)
            || self.store.is_cvs_folder(folder)?;
        if local_exists {
            for member in self.store.members(folder)? {
                children.insert(member.name().to_string(), (Some(member), None));
            }
        }
        if let Some(remote) = remote {
            for (name, node) in &remote.children {
                children.entry(name.clone()).or_default().1 = Some(node);
            }
        }

        for (name, (local, remote_node)) in children {
            let path = folder.join(&name);
            let resource = match (local, remote_node) {
                (Some(resource), _) => resource,
                (None, Some(node)) if node.is_folder() => Resource::Folder(path.clone()),
                (None, _) => Resource::File(path.clone()),
            };
            if remote_node.is_none()
                && self.store.resource_sync(&path)?.is_none()
                && self.store.is_ignored(&path)?
            {
                continue;
            }

            let kind = self.classify(&resource, remote_node)?;
            if !kind.is_in_sync() {
                out.push((resource.clone(), kind));
            }
            if resource.is_folder() {
                self.walk(&path, remote_node.and_then(RemoteNode::as_folder), cancel, out)?;
            }
        }
        Ok(())
    }
}

fn base_matches_remote(base: &ResourceSyncInfo, remote: Option<&RemoteFile>) -> bool {
    remote.is_some_and(|remote| remote.revision.as_deref() == Some(base.revision.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::workspace::MemoryWorkspace;
    use chrono::{TimeZone, Utc};
    use cvsync_codec::FolderSyncInfo;
    use cvsync_storage::MemoryStorage;
    use std::sync::Arc;

    fn p(path: &str) -> ResourcePath {
        ResourcePath::new(path).unwrap()
    }

    fn setup() -> (Arc<MemoryWorkspace>, SyncMetadataStore<MemoryStorage>) {
        let ws = Arc::new(MemoryWorkspace::new());
        let store = SyncMetadataStore::new(MemoryStorage::new(), ws.clone(), StoreConfig::default());
        (ws, store)
    }

    fn remote_file(path: &str, revision: &str) -> RemoteNode {
        RemoteNode::File(RemoteFile::new(p(path), revision))
    }

    fn remote_folder(path: &str) -> RemoteNode {
        RemoteNode::Folder(RemoteFolder::new(p(path), None))
    }

    /// A managed file whose timestamp matches the recorded one.
    fn clean_file(ws: &MemoryWorkspace, store: &SyncMetadataStore<MemoryStorage>, path: &str, rev: &str) {
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ws.create_file_at(&p(path), b"text", when);
        let name = p(path).name().to_string();
        store
            .set_resource_sync(&p(path), ResourceSyncInfo::new(name, rev, Some(when)))
            .unwrap();
    }

    #[test]
    fn unmanaged_local_folder_against_remote_conflicts() {
        let (ws, store) = setup();
        ws.create_folder(&p("proj/src"));
        let kind = SyncClassifier::new(&store)
            .classify(&Resource::Folder(p("proj/src")), Some(&remote_folder("proj/src")))
            .unwrap();
        assert_eq!(kind, SyncKind::CONFLICTING | SyncKind::ADDITION);
    }

    #[test]
    fn managed_folder_is_in_sync_whatever_its_children() {
        let (ws, store) = setup();
        ws.create_file(&p("src/junk.c"), b"");
        store
            .set_folder_sync(&p("src"), FolderSyncInfo::new("r", "proj/src"))
            .unwrap();
        let classifier = SyncClassifier::new(&store);
        let kind = classifier
            .classify(&Resource::Folder(p("src")), Some(&remote_folder("src")))
            .unwrap();
        assert_eq!(kind, SyncKind::IN_SYNC);
        let kind = classifier.classify(&Resource::Folder(p("src")), None).unwrap();
        assert_eq!(kind, SyncKind::INCOMING | SyncKind::DELETION);
    }

    #[test]
    fn local_only_folder_is_outgoing_addition() {
        let (ws, store) = setup();
        ws.create_folder(&p("new"));
        let kind = SyncClassifier::new(&store)
            .classify(&Resource::Folder(p("new")), None)
            .unwrap();
        assert_eq!(kind, SyncKind::OUTGOING | SyncKind::ADDITION);
    }

    #[test]
    fn missing_folder_cases() {
        let (_ws, store) = setup();
        let classifier = SyncClassifier::new(&store);
        let folder = Resource::Folder(p("gone"));
        assert_eq!(
            classifier.classify(&folder, Some(&remote_folder("gone"))).unwrap(),
            SyncKind::INCOMING | SyncKind::ADDITION
        );
        assert_eq!(classifier.classify(&folder, None).unwrap(), SyncKind::IN_SYNC);
    }

    #[test]
    fn phantom_folder_with_deletions_stays_in_sync() {
        let (ws, store) = setup();
        ws.create_file(&p("src/lib/a.c"), b"");
        store
            .set_folder_sync(&p("src"), FolderSyncInfo::new("r", "proj/src"))
            .unwrap();
        store
            .set_folder_sync(&p("src/lib"), FolderSyncInfo::new("r", "proj/src/lib"))
            .unwrap();
        store
            .set_resource_sync(&p("src/lib/a.c"), ResourceSyncInfo::new("a.c", "1.1", None))
            .unwrap();
        store.prepare_for_deletion(&Resource::Folder(p("src"))).unwrap();
        ws.remove(&p("src"));

        let kind = SyncClassifier::new(&store)
            .classify(&Resource::Folder(p("src")), Some(&remote_folder("src")))
            .unwrap();
        assert_eq!(kind, SyncKind::IN_SYNC);
    }

    #[test]
    fn phantom_folder_without_files_is_incoming() {
        let (ws, store) = setup();
        ws.create_folder(&p("src"));
        store
            .set_folder_sync(&p("src"), FolderSyncInfo::new("r", "proj/src"))
            .unwrap();
        store.prepare_for_deletion(&Resource::Folder(p("src"))).unwrap();
        ws.remove(&p("src"));

        let kind = SyncClassifier::new(&store)
            .classify(&Resource::Folder(p("src")), Some(&remote_folder("src")))
            .unwrap();
        assert_eq!(kind, SyncKind::INCOMING | SyncKind::ADDITION);
    }

    #[test]
    fn clean_file_matching_remote_is_in_sync() {
        let (ws, store) = setup();
        clean_file(&ws, &store, "README", "1.3");
        let kind = SyncClassifier::new(&store)
            .classify(&Resource::File(p("README")), Some(&remote_file("README", "1.3")))
            .unwrap();
        assert_eq!(kind, SyncKind::IN_SYNC);
    }

    #[test]
    fn three_way_file_table() {
        let (ws, store) = setup();
        let classifier = SyncClassifier::new(&store);

        clean_file(&ws, &store, "incoming.c", "1.1");
        assert_eq!(
            classifier
                .classify(&Resource::File(p("incoming.c")), Some(&remote_file("incoming.c", "1.2")))
                .unwrap(),
            SyncKind::INCOMING | SyncKind::CHANGE
        );

        clean_file(&ws, &store, "outgoing.c", "1.1");
        ws.set_modified(&p("outgoing.c"), Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(
            classifier
                .classify(&Resource::File(p("outgoing.c")), Some(&remote_file("outgoing.c", "1.1")))
                .unwrap(),
            SyncKind::OUTGOING | SyncKind::CHANGE
        );
        assert_eq!(
            classifier
                .classify(&Resource::File(p("outgoing.c")), Some(&remote_file("outgoing.c", "1.5")))
                .unwrap(),
            SyncKind::CONFLICTING | SyncKind::CHANGE
        );

        clean_file(&ws, &store, "dropped.c", "1.1");
        assert_eq!(
            classifier.classify(&Resource::File(p("dropped.c")), None).unwrap(),
            SyncKind::INCOMING | SyncKind::DELETION
        );

        ws.create_file(&p("fresh.c"), b"");
        assert_eq!(
            classifier.classify(&Resource::File(p("fresh.c")), None).unwrap(),
            SyncKind::OUTGOING | SyncKind::ADDITION
        );
        assert_eq!(
            classifier
                .classify(&Resource::File(p("fresh.c")), Some(&remote_file("fresh.c", "1.1")))
                .unwrap(),
            SyncKind::CONFLICTING | SyncKind::ADDITION
        );
    }

    #[test]
    fn missing_local_file_with_remote_is_incoming_addition() {
        let (_ws, store) = setup();
        let kind = SyncClassifier::new(&store)
            .classify(&Resource::File(p("README")), Some(&remote_file("README", "1.4")))
            .unwrap();
        assert_eq!(kind, SyncKind::INCOMING | SyncKind::ADDITION);
    }

    #[test]
    fn local_deletion_is_outgoing() {
        let (ws, store) = setup();
        clean_file(&ws, &store, "old.c", "1.2");
        store.prepare_for_deletion(&Resource::File(p("old.c"))).unwrap();
        ws.remove(&p("old.c"));

        let kind = SyncClassifier::new(&store)
            .classify(&Resource::File(p("old.c")), Some(&remote_file("old.c", "1.2")))
            .unwrap();
        assert_eq!(kind, SyncKind::OUTGOING | SyncKind::DELETION);
    }

    #[test]
    fn deleted_on_both_sides_is_unmanaged() {
        let (ws, store) = setup();
        clean_file(&ws, &store, "gone.c", "1.2");
        ws.remove(&p("gone.c"));
        let classifier = SyncClassifier::new(&store);

        let kind = classifier.classify(&Resource::File(p("gone.c")), None).unwrap();
        assert_eq!(kind, SyncKind::IN_SYNC);
        assert_eq!(store.resource_sync(&p("gone.c")).unwrap(), None);
        assert_eq!(
            classifier.classify(&Resource::File(p("gone.c")), None).unwrap(),
            SyncKind::IN_SYNC
        );
    }

    #[test]
    fn server_conflicts_add_flags() {
        let (ws, store) = setup();
        clean_file(&ws, &store, "a.c", "1.1");
        ws.set_modified(&p("a.c"), Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        let classifier = SyncClassifier::new(&store);

        let manual = RemoteNode::File(
            RemoteFile::new(p("a.c"), "1.2").with_server_state(ServerSyncState::Conflict),
        );
        assert_eq!(
            classifier.classify(&Resource::File(p("a.c")), Some(&manual)).unwrap(),
            SyncKind::CONFLICTING | SyncKind::CHANGE | SyncKind::MANUAL_CONFLICT
        );

        let auto = RemoteNode::File(
            RemoteFile::new(p("a.c"), "1.2").with_server_state(ServerSyncState::MergeableConflict),
        );
        assert_eq!(
            classifier.classify(&Resource::File(p("a.c")), Some(&auto)).unwrap(),
            SyncKind::CONFLICTING | SyncKind::CHANGE | SyncKind::AUTOMERGE_CONFLICT
        );
    }

    #[test]
    fn two_way_mode() {
        let (ws, store) = setup();
        clean_file(&ws, &store, "same.c", "1.1");
        let classifier = SyncClassifier::new(&store).with_mode(ComparisonMode::TwoWay);

        assert_eq!(
            classifier
                .classify(&Resource::File(p("same.c")), Some(&remote_file("same.c", "1.1")))
                .unwrap(),
            SyncKind::IN_SYNC
        );
        assert_eq!(
            classifier
                .classify(&Resource::File(p("same.c")), Some(&remote_file("same.c", "1.2")))
                .unwrap(),
            SyncKind::CHANGE
        );
        assert_eq!(
            classifier.classify(&Resource::File(p("same.c")), None).unwrap(),
            SyncKind::DELETION
        );
        assert_eq!(
            classifier
                .classify(&Resource::File(p("other.c")), Some(&remote_file("other.c", "1.1")))
                .unwrap(),
            SyncKind::ADDITION
        );
    }

    struct FailingComparator;

    impl ResourceComparator for FailingComparator {
        fn is_modified(
            &self,
            _workspace: &dyn Workspace,
            file: &ResourcePath,
            _base: &ResourceSyncInfo,
        ) -> CoreResult<bool> {
            Err(CoreError::resource_not_found(file.as_str()))
        }
    }

    #[test]
    fn comparator_failure_names_resource() {
        let (ws, store) = setup();
        clean_file(&ws, &store, "a.c", "1.1");
        let err = SyncClassifier::new(&store)
            .with_comparator(FailingComparator)
            .classify(&Resource::File(p("a.c")), Some(&remote_file("a.c", "1.1")))
            .unwrap_err();
        match err {
            CoreError::ClassificationFailed { path, .. } => assert_eq!(path, "a.c"),
            other => panic!("expected ClassificationFailed, got {other:?}"),
        }
    }

    #[test]
    fn timestamp_comparison_ignores_subseconds() {
        let (ws, _store) = setup();
        let when = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        ws.create_file_at(&p("a.c"), b"text", when);
        let recorded = Utc.timestamp_opt(when.timestamp(), 250_000_000).unwrap();
        let base = ResourceSyncInfo::new("a.c", "1.1", Some(recorded));

        assert!(!TimestampComparator.is_modified(&*ws, &p("a.c"), &base).unwrap());

        ws.set_modified(&p("a.c"), when + chrono::Duration::seconds(1));
        assert!(TimestampComparator.is_modified(&*ws, &p("a.c"), &base).unwrap());
    }

    #[test]
    fn make_in_sync_and_outgoing() {
        let (ws, store) = setup();
        ws.create_file(&p("a.c"), b"local");
        let remote = RemoteFile::new(p("a.c"), "1.7");
        let node = RemoteNode::File(remote.clone());
        let classifier = SyncClassifier::new(&store);

        classifier.make_in_sync(&p("a.c"), Some(&remote)).unwrap();
        assert_eq!(
            classifier.classify(&Resource::File(p("a.c")), Some(&node)).unwrap(),
            SyncKind::IN_SYNC
        );

        classifier.make_outgoing(&p("a.c"), Some(&remote)).unwrap();
        assert_eq!(
            classifier.classify(&Resource::File(p("a.c")), Some(&node)).unwrap(),
            SyncKind::OUTGOING | SyncKind::CHANGE
        );

        assert!(classifier.make_in_sync(&p("a.c"), None).is_err());
        assert!(classifier
            .make_in_sync(&p("a.c"), Some(&RemoteFile::pending(p("a.c"))))
            .is_err());
    }

    #[test]
    fn classify_tree_reports_out_of_sync_resources() {
        let (ws, store) = setup();
        store
            .set_folder_sync(&ResourcePath::root(), FolderSyncInfo::new("r", "proj"))
            .unwrap();
        clean_file(&ws, &store, "same.c", "1.1");
        clean_file(&ws, &store, "stale.c", "1.1");
        ws.create_file(&p("new.c"), b"");
        ws.create_file(&p("new.o"), b"");

        let mut remote = RemoteFolder::new(ResourcePath::root(), None);
        remote.insert(remote_file("same.c", "1.1"));
        remote.insert(remote_file("stale.c", "1.2"));
        remote.insert(remote_file("incoming.c", "1.1"));

        let result = SyncClassifier::new(&store)
            .classify_tree(&ResourcePath::root(), Some(&remote), &CancellationToken::new())
            .unwrap();

        assert_eq!(
            result,
            vec![
                (Resource::File(p("incoming.c")), SyncKind::INCOMING | SyncKind::ADDITION),
                (Resource::File(p("new.c")), SyncKind::OUTGOING | SyncKind::ADDITION),
                (Resource::File(p("stale.c")), SyncKind::INCOMING | SyncKind::CHANGE),
            ]
        );
    }

    #[test]
    fn classify_tree_honours_cancellation() {
        let (_ws, store) = setup();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = SyncClassifier::new(&store)
            .classify_tree(&ResourcePath::root(), None, &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
