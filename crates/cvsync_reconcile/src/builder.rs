//! Remote tree construction from one delta exchange.
//!
//! The builder asks the server only for what differs from the local base,
//! then derives the remote tree from local metadata plus those deltas.
//! Revisions the base cannot supply are fetched afterwards in batches.

use crate::config::ReconcileConfig;
use crate::error::{ReconcileError, ReconcileResult};
use crate::transport::{DeltaListener, DeltaRequest, DeltaSource, RevisionRequest, StatusListener};
use cvsync_codec::{CvsTag, FolderSyncInfo};
use cvsync_core::{
    CancellationToken, RemoteFile, RemoteFolder, RemoteNode, Resource, ResourceKind, ResourcePath,
    ServerSyncState, SyncClassifier, SyncKind, SyncMetadataStore,
};
use cvsync_storage::SyncStorage;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Name of the default branch.
const HEAD: &str = "HEAD";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeltaKind {
    /// A folder the client does not have.
    Folder,
    /// A file the client does not have.
    Added,
    /// A file whose revision differs from the base.
    Unknown,
    /// Gone from the repository.
    Deleted,
}

#[derive(Debug, Clone, Copy)]
struct Delta {
    kind: DeltaKind,
    state: ServerSyncState,
}

/// Deltas of one build, keyed by project path.
#[derive(Debug, Default)]
struct DeltaSet {
    deltas: BTreeMap<ResourcePath, Delta>,
    errors: Vec<ReconcileError>,
    root_missing: bool,
}

impl DeltaSet {
    fn kind(&self, path: &ResourcePath) -> Option<DeltaKind> {
        self.deltas.get(path).map(|d| d.kind)
    }

    fn children_of(&self, folder: &ResourcePath) -> Vec<(ResourcePath, Delta)> {
        self.deltas
            .iter()
            .filter(|(path, _)| path.parent().as_ref() == Some(folder))
            .map(|(path, delta)| (path.clone(), *delta))
            .collect()
    }
}

/// Records listener callbacks of one exchange into a [`DeltaSet`].
struct DeltaCollector<'a> {
    scope: &'a ResourcePath,
    build_root: &'a ResourcePath,
    new_folder: bool,
    set: &'a mut DeltaSet,
    reported: usize,
}

impl DeltaCollector<'_> {
    fn resolve(&mut self, path: &str) -> Option<ResourcePath> {
        match self.scope.resolve(path) {
            Ok(resolved) => {
                self.reported += 1;
                Some(resolved)
            }
            Err(_) => {
                self.set.errors.push(ReconcileError::InvalidPath {
                    path: path.to_string(),
                });
                None
            }
        }
    }
}

impl DeltaListener for DeltaCollector<'_> {
    fn directory_information(&mut self, path: &str, is_new: bool) {
        let Some(folder) = self.resolve(path) else {
            return;
        };
        if !is_new || folder == *self.scope {
            return;
        }
        if self.new_folder && folder.parent().as_ref() != Some(self.scope) {
            return;
        }
        if self.set.kind(&folder) == Some(DeltaKind::Deleted) {
            return;
        }
        self.set.deltas.insert(
            folder,
            Delta {
                kind: DeltaKind::Folder,
                state: ServerSyncState::UpToDate,
            },
        );
    }

    fn directory_does_not_exist(&mut self, path: &str) {
        let Some(folder) = self.resolve(path) else {
            return;
        };
        if folder == *self.build_root {
            self.set.root_missing = true;
        }
        self.set.deltas.insert(
            folder,
            Delta {
                kind: DeltaKind::Deleted,
                state: ServerSyncState::UpToDate,
            },
        );
    }

    fn file_information(&mut self, state: ServerSyncState, path: &str) {
        let Some(file) = self.resolve(path) else {
            return;
        };
        let kind = if self.new_folder {
            DeltaKind::Added
        } else {
            match state {
                ServerSyncState::Conflict
                | ServerSyncState::MergeableConflict
                | ServerSyncState::LocallyDeleted
                | ServerSyncState::RemoteChanges => DeltaKind::Unknown,
                _ => return,
            }
        };

        let state = match self.set.deltas.get(&file) {
            Some(existing) if existing.kind == DeltaKind::Deleted => return,
            Some(existing) if existing.state.is_conflict() && !state.is_conflict() => existing.state,
            _ => state,
        };
        self.set.deltas.insert(file, Delta { kind, state });
    }

    fn file_does_not_exist(&mut self, path: &str) {
        let Some(file) = self.resolve(path) else {
            return;
        };
        self.set.deltas.insert(
            file,
            Delta {
                kind: DeltaKind::Deleted,
                state: ServerSyncState::UpToDate,
            },
        );
    }
}

/// Collects revisions of one batched fetch.
struct RevisionCollector<'a> {
    root: &'a ResourcePath,
    revisions: Vec<(ResourcePath, String)>,
    errors: &'a mut Vec<ReconcileError>,
}

impl StatusListener for RevisionCollector<'_> {
    fn file_status(&mut self, path: &str, revision: &str) {
        match self.root.resolve(path) {
            Ok(file) => self.revisions.push((file, revision.to_string())),
            Err(_) => self.errors.push(ReconcileError::InvalidPath {
                path: path.to_string(),
            }),
        }
    }
}

/// State threaded through one build.
struct Walk<'c> {
    set: DeltaSet,
    tag: Option<CvsTag>,
    /// Tag actually sent to the server; dropped after a no-tag retry.
    fetch_tag: Option<CvsTag>,
    cancel: &'c CancellationToken,
}

/// Builds remote trees from delta exchanges.
///
/// ```rust
/// use cvsync_codec::{FolderSyncInfo, ResourceSyncInfo};
/// use cvsync_core::{
///     CancellationToken, MemoryWorkspace, ResourcePath, ServerSyncState, StoreConfig,
///     SyncMetadataStore,
/// };
/// use cvsync_reconcile::{DeltaEvent, DeltaScript, MockDeltaSource, RemoteTreeBuilder};
/// use cvsync_storage::MemoryStorage;
/// use std::sync::Arc;
///
/// let workspace = Arc::new(MemoryWorkspace::new());
/// let store = SyncMetadataStore::new(MemoryStorage::new(), workspace, StoreConfig::default());
/// let root = ResourcePath::root();
/// store.set_folder_sync(&root, FolderSyncInfo::new(":local:/cvs", "proj")).unwrap();
///
/// let source = MockDeltaSource::new();
/// source.script(
///     DeltaScript::new(root.clone())
///         .event(DeltaEvent::file(ServerSyncState::RemoteChanges, "NEWS")),
/// );
/// source.set_revision(ResourcePath::new("NEWS").unwrap(), "1.2");
///
/// let tree = RemoteTreeBuilder::new(&store, &source)
///     .build_remote_tree(&root, None, &CancellationToken::new())
///     .unwrap()
///     .unwrap();
/// let news = tree.child("NEWS").unwrap().as_file().unwrap();
/// assert_eq!(news.revision.as_deref(), Some("1.2"));
/// ```
pub struct RemoteTreeBuilder<'a, S: SyncStorage, D: DeltaSource + ?Sized> {
    store: &'a SyncMetadataStore<S>,
    source: &'a D,
    config: ReconcileConfig,
}

impl<'a, S: SyncStorage, D: DeltaSource + ?Sized> RemoteTreeBuilder<'a, S, D> {
    /// Creates a builder with the default configuration.
    pub fn new(store: &'a SyncMetadataStore<S>, source: &'a D) -> Self {
        Self {
            store,
            source,
            config: ReconcileConfig::default(),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: ReconcileConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the remote tree of `root` for `tag`.
    ///
    /// Returns `None` if the server reports that `root` does not exist.
    ///
    /// # Errors
    ///
    /// Returns server errors when nothing was discovered, metadata errors,
    /// listener errors collected during the pass, or `Cancelled`.
    pub fn build_remote_tree(
        &self,
        root: &ResourcePath,
        tag: Option<&CvsTag>,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Option<RemoteFolder>> {
        cancel.check()?;
        let op = self.store.begin_operation();
        let result = self.build(root, tag, cancel);
        op.end()?;
        result
    }

    fn build(
        &self,
        root: &ResourcePath,
        tag: Option<&CvsTag>,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Option<RemoteFolder>> {
        let mut walk = Walk {
            set: DeltaSet::default(),
            tag: tag.cloned(),
            fetch_tag: tag.cloned(),
            cancel,
        };

        let request = DeltaRequest {
            root: root.clone(),
            tag: walk.fetch_tag.clone(),
            recursive: true,
        };
        let retried = self.fetch_with_retry(&mut walk, &request, root, false)?;
        if retried {
            walk.fetch_tag = None;
        }
        debug!(root = %root, deltas = walk.set.deltas.len(), "collected deltas");
        if walk.set.root_missing {
            info!(root = %root, "folder does not exist remotely");
            return Ok(None);
        }

        let repository = self.store.folder_sync(root)?.map(|b| b.repository);
        let mut tree = self.build_folder(&mut walk, root, repository)?;
        self.fetch_revisions(&mut walk, root, &mut tree)?;

        ReconcileError::merge(std::mem::take(&mut walk.set.errors))?;
        Ok(Some(tree))
    }

    /// Runs a delta exchange, tolerating server errors once something
    /// was discovered.
    fn fetch_delta(
        &self,
        walk: &mut Walk<'_>,
        request: &DeltaRequest,
        build_root: &ResourcePath,
        new_folder: bool,
    ) -> ReconcileResult<()> {
        let mut collector = DeltaCollector {
            scope: &request.root,
            build_root,
            new_folder,
            set: &mut walk.set,
            reported: 0,
        };
        let result = self.source.fetch_delta(request, &mut collector, walk.cancel);
        let reported = collector.reported;
        match result {
            Err(e) if e.is_server() && reported > 0 => {
                warn!(folder = %request.root, reported, error = %e, "ignoring server error after partial results");
                Ok(())
            }
            other => other,
        }
    }

    /// Runs a delta exchange, retrying once without the tag when the
    /// server claims the tag does not exist. Returns true if it retried.
    fn fetch_with_retry(
        &self,
        walk: &mut Walk<'_>,
        request: &DeltaRequest,
        build_root: &ResourcePath,
        new_folder: bool,
    ) -> ReconcileResult<bool> {
        match self.fetch_delta(walk, request, build_root, new_folder) {
            Ok(()) => Ok(false),
            Err(e) if e.is_no_tag() && request.tag.is_some() => {
                walk.cancel.check()?;
                info!(folder = %request.root, error = %e, "tag not found, retrying without tag");
                let retry = DeltaRequest {
                    tag: None,
                    ..request.clone()
                };
                self.fetch_delta(walk, &retry, build_root, new_folder)?;
                Ok(true)
            }
            Err(e) => Err(e),
        }
    }

    fn has_local_counterpart(&self, folder: &ResourcePath) -> ReconcileResult<bool> {
        Ok(self.store.workspace().kind(folder) == Some(ResourceKind::Folder)
            && self.store.is_cvs_folder(folder)?)
    }

    fn build_folder(
        &self,
        walk: &mut Walk<'_>,
        path: &ResourcePath,
        repository: Option<String>,
    ) -> ReconcileResult<RemoteFolder> {
        walk.cancel.check()?;
        let local = self.has_local_counterpart(path)?;

        if !local {
            let request = DeltaRequest {
                root: path.clone(),
                tag: walk.fetch_tag.clone(),
                recursive: false,
            };
            self.fetch_with_retry(walk, &request, path, true)?;
        }

        let mut folder = RemoteFolder::new(path.clone(), walk.tag.clone());
        folder.repository = match self.store.folder_sync(path)? {
            Some(binding) if local => Some(binding.repository),
            _ => repository,
        };

        if local {
            self.seed_from_local(walk, path, &mut folder)?;
        }

        for (child, delta) in walk.set.children_of(path) {
            let name = child.name().to_string();
            match delta.kind {
                DeltaKind::Folder => {
                    if !folder.child(&name).is_some_and(RemoteNode::is_folder) {
                        folder.insert(RemoteNode::Folder(RemoteFolder::new(child, walk.tag.clone())));
                    }
                }
                DeltaKind::Added | DeltaKind::Unknown => {
                    if folder.child(&name).is_some_and(RemoteNode::is_folder) {
                        continue;
                    }
                    let file = RemoteFile::pending(child)
                        .with_server_state(delta.state)
                        .with_tag(walk.tag.clone());
                    folder.insert(RemoteNode::File(file));
                }
                DeltaKind::Deleted => {
                    folder.remove(&name);
                }
            }
        }

        let subfolders: Vec<String> = folder
            .children
            .iter()
            .filter(|(_, node)| node.is_folder())
            .map(|(name, _)| name.clone())
            .collect();
        for name in subfolders {
            let child_path = path.join(&name);
            let child_repository = folder.repository.as_ref().map(|r| format!("{r}/{name}"));
            let built = self.build_folder(walk, &child_path, child_repository)?;
            if self.should_prune(walk, &built)? {
                debug!(folder = %child_path, "pruned empty remote folder");
                folder.remove(&name);
            } else {
                folder.insert(RemoteNode::Folder(built));
            }
        }
        Ok(folder)
    }

    fn seed_from_local(
        &self,
        walk: &Walk<'_>,
        path: &ResourcePath,
        folder: &mut RemoteFolder,
    ) -> ReconcileResult<()> {
        for member in self.store.members(path)? {
            if walk.set.kind(member.path()) == Some(DeltaKind::Deleted) {
                continue;
            }
            match member {
                Resource::Folder(child) => {
                    // Bound folders missing from the parent's entries are orphans
                    if !self.store.is_cvs_folder(&child)?
                        || self.store.resource_sync(&child)?.is_none()
                    {
                        continue;
                    }
                    folder.insert(RemoteNode::Folder(RemoteFolder::new(child, walk.tag.clone())));
                }
                Resource::File(child) => {
                    let Some(info) = self.store.resource_sync(&child)? else {
                        continue;
                    };
                    if info.is_added() || info.is_deleted() || info.is_directory() {
                        continue;
                    }
                    let mut file = RemoteFile::new(child, info.revision).with_tag(info.tag);
                    file.keyword_mode = info.keyword_mode;
                    folder.insert(RemoteNode::File(file));
                }
            }
        }
        Ok(())
    }

    /// An empty folder is dropped when it is uninteresting locally too, or
    /// when it was traversed with a foreign non-HEAD tag.
    fn should_prune(&self, walk: &Walk<'_>, folder: &RemoteFolder) -> ReconcileResult<bool> {
        if !self.config.prune_empty_directories || !folder.is_empty() {
            return Ok(false);
        }
        let path = &folder.path;
        let local_empty = self.store.workspace().kind(path) != Some(ResourceKind::Folder)
            || self.store.members(path)?.is_empty();
        if local_empty {
            return Ok(true);
        }
        let Some(tag) = walk.tag.as_ref().filter(|t| t.name != HEAD) else {
            return Ok(false);
        };
        let local_tag = self.store.folder_sync(path)?.and_then(|b| b.tag);
        Ok(!local_tag.is_some_and(|local| local.same_name(tag)))
    }

    /// Fetches the revisions of every file still awaiting one.
    fn fetch_revisions(
        &self,
        walk: &mut Walk<'_>,
        root: &ResourcePath,
        tree: &mut RemoteFolder,
    ) -> ReconcileResult<()> {
        let pending: Vec<ResourcePath> = tree
            .files()
            .into_iter()
            .filter(|f| f.revision.is_none())
            .map(|f| f.path.clone())
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let lookup: BTreeSet<&ResourcePath> = pending.iter().collect();
        let mut resolved = 0usize;
        for batch in pending.chunks(self.config.revision_batch_size.max(1)) {
            walk.cancel.check()?;
            let request = RevisionRequest {
                root: root.clone(),
                tag: walk.fetch_tag.clone(),
                files: batch
                    .iter()
                    .filter_map(|p| p.relative_to(root).map(str::to_string))
                    .collect(),
            };
            let mut collector = RevisionCollector {
                root,
                revisions: Vec::new(),
                errors: &mut walk.set.errors,
            };
            let result = self.source.fetch_revisions(&request, &mut collector, walk.cancel);
            let revisions = collector.revisions;
            match result {
                Err(e) if e.is_server() && !revisions.is_empty() => {
                    warn!(files = batch.len(), error = %e, "ignoring server error after partial revisions");
                }
                Err(e) => return Err(e),
                Ok(()) => {}
            }

            for (path, revision) in revisions {
                if !lookup.contains(&path) {
                    continue;
                }
                if let Some(file) = tree.file_mut(&path) {
                    file.revision = Some(revision);
                    resolved += 1;
                }
            }
        }
        debug!(requested = pending.len(), resolved, "fetched remote revisions");
        Ok(())
    }

    /// Builds the remote tree and classifies everything below `root`.
    ///
    /// # Errors
    ///
    /// Returns reconciliation or classification failures.
    pub fn synchronize(
        &self,
        root: &ResourcePath,
        tag: Option<&CvsTag>,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Vec<(Resource, SyncKind)>> {
        let tree = self.build_remote_tree(root, tag, cancel)?;
        Ok(SyncClassifier::new(self.store).classify_tree(root, tree.as_ref(), cancel)?)
    }
}

/// Builds the tree of base revisions recorded locally, without a server.
///
/// Returns `None` if `root` is not a CVS folder.
///
/// # Errors
///
/// Returns an error if sync records cannot be read.
pub fn build_base_tree<S: SyncStorage>(
    store: &SyncMetadataStore<S>,
    root: &ResourcePath,
) -> ReconcileResult<Option<RemoteFolder>> {
    let op = store.begin_operation();
    let tree = match store.folder_sync(root) {
        Ok(Some(binding)) => base_folder(store, root, &binding).map(Some),
        Ok(None) => Ok(None),
        Err(e) => Err(e.into()),
    };
    op.end()?;
    tree
}

fn base_folder<S: SyncStorage>(
    store: &SyncMetadataStore<S>,
    path: &ResourcePath,
    binding: &FolderSyncInfo,
) -> ReconcileResult<RemoteFolder> {
    let mut folder = RemoteFolder::new(path.clone(), binding.tag.clone());
    folder.repository = Some(binding.repository.clone());

    for member in store.members(path)? {
        match member {
            Resource::Folder(child) => {
                let Some(child_binding) = store.folder_sync(&child)? else {
                    continue;
                };
                if store.resource_sync(&child)?.is_some() {
                    let built = base_folder(store, &child, &child_binding)?;
                    folder.insert(RemoteNode::Folder(built));
                }
            }
            Resource::File(child) => {
                let Some(info) = store.resource_sync(&child)? else {
                    continue;
                };
                if info.is_added() || info.is_directory() {
                    continue;
                }
                let mut file = RemoteFile::new(child, info.revision).with_tag(info.tag);
                file.keyword_mode = info.keyword_mode;
                folder.insert(RemoteNode::File(file));
            }
        }
    }
    Ok(folder)
}
