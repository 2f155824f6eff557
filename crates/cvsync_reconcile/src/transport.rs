//! Delta source abstraction.
//!
//! A delta source runs one protocol exchange and reports what differs
//! between the client's recorded state and the repository through listener
//! callbacks. Paths passed to listeners are relative to the request root.

use crate::error::{ReconcileError, ReconcileResult};
use cvsync_codec::CvsTag;
use cvsync_core::{CancellationToken, ResourcePath, ServerSyncState};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// Receives the differences reported by one delta exchange.
pub trait DeltaListener {
    /// A folder was traversed; `is_new` when the client does not have it.
    fn directory_information(&mut self, path: &str, is_new: bool);

    /// A folder the client has is gone from the repository.
    fn directory_does_not_exist(&mut self, path: &str);

    /// The server classified a file.
    fn file_information(&mut self, state: ServerSyncState, path: &str);

    /// A file the client has is gone from the repository.
    fn file_does_not_exist(&mut self, path: &str);
}

/// Receives revisions from a revision fetch.
pub trait StatusListener {
    /// The repository revision of a file.
    fn file_status(&mut self, path: &str, revision: &str);
}

/// Parameters of a delta exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaRequest {
    /// Folder the exchange is scoped to.
    pub root: ResourcePath,
    /// Tag filter, `None` for the folder's own tag.
    pub tag: Option<CvsTag>,
    /// Descend into subfolders.
    pub recursive: bool,
}

/// Parameters of a batched revision fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRequest {
    /// Folder the file paths are relative to.
    pub root: ResourcePath,
    /// Tag filter.
    pub tag: Option<CvsTag>,
    /// Files to report, relative to `root`.
    pub files: Vec<String>,
}

/// Runs delta exchanges against a repository.
///
/// This trait is implemented by the protocol layer. Callbacks must be
/// invoked synchronously, before the call returns.
pub trait DeltaSource: Send + Sync {
    /// Reports the differences under `request.root`.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Server`] with the server's messages when it
    /// reports errors. Deltas reported before the error stay recorded.
    /// Returns [`ReconcileError::Transport`] if the connection fails.
    fn fetch_delta(
        &self,
        request: &DeltaRequest,
        listener: &mut dyn DeltaListener,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()>;

    /// Reports the repository revision of each requested file.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Server`] when the server reports errors.
    fn fetch_revisions(
        &self,
        request: &RevisionRequest,
        listener: &mut dyn StatusListener,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()>;
}

/// One callback of a scripted exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaEvent {
    /// `directory_information`.
    Directory {
        /// Path relative to the request root.
        path: String,
        /// Unknown to the client.
        is_new: bool,
    },
    /// `directory_does_not_exist`.
    DirectoryMissing(String),
    /// `file_information`.
    File {
        /// Server classification.
        state: ServerSyncState,
        /// Path relative to the request root.
        path: String,
    },
    /// `file_does_not_exist`.
    FileMissing(String),
}

impl DeltaEvent {
    /// Shorthand for a new directory.
    pub fn new_directory(path: impl Into<String>) -> Self {
        Self::Directory {
            path: path.into(),
            is_new: true,
        }
    }

    /// Shorthand for a classified file.
    pub fn file(state: ServerSyncState, path: impl Into<String>) -> Self {
        Self::File {
            state,
            path: path.into(),
        }
    }

    fn deliver(&self, listener: &mut dyn DeltaListener) {
        match self {
            Self::Directory { path, is_new } => listener.directory_information(path, *is_new),
            Self::DirectoryMissing(path) => listener.directory_does_not_exist(path),
            Self::File { state, path } => listener.file_information(*state, path),
            Self::FileMissing(path) => listener.file_does_not_exist(path),
        }
    }
}

/// The scripted answer to matching delta requests.
#[derive(Debug, Clone)]
pub struct DeltaScript {
    root: ResourcePath,
    recursive: bool,
    tagged: Option<bool>,
    events: Vec<DeltaEvent>,
    errors: Vec<String>,
    disconnect: Option<String>,
}

impl DeltaScript {
    /// Answers recursive requests for `root`, tagged or not.
    pub fn new(root: ResourcePath) -> Self {
        Self {
            root,
            recursive: true,
            tagged: None,
            events: Vec::new(),
            errors: Vec::new(),
            disconnect: None,
        }
    }

    /// Answers the non-recursive fetch of a new folder instead.
    #[must_use]
    pub fn narrow(mut self) -> Self {
        self.recursive = false;
        self
    }

    /// Answers only requests with (`true`) or without (`false`) a tag.
    #[must_use]
    pub fn tagged(mut self, tagged: bool) -> Self {
        self.tagged = Some(tagged);
        self
    }

    /// Adds an event.
    #[must_use]
    pub fn event(mut self, event: DeltaEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Fails the exchange with a server message after the events.
    #[must_use]
    pub fn fail_with(mut self, message: impl Into<String>) -> Self {
        self.errors.push(message.into());
        self
    }

    /// Drops the connection after the events.
    #[must_use]
    pub fn disconnect(mut self, message: impl Into<String>) -> Self {
        self.disconnect = Some(message.into());
        self
    }

    fn matches(&self, request: &DeltaRequest) -> bool {
        self.root == request.root
            && self.recursive == request.recursive
            && self.tagged.map_or(true, |t| t == request.tag.is_some())
    }
}

/// A scripted delta source for testing.
///
/// Delta requests are answered by the first matching [`DeltaScript`];
/// unmatched requests report nothing. Revisions are looked up by project
/// path.
#[derive(Debug, Default)]
pub struct MockDeltaSource {
    scripts: Mutex<Vec<DeltaScript>>,
    revisions: Mutex<BTreeMap<ResourcePath, String>>,
    revision_errors: Mutex<Vec<String>>,
    delta_requests: Mutex<Vec<DeltaRequest>>,
    revision_requests: Mutex<Vec<RevisionRequest>>,
}

impl MockDeltaSource {
    /// Creates a source with no scripts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a delta script.
    pub fn script(&self, script: DeltaScript) {
        self.scripts.lock().push(script);
    }

    /// Sets the repository revision of a file.
    pub fn set_revision(&self, path: ResourcePath, revision: impl Into<String>) {
        self.revisions.lock().insert(path, revision.into());
    }

    /// Fails every revision fetch with a server message.
    pub fn fail_revisions_with(&self, message: impl Into<String>) {
        self.revision_errors.lock().push(message.into());
    }

    /// Delta requests received so far.
    pub fn delta_requests(&self) -> Vec<DeltaRequest> {
        self.delta_requests.lock().clone()
    }

    /// Revision requests received so far.
    pub fn revision_requests(&self) -> Vec<RevisionRequest> {
        self.revision_requests.lock().clone()
    }
}

impl DeltaSource for MockDeltaSource {
    fn fetch_delta(
        &self,
        request: &DeltaRequest,
        listener: &mut dyn DeltaListener,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        cancel.check()?;
        self.delta_requests.lock().push(request.clone());
        let script = self
            .scripts
            .lock()
            .iter()
            .find(|s| s.matches(request))
            .cloned();
        let Some(script) = script else {
            return Ok(());
        };
        for event in &script.events {
            event.deliver(listener);
        }
        if let Some(message) = script.disconnect {
            return Err(ReconcileError::transport(message));
        }
        if script.errors.is_empty() {
            Ok(())
        } else {
            Err(ReconcileError::server(script.errors))
        }
    }

    fn fetch_revisions(
        &self,
        request: &RevisionRequest,
        listener: &mut dyn StatusListener,
        cancel: &CancellationToken,
    ) -> ReconcileResult<()> {
        cancel.check()?;
        self.revision_requests.lock().push(request.clone());
        let errors = self.revision_errors.lock().clone();
        if !errors.is_empty() {
            return Err(ReconcileError::server(errors));
        }
        let revisions = self.revisions.lock();
        for file in &request.files {
            let Ok(path) = request.root.resolve(file) else {
                continue;
            };
            if let Some(revision) = revisions.get(&path) {
                listener.file_status(file, revision);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<DeltaEvent>,
        statuses: Vec<(String, String)>,
    }

    impl DeltaListener for Recorder {
        fn directory_information(&mut self, path: &str, is_new: bool) {
            self.events.push(DeltaEvent::Directory {
                path: path.to_string(),
                is_new,
            });
        }

        fn directory_does_not_exist(&mut self, path: &str) {
            self.events.push(DeltaEvent::DirectoryMissing(path.to_string()));
        }

        fn file_information(&mut self, state: ServerSyncState, path: &str) {
            self.events.push(DeltaEvent::file(state, path));
        }

        fn file_does_not_exist(&mut self, path: &str) {
            self.events.push(DeltaEvent::FileMissing(path.to_string()));
        }
    }

    impl StatusListener for Recorder {
        fn file_status(&mut self, path: &str, revision: &str) {
            self.statuses.push((path.to_string(), revision.to_string()));
        }
    }

    fn request(tag: Option<CvsTag>) -> DeltaRequest {
        DeltaRequest {
            root: ResourcePath::root(),
            tag,
            recursive: true,
        }
    }

    #[test]
    fn scripted_events_are_delivered() {
        let source = MockDeltaSource::new();
        source.script(
            DeltaScript::new(ResourcePath::root())
                .event(DeltaEvent::new_directory("lib"))
                .event(DeltaEvent::FileMissing("old.c".into())),
        );
        let mut recorder = Recorder::default();

        source
            .fetch_delta(&request(None), &mut recorder, &CancellationToken::new())
            .unwrap();

        assert_eq!(recorder.events.len(), 2);
        assert_eq!(source.delta_requests(), vec![request(None)]);
    }

    #[test]
    fn tagged_scripts_only_match_tagged_requests() {
        let source = MockDeltaSource::new();
        source.script(
            DeltaScript::new(ResourcePath::root())
                .tagged(true)
                .fail_with("no such tag `R1'"),
        );
        let mut recorder = Recorder::default();
        let cancel = CancellationToken::new();

        let tagged = source.fetch_delta(&request(Some(CvsTag::version("R1"))), &mut recorder, &cancel);
        assert!(tagged.unwrap_err().is_no_tag());
        source.fetch_delta(&request(None), &mut recorder, &cancel).unwrap();
    }

    #[test]
    fn revisions_are_reported_relative_to_root() {
        let source = MockDeltaSource::new();
        source.set_revision(ResourcePath::new("a/b.c").unwrap(), "1.3");
        let mut recorder = Recorder::default();

        source
            .fetch_revisions(
                &RevisionRequest {
                    root: ResourcePath::new("a").unwrap(),
                    tag: None,
                    files: vec!["b.c".into(), "missing.c".into()],
                },
                &mut recorder,
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(recorder.statuses, vec![("b.c".to_string(), "1.3".to_string())]);
    }

    #[test]
    fn cancelled_fetch_fails() {
        let source = MockDeltaSource::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = source
            .fetch_delta(&request(None), &mut Recorder::default(), &cancel)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(source.delta_requests().is_empty());
    }
}
