//! Change feed for observing committed metadata changes.
//!
//! The metadata store emits one [`ChangeBatch`] each time an outermost
//! operation ends, listing every resource whose sync state was touched
//! during it. Views and decorators subscribe to refresh what they show.
//!
//! # Usage
//!
//! ```rust
//! use cvsync_core::{MemoryWorkspace, ResourcePath, StoreConfig, SyncMetadataStore};
//! use cvsync_codec::ResourceSyncInfo;
//! use cvsync_storage::MemoryStorage;
//! use std::sync::Arc;
//!
//! let workspace = Arc::new(MemoryWorkspace::new());
//! let store = SyncMetadataStore::new(MemoryStorage::new(), workspace, StoreConfig::default());
//! let receiver = store.subscribe();
//!
//! let file = ResourcePath::new("README").unwrap();
//! store.set_resource_sync(&file, ResourceSyncInfo::new("README", "1.1", None)).unwrap();
//!
//! let batch = receiver.recv().unwrap();
//! assert_eq!(batch.resources, vec![file]);
//! ```

use crate::resource::ResourcePath;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};

/// The resources touched by one outermost operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Sequence number of the commit, starting at 1.
    pub sequence: u64,
    /// Touched resources, sorted and unique.
    pub resources: Vec<ResourcePath>,
}

/// A change feed that distributes committed batches to subscribers.
///
/// The change feed:
/// - Emits only committed batches
/// - Preserves commit order
/// - Supports multiple subscribers
/// - Is thread-safe
pub struct ChangeFeed {
    /// Subscribers (senders).
    subscribers: RwLock<Vec<Sender<ChangeBatch>>>,
    /// History of recent batches for polling.
    history: RwLock<Vec<ChangeBatch>>,
    /// Maximum history size.
    max_history: usize,
    next_sequence: AtomicU64,
}

impl ChangeFeed {
    /// Creates a new change feed.
    pub fn new() -> Self {
        Self::with_max_history(1000)
    }

    /// Creates a change feed with a specific history limit.
    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
            history: RwLock::new(Vec::new()),
            max_history,
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Subscribes to the change feed.
    ///
    /// Returns a receiver that will receive all future batches.
    /// The receiver should be polled regularly to avoid unbounded memory growth.
    pub fn subscribe(&self) -> Receiver<ChangeBatch> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits a batch to all subscribers and returns its sequence number.
    pub fn emit(&self, resources: Vec<ResourcePath>) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let batch = ChangeBatch {
            sequence,
            resources,
        };

        {
            let mut history = self.history.write();
            history.push(batch.clone());
            if history.len() > self.max_history {
                let to_remove = history.len() - self.max_history;
                history.drain(0..to_remove);
            }
        }

        // Send to subscribers (remove disconnected ones)
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(batch.clone()).is_ok());
        sequence
    }

    /// Polls batches after a sequence cursor, up to limit.
    pub fn poll(&self, cursor: u64, limit: usize) -> Vec<ChangeBatch> {
        let history = self.history.read();
        history
            .iter()
            .filter(|b| b.sequence > cursor)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Returns the latest sequence number in history.
    pub fn latest_sequence(&self) -> u64 {
        self.history.read().last().map(|b| b.sequence).unwrap_or(0)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Returns the number of batches in history.
    pub fn history_len(&self) -> usize {
        self.history.read().len()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscriber_count())
            .field("history", &self.history_len())
            .field("max_history", &self.max_history)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn paths(names: &[&str]) -> Vec<ResourcePath> {
        names.iter().map(|n| ResourcePath::new(n).unwrap()).collect()
    }

    #[test]
    fn emit_and_receive() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();

        let seq = feed.emit(paths(&["a"]));
        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received.sequence, seq);
        assert_eq!(received.resources, paths(&["a"]));
    }

    #[test]
    fn multiple_subscribers() {
        let feed = ChangeFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        feed.emit(paths(&["x"]));

        assert_eq!(rx1.recv().unwrap().resources, paths(&["x"]));
        assert_eq!(rx2.recv().unwrap().resources, paths(&["x"]));
    }

    #[test]
    fn dropped_subscriber_is_removed() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        drop(rx);

        feed.emit(paths(&["x"]));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn poll_from_cursor() {
        let feed = ChangeFeed::new();
        for name in ["a", "b", "c"] {
            feed.emit(paths(&[name]));
        }

        let polled = feed.poll(1, 10);
        assert_eq!(polled.len(), 2);
        assert_eq!(polled[0].sequence, 2);
        assert_eq!(feed.latest_sequence(), 3);
    }

    #[test]
    fn history_is_bounded() {
        let feed = ChangeFeed::with_max_history(2);
        for name in ["a", "b", "c"] {
            feed.emit(paths(&[name]));
        }
        assert_eq!(feed.history_len(), 2);
        assert_eq!(feed.poll(0, 10)[0].sequence, 2);
    }
}
