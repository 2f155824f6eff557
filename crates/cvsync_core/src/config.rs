//! Metadata store configuration.

/// Patterns CVS ignores in every folder unless a `!` entry resets them.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    "RCS", "SCCS", "CVS", "CVS.adm", "RCSLOG", "cvslog.*", "tags", "TAGS", ".make.state",
    ".nse_depinfo", "*~", "#*", ".#*", ",*", "_$*", "*$", "*.old", "*.bak", "*.BAK", "*.orig",
    "*.rej", ".del-*", "*.a", "*.olb", "*.o", "*.obj", "*.so", "*.exe", "*.Z", "*.elc", "*.ln",
    "core",
];

/// Configuration for a [`crate::SyncMetadataStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Name of the per-folder control directory, hidden from `members`.
    pub control_folder: String,

    /// Ignore patterns applied before each folder's own list.
    pub default_ignores: Vec<String>,

    /// Number of change batches the feed keeps for polling.
    pub feed_history: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            control_folder: "CVS".to_string(),
            default_ignores: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            feed_history: 1000,
        }
    }
}

impl StoreConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the control directory name.
    #[must_use]
    pub fn control_folder(mut self, name: impl Into<String>) -> Self {
        self.control_folder = name.into();
        self
    }

    /// Replaces the default ignore patterns.
    #[must_use]
    pub fn default_ignores<I, P>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.default_ignores = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets how many change batches are kept for polling.
    #[must_use]
    pub const fn feed_history(mut self, size: usize) -> Self {
        self.feed_history = size;
        self
    }
}
