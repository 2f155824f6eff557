//! Configuration for the remote tree builder.

/// Configuration for reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Drop remote folders that are empty and uninteresting locally.
    pub prune_empty_directories: bool,
    /// Maximum number of files per revision fetch request.
    pub revision_batch_size: usize,
}

impl ReconcileConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether empty remote folders are pruned.
    #[must_use]
    pub fn with_prune_empty_directories(mut self, prune: bool) -> Self {
        self.prune_empty_directories = prune;
        self
    }

    /// Sets the revision fetch batch size. Zero is treated as one.
    #[must_use]
    pub fn with_revision_batch_size(mut self, size: usize) -> Self {
        self.revision_batch_size = size.max(1);
        self
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            prune_empty_directories: true,
            revision_batch_size: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ReconcileConfig::default();
        assert!(config.prune_empty_directories);
        assert_eq!(config.revision_batch_size, 1024);
    }

    #[test]
    fn builder_pattern() {
        let config = ReconcileConfig::new()
            .with_prune_empty_directories(false)
            .with_revision_batch_size(0);
        assert!(!config.prune_empty_directories);
        assert_eq!(config.revision_batch_size, 1);
    }
}
