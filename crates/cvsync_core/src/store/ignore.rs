//! Ignore patterns (`.cvsignore`).

use super::SyncMetadataStore;
use crate::error::CoreResult;
use crate::resource::ResourcePath;
use crate::workspace::ResourceKind;
use cvsync_storage::{Slot, SyncStorage};
use tracing::debug;

/// Matches `name` against a pattern where `*` matches any run of
/// characters and `?` matches exactly one.
///
/// ```rust
/// use cvsync_core::wildcard_match;
///
/// assert!(wildcard_match("*.o", "main.o"));
/// assert!(wildcard_match("core.?", "core.1"));
/// assert!(!wildcard_match("*.o", "main.c"));
/// ```
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while n < name.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p, n));
                p += 1;
            }
            Some(&c) if c == '?' || c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match star {
                // Backtrack: let the last star absorb one more character
                Some((sp, sn)) => {
                    p = sp + 1;
                    n = sn + 1;
                    star = Some((sp, sn + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

/// Applies `patterns` in order. `!` clears everything before it.
fn effective<'a>(patterns: impl IntoIterator<Item = &'a String>) -> Vec<&'a str> {
    let mut out = Vec::new();
    for pattern in patterns {
        if pattern == "!" {
            out.clear();
        } else {
            out.push(pattern.as_str());
        }
    }
    out
}

impl<S: SyncStorage> SyncMetadataStore<S> {
    /// Patterns recorded for `folder`, without the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be read or decoded.
    pub fn ignored_patterns(&self, folder: &ResourcePath) -> CoreResult<Vec<String>> {
        self.run(|st| {
            let slot = self.slot_of(folder);
            Ok(self.load_ignores(st, slot, folder)?.unwrap_or_default())
        })
    }

    /// Appends a pattern to the folder's ignore list.
    ///
    /// Existing members matching the pattern are reported as changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder does not exist or the pattern is
    /// blank.
    pub fn add_ignored(&self, folder: &ResourcePath, pattern: &str) -> CoreResult<()> {
        self.require_folder(folder)?;
        let pattern = pattern.trim();
        if pattern.is_empty() || pattern.contains(char::is_whitespace) {
            return Err(crate::error::CoreError::invalid_operation(format!(
                "invalid ignore pattern {pattern:?}"
            )));
        }

        self.run(|st| {
            let mut patterns = self
                .load_ignores(st, Slot::Live, folder)?
                .unwrap_or_default();
            if patterns.iter().any(|p| p == pattern) {
                return Ok(());
            }
            patterns.push(pattern.to_string());
            Self::store_ignores(st, Slot::Live, folder, Some(patterns));

            let mut matched = 0usize;
            for member in self.collect_members(st, folder)? {
                if wildcard_match(pattern, member.name()) {
                    st.changed.insert(member.path().clone());
                    matched += 1;
                }
            }
            debug!(folder = %folder, pattern, matched, "added ignore pattern");
            Ok(())
        })
    }

    /// Returns true if the resource is ignored.
    ///
    /// Managed resources are never ignored. Anything inside an ignored
    /// folder is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if sync records cannot be read.
    pub fn is_ignored(&self, resource: &ResourcePath) -> CoreResult<bool> {
        let Some(parent) = resource.parent() else {
            return Ok(false);
        };
        if self.resource_sync(resource)?.is_some() {
            return Ok(false);
        }
        if !parent.is_root() && self.is_ignored(&parent)? {
            return Ok(true);
        }

        let local = self.ignored_patterns(&parent)?;
        let patterns = effective(self.config.default_ignores.iter().chain(local.iter()));
        let name = resource.name();
        if patterns.iter().any(|p| wildcard_match(p, name)) {
            return Ok(true);
        }
        // A control folder is never a member, so it is always ignored
        Ok(name == self.config.control_folder
            && self.workspace.kind(resource) == Some(ResourceKind::Folder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::workspace::MemoryWorkspace;
    use cvsync_codec::ResourceSyncInfo;
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

    #[test]
    fn wildcards() {
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("*", "anything"));
        assert!(wildcard_match("a*b*c", "aXXbYYc"));
        assert!(wildcard_match("#*", "#main.c#"));
        assert!(wildcard_match(".#*", ".#file.1.2"));
        assert!(!wildcard_match("a?c", "ac"));
        assert!(!wildcard_match("abc", "abcd"));
        assert!(wildcard_match("*~", "notes.txt~"));
    }

    #[test]
    fn bang_resets_patterns() {
        let patterns: Vec<String> = ["*.o", "!", "*.tmp"].iter().map(|s| s.to_string()).collect();
        assert_eq!(effective(&patterns), vec!["*.tmp"]);
    }

    #[test]
    fn default_patterns_apply() {
        let (ws, store) = setup();
        ws.create_file(&p("src/main.o"), b"");
        ws.create_file(&p("src/main.c"), b"");
        assert!(store.is_ignored(&p("src/main.o")).unwrap());
        assert!(!store.is_ignored(&p("src/main.c")).unwrap());
    }

    #[test]
    fn added_pattern_is_persisted_and_applied() {
        let (ws, store) = setup();
        ws.create_file(&p("src/build.log"), b"");
        let rx = store.subscribe();

        store.add_ignored(&p("src"), "*.log").unwrap();

        assert_eq!(store.ignored_patterns(&p("src")).unwrap(), vec!["*.log"]);
        assert!(store.is_ignored(&p("src/build.log")).unwrap());
        assert_eq!(rx.recv().unwrap().resources, vec![p("src/build.log")]);
        assert!(store
            .storage()
            .read(Slot::Live, "src", cvsync_storage::RecordKind::IgnorePatterns)
            .unwrap()
            .is_some());
    }

    #[test]
    fn managed_resources_are_not_ignored() {
        let (ws, store) = setup();
        ws.create_file(&p("lib.o"), b"");
        store
            .set_resource_sync(&p("lib.o"), ResourceSyncInfo::new("lib.o", "1.1", None))
            .unwrap();
        assert!(!store.is_ignored(&p("lib.o")).unwrap());
    }

    #[test]
    fn children_of_ignored_folders_are_ignored() {
        let (ws, store) = setup();
        ws.create_file(&p("target/debug/app"), b"");
        store.add_ignored(&ResourcePath::root(), "target").unwrap();
        assert!(store.is_ignored(&p("target/debug/app")).unwrap());
    }

    #[test]
    fn blank_pattern_rejected() {
        let (ws, store) = setup();
        ws.create_folder(&p("src"));
        assert!(store.add_ignored(&p("src"), "  ").is_err());
        assert!(store.add_ignored(&p("missing"), "*.o").is_err());
    }
}
