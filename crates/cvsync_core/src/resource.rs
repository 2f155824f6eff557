//! Resource handles.

use crate::error::{CoreError, CoreResult};
use serde::Serialize;
use std::fmt;

/// A normalized path relative to the project root.
///
/// Segments are separated by `/`. The empty path names the project root,
/// the top of every traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ResourcePath(String);

impl ResourcePath {
    /// The project root.
    #[must_use]
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parses a relative path. Leading and trailing `/` are stripped.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] for empty segments, `.`, `..`
    /// or backslashes.
    pub fn new(path: impl AsRef<str>) -> CoreResult<Self> {
        let trimmed = path.as_ref().trim_matches('/');
        cvsync_storage::validate_folder(trimmed).map_err(|_| CoreError::InvalidPath {
            path: path.as_ref().to_string(),
        })?;
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the project root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Last segment, empty for the root.
    #[must_use]
    pub fn name(&self) -> &str {
        match self.0.rfind('/') {
            Some(index) => &self.0[index + 1..],
            None => &self.0,
        }
    }

    /// Parent folder, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<ResourcePath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(index) => Self(self.0[..index].to_string()),
            None => Self::root(),
        })
    }

    /// Child path named `name`.
    #[must_use]
    pub fn join(&self, name: &str) -> ResourcePath {
        debug_assert!(!name.is_empty() && !name.contains('/'));
        if self.is_root() {
            Self(name.to_string())
        } else {
            Self(format!("{}/{}", self.0, name))
        }
    }

    /// Appends a relative path of any depth. `""` and `"."` give `self`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidPath`] if `relative` is not a normalized
    /// relative path.
    pub fn resolve(&self, relative: &str) -> CoreResult<ResourcePath> {
        let relative = relative.strip_prefix("./").unwrap_or(relative);
        if relative == "." {
            return Ok(self.clone());
        }
        let relative = ResourcePath::new(relative)?;
        Ok(match (self.is_root(), relative.is_root()) {
            (_, true) => self.clone(),
            (true, false) => relative,
            (false, false) => Self(format!("{}/{}", self.0, relative.0)),
        })
    }

    /// Returns true if `self` is `ancestor` or lies below it.
    #[must_use]
    pub fn starts_with(&self, ancestor: &ResourcePath) -> bool {
        ancestor.is_root()
            || self.0 == ancestor.0
            || (self.0.starts_with(&ancestor.0) && self.0.as_bytes().get(ancestor.0.len()) == Some(&b'/'))
    }

    /// Path of `self` relative to `ancestor`, if it lies below it.
    #[must_use]
    pub fn relative_to(&self, ancestor: &ResourcePath) -> Option<&str> {
        if !self.starts_with(ancestor) {
            return None;
        }
        if ancestor.is_root() {
            Some(&self.0)
        } else if self.0.len() == ancestor.0.len() {
            Some("")
        } else {
            Some(&self.0[ancestor.0.len() + 1..])
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

/// A workspace resource: a file or a folder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Resource {
    /// A file.
    File(ResourcePath),
    /// A folder.
    Folder(ResourcePath),
}

impl Resource {
    /// Path of the resource.
    #[must_use]
    pub fn path(&self) -> &ResourcePath {
        match self {
            Resource::File(path) | Resource::Folder(path) => path,
        }
    }

    /// Name of the resource.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path().name()
    }

    /// Returns true for folders.
    #[must_use]
    pub fn is_folder(&self) -> bool {
        matches!(self, Resource::Folder(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_normalize() {
        let path = ResourcePath::new("/src/main.c/").unwrap();
        assert_eq!(path.as_str(), "src/main.c");
        assert!(ResourcePath::new("").unwrap().is_root());
        assert!(ResourcePath::new("a/../b").is_err());
        assert!(ResourcePath::new("a//b").is_err());
    }

    #[test]
    fn parent_and_name() {
        let path = ResourcePath::new("a/b/c.txt").unwrap();
        assert_eq!(path.name(), "c.txt");
        assert_eq!(path.parent().unwrap().as_str(), "a/b");
        assert_eq!(ResourcePath::new("top").unwrap().parent(), Some(ResourcePath::root()));
        assert_eq!(ResourcePath::root().parent(), None);
        assert_eq!(ResourcePath::root().name(), "");
    }

    #[test]
    fn join_from_root() {
        let root = ResourcePath::root();
        assert_eq!(root.join("a").join("b").as_str(), "a/b");
    }

    #[test]
    fn resolve_relative_paths() {
        let a = ResourcePath::new("a").unwrap();
        assert_eq!(a.resolve("b/c.txt").unwrap().as_str(), "a/b/c.txt");
        assert_eq!(a.resolve(".").unwrap(), a);
        assert_eq!(a.resolve("").unwrap(), a);
        assert_eq!(a.resolve("./b").unwrap().as_str(), "a/b");
        assert_eq!(ResourcePath::root().resolve("x/y").unwrap().as_str(), "x/y");
        assert!(a.resolve("../b").is_err());
    }

    #[test]
    fn starts_with_respects_segments() {
        let ab = ResourcePath::new("a/b").unwrap();
        assert!(ab.starts_with(&ResourcePath::new("a").unwrap()));
        assert!(ab.starts_with(&ab));
        assert!(ab.starts_with(&ResourcePath::root()));
        assert!(!ResourcePath::new("ab").unwrap().starts_with(&ResourcePath::new("a").unwrap()));
    }

    #[test]
    fn relative_paths() {
        let path = ResourcePath::new("a/b/c").unwrap();
        assert_eq!(path.relative_to(&ResourcePath::new("a").unwrap()), Some("b/c"));
        assert_eq!(path.relative_to(&path), Some(""));
        assert_eq!(path.relative_to(&ResourcePath::root()), Some("a/b/c"));
        assert_eq!(path.relative_to(&ResourcePath::new("x").unwrap()), None);
    }

    #[test]
    fn display_root_as_slash() {
        assert_eq!(ResourcePath::root().to_string(), "/");
        assert_eq!(Resource::File(ResourcePath::new("x").unwrap()).name(), "x");
    }
}
