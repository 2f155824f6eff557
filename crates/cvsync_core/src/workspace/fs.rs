//! Workspace backed by a directory on disk.

use super::{ResourceKind, Workspace};
use crate::error::{CoreError, CoreResult};
use crate::resource::ResourcePath;
use chrono::{DateTime, SubsecRound, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// A workspace rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    /// Opens the workspace rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a directory.
    pub fn open(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(CoreError::resource_not_found(root.display().to_string()));
        }
        Ok(Self { root })
    }

    /// Returns the workspace root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a resource.
    #[must_use]
    pub fn location(&self, path: &ResourcePath) -> PathBuf {
        if path.is_root() {
            return self.root.clone();
        }
        path.as_str()
            .split('/')
            .fold(self.root.clone(), |location, segment| location.join(segment))
    }
}

impl Workspace for FsWorkspace {
    fn kind(&self, path: &ResourcePath) -> Option<ResourceKind> {
        let metadata = fs::metadata(self.location(path)).ok()?;
        if metadata.is_dir() {
            Some(ResourceKind::Folder)
        } else if metadata.is_file() {
            Some(ResourceKind::File)
        } else {
            None
        }
    }

    fn children(&self, folder: &ResourcePath) -> CoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(self.location(folder))? {
            let entry = entry?;
            // Names that are not UTF-8 cannot be tracked
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, file: &ResourcePath) -> CoreResult<Vec<u8>> {
        Ok(fs::read(self.location(file))?)
    }

    fn write(&self, file: &ResourcePath, data: &[u8]) -> CoreResult<()> {
        Ok(fs::write(self.location(file), data)?)
    }

    fn modified_at(&self, file: &ResourcePath) -> CoreResult<Option<DateTime<Utc>>> {
        match fs::metadata(self.location(file)) {
            Ok(metadata) => {
                let modified: DateTime<Utc> = metadata.modified()?.into();
                Ok(Some(modified.trunc_subsecs(0)))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
