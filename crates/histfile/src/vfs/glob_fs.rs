//! `GlobFs` adapter for `Filesystem`.
//!
//! Bridges the `Filesystem` trait to histfile-glob's `GlobFs` trait so
//! pattern expansion works against any backend.

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;

use super::traits::{DirEntry, Filesystem};
use histfile_glob::{GlobDirEntry, GlobError, GlobFs};

/// Wraps a `&dyn Filesystem` to implement `GlobFs`.
pub struct VfsGlobFs<'a>(pub &'a dyn Filesystem);

impl GlobDirEntry for DirEntry {
    fn name(&self) -> &OsStr {
        &self.name
    }

    fn is_dir(&self) -> bool {
        DirEntry::is_dir(self)
    }

    fn is_symlink(&self) -> bool {
        DirEntry::is_symlink(self)
    }
}

#[async_trait]
impl GlobFs for VfsGlobFs<'_> {
    type DirEntry = DirEntry;

    async fn list_dir(&self, path: &Path) -> Result<Vec<DirEntry>, GlobError> {
        self.0.list(path).await.map_err(GlobError::from)
    }

    async fn exists(&self, path: &Path) -> bool {
        self.0.exists(path).await
    }

    /// `stat` follows links, so a link to a directory reports as one.
    async fn is_dir(&self, path: &Path) -> bool {
        self.0.stat(path).await.is_ok_and(|entry| entry.is_dir())
    }
}
