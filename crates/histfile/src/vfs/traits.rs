//! The storage primitive that versioned access sits on.

use async_trait::async_trait;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirEntryKind {
    File,
    Directory,
    Symlink,
}

/// Metadata for one path, as returned by `list`, `stat` and `lstat`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Final path component only, exactly as the backend stores it.
    pub name: OsString,
    pub kind: DirEntryKind,
    /// Bytes; zero for directories.
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Unix mode bits where the backend has them.
    pub permissions: Option<u32>,
    /// Link target, for symlinks reported by `lstat`/`list`.
    pub symlink_target: Option<PathBuf>,
}

impl DirEntry {
    fn bare(name: impl Into<OsString>, kind: DirEntryKind, size: u64) -> Self {
        Self {
            name: name.into(),
            kind,
            size,
            modified: None,
            permissions: None,
            symlink_target: None,
        }
    }

    pub fn directory(name: impl Into<OsString>) -> Self {
        Self::bare(name, DirEntryKind::Directory, 0)
    }

    pub fn file(name: impl Into<OsString>, size: u64) -> Self {
        Self::bare(name, DirEntryKind::File, size)
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, DirEntryKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, DirEntryKind::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self.kind, DirEntryKind::Symlink)
    }
}

fn unsupported(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("{what} not supported by this filesystem"))
}

/// A storage backend.
///
/// Paths are relative to the backend's root; a leading `/` is ignored.
/// Implementations must report a missing path as `io::ErrorKind::NotFound`,
/// since that kind, and only that kind, starts a fallback search.
///
/// Seven methods are required. The rest have defaults built from them that
/// backends override when they can do better.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create or replace a file.
    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Directory entries, sorted by name.
    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>>;

    /// Metadata, following symlinks.
    async fn stat(&self, path: &Path) -> io::Result<DirEntry>;

    /// Create a directory and any missing parents. Existing directories are fine.
    async fn mkdir(&self, path: &Path) -> io::Result<()>;

    /// Remove a file or an empty directory.
    async fn remove(&self, path: &Path) -> io::Result<()>;

    fn read_only(&self) -> bool;

    /// Add bytes to the end of a file, creating it when missing.
    async fn append(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut contents = match self.read(path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            other => other?,
        };
        contents.extend_from_slice(data);
        self.write(path, &contents).await
    }

    /// True when `stat` succeeds. Any failure counts as absent; use `stat`
    /// to tell a missing path from an unreadable one.
    async fn exists(&self, path: &Path) -> bool {
        self.stat(path).await.is_ok()
    }

    /// Move a file. The default copies then removes, so it is not atomic
    /// and refuses directories.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        if self.stat(from).await?.is_dir() {
            return Err(unsupported("renaming directories"));
        }
        self.copy(from, to).await?;
        self.remove(from).await
    }

    /// Duplicate a file, returning the byte count.
    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let contents = self.read(from).await?;
        self.write(to, &contents).await?;
        Ok(contents.len() as u64)
    }

    /// Cut or zero-extend a file to `len` bytes.
    async fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
        let len = usize::try_from(len)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "length too large"))?;
        let mut contents = self.read(path).await?;
        contents.resize(len, 0);
        self.write(path, &contents).await
    }

    async fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        let _ = (path, mode);
        Err(unsupported("permissions"))
    }

    /// Remove each path in order. The first failure aborts the rest.
    ///
    /// Returns how many paths were removed.
    async fn unlink(&self, paths: &[PathBuf]) -> io::Result<usize> {
        for path in paths {
            self.remove(path).await?;
        }
        Ok(paths.len())
    }

    /// Remove whatever can be removed and count it. Failures are skipped.
    async fn safe_unlink(&self, paths: &[PathBuf]) -> io::Result<usize> {
        let mut removed = 0;
        for path in paths {
            if self.remove(path).await.is_ok() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Host path behind `path`; `None` for virtual backends.
    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        let _ = path;
        None
    }

    async fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        let _ = path;
        Err(unsupported("symlinks"))
    }

    /// Create `link` pointing at `target`.
    async fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        let _ = (target, link);
        Err(unsupported("symlinks"))
    }

    /// Metadata without following a final symlink.
    async fn lstat(&self, path: &Path) -> io::Result<DirEntry> {
        self.stat(path).await
    }
}
