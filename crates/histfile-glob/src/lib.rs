//! histfile-glob: Glob matching and directory glob expansion.
//!
//! Provides:
//! - **glob_match**: Shell-style pattern matching with brace expansion
//! - **expand**: Expand a path pattern against a directory tree, like `Dir.glob`
//!   or the shell's pathname expansion
//!
//! Expansion is generic over `GlobFs`, a minimal read-only filesystem trait.
//! Consumers implement `GlobFs` to adapt their own filesystem abstraction.

mod expand;
pub mod glob;

pub use expand::expand;
pub use glob::{contains_glob, expand_braces, glob_match};

use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;

/// Errors from filesystem operations during expansion.
#[derive(Debug, Error)]
pub enum GlobError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for GlobError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => GlobError::NotFound(err.to_string()),
            std::io::ErrorKind::PermissionDenied => GlobError::PermissionDenied(err.to_string()),
            _ => GlobError::Io(err.to_string()),
        }
    }
}

/// Minimal read-only filesystem abstraction for glob expansion.
#[async_trait]
pub trait GlobFs: Send + Sync {
    /// The directory entry type returned by `list_dir`.
    type DirEntry: GlobDirEntry;

    /// List the entries in a directory.
    async fn list_dir(&self, path: &Path) -> Result<Vec<Self::DirEntry>, GlobError>;

    /// Check if a path exists.
    async fn exists(&self, path: &Path) -> bool;

    /// True if `path` is a directory once symlinks are followed.
    ///
    /// Only asked about symlink entries, to decide whether expansion can
    /// descend through them.
    async fn is_dir(&self, path: &Path) -> bool {
        let _ = path;
        false
    }
}

/// A single entry returned by `GlobFs::list_dir`.
pub trait GlobDirEntry: Send {
    /// The entry name (not full path).
    fn name(&self) -> &OsStr;

    /// True if this entry is a directory.
    fn is_dir(&self) -> bool;

    fn is_symlink(&self) -> bool {
        false
    }
}
