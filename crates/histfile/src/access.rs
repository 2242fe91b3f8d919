//! Version-aware file access.
//!
//! `VersionedFileAccess` wraps a `Filesystem` and a version tag. Every file
//! operation goes through [`VersionedFileAccess::invoke`], which looks the
//! operation up in the [`Operation`] table and decides what happens to its
//! filename arguments: left alone, rewritten with fallback, or all rewritten.
//!
//! ```text
//! read("daily.csv")  ──rewrite──▶  ./2012.11.02-daily.csv ──NotFound──▶ scan
//!                                                                         │
//!                         ./2012.10.30-daily.csv ◀──── newest older ──────┘
//! ```

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::AccessConfig;
use crate::error::UsageError;
use crate::fallback::FallbackSearch;
use crate::ops::{Operation, OperationClass};
use crate::rewrite::{LayoutMode, PathRewriter, VersionTag, split_path};
use crate::vfs::{DirEntry, FileHandle, Filesystem, OpenMode};

/// File access pinned to one version tag.
///
/// Immutable and cheap to clone; build one per requested version.
#[derive(Clone)]
pub struct VersionedFileAccess {
    fs: Arc<dyn Filesystem>,
    rewriter: PathRewriter,
    fallback: Option<FallbackSearch>,
}

impl std::fmt::Debug for VersionedFileAccess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedFileAccess")
            .field("tag", self.rewriter.tag())
            .field("layout", &self.rewriter.layout())
            .field("fallback", &self.fallback.as_ref().map(FallbackSearch::pattern))
            .finish()
    }
}

/// Builder for [`VersionedFileAccess`].
pub struct VersionedFileAccessBuilder {
    fs: Arc<dyn Filesystem>,
    tag: Option<String>,
    layout: LayoutMode,
    fallback_glob: Option<String>,
}

impl VersionedFileAccessBuilder {
    /// The version tag. Required.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    /// Enable fallback to older versions using this pattern.
    pub fn fallback_glob(mut self, pattern: impl Into<String>) -> Self {
        self.fallback_glob = Some(pattern.into());
        self
    }

    pub fn build(self) -> Result<VersionedFileAccess, UsageError> {
        let tag = VersionTag::new(self.tag.ok_or(UsageError::MissingTag)?)?;
        let fallback = match self.fallback_glob {
            None => None,
            Some(pattern) => {
                // The pattern is glued onto a directory; an absolute one would replace it.
                if pattern.is_empty() || pattern.starts_with('/') {
                    return Err(UsageError::InvalidFallbackGlob(pattern));
                }
                Some(FallbackSearch::new(pattern))
            }
        };

        Ok(VersionedFileAccess {
            fs: self.fs,
            rewriter: PathRewriter::new(tag, self.layout),
            fallback,
        })
    }
}

impl VersionedFileAccess {
    pub fn builder(fs: Arc<dyn Filesystem>) -> VersionedFileAccessBuilder {
        VersionedFileAccessBuilder {
            fs,
            tag: None,
            layout: LayoutMode::default(),
            fallback_glob: None,
        }
    }

    /// Build from a loaded `[access]` config section.
    pub fn from_config(fs: Arc<dyn Filesystem>, config: &AccessConfig) -> Result<Self, UsageError> {
        let mut builder = Self::builder(fs).layout(config.layout);
        if let Some(tag) = &config.tag {
            builder = builder.tag(tag.clone());
        }
        if let Some(pattern) = &config.fallback_glob {
            builder = builder.fallback_glob(pattern.clone());
        }
        builder.build()
    }

    pub fn tag(&self) -> &VersionTag {
        self.rewriter.tag()
    }

    pub fn layout(&self) -> LayoutMode {
        self.rewriter.layout()
    }

    pub fn fallback_glob(&self) -> Option<&str> {
        self.fallback.as_ref().map(FallbackSearch::pattern)
    }

    pub fn filesystem(&self) -> &Arc<dyn Filesystem> {
        &self.fs
    }

    /// The physical path `logical` maps to for this version.
    pub fn physical_path(&self, logical: impl AsRef<Path>) -> PathBuf {
        self.rewriter.rewrite(logical.as_ref())
    }

    /// Directory holding this version of `logical`; create it with
    /// [`makedirs`](Self::makedirs) before writing in nested layout.
    pub fn version_dir(&self, logical: impl AsRef<Path>) -> PathBuf {
        self.rewriter.version_dir(logical.as_ref())
    }

    /// Apply `op`'s filename treatment to `paths`, without fallback.
    pub fn route(&self, op: Operation, paths: &[PathBuf]) -> Vec<PathBuf> {
        match op.class() {
            OperationClass::PassThrough => paths.to_vec(),
            OperationClass::SingleFile => paths
                .iter()
                .enumerate()
                .map(|(i, p)| if i == 0 { self.rewriter.rewrite(p) } else { p.clone() })
                .collect(),
            OperationClass::BulkFile => paths.iter().map(|p| self.rewriter.rewrite(p)).collect(),
        }
    }

    /// Dispatch `op`.
    ///
    /// `call` runs the primitive with the routed paths. For single-file
    /// operations it may run twice: once on the computed path and, after a
    /// `NotFound`, once on the fallback candidate.
    pub async fn invoke<T, F, Fut>(&self, op: Operation, paths: Vec<PathBuf>, call: F) -> io::Result<T>
    where
        F: Fn(Vec<PathBuf>) -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        match op.class() {
            OperationClass::PassThrough => call(paths).await,
            OperationClass::BulkFile => {
                let routed = self.route(op, &paths);
                tracing::debug!(op = %op, paths = ?routed, "bulk rewrite");
                call(routed).await
            }
            OperationClass::SingleFile => {
                let Some(logical) = paths.first().cloned() else {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("{op} needs a filename"),
                    ));
                };
                let mut routed = self.route(op, &paths);
                let computed = routed[0].clone();
                tracing::debug!(op = %op, logical = %logical.display(), physical = %computed.display(), "rewrite");

                let err = match call(routed.clone()).await {
                    Err(e) if e.kind() == io::ErrorKind::NotFound => e,
                    other => return other,
                };

                let Some(search) = &self.fallback else {
                    return Err(err);
                };
                match search.find(self.fs.as_ref(), &logical, &computed).await {
                    Some(older) => {
                        tracing::debug!(op = %op, missing = %computed.display(), using = %older.display(), "fallback");
                        routed[0] = older;
                        call(routed).await
                    }
                    None => Err(err),
                }
            }
        }
    }

    /// `invoke` for operations taking exactly one filename.
    async fn single<T, F, Fut>(&self, op: Operation, path: &Path, call: F) -> io::Result<T>
    where
        F: Fn(PathBuf) -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        self.invoke(op, vec![path.to_path_buf()], |paths| {
            call(paths.into_iter().next().unwrap_or_default())
        })
        .await
    }

    // Path utilities. No I/O, so they only need the routing half of the table.

    pub fn join(&self, base: impl AsRef<Path>, part: impl AsRef<Path>) -> PathBuf {
        let routed = self.route(
            Operation::Join,
            &[base.as_ref().to_path_buf(), part.as_ref().to_path_buf()],
        );
        routed.iter().collect()
    }

    /// Directory (`.` when none) and basename.
    pub fn split(&self, path: impl AsRef<Path>) -> (PathBuf, OsString) {
        let routed = self.route(Operation::Split, &[path.as_ref().to_path_buf()]);
        split_path(&routed[0])
    }

    pub fn basename(&self, path: impl AsRef<Path>) -> OsString {
        let routed = self.route(Operation::Basename, &[path.as_ref().to_path_buf()]);
        split_path(&routed[0]).1
    }

    pub fn dirname(&self, path: impl AsRef<Path>) -> PathBuf {
        let routed = self.route(Operation::Dirname, &[path.as_ref().to_path_buf()]);
        split_path(&routed[0]).0
    }

    /// Extension including the dot, or empty. Dotfiles have no extension.
    pub fn extname(&self, path: impl AsRef<Path>) -> String {
        let routed = self.route(Operation::Extname, &[path.as_ref().to_path_buf()]);
        match routed[0].extension() {
            Some(ext) => format!(".{}", ext.to_string_lossy()),
            None => String::new(),
        }
    }

    pub fn absolute_path(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        let routed = self.route(Operation::AbsolutePath, &[path.as_ref().to_path_buf()]);
        std::path::absolute(&routed[0])
    }

    /// Shell-style match of `path` against `pattern`.
    pub fn fnmatch(&self, pattern: &str, path: impl AsRef<Path>) -> bool {
        let routed = self.route(Operation::Fnmatch, &[path.as_ref().to_path_buf()]);
        histfile_glob::glob_match(pattern, &routed[0])
    }

    // Version-agnostic I/O.

    /// Backend path for `path`; the path itself on virtual backends.
    pub async fn realpath(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        self.invoke(Operation::Realpath, vec![path.as_ref().to_path_buf()], |p| async move {
            self.fs.stat(&p[0]).await?;
            Ok::<_, io::Error>(self.fs.real_path(&p[0]).unwrap_or_else(|| p[0].clone()))
        })
        .await
    }

    pub async fn is_directory(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        self.invoke(Operation::IsDirectory, vec![path.as_ref().to_path_buf()], |p| async move {
            match self.fs.stat(&p[0]).await {
                Ok(entry) => Ok(entry.is_dir()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Create a directory and its parents.
    pub async fn makedirs(&self, path: impl AsRef<Path>) -> io::Result<()> {
        self.invoke(Operation::Makedirs, vec![path.as_ref().to_path_buf()], |p| async move {
            self.fs.mkdir(&p[0]).await
        })
        .await
    }

    /// Set permission bits on every path. Returns how many were changed.
    pub async fn chmod(&self, mode: u32, paths: &[PathBuf]) -> io::Result<usize> {
        self.invoke(Operation::Chmod, paths.to_vec(), |p| async move {
            for path in &p {
                self.fs.set_permissions(path, mode).await?;
            }
            Ok::<_, io::Error>(p.len())
        })
        .await
    }

    pub async fn rename(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<()> {
        let paths = vec![from.as_ref().to_path_buf(), to.as_ref().to_path_buf()];
        self.invoke(Operation::Rename, paths, |p| async move { self.fs.rename(&p[0], &p[1]).await })
            .await
    }

    pub async fn copy(&self, from: impl AsRef<Path>, to: impl AsRef<Path>) -> io::Result<u64> {
        let paths = vec![from.as_ref().to_path_buf(), to.as_ref().to_path_buf()];
        self.invoke(Operation::Copy, paths, |p| async move { self.fs.copy(&p[0], &p[1]).await })
            .await
    }

    /// Create a symlink at `link` pointing to `target`.
    pub async fn link(&self, target: impl AsRef<Path>, link: impl AsRef<Path>) -> io::Result<()> {
        let paths = vec![target.as_ref().to_path_buf(), link.as_ref().to_path_buf()];
        self.invoke(Operation::Link, paths, |p| async move { self.fs.symlink(&p[0], &p[1]).await })
            .await
    }

    /// True when both files have the same contents.
    pub async fn compare(&self, a: impl AsRef<Path>, b: impl AsRef<Path>) -> io::Result<bool> {
        let paths = vec![a.as_ref().to_path_buf(), b.as_ref().to_path_buf()];
        self.invoke(Operation::Compare, paths, |p| async move {
            let left = self.fs.read(&p[0]).await?;
            let right = self.fs.read(&p[1]).await?;
            Ok::<_, io::Error>(left == right)
        })
        .await
    }

    /// True when both paths exist and name the same file.
    pub async fn identical(&self, a: impl AsRef<Path>, b: impl AsRef<Path>) -> io::Result<bool> {
        let paths = vec![a.as_ref().to_path_buf(), b.as_ref().to_path_buf()];
        self.invoke(Operation::Identical, paths, |p| async move {
            if !self.fs.exists(&p[0]).await || !self.fs.exists(&p[1]).await {
                return Ok(false);
            }
            let left = self.fs.real_path(&p[0]).unwrap_or_else(|| normalized(&p[0]));
            let right = self.fs.real_path(&p[1]).unwrap_or_else(|| normalized(&p[1]));
            Ok(left == right)
        })
        .await
    }

    // Single versioned file.

    /// Open a handle on this version of `path` (or an older one).
    ///
    /// The caller owns the handle and must `close` it to persist writes.
    pub async fn new_file(&self, path: impl AsRef<Path>, mode: OpenMode) -> io::Result<FileHandle> {
        self.single(Operation::New, path.as_ref(), |p| {
            FileHandle::open(Arc::clone(&self.fs), p, mode)
        })
        .await
    }

    /// Open `path`, run `body` on the handle, then close it.
    ///
    /// The handle is closed (and flushed) whether or not `body` succeeds. An
    /// error from `body` takes precedence over one from closing.
    pub async fn open<T>(
        &self,
        path: impl AsRef<Path>,
        mode: OpenMode,
        body: impl FnOnce(&mut FileHandle) -> io::Result<T>,
    ) -> io::Result<T> {
        let mut handle = self
            .single(Operation::Open, path.as_ref(), |p| {
                FileHandle::open(Arc::clone(&self.fs), p, mode)
            })
            .await?;

        let result = body(&mut handle);
        let closed = handle.close().await;
        let value = result?;
        closed?;
        Ok(value)
    }

    pub async fn read(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        self.single(Operation::Read, path.as_ref(), |p| async move { self.fs.read(&p).await })
            .await
    }

    pub async fn read_to_string(&self, path: impl AsRef<Path>) -> io::Result<String> {
        self.single(Operation::ReadToString, path.as_ref(), |p| async move {
            let bytes = self.fs.read(&p).await?;
            String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
        })
        .await
    }

    /// Lines of the file, terminators stripped.
    pub async fn readlines(&self, path: impl AsRef<Path>) -> io::Result<Vec<String>> {
        self.single(Operation::Readlines, path.as_ref(), |p| async move {
            let bytes = self.fs.read(&p).await?;
            let text = String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            Ok::<_, io::Error>(text.lines().map(str::to_string).collect())
        })
        .await
    }

    /// Replace the file's contents. Returns the number of bytes written.
    pub async fn write(&self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> io::Result<usize> {
        let data = data.as_ref();
        self.single(Operation::Write, path.as_ref(), |p| async move {
            self.fs.write(&p, data).await?;
            Ok::<_, io::Error>(data.len())
        })
        .await
    }

    pub async fn append(&self, path: impl AsRef<Path>, data: impl AsRef<[u8]>) -> io::Result<usize> {
        let data = data.as_ref();
        self.single(Operation::Append, path.as_ref(), |p| async move {
            self.fs.append(&p, data).await?;
            Ok::<_, io::Error>(data.len())
        })
        .await
    }

    pub async fn truncate(&self, path: impl AsRef<Path>, len: u64) -> io::Result<()> {
        self.single(Operation::Truncate, path.as_ref(), |p| async move {
            self.fs.truncate(&p, len).await
        })
        .await
    }

    pub async fn stat(&self, path: impl AsRef<Path>) -> io::Result<DirEntry> {
        self.single(Operation::Stat, path.as_ref(), |p| async move { self.fs.stat(&p).await })
            .await
    }

    pub async fn lstat(&self, path: impl AsRef<Path>) -> io::Result<DirEntry> {
        self.single(Operation::Lstat, path.as_ref(), |p| async move { self.fs.lstat(&p).await })
            .await
    }

    pub async fn size(&self, path: impl AsRef<Path>) -> io::Result<u64> {
        self.single(Operation::Size, path.as_ref(), |p| async move {
            Ok::<_, io::Error>(self.fs.stat(&p).await?.size)
        })
        .await
    }

    /// Whether this version exists and is a regular file. Never falls back.
    pub async fn is_file(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        self.single(Operation::IsFile, path.as_ref(), |p| async move {
            match self.fs.stat(&p).await {
                Ok(entry) => Ok(entry.is_file()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Whether this version exists with zero length. Never falls back.
    pub async fn is_empty(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        self.single(Operation::IsEmpty, path.as_ref(), |p| async move {
            match self.fs.stat(&p).await {
                Ok(entry) => Ok(entry.is_file() && entry.size == 0),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
    }

    /// Whether this exact version exists. Never falls back.
    ///
    /// Only `NotFound` means absent; any other failure is returned.
    pub async fn exists(&self, path: impl AsRef<Path>) -> io::Result<bool> {
        self.single(Operation::Exists, path.as_ref(), |p| async move {
            match self.fs.stat(&p).await {
                Ok(_) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        })
        .await
    }

    pub async fn mtime(&self, path: impl AsRef<Path>) -> io::Result<SystemTime> {
        self.single(Operation::Mtime, path.as_ref(), |p| async move {
            self.fs.stat(&p).await?.modified.ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("no modification time for {}", p.display()),
                )
            })
        })
        .await
    }

    pub async fn readlink(&self, path: impl AsRef<Path>) -> io::Result<PathBuf> {
        self.single(Operation::Readlink, path.as_ref(), |p| async move { self.fs.read_link(&p).await })
            .await
    }

    // Many versioned files.

    /// Remove this version of every path, stopping at the first failure.
    pub async fn delete(&self, paths: &[PathBuf]) -> io::Result<usize> {
        self.invoke(Operation::Delete, paths.to_vec(), |p| async move { self.fs.unlink(&p).await })
            .await
    }

    pub async fn unlink(&self, paths: &[PathBuf]) -> io::Result<usize> {
        self.invoke(Operation::Unlink, paths.to_vec(), |p| async move { self.fs.unlink(&p).await })
            .await
    }

    /// Remove this version of every path that exists; returns the count removed.
    pub async fn safe_unlink(&self, paths: &[PathBuf]) -> io::Result<usize> {
        self.invoke(Operation::SafeUnlink, paths.to_vec(), |p| async move {
            self.fs.safe_unlink(&p).await
        })
        .await
    }
}

/// Lexical normalization for comparing paths on virtual backends.
fn normalized(path: &Path) -> PathBuf {
    use std::path::Component;
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;
    use async_trait::async_trait;
    use std::sync::Mutex;

    const FLAT_GLOB: &str = "[0-9][0-9][0-9][0-9].[0-9][0-9].[0-9][0-9]-";

    /// Wraps a `MemoryFs`, recording primitive calls and optionally failing reads.
    struct RecordingFs {
        inner: MemoryFs,
        calls: Mutex<Vec<String>>,
        read_error: Option<io::ErrorKind>,
        stat_error: Option<io::ErrorKind>,
    }

    impl RecordingFs {
        fn new() -> Self {
            Self {
                inner: MemoryFs::new(),
                calls: Mutex::new(Vec::new()),
                read_error: None,
                stat_error: None,
            }
        }

        fn failing_reads(kind: io::ErrorKind) -> Self {
            Self {
                read_error: Some(kind),
                ..Self::new()
            }
        }

        fn failing_stats(kind: io::ErrorKind) -> Self {
            Self {
                stat_error: Some(kind),
                ..Self::new()
            }
        }

        fn record(&self, op: &str, path: &Path) {
            self.calls.lock().unwrap().push(format!("{op} {}", path.display()));
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn scans(&self) -> usize {
            self.calls().iter().filter(|c| c.starts_with("list ")).count()
        }
    }

    #[async_trait]
    impl Filesystem for RecordingFs {
        async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.record("read", path);
            if let Some(kind) = self.read_error {
                return Err(io::Error::new(kind, "injected"));
            }
            self.inner.read(path).await
        }

        async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
            self.record("write", path);
            self.inner.write(path, data).await
        }

        async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
            self.record("list", path);
            self.inner.list(path).await
        }

        async fn stat(&self, path: &Path) -> io::Result<DirEntry> {
            self.record("stat", path);
            if let Some(kind) = self.stat_error {
                return Err(io::Error::new(kind, "injected"));
            }
            self.inner.stat(path).await
        }

        async fn mkdir(&self, path: &Path) -> io::Result<()> {
            self.record("mkdir", path);
            self.inner.mkdir(path).await
        }

        async fn remove(&self, path: &Path) -> io::Result<()> {
            self.record("remove", path);
            self.inner.remove(path).await
        }

        fn read_only(&self) -> bool {
            false
        }
    }

    fn access(fs: Arc<RecordingFs>, fallback: bool) -> VersionedFileAccess {
        let mut builder = VersionedFileAccess::builder(fs).tag("1999.09.09");
        if fallback {
            builder = builder.fallback_glob(FLAT_GLOB);
        }
        builder.build().unwrap()
    }

    #[test]
    fn builder_requires_a_tag() {
        let fs: Arc<dyn Filesystem> = Arc::new(MemoryFs::new());
        let err = VersionedFileAccess::builder(fs.clone()).build().unwrap_err();
        assert_eq!(err, UsageError::MissingTag);
        let err = VersionedFileAccess::builder(fs).tag("").build().unwrap_err();
        assert_eq!(err, UsageError::MissingTag);
    }

    #[test]
    fn builder_rejects_unusable_fallback_globs() {
        let fs: Arc<dyn Filesystem> = Arc::new(MemoryFs::new());
        for bad in ["", "/abs-"] {
            let err = VersionedFileAccess::builder(fs.clone())
                .tag("t")
                .fallback_glob(bad)
                .build()
                .unwrap_err();
            assert_eq!(err, UsageError::InvalidFallbackGlob(bad.to_string()));
        }
    }

    #[test]
    fn routing_follows_the_table() {
        let fs = Arc::new(RecordingFs::new());
        let va = access(fs, false);
        let paths = vec![PathBuf::from("a"), PathBuf::from("b")];

        assert_eq!(va.route(Operation::Rename, &paths), paths);
        assert_eq!(
            va.route(Operation::Read, &paths),
            vec![PathBuf::from("./1999.09.09-a"), PathBuf::from("b")]
        );
        assert_eq!(
            va.route(Operation::Unlink, &paths),
            vec![PathBuf::from("./1999.09.09-a"), PathBuf::from("./1999.09.09-b")]
        );
    }

    #[tokio::test]
    async fn pass_through_touches_raw_paths() {
        let fs = Arc::new(RecordingFs::new());
        fs.inner.write(Path::new("plain"), b"x").await.unwrap();
        let va = access(fs.clone(), true);

        va.rename("plain", "moved").await.unwrap();
        assert!(fs.inner.exists(Path::new("moved")).await);
        assert!(!fs.inner.exists(Path::new("plain")).await);
        assert!(fs.calls().iter().all(|c| !c.contains("1999.09.09")));
        assert_eq!(va.basename("dir/f.txt"), OsString::from("f.txt"));
        assert_eq!(va.extname("dir/f.txt"), ".txt");
        assert_eq!(va.extname(".bashrc"), "");
    }

    #[tokio::test]
    async fn bulk_rewrites_every_path_without_fallback() {
        let fs = Arc::new(RecordingFs::new());
        for name in ["1999.09.09-a", "1999.09.09-b", "1999.09.01-c"] {
            fs.inner.write(Path::new(name), b"").await.unwrap();
        }
        let va = access(fs.clone(), true);

        let removed = va
            .safe_unlink(&[PathBuf::from("a"), PathBuf::from("b"), PathBuf::from("c")])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(fs.inner.exists(Path::new("1999.09.01-c")).await);
        assert_eq!(fs.scans(), 0);

        let err = va.unlink(&[PathBuf::from("c")]).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(fs.scans(), 0);
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_older_version() {
        let fs = Arc::new(RecordingFs::new());
        fs.inner.write(Path::new("1999.09.01-f"), b"older").await.unwrap();
        let va = access(fs.clone(), true);

        assert_eq!(va.read("f").await.unwrap(), b"older");
        assert_eq!(
            fs.calls(),
            vec!["read ./1999.09.09-f", "list .", "read ./1999.09.01-f"]
        );
    }

    #[tokio::test]
    async fn fallback_disabled_means_no_scan() {
        let fs = Arc::new(RecordingFs::new());
        fs.inner.write(Path::new("1999.09.01-f"), b"older").await.unwrap();
        let va = access(fs.clone(), false);

        let err = va.read("f").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert_eq!(fs.scans(), 0);
    }

    #[tokio::test]
    async fn other_errors_never_scan() {
        let fs = Arc::new(RecordingFs::failing_reads(io::ErrorKind::PermissionDenied));
        let va = access(fs.clone(), true);

        let err = va.read("f").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(fs.scans(), 0);
        assert_eq!(fs.calls(), vec!["read ./1999.09.09-f"]);
    }

    #[tokio::test]
    async fn predicates_report_the_exact_version() {
        let fs = Arc::new(RecordingFs::new());
        fs.inner.write(Path::new("1999.09.01-f"), b"").await.unwrap();
        let va = access(fs.clone(), true);

        assert!(!va.exists("f").await.unwrap());
        assert!(!va.is_file("f").await.unwrap());
        assert!(!va.is_empty("f").await.unwrap());
        assert_eq!(fs.scans(), 0);
    }

    #[tokio::test]
    async fn predicates_surface_errors_other_than_absence() {
        let fs = Arc::new(RecordingFs::failing_stats(io::ErrorKind::PermissionDenied));
        fs.inner.write(Path::new("1999.09.09-f"), b"x").await.unwrap();
        let va = access(fs.clone(), true);

        for err in [
            va.exists("f").await.unwrap_err(),
            va.is_file("f").await.unwrap_err(),
            va.is_empty("f").await.unwrap_err(),
        ] {
            assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        }
        assert_eq!(fs.scans(), 0);
    }

    #[tokio::test]
    async fn scoped_open_closes_when_body_fails() {
        let fs = Arc::new(RecordingFs::new());
        let va = access(fs.clone(), false);

        let result: io::Result<()> = va
            .open("f", OpenMode::Write, |h| {
                h.write_str("partial")?;
                Err(io::Error::other("body failed"))
            })
            .await;
        assert_eq!(result.unwrap_err().to_string(), "body failed");
        assert_eq!(fs.inner.read(Path::new("1999.09.09-f")).await.unwrap(), b"partial");
    }

    #[tokio::test]
    async fn new_file_reports_physical_path() {
        let fs = Arc::new(RecordingFs::new());
        let va = access(fs, false);

        let handle = va.new_file("dir/f", OpenMode::Write).await.unwrap();
        assert_eq!(handle.path(), Path::new("dir/1999.09.09-f"));
        handle.close().await.unwrap();
    }
}
