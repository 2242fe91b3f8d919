//! Real directories on disk.
//!
//! A `LocalFs` is rooted at one directory. Every path handed to it is taken
//! relative to that root, and paths that would leave it are refused with
//! `PermissionDenied`.

use super::traits::{DirEntry, DirEntryKind, Filesystem};
use async_trait::async_trait;
use std::ffi::{OsStr, OsString};
use std::fs::Metadata;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Disk-backed storage under `root`.
///
/// With `root` at `/srv/reports`, `read("./2012.11.02-daily.csv")` reads
/// `/srv/reports/2012.11.02-daily.csv`.
#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    read_only: bool,
}

fn escapes_root(detail: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, detail.into())
}

/// Name `path` in an OS error. The kind is kept, so `NotFound` still
/// starts a fallback search.
fn at(path: &Path) -> impl FnOnce(io::Error) -> io::Error + '_ {
    move |err| io::Error::new(err.kind(), format!("{err}: {}", path.display()))
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    /// A root that refuses every mutation.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::new(root)
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `root` joined with `path`, with `.` and `..` folded away.
    ///
    /// Leading `/` is ignored. Climbing above the root is an error; symlinks
    /// are left alone.
    fn lexical(&self, path: &Path) -> io::Result<PathBuf> {
        let mut out = self.root.clone();
        let mut depth = 0usize;
        for component in path.components() {
            match component {
                Component::Normal(part) => {
                    out.push(part);
                    depth += 1;
                }
                Component::ParentDir if depth == 0 => {
                    return Err(escapes_root(format!("path escapes root: {}", path.display())));
                }
                Component::ParentDir => {
                    out.pop();
                    depth -= 1;
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        Ok(out)
    }

    /// Like [`lexical`](Self::lexical), but follows symlinks in the part of
    /// the path that exists and checks the result is still under the root.
    fn resolve(&self, path: &Path) -> io::Result<PathBuf> {
        let lexical = self.lexical(path)?;

        let mut existing = lexical.as_path();
        let mut missing = Vec::new();
        while !existing.exists() {
            let (Some(parent), Some(name)) = (existing.parent(), existing.file_name()) else {
                break;
            };
            missing.push(name.to_owned());
            existing = parent;
        }

        let mut resolved = existing.canonicalize().unwrap_or_else(|_| existing.to_path_buf());
        resolved.extend(missing.iter().rev());

        let root = self.root.canonicalize().unwrap_or_else(|_| self.root.clone());
        if resolved.starts_with(&root) {
            Ok(resolved)
        } else {
            Err(escapes_root(format!(
                "{} resolves outside {}",
                path.display(),
                root.display()
            )))
        }
    }

    /// Resolve a path about to be written, creating its parent directory.
    async fn writable(&self, path: &Path) -> io::Result<PathBuf> {
        if self.read_only {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "filesystem is read-only",
            ));
        }
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await.map_err(at(path))?;
        }
        Ok(full)
    }

    fn guard_read_only(&self) -> io::Result<()> {
        if self.read_only {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "filesystem is read-only",
            ))
        } else {
            Ok(())
        }
    }
}

/// Build a `DirEntry` from metadata. Special files count as files.
async fn to_entry(name: OsString, meta: &Metadata, full: &Path) -> DirEntry {
    let file_type = meta.file_type();
    let (kind, symlink_target) = if file_type.is_symlink() {
        (DirEntryKind::Symlink, fs::read_link(full).await.ok())
    } else if file_type.is_dir() {
        (DirEntryKind::Directory, None)
    } else {
        (DirEntryKind::File, None)
    };

    DirEntry {
        name,
        kind,
        size: meta.len(),
        modified: meta.modified().ok(),
        permissions: mode_bits(meta),
        symlink_target,
    }
}

#[cfg(unix)]
fn mode_bits(meta: &Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(meta.permissions().mode())
}

#[cfg(not(unix))]
fn mode_bits(_meta: &Metadata) -> Option<u32> {
    None
}

fn display_name(path: &Path) -> OsString {
    path.file_name().map_or_else(|| OsString::from("/"), OsStr::to_os_string)
}

#[async_trait]
impl Filesystem for LocalFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path)?).await.map_err(at(path))
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let full = self.writable(path).await?;
        fs::write(full, data).await.map_err(at(path))
    }

    async fn append(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let full = self.writable(path).await?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(full)
            .await
            .map_err(at(path))?;
        file.write_all(data).await.map_err(at(path))?;
        file.flush().await.map_err(at(path))
    }

    /// Entries sorted by name. Symlinks are reported as links.
    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let mut reader = fs::read_dir(self.resolve(path)?).await.map_err(at(path))?;
        let mut entries = Vec::new();
        while let Some(item) = reader.next_entry().await.map_err(at(path))? {
            let full = item.path();
            let meta = fs::symlink_metadata(&full).await.map_err(at(&full))?;
            entries.push(to_entry(item.file_name(), &meta, &full).await);
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &Path) -> io::Result<DirEntry> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await.map_err(at(path))?;
        Ok(to_entry(display_name(path), &meta, &full).await)
    }

    async fn lstat(&self, path: &Path) -> io::Result<DirEntry> {
        let full = self.lexical(path)?;
        let meta = fs::symlink_metadata(&full).await.map_err(at(path))?;
        Ok(to_entry(display_name(path), &meta, &full).await)
    }

    async fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(self.lexical(path)?).await.map_err(at(path))
    }

    /// Absolute targets are refused: the OS would interpret them outside the root.
    async fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        self.guard_read_only()?;
        if target.is_absolute() {
            return Err(escapes_root(format!(
                "absolute symlink target {} escapes root",
                target.display()
            )));
        }

        let link_path = self.lexical(link)?;
        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent).await.map_err(at(link))?;
        }

        #[cfg(unix)]
        let made = fs::symlink(target, &link_path).await;
        #[cfg(windows)]
        let made = fs::symlink_file(target, &link_path).await;
        made.map_err(at(link))
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        self.guard_read_only()?;
        fs::create_dir_all(self.resolve(path)?).await.map_err(at(path))
    }

    /// Removes files and empty directories.
    async fn remove(&self, path: &Path) -> io::Result<()> {
        self.guard_read_only()?;
        let full = self.resolve(path)?;
        let removed = if fs::metadata(&full).await.map_err(at(path))?.is_dir() {
            fs::remove_dir(full).await
        } else {
            fs::remove_file(full).await
        };
        removed.map_err(at(path))
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let source = self.resolve(from)?;
        let dest = self.writable(to).await?;
        fs::rename(source, dest).await.map_err(at(from))
    }

    async fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        let source = self.resolve(from)?;
        let dest = self.writable(to).await?;
        fs::copy(source, dest).await.map_err(at(from))
    }

    async fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
        self.guard_read_only()?;
        let file = fs::OpenOptions::new()
            .write(true)
            .open(self.resolve(path)?)
            .await
            .map_err(at(path))?;
        file.set_len(len).await.map_err(at(path))
    }

    #[cfg(unix)]
    async fn set_permissions(&self, path: &Path, mode: u32) -> io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        self.guard_read_only()?;
        fs::set_permissions(self.resolve(path)?, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(at(path))
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn real_path(&self, path: &Path) -> Option<PathBuf> {
        self.resolve(path).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn rooted() -> (LocalFs, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        (LocalFs::new(dir.path()), dir)
    }

    #[rstest]
    #[case::flat("./1999.09.09-a.txt", "1999.09.09-a.txt")]
    #[case::nested("./1999.09.09/a.txt", "1999.09.09/a.txt")]
    #[case::rooted("/reports/1999.09.09-a.csv", "reports/1999.09.09-a.csv")]
    #[tokio::test]
    async fn writes_land_under_root(#[case] written: &str, #[case] on_disk: &str) {
        let (fs, dir) = rooted();

        fs.write(Path::new(written), b"versioned").await.unwrap();
        assert_eq!(std::fs::read(dir.path().join(on_disk)).unwrap(), b"versioned");
        assert_eq!(fs.read(Path::new(on_disk)).await.unwrap(), b"versioned");
    }

    #[tokio::test]
    async fn missing_files_and_dirs_are_not_found() {
        let (fs, _dir) = rooted();

        for path in ["./nope.txt", "./missing/dir/nope.txt"] {
            let err = fs.read(Path::new(path)).await.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::NotFound, "{path}");
        }
        let err = fs.list(Path::new("missing")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[rstest]
    #[case::read("./1979.12.20-test.txt")]
    #[case::nested("logs/1979.12.20/app.log")]
    #[tokio::test]
    async fn errors_name_the_requested_path(#[case] path: &str) {
        let (fs, _dir) = rooted();

        for err in [
            fs.read(Path::new(path)).await.unwrap_err(),
            fs.stat(Path::new(path)).await.unwrap_err(),
            fs.remove(Path::new(path)).await.unwrap_err(),
        ] {
            assert_eq!(err.kind(), io::ErrorKind::NotFound);
            assert!(err.to_string().ends_with(&format!(": {path}")), "{err}");
        }
    }

    #[tokio::test]
    async fn append_creates_then_extends() {
        let (fs, _dir) = rooted();

        fs.append(Path::new("journal"), b"one\n").await.unwrap();
        fs.append(Path::new("journal"), b"two\n").await.unwrap();
        assert_eq!(fs.read(Path::new("journal")).await.unwrap(), b"one\ntwo\n");
    }

    #[tokio::test]
    async fn read_only_root_refuses_mutation() {
        let (_, dir) = rooted();
        std::fs::write(dir.path().join("kept"), b"x").unwrap();
        let fs = LocalFs::read_only(dir.path());

        assert!(fs.read_only());
        assert_eq!(fs.read(Path::new("kept")).await.unwrap(), b"x");
        for err in [
            fs.write(Path::new("new"), b"data").await.unwrap_err(),
            fs.remove(Path::new("kept")).await.unwrap_err(),
            fs.mkdir(Path::new("d")).await.unwrap_err(),
        ] {
            assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        }
    }

    #[tokio::test]
    async fn listing_is_sorted_and_typed() {
        let (fs, _dir) = rooted();

        fs.write(Path::new("1999.09.09-f"), b"b").await.unwrap();
        fs.write(Path::new("1983.02.01-f"), b"a").await.unwrap();
        fs.mkdir(Path::new("2001.01.01")).await.unwrap();

        let entries = fs.list(Path::new(".")).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.to_str().unwrap()).collect();
        assert_eq!(names, vec!["1983.02.01-f", "1999.09.09-f", "2001.01.01"]);
        assert!(entries[0].is_file());
        assert!(entries[2].is_dir());
    }

    #[tokio::test]
    async fn stat_reports_size_and_kind() {
        let (fs, _dir) = rooted();

        fs.write(Path::new("file.txt"), b"content").await.unwrap();
        fs.mkdir(Path::new("dir")).await.unwrap();

        let file = fs.stat(Path::new("file.txt")).await.unwrap();
        assert!(file.is_file());
        assert_eq!(file.name, "file.txt");
        assert_eq!(file.size, 7);
        assert!(file.modified.is_some());

        assert!(fs.stat(Path::new("dir")).await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn unlink_removes_every_path() {
        let (fs, _dir) = rooted();
        let paths = [PathBuf::from("a"), PathBuf::from("b")];
        for p in &paths {
            fs.write(p, b"").await.unwrap();
        }

        assert_eq!(fs.unlink(&paths).await.unwrap(), 2);
        for p in &paths {
            assert!(!fs.exists(p).await);
        }
    }

    #[tokio::test]
    async fn truncate_and_copy() {
        let (fs, _dir) = rooted();

        fs.write(Path::new("t.txt"), b"abcdef").await.unwrap();
        fs.truncate(Path::new("t.txt"), 3).await.unwrap();
        assert_eq!(fs.read(Path::new("t.txt")).await.unwrap(), b"abc");

        assert_eq!(fs.copy(Path::new("t.txt"), Path::new("sub/u.txt")).await.unwrap(), 3);
        assert_eq!(fs.read(Path::new("sub/u.txt")).await.unwrap(), b"abc");
    }

    #[rstest]
    #[case::dotdot("../../../etc/passwd")]
    #[case::sneaky("a/../../outside")]
    #[tokio::test]
    async fn escaping_the_root_is_denied(#[case] path: &str) {
        let (fs, _dir) = rooted();

        let err = fs.read(Path::new(path)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn symlinks_stay_relative() {
        let (fs, _dir) = rooted();
        fs.write(Path::new("1999.09.09-f"), b"x").await.unwrap();

        fs.symlink(Path::new("1999.09.09-f"), Path::new("latest")).await.unwrap();
        assert_eq!(fs.read_link(Path::new("latest")).await.unwrap(), PathBuf::from("1999.09.09-f"));
        assert!(fs.lstat(Path::new("latest")).await.unwrap().is_symlink());
        assert!(fs.stat(Path::new("latest")).await.unwrap().is_file());

        let err = fs.symlink(Path::new("/etc/passwd"), Path::new("bad")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn set_permissions_changes_mode() {
        let (fs, _dir) = rooted();

        fs.write(Path::new("p.txt"), b"x").await.unwrap();
        fs.set_permissions(Path::new("p.txt"), 0o600).await.unwrap();
        let entry = fs.stat(Path::new("p.txt")).await.unwrap();
        assert_eq!(entry.permissions.map(|m| m & 0o777), Some(0o600));
    }
}
