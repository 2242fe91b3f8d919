//! Ephemeral storage kept in a map.
//!
//! Handy for tests and for embedding versioned access without touching disk.
//! Directories are explicit nodes; writing a file creates missing parents.

use super::traits::{DirEntry, Filesystem};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
enum Node {
    File { bytes: Vec<u8>, mtime: SystemTime },
    Dir { mtime: SystemTime },
}

impl Node {
    fn empty_dir() -> Self {
        Node::Dir {
            mtime: SystemTime::now(),
        }
    }

    fn file(bytes: Vec<u8>) -> Self {
        Node::File {
            bytes,
            mtime: SystemTime::now(),
        }
    }

    fn describe(&self, key: &Path) -> DirEntry {
        let name = key.file_name().map_or_else(|| OsString::from("/"), OsStr::to_os_string);
        match self {
            Node::File { bytes, mtime } => DirEntry {
                modified: Some(*mtime),
                ..DirEntry::file(name, bytes.len() as u64)
            },
            Node::Dir { mtime } => DirEntry {
                modified: Some(*mtime),
                ..DirEntry::directory(name)
            },
        }
    }
}

/// Map key for `path`: relative, with `.`, `..` and leading `/` folded away.
///
/// The root is the empty path.
fn key(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }
    out
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("not found: {}", path.display()))
}

fn is_a_directory(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::IsADirectory, format!("is a directory: {}", path.display()))
}

fn not_a_directory(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotADirectory, format!("not a directory: {}", path.display()))
}

/// In-memory `Filesystem`. Contents vanish when dropped.
#[derive(Debug)]
pub struct MemoryFs {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(PathBuf::new(), Node::empty_dir());
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Insert directory nodes for every missing ancestor of `key`.
    fn make_parents(nodes: &mut BTreeMap<PathBuf, Node>, key: &Path) -> io::Result<()> {
        let Some(parent) = key.parent() else {
            return Ok(());
        };
        let mut dir = PathBuf::new();
        for part in parent.components() {
            dir.push(part);
            match nodes.get(&dir) {
                Some(Node::Dir { .. }) => {}
                Some(Node::File { .. }) => return Err(not_a_directory(&dir)),
                None => {
                    nodes.insert(dir.clone(), Node::empty_dir());
                }
            }
        }
        Ok(())
    }

    fn children<'a>(nodes: &'a BTreeMap<PathBuf, Node>, dir: &'a Path) -> impl Iterator<Item = (&'a PathBuf, &'a Node)> {
        nodes
            .iter()
            .filter(move |(k, _)| k.as_path() != dir && k.parent() == Some(dir))
    }
}

#[async_trait]
impl Filesystem for MemoryFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        match self.nodes.read().await.get(&key(path)) {
            Some(Node::File { bytes, .. }) => Ok(bytes.clone()),
            Some(Node::Dir { .. }) => Err(is_a_directory(path)),
            None => Err(not_found(path)),
        }
    }

    async fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let k = key(path);
        let mut nodes = self.nodes.write().await;
        if matches!(nodes.get(&k), Some(Node::Dir { .. })) {
            return Err(is_a_directory(path));
        }
        Self::make_parents(&mut nodes, &k)?;
        nodes.insert(k, Node::file(data.to_vec()));
        Ok(())
    }

    async fn append(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let k = key(path);
        let mut nodes = self.nodes.write().await;
        match nodes.get_mut(&k) {
            Some(Node::File { bytes, mtime }) => {
                bytes.extend_from_slice(data);
                *mtime = SystemTime::now();
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(is_a_directory(path)),
            None => {
                Self::make_parents(&mut nodes, &k)?;
                nodes.insert(k, Node::file(data.to_vec()));
                Ok(())
            }
        }
    }

    async fn list(&self, path: &Path) -> io::Result<Vec<DirEntry>> {
        let dir = key(path);
        let nodes = self.nodes.read().await;
        match nodes.get(&dir) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => return Err(not_a_directory(path)),
            None => return Err(not_found(path)),
        }

        // Map order is path order; within one directory that is name order.
        Ok(Self::children(&nodes, &dir)
            .map(|(k, node)| node.describe(k))
            .collect())
    }

    async fn stat(&self, path: &Path) -> io::Result<DirEntry> {
        let k = key(path);
        self.nodes
            .read()
            .await
            .get(&k)
            .map(|node| node.describe(&k))
            .ok_or_else(|| not_found(path))
    }

    async fn mkdir(&self, path: &Path) -> io::Result<()> {
        let k = key(path);
        let mut nodes = self.nodes.write().await;
        match nodes.get(&k) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("file exists: {}", path.display()),
            )),
            None => {
                Self::make_parents(&mut nodes, &k)?;
                nodes.insert(k, Node::empty_dir());
                Ok(())
            }
        }
    }

    /// Removes files and empty directories. The root cannot be removed.
    async fn remove(&self, path: &Path) -> io::Result<()> {
        let k = key(path);
        if k.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot remove root directory",
            ));
        }

        let mut nodes = self.nodes.write().await;
        if matches!(nodes.get(&k), Some(Node::Dir { .. })) && Self::children(&nodes, &k).next().is_some() {
            return Err(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                format!("directory not empty: {}", path.display()),
            ));
        }
        nodes.remove(&k).map(drop).ok_or_else(|| not_found(path))
    }

    /// Moves a file, or a directory with everything under it.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let src = key(from);
        let dst = key(to);
        if src.as_os_str().is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "cannot rename root directory",
            ));
        }

        let mut nodes = self.nodes.write().await;
        let moving_dir = match nodes.get(&src) {
            None => return Err(not_found(from)),
            Some(node) => matches!(node, Node::Dir { .. }),
        };
        match nodes.get(&dst) {
            Some(Node::Dir { .. }) if !moving_dir => return Err(is_a_directory(to)),
            Some(Node::File { .. }) if moving_dir => return Err(not_a_directory(to)),
            _ => {}
        }
        Self::make_parents(&mut nodes, &dst)?;

        let moved: Vec<PathBuf> = nodes.keys().filter(|k| k.starts_with(&src)).cloned().collect();
        for old in moved {
            let Ok(rest) = old.strip_prefix(&src) else {
                continue;
            };
            let new = if rest.as_os_str().is_empty() { dst.clone() } else { dst.join(rest) };
            if let Some(node) = nodes.remove(&old) {
                nodes.insert(new, node);
            }
        }
        Ok(())
    }

    /// Permission bits are not stored; this only checks the path exists.
    async fn set_permissions(&self, path: &Path, _mode: u32) -> io::Result<()> {
        if self.nodes.read().await.contains_key(&key(path)) {
            Ok(())
        } else {
            Err(not_found(path))
        }
    }

    fn read_only(&self) -> bool {
        false
    }
}
