//! Pathname expansion: turn a path pattern into the existing paths it names.
//!
//! Each component of the pattern is handled in turn. Literal components are
//! appended as-is; components with metacharacters are matched against the
//! listing of every directory reached so far. Wildcards never match a leading
//! `.` unless the pattern component itself starts with one. Symlinks to
//! directories are descended like directories.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::glob::{contains_glob, glob_match};
use crate::{GlobDirEntry, GlobError, GlobFs};

/// Expand `pattern` against `fs`, returning matching paths sorted ascending.
///
/// Returned paths keep the pattern's own prefix, so `./[0-9]*-f` yields paths
/// like `./1983.01.01-f`. Directories that are missing or not listable simply
/// contribute no matches. Other listing errors are returned.
pub async fn expand<F: GlobFs + ?Sized>(fs: &F, pattern: &Path) -> Result<Vec<PathBuf>, GlobError> {
    let components: Vec<Component<'_>> = pattern.components().collect();
    let mut frontier = vec![PathBuf::new()];
    let mut verified = false;

    for (idx, component) in components.iter().enumerate() {
        let is_last = idx + 1 == components.len();
        let segment = match component {
            Component::Normal(s) if contains_glob(s) => Some(*s),
            _ => None,
        };

        let Some(segment) = segment else {
            for base in &mut frontier {
                base.push(component.as_os_str());
            }
            verified = false;
            continue;
        };

        let mut next = Vec::new();
        for base in &frontier {
            let dir = if base.as_os_str().is_empty() { Path::new(".") } else { base.as_path() };
            let entries = match fs.list_dir(dir).await {
                Ok(entries) => entries,
                Err(GlobError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            for entry in entries {
                let name = entry.name();
                if hidden(name) && !hidden(segment) {
                    continue;
                }
                if !glob_match(segment, name) {
                    continue;
                }
                let path = base.join(name);
                let (is_dir, is_link) = (entry.is_dir(), entry.is_symlink());
                if !is_last && !is_dir && !(is_link && fs.is_dir(&path).await) {
                    continue;
                }
                next.push(path);
            }
        }
        frontier = next;
        verified = true;
        if frontier.is_empty() {
            break;
        }
    }

    let mut matches = Vec::with_capacity(frontier.len());
    if verified {
        matches = frontier;
    } else {
        for path in frontier {
            if !path.as_os_str().is_empty() && fs.exists(&path).await {
                matches.push(path);
            }
        }
    }

    matches.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));
    matches.dedup();
    Ok(matches)
}

fn hidden(name: &OsStr) -> bool {
    name.as_encoded_bytes().first() == Some(&b'.')
}
