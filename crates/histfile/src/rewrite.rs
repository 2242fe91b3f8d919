//! Logical filename → physical path rewriting.
//!
//! ```text
//! Flat:    reports/daily.csv  →  reports/2012.11.02-daily.csv
//! Nested:  reports/daily.csv  →  reports/2012.11.02/daily.csv
//! ```
//!
//! Pure string/path work: no I/O, no failure modes.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;

use crate::error::UsageError;

/// Where the version tag goes in a physical path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum LayoutMode {
    /// Tag prefixed to the basename: `dir/tag-name`.
    #[default]
    Flat,
    /// Tag as a subdirectory: `dir/tag/name`.
    Nested,
}

impl FromStr for LayoutMode {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" | "filename" => Ok(LayoutMode::Flat),
            "nested" | "subdir" | "subdirectory" => Ok(LayoutMode::Nested),
            _ => Err(UsageError::InvalidLayout(s.to_string())),
        }
    }
}

impl TryFrom<String> for LayoutMode {
    type Error = UsageError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for LayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayoutMode::Flat => f.write_str("flat"),
            LayoutMode::Nested => f.write_str("nested"),
        }
    }
}

/// A non-empty version discriminator, e.g. `1999.09.09`.
///
/// Fallback compares physical paths lexicographically, so tags must sort in
/// chronological order (fixed width, zero padded). That is on the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTag(String);

impl VersionTag {
    pub fn new(tag: impl Into<String>) -> Result<Self, UsageError> {
        let tag = tag.into();
        if tag.is_empty() {
            return Err(UsageError::MissingTag);
        }
        Ok(Self(tag))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Split a path into its directory (`.` when there is none) and basename.
///
/// Trailing separators are ignored. Paths without a final name component
/// (`/`, `..`) are returned whole as the basename.
pub fn split_path(path: &Path) -> (PathBuf, OsString) {
    match path.file_name() {
        Some(name) => {
            let dir = match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            (dir, name.to_os_string())
        }
        None => (PathBuf::from("."), path.as_os_str().to_os_string()),
    }
}

/// Rewrite a logical filename into the physical path for `tag`.
pub fn rewrite(raw: &Path, tag: &VersionTag, layout: LayoutMode) -> PathBuf {
    let (dir, base) = split_path(raw);
    match layout {
        LayoutMode::Flat => dir.join(prefixed(tag.as_str(), "-", &base)),
        LayoutMode::Nested => dir.join(tag.as_str()).join(base),
    }
}

/// `head` + `sep` + `name`, kept as an `OsString` so non-UTF-8 names survive.
pub(crate) fn prefixed(head: &str, sep: &str, name: &OsStr) -> OsString {
    let mut out = OsString::with_capacity(head.len() + sep.len() + name.len());
    out.push(head);
    out.push(sep);
    out.push(name);
    out
}

/// A tag and layout bound together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRewriter {
    tag: VersionTag,
    layout: LayoutMode,
}

impl PathRewriter {
    pub fn new(tag: VersionTag, layout: LayoutMode) -> Self {
        Self { tag, layout }
    }

    pub fn tag(&self) -> &VersionTag {
        &self.tag
    }

    pub fn layout(&self) -> LayoutMode {
        self.layout
    }

    /// Physical path of `raw` for this tag.
    pub fn rewrite(&self, raw: &Path) -> PathBuf {
        rewrite(raw, &self.tag, self.layout)
    }

    /// Directory that holds this version of `raw`.
    ///
    /// In Nested mode this is the directory that must exist before writing.
    pub fn version_dir(&self, raw: &Path) -> PathBuf {
        let (dir, _) = split_path(raw);
        match self.layout {
            LayoutMode::Flat => dir,
            LayoutMode::Nested => dir.join(self.tag.as_str()),
        }
    }
}
