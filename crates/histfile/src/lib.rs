//! histfile: transparent access to version-tagged copies of files.
//!
//! Callers name files logically (`reports/daily.csv`); a
//! [`VersionedFileAccess`] pinned to a version tag maps each name to its
//! physical copy (`reports/2012.11.02-daily.csv`, or
//! `reports/2012.11.02/daily.csv` in nested layout). When a single-file
//! operation hits a missing copy and a fallback pattern is configured, the
//! newest older copy is used instead.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use histfile::{LocalFs, VersionSelector};
//!
//! let selector = VersionSelector::new(Arc::new(LocalFs::new("/srv/reports")));
//! let today = selector.today()?;
//! today.write("daily.csv", "a,b\n").await?;
//!
//! let last_week = selector.days_ago(7)?;
//! let csv = last_week.read_to_string("daily.csv").await?;
//! # let _ = csv;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`ops`]: the operation table deciding how each operation's filenames are treated
//! - [`rewrite`]: logical to physical path mapping
//! - [`fallback`]: search for older versions
//! - [`access`]: `VersionedFileAccess`, the dispatcher
//! - [`selector`]: date-keyed accessors
//! - [`vfs`]: storage backends and file handles
//! - [`config`]: TOML configuration

pub mod access;
pub mod config;
pub mod error;
pub mod fallback;
pub mod ops;
pub mod rewrite;
pub mod selector;
pub mod vfs;

pub use access::{VersionedFileAccess, VersionedFileAccessBuilder};
pub use config::{AccessConfig, HistfileConfig, SelectorConfig};
pub use error::UsageError;
pub use fallback::FallbackSearch;
pub use ops::{Operation, OperationClass, UnknownOperation};
pub use rewrite::{LayoutMode, PathRewriter, VersionTag, rewrite};
pub use selector::{DATE_GLOB, DATE_TAG_FORMAT, VersionSelector, VersionStamp, date_fallback_glob};
pub use vfs::{DirEntry, DirEntryKind, FileHandle, Filesystem, LocalFs, MemoryFs, OpenMode};
