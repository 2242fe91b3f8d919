//! Construction-time errors.
//!
//! Failures while touching storage are plain `std::io::Error`s straight from
//! the `Filesystem` backend; a versioned lookup that finds nothing looks
//! exactly like a direct access to the missing file. `UsageError` covers the
//! mistakes that are caught before any I/O happens.

use thiserror::Error;

/// Invalid arguments supplied when building a versioned accessor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("version tag needed")]
    MissingTag,
    #[error("offset {0} must be formattable as a date")]
    NotADate(String),
    #[error("invalid layout mode: {0} (expected flat or nested)")]
    InvalidLayout(String),
    #[error("invalid open mode: {0}")]
    InvalidMode(String),
    #[error("invalid fallback glob: {0}")]
    InvalidFallbackGlob(String),
}
