//! The operation table.
//!
//! Every file operation `VersionedFileAccess` exposes is listed here exactly
//! once, together with how its filename arguments are treated:
//!
//! | Class | Filename arguments |
//! |-------|--------------------|
//! | `PassThrough` | forwarded untouched |
//! | `SingleFile` | first one rewritten, older versions tried on `NotFound` |
//! | `BulkFile` | all rewritten, no fallback |
//!
//! The table is a `match`, so adding an `Operation` without classifying it
//! does not compile.

use std::fmt;
use std::str::FromStr;

/// How an operation's filename arguments are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    PassThrough,
    SingleFile,
    BulkFile,
}

macro_rules! operations {
    ($($variant:ident => $name:literal,)*) => {
        /// A file operation exposed by `VersionedFileAccess`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operation {
            $($variant,)*
        }

        impl Operation {
            /// Every operation, in declaration order.
            pub const ALL: &'static [Operation] = &[$(Operation::$variant,)*];

            /// The operation's canonical snake_case name.
            pub fn name(self) -> &'static str {
                match self {
                    $(Operation::$variant => $name,)*
                }
            }
        }

        impl FromStr for Operation {
            type Err = UnknownOperation;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Operation::$variant),)*
                    _ => Err(UnknownOperation(s.to_string())),
                }
            }
        }
    };
}

operations! {
    // Version-agnostic
    AbsolutePath => "absolute_path",
    Basename => "basename",
    Chmod => "chmod",
    Compare => "compare",
    Copy => "copy",
    Dirname => "dirname",
    Extname => "extname",
    Fnmatch => "fnmatch",
    Identical => "identical",
    IsDirectory => "is_directory",
    Join => "join",
    Link => "link",
    Makedirs => "makedirs",
    Realpath => "realpath",
    Rename => "rename",
    Split => "split",
    // One file
    New => "new",
    Open => "open",
    Read => "read",
    ReadToString => "read_to_string",
    Readlines => "readlines",
    Write => "write",
    Append => "append",
    Truncate => "truncate",
    Stat => "stat",
    Lstat => "lstat",
    Size => "size",
    IsFile => "is_file",
    IsEmpty => "is_empty",
    Exists => "exists",
    Mtime => "mtime",
    Readlink => "readlink",
    // Many files
    Delete => "delete",
    Unlink => "unlink",
    SafeUnlink => "safe_unlink",
}

impl Operation {
    /// Look up the class of this operation.
    pub fn class(self) -> OperationClass {
        match self {
            Operation::AbsolutePath
            | Operation::Basename
            | Operation::Chmod
            | Operation::Compare
            | Operation::Copy
            | Operation::Dirname
            | Operation::Extname
            | Operation::Fnmatch
            | Operation::Identical
            | Operation::IsDirectory
            | Operation::Join
            | Operation::Link
            | Operation::Makedirs
            | Operation::Realpath
            | Operation::Rename
            | Operation::Split => OperationClass::PassThrough,

            Operation::New
            | Operation::Open
            | Operation::Read
            | Operation::ReadToString
            | Operation::Readlines
            | Operation::Write
            | Operation::Append
            | Operation::Truncate
            | Operation::Stat
            | Operation::Lstat
            | Operation::Size
            | Operation::IsFile
            | Operation::IsEmpty
            | Operation::Exists
            | Operation::Mtime
            | Operation::Readlink => OperationClass::SingleFile,

            Operation::Delete | Operation::Unlink | Operation::SafeUnlink => OperationClass::BulkFile,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned when parsing a name that is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);
