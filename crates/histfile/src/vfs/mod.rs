//! Storage primitives that versioned access is layered on.
//!
//! - **Filesystem**: async trait every backend implements
//! - **LocalFs**: real filesystem access under a root directory
//! - **MemoryFs**: in-memory ephemeral storage (tests, embedding)
//! - **FileHandle**: buffered handle returned by `open`-style operations
//! - **VfsGlobFs**: adapter letting `histfile-glob` expand patterns on any backend

mod glob_fs;
mod handle;
mod local;
mod memory;
mod traits;

pub use glob_fs::VfsGlobFs;
pub use handle::{FileHandle, MAX_WRITE_GAP, OpenMode};
pub use local::LocalFs;
pub use memory::MemoryFs;
pub use traits::{DirEntry, DirEntryKind, Filesystem};
