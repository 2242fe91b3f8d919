//! Buffered file handles.
//!
//! A `FileHandle` loads what it needs when opened, works on an in-memory
//! buffer, and pushes changes back through the owning `Filesystem` on
//! `flush`/`close`. Opening in a read-capable mode reads the file, so a
//! missing file surfaces as `NotFound` at open time.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use super::traits::Filesystem;
use crate::error::UsageError;

/// How far past the end of the buffer a write may start. The gap is
/// zero-filled in memory, so it has to stay small.
pub const MAX_WRITE_GAP: usize = 1 << 24;

/// How a file is opened, mirroring the classic `fopen` mode strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// `r`: read an existing file.
    Read,
    /// `w`: create or truncate, write only.
    Write,
    /// `a`: create if missing, writes go to the end.
    Append,
    /// `r+`: read and overwrite an existing file.
    ReadWrite,
    /// `w+`: create or truncate, read and write.
    WriteRead,
    /// `a+`: create if missing, read anywhere, writes go to the end.
    AppendRead,
}

impl OpenMode {
    pub fn readable(self) -> bool {
        !matches!(self, OpenMode::Write | OpenMode::Append)
    }

    pub fn writable(self) -> bool {
        self != OpenMode::Read
    }

    fn appends(self) -> bool {
        matches!(self, OpenMode::Append | OpenMode::AppendRead)
    }
}

impl FromStr for OpenMode {
    type Err = UsageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Binary flag is meaningless for byte buffers.
        let mode: String = s.chars().filter(|&c| c != 'b').collect();
        match mode.as_str() {
            "r" => Ok(OpenMode::Read),
            "w" => Ok(OpenMode::Write),
            "a" => Ok(OpenMode::Append),
            "r+" => Ok(OpenMode::ReadWrite),
            "w+" => Ok(OpenMode::WriteRead),
            "a+" => Ok(OpenMode::AppendRead),
            _ => Err(UsageError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OpenMode::Read => "r",
            OpenMode::Write => "w",
            OpenMode::Append => "a",
            OpenMode::ReadWrite => "r+",
            OpenMode::WriteRead => "w+",
            OpenMode::AppendRead => "a+",
        };
        f.write_str(s)
    }
}

/// An open file on some `Filesystem`.
///
/// Dropping a handle with unflushed writes discards them (with a warning);
/// call `close` to persist.
pub struct FileHandle {
    fs: Arc<dyn Filesystem>,
    path: PathBuf,
    mode: OpenMode,
    buffer: Vec<u8>,
    pos: usize,
    /// Append modes: bytes before this offset are already on storage.
    flushed_len: usize,
    dirty: bool,
}

impl fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("len", &self.buffer.len())
            .field("pos", &self.pos)
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl FileHandle {
    /// Open `path` on `fs`.
    pub async fn open(fs: Arc<dyn Filesystem>, path: impl Into<PathBuf>, mode: OpenMode) -> io::Result<Self> {
        let path = path.into();
        let buffer = match mode {
            OpenMode::Read | OpenMode::ReadWrite => fs.read(&path).await?,
            OpenMode::Write | OpenMode::WriteRead => {
                fs.write(&path, &[]).await?;
                Vec::new()
            }
            OpenMode::Append => {
                fs.append(&path, &[]).await?;
                Vec::new()
            }
            OpenMode::AppendRead => {
                fs.append(&path, &[]).await?;
                fs.read(&path).await?
            }
        };

        Ok(Self {
            fs,
            flushed_len: buffer.len(),
            path,
            mode,
            buffer,
            pos: 0,
            dirty: false,
        })
    }

    /// The physical path this handle was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// Read everything from the current position to the end.
    pub fn read_to_end(&mut self) -> io::Result<Vec<u8>> {
        self.check_readable()?;
        let start = self.pos.min(self.buffer.len());
        self.pos = self.buffer.len();
        Ok(self.buffer[start..].to_vec())
    }

    /// Read everything from the current position as UTF-8.
    pub fn read_to_string(&mut self) -> io::Result<String> {
        let bytes = self.read_to_end()?;
        String::from_utf8(bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Write bytes at the current position (or at the end in append modes).
    pub fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if !self.mode.writable() {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("not opened for writing: {}", self.path.display()),
            ));
        }

        if self.mode.appends() {
            self.buffer.extend_from_slice(data);
            self.pos = self.buffer.len();
        } else {
            let gap = self.pos.saturating_sub(self.buffer.len());
            let end = match self.pos.checked_add(data.len()) {
                Some(end) if gap <= MAX_WRITE_GAP => end,
                _ => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        format!("write offset {} is too far past the end of {}", self.pos, self.path.display()),
                    ));
                }
            };
            if end > self.buffer.len() {
                self.buffer.resize(end, 0);
            }
            self.buffer[self.pos..end].copy_from_slice(data);
            self.pos = end;
        }
        self.dirty = true;
        Ok(data.len())
    }

    /// Write a string.
    pub fn write_str(&mut self, s: &str) -> io::Result<usize> {
        self.write(s.as_bytes())
    }

    /// Move the cursor to an absolute byte offset.
    ///
    /// Any offset is accepted; a later `write` refuses one more than
    /// [`MAX_WRITE_GAP`] bytes past the end.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Push buffered writes to storage.
    pub async fn flush(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if self.mode.appends() {
            self.fs.append(&self.path, &self.buffer[self.flushed_len..]).await?;
        } else {
            self.fs.write(&self.path, &self.buffer).await?;
        }
        self.flushed_len = self.buffer.len();
        self.dirty = false;
        Ok(())
    }

    /// Flush and release the handle.
    pub async fn close(mut self) -> io::Result<()> {
        self.flush().await
    }

    fn check_readable(&self) -> io::Result<()> {
        if self.mode.readable() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("not opened for reading: {}", self.path.display()),
            ))
        }
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.dirty {
            tracing::warn!(
                path = %self.path.display(),
                bytes = self.buffer.len(),
                "file handle dropped with unflushed writes"
            );
        }
    }
}
