//! Bounded access to the on-disk copy of a target's executable.
//!
//! The on-disk image is the only thing this crate reads locally. It is
//! memory-mapped read-only, and both its size and the bytes copied out of it
//! are capped by [`IOLimits`].

pub mod error;

use crate::io::error::{IoError, Result};
use bytes::Bytes;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, trace, warn};

/// Defines the resource limits for local file access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IOLimits {
    /// The absolute maximum file size that can be opened.
    pub max_file_size: u64,
    /// The maximum total number of bytes copied out across all `read_at` calls.
    pub max_read_bytes: u64,
}

impl Default for IOLimits {
    fn default() -> Self {
        Self {
            max_file_size: 512 * 1024 * 1024, // 512MB
            max_read_bytes: 1024 * 1024,      // 1MB
        }
    }
}

/// A read-only, size-limited mapping of an executable file.
pub struct MappedFile {
    path: PathBuf,
    // None when the file size is zero; memmap cannot map empty files.
    mmap: Option<Mmap>,
    limits: IOLimits,
    bytes_read: u64,
}

impl MappedFile {
    /// Opens and maps a file.
    ///
    /// Fails with `IoError::FileTooLarge` if it exceeds `limits.max_file_size`.
    pub fn open<P: AsRef<Path>>(path: P, limits: IOLimits) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        debug!(
            path = %path.display(),
            size = file_size,
            limits.max_file_size = limits.max_file_size,
            "Mapping on-disk executable"
        );

        if file_size > limits.max_file_size {
            warn!(
                path = %path.display(),
                size = file_size,
                limit = limits.max_file_size,
                "Executable is too large"
            );
            return Err(IoError::FileTooLarge {
                limit: limits.max_file_size,
                found: file_size,
            });
        }

        let mmap = if file_size == 0 {
            None
        } else {
            // Safety: read-only map of a regular file; nothing here writes through it.
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Self {
            path: path.to_path_buf(),
            mmap,
            limits,
            bytes_read: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of the mapped file in bytes.
    pub fn size(&self) -> u64 {
        self.as_slice().len() as u64
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// The whole mapping, for parsers that work on borrowed slices.
    pub fn as_slice(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Copies exactly `len` bytes at `offset` out of the mapping.
    ///
    /// Unlike a stream read this never returns a short buffer: a range past
    /// EOF is `IoError::OutOfBounds`.
    pub fn read_at(&mut self, offset: u64, len: u64) -> Result<Bytes> {
        if self.bytes_read.saturating_add(len) > self.limits.max_read_bytes {
            warn!(
                path = %self.path.display(),
                current_read = self.bytes_read,
                requested = len,
                limit = self.limits.max_read_bytes,
                "Read limit exceeded"
            );
            return Err(IoError::ReadLimitExceeded {
                limit: self.limits.max_read_bytes,
                current: self.bytes_read,
            });
        }

        let size = self.size();
        let end = offset.checked_add(len).filter(|&end| end <= size);
        let end = match end {
            Some(end) => end,
            None => return Err(IoError::OutOfBounds { offset, len, size }),
        };

        let out = Bytes::copy_from_slice(&self.as_slice()[offset as usize..end as usize]);
        self.bytes_read += len;

        trace!(
            path = %self.path.display(),
            offset = offset,
            len = len,
            total_read = self.bytes_read,
            "Performed read"
        );

        Ok(out)
    }
}
