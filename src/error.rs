//! Error types for machscope.
//!
//! Every operation in the crate returns one of these explicitly; nothing is
//! retried or swallowed internally. Callers decide which kinds are fatal: a
//! `NotFound` from the resolver usually means "not ready yet", while an
//! `InvalidHeader` ends the current attempt.

use crate::io::error::IoError;
use crate::memory::AccessError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for machscope operations.
#[derive(Debug, Error)]
pub enum InspectError {
    /// A remote read failed (unmapped range, revoked permission, dead task).
    #[error("Remote access failed: {0}")]
    Access(#[from] AccessError),

    /// Magic mismatch, or the live header disagrees with the on-disk one.
    #[error("Invalid executable header at {address:#x}: {reason}")]
    InvalidHeader { address: u64, reason: String },

    /// No matching image, or the task layout is not available yet.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A string scan hit its bound without finding a terminator.
    #[error("Unterminated string at {address:#x} (scanned {limit} bytes)")]
    Unterminated { address: u64, limit: usize },

    /// The dyld image table itself is structurally unusable.
    #[error("Corrupt image table at {address:#x}: {reason}")]
    CorruptImageTable { address: u64, reason: String },

    /// Expected bytes were not supplied for the executable's byte order.
    #[error("No expected bytes for {0:?} byte order")]
    UnsupportedByteOrder(crate::memory::Endianness),

    /// Little- and big-endian renderings of one datum differ in length.
    #[error("Expected bytes disagree in length: {little} little-endian, {big} big-endian")]
    MismatchedRenderings { little: usize, big: usize },

    /// The on-disk executable is not a usable 64-bit Mach-O.
    #[error("Unusable on-disk executable {path}: {reason}")]
    OnDisk { path: PathBuf, reason: String },

    /// Local file access for the on-disk executable.
    #[error("Local I/O error: {0}")]
    Io(#[from] IoError),

    /// Configuration could not be decoded.
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl InspectError {
    pub(crate) fn invalid_header(address: u64, reason: impl Into<String>) -> Self {
        InspectError::InvalidHeader {
            address,
            reason: reason.into(),
        }
    }

    /// True for errors a caller may reasonably retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, InspectError::NotFound(_) | InspectError::Access(_))
    }
}

/// Result type alias for machscope operations
pub type Result<T> = std::result::Result<T, InspectError>;
