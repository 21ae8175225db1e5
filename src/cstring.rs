//! Null-terminated strings read out of a target task.
//!
//! Strings are scanned chunk by chunk. Every read ends on a chunk boundary.
//! When a chunk cannot be read because it runs past the end of a mapping,
//! the chunk is halved and the read retried, down to a single byte, so a
//! terminator sitting right at the end of a mapping is still found.

use crate::config::CStringLimits;
use crate::error::{InspectError, Result};
use crate::memory::{AccessError, RemoteAddress, TaskMemory};
use std::borrow::Cow;
use std::fmt;
use tracing::{debug, trace};

/// An owned copy of a string read from a target task.
///
/// Storage is released when the value is dropped. Two reads of the same
/// remote string produce two independent values.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RemoteCString {
    address: RemoteAddress,
    bytes: Vec<u8>,
}

impl RemoteCString {
    /// Where the string was read from.
    pub fn address(&self) -> RemoteAddress {
        self.address
    }

    /// Bytes before the terminator.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_str(&self) -> std::result::Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(&self.bytes)
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

impl PartialEq<str> for RemoteCString {
    fn eq(&self, other: &str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl PartialEq<&str> for RemoteCString {
    fn eq(&self, other: &&str) -> bool {
        self.bytes == other.as_bytes()
    }
}

impl fmt::Debug for RemoteCString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteCString")
            .field("address", &self.address)
            .field("value", &self.to_string_lossy())
            .finish()
    }
}

impl fmt::Display for RemoteCString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

/// Read the null-terminated string starting at `address`.
///
/// # Errors
///
/// `InspectError::Access` if any chunk cannot be read, and
/// `InspectError::Unterminated` if `limits.max_len` bytes were scanned
/// without finding a NUL.
pub fn read_cstring<T: TaskMemory + ?Sized>(
    task: &T,
    address: RemoteAddress,
    limits: &CStringLimits,
) -> Result<RemoteCString> {
    let mut chunk = limits.effective_chunk() as u64;
    let mut bytes = Vec::new();
    let mut cursor = address;
    let mut scanned = 0usize;

    while scanned < limits.max_len {
        let to_boundary = chunk - (cursor.value() & (chunk - 1));
        let len = (to_boundary as usize).min(limits.max_len - scanned);
        let data = match task.read_bytes(cursor, len) {
            Ok(data) => data,
            Err(e) if chunk > 1 && may_shrink(&e) => {
                chunk /= 2;
                trace!(address = %cursor, len, chunk, "Chunk unreadable, shrinking");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        trace!(address = %cursor, len, "Scanned string chunk");

        if let Some(nul) = memchr::memchr(0, &data) {
            bytes.extend_from_slice(&data[..nul]);
            debug!(address = %address, len = bytes.len(), "Read remote string");
            return Ok(RemoteCString { address, bytes });
        }

        bytes.extend_from_slice(&data);
        scanned += len;
        cursor = cursor.checked_add(len as u64)?;
    }

    debug!(address = %address, limit = limits.max_len, "Remote string has no terminator");
    Err(InspectError::Unterminated {
        address: address.value(),
        limit: limits.max_len,
    })
}

// Errors that can mean "this span crosses the end of a mapping".
fn may_shrink(e: &AccessError) -> bool {
    matches!(
        e,
        AccessError::Unmapped { .. } | AccessError::ShortRead { .. } | AccessError::Kernel { .. }
    )
}
