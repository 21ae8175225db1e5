//! Remote memory access: bounded, read-only reads from another task.
//!
//! The task handle itself is an opaque capability owned by whoever attached
//! to the target. This crate only consumes it through [`TaskMemory`]; it
//! never constructs or validates a handle on its own.

#[cfg(target_os = "macos")]
pub mod mach;
pub mod sparse;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use sparse::SparseTaskMemory;

/// Errors that can occur during remote reads.
#[derive(Debug, thiserror::Error, PartialEq, Eq, Clone)]
pub enum AccessError {
    #[error("range {address:#x}+{len:#x} is not mapped")]
    Unmapped { address: u64, len: usize },
    #[error("short read at {address:#x}: wanted {wanted} bytes, got {got}")]
    ShortRead {
        address: u64,
        wanted: usize,
        got: usize,
    },
    #[error("address arithmetic overflowed at {address:#x}+{len:#x}")]
    Overflow { address: u64, len: usize },
    #[error("task handle is not valid")]
    InvalidTask,
    #[error("kernel returned {code} reading {address:#x}")]
    Kernel { address: u64, code: i32 },
}

/// Byte order of data in the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endianness {
    /// Little-endian byte order
    Little,
    /// Big-endian byte order
    Big,
}

impl Endianness {
    /// Byte order of the inspecting process.
    pub const fn host() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }

    /// The other byte order.
    pub const fn flipped(self) -> Self {
        match self {
            Endianness::Little => Endianness::Big,
            Endianness::Big => Endianness::Little,
        }
    }
}

/// An address inside a target task.
///
/// Only meaningful next to the [`TaskMemory`] it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RemoteAddress(pub u64);

impl RemoteAddress {
    pub const NULL: RemoteAddress = RemoteAddress(0);

    pub fn value(self) -> u64 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Offset this address, failing instead of wrapping.
    pub fn checked_add(self, delta: u64) -> Result<RemoteAddress, AccessError> {
        self.0
            .checked_add(delta)
            .map(RemoteAddress)
            .ok_or(AccessError::Overflow {
                address: self.0,
                len: delta as usize,
            })
    }
}

impl From<u64> for RemoteAddress {
    fn from(value: u64) -> Self {
        RemoteAddress(value)
    }
}

impl fmt::Display for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for RemoteAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// Bounded, read-only access to a target task's address space.
///
/// Implementations must return exactly `len` bytes or fail; partial data is
/// never handed back. No retries happen at this layer.
pub trait TaskMemory {
    /// Read `len` bytes starting at `addr`.
    fn read_bytes(&self, addr: RemoteAddress, len: usize) -> Result<Vec<u8>, AccessError>;

    /// Read exactly `N` bytes into an array.
    fn read_array<const N: usize>(&self, addr: RemoteAddress) -> Result<[u8; N], AccessError>
    where
        Self: Sized,
    {
        exact(addr, self.read_bytes(addr, N)?)
    }

    /// Convenience: read a little/big-endian u32.
    fn read_u32(&self, addr: RemoteAddress, endian: Endianness) -> Result<u32, AccessError> {
        let b: [u8; 4] = exact(addr, self.read_bytes(addr, 4)?)?;
        Ok(match endian {
            Endianness::Little => u32::from_le_bytes(b),
            Endianness::Big => u32::from_be_bytes(b),
        })
    }

    /// Convenience: read a little/big-endian u64.
    fn read_u64(&self, addr: RemoteAddress, endian: Endianness) -> Result<u64, AccessError> {
        let b: [u8; 8] = exact(addr, self.read_bytes(addr, 8)?)?;
        Ok(match endian {
            Endianness::Little => u64::from_le_bytes(b),
            Endianness::Big => u64::from_be_bytes(b),
        })
    }
}

// Implementations promise exact lengths; a mismatch is still surfaced, never padded.
pub(crate) fn exact<const N: usize>(addr: RemoteAddress, b: Vec<u8>) -> Result<[u8; N], AccessError> {
    let got = b.len();
    b.try_into().map_err(|_| AccessError::ShortRead {
        address: addr.0,
        wanted: N,
        got,
    })
}

impl<T: TaskMemory + ?Sized> TaskMemory for &T {
    fn read_bytes(&self, addr: RemoteAddress, len: usize) -> Result<Vec<u8>, AccessError> {
        (**self).read_bytes(addr, len)
    }
}
