//! Executable header reading, locally and from a target task.
//!
//! Byte order is taken from the data: the magic is read in host order and
//! must be either `MH_MAGIC_64` or its byte-reversed form. That decision is
//! then applied to every other field of the same header.

use crate::error::{InspectError, Result};
use crate::macho::types::*;
use crate::memory::{exact, Endianness, RemoteAddress, TaskMemory};
use std::fmt;
use tracing::{debug, warn};

/// Classify a raw magic: `Some(false)` native, `Some(true)` swapped.
pub fn magic_needs_swap(raw: [u8; 4]) -> Option<bool> {
    match u32::from_ne_bytes(raw) {
        MH_MAGIC_64 => Some(false),
        MH_CIGAM_64 => Some(true),
        _ => None,
    }
}

fn decode_fields(magic: u32, rest: &[u8; MACH_HEADER_64_SIZE - 4], swap: bool) -> MachHeader64 {
    let field = |i: usize| {
        let b = &rest[i * 4..i * 4 + 4];
        let v = u32::from_ne_bytes([b[0], b[1], b[2], b[3]]);
        if swap {
            v.swap_bytes()
        } else {
            v
        }
    };

    MachHeader64 {
        magic: if swap { magic.swap_bytes() } else { magic },
        cputype: field(0),
        cpusubtype: field(1),
        filetype: field(2),
        ncmds: field(3),
        sizeofcmds: field(4),
        flags: field(5),
        reserved: field(6),
    }
}

/// Parse a complete 32-byte header held locally.
///
/// `address` is only used for error reporting. Returns the header with all
/// fields in host order and whether they had to be swapped.
pub fn parse_header_bytes(
    raw: &[u8; MACH_HEADER_64_SIZE],
    address: u64,
) -> Result<(MachHeader64, bool)> {
    let magic = [raw[0], raw[1], raw[2], raw[3]];
    let swap = magic_needs_swap(magic).ok_or_else(|| bad_magic(address, magic))?;

    let mut rest = [0u8; MACH_HEADER_64_SIZE - 4];
    rest.copy_from_slice(&raw[4..]);
    Ok((decode_fields(u32::from_ne_bytes(magic), &rest, swap), swap))
}

fn bad_magic(address: u64, magic: [u8; 4]) -> InspectError {
    let value = u32::from_ne_bytes(magic);
    let reason = match value {
        MH_MAGIC | MH_CIGAM => format!("32-bit Mach-O magic {:#010x}", value),
        _ => format!("unrecognised magic {:#010x}", value),
    };
    InspectError::invalid_header(address, reason)
}

/// A validated executable header living in a target task.
///
/// `needs_byte_swap` is decided once, from the magic, and never changes.
/// The ASLR offset is unknown until the resolver fills it in.
pub struct ExecutableHeaderContext<'t, T: ?Sized> {
    task: &'t T,
    address: RemoteAddress,
    aslr_offset: Option<u64>,
    header: MachHeader64,
    needs_byte_swap: bool,
}

impl<'t, T: ?Sized> ExecutableHeaderContext<'t, T> {
    pub fn task(&self) -> &'t T {
        self.task
    }

    /// Live address of the header in the task.
    pub fn address(&self) -> RemoteAddress {
        self.address
    }

    pub fn aslr_offset(&self) -> Option<u64> {
        self.aslr_offset
    }

    pub fn header(&self) -> &MachHeader64 {
        &self.header
    }

    pub fn needs_byte_swap(&self) -> bool {
        self.needs_byte_swap
    }

    /// Byte order the executable was produced in.
    pub fn byte_order(&self) -> Endianness {
        if self.needs_byte_swap {
            Endianness::host().flipped()
        } else {
            Endianness::host()
        }
    }

    /// Translate an address from the executable file into task space.
    ///
    /// `None` until the ASLR offset is known, or if the sum overflows.
    pub fn address_in_task_space(&self, file_address: u64) -> Option<RemoteAddress> {
        let offset = self.aslr_offset?;
        file_address.checked_add(offset).map(RemoteAddress)
    }

    pub(crate) fn with_aslr_offset(self, aslr_offset: u64) -> Self {
        Self {
            aslr_offset: Some(aslr_offset),
            ..self
        }
    }
}

impl<T: ?Sized> Clone for ExecutableHeaderContext<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ExecutableHeaderContext<'_, T> {}

impl<T: ?Sized> fmt::Debug for ExecutableHeaderContext<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableHeaderContext")
            .field("address", &self.address)
            .field("aslr_offset", &self.aslr_offset)
            .field("header", &self.header)
            .field("needs_byte_swap", &self.needs_byte_swap)
            .finish_non_exhaustive()
    }
}

/// Read and validate the 64-bit executable header at `address` in `task`.
///
/// The magic is read and checked before anything else; an unknown magic
/// fails with `InspectError::InvalidHeader` and no further bytes are read.
pub fn read_header<'t, T: TaskMemory + ?Sized>(
    task: &'t T,
    address: RemoteAddress,
) -> Result<ExecutableHeaderContext<'t, T>> {
    let magic: [u8; 4] = exact(address, task.read_bytes(address, 4)?)?;

    let needs_byte_swap = match magic_needs_swap(magic) {
        Some(swap) => swap,
        None => {
            warn!(
                address = %address,
                magic = format_args!("{:#010x}", u32::from_ne_bytes(magic)),
                "Rejecting header"
            );
            return Err(bad_magic(address.value(), magic));
        }
    };

    let rest_address = address.checked_add(4)?;
    let rest: [u8; MACH_HEADER_64_SIZE - 4] =
        exact(rest_address, task.read_bytes(rest_address, MACH_HEADER_64_SIZE - 4)?)?;
    let header = decode_fields(u32::from_ne_bytes(magic), &rest, needs_byte_swap);

    debug!(
        address = %address,
        needs_byte_swap,
        cputype = %header.cpu_type(),
        ncmds = header.ncmds,
        "Read executable header"
    );

    Ok(ExecutableHeaderContext {
        task,
        address,
        aslr_offset: None,
        header,
        needs_byte_swap,
    })
}
