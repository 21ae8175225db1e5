//! Shared fixtures: header bytes, on-disk executables and image tables.

#![allow(dead_code)]

use machscope::macho::types::{CPU_TYPE_X86_64, MH_MAGIC_64, MH_PIE};
use machscope::SparseTaskMemory;
use std::io::Write;
use tempfile::NamedTempFile;

pub const LC_SEGMENT_64: u32 = 0x19;
pub const MH_EXECUTE: u32 = 2;

/// `ncmds`, `sizeofcmds`, `flags`, `reserved` used by the live headers.
pub const NCMDS: u32 = 18;
pub const SIZEOFCMDS: u32 = 0x0730;
pub const FLAGS: u32 = MH_PIE | 0x85;
pub const RESERVED: u32 = 0x0000_00a5;

/// A live `mach_header_64` in host order, or with every field reversed.
pub fn live_header(cputype: u32, swapped: bool) -> Vec<u8> {
    let fields = [
        MH_MAGIC_64,
        cputype,
        3,
        MH_EXECUTE,
        NCMDS,
        SIZEOFCMDS,
        FLAGS,
        RESERVED,
    ];
    let mut out = Vec::with_capacity(32);
    for v in fields {
        let v = if swapped { v.swap_bytes() } else { v };
        out.extend_from_slice(&v.to_ne_bytes());
    }
    out
}

/// A thin little-endian executable with a single `__TEXT` segment.
pub fn executable_image(cputype: u32, text_vmaddr: u64) -> Vec<u8> {
    let mut out = Vec::new();
    for v in [MH_MAGIC_64, cputype, 3, MH_EXECUTE, 1, 72, MH_PIE, 0] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&LC_SEGMENT_64.to_le_bytes());
    out.extend_from_slice(&72u32.to_le_bytes());
    let mut name = [0u8; 16];
    name[..6].copy_from_slice(b"__TEXT");
    out.extend_from_slice(&name);
    for v in [text_vmaddr, 0x4000, 0, 0x4000] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for v in [5u32, 5, 0, 0] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.resize(0x4000, 0);
    out
}

pub fn write_executable(cputype: u32, text_vmaddr: u64) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("create temp executable");
    f.write_all(&executable_image(cputype, text_vmaddr))
        .expect("write temp executable");
    f
}

pub fn default_executable(text_vmaddr: u64) -> NamedTempFile {
    write_executable(CPU_TYPE_X86_64, text_vmaddr)
}

/// Lay out a dyld image table prefix at `table` and its entries at `array`.
/// Each entry is `(path pointer, load address)`.
pub fn map_table_entries(
    mem: &mut SparseTaskMemory,
    table: u64,
    array: u64,
    entries: &[(u64, u64)],
) {
    let mut prefix = Vec::new();
    prefix.extend_from_slice(&15u32.to_ne_bytes());
    prefix.extend_from_slice(&(entries.len() as u32).to_ne_bytes());
    prefix.extend_from_slice(&array.to_ne_bytes());

    let mut raw = Vec::new();
    for (path_ptr, load) in entries {
        raw.extend_from_slice(&load.to_ne_bytes());
        raw.extend_from_slice(&path_ptr.to_ne_bytes());
        raw.extend_from_slice(&0u64.to_ne_bytes());
    }

    mem.map(table, prefix).map(array, raw);
}

/// Lay out a dyld image table with path strings packed back to back from
/// `strings`. The string region ends at the last terminator.
pub fn map_image_table(
    mem: &mut SparseTaskMemory,
    table: u64,
    array: u64,
    strings: u64,
    images: &[(&str, u64)],
) {
    let mut entries = Vec::new();
    let mut pool = Vec::new();
    for (path, load) in images {
        entries.push((strings + pool.len() as u64, *load));
        pool.extend_from_slice(path.as_bytes());
        pool.push(0);
    }

    map_table_entries(mem, table, array, &entries);
    mem.map(strings, pool);
}
