//! The on-disk copy of a target's executable.
//!
//! Only two things are taken from the file: its fixed header (to cross-check
//! the live one) and the `__TEXT` segment address, which is the base the
//! linker preferred before ASLR moved it.

use crate::error::{InspectError, Result};
use crate::io::{IOLimits, MappedFile};
use crate::macho::header::parse_header_bytes;
use crate::macho::types::*;
use object::read::macho::{FatArch, MachOFatFile32, MachOFatFile64};
use object::read::{Object, ObjectSegment};
use object::FileKind;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnDiskExecutable {
    path: PathBuf,
    header: MachHeader64,
    needs_byte_swap: bool,
    preferred_base: u64,
    slice_offset: u64,
}

impl OnDiskExecutable {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &MachHeader64 {
        &self.header
    }

    pub fn needs_byte_swap(&self) -> bool {
        self.needs_byte_swap
    }

    /// `vmaddr` of `__TEXT`, where the header sits when nothing is slid.
    pub fn preferred_base(&self) -> u64 {
        self.preferred_base
    }

    /// File offset of the selected architecture (0 for thin files).
    pub fn slice_offset(&self) -> u64 {
        self.slice_offset
    }
}

/// Load the executable at `path`.
///
/// For a fat file the slice whose CPU type equals `cputype` is used; without
/// a CPU type the first 64-bit slice is taken.
pub fn load_on_disk<P: AsRef<Path>>(
    path: P,
    limits: &IOLimits,
    cputype: Option<u32>,
) -> Result<OnDiskExecutable> {
    let path = path.as_ref();
    let mut file = MappedFile::open(path, limits.clone())?;

    let (slice_offset, preferred_base) = {
        let data = file.as_slice();
        let kind = FileKind::parse(data).map_err(|e| unusable(path, e))?;
        let (offset, slice) = match kind {
            FileKind::MachO64 => (0, data),
            FileKind::MachOFat32 => {
                let fat = MachOFatFile32::parse(data).map_err(|e| unusable(path, e))?;
                select_arch(path, fat.arches(), data, cputype)?
            }
            FileKind::MachOFat64 => {
                let fat = MachOFatFile64::parse(data).map_err(|e| unusable(path, e))?;
                select_arch(path, fat.arches(), data, cputype)?
            }
            FileKind::MachO32 => return Err(unusable(path, "32-bit Mach-O")),
            other => return Err(unusable(path, format!("not a Mach-O file ({:?})", other))),
        };
        (offset, text_vmaddr(path, slice)?)
    };

    let raw = file.read_at(slice_offset, MACH_HEADER_64_SIZE as u64)?;
    let raw: &[u8; MACH_HEADER_64_SIZE] = (&raw[..])
        .try_into()
        .map_err(|_| unusable(path, "short header"))?;
    let (header, needs_byte_swap) =
        parse_header_bytes(raw, slice_offset).map_err(|e| unusable(path, e))?;

    debug!(
        path = %path.display(),
        slice_offset,
        preferred_base = format_args!("{:#x}", preferred_base),
        cputype = %header.cpu_type(),
        "Loaded on-disk executable"
    );

    Ok(OnDiskExecutable {
        path: path.to_path_buf(),
        header,
        needs_byte_swap,
        preferred_base,
        slice_offset,
    })
}

fn select_arch<'data, A: FatArch>(
    path: &Path,
    arches: &'data [A],
    data: &'data [u8],
    cputype: Option<u32>,
) -> Result<(u64, &'data [u8])> {
    let arch = arches
        .iter()
        .find(|a| match cputype {
            Some(want) => a.cputype() == want,
            None => a.cputype() & CPU_ARCH_ABI64 != 0,
        })
        .ok_or_else(|| match cputype {
            Some(want) => unusable(path, format!("no slice for {}", CpuType::from(want))),
            None => unusable(path, "no 64-bit slice"),
        })?;

    let slice = arch.data(data).map_err(|e| unusable(path, e))?;
    Ok((arch.file_range().0, slice))
}

fn text_vmaddr(path: &Path, slice: &[u8]) -> Result<u64> {
    let obj = object::read::File::parse(slice).map_err(|e| unusable(path, e))?;
    obj.segments()
        .find(|seg| matches!(seg.name(), Ok(Some("__TEXT"))))
        .map(|seg| seg.address())
        .ok_or_else(|| unusable(path, "no __TEXT segment"))
}

fn unusable(path: &Path, reason: impl ToString) -> InspectError {
    InspectError::OnDisk {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
