//! Resolving a target's main executable: where its header lives, how far
//! ASLR moved it, and where dyld keeps its image table.

use crate::config::InspectConfig;
use crate::dyld::{find_image, ImageInfo};
use crate::error::{InspectError, Result};
use crate::macho::header::{read_header, ExecutableHeaderContext};
use crate::macho::on_disk::load_on_disk;
use crate::macho::types::{CpuType, MachHeader64};
use crate::memory::{Endianness, RemoteAddress, TaskMemory};
use std::fmt;
use std::path::Path;
use tracing::{debug, debug_span, warn};

/// Addresses only the process-attach layer can supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessLayout {
    /// Where the main executable's header is mapped.
    pub header_address: RemoteAddress,
    /// Address of `dyld_all_image_infos`.
    pub image_table_address: RemoteAddress,
}

/// Process-level query for a target's layout.
///
/// Implementations fail with `InspectError::NotFound` while the target has
/// not finished initialising.
pub trait ProcessQuery {
    fn layout(&self, executable_path: &Path) -> Result<ProcessLayout>;
}

impl<Q: ProcessQuery + ?Sized> ProcessQuery for &Q {
    fn layout(&self, executable_path: &Path) -> Result<ProcessLayout> {
        (**self).layout(executable_path)
    }
}

/// A layout known ahead of time (captured earlier, or fixed in tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticLayout(pub ProcessLayout);

impl ProcessQuery for StaticLayout {
    fn layout(&self, _executable_path: &Path) -> Result<ProcessLayout> {
        Ok(self.0)
    }
}

/// Everything known about a target's loaded main executable.
pub struct ExecutableInfo<'t, T: ?Sized> {
    // Always carries the ASLR offset.
    context: ExecutableHeaderContext<'t, T>,
    preferred_base: u64,
    image_table_address: RemoteAddress,
}

impl<'t, T: ?Sized> ExecutableInfo<'t, T> {
    pub fn header_context(&self) -> &ExecutableHeaderContext<'t, T> {
        &self.context
    }

    pub fn task(&self) -> &'t T {
        self.context.task()
    }

    pub fn header_address(&self) -> RemoteAddress {
        self.context.address()
    }

    pub fn header(&self) -> &MachHeader64 {
        self.context.header()
    }

    pub fn needs_byte_swap(&self) -> bool {
        self.context.needs_byte_swap()
    }

    pub fn byte_order(&self) -> Endianness {
        self.context.byte_order()
    }

    pub fn aslr_offset(&self) -> u64 {
        self.context.aslr_offset().unwrap_or_default()
    }

    /// `__TEXT` vmaddr from the on-disk file.
    pub fn preferred_base(&self) -> u64 {
        self.preferred_base
    }

    pub fn image_table_address(&self) -> RemoteAddress {
        self.image_table_address
    }

    /// Translate an address from the executable file into task space.
    pub fn address_in_task_space(&self, file_address: u64) -> Result<RemoteAddress> {
        self.context
            .address_in_task_space(file_address)
            .ok_or_else(|| {
                InspectError::invalid_header(
                    self.header_address().value(),
                    format!("file address {:#x} overflows task space", file_address),
                )
            })
    }
}

impl<T: TaskMemory + ?Sized> ExecutableInfo<'_, T> {
    /// Read `len` bytes found at `file_address` in the executable file.
    pub fn read_at_file_address(&self, file_address: u64, len: usize) -> Result<Vec<u8>> {
        let at = self.address_in_task_space(file_address)?;
        Ok(self.task().read_bytes(at, len)?)
    }

    /// Look up another loaded image in the same task.
    pub fn find_image(&self, image_path: &str, config: &InspectConfig) -> Result<ImageInfo> {
        find_image(self.task(), self.image_table_address, image_path, config)
    }
}

impl<T: ?Sized> fmt::Debug for ExecutableInfo<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableInfo")
            .field("context", &self.context)
            .field("aslr_offset", &format_args!("{:#x}", self.aslr_offset()))
            .field("preferred_base", &format_args!("{:#x}", self.preferred_base))
            .field("image_table_address", &self.image_table_address)
            .finish()
    }
}

/// Slide between where the linker put the header and where it is now.
///
/// Zero when the image was not moved; otherwise it must be positive and a
/// multiple of `page_size`.
pub fn compute_aslr_offset(live_address: u64, preferred_base: u64, page_size: u64) -> Result<u64> {
    let offset = live_address.checked_sub(preferred_base).ok_or_else(|| {
        InspectError::invalid_header(
            live_address,
            format!("live header below preferred base {:#x}", preferred_base),
        )
    })?;

    if page_size != 0 && offset % page_size != 0 {
        return Err(InspectError::invalid_header(
            live_address,
            format!("slide {:#x} is not a multiple of {:#x}", offset, page_size),
        ));
    }

    Ok(offset)
}

/// Describe the main executable loaded in `task`.
///
/// Asks `query` for the live header and image table addresses, reads the
/// live header, loads the on-disk file at `on_disk_path` (picking the slice
/// that matches the live CPU type when the file is fat), checks the two
/// headers agree, and computes the ASLR offset. The first failing step ends
/// the resolution.
pub fn resolve<'t, T, Q, P>(
    task: &'t T,
    query: &Q,
    on_disk_path: P,
    config: &InspectConfig,
) -> Result<ExecutableInfo<'t, T>>
where
    T: TaskMemory + ?Sized,
    Q: ProcessQuery + ?Sized,
    P: AsRef<Path>,
{
    let path = on_disk_path.as_ref();
    let _span = debug_span!("resolve", path = %path.display()).entered();

    let layout = query.layout(path)?;
    let context = read_header(task, layout.header_address)?;
    let live = *context.header();
    let on_disk = load_on_disk(path, &config.io, Some(live.cputype))?;

    if on_disk.header().magic != live.magic {
        return Err(InspectError::invalid_header(
            layout.header_address.value(),
            "magic class differs from the on-disk executable",
        ));
    }
    if on_disk.header().cputype != live.cputype {
        warn!(
            live = %CpuType::from(live.cputype),
            on_disk = %CpuType::from(on_disk.header().cputype),
            "CPU type mismatch"
        );
        return Err(InspectError::invalid_header(
            layout.header_address.value(),
            format!(
                "CPU type {} differs from on-disk {}",
                CpuType::from(live.cputype),
                CpuType::from(on_disk.header().cputype)
            ),
        ));
    }

    let aslr_offset = compute_aslr_offset(
        layout.header_address.value(),
        on_disk.preferred_base(),
        config.page_size,
    )?;

    debug!(
        header = %layout.header_address,
        image_table = %layout.image_table_address,
        aslr_offset = format_args!("{:#x}", aslr_offset),
        needs_byte_swap = context.needs_byte_swap(),
        "Resolved executable"
    );

    Ok(ExecutableInfo {
        context: context.with_aslr_offset(aslr_offset),
        preferred_base: on_disk.preferred_base(),
        image_table_address: layout.image_table_address,
    })
}
