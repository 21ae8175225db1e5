//! dyld's table of loaded images, read out of a target task.
//!
//! The table is `dyld_all_image_infos`; only its leading fields are used:
//!
//! ```text
//! 0x00  u32  version
//! 0x04  u32  infoArrayCount
//! 0x08  u64  infoArray         -> [dyld_image_info; infoArrayCount]
//! ```
//!
//! and each `dyld_image_info` is three u64s: load address, path pointer and
//! modification date. dyld writes all of it in the target's native order,
//! which is the host's for every configuration this crate attaches to.

use crate::config::{CStringLimits, InspectConfig};
use crate::cstring::{read_cstring, RemoteCString};
use crate::error::{InspectError, Result};
use crate::memory::{exact, RemoteAddress, TaskMemory};
use tracing::{debug, trace, warn};

/// Bytes of `dyld_all_image_infos` that are read.
pub const IMAGE_TABLE_PREFIX_SIZE: usize = 16;
/// Size of one `dyld_image_info`.
pub const IMAGE_INFO_SIZE: usize = 24;

/// The fixed prefix of a task's image table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageTable {
    pub address: RemoteAddress,
    pub version: u32,
    pub count: u32,
    pub array_address: RemoteAddress,
}

/// One loaded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Position in the table.
    pub index: usize,
    /// Where the image's Mach-O header is mapped.
    pub load_address: RemoteAddress,
    pub path: RemoteCString,
    pub mod_date: u64,
}

fn ne_u32(b: &[u8]) -> u32 {
    u32::from_ne_bytes([b[0], b[1], b[2], b[3]])
}

fn ne_u64(b: &[u8]) -> u64 {
    let mut v = [0u8; 8];
    v.copy_from_slice(&b[..8]);
    u64::from_ne_bytes(v)
}

impl ImageTable {
    /// Read and sanity-check the table prefix at `address`.
    pub fn read<T: TaskMemory + ?Sized>(
        task: &T,
        address: RemoteAddress,
        config: &InspectConfig,
    ) -> Result<Self> {
        let raw: [u8; IMAGE_TABLE_PREFIX_SIZE] =
            exact(address, task.read_bytes(address, IMAGE_TABLE_PREFIX_SIZE)?)?;

        let table = ImageTable {
            address,
            version: ne_u32(&raw[0..4]),
            count: ne_u32(&raw[4..8]),
            array_address: RemoteAddress(ne_u64(&raw[8..16])),
        };

        if table.count > config.images.max_images {
            warn!(address = %address, count = table.count, "Image count over limit");
            return Err(table.corrupt(format!(
                "{} entries exceeds limit of {}",
                table.count, config.images.max_images
            )));
        }
        // dyld clears infoArray while it rewrites the list.
        if table.count > 0 && table.array_address.is_null() {
            debug!(address = %address, count = table.count, "Image table is being updated");
            return Err(InspectError::NotFound("dyld is updating its image table".into()));
        }

        debug!(
            address = %address,
            version = table.version,
            count = table.count,
            array = %table.array_address,
            "Read image table"
        );
        Ok(table)
    }

    fn corrupt(&self, reason: String) -> InspectError {
        InspectError::CorruptImageTable {
            address: self.address.value(),
            reason,
        }
    }

    /// Address of entry `index`.
    pub fn entry_address(&self, index: usize) -> Result<RemoteAddress> {
        let delta = (index as u64)
            .checked_mul(IMAGE_INFO_SIZE as u64)
            .ok_or_else(|| self.corrupt(format!("entry {} out of range", index)))?;
        Ok(self.array_address.checked_add(delta)?)
    }

    /// Read entry `index`. `None` when dyld left its path pointer null.
    pub fn entry<T: TaskMemory + ?Sized>(
        &self,
        task: &T,
        index: usize,
        strings: &CStringLimits,
    ) -> Result<Option<ImageInfo>> {
        let at = self.entry_address(index)?;
        let raw: [u8; IMAGE_INFO_SIZE] = exact(at, task.read_bytes(at, IMAGE_INFO_SIZE)?)?;

        let path_address = RemoteAddress(ne_u64(&raw[8..16]));
        if path_address.is_null() {
            trace!(index, "Skipping image with no path");
            return Ok(None);
        }

        Ok(Some(ImageInfo {
            index,
            load_address: RemoteAddress(ne_u64(&raw[0..8])),
            path: read_cstring(task, path_address, strings)?,
            mod_date: ne_u64(&raw[16..24]),
        }))
    }
}

/// Find the image loaded from `target_path`.
///
/// Entries are visited from index 0 and paths compared byte for byte; the
/// first match wins. Fails with `InspectError::NotFound` after a full scan
/// with no match.
pub fn find_image<T, P>(
    task: &T,
    image_table_address: RemoteAddress,
    target_path: P,
    config: &InspectConfig,
) -> Result<ImageInfo>
where
    T: TaskMemory + ?Sized,
    P: AsRef<[u8]>,
{
    let target = target_path.as_ref();
    let table = ImageTable::read(task, image_table_address, config)?;

    for index in 0..table.count as usize {
        if let Some(image) = table.entry(task, index, &config.strings)? {
            if image.path.as_bytes() == target {
                debug!(
                    index,
                    load_address = %image.load_address,
                    path = %image.path,
                    "Found image"
                );
                return Ok(image);
            }
        }
    }

    Err(InspectError::NotFound(format!(
        "no image loaded from {}",
        String::from_utf8_lossy(target)
    )))
}

/// Every image in the table that has a path, in table order.
pub fn list_images<T: TaskMemory + ?Sized>(
    task: &T,
    image_table_address: RemoteAddress,
    config: &InspectConfig,
) -> Result<Vec<ImageInfo>> {
    let table = ImageTable::read(task, image_table_address, config)?;
    let mut images = Vec::with_capacity(table.count as usize);
    for index in 0..table.count as usize {
        if let Some(image) = table.entry(task, index, &config.strings)? {
            images.push(image);
        }
    }
    Ok(images)
}
