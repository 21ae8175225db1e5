//! 64-bit Mach-O header handling.

pub mod header;
pub mod on_disk;
pub mod types;

pub use header::{parse_header_bytes, read_header, ExecutableHeaderContext};
pub use on_disk::{load_on_disk, OnDiskExecutable};
pub use types::{CpuType, FileType, MachHeader64};
