//! Read-only inspection of a running macOS process's main executable.
//!
//! Given a way to read the target's memory ([`memory::TaskMemory`]) and a
//! way to learn where dyld put things ([`resolver::ProcessQuery`]), this
//! crate validates the executable's live Mach-O header, works out how far
//! ASLR moved it, and looks up other loaded images by path.

pub mod config;
pub mod cstring;
pub mod dyld;
pub mod error;
pub mod io;
pub mod logging;
pub mod macho;
pub mod memory;
pub mod requirement;
pub mod resolver;

pub use config::InspectConfig;
pub use cstring::{read_cstring, RemoteCString};
pub use dyld::{find_image, list_images, ImageInfo};
pub use error::{InspectError, Result};
pub use macho::{read_header, ExecutableHeaderContext};
pub use memory::{AccessError, Endianness, RemoteAddress, SparseTaskMemory, TaskMemory};
pub use requirement::{ExpectedBytes, MemoryRequirement};
pub use resolver::{resolve, ExecutableInfo, ProcessLayout, ProcessQuery, StaticLayout};

#[cfg(target_os = "macos")]
pub use memory::mach::MachTask;
