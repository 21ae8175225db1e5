//! A live macOS task, read through its Mach port.

use super::{AccessError, RemoteAddress, TaskMemory};
use crate::config::InspectConfig;
use crate::dyld::{find_image, ImageTable};
use crate::error::{InspectError, Result};
use crate::resolver::{ProcessLayout, ProcessQuery};
use mach2::kern_return::KERN_SUCCESS;
use mach2::message::mach_msg_type_number_t;
use mach2::port::{mach_port_t, MACH_PORT_NULL};
use mach2::task::task_info;
use mach2::task_info::{task_dyld_info, task_info_t, TASK_DYLD_INFO, TASK_DYLD_INFO_COUNT};
use mach2::vm::mach_vm_read_overwrite;
use mach2::vm_types::{mach_vm_address_t, mach_vm_size_t};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use tracing::{debug, trace};

/// A task port handed over by whoever attached to the target.
///
/// The port is borrowed: it is never deallocated here.
#[derive(Debug, Clone)]
pub struct MachTask {
    port: mach_port_t,
    config: InspectConfig,
}

impl MachTask {
    /// Wrap a task port.
    ///
    /// # Safety
    ///
    /// `port` must be a task port (or task read port) for the target that
    /// stays valid for as long as this value is used.
    pub unsafe fn from_port(port: mach_port_t) -> Self {
        Self {
            port,
            config: InspectConfig::default(),
        }
    }

    /// Limits used when [`ProcessQuery::layout`] walks the image table.
    pub fn with_config(mut self, config: InspectConfig) -> Self {
        self.config = config;
        self
    }

    pub fn port(&self) -> mach_port_t {
        self.port
    }

    /// Address of `dyld_all_image_infos`, or `None` before dyld publishes it.
    pub fn image_table_address(&self) -> Result<Option<RemoteAddress>> {
        if self.port == MACH_PORT_NULL {
            return Err(AccessError::InvalidTask.into());
        }

        let mut info = task_dyld_info {
            all_image_info_addr: 0,
            all_image_info_size: 0,
            all_image_info_format: 0,
        };
        let mut count: mach_msg_type_number_t = TASK_DYLD_INFO_COUNT;

        let kr = unsafe {
            task_info(
                self.port,
                TASK_DYLD_INFO,
                &mut info as *mut task_dyld_info as task_info_t,
                &mut count,
            )
        };
        if kr != KERN_SUCCESS {
            return Err(AccessError::Kernel { address: 0, code: kr }.into());
        }

        trace!(
            addr = format_args!("{:#x}", info.all_image_info_addr),
            size = info.all_image_info_size,
            "TASK_DYLD_INFO"
        );
        Ok(Some(RemoteAddress(info.all_image_info_addr)).filter(|a| !a.is_null()))
    }
}

impl TaskMemory for MachTask {
    fn read_bytes(&self, addr: RemoteAddress, len: usize) -> std::result::Result<Vec<u8>, AccessError> {
        if self.port == MACH_PORT_NULL {
            return Err(AccessError::InvalidTask);
        }
        if len == 0 {
            return Ok(Vec::new());
        }
        addr.checked_add(len as u64 - 1)?;

        let mut buffer = vec![0u8; len];
        let mut actual: mach_vm_size_t = 0;
        let kr = unsafe {
            mach_vm_read_overwrite(
                self.port,
                addr.value(),
                len as mach_vm_size_t,
                buffer.as_mut_ptr() as mach_vm_address_t,
                &mut actual,
            )
        };

        if kr != KERN_SUCCESS {
            return Err(AccessError::Kernel {
                address: addr.value(),
                code: kr,
            });
        }
        if actual as usize != len {
            return Err(AccessError::ShortRead {
                address: addr.value(),
                wanted: len,
                got: actual as usize,
            });
        }
        Ok(buffer)
    }
}

impl ProcessQuery for MachTask {
    fn layout(&self, executable_path: &Path) -> Result<ProcessLayout> {
        let image_table_address = self
            .image_table_address()?
            .ok_or_else(|| InspectError::NotFound("dyld has not published its image table".into()))?;

        let table = ImageTable::read(self, image_table_address, &self.config)?;
        if table.count == 0 {
            return Err(InspectError::NotFound("dyld image table is still empty".into()));
        }

        let main = find_image(
            self,
            image_table_address,
            executable_path.as_os_str().as_bytes(),
            &self.config,
        )?;

        debug!(
            header = %main.load_address,
            image_table = %image_table_address,
            "Queried task layout"
        );
        Ok(ProcessLayout {
            header_address: main.load_address,
            image_table_address,
        })
    }
}
