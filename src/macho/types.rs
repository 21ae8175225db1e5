//! Core Mach-O types and constants

use std::fmt;

/// 64-bit Mach-O magic in host byte order
pub const MH_MAGIC_64: u32 = 0xfeed_facf;
/// 64-bit Mach-O magic as seen when the producer's byte order differs
pub const MH_CIGAM_64: u32 = 0xcffa_edfe;
/// 32-bit Mach-O magic
pub const MH_MAGIC: u32 = 0xfeed_face;
pub const MH_CIGAM: u32 = 0xcefa_edfe;

/// Size of `mach_header_64`
pub const MACH_HEADER_64_SIZE: usize = 32;

/// Position-independent executable flag
pub const MH_PIE: u32 = 0x0020_0000;

/// Architecture-width bit carried in 64-bit CPU types
pub const CPU_ARCH_ABI64: u32 = 0x0100_0000;

pub const CPU_TYPE_X86: u32 = 7;
pub const CPU_TYPE_ARM: u32 = 12;
pub const CPU_TYPE_POWERPC: u32 = 18;
pub const CPU_TYPE_X86_64: u32 = CPU_TYPE_X86 | CPU_ARCH_ABI64;
pub const CPU_TYPE_ARM64: u32 = CPU_TYPE_ARM | CPU_ARCH_ABI64;
pub const CPU_TYPE_POWERPC64: u32 = CPU_TYPE_POWERPC | CPU_ARCH_ABI64;

/// `mach_header_64`, with every field already in host byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachHeader64 {
    pub magic: u32,
    pub cputype: u32,
    pub cpusubtype: u32,
    pub filetype: u32,
    pub ncmds: u32,
    pub sizeofcmds: u32,
    pub flags: u32,
    pub reserved: u32,
}

impl MachHeader64 {
    pub fn file_type(&self) -> FileType {
        FileType::from(self.filetype)
    }

    pub fn cpu_type(&self) -> CpuType {
        CpuType::from(self.cputype)
    }

    pub fn is_pie(&self) -> bool {
        self.flags & MH_PIE != 0
    }
}

/// Mach-O file type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Object,
    Execute,
    Dylib,
    Dylinker,
    Bundle,
    Other(u32),
}

impl From<u32> for FileType {
    fn from(val: u32) -> Self {
        match val {
            0x1 => FileType::Object,
            0x2 => FileType::Execute,
            0x6 => FileType::Dylib,
            0x7 => FileType::Dylinker,
            0x8 => FileType::Bundle,
            other => FileType::Other(other),
        }
    }
}

/// Mach-O CPU type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuType {
    X86_64,
    Arm64,
    PowerPC64,
    Other(u32),
}

impl From<u32> for CpuType {
    fn from(val: u32) -> Self {
        match val {
            CPU_TYPE_X86_64 => CpuType::X86_64,
            CPU_TYPE_ARM64 => CpuType::Arm64,
            CPU_TYPE_POWERPC64 => CpuType::PowerPC64,
            other => CpuType::Other(other),
        }
    }
}

impl fmt::Display for CpuType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CpuType::X86_64 => write!(f, "x86_64"),
            CpuType::Arm64 => write!(f, "arm64"),
            CpuType::PowerPC64 => write!(f, "ppc64"),
            CpuType::Other(v) => write!(f, "cpu({:#x})", v),
        }
    }
}
