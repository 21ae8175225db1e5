//! Configuration for remote inspection.
//!
//! All limits have defaults suitable for inspecting a normal macOS process;
//! they exist so hostile or corrupted target memory cannot drive unbounded
//! scans.

use crate::error::Result;
use crate::io::IOLimits;
use serde::{Deserialize, Serialize};

/// Page granularity ASLR slides are expected to respect.
pub const DEFAULT_PAGE_SIZE: u64 = 0x1000;

/// Master configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectConfig {
    /// Limits for reading the on-disk executable.
    pub io: IOLimits,
    /// Limits for remote C-string scans.
    pub strings: CStringLimits,
    /// Limits for walking the dyld image table.
    pub images: ImageTableLimits,
    /// ASLR slides must be a multiple of this (default: 0x1000).
    pub page_size: u64,
}

impl Default for InspectConfig {
    fn default() -> Self {
        Self {
            io: IOLimits::default(),
            strings: CStringLimits::default(),
            images: ImageTableLimits::default(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl InspectConfig {
    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Largest chunk a single string read may request.
pub const MAX_CHUNK_SIZE: usize = 1 << 16;

/// Remote C-string scan limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CStringLimits {
    /// Maximum bytes scanned before giving up (default: 4096).
    pub max_len: usize,
    /// Bytes requested per remote read; a power of two (default: 512).
    pub chunk_size: usize,
}

impl Default for CStringLimits {
    fn default() -> Self {
        Self {
            max_len: 4096,
            chunk_size: 512,
        }
    }
}

impl CStringLimits {
    /// Chunk size actually used: a power of two between 16 and
    /// [`MAX_CHUNK_SIZE`].
    pub fn effective_chunk(&self) -> usize {
        self.chunk_size.clamp(16, MAX_CHUNK_SIZE).next_power_of_two()
    }
}

/// dyld image table walk limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageTableLimits {
    /// Entry counts above this are treated as corruption (default: 16384).
    pub max_images: u32,
}

impl Default for ImageTableLimits {
    fn default() -> Self {
        Self { max_images: 16384 }
    }
}
