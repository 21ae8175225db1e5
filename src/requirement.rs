//! Checks that a target's memory holds expected bytes at a file address.
//!
//! The same datum is rendered differently per byte order, so an expectation
//! carries one rendering for each order and the executable's own byte order
//! picks which one applies.

use crate::error::{InspectError, Result};
use crate::memory::{Endianness, TaskMemory};
use crate::resolver::ExecutableInfo;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedBytes {
    pub little: Option<Vec<u8>>,
    pub big: Option<Vec<u8>>,
}

impl ExpectedBytes {
    /// Build from explicit renderings. When both are present they must be
    /// the same length.
    pub fn new(little: Option<Vec<u8>>, big: Option<Vec<u8>>) -> Result<Self> {
        let expected = Self { little, big };
        expected.validate()?;
        Ok(expected)
    }

    pub fn validate(&self) -> Result<()> {
        match (&self.little, &self.big) {
            (Some(l), Some(b)) if l.len() != b.len() => Err(InspectError::MismatchedRenderings {
                little: l.len(),
                big: b.len(),
            }),
            _ => Ok(()),
        }
    }

    /// The same bytes regardless of byte order.
    pub fn either(bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        Self {
            little: Some(bytes.clone()),
            big: Some(bytes),
        }
    }

    pub fn u32(value: u32) -> Self {
        Self {
            little: Some(value.to_le_bytes().to_vec()),
            big: Some(value.to_be_bytes().to_vec()),
        }
    }

    pub fn u64(value: u64) -> Self {
        Self {
            little: Some(value.to_le_bytes().to_vec()),
            big: Some(value.to_be_bytes().to_vec()),
        }
    }

    pub fn for_order(&self, order: Endianness) -> Option<&[u8]> {
        match order {
            Endianness::Little => self.little.as_deref(),
            Endianness::Big => self.big.as_deref(),
        }
    }
}

/// Bytes that must be present at `file_address` once the executable is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryRequirement {
    pub file_address: u64,
    pub expected: ExpectedBytes,
}

impl MemoryRequirement {
    pub fn new(file_address: u64, expected: ExpectedBytes) -> Self {
        Self {
            file_address,
            expected,
        }
    }

    pub fn is_satisfied<T: TaskMemory + ?Sized>(&self, info: &ExecutableInfo<'_, T>) -> Result<bool> {
        self.expected.validate()?;
        let order = info.byte_order();
        let expected = self
            .expected
            .for_order(order)
            .ok_or(InspectError::UnsupportedByteOrder(order))?;

        let actual = info.read_at_file_address(self.file_address, expected.len())?;
        let satisfied = actual == expected;

        debug!(
            file_address = format_args!("{:#x}", self.file_address),
            len = expected.len(),
            satisfied,
            "Checked memory requirement"
        );
        Ok(satisfied)
    }
}
