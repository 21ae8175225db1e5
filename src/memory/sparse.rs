//! An in-process stand-in for a target task.
//!
//! `SparseTaskMemory` holds a set of mapped regions keyed by their start
//! address. Reads follow the same all-or-nothing contract as a real task:
//! any byte of the requested range falling outside a region fails the whole
//! read. Useful for tests, fuzzing, and replaying captured memory.

use super::{AccessError, RemoteAddress, TaskMemory};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct SparseTaskMemory {
    regions: BTreeMap<u64, Vec<u8>>,
    revoked: AtomicBool,
    reads: AtomicUsize,
}

impl SparseTaskMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `data` at `start`, replacing any region that began at the same address.
    pub fn map(&mut self, start: u64, data: Vec<u8>) -> &mut Self {
        self.regions.insert(start, data);
        self
    }

    /// Builder form of [`map`](Self::map).
    pub fn with_region(mut self, start: u64, data: Vec<u8>) -> Self {
        self.map(start, data);
        self
    }

    /// Make every later read fail as if the task port died.
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    /// Number of `read_bytes` calls served so far (successful or not).
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    fn region_containing(&self, addr: u64) -> Option<(u64, &[u8])> {
        let (&start, data) = self.regions.range(..=addr).next_back()?;
        let offset = addr - start;
        if offset < data.len() as u64 {
            Some((start, data.as_slice()))
        } else {
            None
        }
    }
}

impl TaskMemory for SparseTaskMemory {
    fn read_bytes(&self, addr: RemoteAddress, len: usize) -> Result<Vec<u8>, AccessError> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        if self.revoked.load(Ordering::SeqCst) {
            return Err(AccessError::InvalidTask);
        }
        if len == 0 {
            return Ok(Vec::new());
        }
        addr.checked_add(len as u64 - 1)?;

        let unmapped = AccessError::Unmapped {
            address: addr.0,
            len,
        };

        // Adjacent regions read as one contiguous range.
        let mut out = Vec::with_capacity(len);
        let mut cursor = addr.0;
        while out.len() < len {
            let (start, data) = self.region_containing(cursor).ok_or(unmapped.clone())?;
            let from = (cursor - start) as usize;
            let take = (len - out.len()).min(data.len() - from);
            out.extend_from_slice(&data[from..from + take]);
            cursor = cursor.wrapping_add(take as u64);
        }

        Ok(out)
    }
}
