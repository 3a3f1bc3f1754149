//! The interned string table.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::trace;

use crate::error::{Error, OutOfRangeError, Result};
use crate::lazy::{LazyValue, LoadGuard, LoadLock};

/// An offset table at the start of an auxiliary block
#[derive(Debug, Clone, Copy)]
pub(crate) struct Block {
    pub offset: u64,
    pub count: u32,
}

impl Block {
    /// The bytes from the start of entry `id` to the end of the buffer
    ///
    /// The caller has already checked `id` against [`Block::count`].
    pub fn entry<'b>(&self, bytes: &'b [u8], id: u32) -> Result<&'b [u8]> {
        // The table itself was bounds checked when the header was validated
        let slot = self.offset + id as u64 * 8;
        let mut table = bytes.get(slot as usize..).unwrap_or_default();
        let start = table
            .read_u64::<LittleEndian>()
            .map_err(|_| Error::invalid(format!("offset table entry {id} is truncated")))?;

        usize::try_from(start)
            .ok()
            .and_then(|start| bytes.get(start..))
            .ok_or_else(|| Error::invalid(format!("entry {id} points past the buffer ({start})")))
    }
}

/// Reads `len` bytes from the front of `entry`
pub(crate) fn take(entry: &[u8], len: usize) -> Result<&[u8]> {
    entry
        .get(..len)
        .ok_or_else(|| Error::invalid(format!("entry of {len} bytes runs past the buffer")))
}

/// One lazily decoded slot per declared string id
#[derive(Debug)]
pub(crate) struct StringTable {
    block: Block,
    slots: Vec<LazyValue<Arc<str>>>,
    loads: AtomicUsize,
}

impl StringTable {
    pub fn new(block: Block) -> Self {
        Self {
            block,
            slots: (0..block.count).map(|_| LazyValue::new()).collect(),
            loads: AtomicUsize::new(0),
        }
    }

    /// Number of strings decoded from the buffer so far
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }

    pub fn get(&self, bytes: &[u8], id: u32, lock: &LoadLock) -> Result<Arc<str>> {
        self.slot(id)?
            .get_or_load(lock, |_| self.load(bytes, id))
            .cloned()
    }

    pub fn get_locked(&self, bytes: &[u8], id: u32, guard: &LoadGuard<'_>) -> Result<Arc<str>> {
        self.slot(id)?
            .get_or_load_locked(guard, || self.load(bytes, id))
            .cloned()
    }

    fn slot(&self, id: u32) -> Result<&LazyValue<Arc<str>>> {
        self.slots
            .get(id as usize)
            .ok_or(Error::OutOfRange(OutOfRangeError::String(id)))
    }

    fn load(&self, bytes: &[u8], id: u32) -> Result<Arc<str>> {
        let mut entry = self.block.entry(bytes, id)?;
        let len = entry
            .read_u16::<LittleEndian>()
            .map_err(|_| Error::invalid(format!("string {id} length is truncated")))?;
        let raw = take(entry, len as usize)?;

        let text = std::str::from_utf8(raw)
            .map_err(|e| Error::corrupt(format!("string {id} is not UTF-8: {e}")))?;

        self.loads.fetch_add(1, Ordering::Relaxed);
        trace!(id, len, "resolved string");
        Ok(Arc::from(text))
    }
}
