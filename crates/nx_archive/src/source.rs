//! Backing buffers an archive can be read from

use std::sync::Arc;

use memmap2::Mmap;

/// A contiguous, read-only byte region holding a whole archive
///
/// The region must stay valid and unchanged for as long as the source is alive. It is released by
/// dropping the source, which [`crate::Archive::dispose`] does exactly once.
pub trait BufferSource: Send + Sync {
    /// The whole archive
    fn as_bytes(&self) -> &[u8];
}

impl BufferSource for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl BufferSource for Box<[u8]> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl BufferSource for Arc<[u8]> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl BufferSource for &'static [u8] {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl BufferSource for Mmap {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}
