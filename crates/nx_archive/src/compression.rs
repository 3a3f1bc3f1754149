//! Payload decompression handling.

use std::fmt::Debug;
use std::io::Read;

use flate2::read::ZlibDecoder;
use tracing::instrument;

use crate::error::{Error, Result};

/// Turns the compressed bytes of an image entry back into raw pixels
///
/// The archive hands every implementation the exact size the output must have. Producing anything
/// else, or failing to decode, is reported as [`Error::CorruptData`].
///
/// The decompressor used by an archive is picked with [`crate::ArchiveOptions`].
pub trait Decompressor: Debug + Send + Sync {
    /// Decompress `compressed` into a buffer of exactly `expected_len` bytes
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>>;
}

/// Decompress the data using Zlib
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Zlib;

impl Decompressor for Zlib {
    #[instrument(skip(compressed), fields(compressed = compressed.len()), err)]
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(expected_len);

        // One byte past the expected size is enough to detect oversized payloads
        ZlibDecoder::new(compressed)
            .take(expected_len as u64 + 1)
            .read_to_end(&mut output)
            .map_err(|e| Error::corrupt(format!("zlib: {e}")))?;

        check_len(output, expected_len)
    }
}

/// Data is stored as it is
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Stored;

impl Decompressor for Stored {
    fn decompress(&self, compressed: &[u8], expected_len: usize) -> Result<Vec<u8>> {
        check_len(compressed.to_vec(), expected_len)
    }
}

fn check_len(output: Vec<u8>, expected_len: usize) -> Result<Vec<u8>> {
    if output.len() != expected_len {
        return Err(Error::corrupt(format!(
            "expected {expected_len} bytes after decompression, got {}",
            output.len()
        )));
    }
    Ok(output)
}
