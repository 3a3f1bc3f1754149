//! Base types for structure of a PKG4 file.

use std::fmt;

use binrw::{BinRead, BinWrite};

use crate::error::{Error, Result};

/// Smallest possible node record: a name id and a type tag.
pub(crate) const MIN_NODE_RECORD: u64 = 5;

/// Size of one entry in an auxiliary block's offset table.
pub(crate) const OFFSET_ENTRY: u64 = 8;

/// PKG4 file header
///
/// Defines the header of the PKG4 file which always starts with "PKG4".
/// All data is stored in little endian format
#[derive(BinRead, BinWrite, Debug, Default, Copy, Clone, PartialEq, Eq)]
#[brw(magic = b"PKG4", little)]
pub struct Header {
    /// The number of node records stored in the node block
    pub node_count: u32,

    /// The offset from the beginning of the file to the root node record
    pub node_offset: i64,

    /// The number of entries in the string table
    pub string_count: u32,

    /// The offset from the beginning of the file to the string offset table
    pub string_offset: i64,

    /// The number of entries in the image table
    pub image_count: u32,

    /// The offset from the beginning of the file to the image offset table
    pub image_offset: i64,

    /// The number of entries in the audio table
    pub audio_count: u32,

    /// The offset from the beginning of the file to the audio offset table
    pub audio_offset: i64,
}

impl Header {
    /// Size of the header in bytes, magic included
    pub const SIZE: usize = 52;

    /// Checks that every block the header declares lies inside a buffer of `len` bytes.
    pub fn validate(&self, len: usize) -> Result<()> {
        let len = len as u64;

        let node_offset = block_start("node", self.node_offset)?;
        if node_offset
            .checked_add(MIN_NODE_RECORD)
            .map_or(true, |end| end > len)
        {
            return Err(Error::invalid(format!(
                "node block at {node_offset} lies outside the buffer ({len} bytes)"
            )));
        }

        table_bounds("string", self.string_offset, self.string_count, len)?;
        table_bounds("image", self.image_offset, self.image_count, len)?;
        table_bounds("audio", self.audio_offset, self.audio_count, len)?;

        Ok(())
    }
}

fn block_start(block: &str, offset: i64) -> Result<u64> {
    u64::try_from(offset).map_err(|_| Error::invalid(format!("negative {block} block offset {offset}")))
}

fn table_bounds(block: &str, offset: i64, count: u32, len: u64) -> Result<()> {
    let start = block_start(block, offset)?;
    let end = (count as u64)
        .checked_mul(OFFSET_ENTRY)
        .and_then(|size| start.checked_add(size));

    match end {
        Some(end) if end <= len => Ok(()),
        _ => Err(Error::invalid(format!(
            "{block} table of {count} entries at {start} lies outside the buffer ({len} bytes)"
        ))),
    }
}

/// Identifies how the pixels of an [`Bitmap`] are laid out once decompressed
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[brw(repr = u16)]
pub enum PixelFormat {
    /// 4 bits per channel
    Bgra4444 = 1,

    /// 8 bits per channel
    Bgra8888 = 2,

    /// 5 bits per color channel with a single alpha bit
    Argb1555 = 257,

    /// 16 bit color without alpha
    Rgb565 = 513,
}

impl PixelFormat {
    /// Number of bytes one pixel occupies
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8888 => 4,
            PixelFormat::Bgra4444 | PixelFormat::Argb1555 | PixelFormat::Rgb565 => 2,
        }
    }

    /// A short lowercase name, usable as a file extension
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Bgra4444 => "bgra4444",
            PixelFormat::Bgra8888 => "bgra8888",
            PixelFormat::Argb1555 => "argb1555",
            PixelFormat::Rgb565 => "rgb565",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Image table entry
///
/// Precedes the compressed pixel data of every image
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq, Eq)]
#[brw(little)]
pub struct ImageHeader {
    /// Width in pixels
    pub width: u16,

    /// Height in pixels
    pub height: u16,

    /// Layout of the decompressed pixels
    pub format: PixelFormat,

    /// Number of compressed bytes following this header
    pub compressed_len: u32,
}

impl ImageHeader {
    /// Size of the entry header in bytes
    pub const SIZE: usize = 10;

    /// Size of the pixel data once decompressed
    pub fn decompressed_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// A pair of signed coordinates
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Point {
    /// Horizontal coordinate
    pub x: i32,
    /// Vertical coordinate
    pub y: i32,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A decoded image payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Layout of [`Bitmap::data`]
    pub format: PixelFormat,
    /// Decompressed pixel data
    pub data: Vec<u8>,
}

/// A raw audio payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    /// The bytes exactly as stored in the archive
    pub data: Vec<u8>,
}

impl AudioClip {
    /// Length of the clip in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the clip holds no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
