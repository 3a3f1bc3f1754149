//! This library handles reading **PKG4** node archives.
//!
//! # PKG4 Archive Format Documentation
//!
//! A PKG4 archive stores a tree of named, typed nodes together with three auxiliary blocks: a table
//! of de-duplicated strings, a table of compressed images and a table of audio blobs. Archives are
//! read-only and are meant to be memory mapped (or held as one byte buffer) so that nodes can be
//! reached without a deserialization pass over the whole file.
//!
//! ## File Structure
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "PKG4"                                            |
//! | 0x0004         | Node Count             | 4 bytes: Number of node records in the node block          |
//! | 0x0008         | Node Offset            | 8 bytes: Offset to the first (root) node record            |
//! | 0x0010         | String Count           | 4 bytes: Number of entries in the string table             |
//! | 0x0014         | String Offset          | 8 bytes: Offset to the string offset table                 |
//! | 0x001C         | Image Count            | 4 bytes: Number of entries in the image table              |
//! | 0x0020         | Image Offset           | 8 bytes: Offset to the image offset table                  |
//! | 0x0028         | Audio Count            | 4 bytes: Number of entries in the audio table              |
//! | 0x002C         | Audio Offset           | 8 bytes: Offset to the audio offset table                  |
//!
//! ### Node Records
//!
//! Node records are stored depth first, each record directly followed by its children:
//!
//! | Field        | Size     | Description                                                    |
//! |--------------|----------|----------------------------------------------------------------|
//! | Name         | 4 bytes  | String id of the node's name                                   |
//! | Type Tag     | 1 byte   | Low 7 bits select the payload type, high bit flags children    |
//! | Payload      | 0-8      | Type specific, see below                                       |
//! | Child Count  | 2 bytes  | Only present when the high bit of the tag is set               |
//!
//! Payload types:
//!   - `0`: Empty (no payload)
//!   - `1`: Integer (4 bytes, signed, widened to 64 bits)
//!   - `2`: Real (8 bytes, IEEE-754 double)
//!   - `3`: Text (4 bytes, string id)
//!   - `4`: Point (4 + 4 bytes, signed x and y)
//!   - `5`: Image (4 bytes, image id)
//!   - `6`: Audio (4 bytes, audio id)
//!   - `7`: Link (4 bytes, id of another node)
//!
//! Node ids are assigned in the order records appear, starting with `0` for the root.
//!
//! ### Auxiliary Blocks
//!
//! Each auxiliary block starts with a table of 8-byte offsets indexed by id. The entries pointed to are:
//!
//! - **String**: `[len:u16][len bytes of UTF-8]`
//! - **Image**: `[width:u16][height:u16][format:u16][compressed_len:u32][compressed bytes]`
//! - **Audio**: `[len:u32][len raw bytes]`
//!
//! ## Additional Information
//!
//! - **File Extension**: `.nx`
//! - **Endianness**: Little-endian for all multi-byte integers
//! - **Image Compression**: Zlib by default, see [`compression::Decompressor`]
//!

pub mod compression;
pub mod error;
pub mod node;
pub mod read;
pub mod source;
pub mod types;

mod decode;
mod lazy;
mod path;
mod strings;

pub use compression::Decompressor;
pub use node::{Node, NodeId, NodeKind, Value};
pub use read::{Archive, ArchiveOptions, LoadStats};
pub use source::BufferSource;
pub use types::{AudioClip, Bitmap, Header, PixelFormat, Point};
