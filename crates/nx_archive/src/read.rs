//! Types for reading PKG4 archives
//!

use std::{
    fmt::{self, Debug},
    fs::File,
    io::Cursor,
    path::Path,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use binrw::BinRead;
use bon::Builder;
use byteorder::{LittleEndian, ReadBytesExt};
use memmap2::Mmap;
use tracing::{debug, instrument, trace};

use crate::{
    compression::{Decompressor, Zlib},
    decode::{decode_tree, Payload, Tree},
    error::{Error, OutOfRangeError, Result},
    lazy::{LazyValue, LoadLock},
    node::{Node, NodeId, Value},
    path,
    source::BufferSource,
    strings::{take, Block, StringTable},
    types::{AudioClip, Bitmap, Header, ImageHeader},
};

/// Options for how an archive should be loaded
///
/// Everything is loaded on demand unless an `eager_*` flag asks for it to be loaded while opening.
#[derive(Debug, Clone, Builder)]
pub struct ArchiveOptions {
    /// Resolve every string while opening
    #[builder(default)]
    pub eager_strings: bool,

    /// Decompress every image while opening
    #[builder(default)]
    pub eager_images: bool,

    /// Copy out every audio blob while opening
    #[builder(default)]
    pub eager_audio: bool,

    /// Never expose image payloads, takes precedence over `eager_images`
    #[builder(default)]
    pub skip_images: bool,

    /// Build the node tree while opening, checking every id nodes refer to
    #[builder(default)]
    pub eager_nodes: bool,

    /// Used to decompress image payloads
    #[builder(default = Arc::new(Zlib) as Arc<dyn Decompressor>)]
    pub decompressor: Arc<dyn Decompressor>,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Counts of how many values have been loaded from the buffer
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct LoadStats {
    /// Times the node tree was decoded
    pub tree_builds: usize,
    /// Strings decoded
    pub strings: usize,
    /// Images decompressed
    pub images: usize,
    /// Audio blobs copied
    pub audio: usize,
}

/// Lazily loaded image or audio entries, one slot per id
struct PayloadTable<T> {
    block: Block,
    slots: Vec<LazyValue<Arc<T>>>,
    loads: AtomicUsize,
}

impl<T> PayloadTable<T> {
    fn new(block: Block) -> Self {
        Self {
            block,
            slots: (0..block.count).map(|_| LazyValue::new()).collect(),
            loads: AtomicUsize::new(0),
        }
    }

    fn get<F>(
        &self,
        id: u32,
        lock: &LoadLock,
        missing: fn(u32) -> OutOfRangeError,
        load: F,
    ) -> Result<Arc<T>>
    where
        F: FnOnce(&Block) -> Result<T>,
    {
        let slot = self.slots.get(id as usize).ok_or(missing(id))?;
        slot.get_or_load(lock, |_| {
            let value = load(&self.block)?;
            self.loads.fetch_add(1, Ordering::Relaxed);
            Ok(Arc::new(value))
        })
        .cloned()
    }
}

/// Everything derived from the buffer, dropped as one on disposal
pub(crate) struct Contents {
    source: Box<dyn BufferSource>,
    header: Header,
    decompressor: Arc<dyn Decompressor>,
    validate: bool,
    lock: LoadLock,
    strings: StringTable,
    images: PayloadTable<Bitmap>,
    audio: PayloadTable<AudioClip>,
    tree: LazyValue<Tree>,
    tree_builds: AtomicUsize,
}

impl Contents {
    fn bytes(&self) -> &[u8] {
        self.source.as_bytes()
    }

    fn tree(&self) -> Result<&Tree> {
        self.tree.get_or_load(&self.lock, |guard| {
            let tree = decode_tree(self.bytes(), &self.header, &self.strings, guard, self.validate)?;
            self.tree_builds.fetch_add(1, Ordering::Relaxed);
            Ok(tree)
        })
    }

    pub(crate) fn text(&self, id: u32) -> Result<Arc<str>> {
        self.strings.get(self.bytes(), id, &self.lock)
    }

    #[instrument(skip(self), err)]
    pub(crate) fn image(&self, id: u32) -> Result<Arc<Bitmap>> {
        self.images
            .get(id, &self.lock, OutOfRangeError::Image, |block| {
                let entry = block.entry(self.bytes(), id)?;
                let header = ImageHeader::read(&mut Cursor::new(entry))?;
                let compressed = take(&entry[ImageHeader::SIZE..], header.compressed_len as usize)?;
                let data = self
                    .decompressor
                    .decompress(compressed, header.decompressed_len())?;

                trace!(id, width = header.width, height = header.height, "decoded image");
                Ok(Bitmap {
                    width: header.width,
                    height: header.height,
                    format: header.format,
                    data,
                })
            })
    }

    #[instrument(skip(self), err)]
    pub(crate) fn audio(&self, id: u32) -> Result<Arc<AudioClip>> {
        self.audio
            .get(id, &self.lock, OutOfRangeError::Audio, |block| {
                let mut entry = block.entry(self.bytes(), id)?;
                let len = entry
                    .read_u32::<LittleEndian>()
                    .map_err(|_| Error::invalid(format!("audio {id} length is truncated")))?;
                let data = take(entry, len as usize)?.to_vec();

                trace!(id, len, "copied audio");
                Ok(AudioClip { data })
            })
    }

    /// The node a link node points at, resolved once per node
    pub(crate) fn link_target(&self, tree: &Tree, node: NodeId) -> Result<NodeId> {
        match &tree.get(node).payload {
            Payload::Link { id, target } => target
                .get_or_load(&self.lock, |_| tree.checked(*id))
                .copied(),
            _ => Ok(node),
        }
    }

    /// Follows links from `node` until reaching a node that is not a link
    pub(crate) fn follow(&self, tree: &Tree, node: NodeId) -> Result<NodeId> {
        let mut current = node;
        for _ in 0..=tree.len() {
            if !matches!(tree.get(current).payload, Payload::Link { .. }) {
                return Ok(current);
            }
            current = self.link_target(tree, current)?;
        }
        Err(Error::corrupt(format!("link cycle starting at node {node}")))
    }

    pub(crate) fn value(&self, payload: &Payload) -> Result<Value> {
        Ok(match payload {
            Payload::Empty => Value::Empty,
            Payload::Integer(v) => Value::Integer(*v),
            Payload::Real(v) => Value::Real(*v),
            Payload::Text(id) => Value::Text(self.text(*id)?),
            Payload::Point(v) => Value::Point(*v),
            Payload::Image(id) => Value::Image(self.image(*id)?),
            Payload::Audio(id) => Value::Audio(self.audio(*id)?),
            Payload::Link { .. } => {
                return Err(Error::corrupt("unresolved link value"));
            }
        })
    }

    fn stats(&self) -> LoadStats {
        LoadStats {
            tree_builds: self.tree_builds.load(Ordering::Relaxed),
            strings: self.strings.loads(),
            images: self.images.loads.load(Ordering::Relaxed),
            audio: self.audio.loads.load(Ordering::Relaxed),
        }
    }
}

/// PKG4 archive reader
///
/// An archive can be shared between threads; every lazily loaded value is loaded at most once no
/// matter how many threads ask for it first.
///
/// ```no_run
/// fn list_children(path: &str) -> nx_archive::error::Result<()> {
///     let archive = nx_archive::Archive::open_path(path, Default::default())?;
///
///     for child in archive.root()?.children()? {
///         println!("{}: {}", child.name()?, child.kind()?);
///     }
///
///     archive.dispose();
///     Ok(())
/// }
/// ```
pub struct Archive {
    contents: RwLock<Option<Contents>>,
}

impl Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.header() {
            Ok(header) => write!(f, "Archive({header:?})"),
            Err(_) => write!(f, "Archive(disposed)"),
        }
    }
}

impl Archive {
    /// Read an archive from a buffer holding the whole file.
    ///
    /// Only the header is read unless `options` asks for eager loading.
    #[instrument(skip_all, err)]
    pub fn open<S: BufferSource + 'static>(source: S, options: ArchiveOptions) -> Result<Archive> {
        let bytes = source.as_bytes();
        if bytes.len() < Header::SIZE {
            return Err(Error::invalid(format!(
                "buffer of {} bytes is smaller than the header",
                bytes.len()
            )));
        }

        let header = Header::read(&mut Cursor::new(bytes))?;
        header.validate(bytes.len())?;
        debug!(?header, len = bytes.len(), "read header");

        let image_block = if options.skip_images {
            Block {
                offset: 0,
                count: 0,
            }
        } else {
            Block {
                offset: header.image_offset as u64,
                count: header.image_count,
            }
        };

        let contents = Contents {
            source: Box::new(source),
            header,
            decompressor: options.decompressor,
            validate: options.eager_nodes,
            lock: LoadLock::default(),
            strings: StringTable::new(Block {
                offset: header.string_offset as u64,
                count: header.string_count,
            }),
            images: PayloadTable::new(image_block),
            audio: PayloadTable::new(Block {
                offset: header.audio_offset as u64,
                count: header.audio_count,
            }),
            tree: LazyValue::new(),
            tree_builds: AtomicUsize::new(0),
        };

        if options.eager_strings {
            debug!(count = header.string_count, "loading strings");
            for id in 0..header.string_count {
                contents.text(id)?;
            }
        }

        if options.eager_images && !options.skip_images {
            debug!(count = header.image_count, "loading images");
            for id in 0..header.image_count {
                contents.image(id)?;
            }
        }

        if options.eager_audio {
            debug!(count = header.audio_count, "loading audio");
            for id in 0..header.audio_count {
                contents.audio(id)?;
            }
        }

        if options.eager_nodes {
            debug!(count = header.node_count, "loading nodes");
            contents.tree()?;
        }

        Ok(Archive {
            contents: RwLock::new(Some(contents)),
        })
    }

    /// Memory map the file at `path` and read it as an archive.
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub fn open_path(path: impl AsRef<Path>, options: ArchiveOptions) -> Result<Archive> {
        let file = File::open(path.as_ref())?;

        // SAFETY: the mapping is read-only and archives are never modified while opened
        #[allow(unsafe_code)]
        let map = unsafe { Mmap::map(&file)? };

        Self::open(map, options)
    }

    /// The validated header
    pub fn header(&self) -> Result<Header> {
        self.with(|contents| Ok(contents.header))
    }

    /// The root node, decoding the node tree on first access
    pub fn root(&self) -> Result<Node<'_>> {
        self.with_tree(|_, _| Ok(Node::new(self, NodeId::ROOT)))
    }

    /// Get a node by its id
    pub fn node(&self, id: impl Into<NodeId>) -> Result<Node<'_>> {
        let id = id.into();
        self.with_tree(|_, tree| tree.checked(id.get()).map(|id| Node::new(self, id)))
    }

    /// Resolves a slash delimited path from the root
    ///
    /// A single leading `/` is optional, `.` segments are ignored and `..` moves to the parent.
    /// An empty path is the root itself.
    pub fn resolve(&self, path: &str) -> Result<Node<'_>> {
        self.with_tree(|_, tree| {
            path::resolve(tree, NodeId::ROOT, path).map(|id| Node::new(self, id))
        })
    }

    /// Resolve a string id through the string table
    pub fn resolve_string(&self, id: u32) -> Result<Arc<str>> {
        self.with(|contents| contents.text(id))
    }

    /// Counts of the values loaded so far
    pub fn stats(&self) -> Result<LoadStats> {
        self.with(|contents| Ok(contents.stats()))
    }

    /// Release the buffer and everything loaded from it
    ///
    /// Waits for in-flight reads to finish. Every later operation on the archive, or on any node
    /// obtained from it, fails with [`Error::Disposed`]. Disposing twice does nothing.
    pub fn dispose(&self) {
        let mut contents = self
            .contents
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        if contents.take().is_some() {
            debug!("disposed archive");
        }
    }

    /// Whether [`Archive::dispose`] has been called
    pub fn is_disposed(&self) -> bool {
        self.contents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub(crate) fn with<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Contents) -> Result<R>,
    {
        let contents = self
            .contents
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        f(contents.as_ref().ok_or(Error::Disposed)?)
    }

    pub(crate) fn with_tree<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Contents, &Tree) -> Result<R>,
    {
        self.with(|contents| f(contents, contents.tree()?))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use crate::error::Error;
    use crate::read::{Archive, ArchiveOptions};

    #[rustfmt::skip]
    static INPUT: [u8; 75] = [
        // Header (52)
        b'P', b'K', b'G', b'4',
        0x01, 0x00, 0x00, 0x00,
        0x34, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x01, 0x00, 0x00, 0x00,
        0x3D, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        // Root node, integer 7 (9)
        0x00, 0x00, 0x00, 0x00, 0x01, 0x07, 0x00, 0x00, 0x00,
        // String offset table (8)
        0x45, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        // "root" (6)
        0x04, 0x00, b'r', b'o', b'o', b't',
    ];

    #[test]
    fn read_minimal_archive() {
        let archive = Archive::open(&INPUT[..], ArchiveOptions::default()).unwrap();
        let root = archive.root().unwrap();

        assert_eq!(&*root.name().unwrap(), "root");
        assert_eq!(root.integer().unwrap(), 7);
        assert_eq!(root.parent().unwrap(), None);
        assert_eq!(archive.stats().unwrap().tree_builds, 1);
    }

    #[test]
    fn read_invalid_magic() {
        let mut input = INPUT;
        input[3] = b'3';

        assert!(matches!(
            Archive::open(input.to_vec(), ArchiveOptions::default()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn read_short_buffer() {
        assert!(matches!(
            Archive::open(INPUT[..40].to_vec(), ArchiveOptions::default()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn read_string_table_past_end() {
        assert!(matches!(
            Archive::open(INPUT[..66].to_vec(), ArchiveOptions::default()),
            Err(Error::InvalidFormat(_))
        ));
    }

    #[test]
    fn dispose_is_idempotent() {
        let archive = Archive::open(INPUT.to_vec(), ArchiveOptions::default()).unwrap();
        assert!(!archive.is_disposed());

        archive.dispose();
        archive.dispose();

        assert!(archive.is_disposed());
        assert!(matches!(archive.root(), Err(Error::Disposed)));
        assert!(matches!(archive.header(), Err(Error::Disposed)));
    }
}
