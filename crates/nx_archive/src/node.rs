//! Handles onto the nodes of an opened archive

use std::fmt;
use std::sync::Arc;

use derive_more::Display;

use crate::decode::Payload;
use crate::error::{Error, Result};
use crate::path;
use crate::read::{Archive, Contents};
use crate::types::{AudioClip, Bitmap, Point};

/// Stable identifier of a node, assigned in depth-first pre-order while parsing
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[display("#{_0}")]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// The root node is always the first record
    pub const ROOT: NodeId = NodeId(0);

    /// The raw id
    pub fn get(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<u32> for NodeId {
    fn from(value: u32) -> Self {
        NodeId(value)
    }
}

/// The type of payload a node carries
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(rename_all = "lowercase"))]
pub enum NodeKind {
    /// No value
    #[display("empty")]
    Empty,
    /// A signed integer
    #[display("integer")]
    Integer,
    /// A double precision float
    #[display("real")]
    Real,
    /// An interned string
    #[display("text")]
    Text,
    /// A pair of coordinates
    #[display("point")]
    Point,
    /// A compressed image
    #[display("image")]
    Image,
    /// An audio blob
    #[display("audio")]
    Audio,
    /// A reference to another node
    #[display("link")]
    Link,
}

impl NodeKind {
    /// Maps the low 7 bits of a record's type tag to a kind
    pub fn from_tag(tag: u8) -> Option<NodeKind> {
        Some(match tag {
            0 => NodeKind::Empty,
            1 => NodeKind::Integer,
            2 => NodeKind::Real,
            3 => NodeKind::Text,
            4 => NodeKind::Point,
            5 => NodeKind::Image,
            6 => NodeKind::Audio,
            7 => NodeKind::Link,
            _ => return None,
        })
    }
}

/// The value of a node, with links already followed
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// No value
    Empty,
    /// Integer value, widened from 32 bits
    Integer(i64),
    /// Real value
    Real(f64),
    /// Text, shared with the string table
    Text(Arc<str>),
    /// Point value
    Point(Point),
    /// Decoded image
    Image(Arc<Bitmap>),
    /// Audio blob
    Audio(Arc<AudioClip>),
}

impl Value {
    /// The kind of node this value was read from
    pub fn kind(&self) -> NodeKind {
        match self {
            Value::Empty => NodeKind::Empty,
            Value::Integer(_) => NodeKind::Integer,
            Value::Real(_) => NodeKind::Real,
            Value::Text(_) => NodeKind::Text,
            Value::Point(_) => NodeKind::Point,
            Value::Image(_) => NodeKind::Image,
            Value::Audio(_) => NodeKind::Audio,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => Ok(()),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => f.write_str(v),
            Value::Point(v) => write!(f, "{v}"),
            Value::Image(v) => write!(f, "{}x{} {} image", v.width, v.height, v.format),
            Value::Audio(v) => write!(f, "{} bytes of audio", v.len()),
        }
    }
}

/// A node of an [`Archive`]
///
/// Nodes are cheap handles and can be copied freely. Every accessor re-checks that the archive
/// has not been disposed and fails with [`Error::Disposed`] if it has, including for values that
/// were already loaded.
#[derive(Clone, Copy)]
pub struct Node<'a> {
    archive: &'a Archive,
    id: NodeId,
}

impl PartialEq for Node<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.archive, other.archive) && self.id == other.id
    }
}

impl Eq for Node<'_> {}

impl fmt::Debug for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Node({})", self.id)
    }
}

impl<'a> Node<'a> {
    pub(crate) fn new(archive: &'a Archive, id: NodeId) -> Self {
        Self { archive, id }
    }

    /// The node's id
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The archive this node belongs to
    pub fn archive(&self) -> &'a Archive {
        self.archive
    }

    /// The node's name
    pub fn name(&self) -> Result<Arc<str>> {
        self.archive
            .with_tree(|_, tree| Ok(tree.get(self.id).name.clone()))
    }

    /// The kind of payload this node carries; links are not followed
    pub fn kind(&self) -> Result<NodeKind> {
        self.archive
            .with_tree(|_, tree| Ok(tree.get(self.id).payload.kind()))
    }

    /// The node's parent, `None` for the root
    pub fn parent(&self) -> Result<Option<Node<'a>>> {
        self.archive.with_tree(|_, tree| {
            Ok(tree
                .get(self.id)
                .parent
                .map(|parent| Node::new(self.archive, parent)))
        })
    }

    /// Number of children
    pub fn len(&self) -> Result<usize> {
        self.archive
            .with_tree(|_, tree| Ok(tree.get(self.id).children.len()))
    }

    /// Whether this node has no children
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Search for a child by name
    pub fn child(&self, name: &str) -> Result<Option<Node<'a>>> {
        self.archive.with_tree(|_, tree| {
            Ok(tree
                .get(self.id)
                .children
                .get(name)
                .map(|&child| Node::new(self.archive, child)))
        })
    }

    /// All children, in the order they are stored
    pub fn children(&self) -> Result<Vec<Node<'a>>> {
        self.archive.with_tree(|_, tree| {
            Ok(tree
                .get(self.id)
                .children
                .values()
                .map(|&child| Node::new(self.archive, child))
                .collect())
        })
    }

    /// The absolute path of this node, `/` for the root
    pub fn path(&self) -> Result<String> {
        self.archive
            .with_tree(|_, tree| Ok(path::render(tree, self.id)))
    }

    /// Resolves `path` relative to this node
    ///
    /// A leading `/` starts from the root instead. See [`Archive::resolve`].
    pub fn resolve(&self, path: &str) -> Result<Node<'a>> {
        self.archive.with_tree(|_, tree| {
            path::resolve(tree, self.id, path).map(|id| Node::new(self.archive, id))
        })
    }

    /// The node's value, following links
    pub fn value(&self) -> Result<Value> {
        self.archive.with_tree(|contents, tree| {
            let target = contents.follow(tree, self.id)?;
            contents.value(&tree.get(target).payload)
        })
    }

    /// The node's integer value
    pub fn integer(&self) -> Result<i64> {
        self.typed(NodeKind::Integer, |_, payload| match payload {
            Payload::Integer(v) => Some(Ok(*v)),
            _ => None,
        })
    }

    /// The node's real value
    pub fn real(&self) -> Result<f64> {
        self.typed(NodeKind::Real, |_, payload| match payload {
            Payload::Real(v) => Some(Ok(*v)),
            _ => None,
        })
    }

    /// The node's text, resolved through the string table
    pub fn text(&self) -> Result<Arc<str>> {
        self.typed(NodeKind::Text, |contents, payload| match payload {
            Payload::Text(id) => Some(contents.text(*id)),
            _ => None,
        })
    }

    /// The node's point value
    pub fn point(&self) -> Result<Point> {
        self.typed(NodeKind::Point, |_, payload| match payload {
            Payload::Point(v) => Some(Ok(*v)),
            _ => None,
        })
    }

    /// The node's image, decompressed on first access
    pub fn image(&self) -> Result<Arc<Bitmap>> {
        self.typed(NodeKind::Image, |contents, payload| match payload {
            Payload::Image(id) => Some(contents.image(*id)),
            _ => None,
        })
    }

    /// The node's audio, copied out of the archive on first access
    pub fn audio(&self) -> Result<Arc<AudioClip>> {
        self.typed(NodeKind::Audio, |contents, payload| match payload {
            Payload::Audio(id) => Some(contents.audio(*id)),
            _ => None,
        })
    }

    /// The node a link node refers to
    ///
    /// Only one link is followed, so the returned node may itself be a link.
    pub fn link(&self) -> Result<Node<'a>> {
        self.archive.with_tree(|contents, tree| match &tree.get(self.id).payload {
            Payload::Link { .. } => Ok(Node::new(
                self.archive,
                contents.link_target(tree, self.id)?,
            )),
            other => Err(Error::TypeMismatch {
                expected: NodeKind::Link,
                found: other.kind(),
            }),
        })
    }

    fn typed<T, F>(&self, expected: NodeKind, read: F) -> Result<T>
    where
        F: FnOnce(&Contents, &Payload) -> Option<Result<T>>,
    {
        self.archive.with_tree(|contents, tree| {
            let payload = &tree.get(contents.follow(tree, self.id)?).payload;
            read(contents, payload).unwrap_or_else(|| {
                Err(Error::TypeMismatch {
                    expected,
                    found: payload.kind(),
                })
            })
        })
    }
}
