//! Node record decoding and the node arena it produces.

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, instrument};
use winnow::binary;
use winnow::error::ContextError;
use winnow::PResult;

use crate::error::{Error, OutOfRangeError, Result};
use crate::lazy::{LazyValue, LoadGuard};
use crate::node::{NodeId, NodeKind};
use crate::strings::StringTable;
use crate::types::{Header, Point, MIN_NODE_RECORD};

const TAG_KIND_MASK: u8 = 0x7F;
const TAG_HAS_CHILDREN: u8 = 0x80;

/// The payload of a node as stored in the arena
#[derive(Debug)]
pub(crate) enum Payload {
    Empty,
    Integer(i64),
    Real(f64),
    Text(u32),
    Point(Point),
    Image(u32),
    Audio(u32),
    Link { id: u32, target: LazyValue<NodeId> },
}

impl Payload {
    pub fn kind(&self) -> NodeKind {
        match self {
            Payload::Empty => NodeKind::Empty,
            Payload::Integer(_) => NodeKind::Integer,
            Payload::Real(_) => NodeKind::Real,
            Payload::Text(_) => NodeKind::Text,
            Payload::Point(_) => NodeKind::Point,
            Payload::Image(_) => NodeKind::Image,
            Payload::Audio(_) => NodeKind::Audio,
            Payload::Link { .. } => NodeKind::Link,
        }
    }
}

#[derive(Debug)]
pub(crate) struct NodeEntry {
    pub name: Arc<str>,
    pub parent: Option<NodeId>,
    pub children: IndexMap<Arc<str>, NodeId>,
    pub payload: Payload,
}

/// Every node of an archive, indexed by [`NodeId`]
#[derive(Debug)]
pub(crate) struct Tree {
    nodes: Vec<NodeEntry>,
}

impl Tree {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Looks up an id handed out by this tree
    pub fn get(&self, id: NodeId) -> &NodeEntry {
        &self.nodes[id.index()]
    }

    /// Looks up an id from outside the tree
    pub fn checked(&self, id: u32) -> Result<NodeId> {
        if (id as usize) < self.nodes.len() {
            Ok(NodeId(id))
        } else {
            Err(OutOfRangeError::Node(id).into())
        }
    }
}

/// Parses the node block starting at the root record.
///
/// Records are assigned ids in the order they are read, and every node is in the arena before any
/// of its children are read. With `validate` set, every id a node refers to is checked against the
/// header counts as well; otherwise those checks happen when the value is first read.
#[instrument(skip_all, fields(offset = header.node_offset, validate = validate), err)]
pub(crate) fn decode_tree(
    bytes: &[u8],
    header: &Header,
    strings: &StringTable,
    guard: &LoadGuard<'_>,
    validate: bool,
) -> Result<Tree> {
    let mut input = usize::try_from(header.node_offset)
        .ok()
        .and_then(|offset| bytes.get(offset..))
        .ok_or_else(|| Error::invalid("node block lies outside the buffer"))?;

    let mut decoder = Decoder {
        bytes,
        header,
        strings,
        guard,
        validate,
        nodes: Vec::with_capacity(capacity(header, input.len())),
    };

    let root = decoder.record(&mut input, None)?;
    let mut pending = vec![root];
    while let Some((parent, remaining)) = pending.last_mut() {
        if *remaining == 0 {
            pending.pop();
            continue;
        }
        *remaining -= 1;

        let parent = *parent;
        let (child, count) = decoder.record(&mut input, Some(parent))?;
        decoder.attach(parent, child)?;
        pending.push((child, count));
    }

    let tree = Tree {
        nodes: decoder.nodes,
    };

    if validate {
        for entry in &tree.nodes {
            if let Payload::Link { id, .. } = entry.payload {
                tree.checked(id)?;
            }
        }
    }

    debug!(nodes = tree.len(), "decoded node tree");
    Ok(tree)
}

struct Decoder<'d, 'g> {
    bytes: &'d [u8],
    header: &'d Header,
    strings: &'d StringTable,
    guard: &'d LoadGuard<'g>,
    validate: bool,
    nodes: Vec<NodeEntry>,
}

impl Decoder<'_, '_> {
    /// Reads one record and registers it, returning its id and how many children follow it
    fn record(&mut self, input: &mut &[u8], parent: Option<NodeId>) -> Result<(NodeId, u16)> {
        let name_id = read(input, binary::le_u32, "name")?;
        let tag = read(input, binary::u8, "type tag")?;

        let kind = NodeKind::from_tag(tag & TAG_KIND_MASK)
            .ok_or_else(|| Error::invalid(format!("unknown node type tag {tag:#04x}")))?;

        let payload = match kind {
            NodeKind::Empty => Payload::Empty,
            NodeKind::Integer => Payload::Integer(read(input, binary::le_i32, "integer")?.into()),
            NodeKind::Real => Payload::Real(read(input, binary::le_f64, "real")?),
            NodeKind::Text => {
                let id = read(input, binary::le_u32, "string id")?;
                self.check(id, self.header.string_count, OutOfRangeError::String)?;
                Payload::Text(id)
            }
            NodeKind::Point => Payload::Point(Point {
                x: read(input, binary::le_i32, "point x")?,
                y: read(input, binary::le_i32, "point y")?,
            }),
            NodeKind::Image => {
                let id = read(input, binary::le_u32, "image id")?;
                self.check(id, self.header.image_count, OutOfRangeError::Image)?;
                Payload::Image(id)
            }
            NodeKind::Audio => {
                let id = read(input, binary::le_u32, "audio id")?;
                self.check(id, self.header.audio_count, OutOfRangeError::Audio)?;
                Payload::Audio(id)
            }
            NodeKind::Link => Payload::Link {
                id: read(input, binary::le_u32, "link id")?,
                target: LazyValue::new(),
            },
        };

        let children = if tag & TAG_HAS_CHILDREN != 0 {
            read(input, binary::le_u16, "child count")?
        } else {
            0
        };

        let name = self.strings.get_locked(self.bytes, name_id, self.guard)?;
        let id = u32::try_from(self.nodes.len())
            .map(NodeId)
            .map_err(|_| Error::invalid("too many nodes"))?;

        self.nodes.push(NodeEntry {
            name,
            parent,
            children: IndexMap::new(),
            payload,
        });

        Ok((id, children))
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let name = self.nodes[child.index()].name.clone();
        let siblings = &mut self.nodes[parent.index()].children;

        if siblings.insert(name.clone(), child).is_some() {
            return Err(Error::invalid(format!(
                "node {parent} has more than one child named {name:?}"
            )));
        }
        Ok(())
    }

    fn check(&self, id: u32, count: u32, kind: fn(u32) -> OutOfRangeError) -> Result<()> {
        if self.validate && id >= count {
            return Err(kind(id).into());
        }
        Ok(())
    }
}

/// The header's node count, bounded by how many records the node block can hold
fn capacity(header: &Header, block_len: usize) -> usize {
    (header.node_count as usize).min(block_len / MIN_NODE_RECORD as usize)
}

fn read<'b, O>(
    input: &mut &'b [u8],
    parser: fn(&mut &'b [u8]) -> PResult<O, ContextError>,
    field: &str,
) -> Result<O> {
    parser(input).map_err(|_| Error::invalid(format!("node record truncated reading {field}")))
}
