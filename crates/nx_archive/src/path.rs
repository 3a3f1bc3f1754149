//! Slash delimited paths over the node tree.

use crate::decode::Tree;
use crate::error::{Error, Result};
use crate::node::NodeId;

const SEPARATOR: char = '/';

/// Walks `path` starting at `start`, or at the root when the path begins with a separator
///
/// `.` segments are skipped and `..` moves to the parent. Every other segment, including an empty
/// one produced by repeated separators, must name a child exactly.
pub(crate) fn resolve(tree: &Tree, start: NodeId, path: &str) -> Result<NodeId> {
    let (mut current, rest) = match path.strip_prefix(SEPARATOR) {
        Some(rest) => (NodeId::ROOT, rest),
        None => (start, path),
    };

    if rest.is_empty() {
        return Ok(current);
    }

    let mut offset = path.len() - rest.len();
    for segment in rest.split(SEPARATOR) {
        let entry = tree.get(current);
        let next = match segment {
            "." => Some(current),
            ".." => entry.parent,
            name => entry.children.get(name).copied(),
        };

        current = next.ok_or_else(|| Error::NotFound {
            segment: segment.to_owned(),
            consumed: consumed(path, offset),
        })?;
        offset += segment.len() + SEPARATOR.len_utf8();
    }

    Ok(current)
}

fn consumed(path: &str, offset: usize) -> String {
    let before = path[..offset].trim_end_matches(SEPARATOR);
    if before.is_empty() && path.starts_with(SEPARATOR) {
        SEPARATOR.to_string()
    } else {
        before.to_owned()
    }
}

/// The absolute path of `id`
pub(crate) fn render(tree: &Tree, id: NodeId) -> String {
    let mut names = Vec::new();
    let mut current = id;
    while let Some(parent) = tree.get(current).parent {
        names.push(tree.get(current).name.clone());
        current = parent;
    }

    if names.is_empty() {
        return SEPARATOR.to_string();
    }

    names.iter().rev().fold(String::new(), |mut path, name| {
        path.push(SEPARATOR);
        path.push_str(name);
        path
    })
}
