use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use miette::{IntoDiagnostic, Result};
use nx_archive::{Node, NodeKind};
use owo_colors::OwoColorize;
use serde::Serialize;

#[derive(Args)]
pub struct TreeArgs {
    /// An input NX file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Node to start from
    #[arg(short, long)]
    path: Option<String>,

    /// How many levels below the start node to print
    #[arg(long)]
    depth: Option<usize>,

    /// Print the tree as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
struct Entry {
    name: String,
    path: String,
    kind: NodeKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<Entry>,
}

impl TreeArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file, Default::default())?;
        let start = super::resolve(&archive, self.path.as_deref())?;
        let entry = collect(start, self.depth)?;

        let mut out = std::io::stdout().lock();
        if self.json {
            serde_json::to_writer_pretty(&mut out, &entry).into_diagnostic()?;
            writeln!(out).into_diagnostic()?;
        } else {
            print(&mut out, &entry, "", true, true)?;
        }

        archive.dispose();
        Ok(())
    }
}

fn collect(node: Node<'_>, depth: Option<usize>) -> Result<Entry> {
    let children = match depth {
        Some(0) => Vec::new(),
        _ => node
            .children()?
            .into_iter()
            .map(|child| collect(child, depth.map(|d| d - 1)))
            .collect::<Result<_>>()?,
    };

    Ok(Entry {
        name: node.name()?.to_string(),
        path: node.path()?,
        kind: node.kind()?,
        value: summary(node)?,
        children,
    })
}

/// A short rendering of the value, without decoding images or audio
fn summary(node: Node<'_>) -> Result<Option<String>> {
    Ok(match node.kind()? {
        NodeKind::Empty | NodeKind::Image | NodeKind::Audio => None,
        NodeKind::Link => Some(format!("-> {}", node.link()?.path()?)),
        _ => Some(node.value()?.to_string()),
    })
}

fn print(out: &mut impl Write, entry: &Entry, prefix: &str, last: bool, root: bool) -> Result<()> {
    let name = if root { entry.path.as_str() } else { entry.name.as_str() };
    let branch = match (root, last) {
        (true, _) => "",
        (false, true) => "└── ",
        (false, false) => "├── ",
    };

    write!(out, "{prefix}{branch}{} {}", name.bold(), entry.kind.dimmed()).into_diagnostic()?;
    if let Some(value) = &entry.value {
        write!(out, " {}", value.green()).into_diagnostic()?;
    }
    writeln!(out).into_diagnostic()?;

    let prefix = match (root, last) {
        (true, _) => String::new(),
        (false, true) => format!("{prefix}    "),
        (false, false) => format!("{prefix}│   "),
    };
    for (i, child) in entry.children.iter().enumerate() {
        print(out, child, &prefix, i + 1 == entry.children.len(), false)?;
    }
    Ok(())
}
