use std::path::Path;

use miette::{Context, Result};
use nx_archive::{Archive, ArchiveOptions, Node};

pub mod extract;
pub mod get;
pub mod tree;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Print the node tree of an archive
    Tree(tree::TreeArgs),
    /// Print the value of a single node
    Get(get::GetArgs),
    /// Extract the images and audio of an archive into a directory
    Extract(extract::ExtractArgs),
}

impl Commands {
    pub fn handle(&self) -> Result<()> {
        match self {
            Commands::Tree(tree) => tree.handle(),
            Commands::Get(get) => get.handle(),
            Commands::Extract(extract) => extract.handle(),
        }
    }
}

fn open(file: &Path, options: ArchiveOptions) -> Result<Archive> {
    Archive::open_path(file, options).wrap_err_with(|| format!("path: {}", file.display()))
}

fn resolve<'a>(archive: &'a Archive, path: Option<&str>) -> Result<Node<'a>> {
    let path = path.unwrap_or("/");
    archive
        .resolve(path)
        .wrap_err_with(|| format!("resolving {path}"))
}
