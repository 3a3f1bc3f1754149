use std::path::PathBuf;

use clap::Args;
use miette::Result;
use nx_archive::Value;
use owo_colors::OwoColorize;

#[derive(Args)]
pub struct GetArgs {
    /// An input NX file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// The node to print
    #[arg(short, long)]
    path: String,
}

impl GetArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file, Default::default())?;
        let node = super::resolve(&archive, Some(self.path.as_str()))?;

        match node.value()? {
            Value::Empty => println!("{}", "(empty)".dimmed()),
            value => println!("{value}"),
        }

        archive.dispose();
        Ok(())
    }
}
