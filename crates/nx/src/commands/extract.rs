use std::fs::File;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use nx_archive::{ArchiveOptions, NodeKind};
use tracing::{info, warn};

#[derive(Args)]
pub struct ExtractArgs {
    /// An input NX file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Only extract below this node
    #[arg(short, long)]
    path: Option<String>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = super::open(&self.file, ArchiveOptions::default())?;
        let start = super::resolve(&archive, self.path.as_deref())?;

        let mut pending = vec![start];
        let mut written = 0;
        while let Some(node) = pending.pop() {
            pending.extend(node.children()?.into_iter().rev());

            let path = node.path()?;
            match node.kind()? {
                NodeKind::Image => {
                    let image = node.image()?;
                    let extension = format!("{}x{}.{}", image.width, image.height, image.format);
                    let Some(target) = self.target(&path, &extension) else {
                        warn!("skipping {path}, it would be written outside the directory");
                        continue;
                    };
                    self.write(&target, &image.data)?;
                }
                NodeKind::Audio => {
                    let Some(target) = self.target(&path, "bin") else {
                        warn!("skipping {path}, it would be written outside the directory");
                        continue;
                    };
                    self.write(&target, &node.audio()?.data)?;
                }
                _ => continue,
            }
            written += 1;
        }

        info!(count = written, "extracted payloads");
        archive.dispose();
        Ok(())
    }

    /// Where a node's payload is written, mirroring its path inside the archive
    ///
    /// `None` when the path has a component that is not a plain name, such as `..`.
    fn target(&self, node_path: &str, extension: &str) -> Option<PathBuf> {
        let relative = Path::new(node_path.trim_start_matches('/'));
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        let mut target = if relative.as_os_str().is_empty() {
            self.directory.join("root")
        } else {
            self.directory.join(relative)
        };
        target.as_mut_os_string().push(format!(".{extension}"));
        Some(target)
    }

    fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        info!("writing {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .into_diagnostic()
                .context(format!("creating {}", parent.display()))?;
        }

        let mut out = if !self.overwrite {
            File::create_new(path)
                .into_diagnostic()
                .context(format!("creating {}", path.display()))?
        } else {
            File::create(path)
                .into_diagnostic()
                .context(format!("creating {}", path.display()))?
        };

        out.write_all(data).into_diagnostic()
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use pretty_assertions::assert_eq;

    use super::ExtractArgs;

    fn args() -> ExtractArgs {
        ExtractArgs {
            file: PathBuf::from("data.nx"),
            directory: PathBuf::from("out"),
            path: None,
            overwrite: false,
        }
    }

    #[test]
    fn target_mirrors_node_path() {
        let args = args();

        assert_eq!(
            args.target("/sounds/bgm", "bin"),
            Some(PathBuf::from("out/sounds/bgm.bin"))
        );
        assert_eq!(
            args.target("/icon", "16x16.bgra8888"),
            Some(PathBuf::from("out/icon.16x16.bgra8888"))
        );
        assert_eq!(args.target("/", "bin"), Some(PathBuf::from("out/root.bin")));
    }

    #[test]
    fn target_stays_inside_directory() {
        let args = args();

        assert_eq!(args.target("/../evil", "bin"), None);
        assert_eq!(args.target("/a/../../evil", "bin"), None);
        assert_eq!(args.target("/..", "bin"), None);
        assert_eq!(args.target("/.", "bin"), None);
    }
}
