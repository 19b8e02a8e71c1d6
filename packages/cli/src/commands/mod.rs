pub mod conflicts;
pub mod merge;
pub mod validate;

pub use conflicts::{conflicts, ConflictsArgs};
pub use merge::{merge, MergeArgs};
pub use validate::{validate, ValidateArgs};

use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use sitediff_merge::Picks;
use sitediff_model::{parse_document, Document};
use std::fs;
use std::path::{Path, PathBuf};

/// The three documents of a merge
#[derive(Debug, Args)]
pub struct MergeInputs {
    /// Common ancestor document
    #[arg(long)]
    pub ancestor: PathBuf,

    /// Left branch document
    #[arg(long)]
    pub left: PathBuf,

    /// Right branch document
    #[arg(long)]
    pub right: PathBuf,

    /// JSON map of conflict path to "left" or "right" (overrides config)
    #[arg(long)]
    pub picks: Option<PathBuf>,
}

pub struct LoadedInputs {
    pub ancestor: Document,
    pub left: Document,
    pub right: Document,
    pub picks: Option<Picks>,
}

impl MergeInputs {
    pub fn load(&self, config: &Config, cwd: &str) -> Result<LoadedInputs> {
        let picks_path = self.picks.clone().or_else(|| config.get_picks_file(cwd));
        let picks = match picks_path {
            Some(path) => Some(read_picks(&path)?),
            None => None,
        };
        Ok(LoadedInputs {
            ancestor: read_document(&self.ancestor)?,
            left: read_document(&self.left)?,
            right: read_document(&self.right)?,
            picks,
        })
    }
}

pub fn read_document(path: &Path) -> Result<Document> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    parse_document(&content).with_context(|| format!("Invalid document {}", path.display()))
}

pub fn read_picks(path: &Path) -> Result<Picks> {
    let content =
        fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid picks file {}", path.display()))
}
