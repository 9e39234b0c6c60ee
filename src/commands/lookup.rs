//! Lookup command implementation.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::{load_config, resolve_snapshot};
use crate::cidr::parse_block;
use crate::reconcile::{classify, Classification};
use crate::snapshot::Snapshot;

/// Run the lookup command
pub async fn run(prefix: &str, snapshot: Option<PathBuf>, config_path: &Path) -> Result<()> {
    let block = parse_block(prefix).with_context(|| format!("Invalid prefix: {}", prefix))?;

    let config = load_config(config_path)?;
    let path = resolve_snapshot(snapshot, &config)?;
    info!("Using snapshot {}", path.display());
    let trie = Snapshot::load(&path)?.build_trie()?;

    let classification = classify(&trie, &block);
    match classification {
        Classification::Exact(allocation) | Classification::Covered(allocation) => {
            println!(
                "{} {} {} \"{}\"",
                block,
                classification.status().as_str(),
                allocation.block,
                allocation.meta.description
            );
        }
        Classification::Unexplained => {
            println!("{} {}", block, classification.status().as_str());
        }
    }

    Ok(())
}
