//! CLI command implementations.

pub mod crawl;
pub mod lookup;
pub mod reconcile;
pub mod whois;

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::snapshot::latest_snapshot;

/// Load the config file, or defaults when it does not exist
fn load_config(config_path: &Path) -> Result<Config> {
    Config::load_or_default(config_path)
}

/// Explicit snapshot, or the newest one in the configured directory
fn resolve_snapshot(explicit: Option<PathBuf>, config: &Config) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path),
        None => latest_snapshot(&config.snapshot_dir),
    }
}
