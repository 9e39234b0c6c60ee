//! Crawl command implementation.

use anyhow::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::info;

use super::load_config;
use crate::crawler::PortalCrawler;
use crate::cidr::address_count;
use crate::snapshot::{snapshot_path, snapshot_timestamp, Snapshot};
use crate::utils::format_count;

/// Run the crawl command
pub async fn run(output_dir: Option<PathBuf>, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let dir = output_dir.unwrap_or_else(|| config.snapshot_dir.clone());

    let started = Local::now();
    info!("Crawling {}", config.portal.start_url);
    let crawler = PortalCrawler::new(&config.portal.start_url, config.http_timeout())?;
    let trie = crawler.crawl().await?;

    let snapshot = Snapshot::from_trie(&trie, snapshot_timestamp(started));
    let path = snapshot_path(&dir, started.date_naive());
    snapshot.save(&path)?;

    // Addresses under allocations with no broader allocation above them
    let top_level: u64 = trie
        .iter()
        .filter(|a| {
            a.block.supernet().map_or(true, |parent| trie.search_best(&parent).is_none())
        })
        .map(|a| address_count(&a.block))
        .sum();
    info!(
        "Saved {} allocations covering {} addresses to {}",
        format_count(snapshot.prefixes.len()),
        top_level,
        path.display()
    );
    Ok(())
}
