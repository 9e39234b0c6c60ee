//! Reconcile command implementation.
//!
//! Loads an allocation snapshot, pulls announced prefixes from RIPEstat for
//! every covering prefix and writes one report line per reported prefix to
//! stdout. The run summary goes to the log.

use anyhow::{Context, Result};
use chrono::Utc;
use ipnet::Ipv4Net;
use std::path::{Path, PathBuf};
use tracing::info;

use super::{load_config, resolve_snapshot};
use crate::cache::HolderCache;
use crate::cidr::parse_block;
use crate::config::Config;
use crate::reconcile::{Reconciler, ReportPolicy};
use crate::report::{CsvSink, JsonLinesSink, ReportFormat, ReportSink};
use crate::snapshot::Snapshot;
use crate::sources::{AnnouncementQuery, RipeStat, TimeWindow, WhoisClient};
use crate::utils::{format_count, parse_time};

/// Command-line overrides for a reconciliation run
#[derive(Debug, Default)]
pub struct ReconcileArgs {
    pub snapshot: Option<PathBuf>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub min_peers: Option<u32>,
    pub covering: Vec<String>,
    pub whois: bool,
    pub policy: Option<ReportPolicy>,
    pub format: Option<ReportFormat>,
}

/// Run the reconcile command
pub async fn run(args: ReconcileArgs, config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;

    let window = build_window(&args, &config)?;
    let min_peers = args.min_peers.unwrap_or(config.ripestat.min_peers);
    if min_peers == 0 {
        anyhow::bail!("--min-peers must be greater than 0");
    }
    let covering = covering_prefixes(&args, &config)?;
    let policy = args.policy.unwrap_or(config.report.policy);
    let format = args.format.unwrap_or(config.report.format);
    let use_whois = args.whois || config.whois.enabled;

    let path = resolve_snapshot(args.snapshot, &config)?;
    let snapshot = Snapshot::load(&path)?;
    let trie = snapshot
        .build_trie()
        .with_context(|| format!("Invalid snapshot: {}", path.display()))?;
    info!(
        "Loaded {} allocations from {} ({})",
        format_count(trie.len()),
        path.display(),
        snapshot.timestamp
    );

    let ripestat = RipeStat::new(&config.ripestat.base_url, config.http_timeout())?;
    let mut cache = HolderCache::new();
    let mut whois_client = WhoisClient::new(
        &config.whois.host,
        config.whois.port,
        config.whois.timeout(),
    );

    let stdout = std::io::stdout().lock();
    let mut sink: Box<dyn ReportSink> = match format {
        ReportFormat::Csv => Box::new(CsvSink::new(stdout, use_whois)),
        ReportFormat::Json => Box::new(JsonLinesSink::new(stdout)),
    };

    let mut reconciler = Reconciler::new(&trie, &ripestat, &mut cache).with_policy(policy);
    if use_whois {
        reconciler = reconciler.with_registry(&mut whois_client);
    }

    let query = AnnouncementQuery { window, min_peers };
    let summary = reconciler
        .run(&ripestat, &covering, query, sink.as_mut())
        .await?;

    info!(
        "Done: {} observed, {} exact, {} covered, {} unexplained, {} reported ({} holder lookups)",
        format_count(summary.observed),
        format_count(summary.exact),
        format_count(summary.covered),
        format_count(summary.unexplained),
        format_count(summary.reported),
        summary.holder_lookups
    );

    Ok(())
}

/// Observation window from `--start`/`--end`, defaulting to the configured lookback
fn build_window(args: &ReconcileArgs, config: &Config) -> Result<TimeWindow> {
    let start = match &args.start {
        Some(s) => parse_time(s)?,
        None => TimeWindow::last_days(config.ripestat.lookback_days, Utc::now()).start,
    };
    let end = args.end.as_deref().map(parse_time).transpose()?;

    if let Some(end) = end {
        if end <= start {
            anyhow::bail!("Window end {} is not after start {}", end, start);
        }
    }

    Ok(TimeWindow { start, end })
}

fn covering_prefixes(args: &ReconcileArgs, config: &Config) -> Result<Vec<Ipv4Net>> {
    if args.covering.is_empty() {
        return config.ripestat.covering();
    }
    args.covering
        .iter()
        .map(|p| parse_block(p).with_context(|| format!("Invalid covering prefix '{}'", p)))
        .collect()
}
