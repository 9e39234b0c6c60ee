//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ampr-audit")]
#[command(
    author,
    version,
    about = "Audit BGP announcements of 44/8 against the AMPRNet allocation registry"
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (defaults are used when it does not exist)
    #[arg(short, long, default_value = "ampr-audit.yaml", global = true)]
    pub config: PathBuf,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug output)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl the registry portal and write a dated allocation snapshot
    Crawl {
        /// Snapshot directory (overrides config snapshot_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Reconcile announced prefixes against an allocation snapshot
    Reconcile {
        /// Snapshot file (default: newest snapshot in snapshot_dir)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Window start, RFC 3339 or YYYY-MM-DD (default: now - lookback_days)
        #[arg(long)]
        start: Option<String>,

        /// Window end, RFC 3339 or YYYY-MM-DD (default: open-ended)
        #[arg(long)]
        end: Option<String>,

        /// Minimum RIS peers seeing a prefix (overrides config)
        #[arg(long)]
        min_peers: Option<u32>,

        /// Covering prefix to query; repeatable (overrides config)
        #[arg(long = "covering")]
        covering: Vec<String>,

        /// Add registry whois columns for non-exact prefixes
        #[arg(long)]
        whois: bool,

        /// Which prefixes to report: all, anomalies
        #[arg(long)]
        policy: Option<String>,

        /// Output format: csv, json
        #[arg(short, long)]
        format: Option<String>,
    },

    /// Classify a single prefix against a snapshot
    Lookup {
        /// Prefix or address to look up (e.g., 44.1.2.0/24)
        prefix: String,

        /// Snapshot file (default: newest snapshot in snapshot_dir)
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Query the registry whois for a prefix
    Whois {
        /// Prefix or address to query
        prefix: String,
    },

    /// Print the default configuration file
    Config,

    /// Show version
    Version,
}
