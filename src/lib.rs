//! # ampr-audit - AMPRNet Allocation Auditor
//!
//! Compares the prefixes of 44.0.0.0/8 that are actually announced in BGP
//! against the allocations published by the AMPRNet registry portal, and
//! reports every announcement as an exact match, covered by a broader
//! allocation, or unexplained.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        ampr-audit                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: crawl, reconcile, lookup, whois, config    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Crawler (reqwest + regex)                                  │
//! │    └── Portal pages -> PrefixTrie -> dated JSON snapshot    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Sources                                                    │
//! │    ├── RIPEstat routing history and AS overview (reqwest)   │
//! │    └── Registry whois over TCP (tokio)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Reconciler                                                 │
//! │    └── exact / covered / unexplained, holder cache          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Report sinks (CSV, JSON lines)                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use ampr_audit::cache::HolderCache;
//! use ampr_audit::reconcile::Reconciler;
//! use ampr_audit::report::CsvSink;
//! use ampr_audit::snapshot::Snapshot;
//! use ampr_audit::sources::{AnnouncementQuery, RipeStat, TimeWindow};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let trie = Snapshot::load("dumps/portal/20210101.json")?.build_trie()?;
//!
//!     let ripestat = RipeStat::new("https://stat.ripe.net/data", Duration::from_secs(30))?;
//!     let query = AnnouncementQuery {
//!         window: TimeWindow::last_days(7, chrono::Utc::now()),
//!         min_peers: 5,
//!     };
//!
//!     let covering: Vec<ipnet::Ipv4Net> = vec!["44.0.0.0/9".parse()?];
//!     let mut cache = HolderCache::new();
//!     let mut sink = CsvSink::new(std::io::stdout(), false);
//!     let summary = Reconciler::new(&trie, &ripestat, &mut cache)
//!         .run(&ripestat, &covering, query, &mut sink)
//!         .await?;
//!     eprintln!("{} unexplained", summary.unexplained);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`] - Per-run AS holder name cache
//! - [`cidr`] - IPv4 block parsing and bit helpers
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`crawler`] - Registry portal crawler
//! - [`error`] - Domain error type
//! - [`reconcile`] - Classification and the reconciliation run
//! - [`report`] - Report records and output sinks
//! - [`snapshot`] - Allocation snapshot persistence
//! - [`sources`] - RIPEstat and whois collaborators
//! - [`trie`] - Longest-prefix-match allocation trie
//! - [`utils`] - Common utility functions (formatting, time parsing)

pub mod cache;
pub mod cidr;
pub mod cli;
pub mod commands;
pub mod config;
pub mod crawler;
pub mod error;
pub mod reconcile;
pub mod report;
pub mod snapshot;
pub mod sources;
pub mod trie;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::AuditError;
pub use reconcile::{classify, Classification, Reconciler, ReportPolicy};
pub use trie::{Allocation, AllocationMeta, PrefixTrie};
