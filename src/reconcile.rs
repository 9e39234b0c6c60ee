//! Reconciliation of observed announcements against registry allocations.
//!
//! Every observed prefix is classified as exactly one of:
//! - **exact**: the trie holds the identical block
//! - **covered**: a broader allocation contains it
//! - **unexplained**: nothing in the registry covers it
//!
//! Non-exact prefixes are enriched with the origin's holder name and,
//! when a [`RegistryLookup`] is attached, with whois fields.

use anyhow::Result;
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, info};

use crate::cache::HolderCache;
use crate::report::{MatchStatus, ReconciliationRecord, ReportSink};
use crate::sources::{AnnouncementQuery, AnnouncementSource, HolderLookup, ObservedPrefix, RegistryLookup};
use crate::trie::{Allocation, PrefixTrie};
use crate::utils::format_count;

/// Result of matching one prefix against the trie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification<'t> {
    Exact(&'t Allocation),
    Covered(&'t Allocation),
    Unexplained,
}

impl<'t> Classification<'t> {
    pub fn status(&self) -> MatchStatus {
        match self {
            Classification::Exact(_) => MatchStatus::Exact,
            Classification::Covered(_) => MatchStatus::Covered,
            Classification::Unexplained => MatchStatus::Unexplained,
        }
    }

    /// The matching or covering allocation
    pub fn allocation(&self) -> Option<&'t Allocation> {
        match *self {
            Classification::Exact(a) | Classification::Covered(a) => Some(a),
            Classification::Unexplained => None,
        }
    }
}

/// Classify `prefix`: exact match first, then longest covering allocation
pub fn classify<'t>(trie: &'t PrefixTrie, prefix: &Ipv4Net) -> Classification<'t> {
    if let Some(exact) = trie.search_exact(prefix) {
        return Classification::Exact(exact);
    }
    match trie.search_best(prefix) {
        Some(best) => Classification::Covered(best),
        None => Classification::Unexplained,
    }
}

/// Which classifications produce a report record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportPolicy {
    /// Report every observed prefix, exact matches included
    #[default]
    #[serde(rename = "all")]
    All,
    /// Report only covered and unexplained prefixes
    #[serde(rename = "anomalies", alias = "anomalies-only")]
    AnomaliesOnly,
}

impl FromStr for ReportPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ReportPolicy::All),
            "anomalies" | "anomalies-only" => Ok(ReportPolicy::AnomaliesOnly),
            _ => Err(format!("Unknown policy: {}. Use: all, anomalies", s)),
        }
    }
}

/// Counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub observed: usize,
    pub exact: usize,
    pub covered: usize,
    pub unexplained: usize,
    pub reported: usize,
    pub holder_lookups: usize,
}

/// Drives one reconciliation run
pub struct Reconciler<'a> {
    trie: &'a PrefixTrie,
    holders: &'a dyn HolderLookup,
    cache: &'a mut HolderCache,
    registry: Option<&'a mut dyn RegistryLookup>,
    policy: ReportPolicy,
    summary: ReconcileSummary,
}

impl<'a> Reconciler<'a> {
    /// The cache is owned by the caller and scoped to this run
    pub fn new(
        trie: &'a PrefixTrie,
        holders: &'a dyn HolderLookup,
        cache: &'a mut HolderCache,
    ) -> Self {
        Self {
            trie,
            holders,
            cache,
            registry: None,
            policy: ReportPolicy::default(),
            summary: ReconcileSummary::default(),
        }
    }

    pub fn with_policy(mut self, policy: ReportPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Enable whois enrichment for non-exact prefixes
    pub fn with_registry(mut self, registry: &'a mut dyn RegistryLookup) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn summary(&self) -> &ReconcileSummary {
        &self.summary
    }

    /// Classify one observed prefix and build its record.
    ///
    /// Returns `None` when the policy suppresses the prefix.
    pub async fn reconcile(
        &mut self,
        observed: &ObservedPrefix,
    ) -> Result<Option<ReconciliationRecord>> {
        let classification = classify(self.trie, &observed.prefix);
        self.summary.observed += 1;
        match classification.status() {
            MatchStatus::Exact => self.summary.exact += 1,
            MatchStatus::Covered => self.summary.covered += 1,
            MatchStatus::Unexplained => self.summary.unexplained += 1,
        }

        let exact = matches!(classification, Classification::Exact(_));
        if exact && self.policy == ReportPolicy::AnomaliesOnly {
            return Ok(None);
        }

        let misses_before = self.cache.misses();
        let holder = self
            .cache
            .resolve(observed.origin, self.holders)
            .await?
            .to_string();
        self.summary.holder_lookups += self.cache.misses() - misses_before;

        let whois = match self.registry.as_mut() {
            Some(registry) if !exact => registry.lookup(observed.prefix).await?,
            _ => None,
        };

        let allocation = classification.allocation();
        debug!(
            "AS{} {} -> {} {}",
            observed.origin,
            observed.prefix,
            classification.status().as_str(),
            allocation.map(|a| a.block.to_string()).unwrap_or_default()
        );

        Ok(Some(ReconciliationRecord {
            origin: observed.origin,
            holder,
            prefix: observed.prefix,
            status: classification.status(),
            matched_prefix: allocation.map(|a| a.block),
            matched_description: allocation.map(|a| a.meta.description.clone()),
            whois,
        }))
    }

    /// Reconcile every prefix announced inside each covering prefix.
    ///
    /// Any collaborator error aborts the run; records already emitted stay
    /// emitted.
    pub async fn run(
        &mut self,
        source: &dyn AnnouncementSource,
        covering: &[Ipv4Net],
        query: AnnouncementQuery,
        sink: &mut dyn ReportSink,
    ) -> Result<ReconcileSummary> {
        info!(
            "Reconciling {} covering prefixes against {} allocations",
            covering.len(),
            format_count(self.trie.len())
        );

        for covering_prefix in covering {
            let observed = source.announcements(*covering_prefix, query).await?;
            let reported_before = self.summary.reported;

            for prefix in &observed {
                if let Some(record) = self.reconcile(prefix).await? {
                    sink.emit(&record)?;
                    self.summary.reported += 1;
                }
            }

            info!(
                "{}: {} observed, {} reported",
                covering_prefix,
                format_count(observed.len()),
                format_count(self.summary.reported - reported_before)
            );
        }

        Ok(self.summary.clone())
    }
}
