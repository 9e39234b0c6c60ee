//! External data sources consulted during reconciliation.
//!
//! Each collaborator sits behind a trait so the engine can be driven by
//! fakes in tests:
//! - [`AnnouncementSource`] yields observed prefixes (RIPEstat routing history)
//! - [`HolderLookup`] resolves an AS number to its holder name (RIPEstat AS overview)
//! - [`RegistryLookup`] queries the registry text protocol (whois)

mod ripestat;
mod whois;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ipnet::Ipv4Net;

#[cfg(test)]
use mockall::automock;

pub use ripestat::{parse_asn, routing_history_prefixes, RipeStat, RoutingHistory};
pub use whois::{parse_whois_response, WhoisClient, WhoisRecord};

/// Observation window for announcements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    /// Open-ended when `None`
    pub end: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// Window covering the `days` days before `now`
    pub fn last_days(days: u32, now: DateTime<Utc>) -> Self {
        Self {
            start: now - Duration::days(i64::from(days)),
            end: None,
        }
    }
}

/// Parameters for an announcement query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncementQuery {
    pub window: TimeWindow,
    /// Minimum number of RIS peers that must have seen a prefix
    pub min_peers: u32,
}

/// A prefix seen announced by an origin AS during a window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPrefix {
    pub origin: u32,
    pub prefix: Ipv4Net,
    pub window: TimeWindow,
}

/// Source of observed announcements
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    /// Prefixes announced inside `covering`, grouped by origin in source order
    async fn announcements(
        &self,
        covering: Ipv4Net,
        query: AnnouncementQuery,
    ) -> Result<Vec<ObservedPrefix>>;
}

/// Holder name lookup by AS number
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HolderLookup: Send + Sync {
    async fn holder(&self, asn: u32) -> Result<String>;
}

/// Registry text-protocol lookup for a prefix
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RegistryLookup: Send {
    /// `Ok(None)` when the registry has no allocation record for the prefix
    async fn lookup(&mut self, prefix: Ipv4Net) -> Result<Option<WhoisRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_last_days() {
        let now = Utc.with_ymd_and_hms(2021, 1, 8, 0, 0, 0).unwrap();
        let window = TimeWindow::last_days(7, now);
        assert_eq!(window.start, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());
        assert!(window.end.is_none());
    }
}
