//! RIPEstat client: routing history and AS overview.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ipnet::Ipv4Net;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use super::{AnnouncementQuery, AnnouncementSource, HolderLookup, ObservedPrefix, TimeWindow};
use crate::cidr::parse_block;
use crate::error::AuditError;
use crate::utils::format_count;

/// Maximum accepted response body (20 MB)
/// Routing history for a /9 over a week is a few MB
const MAX_RESPONSE_SIZE: usize = 20 * 1024 * 1024;

/// Time format expected by the `starttime`/`endtime` parameters
const RIPESTAT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

/// `data` section of the routing-history endpoint
#[derive(Debug, Deserialize)]
pub struct RoutingHistory {
    #[serde(default)]
    pub by_origin: Vec<OriginPrefixes>,
}

#[derive(Debug, Deserialize)]
pub struct OriginPrefixes {
    pub origin: OriginField,
    #[serde(default)]
    pub prefixes: Vec<PrefixTimeline>,
}

/// RIPEstat reports origins as strings, occasionally as numbers
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OriginField {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct PrefixTimeline {
    pub prefix: String,
}

#[derive(Deserialize)]
struct AsOverview {
    #[serde(default)]
    holder: Option<String>,
}

/// Parse an AS number written as `1234` or `AS1234`
pub fn parse_asn(s: &str) -> Result<u32, AuditError> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("AS")
        .or_else(|| trimmed.strip_prefix("as"))
        .unwrap_or(trimmed);
    digits
        .parse::<u32>()
        .map_err(|_| AuditError::InvalidAsn(trimmed.to_string()))
}

/// Flatten a routing-history payload into observed prefixes.
///
/// Non-IPv4 prefixes are dropped. Malformed prefixes or origins fail the
/// whole payload.
pub fn routing_history_prefixes(
    history: RoutingHistory,
    window: TimeWindow,
) -> Result<Vec<ObservedPrefix>, AuditError> {
    let mut observed = Vec::new();
    let mut skipped = 0usize;

    for by_origin in history.by_origin {
        let origin = match by_origin.origin {
            OriginField::Number(n) => {
                u32::try_from(n).map_err(|_| AuditError::InvalidAsn(n.to_string()))?
            }
            OriginField::Text(ref s) => parse_asn(s)?,
        };

        for timeline in by_origin.prefixes {
            match parse_block(&timeline.prefix) {
                Ok(prefix) => observed.push(ObservedPrefix {
                    origin,
                    prefix,
                    window,
                }),
                Err(AuditError::NotIpv4(_)) => skipped += 1,
                Err(e) => return Err(e),
            }
        }
    }

    if skipped > 0 {
        debug!("Skipped {} non-IPv4 prefixes", skipped);
    }

    Ok(observed)
}

/// HTTP client for the RIPEstat data API
pub struct RipeStat {
    client: Client,
    base_url: String,
}

impl RipeStat {
    /// Create a client for `base_url` (e.g. `https://stat.ripe.net/data`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("ampr-audit/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET a data endpoint and decode its `data` section.
    /// Non-2xx statuses are errors; nothing is retried.
    async fn get_data<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}/{}/data.json", self.base_url, endpoint);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?;

        if let Some(content_length) = response.content_length() {
            if content_length as usize > MAX_RESPONSE_SIZE {
                anyhow::bail!(
                    "Response too large: {} bytes (max: {} bytes)",
                    content_length,
                    MAX_RESPONSE_SIZE
                );
            }
        }

        let body = response
            .text()
            .await
            .context("Failed to read response body")?;
        if body.len() > MAX_RESPONSE_SIZE {
            anyhow::bail!(
                "Downloaded content too large: {} bytes (max: {} bytes)",
                body.len(),
                MAX_RESPONSE_SIZE
            );
        }

        let envelope: Envelope<T> = serde_json::from_str(&body)
            .with_context(|| format!("Unexpected payload from {}", url))?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl AnnouncementSource for RipeStat {
    async fn announcements(
        &self,
        covering: Ipv4Net,
        query: AnnouncementQuery,
    ) -> Result<Vec<ObservedPrefix>> {
        info!("Fetching routing history for {}...", covering);

        let mut params = vec![
            ("resource", covering.to_string()),
            ("min_peers", query.min_peers.to_string()),
            (
                "starttime",
                query.window.start.format(RIPESTAT_TIME_FORMAT).to_string(),
            ),
        ];
        if let Some(end) = query.window.end {
            params.push(("endtime", end.format(RIPESTAT_TIME_FORMAT).to_string()));
        }

        let history: RoutingHistory = self.get_data("routing-history", &params).await?;
        let observed = routing_history_prefixes(history, query.window)
            .with_context(|| format!("Malformed routing history for {}", covering))?;

        info!(
            "Fetched {} - {} announced prefixes",
            covering,
            format_count(observed.len())
        );
        Ok(observed)
    }
}

#[async_trait]
impl HolderLookup for RipeStat {
    async fn holder(&self, asn: u32) -> Result<String> {
        let overview: AsOverview = self
            .get_data("as-overview", &[("resource", format!("AS{}", asn))])
            .await
            .with_context(|| format!("Failed to look up holder of AS{}", asn))?;
        Ok(overview.holder.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const ROUTING_HISTORY: &str = r#"{
        "status": "ok",
        "data": {
            "resource": "44.0.0.0/9",
            "by_origin": [
                {
                    "origin": "1234",
                    "prefixes": [
                        {"prefix": "44.0.1.0/24", "timelines": [{"starttime": "2021-01-01T00:00:00", "endtime": "2021-01-08T00:00:00", "full_peers_seeing": 300}]},
                        {"prefix": "44.0.2.0/24", "timelines": []}
                    ]
                },
                {
                    "origin": "AS5678",
                    "prefixes": [
                        {"prefix": "44.64.0.0/10", "timelines": []}
                    ]
                }
            ]
        }
    }"#;

    fn window() -> TimeWindow {
        TimeWindow {
            start: Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(),
            end: None,
        }
    }

    fn parse(json: &str) -> RoutingHistory {
        serde_json::from_str::<Envelope<RoutingHistory>>(json)
            .unwrap()
            .data
    }

    #[test]
    fn test_parse_asn() {
        assert_eq!(parse_asn("1234").unwrap(), 1234);
        assert_eq!(parse_asn("AS1234").unwrap(), 1234);
        assert_eq!(parse_asn(" as7 ").unwrap(), 7);
        assert!(parse_asn("ASX").is_err());
        assert!(parse_asn("").is_err());
        assert!(parse_asn("4294967296").is_err());
    }

    #[test]
    fn test_routing_history_prefixes() {
        let observed = routing_history_prefixes(parse(ROUTING_HISTORY), window()).unwrap();
        assert_eq!(observed.len(), 3);
        assert_eq!(observed[0].origin, 1234);
        assert_eq!(observed[0].prefix, "44.0.1.0/24".parse::<Ipv4Net>().unwrap());
        assert_eq!(observed[2].origin, 5678);
        assert_eq!(observed[2].window, window());
    }

    #[test]
    fn test_numeric_origin() {
        let json = r#"{"data": {"by_origin": [{"origin": 42, "prefixes": [{"prefix": "44.1.0.0/16"}]}]}}"#;
        let observed = routing_history_prefixes(parse(json), window()).unwrap();
        assert_eq!(observed[0].origin, 42);
    }

    #[test]
    fn test_ipv6_prefixes_skipped() {
        let json = r#"{"data": {"by_origin": [{"origin": "42", "prefixes": [
            {"prefix": "2001:db8::/32"},
            {"prefix": "44.1.0.0/16"}
        ]}]}}"#;
        let observed = routing_history_prefixes(parse(json), window()).unwrap();
        assert_eq!(observed.len(), 1);
    }

    #[test]
    fn test_malformed_prefix_is_fatal() {
        let json = r#"{"data": {"by_origin": [{"origin": "42", "prefixes": [{"prefix": "44.1.0.0/40"}]}]}}"#;
        let err = routing_history_prefixes(parse(json), window()).unwrap_err();
        assert!(matches!(err, AuditError::InvalidPrefix(_)));
    }

    #[test]
    fn test_malformed_origin_is_fatal() {
        let json = r#"{"data": {"by_origin": [{"origin": "nope", "prefixes": []}]}}"#;
        let err = routing_history_prefixes(parse(json), window()).unwrap_err();
        assert!(matches!(err, AuditError::InvalidAsn(_)));
    }

    #[test]
    fn test_empty_history() {
        let json = r#"{"data": {}}"#;
        let observed = routing_history_prefixes(parse(json), window()).unwrap();
        assert!(observed.is_empty());
    }

    #[test]
    fn test_as_overview_payload() {
        let json = r#"{"data": {"holder": "AMPR-ORG - Amateur Radio Digital Communications", "announced": true}}"#;
        let overview: Envelope<AsOverview> = serde_json::from_str(json).unwrap();
        assert_eq!(
            overview.data.holder.as_deref(),
            Some("AMPR-ORG - Amateur Radio Digital Communications")
        );

        let json = r#"{"data": {"holder": null}}"#;
        let overview: Envelope<AsOverview> = serde_json::from_str(json).unwrap();
        assert!(overview.data.holder.is_none());
    }

    #[test]
    fn test_ripestat_new_trims_base() {
        let client = RipeStat::new("https://stat.ripe.net/data/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "https://stat.ripe.net/data");
    }
}
