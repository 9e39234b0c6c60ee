//! Common utility functions used across modules.
//!
//! - [`format_count`] - Format counts with K/M suffix (1.5K, 2.3M)
//! - [`parse_time`] - Parse RFC 3339 timestamps or plain dates

use anyhow::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

/// Format a count with K/M suffix for compact display.
///
/// # Examples
/// ```
/// use ampr_audit::utils::format_count;
/// assert_eq!(format_count(500), "500");
/// assert_eq!(format_count(1500), "1.5K");
/// assert_eq!(format_count(1_500_000), "1.5M");
/// ```
pub fn format_count(count: usize) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Parse a time given as RFC 3339 or as `YYYY-MM-DD` (midnight UTC).
///
/// # Examples
/// ```
/// use ampr_audit::utils::parse_time;
/// let t = parse_time("2021-01-01").unwrap();
/// assert_eq!(t.to_rfc3339(), "2021-01-01T00:00:00+00:00");
/// ```
pub fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    let trimmed = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").map_err(|_| {
        anyhow::anyhow!(
            "Invalid time '{}'. Use RFC 3339 (2021-01-01T00:00:00Z) or a date (2021-01-01)",
            trimmed
        )
    })?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| anyhow::anyhow!("Invalid time '{}'", trimmed))
}
