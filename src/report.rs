//! Report output: one record per reconciled announcement.

use anyhow::{Context, Result};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

use crate::sources::WhoisRecord;

/// How an observed prefix relates to the allocation registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Identical to a registry allocation
    Exact,
    /// Inside a broader registry allocation
    Covered,
    /// No registry allocation covers it
    Unexplained,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Exact => "exact",
            MatchStatus::Covered => "covered",
            MatchStatus::Unexplained => "unexplained",
        }
    }
}

/// Output record for one observed prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationRecord {
    pub origin: u32,
    pub holder: String,
    pub prefix: Ipv4Net,
    pub status: MatchStatus,
    /// Exact or covering allocation, absent when unexplained
    pub matched_prefix: Option<Ipv4Net>,
    pub matched_description: Option<String>,
    pub whois: Option<WhoisRecord>,
}

/// Destination for reconciliation records
pub trait ReportSink {
    fn emit(&mut self, record: &ReconciliationRecord) -> Result<()>;
}

impl ReportSink for Vec<ReconciliationRecord> {
    fn emit(&mut self, record: &ReconciliationRecord) -> Result<()> {
        self.push(record.clone());
        Ok(())
    }
}

/// Report output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" | "jsonl" => Ok(ReportFormat::Json),
            _ => Err(format!("Unknown format: {}. Use: csv, json", s)),
        }
    }
}

/// Comma-separated lines, flushed after every record
pub struct CsvSink<W: Write> {
    writer: W,
    with_whois: bool,
}

impl<W: Write> CsvSink<W> {
    /// `with_whois` adds the five whois columns to every line
    pub fn new(writer: W, with_whois: bool) -> Self {
        Self { writer, with_whois }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for CsvSink<W> {
    fn emit(&mut self, record: &ReconciliationRecord) -> Result<()> {
        let mut fields = vec![
            record.origin.to_string(),
            record.holder.clone(),
            record.prefix.to_string(),
            record
                .matched_prefix
                .map(|p| p.to_string())
                .unwrap_or_default(),
            record.matched_description.clone().unwrap_or_default(),
        ];

        if self.with_whois {
            match &record.whois {
                Some(whois) => {
                    fields.push(yes_no(whois.allocated).to_string());
                    fields.push(whois.network.clone().unwrap_or_default());
                    fields.push(whois.kind.clone().unwrap_or_default());
                    fields.push(whois.bgp.map(yes_no).unwrap_or_default().to_string());
                    fields.push(whois.description.clone().unwrap_or_default());
                }
                None => fields.extend(std::iter::repeat(String::new()).take(5)),
            }
        }

        let line = fields
            .iter()
            .map(|f| csv_field(f))
            .collect::<Vec<_>>()
            .join(",");
        writeln!(self.writer, "{}", line).context("Failed to write report line")?;
        self.writer.flush().context("Failed to flush report")?;
        Ok(())
    }
}

/// One JSON object per line
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ReportSink for JsonLinesSink<W> {
    fn emit(&mut self, record: &ReconciliationRecord) -> Result<()> {
        let line = serde_json::to_string(record).context("Failed to serialize record")?;
        writeln!(self.writer, "{}", line).context("Failed to write report line")?;
        self.writer.flush().context("Failed to flush report")?;
        Ok(())
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

/// Quote a field when it would break the line structure
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
