//! Registry whois client over a persistent TCP connection.
//!
//! A request is the bare network address followed by CRLF. The response is
//! free text with `Label: value` lines, optionally preceded by a `%`
//! comment banner. It ends at the first blank line after a field line, or
//! when the server closes the connection.

use anyhow::{Context, Result};
use async_trait::async_trait;
use ipnet::Ipv4Net;
use serde::Serialize;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use super::RegistryLookup;
use crate::error::AuditError;

/// Allocation fields reported by the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WhoisRecord {
    pub allocated: bool,
    pub network: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub bgp: Option<bool>,
    pub description: Option<String>,
}

/// Parse a whois response.
///
/// Each field comes from the first line starting with its label. Returns
/// `None` when there is no `Allocated:` line.
pub fn parse_whois_response(text: &str) -> Option<WhoisRecord> {
    let allocated = field(text, "Allocated:")?;
    Some(WhoisRecord {
        allocated: parse_flag(allocated),
        network: field(text, "Network:").map(str::to_string),
        kind: field(text, "Type:").map(str::to_string),
        bgp: field(text, "BGP:").map(parse_flag),
        description: field(text, "Description:").map(str::to_string),
    })
}

fn field<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.strip_prefix(label))
        .map(str::trim)
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "1"
    )
}

/// Whois client that reuses one connection across queries
pub struct WhoisClient {
    host: String,
    port: u16,
    timeout: Duration,
    stream: Option<BufReader<TcpStream>>,
}

impl WhoisClient {
    pub fn new(host: &str, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.to_string(),
            port,
            timeout,
            stream: None,
        }
    }

    /// Whether a connection is currently held open
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    async fn connect(&self) -> Result<BufReader<TcpStream>> {
        debug!("Connecting to whois {}:{}", self.host, self.port);
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        let stream = tokio::time::timeout(self.timeout, connect)
            .await
            .map_err(|_| anyhow::anyhow!("Connection to {}:{} timed out", self.host, self.port))?
            .with_context(|| format!("Failed to connect to {}:{}", self.host, self.port))?;
        Ok(BufReader::new(stream))
    }

    /// Send one query and return the raw response text.
    ///
    /// A held connection the server has since closed is replaced by a fresh
    /// one before giving up.
    pub async fn query(&mut self, query: &str) -> Result<String> {
        if let Some(mut stream) = self.stream.take() {
            match self.exchange_with_timeout(&mut stream, query).await {
                Ok((response, open)) if open || !response.is_empty() => {
                    if open {
                        self.stream = Some(stream);
                    }
                    return Ok(response);
                }
                Ok(_) => debug!("Whois connection closed by server, reconnecting"),
                Err(e) => debug!("Whois connection unusable ({}), reconnecting", e),
            }
        }

        let mut stream = self.connect().await?;
        let (response, open) = self.exchange_with_timeout(&mut stream, query).await?;
        if open {
            self.stream = Some(stream);
        }
        Ok(response)
    }

    async fn exchange_with_timeout(
        &self,
        stream: &mut BufReader<TcpStream>,
        query: &str,
    ) -> Result<(String, bool)> {
        tokio::time::timeout(self.timeout, exchange(stream, query))
            .await
            .map_err(|_| anyhow::anyhow!("Whois query for {} timed out", query))?
    }
}

/// Time to wait for fields after a blank line that closed a comment-only block
const BANNER_GRACE: Duration = Duration::from_millis(500);

/// Write a query and read one response. The flag is false when the server
/// closed the connection.
///
/// Leading `%`/`#` comment lines and the blank lines between them belong to
/// the response; it ends at the first blank line after a field line.
async fn exchange(stream: &mut BufReader<TcpStream>, query: &str) -> Result<(String, bool)> {
    drain(stream)?;

    let inner = stream.get_mut();
    inner.write_all(format!("{}\r\n", query).as_bytes()).await?;
    inner.flush().await?;

    let mut response = String::new();
    let mut seen_fields = false;
    let mut line = String::new();
    loop {
        line.clear();
        let read = stream
            .read_line(&mut line)
            .await
            .map_err(|e| AuditError::Whois(format!("unreadable response: {}", e)))?;
        if read == 0 {
            return Ok((response, false));
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.trim().is_empty() {
            if seen_fields {
                return Ok((response, true));
            }
            if !response.is_empty() && !more_within(stream, BANNER_GRACE).await? {
                // Comment-only reply, e.g. "% no entries found"
                return Ok((response, true));
            }
            continue;
        }
        if !is_comment(trimmed) {
            seen_fields = true;
        }
        response.push_str(trimmed);
        response.push('\n');
    }
}

fn is_comment(line: &str) -> bool {
    matches!(line.trim_start().chars().next(), Some('%') | Some('#'))
}

/// Whether more bytes arrive within `grace`. EOF counts as no more.
async fn more_within(stream: &mut BufReader<TcpStream>, grace: Duration) -> Result<bool> {
    match tokio::time::timeout(grace, stream.fill_buf()).await {
        Err(_) => Ok(false),
        Ok(Ok(buf)) => Ok(!buf.is_empty()),
        Ok(Err(e)) => Err(AuditError::Whois(format!("unreadable response: {}", e)).into()),
    }
}

/// Drop leftovers of a previous response, both buffered and still queued
/// on the socket
fn drain(stream: &mut BufReader<TcpStream>) -> Result<()> {
    let mut stale = stream.buffer().len();
    stream.consume(stale);

    let mut scratch = [0u8; 4096];
    loop {
        match stream.get_ref().try_read(&mut scratch) {
            Ok(0) => {
                return Err(AuditError::Whois("connection closed by server".to_string()).into())
            }
            Ok(n) => stale += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e.into()),
        }
    }

    if stale > 0 {
        debug!("Discarded {} stale whois bytes", stale);
    }
    Ok(())
}

#[async_trait]
impl RegistryLookup for WhoisClient {
    async fn lookup(&mut self, prefix: Ipv4Net) -> Result<Option<WhoisRecord>> {
        let query = prefix.network().to_string();
        let response = self.query(&query).await?;
        if response.trim().is_empty() {
            return Err(AuditError::Whois(format!("empty response for {}", query)).into());
        }
        Ok(parse_whois_response(&response))
    }
}
