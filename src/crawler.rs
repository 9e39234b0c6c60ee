//! Registry portal crawler.
//!
//! Walks the portal's network listing page by page, following the links in
//! each row's prefix cell to the subdivided allocations. Pages are visited
//! strictly one at a time from a FIFO work list; a visited set keeps every
//! URL to a single fetch.
//!
//! All knowledge of the portal markup lives in [`PageParser`].

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::{redirect, Client, Url};
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cidr::parse_block;
use crate::error::AuditError;
use crate::trie::{AllocationMeta, PrefixTrie};
use crate::utils::format_count;

/// One data row of the portal's allocation table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRow {
    pub prefix: String,
    pub description: String,
    /// Raw `href` values found in the prefix cell
    pub links: Vec<String>,
}

/// Extracts allocation rows from portal HTML
pub struct PageParser {
    table: Regex,
    row: Regex,
    cell: Regex,
    link: Regex,
    tag: Regex,
}

impl PageParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            table: Regex::new(r"(?is)<table\b[^>]*>(.*?)</table>")?,
            row: Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>")?,
            cell: Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>")?,
            link: Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["']"#)?,
            tag: Regex::new(r"(?s)<[^>]*>")?,
        })
    }

    /// Parse the first table on the page.
    ///
    /// A page without a table, or a data row with fewer than two cells, is
    /// a structural break in the portal and fails the parse.
    pub fn parse(&self, html: &str) -> Result<Vec<PortalRow>, AuditError> {
        let table = self
            .table
            .captures(html)
            .and_then(|c| c.get(1))
            .ok_or_else(|| AuditError::Page("no allocation table found".to_string()))?;

        let mut rows = Vec::new();
        for row in self.row.captures_iter(table.as_str()) {
            let row_html = row.get(1).map_or("", |m| m.as_str());
            let cells: Vec<&str> = self
                .cell
                .captures_iter(row_html)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect();

            if cells.is_empty() {
                // Header row
                continue;
            }
            if cells.len() < 2 {
                return Err(AuditError::Page(format!(
                    "row with {} cell(s), expected prefix and description",
                    cells.len()
                )));
            }

            let prefix: String = self
                .text(cells[0])
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            let description = self.text(cells[1]).trim().to_string();
            let links = self
                .link
                .captures_iter(cells[0])
                .filter_map(|c| c.get(1).map(|m| decode_entities(m.as_str())))
                .collect();

            rows.push(PortalRow {
                prefix,
                description,
                links,
            });
        }

        Ok(rows)
    }

    fn text(&self, cell: &str) -> String {
        decode_entities(&self.tag.replace_all(cell, ""))
    }
}

/// Decode named and numeric HTML entities; non-breaking spaces become spaces
fn decode_entities(s: &str) -> String {
    html_escape::decode_html_entities(s).replace('\u{a0}', " ")
}

/// Sequential crawler building a trie from the portal
pub struct PortalCrawler {
    client: Client,
    parser: PageParser,
    queue: VecDeque<Url>,
    visited: HashSet<Url>,
    trie: PrefixTrie,
}

impl PortalCrawler {
    pub fn new(start_url: &str, timeout: Duration) -> Result<Self> {
        let start = Url::parse(start_url)
            .with_context(|| format!("Invalid portal URL: {}", start_url))?;
        let client = Client::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none())
            .user_agent(format!("ampr-audit/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            parser: PageParser::new()?,
            queue: VecDeque::from([start]),
            visited: HashSet::new(),
            trie: PrefixTrie::new(),
        })
    }

    /// Crawl until the work list is empty and return the populated trie
    pub async fn crawl(mut self) -> Result<PrefixTrie> {
        while let Some(url) = self.queue.pop_front() {
            if !self.visited.insert(url.clone()) {
                continue;
            }
            self.scrape_page(&url).await?;
        }

        info!(
            "Crawled {} pages - {} allocations",
            format_count(self.visited.len()),
            format_count(self.trie.len())
        );
        Ok(self.trie)
    }

    async fn scrape_page(&mut self, url: &Url) -> Result<()> {
        info!("{}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        if status.is_redirection() {
            warn!("{} - {}", status.as_u16(), url);
            return Ok(());
        }

        let html = response
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?
            .text()
            .await
            .context("Failed to read response body")?;

        let rows = self
            .parser
            .parse(&html)
            .with_context(|| format!("Failed to parse {}", url))?;
        debug!("{} rows on {}", rows.len(), url);

        for row in rows {
            let block = parse_block(&row.prefix)
                .with_context(|| format!("Bad prefix on {}", url))?;

            let mut has_children = false;
            for href in &row.links {
                let link = url
                    .join(href)
                    .with_context(|| format!("Bad link '{}' on {}", href, url))?;
                self.queue.push_back(link);
                has_children = true;
            }

            self.trie
                .insert(block, AllocationMeta::assignment(row.description, has_children));
        }

        Ok(())
    }
}
