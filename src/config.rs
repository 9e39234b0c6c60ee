//! Configuration management for ampr-audit.

use anyhow::{Context, Result};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cidr::parse_block;
use crate::reconcile::ReportPolicy;
use crate::report::ReportFormat;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding `YYYYMMDD.json` allocation snapshots
    pub snapshot_dir: PathBuf,

    /// Timeout for every HTTP request
    pub http_timeout_secs: u64,

    /// Registry portal crawl settings
    pub portal: PortalConfig,

    /// RIPEstat queries
    pub ripestat: RipeStatConfig,

    /// Registry whois enrichment
    pub whois: WhoisConfig,

    /// Report output
    pub report: ReportConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from("dumps/portal"),
            http_timeout_secs: 30,
            portal: PortalConfig::default(),
            ripestat: RipeStatConfig::default(),
            whois: WhoisConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_secs == 0 {
            anyhow::bail!("http_timeout_secs must be greater than 0");
        }

        if !self.portal.start_url.starts_with("https://") {
            anyhow::bail!("Portal URL must use HTTPS: {}", self.portal.start_url);
        }

        if !self.ripestat.base_url.starts_with("https://") {
            anyhow::bail!("RIPEstat URL must use HTTPS: {}", self.ripestat.base_url);
        }

        if self.ripestat.covering_prefixes.is_empty() {
            anyhow::bail!("At least one covering prefix is required");
        }
        self.ripestat.covering()?;

        if self.ripestat.min_peers == 0 {
            anyhow::bail!("min_peers must be greater than 0");
        }

        if self.ripestat.lookback_days == 0 {
            anyhow::bail!("lookback_days must be greater than 0");
        }

        if self.whois.host.trim().is_empty() {
            anyhow::bail!("Whois host must not be empty");
        }

        if self.whois.timeout_secs == 0 {
            anyhow::bail!("Whois timeout_secs must be greater than 0");
        }

        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Generate default config with comments
    pub fn generate_default_yaml() -> String {
        include_str!("../templates/config.yaml").to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// First page of the network listing
    pub start_url: String,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            start_url: "https://portal.ampr.org/networks.php".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RipeStatConfig {
    pub base_url: String,
    /// Super-prefixes queried for announcements
    pub covering_prefixes: Vec<String>,
    /// Minimum number of RIS peers seeing a prefix
    pub min_peers: u32,
    /// Default observation window, in days before now
    pub lookback_days: u32,
}

impl Default for RipeStatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://stat.ripe.net/data".to_string(),
            covering_prefixes: vec!["44.0.0.0/9".to_string(), "44.128.0.0/10".to_string()],
            min_peers: 5,
            lookback_days: 7,
        }
    }
}

impl RipeStatConfig {
    /// Parsed covering prefixes
    pub fn covering(&self) -> Result<Vec<Ipv4Net>> {
        self.covering_prefixes
            .iter()
            .map(|p| {
                parse_block(p).with_context(|| format!("Invalid covering prefix '{}'", p))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhoisConfig {
    /// Query the registry whois for every non-exact prefix
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for WhoisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "whois.ampr.org".to_string(),
            port: 43,
            timeout_secs: 10,
        }
    }
}

impl WhoisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub policy: ReportPolicy,
    pub format: ReportFormat,
}
