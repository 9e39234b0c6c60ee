//! Allocation snapshots: the persisted dump of the registry portal.
//!
//! A snapshot is written once per crawl to `<dir>/YYYYMMDD.json` and read
//! once at the start of a reconciliation run to build the [`PrefixTrie`].

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate};
use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use crate::cidr::parse_block;
use crate::error::AuditError;
use crate::trie::{AllocationMeta, PrefixTrie};

/// A timestamped dump of registry allocations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Snapshot {
    pub timestamp: String,
    pub prefixes: Vec<SnapshotEntry>,
}

/// One allocation record inside a snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub masklen: Option<u8>,
    pub data: AllocationMeta,
}

impl SnapshotEntry {
    /// Parse the entry's block, checking `network`/`masklen` agree with it
    pub fn block(&self) -> Result<Ipv4Net, AuditError> {
        let block = parse_block(&self.prefix)?;

        if let Some(masklen) = self.masklen {
            if masklen != block.prefix_len() {
                return Err(AuditError::Snapshot(format!(
                    "{}: masklen {} does not match prefix",
                    self.prefix, masklen
                )));
            }
        }

        if let Some(ref network) = self.network {
            let addr: Ipv4Addr = network.trim().parse().map_err(|_| {
                AuditError::Snapshot(format!("{}: invalid network '{}'", self.prefix, network))
            })?;
            if addr != block.network() {
                return Err(AuditError::Snapshot(format!(
                    "{}: network {} does not match prefix",
                    self.prefix, addr
                )));
            }
        }

        Ok(block)
    }
}

impl Snapshot {
    /// Load a snapshot from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot: {:?}", path))?;
        let snapshot: Snapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse snapshot: {:?}", path))?;
        Ok(snapshot)
    }

    /// Save the snapshot atomically (temp file + rename)
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let path = path.as_ref();
        let parent_dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent_dir)
            .with_context(|| format!("Failed to create snapshot directory: {:?}", parent_dir))?;

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize snapshot")?;

        let mut temp_file = NamedTempFile::new_in(parent_dir)
            .context("Failed to create temporary file for snapshot")?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.as_file().sync_all()?;
        temp_file
            .persist(path)
            .with_context(|| format!("Failed to persist snapshot: {:?}", path))?;

        Ok(())
    }

    /// Dump every allocation of a trie
    pub fn from_trie(trie: &PrefixTrie, timestamp: impl Into<String>) -> Self {
        let prefixes = trie
            .iter()
            .map(|allocation| SnapshotEntry {
                prefix: allocation.block.to_string(),
                network: Some(allocation.block.network().to_string()),
                masklen: Some(allocation.block.prefix_len()),
                data: allocation.meta.clone(),
            })
            .collect();

        Self {
            timestamp: timestamp.into(),
            prefixes,
        }
    }

    /// Build a trie with one node per entry.
    ///
    /// Any malformed entry fails the whole load.
    pub fn build_trie(&self) -> Result<PrefixTrie, AuditError> {
        let mut trie = PrefixTrie::new();
        for (index, entry) in self.prefixes.iter().enumerate() {
            let block = entry.block().map_err(|e| {
                AuditError::Snapshot(format!("entry {} ({}): {}", index, entry.prefix, e))
            })?;
            trie.insert(block, entry.data.clone());
        }
        Ok(trie)
    }
}

/// Timestamp string stored in a snapshot
pub fn snapshot_timestamp(now: DateTime<Local>) -> String {
    now.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// Path of the snapshot for a given day
pub fn snapshot_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}.json", date.format("%Y%m%d")))
}

/// Find the newest `YYYYMMDD.json` snapshot in `dir`
pub fn latest_snapshot(dir: &Path) -> Result<PathBuf> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read snapshot directory: {:?}", dir))?;

    let mut latest: Option<(String, PathBuf)> = None;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let stem = match path.file_stem().and_then(|s| s.to_str()) {
            Some(s) if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) => s.to_string(),
            _ => continue,
        };
        if latest.as_ref().map_or(true, |(best, _)| stem > *best) {
            latest = Some((stem, path));
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| anyhow::anyhow!("No snapshot found in {:?}", dir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "timestamp": "2021-01-31 06:00:01.123456",
        "prefixes": [
            {
                "prefix": "44.0.0.0/10",
                "network": "44.0.0.0",
                "masklen": 10,
                "data": {"type": "assignment", "description": "Block A", "children": true}
            },
            {
                "prefix": "44.1.2.0/24",
                "network": "44.1.2.0",
                "masklen": 24,
                "data": {"type": "assignment", "description": "X", "children": false}
            }
        ]
    }"#;

    fn net(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_and_build() {
        let snapshot: Snapshot = serde_json::from_str(SAMPLE).unwrap();
        assert_eq!(snapshot.prefixes.len(), 2);

        let trie = snapshot.build_trie().unwrap();
        assert_eq!(trie.len(), 2);
        let found = trie.search_exact(&net("44.1.2.0/24")).unwrap();
        assert_eq!(found.meta.description, "X");
        assert!(trie.search_exact(&net("44.0.0.0/10")).unwrap().meta.has_children);
    }

    #[test]
    fn test_entry_without_network_fields() {
        let json = r#"{"timestamp": "t", "prefixes": [
            {"prefix": "44.8.0.0/16", "data": {"description": "bare"}}
        ]}"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let trie = snapshot.build_trie().unwrap();
        assert!(trie.contains(&net("44.8.0.0/16")));
    }

    #[test]
    fn test_malformed_prefix_fails_whole_load() {
        let json = r#"{"timestamp": "t", "prefixes": [
            {"prefix": "44.8.0.0/16", "data": {"description": "ok"}},
            {"prefix": "44.8.0.0/99", "data": {"description": "bad"}}
        ]}"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        let err = snapshot.build_trie().unwrap_err();
        assert!(err.to_string().contains("entry 1"));
    }

    #[test]
    fn test_mismatched_masklen_rejected() {
        let entry = SnapshotEntry {
            prefix: "44.8.0.0/16".to_string(),
            network: Some("44.8.0.0".to_string()),
            masklen: Some(24),
            data: AllocationMeta::default(),
        };
        assert!(matches!(entry.block(), Err(AuditError::Snapshot(_))));
    }

    #[test]
    fn test_mismatched_network_rejected() {
        let entry = SnapshotEntry {
            prefix: "44.8.0.0/16".to_string(),
            network: Some("44.9.0.0".to_string()),
            masklen: Some(16),
            data: AllocationMeta::default(),
        };
        assert!(matches!(entry.block(), Err(AuditError::Snapshot(_))));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let json = r#"{"timestamp": "t", "prefixes": [
            {"prefix": "44.8.0.0/16", "data": {"type": "reservation", "description": "x"}}
        ]}"#;
        assert!(serde_json::from_str::<Snapshot>(json).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dumps").join("20210131.json");

        let original: Snapshot = serde_json::from_str(SAMPLE).unwrap();
        let trie = original.build_trie().unwrap();
        let dumped = Snapshot::from_trie(&trie, original.timestamp.clone());
        dumped.save(&path).unwrap();

        let reloaded = Snapshot::load(&path).unwrap();
        assert_eq!(reloaded, dumped);
        assert_eq!(reloaded.prefixes[0].network.as_deref(), Some("44.0.0.0"));
        assert_eq!(reloaded.prefixes[0].masklen, Some(10));

        let rebuilt = reloaded.build_trie().unwrap();
        for allocation in &trie {
            assert_eq!(rebuilt.search_exact(&allocation.block), Some(allocation));
            assert_eq!(
                rebuilt.search_best(&allocation.block).map(|a| a.block),
                trie.search_best(&allocation.block).map(|a| a.block)
            );
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(Snapshot::load(dir.path().join("nope.json")).is_err());
    }

    #[test]
    fn test_snapshot_path() {
        let date = NaiveDate::from_ymd_opt(2021, 1, 31).unwrap();
        let path = snapshot_path(Path::new("dumps/portal"), date);
        assert_eq!(path, PathBuf::from("dumps/portal/20210131.json"));
    }

    #[test]
    fn test_latest_snapshot() {
        let dir = TempDir::new().unwrap();
        for name in ["20210101.json", "20210131.json", "20201231.json", "notes.json", "20991231.txt"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        let latest = latest_snapshot(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "20210131.json");
    }

    #[test]
    fn test_latest_snapshot_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(latest_snapshot(dir.path()).is_err());
    }

    #[test]
    fn test_snapshot_timestamp_format() {
        let ts = snapshot_timestamp(Local::now());
        // "YYYY-MM-DD HH:MM:SS.ffffff"
        assert_eq!(ts.len(), 26);
        assert_eq!(&ts[10..11], " ");
    }
}
