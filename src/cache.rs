//! Per-run memo of AS holder names.

use anyhow::Result;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::debug;

use crate::sources::HolderLookup;

/// Holder names keyed by AS number.
///
/// Each AS is looked up at most once for the lifetime of the cache. There is
/// no expiry; a cache lives exactly as long as one reconciliation run.
#[derive(Debug, Default)]
pub struct HolderCache {
    holders: HashMap<u32, String>,
    misses: usize,
}

impl HolderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the holder of `asn`, asking `lookup` only on first encounter.
    /// A failed lookup is not cached.
    pub async fn resolve(&mut self, asn: u32, lookup: &dyn HolderLookup) -> Result<&str> {
        match self.holders.entry(asn) {
            Entry::Occupied(entry) => Ok(entry.into_mut().as_str()),
            Entry::Vacant(entry) => {
                debug!("Holder cache miss for AS{}", asn);
                let holder = lookup.holder(asn).await?;
                self.misses += 1;
                Ok(entry.insert(holder).as_str())
            }
        }
    }

    /// Cached holder, if already resolved
    pub fn get(&self, asn: u32) -> Option<&str> {
        self.holders.get(&asn).map(String::as_str)
    }

    /// Number of distinct AS numbers resolved
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Number of lookups performed against the collaborator
    pub fn misses(&self) -> usize {
        self.misses
    }
}
