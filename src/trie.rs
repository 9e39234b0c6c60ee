//! Longest-prefix-match trie over IPv4 CIDR blocks.
//!
//! The trie is a binary tree over address bits. Only blocks that were
//! explicitly inserted carry an [`Allocation`]; the branching nodes in
//! between exist purely for traversal. Every operation descends at most
//! 32 levels, independent of how many allocations are stored.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::cidr::bit_at;

/// Kind of registry record attached to a block
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AllocationKind {
    /// An assignment listed in the registry portal
    #[default]
    Assignment,
}

/// Metadata stored alongside each allocated block
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocationMeta {
    #[serde(rename = "type", default)]
    pub kind: AllocationKind,

    /// Free-text label from the registry
    #[serde(default)]
    pub description: String,

    /// Whether the registry subdivides this allocation further.
    /// Informational only, never derived from the trie shape.
    #[serde(rename = "children", default)]
    pub has_children: bool,
}

impl AllocationMeta {
    pub fn assignment(description: impl Into<String>, has_children: bool) -> Self {
        Self {
            kind: AllocationKind::Assignment,
            description: description.into(),
            has_children,
        }
    }

    fn normalised(mut self) -> Self {
        let trimmed = self.description.trim();
        if trimmed.len() != self.description.len() {
            self.description = trimmed.to_string();
        }
        self
    }
}

/// An inserted block and its metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub block: Ipv4Net,
    pub meta: AllocationMeta,
}

#[derive(Debug, Clone, Default)]
struct TrieNode {
    children: [Option<usize>; 2],
    /// Index into `PrefixTrie::allocations` when this node is a real block
    allocation: Option<usize>,
}

/// Binary trie keyed by IPv4 CIDR blocks
#[derive(Debug, Clone)]
pub struct PrefixTrie {
    nodes: Vec<TrieNode>,
    allocations: Vec<Allocation>,
}

impl Default for PrefixTrie {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixTrie {
    /// Create an empty trie
    pub fn new() -> Self {
        Self {
            nodes: vec![TrieNode::default()],
            allocations: Vec::new(),
        }
    }

    /// Number of inserted blocks
    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    /// Insert or update the allocation for `block`.
    ///
    /// Re-inserting an existing block replaces its metadata in place.
    /// Returns a handle to the stored metadata so callers can amend it.
    pub fn insert(&mut self, block: Ipv4Net, meta: AllocationMeta) -> &mut AllocationMeta {
        let block = block.trunc();
        let addr = u32::from(block.network());
        let mut index = 0;

        for depth in 0..block.prefix_len() {
            let bit = bit_at(addr, depth);
            index = match self.nodes[index].children[bit] {
                Some(child) => child,
                None => {
                    let child = self.nodes.len();
                    self.nodes.push(TrieNode::default());
                    self.nodes[index].children[bit] = Some(child);
                    child
                }
            };
        }

        let meta = meta.normalised();
        let slot = match self.nodes[index].allocation {
            Some(slot) => {
                self.allocations[slot].meta = meta;
                slot
            }
            None => {
                let slot = self.allocations.len();
                self.allocations.push(Allocation { block, meta });
                self.nodes[index].allocation = Some(slot);
                slot
            }
        };

        &mut self.allocations[slot].meta
    }

    /// Find the allocation whose block is identical to `block`
    pub fn search_exact(&self, block: &Ipv4Net) -> Option<&Allocation> {
        let index = self.find_node(&block.trunc())?;
        self.nodes[index]
            .allocation
            .map(|slot| &self.allocations[slot])
    }

    /// Find the most specific allocation covering `block`.
    ///
    /// An exact match counts as covering. Returns `None` when no stored
    /// block covers the query.
    pub fn search_best(&self, block: &Ipv4Net) -> Option<&Allocation> {
        let block = block.trunc();
        let addr = u32::from(block.network());
        let mut index = 0;
        let mut best = self.nodes[0].allocation;

        for depth in 0..block.prefix_len() {
            match self.nodes[index].children[bit_at(addr, depth)] {
                Some(child) => {
                    index = child;
                    if let Some(slot) = self.nodes[index].allocation {
                        best = Some(slot);
                    }
                }
                None => break,
            }
        }

        best.map(|slot| &self.allocations[slot])
    }

    /// Check if `block` itself was inserted
    pub fn contains(&self, block: &Ipv4Net) -> bool {
        self.search_exact(block).is_some()
    }

    /// All stored allocations, in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Allocation> + '_ {
        self.allocations.iter()
    }

    fn find_node(&self, block: &Ipv4Net) -> Option<usize> {
        let addr = u32::from(block.network());
        let mut index = 0;
        for depth in 0..block.prefix_len() {
            index = self.nodes[index].children[bit_at(addr, depth)]?;
        }
        Some(index)
    }
}

impl<'a> IntoIterator for &'a PrefixTrie {
    type Item = &'a Allocation;
    type IntoIter = std::slice::Iter<'a, Allocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.allocations.iter()
    }
}

impl FromIterator<(Ipv4Net, AllocationMeta)> for PrefixTrie {
    fn from_iter<I: IntoIterator<Item = (Ipv4Net, AllocationMeta)>>(iter: I) -> Self {
        let mut trie = PrefixTrie::new();
        for (block, meta) in iter {
            trie.insert(block, meta);
        }
        trie
    }
}
