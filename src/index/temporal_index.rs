//! Temporal index (TDTree): a bounded-depth implicit segment tree that maps
//! half-open intervals on one time axis to opaque references.
//!
//! Every entry is stored at the smallest node (no deeper than `max_depth`)
//! whose range fully contains it. A point query walks the single root-to-leaf
//! path through the point and filters the collected entries by exact interval
//! containment, since node containment is coarser than entry containment.

use std::collections::HashMap;

use super::node::NodeId;
use crate::types::{
    CacheError, CacheResult, Identifier, IndexEntry, Interval, DEFAULT_DOMAIN_MAX,
    DEFAULT_MAX_DEPTH, MAX_TREE_DEPTH,
};

/// Interval index over the domain `[0, domain_max]`.
pub struct TemporalIndex<R> {
    /// Finest subdivision level; leaves live at this depth.
    max_depth: u32,
    /// Inclusive upper bound of the indexed domain.
    domain_max: u64,
    /// Entries stored at each occupied node.
    nodes: HashMap<NodeId, Vec<IndexEntry<R>>>,
    /// Live entries in each node's subtree, including the node itself.
    subtree_counts: HashMap<NodeId, usize>,
    /// Total live entries.
    len: usize,
}

impl<R> TemporalIndex<R> {
    /// Create an empty index with the given depth and domain.
    pub fn new(max_depth: u32, domain_max: u64) -> CacheResult<Self> {
        check_depth(max_depth)?;
        check_domain_max(domain_max)?;
        Ok(Self {
            max_depth,
            domain_max,
            nodes: HashMap::new(),
            subtree_counts: HashMap::new(),
            len: 0,
        })
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn domain_max(&self) -> u64 {
        self.domain_max
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of nodes currently holding at least one entry.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// The half-open range `[start, end)` a node covers in this index.
    pub fn node_range(&self, node: NodeId) -> (u64, u64) {
        node.range(self.span())
    }

    /// Smallest node at or above `max_depth` that fully contains `interval`.
    ///
    /// Deterministic for a fixed depth and domain. Raising the depth only
    /// ever moves an interval to a descendant of its previous node.
    pub fn find_owning_node(&self, interval: &Interval) -> CacheResult<NodeId> {
        interval.check_domain(self.domain_max)?;
        Ok(self.owning_node(interval))
    }

    /// Add an entry at its owning node and return that node. No
    /// deduplication: an identifier may hold many entries.
    pub fn insert(
        &mut self,
        identifier: Identifier,
        interval: Interval,
        reference: R,
    ) -> CacheResult<NodeId> {
        let node = self.find_owning_node(&interval)?;
        self.place(
            node,
            IndexEntry {
                identifier,
                interval,
                reference,
            },
        );
        Ok(node)
    }

    /// All entries whose interval contains `point`.
    pub fn query(&self, point: u64) -> CacheResult<Vec<&IndexEntry<R>>> {
        if point > self.domain_max {
            return Err(CacheError::PointOutOfDomain {
                point,
                max: self.domain_max,
            });
        }

        let span = self.span();
        let mut found = Vec::new();
        let mut node = NodeId::ROOT;
        loop {
            if self.subtree_count(node) == 0 {
                break;
            }
            if let Some(entries) = self.nodes.get(&node) {
                found.extend(entries.iter().filter(|e| e.interval.contains(point)));
            }
            if node.depth() >= self.max_depth {
                break;
            }
            node = if point < node.split_point(span) {
                node.left_child()
            } else {
                node.right_child()
            };
        }
        Ok(found)
    }

    /// All entries whose interval overlaps `range`. Only subtrees holding
    /// live entries are visited.
    pub fn query_range(&self, range: &Interval) -> CacheResult<Vec<&IndexEntry<R>>> {
        range.check_domain(self.domain_max)?;
        let span = self.span();
        let low = range.low;
        let last = range.last_point(self.domain_max);

        let mut found = Vec::new();
        let mut stack = vec![NodeId::ROOT];
        while let Some(node) = stack.pop() {
            if self.subtree_count(node) == 0 {
                continue;
            }
            let (start, end) = node.range(span);
            if start > last || end <= low {
                continue;
            }
            if let Some(entries) = self.nodes.get(&node) {
                found.extend(entries.iter().filter(|e| e.interval.overlaps(range)));
            }
            if node.depth() < self.max_depth {
                stack.push(node.right_child());
                stack.push(node.left_child());
            }
        }
        Ok(found)
    }

    /// Remove every entry for `identifier` with exactly this interval.
    /// Returns the number removed; absent entries are not an error.
    pub fn remove(&mut self, identifier: &Identifier, interval: &Interval) -> usize {
        if interval.check_domain(self.domain_max).is_err() {
            return 0;
        }
        let node = self.owning_node(interval);
        self.remove_at(node, |e| {
            e.identifier == *identifier && e.interval == *interval
        })
    }

    /// Change the finest subdivision level, re-placing every live entry.
    pub fn set_max_depth(&mut self, max_depth: u32) -> CacheResult<()> {
        check_depth(max_depth)?;
        if max_depth == self.max_depth {
            return Ok(());
        }
        log::debug!(
            "Re-placing {} entries for depth change {} -> {}",
            self.len,
            self.max_depth,
            max_depth
        );
        self.max_depth = max_depth;
        self.rebuild();
        Ok(())
    }

    /// Change the domain upper bound, re-placing every live entry. Fails
    /// without modifying the index if any entry would fall outside.
    pub fn set_domain_max(&mut self, domain_max: u64) -> CacheResult<()> {
        self.check_domain_change(domain_max)?;
        if domain_max == self.domain_max {
            return Ok(());
        }
        self.domain_max = domain_max;
        self.rebuild();
        Ok(())
    }

    /// Verify that every live entry fits inside `domain_max`.
    pub fn check_domain_change(&self, domain_max: u64) -> CacheResult<()> {
        check_domain_max(domain_max)?;
        for entry in self.nodes.values().flatten() {
            entry.interval.check_domain(domain_max)?;
        }
        Ok(())
    }

    /// Iterate over every live entry together with the node holding it.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &IndexEntry<R>)> {
        self.nodes
            .iter()
            .flat_map(|(node, entries)| entries.iter().map(move |e| (*node, e)))
    }

    /// Clear the index.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.subtree_counts.clear();
        self.len = 0;
    }

    fn span(&self) -> u64 {
        self.domain_max + 1
    }

    fn subtree_count(&self, node: NodeId) -> usize {
        self.subtree_counts.get(&node).copied().unwrap_or(0)
    }

    /// Descend from the root while one child still holds the whole interval.
    fn owning_node(&self, interval: &Interval) -> NodeId {
        let span = self.span();
        let low = interval.low;
        let last = interval.last_point(self.domain_max);

        let mut node = NodeId::ROOT;
        while node.depth() < self.max_depth {
            let split = node.split_point(span);
            if last < split {
                node = node.left_child();
            } else if low >= split {
                node = node.right_child();
            } else {
                break;
            }
        }
        node
    }

    fn place(&mut self, node: NodeId, entry: IndexEntry<R>) {
        self.nodes.entry(node).or_default().push(entry);
        for ancestor in node.path_to_root() {
            *self.subtree_counts.entry(ancestor).or_default() += 1;
        }
        self.len += 1;
    }

    fn remove_at(&mut self, node: NodeId, matches: impl Fn(&IndexEntry<R>) -> bool) -> usize {
        let Some(entries) = self.nodes.get_mut(&node) else {
            return 0;
        };
        let before = entries.len();
        entries.retain(|e| !matches(e));
        let removed = before - entries.len();
        if entries.is_empty() {
            self.nodes.remove(&node);
        }
        if removed == 0 {
            return 0;
        }

        for ancestor in node.path_to_root() {
            if let Some(count) = self.subtree_counts.get_mut(&ancestor) {
                *count -= removed;
                if *count == 0 {
                    self.subtree_counts.remove(&ancestor);
                }
            }
        }
        self.len -= removed;
        removed
    }

    fn rebuild(&mut self) {
        let entries: Vec<IndexEntry<R>> = self.nodes.drain().flat_map(|(_, v)| v).collect();
        self.subtree_counts.clear();
        self.len = 0;
        for entry in entries {
            let node = self.owning_node(&entry.interval);
            self.place(node, entry);
        }
    }
}

impl<R: PartialEq> TemporalIndex<R> {
    /// Remove the entry carrying `reference`, stored under `interval`.
    pub fn remove_reference(&mut self, interval: &Interval, reference: &R) -> bool {
        if interval.check_domain(self.domain_max).is_err() {
            return false;
        }
        let node = self.owning_node(interval);
        self.remove_at(node, |e| e.reference == *reference) > 0
    }
}

impl<R> Default for TemporalIndex<R> {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            domain_max: DEFAULT_DOMAIN_MAX,
            nodes: HashMap::new(),
            subtree_counts: HashMap::new(),
            len: 0,
        }
    }
}

fn check_depth(max_depth: u32) -> CacheResult<()> {
    if max_depth > MAX_TREE_DEPTH {
        return Err(CacheError::InvalidDepth {
            depth: max_depth,
            max: MAX_TREE_DEPTH,
        });
    }
    Ok(())
}

fn check_domain_max(domain_max: u64) -> CacheResult<()> {
    if domain_max == u64::MAX {
        return Err(CacheError::Config(
            "domain_max must be below u64::MAX".to_string(),
        ));
    }
    Ok(())
}
