//! Node numbering for the implicit complete binary tree.
//!
//! Nodes are heap-numbered: the root is `1` and the children of `n` are `2n`
//! and `2n + 1`. The node at depth `d` and position `i` therefore has id
//! `2^d + i` and covers `[floor(i * S / 2^d), floor((i + 1) * S / 2^d))`,
//! where `S` is the number of points in the domain.

use serde::Serialize;

/// Identifier of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u64);

impl NodeId {
    /// The root node, covering the whole domain.
    pub const ROOT: NodeId = NodeId(1);

    /// The node at `depth` and `position` (0-based, left to right).
    pub fn new(depth: u32, position: u64) -> Self {
        Self((1u64 << depth) + position)
    }

    /// Wrap a raw id. Returns None for `0`, which names no node.
    pub fn from_raw(raw: u64) -> Option<Self> {
        (raw != 0).then_some(Self(raw))
    }

    /// The raw numeric id.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// Depth of this node; the root is at depth 0.
    pub fn depth(self) -> u32 {
        63 - self.0.leading_zeros()
    }

    /// Position of this node within its level.
    pub fn position(self) -> u64 {
        self.0 - (1u64 << self.depth())
    }

    pub fn is_root(self) -> bool {
        self.0 == 1
    }

    pub fn parent(self) -> Option<NodeId> {
        (!self.is_root()).then_some(Self(self.0 >> 1))
    }

    pub fn left_child(self) -> NodeId {
        Self(self.0 << 1)
    }

    pub fn right_child(self) -> NodeId {
        Self((self.0 << 1) | 1)
    }

    /// This node followed by each of its ancestors up to the root.
    pub fn path_to_root(self) -> impl Iterator<Item = NodeId> {
        std::iter::successors(Some(self), |n| n.parent())
    }

    /// Whether `self` is `other` or one of its ancestors.
    pub fn is_ancestor_of(self, other: NodeId) -> bool {
        let (a, b) = (self.depth(), other.depth());
        a <= b && (other.0 >> (b - a)) == self.0
    }

    /// The half-open range `[start, end)` this node covers in a domain of
    /// `span` points.
    pub fn range(self, span: u64) -> (u64, u64) {
        let depth = self.depth();
        let position = self.position();
        (
            boundary(depth, position, span),
            boundary(depth, position + 1, span),
        )
    }

    /// The first point of the right child; points below it belong to the
    /// left child.
    pub fn split_point(self, span: u64) -> u64 {
        boundary(self.depth() + 1, 2 * self.position() + 1, span)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `floor(position * span / 2^depth)` without overflow.
fn boundary(depth: u32, position: u64, span: u64) -> u64 {
    ((position as u128 * span as u128) >> depth) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbering() {
        assert_eq!(NodeId::new(0, 0), NodeId::ROOT);
        let n = NodeId::new(4, 13);
        assert_eq!(n.raw(), 29);
        assert_eq!(n.depth(), 4);
        assert_eq!(n.position(), 13);
        assert_eq!(n.parent(), Some(NodeId::new(3, 6)));
        assert_eq!(NodeId::ROOT.parent(), None);
        assert_eq!(NodeId::new(3, 6).right_child(), n);
    }

    #[test]
    fn test_path_to_root() {
        let path: Vec<u64> = NodeId::new(4, 13).path_to_root().map(NodeId::raw).collect();
        assert_eq!(path, vec![29, 14, 7, 3, 1]);
    }

    #[test]
    fn test_ranges_partition_parent() {
        let span = 11;
        for raw in 1..64u64 {
            let n = NodeId::from_raw(raw).unwrap();
            let (start, end) = n.range(span);
            let (ls, le) = n.left_child().range(span);
            let (rs, re) = n.right_child().range(span);
            assert_eq!(ls, start);
            assert_eq!(le, rs);
            assert_eq!(re, end);
            assert_eq!(n.split_point(span), rs);
        }
    }

    #[test]
    fn test_ancestry() {
        let leaf = NodeId::new(4, 13);
        assert!(NodeId::ROOT.is_ancestor_of(leaf));
        assert!(NodeId::new(2, 3).is_ancestor_of(leaf));
        assert!(!NodeId::new(2, 2).is_ancestor_of(leaf));
        assert!(!leaf.is_ancestor_of(NodeId::ROOT));
    }
}
