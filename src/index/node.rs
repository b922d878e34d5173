//! Logical B+tree nodes.
//!
//! A [`Node`] is either an [`InternalNode`] or a [`LeafNode`]. Both are a
//! sorted run of entries, which lets split, borrow and merge be written once
//! as entry moves on the tagged variant.
//!
//! # Separator convention
//! Internal entries are `(largest_key, child)`: `largest_key` is the maximum
//! key reachable through `child`, so an internal node has as many children as
//! keys. A key `k` lives in the first child whose `largest_key >= k`.

use crate::common::{BlockId, Key};
use crate::record::PostalRecord;

/// One `(largestKeyInSubtree, child)` pair of an internal node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub largest_key: Key,
    pub child: BlockId,
}

/// An internal (index) node.
///
/// Children are exclusively owned by their parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternalNode {
    pub entries: Vec<IndexEntry>,
}

/// A leaf node of the sequence set.
///
/// `prev`/`next` are non-owning links used only for traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub prev: BlockId,
    pub next: BlockId,
    pub records: Vec<PostalRecord>,
}

impl LeafNode {
    /// An unlinked leaf holding `records`.
    pub fn new(records: Vec<PostalRecord>) -> Self {
        Self {
            prev: BlockId::INVALID,
            next: BlockId::INVALID,
            records,
        }
    }

    /// Index of the first record with key `>= key`.
    pub fn lower_bound(&self, key: Key) -> usize {
        self.records.partition_point(|r| r.zip() < key)
    }

    /// Index of the first record with key `> key`.
    pub fn upper_bound(&self, key: Key) -> usize {
        self.records.partition_point(|r| r.zip() <= key)
    }

    /// Position of the first record with exactly `key`.
    pub fn find(&self, key: Key) -> Option<usize> {
        let pos = self.lower_bound(key);
        match self.records.get(pos) {
            Some(r) if r.zip() == key => Some(pos),
            _ => None,
        }
    }
}

impl InternalNode {
    /// Index of the first child whose `largest_key >= key`.
    ///
    /// Equal to `entries.len()` when `key` is beyond every subtree.
    pub fn lower_bound(&self, key: Key) -> usize {
        self.entries.partition_point(|e| e.largest_key < key)
    }

    /// Index of the first child whose `largest_key > key`.
    pub fn upper_bound(&self, key: Key) -> usize {
        self.entries.partition_point(|e| e.largest_key <= key)
    }
}

/// A B+tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Internal(InternalNode),
    Leaf(LeafNode),
}

impl Node {
    /// Number of entries (children or records).
    pub fn len(&self) -> usize {
        match self {
            Node::Internal(node) => node.entries.len(),
            Node::Leaf(leaf) => leaf.records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Human-readable kind, for logs and errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Internal(_) => "index",
            Node::Leaf(_) => "leaf",
        }
    }

    /// Largest key in this node's subtree.
    pub fn max_key(&self) -> Option<Key> {
        match self {
            Node::Internal(node) => node.entries.last().map(|e| e.largest_key),
            Node::Leaf(leaf) => leaf.records.last().map(|r| r.zip()),
        }
    }

    /// Remove entries `[at..]` and return them as a new node of the same kind.
    ///
    /// A returned leaf is unlinked; `self` keeps its links.
    pub fn split_off(&mut self, at: usize) -> Node {
        match self {
            Node::Internal(node) => Node::Internal(InternalNode {
                entries: node.entries.split_off(at),
            }),
            Node::Leaf(leaf) => Node::Leaf(LeafNode::new(leaf.records.split_off(at))),
        }
    }

    /// Remove the first `n` entries and return them as a new node.
    pub fn drain_front(&mut self, n: usize) -> Node {
        match self {
            Node::Internal(node) => Node::Internal(InternalNode {
                entries: node.entries.drain(..n).collect(),
            }),
            Node::Leaf(leaf) => Node::Leaf(LeafNode::new(leaf.records.drain(..n).collect())),
        }
    }

    /// Append the entries of `other` after this node's entries.
    ///
    /// # Panics
    /// Panics if the two nodes are of different kinds.
    pub fn append(&mut self, other: Node) {
        match (self, other) {
            (Node::Internal(node), Node::Internal(mut other)) => {
                node.entries.append(&mut other.entries)
            }
            (Node::Leaf(leaf), Node::Leaf(mut other)) => leaf.records.append(&mut other.records),
            (this, other) => panic!(
                "cannot append {} entries to {} node",
                other.kind(),
                this.kind()
            ),
        }
    }

    /// Insert the entries of `other` before this node's entries.
    ///
    /// # Panics
    /// Panics if the two nodes are of different kinds.
    pub fn prepend(&mut self, other: Node) {
        match (self, other) {
            (Node::Internal(node), Node::Internal(mut other)) => {
                other.entries.append(&mut node.entries);
                node.entries = other.entries;
            }
            (Node::Leaf(leaf), Node::Leaf(mut other)) => {
                other.records.append(&mut leaf.records);
                leaf.records = other.records;
            }
            (this, other) => panic!(
                "cannot prepend {} entries to {} node",
                other.kind(),
                this.kind()
            ),
        }
    }
}
