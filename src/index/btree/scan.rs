//! Range scans over the sequence set.
//!
//! The index only locates the starting leaf; from there a scan follows
//! `next` links until it passes the upper bound or the chain ends.

use std::collections::HashSet;

use crate::common::{BlockId, Error, Key, Result};
use crate::index::node::{LeafNode, Node};
use crate::index::node_store::NodeStore;
use crate::record::PostalRecord;

use super::BPlusTree;

/// A lazy, ascending scan of the records in `[lower, upper]`.
///
/// Finite and not restartable; each step may read the next leaf from the
/// store. After the first error the scan yields nothing more.
pub struct RangeScan<'a, S: NodeStore> {
    store: &'a mut S,
    leaf: Option<LeafNode>,
    pos: usize,
    upper: Key,
}

impl<'a, S: NodeStore> RangeScan<'a, S> {
    fn new(store: &'a mut S, leaf: Option<LeafNode>, pos: usize, upper: Key) -> Self {
        Self {
            store,
            leaf,
            pos,
            upper,
        }
    }
}

impl<S: NodeStore> Iterator for RangeScan<'_, S> {
    type Item = Result<PostalRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let leaf = self.leaf.as_ref()?;
            if let Some(record) = leaf.records.get(self.pos) {
                if record.zip() > self.upper {
                    self.leaf = None;
                    return None;
                }
                self.pos += 1;
                return Some(Ok(record.clone()));
            }

            let next = leaf.next;
            self.leaf = None;
            if !next.is_valid() {
                return None;
            }
            match self.store.read_node(next) {
                Ok(Node::Leaf(leaf)) => {
                    self.leaf = Some(leaf);
                    self.pos = 0;
                }
                Ok(node) => {
                    return Some(Err(Error::corrupt(
                        next,
                        format!("expected a leaf in the sequence set, found {} node", node.kind()),
                    )))
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl<S: NodeStore> BPlusTree<S> {
    /// Scan the records with keys in `[lower, upper]`, ascending.
    ///
    /// An inverted range yields nothing.
    pub fn range(&mut self, lower: Key, upper: Key) -> Result<RangeScan<'_, S>> {
        if lower > upper {
            return Ok(RangeScan::new(&mut self.store, None, 0, upper));
        }
        let start = self.find_leaf(lower)?;
        let (leaf, pos) = match start {
            Some((_, leaf)) => {
                let pos = leaf.lower_bound(lower);
                (Some(leaf), pos)
            }
            None => (None, 0),
        };
        Ok(RangeScan::new(&mut self.store, leaf, pos, upper))
    }

    /// Collect the records with keys in `[lower, upper]`.
    pub fn range_query(&mut self, lower: Key, upper: Key) -> Result<Vec<PostalRecord>> {
        self.range(lower, upper)?.collect()
    }

    /// Scan every record in key order, walking the chain from `first_leaf`.
    pub fn iter(&mut self) -> Result<RangeScan<'_, S>> {
        let first = self.meta.first_leaf;
        if !first.is_valid() {
            return Ok(RangeScan::new(&mut self.store, None, 0, Key::MAX));
        }
        let leaf = self.read_leaf(first)?;
        Ok(RangeScan::new(&mut self.store, Some(leaf), 0, Key::MAX))
    }

    /// Every leaf of the sequence set, in chain order.
    ///
    /// # Errors
    /// `Error::CorruptBlock` if the chain reaches a non-leaf or loops.
    pub fn leaves(&mut self) -> Result<Vec<(BlockId, LeafNode)>> {
        let mut leaves = Vec::new();
        let mut seen = HashSet::new();
        let mut id = self.meta.first_leaf;
        while id.is_valid() {
            if !seen.insert(id) {
                return Err(Error::corrupt(id, "sequence set loops back on itself"));
            }
            let leaf = self.read_leaf(id)?;
            let next = leaf.next;
            leaves.push((id, leaf));
            id = next;
        }
        Ok(leaves)
    }

    pub(super) fn read_leaf(&mut self, id: BlockId) -> Result<LeafNode> {
        match self.store.read_node(id)? {
            Node::Leaf(leaf) => Ok(leaf),
            node => Err(Error::corrupt(
                id,
                format!("expected a leaf, found {} node", node.kind()),
            )),
        }
    }
}
