//! Point lookup.

use crate::common::{BlockId, Key, Result};
use crate::index::node::{LeafNode, Node};
use crate::index::node_store::NodeStore;
use crate::record::PostalRecord;

use super::BPlusTree;

impl<S: NodeStore> BPlusTree<S> {
    /// Descend to the leaf that holds the first record with key `>= key`.
    ///
    /// Returns `None` for an empty tree, or when `key` is larger than every
    /// key in the tree.
    pub(super) fn find_leaf(&mut self, key: Key) -> Result<Option<(BlockId, LeafNode)>> {
        if self.meta.is_empty() {
            return Ok(None);
        }

        let mut id = self.meta.root;
        let mut depth = 0;
        loop {
            let node = self.store.read_node(id)?;
            self.check_depth(id, &node, depth)?;
            match node {
                Node::Internal(node) => {
                    match node.entries.get(node.lower_bound(key)) {
                        Some(entry) => id = entry.child,
                        None => return Ok(None),
                    }
                    depth += 1;
                }
                Node::Leaf(leaf) => return Ok(Some((id, leaf))),
            }
        }
    }

    /// Whether a record with `key` is present.
    pub fn contains(&mut self, key: Key) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// The first record stored under `key`.
    pub fn get(&mut self, key: Key) -> Result<Option<PostalRecord>> {
        let Some((_, leaf)) = self.find_leaf(key)? else {
            return Ok(None);
        };
        Ok(leaf.find(key).map(|pos| leaf.records[pos].clone()))
    }
}
