//! Structural validation.

use crate::common::{BlockId, Error, Key, Result};
use crate::index::node::Node;
use crate::index::node_store::NodeStore;

use super::BPlusTree;

/// Shape of a tree that passed [`BPlusTree::validate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    pub height: u32,
    pub internal_nodes: usize,
    pub leaf_nodes: usize,
    pub records: u64,
}

/// State carried through the recursive walk.
#[derive(Default)]
struct Walk {
    stats: TreeStats,
    leaves: Vec<BlockId>,
    last_key: Option<Key>,
}

impl<S: NodeStore> BPlusTree<S> {
    /// Check every structural invariant of the tree.
    ///
    /// - non-root nodes hold `t-1..=2t-1` entries, the root at most `2t-1`
    /// - every separator equals the largest key of its child
    /// - keys ascend across the whole tree
    /// - all leaves sit at depth `height`
    /// - the leaf chain visits the leaves in order with consistent `prev`
    ///   links, from `first_leaf` to `last_leaf`
    /// - `record_count` matches the records found
    ///
    /// # Errors
    /// `Error::CorruptBlock` naming the first offending block.
    pub fn validate(&mut self) -> Result<TreeStats> {
        let meta = self.meta;
        if meta.is_empty() {
            if meta.first_leaf.is_valid()
                || meta.last_leaf.is_valid()
                || meta.record_count != 0
                || meta.height != 0
            {
                return Err(Error::corrupt(
                    BlockId::HEADER,
                    "empty tree with leftover header fields",
                ));
            }
            return Ok(TreeStats::default());
        }

        let mut walk = Walk::default();
        self.check_subtree(meta.root, 0, true, &mut walk)?;
        walk.stats.height = meta.height;

        let chain = self.leaves()?;
        if chain.len() != walk.leaves.len() {
            return Err(Error::corrupt(
                meta.first_leaf,
                format!(
                    "leaf chain has {} leaves, index reaches {}",
                    chain.len(),
                    walk.leaves.len()
                ),
            ));
        }
        let mut prev = BlockId::INVALID;
        for ((id, leaf), &expected) in chain.iter().zip(&walk.leaves) {
            if *id != expected {
                return Err(Error::corrupt(
                    *id,
                    format!("leaf chain reaches {} where the index has {}", id, expected),
                ));
            }
            if leaf.prev != prev {
                return Err(Error::corrupt(
                    *id,
                    format!("prev link is {}, expected {}", leaf.prev, prev),
                ));
            }
            prev = *id;
        }
        if meta.last_leaf != prev {
            return Err(Error::corrupt(
                BlockId::HEADER,
                format!("last leaf is {}, chain ends at {}", meta.last_leaf, prev),
            ));
        }

        if walk.stats.records != meta.record_count {
            return Err(Error::corrupt(
                BlockId::HEADER,
                format!(
                    "header counts {} records, leaves hold {}",
                    meta.record_count, walk.stats.records
                ),
            ));
        }
        Ok(walk.stats)
    }

    /// Validate the subtree at `id`; returns its largest key.
    fn check_subtree(
        &mut self,
        id: BlockId,
        depth: u32,
        is_root: bool,
        walk: &mut Walk,
    ) -> Result<Option<Key>> {
        let node = self.store.read_node(id)?;
        let len = node.len();
        let (min, max) = (self.min_entries(), self.max_entries());
        if len > max || (!is_root && len < min) {
            return Err(Error::corrupt(
                id,
                format!("{} node holds {} entries, expected {}..={}", node.kind(), len, min, max),
            ));
        }
        if len == 0 {
            return Err(Error::corrupt(
                id,
                format!("empty {} node in a non-empty tree", node.kind()),
            ));
        }

        match node {
            Node::Internal(node) => {
                if depth >= self.meta.height {
                    return Err(Error::corrupt(id, "index node below the recorded height"));
                }
                walk.stats.internal_nodes += 1;
                for entry in &node.entries {
                    let largest = self.check_subtree(entry.child, depth + 1, false, walk)?;
                    if largest != Some(entry.largest_key) {
                        return Err(Error::corrupt(
                            id,
                            format!(
                                "separator {} for {}, subtree holds largest key {:?}",
                                entry.largest_key, entry.child, largest
                            ),
                        ));
                    }
                }
                Ok(node.entries.last().map(|e| e.largest_key))
            }
            Node::Leaf(leaf) => {
                if depth != self.meta.height {
                    return Err(Error::corrupt(
                        id,
                        format!("leaf at depth {}, tree height is {}", depth, self.meta.height),
                    ));
                }
                for record in &leaf.records {
                    if let Some(last) = walk.last_key {
                        if record.zip() < last {
                            return Err(Error::corrupt(
                                id,
                                format!("key {} follows {}", record.zip(), last),
                            ));
                        }
                    }
                    walk.last_key = Some(record.zip());
                }
                walk.stats.leaf_nodes += 1;
                walk.stats.records += leaf.records.len() as u64;
                walk.leaves.push(id);
                Ok(leaf.records.last().map(|r| r.zip()))
            }
        }
    }
}
