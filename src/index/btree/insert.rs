//! Insertion with pre-emptive splits.
//!
//! A full node is split before the descent enters it, so a single top-down
//! pass suffices and no split ever has to propagate upwards.
//!
//! # Split (t = 2, full node holds 3 entries)
//! ```text
//!   parent: [.. (9, c) ..]            parent: [.. (6, c) (9, r) ..]
//!                 │           ==>                  │       │
//!         c: [4 6 9]                       c: [4 6]     r: [9]
//! ```
//! The split node keeps the lower `t` entries and its largest key (index
//! `t-1` before the split) becomes its separator. The new right sibling takes
//! the rest and inherits the old separator.

use crate::common::{BlockId, Error, Result};
use crate::index::node::{IndexEntry, InternalNode, LeafNode, Node};
use crate::index::node_store::NodeStore;
use crate::record::PostalRecord;

use super::BPlusTree;

impl<S: NodeStore> BPlusTree<S> {
    /// Insert a record. Duplicate keys are kept, after existing equal keys.
    pub fn insert(&mut self, record: PostalRecord) -> Result<()> {
        let before = self.meta;

        if self.meta.is_empty() {
            let id = self.store.allocate()?;
            self.store
                .write_node(id, &Node::Leaf(LeafNode::new(vec![record])))?;
            self.meta.root = id;
            self.meta.first_leaf = id;
            self.meta.last_leaf = id;
            self.meta.height = 0;
            tracing::debug!(root = %id, "planted root leaf");
        } else {
            let root_id = self.meta.root;
            let root = self.store.read_node(root_id)?;

            if root.len() >= self.max_entries() {
                let largest_key = root
                    .max_key()
                    .ok_or_else(|| Error::corrupt(root_id, "full root without keys"))?;
                let new_root_id = self.store.allocate()?;
                let mut new_root = InternalNode {
                    entries: vec![IndexEntry {
                        largest_key,
                        child: root_id,
                    }],
                };
                self.split_child(&mut new_root, 0, root, new_root_id)?;
                let new_root = Node::Internal(new_root);
                self.store.write_node(new_root_id, &new_root)?;

                self.meta.root = new_root_id;
                self.meta.height += 1;
                tracing::debug!(
                    root = %new_root_id,
                    height = self.meta.height,
                    "grew new root"
                );
                self.insert_non_full(new_root_id, new_root, record)?;
            } else {
                self.insert_non_full(root_id, root, record)?;
            }
        }

        self.meta.record_count += 1;
        self.commit_meta(before)
    }

    /// Insert below `node`, the root, which is known not to be full.
    fn insert_non_full(
        &mut self,
        mut id: BlockId,
        mut node: Node,
        record: PostalRecord,
    ) -> Result<()> {
        let key = record.zip();
        let mut depth = 0;
        loop {
            self.check_depth(id, &node, depth)?;
            let mut parent = match node {
                Node::Leaf(mut leaf) => {
                    let pos = leaf.upper_bound(key);
                    leaf.records.insert(pos, record);
                    return self.store.write_node(id, &Node::Leaf(leaf));
                }
                Node::Internal(parent) => parent,
            };
            if parent.entries.is_empty() {
                return Err(Error::corrupt(id, "index node without children"));
            }

            let mut idx = parent.upper_bound(key).min(parent.entries.len() - 1);
            let mut dirty = false;
            let mut child = self.store.read_node(parent.entries[idx].child)?;

            if child.len() >= self.max_entries() {
                let (left, right) = self.split_child(&mut parent, idx, child, id)?;
                child = if key >= parent.entries[idx].largest_key {
                    idx += 1;
                    right
                } else {
                    left
                };
                dirty = true;
            }
            if key > parent.entries[idx].largest_key {
                parent.entries[idx].largest_key = key;
                dirty = true;
            }

            let child_id = parent.entries[idx].child;
            if dirty {
                self.store.write_node(id, &Node::Internal(parent))?;
            }
            id = child_id;
            node = child;
            depth += 1;
        }
    }

    /// Split the full child at `parent.entries[idx]`.
    ///
    /// Both halves are written; `parent` is updated in memory only and is the
    /// caller's to write. Returns `(left, right)`.
    fn split_child(
        &mut self,
        parent: &mut InternalNode,
        idx: usize,
        mut child: Node,
        parent_id: BlockId,
    ) -> Result<(Node, Node)> {
        let child_id = parent.entries[idx].child;
        let right_id = self.store.allocate()?;
        let mut right = child.split_off(self.degree);

        let promoted = child
            .max_key()
            .ok_or_else(|| Error::corrupt(child_id, "split left an empty node"))?;
        let right_max = right
            .max_key()
            .ok_or_else(|| Error::corrupt(child_id, "split produced an empty sibling"))?;

        if let (Node::Leaf(left), Node::Leaf(upper)) = (&mut child, &mut right) {
            upper.prev = child_id;
            upper.next = left.next;
            if left.next.is_valid() {
                self.set_leaf_prev(left.next, right_id)?;
            } else {
                self.meta.last_leaf = right_id;
            }
            left.next = right_id;
        }

        parent.entries[idx].largest_key = promoted;
        parent.entries.insert(
            idx + 1,
            IndexEntry {
                largest_key: right_max,
                child: right_id,
            },
        );

        self.store.write_node(child_id, &child)?;
        self.store.write_node(right_id, &right)?;
        tracing::debug!(
            parent = %parent_id,
            left = %child_id,
            right = %right_id,
            kind = child.kind(),
            promoted,
            "split node"
        );
        Ok((child, right))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{all_keys, insert_keys, memory_tree, paged_tree};
    use crate::common::Error;
    use crate::index::node::Node;
    use crate::record::PostalRecord;
    use crate::NodeStore;

    #[test]
    fn test_first_insert_plants_leaf_root() {
        let mut tree = memory_tree(2);
        tree.insert(PostalRecord::keyed(42)).unwrap();
        let meta = *tree.meta();
        assert_eq!(meta.root, meta.first_leaf);
        assert_eq!(meta.root, meta.last_leaf);
        assert_eq!(meta.height, 0);
        assert_eq!(meta.record_count, 1);
    }

    #[test]
    fn test_root_split_grows_height() {
        let mut tree = memory_tree(2);
        insert_keys(&mut tree, &[1, 2, 3]);
        assert_eq!(tree.height(), 0);

        insert_keys(&mut tree, &[4]);
        assert_eq!(tree.height(), 1);
        assert_ne!(tree.meta().first_leaf, tree.meta().last_leaf);

        let root_id = tree.meta().root;
        let Node::Internal(root) = tree.store.read_node(root_id).unwrap() else {
            panic!("root should be an index node");
        };
        let separators: Vec<i32> = root.entries.iter().map(|e| e.largest_key).collect();
        assert_eq!(separators, vec![2, 4]);
    }

    #[test]
    fn test_scenario_shape() {
        let mut tree = memory_tree(2);
        insert_keys(&mut tree, &[10, 20, 5, 6, 12, 30, 7, 17]);
        assert_eq!(tree.len(), 8);
        assert_eq!(all_keys(&mut tree), vec![5, 6, 7, 10, 12, 17, 20, 30]);
        tree.validate().unwrap();
    }

    #[test]
    fn test_ascending_and_descending_inserts() {
        for degree in 2..=4 {
            let mut tree = paged_tree(degree);
            let keys: Vec<i32> = (0..200).collect();
            insert_keys(&mut tree, &keys);
            assert_eq!(all_keys(&mut tree), keys);
            tree.validate().unwrap();

            let mut tree = memory_tree(degree);
            let rev: Vec<i32> = (0..200).rev().collect();
            insert_keys(&mut tree, &rev);
            assert_eq!(all_keys(&mut tree), keys);
            tree.validate().unwrap();
        }
    }

    #[test]
    fn test_duplicates_keep_insertion_order() {
        let mut tree = memory_tree(2);
        for (i, place) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            tree.insert(PostalRecord::new(7, place, "", "", i as f64, 0.0))
                .unwrap();
            tree.insert(PostalRecord::keyed(i as i32 * 3)).unwrap();
        }
        let places: Vec<String> = tree
            .range_query(7, 7)
            .unwrap()
            .iter()
            .map(|r| r.place().to_string())
            .collect();
        assert_eq!(places, vec!["a", "b", "c", "d", "e"]);
        tree.validate().unwrap();
    }

    #[test]
    fn test_child_pointing_at_ancestor_is_corrupt() {
        let mut tree = memory_tree(2);
        insert_keys(&mut tree, &[1, 2, 3, 4]);
        let root_id = tree.meta().root;
        let Node::Internal(mut root) = tree.store.read_node(root_id).unwrap() else {
            panic!("root should be an index node");
        };
        root.entries[1].child = root_id;
        tree.store.write_node(root_id, &Node::Internal(root)).unwrap();

        assert!(matches!(
            tree.insert(PostalRecord::keyed(3)),
            Err(Error::CorruptBlock { .. })
        ));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn test_full_block_degree() {
        let mut tree = paged_tree(crate::DEFAULT_DEGREE);
        let keys: Vec<i32> = (0..2000).map(|k| (k * 7919) % 2003).collect();
        insert_keys(&mut tree, &keys);
        let stats = tree.validate().unwrap();
        assert_eq!(stats.records, 2000);
        assert!(stats.height >= 1);
    }
}
