//! Deletion with pre-emptive fix-up.
//!
//! Before the descent enters a child holding the minimum `t-1` entries (or
//! fewer), the child is topped up from a sibling:
//!
//! 1. borrow the last entry of the previous sibling, if it can spare one
//! 2. borrow the first entry of the next sibling, if it can spare one
//! 3. otherwise merge with the next sibling (or the previous one, for the
//!    last child)
//!
//! The recursive call therefore always runs on a node that can lose an
//! entry, and nothing has to be repaired on the way back up except the
//! separators, which are refreshed to each child's new largest key. A
//! separator equal to the deleted key is thereby replaced with its
//! predecessor.
//!
//! # Merge (t = 2)
//! ```text
//!   parent: [(3, a) (7, b) (9, c)]         parent: [(7, a) (9, c)]
//!               │       │            ==>               │
//!         a: [3]     b: [5 7]                    a: [3 5 7]      (b released)
//! ```

use crate::common::{BlockId, Error, Key, Result};
use crate::index::node::{InternalNode, Node};
use crate::index::node_store::NodeStore;
use crate::record::PostalRecord;

use super::{check_siblings, BPlusTree};

impl<S: NodeStore> BPlusTree<S> {
    /// Remove the first record stored under `key` and return it.
    ///
    /// # Errors
    /// `Error::NotFound` if no record has `key`. Rebalancing done on the way
    /// down is kept even then; the tree stays valid.
    pub fn delete(&mut self, key: Key) -> Result<PostalRecord> {
        if self.meta.is_empty() {
            return Err(Error::NotFound(key));
        }
        let before = self.meta;

        let root_id = self.meta.root;
        let root = self.store.read_node(root_id)?;
        let removed = match self.delete_from(root_id, root, key, 0) {
            Ok((record, _)) => {
                self.meta.record_count = self.meta.record_count.saturating_sub(1);
                Some(record)
            }
            Err(Error::NotFound(_)) => None,
            Err(e) => return Err(e),
        };

        self.shrink_root()?;
        self.commit_meta(before)?;
        removed.ok_or(Error::NotFound(key))
    }

    /// Delete `key` below `node`, which can afford to lose an entry.
    ///
    /// Returns the record and the node's new largest key.
    fn delete_from(
        &mut self,
        id: BlockId,
        node: Node,
        key: Key,
        depth: u32,
    ) -> Result<(PostalRecord, Option<Key>)> {
        self.check_depth(id, &node, depth)?;
        let mut parent = match node {
            Node::Leaf(mut leaf) => {
                let pos = leaf.find(key).ok_or(Error::NotFound(key))?;
                let record = leaf.records.remove(pos);
                let node = Node::Leaf(leaf);
                self.store.write_node(id, &node)?;
                return Ok((record, node.max_key()));
            }
            Node::Internal(parent) => parent,
        };

        let idx = parent.lower_bound(key);
        if idx == parent.entries.len() {
            return Err(Error::NotFound(key));
        }

        let (idx, child, mut dirty) = self.fill_child(&mut parent, id, idx)?;
        let child_id = parent.entries[idx].child;
        let outcome = self.delete_from(child_id, child, key, depth + 1);

        if let Ok((_, Some(child_max))) = &outcome {
            if parent.entries[idx].largest_key != *child_max {
                parent.entries[idx].largest_key = *child_max;
                dirty = true;
            }
        }
        let largest = parent.entries.last().map(|e| e.largest_key);
        if dirty {
            self.store.write_node(id, &Node::Internal(parent))?;
        }

        let (record, _) = outcome?;
        Ok((record, largest))
    }

    /// Make sure the child at `idx` holds more than `t-1` entries.
    ///
    /// Returns the index the child now sits at, the child itself, and
    /// whether `parent` changed.
    fn fill_child(
        &mut self,
        parent: &mut InternalNode,
        parent_id: BlockId,
        idx: usize,
    ) -> Result<(usize, Node, bool)> {
        let min = self.min_entries();
        let mut child = self.store.read_node(parent.entries[idx].child)?;
        if child.len() > min {
            return Ok((idx, child, false));
        }

        let last = parent.entries.len() - 1;
        if idx > 0 {
            let prev = self.store.read_node(parent.entries[idx - 1].child)?;
            if prev.len() > min {
                self.borrow_from_prev(parent, parent_id, idx, prev, &mut child)?;
                return Ok((idx, child, true));
            }
            if idx == last {
                let merged = self.merge(parent, parent_id, idx - 1, prev, child)?;
                return Ok((idx - 1, merged, true));
            }
        }
        if idx < last {
            let next = self.store.read_node(parent.entries[idx + 1].child)?;
            if next.len() > min {
                self.borrow_from_next(parent, parent_id, idx, next, &mut child)?;
                return Ok((idx, child, true));
            }
            let merged = self.merge(parent, parent_id, idx, child, next)?;
            return Ok((idx, merged, true));
        }

        // Sole child: nothing to borrow from.
        Ok((idx, child, false))
    }

    /// Move the previous sibling's last entry to the front of `child`.
    fn borrow_from_prev(
        &mut self,
        parent: &mut InternalNode,
        parent_id: BlockId,
        idx: usize,
        mut prev: Node,
        child: &mut Node,
    ) -> Result<()> {
        let prev_id = parent.entries[idx - 1].child;
        let child_id = parent.entries[idx].child;
        check_siblings(prev_id, &prev, child)?;

        let moved = prev.split_off(prev.len() - 1);
        child.prepend(moved);

        if let Some(max) = prev.max_key() {
            parent.entries[idx - 1].largest_key = max;
        }
        if let Some(max) = child.max_key() {
            parent.entries[idx].largest_key = max;
        }

        self.store.write_node(prev_id, &prev)?;
        self.store.write_node(child_id, child)?;
        tracing::debug!(
            parent = %parent_id,
            from = %prev_id,
            to = %child_id,
            kind = child.kind(),
            "borrowed from previous sibling"
        );
        Ok(())
    }

    /// Move the next sibling's first entry to the back of `child`.
    fn borrow_from_next(
        &mut self,
        parent: &mut InternalNode,
        parent_id: BlockId,
        idx: usize,
        mut next: Node,
        child: &mut Node,
    ) -> Result<()> {
        let child_id = parent.entries[idx].child;
        let next_id = parent.entries[idx + 1].child;
        check_siblings(next_id, &next, child)?;

        let moved = next.drain_front(1);
        child.append(moved);

        if let Some(max) = child.max_key() {
            parent.entries[idx].largest_key = max;
        }

        self.store.write_node(next_id, &next)?;
        self.store.write_node(child_id, child)?;
        tracing::debug!(
            parent = %parent_id,
            from = %next_id,
            to = %child_id,
            kind = child.kind(),
            "borrowed from next sibling"
        );
        Ok(())
    }

    /// Fold the child at `left_idx + 1` into the child at `left_idx`.
    ///
    /// The right node's block is released and its entry removed from
    /// `parent`. Returns the merged node.
    fn merge(
        &mut self,
        parent: &mut InternalNode,
        parent_id: BlockId,
        left_idx: usize,
        mut left: Node,
        right: Node,
    ) -> Result<Node> {
        let left_id = parent.entries[left_idx].child;
        let right_id = parent.entries[left_idx + 1].child;
        check_siblings(right_id, &right, &left)?;

        let right_next = match &right {
            Node::Leaf(leaf) => Some(leaf.next),
            Node::Internal(_) => None,
        };
        left.append(right);

        if let (Node::Leaf(leaf), Some(next)) = (&mut left, right_next) {
            leaf.next = next;
            if next.is_valid() {
                self.set_leaf_prev(next, left_id)?;
            } else {
                self.meta.last_leaf = left_id;
            }
        }

        parent.entries[left_idx].largest_key = parent.entries[left_idx + 1].largest_key;
        parent.entries.remove(left_idx + 1);

        self.store.write_node(left_id, &left)?;
        self.store.release(right_id)?;
        tracing::debug!(
            parent = %parent_id,
            left = %left_id,
            released = %right_id,
            kind = left.kind(),
            entries = left.len(),
            "merged siblings"
        );
        Ok(left)
    }

    /// Collapse single-child index roots and an emptied leaf root.
    fn shrink_root(&mut self) -> Result<()> {
        while self.meta.root.is_valid() {
            let root_id = self.meta.root;
            match self.store.read_node(root_id)? {
                Node::Internal(root) if root.entries.len() == 1 => {
                    self.meta.root = root.entries[0].child;
                    self.meta.height = self.meta.height.saturating_sub(1);
                    self.store.release(root_id)?;
                    tracing::debug!(
                        released = %root_id,
                        root = %self.meta.root,
                        height = self.meta.height,
                        "collapsed root"
                    );
                }
                Node::Internal(root) if root.entries.is_empty() => {
                    return Err(Error::corrupt(root_id, "index root without children"));
                }
                Node::Leaf(leaf) if leaf.records.is_empty() => {
                    self.store.release(root_id)?;
                    self.meta.clear();
                    tracing::debug!(released = %root_id, "tree is empty");
                }
                _ => break,
            }
        }
        Ok(())
    }
}
