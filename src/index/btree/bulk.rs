//! Bulk construction from sorted input.
//!
//! Two entry points build a tree bottom-up instead of inserting one record
//! at a time:
//!
//! - [`BPlusTree::build_from_ordered_leaves`] puts exactly one index node
//!   over an existing, linked run of leaves. It fails with
//!   `Error::Overflow` when the run is wider than one node.
//! - [`BPlusTree::build_levels_from_ordered_leaves`] and
//!   [`BPlusTree::bulk_load`] stack as many index levels as needed.
//!
//! Leaf runs come from [`BPlusTree::write_leaf_chain`].

use crate::common::{BlockId, Error, Key, Result};
use crate::index::node::{IndexEntry, InternalNode, LeafNode, Node};
use crate::index::node_store::NodeStore;
use crate::record::PostalRecord;

use super::BPlusTree;

/// The largest key below a block, and the block.
///
/// Describes one leaf of a run written by [`BPlusTree::write_leaf_chain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafSummary {
    pub largest_key: Key,
    pub block: BlockId,
}

impl From<LeafSummary> for IndexEntry {
    fn from(summary: LeafSummary) -> Self {
        IndexEntry {
            largest_key: summary.largest_key,
            child: summary.block,
        }
    }
}

impl<S: NodeStore> BPlusTree<S> {
    /// Write ascending record groups as a linked run of leaves.
    ///
    /// Each group becomes one leaf; empty groups are skipped. The leaves are
    /// written to fresh blocks and are not yet part of the tree.
    ///
    /// # Errors
    /// - `Error::UnsortedInput` if keys decrease anywhere in the input
    /// - `Error::Overflow` if a group holds more than `2t-1` records
    pub fn write_leaf_chain<I>(&mut self, groups: I) -> Result<Vec<LeafSummary>>
    where
        I: IntoIterator<Item = Vec<PostalRecord>>,
    {
        let capacity = self.max_entries();
        let groups: Vec<Vec<PostalRecord>> =
            groups.into_iter().filter(|g| !g.is_empty()).collect();

        let mut previous: Option<Key> = None;
        for group in &groups {
            if group.len() > capacity {
                return Err(Error::Overflow {
                    requested: group.len(),
                    capacity,
                });
            }
            check_sorted(&mut previous, group.iter().map(|r| r.zip()))?;
        }

        let ids = groups
            .iter()
            .map(|_| self.store.allocate())
            .collect::<Result<Vec<_>>>()?;

        let mut summaries = Vec::with_capacity(groups.len());
        for (i, records) in groups.into_iter().enumerate() {
            let id = ids[i];
            let largest_key = records.last().map(|r| r.zip()).unwrap_or_default();
            let leaf = LeafNode {
                prev: if i == 0 { BlockId::INVALID } else { ids[i - 1] },
                next: ids.get(i + 1).copied().unwrap_or(BlockId::INVALID),
                records,
            };
            self.store.write_node(id, &Node::Leaf(leaf))?;
            summaries.push(LeafSummary {
                largest_key,
                block: id,
            });
        }

        tracing::debug!(leaves = summaries.len(), "wrote leaf chain");
        Ok(summaries)
    }

    /// Put a single index node over a linked run of leaves.
    ///
    /// The leaves must be linked to each other in order, hold ascending keys
    /// and match their summaries. An empty run leaves the tree empty.
    ///
    /// # Errors
    /// - `Error::TreeNotEmpty` unless the tree is empty
    /// - `Error::Overflow` if the run is wider than `2t-1` leaves
    /// - `Error::CorruptBlock` if a leaf does not match the run
    pub fn build_from_ordered_leaves(&mut self, leaves: &[LeafSummary]) -> Result<()> {
        if !self.meta.is_empty() {
            return Err(Error::TreeNotEmpty);
        }
        if leaves.is_empty() {
            return Ok(());
        }
        let capacity = self.max_entries();
        if leaves.len() > capacity {
            return Err(Error::Overflow {
                requested: leaves.len(),
                capacity,
            });
        }

        let records = self.check_leaf_run(leaves)?;
        let before = self.meta;
        let root_id = self.store.allocate()?;
        let root = InternalNode {
            entries: leaves.iter().copied().map(IndexEntry::from).collect(),
        };
        self.store.write_node(root_id, &Node::Internal(root))?;

        self.set_built(root_id, leaves, records, 1);
        tracing::info!(leaves = leaves.len(), records, "built one index level");
        self.commit_meta(before)
    }

    /// Stack index levels over a linked run of leaves until one root remains.
    ///
    /// A single leaf becomes the root itself.
    ///
    /// # Errors
    /// - `Error::TreeNotEmpty` unless the tree is empty
    /// - `Error::CorruptBlock` if a leaf does not match the run
    pub fn build_levels_from_ordered_leaves(&mut self, leaves: &[LeafSummary]) -> Result<()> {
        if !self.meta.is_empty() {
            return Err(Error::TreeNotEmpty);
        }
        if leaves.is_empty() {
            return Ok(());
        }
        let records = self.check_leaf_run(leaves)?;
        self.build_index_levels(leaves, records)
    }

    /// Build a tree from records sorted by key.
    ///
    /// Records are spread evenly over as few leaves as possible, so every
    /// node meets the fill bounds.
    ///
    /// # Errors
    /// - `Error::TreeNotEmpty` unless the tree is empty
    /// - `Error::UnsortedInput` if keys decrease anywhere in the input
    pub fn bulk_load<I>(&mut self, records: I) -> Result<()>
    where
        I: IntoIterator<Item = PostalRecord>,
    {
        if !self.meta.is_empty() {
            return Err(Error::TreeNotEmpty);
        }
        let mut records: Vec<PostalRecord> = records.into_iter().collect();
        if records.is_empty() {
            return Ok(());
        }
        check_sorted(&mut None, records.iter().map(|r| r.zip()))?;

        let total = records.len() as u64;
        let mut groups = Vec::new();
        for size in even_chunks(records.len(), self.max_entries()) {
            let rest = records.split_off(size);
            groups.push(std::mem::replace(&mut records, rest));
        }

        let leaves = self.write_leaf_chain(groups)?;
        self.build_index_levels(&leaves, total)
    }

    fn build_index_levels(&mut self, leaves: &[LeafSummary], records: u64) -> Result<()> {
        let before = self.meta;
        let capacity = self.max_entries();
        let mut level = leaves.to_vec();
        let mut height = 0;

        while level.len() > 1 {
            let mut upper = Vec::new();
            let mut rest = level.as_slice();
            for size in even_chunks(level.len(), capacity) {
                let (group, tail) = rest.split_at(size);
                rest = tail;

                let id = self.store.allocate()?;
                let node = InternalNode {
                    entries: group.iter().copied().map(IndexEntry::from).collect(),
                };
                self.store.write_node(id, &Node::Internal(node))?;
                upper.push(LeafSummary {
                    largest_key: group[group.len() - 1].largest_key,
                    block: id,
                });
            }
            level = upper;
            height += 1;
        }

        self.set_built(level[0].block, leaves, records, height);
        tracing::info!(leaves = leaves.len(), records, height, "bulk built tree");
        self.commit_meta(before)
    }

    fn set_built(&mut self, root: BlockId, leaves: &[LeafSummary], records: u64, height: u32) {
        self.meta.root = root;
        self.meta.first_leaf = leaves[0].block;
        self.meta.last_leaf = leaves[leaves.len() - 1].block;
        self.meta.record_count = records;
        self.meta.height = height;
    }

    /// Check that `leaves` is a linked, ascending run; returns its record
    /// count.
    fn check_leaf_run(&mut self, leaves: &[LeafSummary]) -> Result<u64> {
        let capacity = self.max_entries();
        let mut previous: Option<Key> = None;
        let mut records = 0u64;

        for (i, summary) in leaves.iter().enumerate() {
            let id = summary.block;
            let leaf = self.read_leaf(id)?;

            if leaf.records.is_empty() {
                return Err(Error::corrupt(id, "empty leaf in run"));
            }
            if leaf.records.len() > capacity {
                return Err(Error::Overflow {
                    requested: leaf.records.len(),
                    capacity,
                });
            }
            let expected_prev = if i == 0 { BlockId::INVALID } else { leaves[i - 1].block };
            let expected_next = leaves.get(i + 1).map_or(BlockId::INVALID, |l| l.block);
            if leaf.prev != expected_prev || leaf.next != expected_next {
                return Err(Error::corrupt(
                    id,
                    format!(
                        "leaf linked {} <- -> {}, run expects {} <- -> {}",
                        leaf.prev, leaf.next, expected_prev, expected_next
                    ),
                ));
            }
            let largest = leaf.records[leaf.records.len() - 1].zip();
            if largest != summary.largest_key {
                return Err(Error::corrupt(
                    id,
                    format!(
                        "leaf holds largest key {}, summary says {}",
                        largest, summary.largest_key
                    ),
                ));
            }
            check_sorted(&mut previous, leaf.records.iter().map(|r| r.zip()))?;
            records += leaf.records.len() as u64;
        }
        Ok(records)
    }
}

/// Fail on the first key smaller than its predecessor.
fn check_sorted(previous: &mut Option<Key>, keys: impl Iterator<Item = Key>) -> Result<()> {
    for key in keys {
        if let Some(prev) = *previous {
            if key < prev {
                return Err(Error::UnsortedInput {
                    previous: prev,
                    next: key,
                });
            }
        }
        *previous = Some(key);
    }
    Ok(())
}

/// Split `n` items into as few chunks of at most `capacity` as possible,
/// with sizes differing by at most one.
fn even_chunks(n: usize, capacity: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let count = n.div_ceil(capacity);
    let base = n / count;
    let extra = n % count;
    (0..count).map(|i| base + usize::from(i < extra)).collect()
}
