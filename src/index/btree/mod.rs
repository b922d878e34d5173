//! B+tree index - the tree handle and its algorithms.
//!
//! [`BPlusTree`] owns a [`NodeStore`] and the [`TreeMeta`] header. Every
//! public operation runs to completion against the store and, if it mutated
//! the tree, rewrites the header before returning.
//!
//! # Shape
//! ```text
//!                 ┌────────────────────────┐
//!    root ──────▶ │ (17,b4)      (30,b7)   │   index: (largest key, child)
//!                 └────┬────────────┬──────┘
//!                      ↓            ↓
//!              ┌─────────────┐  ┌─────────────┐
//! first_leaf ─▶│ 5 6 7 10 17 │⇄│ 20 30       │◀─ last_leaf
//!              └─────────────┘  └─────────────┘
//!                       sequence set (prev/next)
//! ```
//!
//! The algorithms live in submodules, each adding an `impl` block:
//! - `search` - point lookup
//! - `scan` - range scans and the sequence-set walk
//! - `insert` - top-down insert with pre-emptive split
//! - `delete` - top-down delete with pre-emptive borrow/merge
//! - `bulk` - leaf-chain writer and bottom-up builds
//! - `validate` - structural checks
//! - `dump` - human-readable tree listing

mod bulk;
mod delete;
mod dump;
mod insert;
mod scan;
mod search;
mod validate;

pub use bulk::LeafSummary;
pub use scan::RangeScan;
pub use validate::TreeStats;

use std::path::Path;

use crate::common::config::{TreeConfig, MAX_DEGREE};
use crate::common::{BlockId, Error, Result};
use crate::index::meta::TreeMeta;
use crate::index::node::Node;
use crate::index::node_store::{BlockNodeStore, MemoryNodeStore, NodeStore};
use crate::storage::FileBlockStore;

/// A tree whose nodes live on the heap.
pub type MemoryTree = BPlusTree<MemoryNodeStore>;

/// A tree whose nodes live in a block file.
pub type FileTree = BPlusTree<BlockNodeStore<FileBlockStore>>;

/// A B+tree of [`PostalRecord`](crate::PostalRecord)s ordered by ZIP.
///
/// Generic over where its nodes live; see [`MemoryTree`] and [`FileTree`].
///
/// # Degree
/// With minimum degree `t`, every node except the root holds between `t-1`
/// and `2t-1` entries. The degree is fixed when the tree is created and
/// stored in its header.
///
/// # Duplicates
/// Duplicate keys are allowed. A new record is placed after every record
/// with an equal key; lookups and deletes act on the first one.
pub struct BPlusTree<S: NodeStore> {
    store: S,
    meta: TreeMeta,
    degree: usize,
}

impl MemoryTree {
    /// Create an empty tree on the heap.
    pub fn in_memory(config: TreeConfig) -> Result<Self> {
        Self::with_store(MemoryNodeStore::new(), config)
    }
}

impl FileTree {
    /// Create a new tree file.
    ///
    /// # Errors
    /// Fails if the file already exists.
    pub fn create<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        let blocks = FileBlockStore::create(path)?;
        Self::with_store(BlockNodeStore::new(blocks)?, config)
    }

    /// Open an existing tree file.
    ///
    /// With `config.degree` unset the stored degree is used.
    ///
    /// # Errors
    /// - `Error::DegreeMismatch` if a different degree was requested
    /// - `Error::CorruptBlock` if the header is damaged
    pub fn open<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        let blocks = FileBlockStore::open(path)?;
        Self::with_store(BlockNodeStore::new(blocks)?, config)
    }

    /// Open a tree file, creating it if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, config: TreeConfig) -> Result<Self> {
        let blocks = FileBlockStore::open_or_create(path)?;
        Self::with_store(BlockNodeStore::new(blocks)?, config)
    }

    /// Flush the tree file to the device.
    pub fn sync(&mut self) -> Result<()> {
        self.store.blocks_mut().sync()
    }
}

impl<S: NodeStore> BPlusTree<S> {
    /// Build a tree handle over `store`.
    ///
    /// A fresh store gets an empty header; an existing one is adopted as-is.
    ///
    /// # Errors
    /// - `Error::InvalidDegree` if the degree cannot be laid out in the store
    /// - `Error::DegreeMismatch` if `config` disagrees with the stored degree
    pub fn with_store(mut store: S, config: TreeConfig) -> Result<Self> {
        let stored = store.load_meta()?;
        let degree = config.resolve(stored.map(|m| m.degree as usize), store.max_entries())?;

        let meta = match stored {
            Some(meta) => {
                tracing::info!(
                    degree,
                    records = meta.record_count,
                    height = meta.height,
                    "opened tree"
                );
                meta
            }
            None => {
                let recorded = u32::try_from(degree).map_err(|_| Error::InvalidDegree {
                    degree,
                    max: MAX_DEGREE,
                })?;
                let meta = TreeMeta::empty(recorded);
                store.store_meta(&meta)?;
                tracing::info!(degree, "created tree");
                meta
            }
        };

        Ok(Self {
            store,
            meta,
            degree,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The in-memory copy of the header.
    #[inline]
    pub fn meta(&self) -> &TreeMeta {
        &self.meta
    }

    /// Minimum degree `t`.
    #[inline]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> u64 {
        self.meta.record_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty()
    }

    /// Index levels above the leaves (0 for a single leaf root).
    #[inline]
    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// `2t-1`
    #[inline]
    fn max_entries(&self) -> usize {
        2 * self.degree - 1
    }

    /// `t-1`
    #[inline]
    fn min_entries(&self) -> usize {
        self.degree - 1
    }

    /// Rewrite the header if it differs from `before`.
    fn commit_meta(&mut self, before: TreeMeta) -> Result<()> {
        if self.meta != before {
            self.store.store_meta(&self.meta)?;
        }
        Ok(())
    }

    /// Fail unless `node`, reached at `depth`, sits where the recorded height
    /// puts it: index nodes above the leaves, leaves exactly at the height.
    fn check_depth(&self, id: BlockId, node: &Node, depth: u32) -> Result<()> {
        match node {
            Node::Internal(_) if depth >= self.meta.height => {
                Err(Error::corrupt(id, "index node below the recorded height"))
            }
            Node::Leaf(_) if depth != self.meta.height => Err(Error::corrupt(
                id,
                format!("leaf at depth {}, tree height is {}", depth, self.meta.height),
            )),
            _ => Ok(()),
        }
    }

    /// Point the leaf at `id` back at `prev`.
    fn set_leaf_prev(&mut self, id: BlockId, prev: BlockId) -> Result<()> {
        match self.store.read_node(id)? {
            Node::Leaf(mut leaf) => {
                leaf.prev = prev;
                self.store.write_node(id, &Node::Leaf(leaf))
            }
            node => Err(Error::corrupt(
                id,
                format!("expected a leaf in the sequence set, found {} node", node.kind()),
            )),
        }
    }
}

/// Fail unless two siblings are the same kind of node.
fn check_siblings(id: BlockId, sibling: &Node, node: &Node) -> Result<()> {
    if sibling.is_leaf() != node.is_leaf() {
        return Err(Error::corrupt(
            id,
            format!("{} node has a {} sibling", node.kind(), sibling.kind()),
        ));
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
