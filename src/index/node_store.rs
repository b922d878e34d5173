//! Node Store - fetch and store logical nodes by block address.
//!
//! The B+tree is written once against [`NodeStore`]. Two backings exist:
//!
//! ```text
//!                    ┌──────────────┐
//!                    │  BPlusTree   │
//!                    └──────┬───────┘
//!                           │ NodeStore
//!            ┌──────────────┴──────────────┐
//!            ↓                             ↓
//!   ┌─────────────────┐          ┌───────────────────┐
//!   │ MemoryNodeStore │          │ BlockNodeStore<B> │
//!   │  Vec<Option<    │          │   codec + B:      │
//!   │     Node>>      │          │   BlockStore      │
//!   └─────────────────┘          └───────────────────┘
//! ```
//!
//! Address 0 is the tree header in both backings; nodes live at 1 and up.
//! Addresses only grow. A released node leaves an unused hole behind.

use crate::common::config::MAX_NODE_ENTRIES;
use crate::common::{BlockId, Error, Result};
use crate::index::codec;
use crate::index::meta::TreeMeta;
use crate::index::node::Node;
use crate::storage::block::Block;
use crate::storage::BlockStore;

/// Storage of tree nodes and the tree header.
pub trait NodeStore {
    /// Read the persisted header, or `None` for a fresh store.
    fn load_meta(&mut self) -> Result<Option<TreeMeta>>;

    /// Persist the header.
    fn store_meta(&mut self, meta: &TreeMeta) -> Result<()>;

    /// Fetch the node stored at `id`.
    fn read_node(&mut self, id: BlockId) -> Result<Node>;

    /// Store `node` at `id`, replacing what was there.
    fn write_node(&mut self, id: BlockId, node: &Node) -> Result<()>;

    /// Reserve a fresh address strictly greater than every address handed out
    /// before.
    fn allocate(&mut self) -> Result<BlockId>;

    /// Drop the node at `id`. The address is never handed out again.
    fn release(&mut self, id: BlockId) -> Result<()>;

    /// Largest entry count a single node may hold.
    fn max_entries(&self) -> usize;
}

// =============================================================================
// MemoryNodeStore
// =============================================================================

/// Heap arena of nodes indexed by address.
#[derive(Debug)]
pub struct MemoryNodeStore {
    meta: Option<TreeMeta>,
    slots: Vec<Option<Node>>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self {
            meta: None,
            // Slot 0 stands in for the header block.
            slots: vec![None],
        }
    }

    /// Number of live nodes.
    pub fn live_nodes(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    fn slot_mut(&mut self, id: BlockId) -> Result<&mut Option<Node>> {
        if id == BlockId::HEADER {
            return Err(Error::corrupt(id, "the header slot holds no node"));
        }
        self.slots
            .get_mut(id.0 as usize)
            .ok_or(Error::BlockNotFound(id))
    }
}

impl Default for MemoryNodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore for MemoryNodeStore {
    fn load_meta(&mut self) -> Result<Option<TreeMeta>> {
        Ok(self.meta)
    }

    fn store_meta(&mut self, meta: &TreeMeta) -> Result<()> {
        self.meta = Some(*meta);
        Ok(())
    }

    fn read_node(&mut self, id: BlockId) -> Result<Node> {
        match self.slot_mut(id)? {
            Some(node) => Ok(node.clone()),
            None => Err(Error::corrupt(id, "expected a node, found a released slot")),
        }
    }

    fn write_node(&mut self, id: BlockId, node: &Node) -> Result<()> {
        *self.slot_mut(id)? = Some(node.clone());
        Ok(())
    }

    fn allocate(&mut self) -> Result<BlockId> {
        if self.slots.len() >= u32::MAX as usize {
            return Err(Error::Overflow {
                requested: self.slots.len() + 1,
                capacity: u32::MAX as usize,
            });
        }
        let id = BlockId::new(self.slots.len() as u32);
        self.slots.push(None);
        Ok(id)
    }

    fn release(&mut self, id: BlockId) -> Result<()> {
        *self.slot_mut(id)? = None;
        Ok(())
    }

    fn max_entries(&self) -> usize {
        isize::MAX as usize
    }
}

// =============================================================================
// BlockNodeStore
// =============================================================================

/// Nodes packed into fixed-size blocks of a [`BlockStore`].
pub struct BlockNodeStore<B: BlockStore> {
    blocks: B,
}

impl<B: BlockStore> BlockNodeStore<B> {
    /// Wrap a block store, reserving block 0 for the header if the store is
    /// empty.
    pub fn new(mut blocks: B) -> Result<Self> {
        if blocks.block_count() == 0 {
            let id = blocks.allocate_block()?;
            debug_assert_eq!(id, BlockId::HEADER);
        }
        Ok(Self { blocks })
    }

    pub fn blocks(&self) -> &B {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut B {
        &mut self.blocks
    }

    pub fn into_inner(self) -> B {
        self.blocks
    }
}

impl<B: BlockStore> NodeStore for BlockNodeStore<B> {
    fn load_meta(&mut self) -> Result<Option<TreeMeta>> {
        let block = self.blocks.read_block(BlockId::HEADER)?;
        codec::unpack_header(&block)
    }

    fn store_meta(&mut self, meta: &TreeMeta) -> Result<()> {
        let block = codec::pack_header(meta);
        self.blocks.write_block(BlockId::HEADER, &block)
    }

    fn read_node(&mut self, id: BlockId) -> Result<Node> {
        let block = self.blocks.read_block(id)?;
        codec::unpack_node(id, &block)
    }

    fn write_node(&mut self, id: BlockId, node: &Node) -> Result<()> {
        let block = codec::pack_node(id, node)?;
        self.blocks.write_block(id, &block)
    }

    fn allocate(&mut self) -> Result<BlockId> {
        let id = self.blocks.allocate_block()?;
        tracing::trace!(block = %id, "allocated block");
        Ok(id)
    }

    fn release(&mut self, id: BlockId) -> Result<()> {
        self.blocks.write_block(id, &Block::new())
    }

    fn max_entries(&self) -> usize {
        MAX_NODE_ENTRIES
    }
}
