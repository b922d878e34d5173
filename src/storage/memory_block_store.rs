//! Memory Block Store - blocks held in a heap buffer.

use crate::common::{BlockId, Error, Result};
use crate::storage::block::Block;
use crate::storage::BlockStore;

/// A [`BlockStore`] backed by a growable vector of boxed blocks.
///
/// Byte-for-byte identical to what a [`FileBlockStore`](super::FileBlockStore)
/// would hold, which makes it the store of choice for codec snapshots and
/// property tests.
#[derive(Debug, Default)]
pub struct MemoryBlockStore {
    blocks: Vec<Box<Block>>,
}

impl MemoryBlockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a block without copying it.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize).map(|b| b.as_ref())
    }

    /// Total bytes held.
    pub fn size_bytes(&self) -> usize {
        self.blocks.len() * Block::size()
    }
}

impl BlockStore for MemoryBlockStore {
    fn read_block(&mut self, id: BlockId) -> Result<Block> {
        let stored = self.block(id).ok_or(Error::BlockNotFound(id))?;
        let mut block = Block::new();
        block.copy_from(stored);
        Ok(block)
    }

    fn write_block(&mut self, id: BlockId, block: &Block) -> Result<()> {
        let slot = self
            .blocks
            .get_mut(id.0 as usize)
            .ok_or(Error::BlockNotFound(id))?;
        slot.copy_from(block);
        Ok(())
    }

    fn allocate_block(&mut self) -> Result<BlockId> {
        if self.blocks.len() >= u32::MAX as usize {
            return Err(Error::Overflow {
                requested: self.blocks.len() + 1,
                capacity: u32::MAX as usize,
            });
        }
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(Box::new(Block::new()));
        Ok(id)
    }

    fn block_count(&self) -> u32 {
        self.blocks.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_is_zeroed_and_monotonic() {
        let mut store = MemoryBlockStore::new();
        for i in 0..4 {
            let id = store.allocate_block().unwrap();
            assert_eq!(id, BlockId::new(i));
            assert!(store.read_block(id).unwrap().is_zeroed());
        }
        assert_eq!(store.block_count(), 4);
        assert_eq!(store.size_bytes(), 4 * Block::size());
    }

    #[test]
    fn test_write_then_read() {
        let mut store = MemoryBlockStore::new();
        let id = store.allocate_block().unwrap();

        let mut block = Block::new();
        block.as_mut_slice()[17] = 0x99;
        store.write_block(id, &block).unwrap();

        assert_eq!(store.read_block(id).unwrap().as_slice()[17], 0x99);
        assert_eq!(store.block(id).unwrap().as_slice()[17], 0x99);
    }

    #[test]
    fn test_unallocated_ids_fail() {
        let mut store = MemoryBlockStore::new();
        assert!(matches!(
            store.read_block(BlockId::new(0)),
            Err(Error::BlockNotFound(_))
        ));
        assert!(matches!(
            store.write_block(BlockId::new(0), &Block::new()),
            Err(Error::BlockNotFound(_))
        ));
    }
}
