//! The block store contract.

use crate::common::{BlockId, Result};
use crate::storage::block::Block;

/// A medium of fixed-size, independently addressable blocks.
///
/// Implementations own no interpretation of block contents.
///
/// # Contract
/// - `allocate_block` returns a zero-filled block whose id is strictly greater
///   than every id returned before; ids are never reused.
/// - `read_block`/`write_block` fail with `Error::BlockNotFound` for ids that
///   were never allocated, and with `Error::Io` when the medium fails.
/// - No two live ids alias.
///
/// Stores are single-threaded; reads take `&mut self` because file-backed
/// stores move a cursor.
pub trait BlockStore {
    /// Read a block.
    fn read_block(&mut self, id: BlockId) -> Result<Block>;

    /// Overwrite a previously allocated block.
    fn write_block(&mut self, id: BlockId, block: &Block) -> Result<()>;

    /// Append a fresh zero-filled block and return its id.
    fn allocate_block(&mut self) -> Result<BlockId>;

    /// Number of allocated blocks (the next id to be handed out).
    fn block_count(&self) -> u32;
}
