//! Storage layer - block I/O and the raw block format.
//!
//! This module handles persistent storage:
//! - [`BlockStore`] - The contract every block medium satisfies
//! - [`FileBlockStore`] - Blocks laid out sequentially in one file
//! - [`MemoryBlockStore`] - Blocks held in a heap buffer
//! - [`block`] - Block types and layouts

pub mod block;
mod block_store;
mod file_block_store;
mod memory_block_store;

pub use block_store::BlockStore;
pub use file_block_store::FileBlockStore;
pub use memory_block_store::MemoryBlockStore;
