//! Block types and layout.
//!
//! This module contains:
//! - [`Block`] - The raw 4KB data container
//! - [`BlockHeader`] - Tag, checksum and self address at the start of every
//!   tagged block
//! - [`BlockType`] - Discriminator for the different block formats

#[allow(clippy::module_inception)]
mod block;
mod block_header;

pub use block::Block;
pub use block_header::{BlockHeader, BlockType};
