//! Index layer - the B+tree and everything it is built from.
//!
//! - [`Node`] - Logical internal/leaf nodes
//! - [`codec`] - Packs nodes and the tree header into blocks
//! - [`NodeStore`] - Fetch/store nodes by address ([`MemoryNodeStore`],
//!   [`BlockNodeStore`])
//! - [`TreeMeta`] - The persistent tree header
//! - [`btree`] - The B+tree algorithm and its public handle

pub mod btree;
pub mod codec;
mod meta;
mod node;
mod node_store;

pub use meta::TreeMeta;
pub use node::{IndexEntry, InternalNode, LeafNode, Node};
pub use node_store::{BlockNodeStore, MemoryNodeStore, NodeStore};
