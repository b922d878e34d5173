//! zipindex - a block-paged B+tree over integer keys.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            zipindex                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Tree Handle (index/btree)                   │   │
//! │  │   BPlusTree: header bookkeeping + public operations      │   │
//! │  │   search | range | insert | delete | bulk build          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Node Store (index/node_store)                  │   │
//! │  │     MemoryNodeStore (arena)  ←─OR─→  BlockNodeStore      │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Block Codec (index/codec)                      │   │
//! │  │     header | index node | leaf node  ⇄  4KB frames       │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Block Store (storage/)                         │   │
//! │  │     FileBlockStore | MemoryBlockStore + Block + header   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (BlockId, Key, Error, config)
//! - [`storage`] - Block I/O and the raw block format
//! - [`index`] - Nodes, codec, node stores and the B+tree itself
//! - [`record`] - The fixed-width postal record carried in leaves
//!
//! # Quick Start
//! ```
//! use zipindex::{BPlusTree, PostalRecord, TreeConfig};
//!
//! let mut tree = BPlusTree::in_memory(TreeConfig::new().with_degree(2)).unwrap();
//! for zip in [10, 20, 5, 6, 12, 30, 7, 17] {
//!     tree.insert(PostalRecord::keyed(zip)).unwrap();
//! }
//!
//! assert!(tree.contains(6).unwrap());
//! let keys: Vec<i32> = tree
//!     .range_query(6, 17)
//!     .unwrap()
//!     .iter()
//!     .map(|r| r.zip())
//!     .collect();
//! assert_eq!(keys, vec![6, 7, 10, 12, 17]);
//! ```

pub mod common;
pub mod index;
pub mod record;
pub mod storage;

pub use common::config::{TreeConfig, BLOCK_SIZE, DEFAULT_DEGREE};
pub use common::{BlockId, Error, Key, Result};

pub use index::btree::{BPlusTree, FileTree, LeafSummary, MemoryTree, RangeScan, TreeStats};
pub use index::{BlockNodeStore, MemoryNodeStore, Node, NodeStore, TreeMeta};
pub use record::PostalRecord;
pub use storage::{BlockStore, FileBlockStore, MemoryBlockStore};
