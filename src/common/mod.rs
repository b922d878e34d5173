//! Common types and utilities shared across zipindex.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and [`TreeConfig`](config::TreeConfig)
//! - Error types
//! - Identifiers ([`BlockId`]) and the index [`Key`] type

pub mod config;
pub mod error;
mod block_id;

pub use block_id::BlockId;
pub use error::{Error, Result};

/// Integer key the index is ordered by (a ZIP code for postal records).
pub type Key = i32;
