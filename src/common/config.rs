//! Configuration constants for zipindex.
//!
//! Everything about the on-disk layout is derived from [`BLOCK_SIZE`]; only
//! the tree degree is chosen at runtime, through [`TreeConfig`].

use crate::common::{Error, Result};
use crate::record::PostalRecord;
use crate::storage::block::BlockHeader;

/// Size of a block in bytes (4KB).
///
/// Shared by the header block and every node block. Written into the tree
/// header and checked when a tree is reopened.
pub const BLOCK_SIZE: usize = 4096;

/// Size of one `(largest_key, child)` index entry.
pub const INDEX_ENTRY_SIZE: usize = 8;

/// Fixed overhead of an index block: block header + key count.
pub const INDEX_NODE_OVERHEAD: usize = BlockHeader::SIZE + 2;

/// Fixed overhead of a leaf block: block header + prev + next + record count.
pub const LEAF_NODE_OVERHEAD: usize = BlockHeader::SIZE + 4 + 4 + 2;

/// Maximum entries an index block can hold.
pub const MAX_INDEX_ENTRIES: usize = (BLOCK_SIZE - INDEX_NODE_OVERHEAD) / INDEX_ENTRY_SIZE;

/// Maximum records a leaf block can hold.
pub const MAX_LEAF_RECORDS: usize = (BLOCK_SIZE - LEAF_NODE_OVERHEAD) / PostalRecord::ENCODED_SIZE;

/// Maximum entries any node kind can hold; bounds `2t-1`.
pub const MAX_NODE_ENTRIES: usize = if MAX_INDEX_ENTRIES < MAX_LEAF_RECORDS {
    MAX_INDEX_ENTRIES
} else {
    MAX_LEAF_RECORDS
};

/// The largest degree whose `2t-1` fits in every block kind.
pub const DEFAULT_DEGREE: usize = max_degree_for(MAX_NODE_ENTRIES);

/// Largest degree the tree header can record.
pub const MAX_DEGREE: usize = u32::MAX as usize;

/// Largest `t` such that `2t-1 <= max_entries`.
pub const fn max_degree_for(max_entries: usize) -> usize {
    max_entries / 2 + max_entries % 2
}

/// Runtime tree options.
///
/// # Example
/// ```
/// use zipindex::{TreeConfig, DEFAULT_DEGREE};
///
/// let config = TreeConfig::new();
/// assert_eq!(config.degree, None);
///
/// let config = TreeConfig::new().with_degree(3);
/// assert_eq!(config.degree, Some(3));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeConfig {
    /// Minimum degree `t`. `None` keeps the degree stored in an existing
    /// tree, or derives it from the block size for a fresh one.
    pub degree: Option<usize>,
}

impl TreeConfig {
    /// Default configuration: degree derived from the block size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an explicit minimum degree.
    pub fn with_degree(mut self, degree: usize) -> Self {
        self.degree = Some(degree);
        self
    }

    /// Pick the degree for a tree whose nodes hold at most `max_entries`.
    ///
    /// # Errors
    /// - `Error::DegreeMismatch` if `stored` and the requested degree differ
    /// - `Error::InvalidDegree` if `t < 2`, `2t-1 > max_entries`, or `t`
    ///   exceeds [`MAX_DEGREE`]
    pub fn resolve(&self, stored: Option<usize>, max_entries: usize) -> Result<usize> {
        let degree = match (self.degree, stored) {
            (Some(requested), Some(stored)) if requested != stored => {
                return Err(Error::DegreeMismatch { stored, requested });
            }
            (Some(degree), _) | (None, Some(degree)) => degree,
            (None, None) => DEFAULT_DEGREE.min(max_degree_for(max_entries)),
        };

        let max = max_degree_for(max_entries).min(MAX_DEGREE);
        if degree < 2 || degree > max {
            return Err(Error::InvalidDegree { degree, max });
        }
        Ok(degree)
    }
}
