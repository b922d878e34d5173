//! Error types for zipindex.

use thiserror::Error;

use crate::common::{BlockId, Key};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in zipindex.
///
/// I/O and corruption errors are surfaced unmodified and never retried.
/// A failure in the middle of a mutating operation leaves the tree in an
/// undefined state; there is no rollback.
#[derive(Debug, Error)]
pub enum Error {
    /// The underlying medium could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested block lies beyond the allocated range of the store.
    #[error("{0} not found")]
    BlockNotFound(BlockId),

    /// A block's contents do not match what the caller expected: wrong tag,
    /// wrong self address, bad checksum, mismatched block size, or a
    /// structural inconsistency found while walking the tree.
    #[error("corrupt {block}: {reason}")]
    CorruptBlock { block: BlockId, reason: String },

    /// Delete of a key that is not present.
    ///
    /// Benign: callers usually treat this as a no-op.
    #[error("key {0} not found")]
    NotFound(Key),

    /// More entries than a node or a build strategy can hold.
    #[error("overflow: {requested} entries exceed capacity of {capacity}")]
    Overflow { requested: usize, capacity: usize },

    /// The configured degree cannot be laid out in a block.
    #[error("invalid degree {degree}: must be between 2 and {max}")]
    InvalidDegree { degree: usize, max: usize },

    /// A tree was reopened with a different degree than it was built with.
    #[error("degree mismatch: tree was built with {stored}, opened with {requested}")]
    DegreeMismatch { stored: usize, requested: usize },

    /// Bulk builds only target an empty tree.
    #[error("bulk build requires an empty tree")]
    TreeNotEmpty,

    /// Bulk input was not in ascending key order.
    #[error("input not in ascending key order: {next} follows {previous}")]
    UnsortedInput { previous: Key, next: Key },

    /// A record line could not be parsed.
    #[error("line {line}: {reason}")]
    ParseRecord { line: usize, reason: String },
}

impl Error {
    pub(crate) fn corrupt(block: BlockId, reason: impl Into<String>) -> Self {
        Error::CorruptBlock {
            block,
            reason: reason.into(),
        }
    }
}
