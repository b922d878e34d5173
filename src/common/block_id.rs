//! Block identifier type.

use std::fmt;

use crate::common::config::BLOCK_SIZE;

/// Identifies a fixed-size block in a block store.
///
/// Using `u32` allows for 4 billion blocks; `u32::MAX` is reserved as the
/// "no block" sentinel, which reads as `-1` when viewed as a signed integer
/// (the on-disk convention for an empty tree or an unlinked leaf).
///
/// Block 0 is always the tree header.
///
/// # Example
/// ```
/// use zipindex::BlockId;
///
/// let block = BlockId::new(42);
/// assert!(block.is_valid());
/// assert_eq!(block.0, 42);
/// assert!(!BlockId::INVALID.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// Invalid/sentinel block ID.
    ///
    /// Used for "no root", "no next leaf" and "no previous leaf".
    pub const INVALID: BlockId = BlockId(u32::MAX);

    /// The block reserved for the tree header.
    pub const HEADER: BlockId = BlockId(0);

    /// Create a new BlockId.
    #[inline]
    pub fn new(id: u32) -> Self {
        BlockId(id)
    }

    /// Check if this block ID is valid (not the sentinel value).
    #[inline]
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Byte offset of this block in a flat block file.
    #[inline]
    pub fn offset(&self) -> u64 {
        (self.0 as u64) * (BLOCK_SIZE as u64)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "Block(NONE)")
        } else {
            write!(f, "Block({})", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_new() {
        let id = BlockId::new(42);
        assert_eq!(id.0, 42);
        assert!(id.is_valid());
    }

    #[test]
    fn test_block_id_invalid() {
        assert!(!BlockId::INVALID.is_valid());
        assert_eq!(BlockId::INVALID.0 as i32, -1);
    }

    #[test]
    fn test_block_id_offset() {
        assert_eq!(BlockId::HEADER.offset(), 0);
        assert_eq!(BlockId::new(3).offset(), 3 * BLOCK_SIZE as u64);
    }

    #[test]
    fn test_block_id_display() {
        assert_eq!(format!("{}", BlockId::new(42)), "Block(42)");
        assert_eq!(format!("{}", BlockId::INVALID), "Block(NONE)");
    }
}
