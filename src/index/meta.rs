//! The persistent tree header.

use crate::common::config::BLOCK_SIZE;
use crate::common::BlockId;

/// Tree-wide metadata persisted in block 0.
///
/// `root == BlockId::INVALID` means the tree is empty; in that case the leaf
/// ends are INVALID and `record_count` and `height` are zero.
///
/// `height` counts index levels: a tree whose root is a leaf has height 0,
/// one index level over the leaves is height 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeMeta {
    pub block_size: u32,
    pub degree: u32,
    pub root: BlockId,
    pub first_leaf: BlockId,
    pub last_leaf: BlockId,
    pub record_count: u64,
    pub height: u32,
}

impl TreeMeta {
    /// Header of an empty tree with the given degree.
    pub fn empty(degree: u32) -> Self {
        Self {
            block_size: BLOCK_SIZE as u32,
            degree,
            root: BlockId::INVALID,
            first_leaf: BlockId::INVALID,
            last_leaf: BlockId::INVALID,
            record_count: 0,
            height: 0,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.root.is_valid()
    }

    /// Forget the tree's contents, keeping block size and degree.
    pub fn clear(&mut self) {
        *self = Self::empty(self.degree);
    }
}
