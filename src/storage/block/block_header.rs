//! Block header and type definitions.
//!
//! Every tagged block starts with a [`BlockHeader`]:
//! - [`BlockType`] discriminator
//! - CRC32 checksum for integrity
//! - The block's own address, for self-validation

use crate::common::BlockId;

/// Type of block stored in a block store.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation. The tags are
/// printable so a hex dump of a tree file is easy to read.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// Never written, or released by a merge.
    #[default]
    Unused = 0,
    /// Tree header (block 0).
    Header = b'H',
    /// B+tree index (internal) node.
    Index = b'I',
    /// B+tree leaf node.
    Leaf = b'L',
}

impl BlockType {
    /// Convert from u8, returning `None` for unknown tags.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BlockType::Unused),
            b'H' => Some(BlockType::Header),
            b'I' => Some(BlockType::Index),
            b'L' => Some(BlockType::Leaf),
            _ => None,
        }
    }
}

/// Metadata stored at the beginning of every tagged block.
///
/// # Layout (9 bytes)
/// ```text
/// Offset  Size  Field
/// ------  ----  -----
/// 0       1     block_type (tag byte)
/// 1       4     checksum (CRC32, little-endian)
/// 5       4     self_id (BlockId, little-endian)
/// ```
///
/// # Checksum
/// The checksum is computed over the entire block with the checksum field
/// itself set to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Raw tag byte; see [`BlockHeader::block_type`].
    pub tag: u8,
    /// CRC32 checksum of the block contents.
    pub checksum: u32,
    /// Address this block was written to.
    pub self_id: BlockId,
}

impl BlockHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = 9;

    /// Offset of each field within the header.
    pub const OFFSET_TAG: usize = 0;
    pub const OFFSET_CHECKSUM: usize = 1;
    pub const OFFSET_SELF_ID: usize = 5;

    /// Create a new header for a block of the given type.
    ///
    /// The checksum is initialized to zero.
    pub fn new(block_type: BlockType, self_id: BlockId) -> Self {
        Self {
            tag: block_type as u8,
            checksum: 0,
            self_id,
        }
    }

    /// Decoded tag, or `None` for an unknown byte.
    pub fn block_type(&self) -> Option<BlockType> {
        BlockType::from_u8(self.tag)
    }

    /// Read a header from the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < BlockHeader::SIZE`.
    pub fn from_bytes(data: &[u8]) -> Self {
        assert!(data.len() >= Self::SIZE, "buffer too small for BlockHeader");

        let checksum = u32::from_le_bytes([
            data[Self::OFFSET_CHECKSUM],
            data[Self::OFFSET_CHECKSUM + 1],
            data[Self::OFFSET_CHECKSUM + 2],
            data[Self::OFFSET_CHECKSUM + 3],
        ]);

        let self_id = u32::from_le_bytes([
            data[Self::OFFSET_SELF_ID],
            data[Self::OFFSET_SELF_ID + 1],
            data[Self::OFFSET_SELF_ID + 2],
            data[Self::OFFSET_SELF_ID + 3],
        ]);

        Self {
            tag: data[Self::OFFSET_TAG],
            checksum,
            self_id: BlockId::new(self_id),
        }
    }

    /// Write this header to the beginning of a byte slice.
    ///
    /// # Panics
    /// Panics if `data.len() < BlockHeader::SIZE`.
    pub fn write_to(&self, data: &mut [u8]) {
        assert!(data.len() >= Self::SIZE, "buffer too small for BlockHeader");

        data[Self::OFFSET_TAG] = self.tag;
        data[Self::OFFSET_CHECKSUM..Self::OFFSET_CHECKSUM + 4]
            .copy_from_slice(&self.checksum.to_le_bytes());
        data[Self::OFFSET_SELF_ID..Self::OFFSET_SELF_ID + 4]
            .copy_from_slice(&self.self_id.0.to_le_bytes());
    }

    /// Compute CRC32 checksum of a block.
    ///
    /// The checksum field (bytes 1-4) is hashed as zeros, so the checksum
    /// doesn't include itself.
    pub fn compute_checksum(block_data: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&block_data[..Self::OFFSET_CHECKSUM]);
        hasher.update(&[0u8; 4]);
        hasher.update(&block_data[Self::OFFSET_CHECKSUM + 4..]);
        hasher.finalize()
    }

    /// Verify that the stored checksum matches the computed checksum.
    pub fn verify_checksum(&self, block_data: &[u8]) -> bool {
        self.checksum == Self::compute_checksum(block_data)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::BLOCK_SIZE;

    #[test]
    fn test_block_type_from_u8() {
        assert_eq!(BlockType::from_u8(0), Some(BlockType::Unused));
        assert_eq!(BlockType::from_u8(b'H'), Some(BlockType::Header));
        assert_eq!(BlockType::from_u8(b'I'), Some(BlockType::Index));
        assert_eq!(BlockType::from_u8(b'L'), Some(BlockType::Leaf));
        assert_eq!(BlockType::from_u8(1), None);
        assert_eq!(BlockType::from_u8(255), None);
    }

    #[test]
    fn test_block_header_roundtrip() {
        let original = BlockHeader {
            tag: BlockType::Index as u8,
            checksum: 0xDEADBEEF,
            self_id: BlockId::new(0x01020304),
        };

        let mut buffer = [0u8; BlockHeader::SIZE];
        original.write_to(&mut buffer);

        let recovered = BlockHeader::from_bytes(&buffer);
        assert_eq!(original, recovered);
        assert_eq!(recovered.block_type(), Some(BlockType::Index));
    }

    #[test]
    fn test_block_header_byte_layout() {
        let header = BlockHeader {
            tag: BlockType::Leaf as u8,
            checksum: 0x04030201,
            self_id: BlockId::new(0x08070605),
        };

        let mut buffer = [0u8; BlockHeader::SIZE];
        header.write_to(&mut buffer);

        assert_eq!(buffer[0], b'L');
        assert_eq!(buffer[1], 0x01);
        assert_eq!(buffer[4], 0x04);
        assert_eq!(buffer[5], 0x05);
        assert_eq!(buffer[8], 0x08);
    }

    #[test]
    fn test_checksum_ignores_checksum_field() {
        let mut block_data = [0u8; BLOCK_SIZE];
        block_data[100] = 0xAB;

        let checksum1 = BlockHeader::compute_checksum(&block_data);
        block_data[1..5].copy_from_slice(&[0xFF; 4]);
        let checksum2 = BlockHeader::compute_checksum(&block_data);

        assert_eq!(checksum1, checksum2);
    }

    #[test]
    fn test_checksum_covers_self_id() {
        let mut block_data = [0u8; BLOCK_SIZE];
        let before = BlockHeader::compute_checksum(&block_data);
        block_data[BlockHeader::OFFSET_SELF_ID] = 1;
        assert_ne!(before, BlockHeader::compute_checksum(&block_data));
    }
}
