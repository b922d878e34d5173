//! Block codec - packs tree headers and nodes into fixed-size blocks.
//!
//! Pure and stateless. Every pack starts from a zeroed block, so unused tail
//! space is deterministic and two equal nodes always produce identical bytes.
//!
//! # Header block (block 0)
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       9     BlockHeader (tag 'H', checksum, self_id = 0)
//! 9       4     block_size
//! 13      4     degree
//! 17      4     root          (u32::MAX = empty tree, i.e. -1)
//! 21      4     first_leaf
//! 25      4     last_leaf
//! 29      8     record_count
//! 37      4     height
//! ```
//!
//! # Index block
//! ```text
//! 0       9     BlockHeader (tag 'I')
//! 9       2     key_count
//! 11      8×N   entries: largest_key (i32), child (u32)
//! ```
//!
//! # Leaf block
//! ```text
//! 0       9     BlockHeader (tag 'L')
//! 9       4     prev
//! 13      4     next
//! 17      2     record_count
//! 19      102×N records (see PostalRecord)
//! ```
//!
//! Unpacking dispatches on the tag it finds; callers that expect a specific
//! node kind check the returned variant themselves.

use crate::common::config::{
    BLOCK_SIZE, INDEX_ENTRY_SIZE, INDEX_NODE_OVERHEAD, LEAF_NODE_OVERHEAD, MAX_INDEX_ENTRIES,
    MAX_LEAF_RECORDS,
};
use crate::common::{BlockId, Error, Result};
use crate::index::meta::TreeMeta;
use crate::index::node::{IndexEntry, InternalNode, LeafNode, Node};
use crate::record::PostalRecord;
use crate::storage::block::{Block, BlockHeader, BlockType};

const HEADER_OFFSET_BLOCK_SIZE: usize = BlockHeader::SIZE;
const HEADER_OFFSET_DEGREE: usize = HEADER_OFFSET_BLOCK_SIZE + 4;
const HEADER_OFFSET_ROOT: usize = HEADER_OFFSET_DEGREE + 4;
const HEADER_OFFSET_FIRST_LEAF: usize = HEADER_OFFSET_ROOT + 4;
const HEADER_OFFSET_LAST_LEAF: usize = HEADER_OFFSET_FIRST_LEAF + 4;
const HEADER_OFFSET_RECORD_COUNT: usize = HEADER_OFFSET_LAST_LEAF + 4;
const HEADER_OFFSET_HEIGHT: usize = HEADER_OFFSET_RECORD_COUNT + 8;

const INDEX_OFFSET_COUNT: usize = BlockHeader::SIZE;

const LEAF_OFFSET_PREV: usize = BlockHeader::SIZE;
const LEAF_OFFSET_NEXT: usize = LEAF_OFFSET_PREV + 4;
const LEAF_OFFSET_COUNT: usize = LEAF_OFFSET_NEXT + 4;

/// Pack the tree header into a block destined for block 0.
pub fn pack_header(meta: &TreeMeta) -> Block {
    let mut block = Block::new();
    block.set_header(&BlockHeader::new(BlockType::Header, BlockId::HEADER));

    block.write_u32(HEADER_OFFSET_BLOCK_SIZE, meta.block_size);
    block.write_u32(HEADER_OFFSET_DEGREE, meta.degree);
    block.write_u32(HEADER_OFFSET_ROOT, meta.root.0);
    block.write_u32(HEADER_OFFSET_FIRST_LEAF, meta.first_leaf.0);
    block.write_u32(HEADER_OFFSET_LAST_LEAF, meta.last_leaf.0);
    block.write_u64(HEADER_OFFSET_RECORD_COUNT, meta.record_count);
    block.write_u32(HEADER_OFFSET_HEIGHT, meta.height);

    block.update_checksum();
    block
}

/// Unpack block 0.
///
/// Returns `None` for a never-written (all-zero) header block.
///
/// # Errors
/// `Error::CorruptBlock` for a wrong tag, bad checksum, or a block size that
/// differs from [`BLOCK_SIZE`].
pub fn unpack_header(block: &Block) -> Result<Option<TreeMeta>> {
    let id = BlockId::HEADER;
    let header = block.header();
    match header.block_type() {
        Some(BlockType::Header) => {}
        Some(BlockType::Unused) if block.is_zeroed() => return Ok(None),
        _ => {
            return Err(Error::corrupt(
                id,
                format!("expected tree header, found tag {:#04x}", header.tag),
            ))
        }
    }
    verify(id, block, &header)?;

    let block_size = block.read_u32(HEADER_OFFSET_BLOCK_SIZE);
    if block_size as usize != BLOCK_SIZE {
        return Err(Error::corrupt(
            id,
            format!("header block size {} does not match {}", block_size, BLOCK_SIZE),
        ));
    }

    Ok(Some(TreeMeta {
        block_size,
        degree: block.read_u32(HEADER_OFFSET_DEGREE),
        root: BlockId::new(block.read_u32(HEADER_OFFSET_ROOT)),
        first_leaf: BlockId::new(block.read_u32(HEADER_OFFSET_FIRST_LEAF)),
        last_leaf: BlockId::new(block.read_u32(HEADER_OFFSET_LAST_LEAF)),
        record_count: block.read_u64(HEADER_OFFSET_RECORD_COUNT),
        height: block.read_u32(HEADER_OFFSET_HEIGHT),
    }))
}

/// Pack a node into a block destined for `id`.
///
/// # Errors
/// `Error::Overflow` if the node has more entries than its block kind holds.
pub fn pack_node(id: BlockId, node: &Node) -> Result<Block> {
    let mut block = Block::new();
    match node {
        Node::Internal(internal) => {
            check_capacity(internal.entries.len(), MAX_INDEX_ENTRIES)?;
            block.set_header(&BlockHeader::new(BlockType::Index, id));
            block.write_u16(INDEX_OFFSET_COUNT, internal.entries.len() as u16);
            for (i, entry) in internal.entries.iter().enumerate() {
                let offset = INDEX_NODE_OVERHEAD + i * INDEX_ENTRY_SIZE;
                block.write_i32(offset, entry.largest_key);
                block.write_u32(offset + 4, entry.child.0);
            }
        }
        Node::Leaf(leaf) => {
            check_capacity(leaf.records.len(), MAX_LEAF_RECORDS)?;
            block.set_header(&BlockHeader::new(BlockType::Leaf, id));
            block.write_u32(LEAF_OFFSET_PREV, leaf.prev.0);
            block.write_u32(LEAF_OFFSET_NEXT, leaf.next.0);
            block.write_u16(LEAF_OFFSET_COUNT, leaf.records.len() as u16);
            for (i, record) in leaf.records.iter().enumerate() {
                let offset = LEAF_NODE_OVERHEAD + i * PostalRecord::ENCODED_SIZE;
                record.encode_into(
                    &mut block.as_mut_slice()[offset..offset + PostalRecord::ENCODED_SIZE],
                );
            }
        }
    }
    block.update_checksum();
    Ok(block)
}

/// Unpack the node stored at `id`.
///
/// # Errors
/// `Error::CorruptBlock` if the block is unused, is the tree header, carries
/// an unknown tag, fails its checksum, names a different address, or claims
/// more entries than fit.
pub fn unpack_node(id: BlockId, block: &Block) -> Result<Node> {
    let header = block.header();
    match header.block_type() {
        Some(BlockType::Index) => {
            verify(id, block, &header)?;
            let count = block.read_u16(INDEX_OFFSET_COUNT) as usize;
            check_count(id, count, MAX_INDEX_ENTRIES)?;
            let entries = (0..count)
                .map(|i| {
                    let offset = INDEX_NODE_OVERHEAD + i * INDEX_ENTRY_SIZE;
                    IndexEntry {
                        largest_key: block.read_i32(offset),
                        child: BlockId::new(block.read_u32(offset + 4)),
                    }
                })
                .collect();
            Ok(Node::Internal(InternalNode { entries }))
        }
        Some(BlockType::Leaf) => {
            verify(id, block, &header)?;
            let count = block.read_u16(LEAF_OFFSET_COUNT) as usize;
            check_count(id, count, MAX_LEAF_RECORDS)?;
            let records = (0..count)
                .map(|i| {
                    let offset = LEAF_NODE_OVERHEAD + i * PostalRecord::ENCODED_SIZE;
                    let end = offset + PostalRecord::ENCODED_SIZE;
                    PostalRecord::decode(&block.as_slice()[offset..end])
                })
                .collect();
            Ok(Node::Leaf(LeafNode {
                prev: BlockId::new(block.read_u32(LEAF_OFFSET_PREV)),
                next: BlockId::new(block.read_u32(LEAF_OFFSET_NEXT)),
                records,
            }))
        }
        Some(BlockType::Unused) => {
            Err(Error::corrupt(id, "expected a node, found an unused block"))
        }
        Some(BlockType::Header) => {
            Err(Error::corrupt(id, "expected a node, found the tree header"))
        }
        None => Err(Error::corrupt(
            id,
            format!("unknown block tag {:#04x}", header.tag),
        )),
    }
}

fn verify(id: BlockId, block: &Block, header: &BlockHeader) -> Result<()> {
    if !header.verify_checksum(block.as_slice()) {
        tracing::warn!(block = %id, "checksum mismatch");
        return Err(Error::corrupt(id, "checksum mismatch"));
    }
    if header.self_id != id {
        return Err(Error::corrupt(
            id,
            format!("block claims to be {}", header.self_id),
        ));
    }
    Ok(())
}

fn check_capacity(requested: usize, capacity: usize) -> Result<()> {
    if requested > capacity {
        return Err(Error::Overflow { requested, capacity });
    }
    Ok(())
}

fn check_count(id: BlockId, count: usize, capacity: usize) -> Result<()> {
    if count > capacity {
        return Err(Error::corrupt(
            id,
            format!("entry count {} exceeds capacity {}", count, capacity),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_leaf() -> Node {
        Node::Leaf(LeafNode {
            prev: BlockId::new(3),
            next: BlockId::INVALID,
            records: vec![
                PostalRecord::new(501, "Holtsville", "NY", "Suffolk", 40.8154, -73.0451),
                PostalRecord::new(544, "Holtsville", "NY", "Suffolk", 40.8154, -73.0451),
                PostalRecord::keyed(601),
            ],
        })
    }

    fn sample_index() -> Node {
        Node::Internal(InternalNode {
            entries: vec![
                IndexEntry {
                    largest_key: -5,
                    child: BlockId::new(2),
                },
                IndexEntry {
                    largest_key: 17,
                    child: BlockId::new(9),
                },
            ],
        })
    }

    #[test]
    fn test_header_roundtrip() {
        let meta = TreeMeta {
            block_size: BLOCK_SIZE as u32,
            degree: 20,
            root: BlockId::new(4),
            first_leaf: BlockId::new(1),
            last_leaf: BlockId::new(7),
            record_count: 42,
            height: 2,
        };
        let block = pack_header(&meta);
        assert_eq!(block.header().block_type(), Some(BlockType::Header));
        assert_eq!(unpack_header(&block).unwrap(), Some(meta));
    }

    #[test]
    fn test_empty_header_encodes_root_as_minus_one() {
        let block = pack_header(&TreeMeta::empty(2));
        assert_eq!(block.read_i32(HEADER_OFFSET_ROOT), -1);
        assert!(unpack_header(&block).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_zeroed_header_is_fresh() {
        assert_eq!(unpack_header(&Block::new()).unwrap(), None);
    }

    #[test]
    fn test_header_block_size_mismatch() {
        let mut meta = TreeMeta::empty(2);
        meta.block_size = 512;
        let block = pack_header(&meta);
        assert!(matches!(unpack_header(&block), Err(Error::CorruptBlock { .. })));
    }

    #[test]
    fn test_node_roundtrip() {
        let id = BlockId::new(5);
        for node in [sample_leaf(), sample_index()] {
            let block = pack_node(id, &node).unwrap();
            assert_eq!(unpack_node(id, &block).unwrap(), node);
        }
    }

    #[test]
    fn test_pack_is_deterministic() {
        let id = BlockId::new(5);
        let a = pack_node(id, &sample_leaf()).unwrap();
        let b = pack_node(id, &sample_leaf()).unwrap();
        assert_eq!(a.as_slice(), b.as_slice());

        // Tail past the last record stays zero.
        let tail = LEAF_NODE_OVERHEAD + 3 * PostalRecord::ENCODED_SIZE;
        assert!(a.as_slice()[tail..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_unpack_detects_wrong_address() {
        let block = pack_node(BlockId::new(5), &sample_index()).unwrap();
        let err = unpack_node(BlockId::new(6), &block).unwrap_err();
        assert!(matches!(err, Error::CorruptBlock { .. }));
    }

    #[test]
    fn test_unpack_detects_bit_flip() {
        let mut block = pack_node(BlockId::new(5), &sample_leaf()).unwrap();
        block.as_mut_slice()[LEAF_NODE_OVERHEAD + 10] ^= 0x01;
        assert!(matches!(
            unpack_node(BlockId::new(5), &block),
            Err(Error::CorruptBlock { .. })
        ));
    }

    #[test]
    fn test_unpack_rejects_non_nodes() {
        assert!(matches!(
            unpack_node(BlockId::new(1), &Block::new()),
            Err(Error::CorruptBlock { .. })
        ));
        let header = pack_header(&TreeMeta::empty(2));
        assert!(matches!(
            unpack_node(BlockId::HEADER, &header),
            Err(Error::CorruptBlock { .. })
        ));

        let mut junk = Block::new();
        junk.as_mut_slice()[0] = b'Z';
        assert!(matches!(
            unpack_node(BlockId::new(1), &junk),
            Err(Error::CorruptBlock { .. })
        ));
    }

    #[test]
    fn test_pack_rejects_overfull_nodes() {
        let leaf = Node::Leaf(LeafNode::new(
            (0..=MAX_LEAF_RECORDS as i32).map(PostalRecord::keyed).collect(),
        ));
        assert!(matches!(
            pack_node(BlockId::new(1), &leaf),
            Err(Error::Overflow { capacity, .. }) if capacity == MAX_LEAF_RECORDS
        ));

        let full = Node::Leaf(LeafNode::new(
            (0..MAX_LEAF_RECORDS as i32).map(PostalRecord::keyed).collect(),
        ));
        let block = pack_node(BlockId::new(1), &full).unwrap();
        assert_eq!(unpack_node(BlockId::new(1), &block).unwrap(), full);
    }
}
