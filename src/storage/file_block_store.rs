//! File Block Store - low-level file I/O for tree blocks.
//!
//! The [`FileBlockStore`] handles all direct file operations:
//! - Reading and writing blocks
//! - Allocating new blocks
//! - Managing the tree file

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::common::config::BLOCK_SIZE;
use crate::common::{BlockId, Error, Result};
use crate::storage::block::Block;
use crate::storage::BlockStore;

/// Manages block I/O for a single tree file.
///
/// # File Layout
/// Blocks are laid out sequentially:
/// ```text
/// ┌──────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Block 0  │ Block 1 │ Block 2 │  ...    │ Block N │
/// │ (header) │ (node)  │ (node)  │         │ (node)  │
/// └──────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Block N is located at file offset `N × BLOCK_SIZE`.
///
/// # Thread Safety
/// `FileBlockStore` is **single-threaded**. The tree that owns it is the only
/// writer.
///
/// # Durability
/// By default every write and allocation is followed by `fsync()`.
/// [`FileBlockStore::without_fsync`] turns that off for bulk work; call
/// [`FileBlockStore::sync`] once at the end instead.
pub struct FileBlockStore {
    file: File,
    /// Number of blocks in the file.
    block_count: u32,
    sync_on_write: bool,
}

impl FileBlockStore {
    /// Create a new tree file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        tracing::debug!(path = %path.as_ref().display(), "created block file");
        Ok(Self {
            file,
            block_count: 0,
            sync_on_write: true,
        })
    }

    /// Open an existing tree file.
    ///
    /// A trailing partial block (from a torn append) is ignored.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;

        let file_size = file.metadata()?.len();
        let block_count = (file_size / BLOCK_SIZE as u64) as u32;
        if file_size % BLOCK_SIZE as u64 != 0 {
            tracing::warn!(
                path = %path.as_ref().display(),
                file_size,
                "block file has a trailing partial block"
            );
        }

        tracing::debug!(path = %path.as_ref().display(), block_count, "opened block file");
        Ok(Self {
            file,
            block_count,
            sync_on_write: true,
        })
    }

    /// Open an existing tree file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Skip the per-write `fsync()`.
    pub fn without_fsync(mut self) -> Self {
        self.sync_on_write = false;
        self
    }

    /// Flush all written blocks to the device.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Get the total size of the tree file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.block_count as u64) * (BLOCK_SIZE as u64)
    }

    fn check_allocated(&self, id: BlockId) -> Result<()> {
        if !id.is_valid() || id.0 >= self.block_count {
            return Err(Error::BlockNotFound(id));
        }
        Ok(())
    }
}

impl BlockStore for FileBlockStore {
    /// Read a block from disk.
    ///
    /// # Errors
    /// Returns `Error::BlockNotFound` if the block doesn't exist.
    fn read_block(&mut self, id: BlockId) -> Result<Block> {
        self.check_allocated(id)?;

        self.file.seek(SeekFrom::Start(id.offset()))?;
        let mut block = Block::new();
        self.file.read_exact(block.as_mut_slice())?;

        tracing::trace!(block = %id, "read block");
        Ok(block)
    }

    /// Write a block to disk.
    ///
    /// # Errors
    /// Returns `Error::BlockNotFound` if the block hasn't been allocated.
    fn write_block(&mut self, id: BlockId, block: &Block) -> Result<()> {
        self.check_allocated(id)?;

        self.file.seek(SeekFrom::Start(id.offset()))?;
        self.file.write_all(block.as_slice())?;
        if self.sync_on_write {
            self.file.sync_all()?;
        }

        tracing::trace!(block = %id, "wrote block");
        Ok(())
    }

    /// Allocate a new block at the end of the file.
    ///
    /// The block is initialized with zeros.
    fn allocate_block(&mut self) -> Result<BlockId> {
        // u32::MAX is the INVALID sentinel and can never be handed out.
        if self.block_count == u32::MAX {
            return Err(Error::Overflow {
                requested: self.block_count as usize + 1,
                capacity: u32::MAX as usize,
            });
        }
        let id = BlockId::new(self.block_count);

        self.file.seek(SeekFrom::Start(id.offset()))?;
        let zeros = [0u8; BLOCK_SIZE];
        self.file.write_all(&zeros)?;
        if self.sync_on_write {
            self.file.sync_all()?;
        }

        self.block_count += 1;
        tracing::trace!(block = %id, "allocated block");
        Ok(id)
    }

    #[inline]
    fn block_count(&self) -> u32 {
        self.block_count
    }
}
