//! Block boundaries along one axis.

use std::ops::Range;

use crate::error::{BlockMatrixError, Result};

/// Sizes and cumulative offsets of the blocks along one axis of a block grid.
///
/// For block sizes `[3, 4]` the offsets are `[0, 3, 7]` and the total size
/// is 7. Offsets are non-decreasing, and strictly increasing whenever every
/// block is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockIndexing {
    sizes: Vec<usize>,
    /// `[0, s0, s0+s1, ..., total]`
    offsets: Vec<usize>,
}

impl Default for BlockIndexing {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockIndexing {
    /// Create an indexing with no blocks.
    pub fn new() -> Self {
        Self {
            sizes: Vec::new(),
            offsets: vec![0],
        }
    }

    /// Create an indexing with `n_blocks` blocks of `default_size` each.
    pub fn uniform(n_blocks: usize, default_size: usize) -> Self {
        let mut indexing = Self::new();
        indexing.reset(n_blocks, default_size);
        indexing
    }

    /// Create an indexing from explicit block sizes.
    pub fn from_sizes(sizes: &[usize]) -> Result<Self> {
        let mut indexing = Self::new();
        indexing.reset_sizes(sizes)?;
        Ok(indexing)
    }

    /// Discard prior state and allocate `n_blocks` blocks of `default_size`.
    ///
    /// A `default_size` of 0 marks the sizes as still to be computed.
    pub fn reset(&mut self, n_blocks: usize, default_size: usize) {
        self.sizes = vec![default_size; n_blocks];
        self.rebuild_offsets();
    }

    /// Discard prior state and take one size per block from `sizes`.
    ///
    /// Fails with [`BlockMatrixError::InvalidSize`] if `sizes` is empty.
    pub fn reset_sizes(&mut self, sizes: &[usize]) -> Result<()> {
        if sizes.is_empty() {
            return Err(BlockMatrixError::InvalidSize(
                "block size sequence must not be empty".to_string(),
            ));
        }
        self.sizes = sizes.to_vec();
        self.rebuild_offsets();
        Ok(())
    }

    fn rebuild_offsets(&mut self) {
        self.offsets.clear();
        self.offsets.reserve(self.sizes.len() + 1);
        self.offsets.push(0);
        let mut cumsum = 0;
        for &size in &self.sizes {
            cumsum += size;
            self.offsets.push(cumsum);
        }
    }

    fn check(&self, index: usize) -> Result<()> {
        if index >= self.sizes.len() {
            return Err(BlockMatrixError::IndexOutOfRange {
                index: vec![index],
                shape: vec![self.sizes.len()],
            });
        }
        Ok(())
    }

    /// Number of blocks.
    #[inline]
    pub fn block_count(&self) -> usize {
        self.sizes.len()
    }

    /// Sum of all block sizes.
    #[inline]
    pub fn total_size(&self) -> usize {
        *self.offsets.last().unwrap_or(&0)
    }

    /// Size of block `index`.
    pub fn size_of(&self, index: usize) -> Result<usize> {
        self.check(index)?;
        Ok(self.sizes[index])
    }

    /// First global position of block `index`.
    pub fn offset_of(&self, index: usize) -> Result<usize> {
        self.check(index)?;
        Ok(self.offsets[index])
    }

    /// Global positions covered by block `index`.
    pub fn range_of(&self, index: usize) -> Result<Range<usize>> {
        self.check(index)?;
        Ok(self.offsets[index]..self.offsets[index + 1])
    }

    /// Map a global position to `(block, position within block)`.
    pub fn global_to_local(&self, global: usize) -> Result<(usize, usize)> {
        if global >= self.total_size() {
            return Err(BlockMatrixError::IndexOutOfRange {
                index: vec![global],
                shape: vec![self.total_size()],
            });
        }
        // Last block whose offset is <= global; skips empty blocks sharing the offset.
        let block = self.offsets.partition_point(|&o| o <= global) - 1;
        Ok((block, global - self.offsets[block]))
    }

    /// Block sizes.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Cumulative offsets, one more than the number of blocks.
    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }
}
