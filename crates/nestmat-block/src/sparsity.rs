//! Sparsity patterns for a whole block grid.

use nestmat_backend::SparsityPattern;

/// An `n_block_rows × n_block_cols` grid of [`SparsityPattern`]s.
///
/// Built from per-row and per-column block sizes, so every block in a row
/// has the same number of rows and every block in a column the same number
/// of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSparsityPattern {
    row_sizes: Vec<usize>,
    col_sizes: Vec<usize>,
    /// Row-major.
    blocks: Vec<SparsityPattern>,
}

impl BlockSparsityPattern {
    /// Create empty patterns for the given block sizes.
    pub fn new(row_sizes: &[usize], col_sizes: &[usize]) -> Self {
        let blocks = row_sizes
            .iter()
            .flat_map(|&m| col_sizes.iter().map(move |&n| SparsityPattern::new(m, n)))
            .collect();
        Self {
            row_sizes: row_sizes.to_vec(),
            col_sizes: col_sizes.to_vec(),
            blocks,
        }
    }

    /// Number of block rows.
    pub fn n_block_rows(&self) -> usize {
        self.row_sizes.len()
    }

    /// Number of block columns.
    pub fn n_block_cols(&self) -> usize {
        self.col_sizes.len()
    }

    /// Pattern of block `(row, col)`.
    ///
    /// # Panics
    /// If the block index is out of range.
    pub fn block(&self, row: usize, col: usize) -> &SparsityPattern {
        assert!(row < self.n_block_rows() && col < self.n_block_cols());
        &self.blocks[row * self.n_block_cols() + col]
    }

    /// Mutable pattern of block `(row, col)`.
    ///
    /// # Panics
    /// If the block index is out of range.
    pub fn block_mut(&mut self, row: usize, col: usize) -> &mut SparsityPattern {
        assert!(row < self.n_block_rows() && col < self.n_block_cols());
        let n = self.n_block_cols();
        &mut self.blocks[row * n + col]
    }

    /// Total rows over all block rows.
    pub fn n_rows(&self) -> usize {
        self.row_sizes.iter().sum()
    }

    /// Total columns over all block columns.
    pub fn n_cols(&self) -> usize {
        self.col_sizes.iter().sum()
    }

    /// Nonzero entries over all blocks.
    pub fn n_nonzero_elements(&self) -> usize {
        self.blocks.iter().map(|b| b.n_nonzero_elements()).sum()
    }
}
