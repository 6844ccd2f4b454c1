//! Dynamic sparsity patterns used to preallocate native matrices.

use std::collections::BTreeSet;

/// Set of structurally nonzero `(row, col)` positions of one matrix.
///
/// Rows are kept as ordered column sets so entries can be added in any
/// order and duplicates collapse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparsityPattern {
    n_cols: usize,
    rows: Vec<BTreeSet<usize>>,
}

impl SparsityPattern {
    /// Create an empty `n_rows × n_cols` pattern.
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_cols,
            rows: vec![BTreeSet::new(); n_rows],
        }
    }

    /// Create a pattern from a list of entries.
    ///
    /// # Panics
    /// If any entry lies outside `n_rows × n_cols`.
    pub fn from_entries(
        n_rows: usize,
        n_cols: usize,
        entries: impl IntoIterator<Item = (usize, usize)>,
    ) -> Self {
        let mut pattern = Self::new(n_rows, n_cols);
        for (row, col) in entries {
            pattern.add(row, col);
        }
        pattern
    }

    /// Mark `(row, col)` as nonzero.
    ///
    /// # Panics
    /// If the position lies outside the pattern.
    pub fn add(&mut self, row: usize, col: usize) {
        assert!(
            row < self.rows.len() && col < self.n_cols,
            "Entry ({}, {}) out of bounds for {}x{} pattern",
            row,
            col,
            self.rows.len(),
            self.n_cols
        );
        self.rows[row].insert(col);
    }

    /// Mark several columns of one row as nonzero.
    pub fn add_entries(&mut self, row: usize, cols: impl IntoIterator<Item = usize>) {
        for col in cols {
            self.add(row, col);
        }
    }

    /// Number of rows.
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// Whether `(row, col)` is nonzero.
    pub fn exists(&self, row: usize, col: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.contains(&col))
    }

    /// Number of nonzero entries in `row`.
    pub fn row_length(&self, row: usize) -> usize {
        self.rows[row].len()
    }

    /// Nonzero columns of `row`, ascending.
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = usize> + '_ {
        self.rows[row].iter().copied()
    }

    /// Total number of nonzero entries.
    pub fn n_nonzero_elements(&self) -> usize {
        self.rows.iter().map(|r| r.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_collapse() {
        let p = SparsityPattern::from_entries(3, 3, [(0, 0), (0, 0), (1, 2), (2, 1)]);
        assert_eq!(p.n_nonzero_elements(), 3);
        assert_eq!(p.row_length(0), 1);
        assert!(p.exists(1, 2));
        assert!(!p.exists(2, 2));
        assert!(!p.exists(5, 0));
    }

    #[test]
    fn test_row_entries_sorted() {
        let mut p = SparsityPattern::new(2, 5);
        p.add_entries(1, [4, 0, 2]);
        assert_eq!(p.row_entries(1).collect::<Vec<_>>(), vec![0, 2, 4]);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_add_out_of_bounds() {
        let mut p = SparsityPattern::new(2, 2);
        p.add(0, 2);
    }
}
