//! Composition of a block grid into one nested distributed matrix.
//!
//! [`BlockMatrixComposer`] owns an R×C grid of [`DistributedMatrixBlock`]s,
//! the [`BlockIndexing`] of both axes, and one [`NestedAggregate`] that
//! presents the grid to solvers as a single matrix. The aggregate is only
//! rebuilt by [`BlockMatrixComposer::synchronize`]; editing a block leaves
//! it stale until the next synchronization.
//!
//! Every operation that reaches the backend is collective: all processes of
//! the blocks' group must issue the same composer calls in the same order.

use std::fmt;
use std::mem;
use std::sync::Arc;

use nestmat_backend::{HandleKind, IndexSet, MatrixBackend, ProcessGroup};
use tracing::{debug, error, trace, warn};

use crate::aggregate::{AggregateView, NestedAggregate};
use crate::block::DistributedMatrixBlock;
use crate::error::{BlockMatrixError, Result};
use crate::indexing::BlockIndexing;
use crate::options::{ComposerOptions, SizeCheck};
use crate::placeholder::PlaceholderBlockFactory;
use crate::sparsity::BlockSparsityPattern;

/// Lifecycle state of a [`BlockMatrixComposer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerState {
    /// 0×0 grid, no aggregate.
    Empty,
    /// Grid allocated; cells may be unassigned and the aggregate, if any, is stale.
    Shaped,
    /// Every cell holds a block, sizes agree, and the aggregate reflects the grid.
    Consistent,
    /// A structural operation failed part-way. Only `reinit*` and `clear` are allowed.
    Invalid,
}

/// `(local, global)` size of one block row or column.
type AxisSizes = (usize, usize);

/// Owns a grid of distributed matrix blocks and their nested aggregate.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use nestmat_backend::{IndexSet, LocalBackend, ProcessGroup, SparsityPattern};
/// use nestmat_block::{BlockMatrixComposer, ComposerState, DistributedMatrixBlock};
///
/// let backend = Arc::new(LocalBackend::new());
/// let group = ProcessGroup::local();
/// let diag = |n: usize| {
///     DistributedMatrixBlock::from_partition(
///         &backend,
///         &IndexSet::complete(n),
///         &IndexSet::complete(n),
///         &SparsityPattern::from_entries(n, n, (0..n).map(|i| (i, i))),
///         &group,
///     )
///     .unwrap()
/// };
///
/// let mut composer = BlockMatrixComposer::new(backend.clone());
/// composer.reinit(2, 2).unwrap();
/// composer.set_block(0, 0, diag(3)).unwrap();
/// composer.set_block(1, 1, diag(4)).unwrap();
/// composer.synchronize().unwrap();
///
/// assert_eq!(composer.state(), ComposerState::Consistent);
/// assert_eq!(composer.global_row_count(), 7);
/// assert_eq!(composer.block(0, 1).unwrap().global_col_count(), 4);
/// assert_eq!(composer.total_nonzero_count().unwrap(), 7);
/// ```
pub struct BlockMatrixComposer<B: MatrixBackend> {
    backend: Arc<B>,
    options: ComposerOptions,
    aggregate: Option<NestedAggregate<B>>,
    /// Row-major, `n_block_rows * n_block_cols` cells.
    blocks: Vec<DistributedMatrixBlock<B>>,
    n_block_rows: usize,
    n_block_cols: usize,
    row_indexing: BlockIndexing,
    col_indexing: BlockIndexing,
    state: ComposerState,
}

impl<B: MatrixBackend> BlockMatrixComposer<B> {
    /// Create an empty composer with default options.
    pub fn new(backend: Arc<B>) -> Self {
        Self::with_options(backend, ComposerOptions::default())
    }

    /// Create an empty composer.
    pub fn with_options(backend: Arc<B>, options: ComposerOptions) -> Self {
        Self {
            backend,
            options,
            aggregate: None,
            blocks: Vec::new(),
            n_block_rows: 0,
            n_block_cols: 0,
            row_indexing: BlockIndexing::new(),
            col_indexing: BlockIndexing::new(),
            state: ComposerState::Empty,
        }
    }

    /// Create a composer by decomposing an existing native matrix.
    ///
    /// See [`reinit_from_native`](Self::reinit_from_native).
    pub fn from_native(backend: Arc<B>, aggregate: B::Handle) -> Result<Self> {
        let mut composer = Self::new(backend);
        composer.reinit_from_native(aggregate)?;
        Ok(composer)
    }

    // ------------------------------------------------------------------
    // Structural operations
    // ------------------------------------------------------------------

    /// Release the aggregate and every block, leaving a 0×0 grid.
    ///
    /// All releases are attempted; the first failure is returned.
    ///
    /// # Collective
    /// Over the blocks' group.
    pub fn clear(&mut self) -> Result<()> {
        let mut first_err = None;
        if let Some(aggregate) = self.aggregate.take() {
            if let Err(err) = aggregate.release() {
                error!(%err, "failed to release aggregate");
                first_err.get_or_insert(err);
            }
        }
        for block in self.blocks.drain(..) {
            if let Err(err) = block.release() {
                error!(%err, "failed to release block");
                first_err.get_or_insert(err);
            }
        }
        self.n_block_rows = 0;
        self.n_block_cols = 0;
        self.row_indexing = BlockIndexing::new();
        self.col_indexing = BlockIndexing::new();
        self.state = ComposerState::Empty;
        first_err.map_or(Ok(()), Err)
    }

    /// Clear, then allocate an `n_block_rows × n_block_cols` grid of unassigned blocks.
    ///
    /// Block sizes are zero until the next [`synchronize`](Self::synchronize).
    ///
    /// # Collective
    /// Over the group of the blocks being released.
    pub fn reinit(&mut self, n_block_rows: usize, n_block_cols: usize) -> Result<()> {
        self.clear()?;
        self.blocks = (0..n_block_rows * n_block_cols)
            .map(|_| DistributedMatrixBlock::empty())
            .collect();
        self.n_block_rows = n_block_rows;
        self.n_block_cols = n_block_cols;
        self.row_indexing.reset(n_block_rows, 0);
        self.col_indexing.reset(n_block_cols, 0);
        self.state = ComposerState::Shaped;
        debug!(n_block_rows, n_block_cols, "reinitialized block grid");
        Ok(())
    }

    /// Build every block from explicit partitions and a block sparsity pattern,
    /// then synchronize.
    ///
    /// Block `(r, c)` uses `row_partitions[r]`, `col_partitions[c]` and
    /// `sparsity.block(r, c)`. Size disagreements are reported as
    /// [`BlockMatrixError::InvalidSize`] before any native call.
    ///
    /// # Collective
    /// Over `group`.
    pub fn reinit_with_partitions(
        &mut self,
        row_partitions: &[IndexSet],
        col_partitions: &[IndexSet],
        sparsity: &BlockSparsityPattern,
        group: &ProcessGroup,
    ) -> Result<()> {
        let (m, n) = (sparsity.n_block_rows(), sparsity.n_block_cols());
        if row_partitions.len() != m {
            return Err(BlockMatrixError::InvalidSize(format!(
                "{} row partitions for {} block rows",
                row_partitions.len(),
                m
            )));
        }
        if col_partitions.len() != n {
            return Err(BlockMatrixError::InvalidSize(format!(
                "{} column partitions for {} block columns",
                col_partitions.len(),
                n
            )));
        }
        for r in 0..m {
            for c in 0..n {
                let pattern = sparsity.block(r, c);
                if row_partitions[r].size() != pattern.n_rows() {
                    return Err(BlockMatrixError::InvalidSize(format!(
                        "block ({}, {}) has {} rows but row partition {} has size {}",
                        r,
                        c,
                        pattern.n_rows(),
                        r,
                        row_partitions[r].size()
                    )));
                }
                if col_partitions[c].size() != pattern.n_cols() {
                    return Err(BlockMatrixError::InvalidSize(format!(
                        "block ({}, {}) has {} columns but column partition {} has size {}",
                        r,
                        c,
                        pattern.n_cols(),
                        c,
                        col_partitions[c].size()
                    )));
                }
            }
        }

        self.reinit(m, n)?;
        for r in 0..m {
            for c in 0..n {
                let built = DistributedMatrixBlock::from_partition(
                    &self.backend,
                    &row_partitions[r],
                    &col_partitions[c],
                    sparsity.block(r, c),
                    group,
                );
                self.blocks[r * n + c] = self.invalidate_on_err(built)?;
            }
        }
        self.synchronize()
    }

    /// [`reinit_with_partitions`](Self::reinit_with_partitions) with the same
    /// partitions for rows and columns.
    ///
    /// # Collective
    /// Over `group`.
    pub fn reinit_symmetric(
        &mut self,
        partitions: &[IndexSet],
        sparsity: &BlockSparsityPattern,
        group: &ProcessGroup,
    ) -> Result<()> {
        self.reinit_with_partitions(partitions, partitions, sparsity, group)
    }

    /// Decompose a native matrix into blocks, then synchronize.
    ///
    /// A nested composition yields one block per sub-matrix, adopted without
    /// re-finalization; null sub-matrices become unassigned cells that
    /// synchronization fills with placeholders. Any other matrix becomes a
    /// 1×1 grid. The caller keeps its reference to `aggregate`, which may
    /// also be this composer's own aggregate.
    ///
    /// # Collective
    /// Over the group of `aggregate`.
    pub fn reinit_from_native(&mut self, aggregate: B::Handle) -> Result<()> {
        let (m, n, subs) = match self.backend.inspect_kind(aggregate)? {
            HandleKind::Nested => {
                let (m, n) = self.backend.nested_shape(aggregate)?;
                let mut subs = Vec::with_capacity(m * n);
                for r in 0..m {
                    for c in 0..n {
                        subs.push(self.backend.nested_get(aggregate, r, c)?);
                    }
                }
                (m, n, subs)
            }
            HandleKind::Primitive => (1, 1, vec![Some(aggregate)]),
        };

        // Adopt before clearing: `aggregate` may be ours.
        let blocks = subs
            .into_iter()
            .map(|sub| match sub {
                Some(handle) => DistributedMatrixBlock::from_handle(&self.backend, handle),
                None => Ok(DistributedMatrixBlock::empty()),
            })
            .collect::<Result<Vec<_>>>()?;

        self.clear()?;
        self.blocks = blocks;
        self.n_block_rows = m;
        self.n_block_cols = n;
        self.row_indexing.reset(m, 0);
        self.col_indexing.reset(n, 0);
        self.state = ComposerState::Shaped;
        debug!(n_block_rows = m, n_block_cols = n, "decomposed native matrix");
        self.synchronize()
    }

    /// Fill unassigned cells with placeholders, recompute the block indexing,
    /// and rebuild the aggregate from the current grid.
    ///
    /// Fails with [`BlockMatrixError::PreconditionViolation`] if the grid has
    /// no cells or no assigned block, if an assigned block lives on another
    /// backend, or if a previous structural operation failed. Under
    /// [`SizeCheck::Strict`] (the default), blocks disagreeing on a global
    /// row or column size fail with [`BlockMatrixError::InvalidSize`]. These
    /// are detected before any native call. A backend failure leaves the
    /// composer [`ComposerState::Invalid`].
    ///
    /// With [`SizeCheck::LastWriterWins`] sizes are not cross-checked: the
    /// last assigned block of each row and column sets its size, and a
    /// disagreement surfaces as a backend error from the nested build.
    ///
    /// # Collective
    /// Over the blocks' group.
    pub fn synchronize(&mut self) -> Result<()> {
        let (m, n) = (self.n_block_rows, self.n_block_cols);
        if self.state == ComposerState::Invalid {
            return Err(BlockMatrixError::PreconditionViolation(
                "composer is in an indeterminate state after a failed operation; reinit first"
                    .to_string(),
            ));
        }
        if m == 0 || n == 0 {
            return Err(BlockMatrixError::PreconditionViolation(format!(
                "cannot synchronize a {}x{} block grid",
                m, n
            )));
        }
        let (rows, cols, group) = self.collect_sizes()?;

        self.state = ComposerState::Invalid;
        let factory =
            PlaceholderBlockFactory::new(self.backend.clone(), self.options.placeholder_storage);
        for r in 0..m {
            for c in 0..n {
                let idx = r * n + c;
                if self.blocks[idx].is_assigned() {
                    continue;
                }
                let (local_rows, global_rows) = rows[r];
                let (local_cols, global_cols) = cols[c];
                trace!(row = r, col = c, "filling unassigned block");
                self.blocks[idx] =
                    factory.create(&group, local_rows, global_rows, local_cols, global_cols)?;
            }
        }

        let row_sizes: Vec<usize> = (0..m)
            .map(|r| self.blocks[r * n].global_row_count())
            .collect();
        let col_sizes: Vec<usize> = (0..n).map(|c| self.blocks[c].global_col_count()).collect();
        self.row_indexing.reset_sizes(&row_sizes)?;
        self.col_indexing.reset_sizes(&col_sizes)?;

        if let Some(old) = self.aggregate.take() {
            old.release()?;
        }
        let handles = self
            .blocks
            .iter()
            .map(DistributedMatrixBlock::handle)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                BlockMatrixError::PreconditionViolation(
                    "unassigned block left after placeholder fill".to_string(),
                )
            })?;
        self.aggregate = Some(NestedAggregate::build(&self.backend, &group, m, n, &handles)?);
        self.state = ComposerState::Consistent;
        debug!(
            n_block_rows = m,
            n_block_cols = n,
            global_rows = self.row_indexing.total_size(),
            global_cols = self.col_indexing.total_size(),
            "synchronized block matrix"
        );
        Ok(())
    }

    /// Per-row and per-column `(local, global)` sizes from the assigned
    /// blocks, and the group they share.
    fn collect_sizes(&self) -> Result<(Vec<AxisSizes>, Vec<AxisSizes>, ProcessGroup)> {
        let (m, n) = (self.n_block_rows, self.n_block_cols);
        let mut rows: Vec<Option<AxisSizes>> = vec![None; m];
        let mut cols: Vec<Option<AxisSizes>> = vec![None; n];
        let mut group = None;
        let mut assigned = 0usize;

        for r in 0..m {
            for c in 0..n {
                let block = &self.blocks[r * n + c];
                if !block.is_assigned() {
                    continue;
                }
                // `block_mut` can swap in a block `set_block` never saw.
                if !block.belongs_to(&self.backend) {
                    return Err(foreign_block(r, c));
                }
                assigned += 1;
                let row = (block.local_row_count(), block.global_row_count());
                let col = (block.local_col_count(), block.global_col_count());
                if self.options.size_check == SizeCheck::Strict {
                    check_global_size("row", r, rows[r], row.1)?;
                    check_global_size("column", c, cols[c], col.1)?;
                }
                rows[r] = Some(row);
                cols[c] = Some(col);
                group = block.process_group().or(group);
            }
        }

        if assigned == 0 {
            return Err(BlockMatrixError::PreconditionViolation(
                "no assigned block determines the block sizes".to_string(),
            ));
        }
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(r, sizes)| {
                sizes.unwrap_or_else(|| {
                    warn!(block_row = r, "no assigned block in block row, using size 0");
                    (0, 0)
                })
            })
            .collect();
        let cols = cols
            .into_iter()
            .enumerate()
            .map(|(c, sizes)| {
                sizes.unwrap_or_else(|| {
                    warn!(block_col = c, "no assigned block in block column, using size 0");
                    (0, 0)
                })
            })
            .collect();
        Ok((rows, cols, group.unwrap_or(self.options.fallback_group)))
    }

    fn invalidate_on_err<T>(&mut self, result: Result<T>) -> Result<T> {
        if result.is_err() {
            self.state = ComposerState::Invalid;
        }
        result
    }

    // ------------------------------------------------------------------
    // Block access
    // ------------------------------------------------------------------

    fn linear_index(&self, row: usize, col: usize) -> Result<usize> {
        if row >= self.n_block_rows || col >= self.n_block_cols {
            return Err(BlockMatrixError::IndexOutOfRange {
                index: vec![row, col],
                shape: vec![self.n_block_rows, self.n_block_cols],
            });
        }
        Ok(row * self.n_block_cols + col)
    }

    fn mark_stale(&mut self) {
        if self.state == ComposerState::Consistent {
            self.state = ComposerState::Shaped;
        }
    }

    /// Block `(row, col)`.
    pub fn block(&self, row: usize, col: usize) -> Result<&DistributedMatrixBlock<B>> {
        let idx = self.linear_index(row, col)?;
        Ok(&self.blocks[idx])
    }

    /// Mutable block `(row, col)`. The aggregate is stale until the next
    /// [`synchronize`](Self::synchronize).
    pub fn block_mut(&mut self, row: usize, col: usize) -> Result<&mut DistributedMatrixBlock<B>> {
        let idx = self.linear_index(row, col)?;
        self.mark_stale();
        Ok(&mut self.blocks[idx])
    }

    /// Replace block `(row, col)`, returning the previous one.
    ///
    /// The block must come from this composer's backend, otherwise
    /// [`BlockMatrixError::PreconditionViolation`] is returned and the grid
    /// is left untouched. The aggregate is stale until the next
    /// [`synchronize`](Self::synchronize).
    pub fn set_block(
        &mut self,
        row: usize,
        col: usize,
        block: DistributedMatrixBlock<B>,
    ) -> Result<DistributedMatrixBlock<B>> {
        let idx = self.linear_index(row, col)?;
        if !block.belongs_to(&self.backend) {
            return Err(foreign_block(row, col));
        }
        self.mark_stale();
        Ok(mem::replace(&mut self.blocks[idx], block))
    }

    /// Remove block `(row, col)`, leaving the cell unassigned.
    pub fn take_block(&mut self, row: usize, col: usize) -> Result<DistributedMatrixBlock<B>> {
        self.set_block(row, col, DistributedMatrixBlock::empty())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    fn require_consistent(&self, query: &str) -> Result<()> {
        if self.state != ComposerState::Consistent {
            return Err(BlockMatrixError::PreconditionViolation(format!(
                "{} requires a synchronized composer (state is {:?})",
                query, self.state
            )));
        }
        Ok(())
    }

    /// Lifecycle state.
    pub fn state(&self) -> ComposerState {
        self.state
    }

    /// Options in effect.
    pub fn options(&self) -> &ComposerOptions {
        &self.options
    }

    /// The backend all blocks live on.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Number of block rows.
    pub fn n_block_rows(&self) -> usize {
        self.n_block_rows
    }

    /// Number of block columns.
    pub fn n_block_cols(&self) -> usize {
        self.n_block_cols
    }

    /// Row block boundaries.
    pub fn row_indexing(&self) -> &BlockIndexing {
        &self.row_indexing
    }

    /// Column block boundaries.
    pub fn col_indexing(&self) -> &BlockIndexing {
        &self.col_indexing
    }

    /// Rows of the composed matrix, as of the last synchronization.
    pub fn global_row_count(&self) -> usize {
        self.row_indexing.total_size()
    }

    /// Columns of the composed matrix, as of the last synchronization.
    pub fn global_col_count(&self) -> usize {
        self.col_indexing.total_size()
    }

    /// Rows owned by the calling process, summed over block column 0.
    pub fn local_row_count(&self) -> usize {
        if self.blocks.is_empty() {
            return 0;
        }
        (0..self.n_block_rows)
            .map(|r| self.blocks[r * self.n_block_cols].local_row_count())
            .sum()
    }

    /// Domain columns owned by the calling process, summed over block row 0.
    pub fn local_col_count(&self) -> usize {
        if self.blocks.is_empty() {
            return 0;
        }
        (0..self.n_block_cols)
            .map(|c| self.blocks[c].local_col_count())
            .sum()
    }

    /// One owned domain index set per block column, from block row 0.
    pub fn owned_domain_index_sets(&self) -> Result<Vec<IndexSet>> {
        self.require_consistent("owned_domain_index_sets")?;
        (0..self.n_block_cols)
            .map(|c| self.blocks[c].owned_col_indices())
            .collect()
    }

    /// One owned range index set per block row, from block column 0.
    pub fn owned_range_index_sets(&self) -> Result<Vec<IndexSet>> {
        self.require_consistent("owned_range_index_sets")?;
        (0..self.n_block_rows)
            .map(|r| self.blocks[r * self.n_block_cols].owned_row_indices())
            .collect()
    }

    /// Sum of every block's nonzero count.
    ///
    /// # Collective
    /// One reduction per block over the blocks' group.
    pub fn total_nonzero_count(&self) -> Result<u64> {
        self.require_consistent("total_nonzero_count")?;
        self.blocks
            .iter()
            .try_fold(0u64, |acc, block| -> Result<u64> { Ok(acc + block.nonzero_count()?) })
    }

    /// Group of the aggregate, or the configured fallback group when there
    /// is no aggregate yet.
    pub fn process_group(&self) -> ProcessGroup {
        self.aggregate
            .as_ref()
            .and_then(|aggregate| self.backend.associated_process_group(aggregate.handle()))
            .unwrap_or(self.options.fallback_group)
    }

    /// Read-only view of the aggregate, if one has been built.
    ///
    /// The view may be stale when [`state`](Self::state) is not
    /// [`ComposerState::Consistent`].
    pub fn aggregate(&self) -> Option<AggregateView<'_, B>> {
        self.aggregate.as_ref().map(NestedAggregate::view)
    }

    /// Native handle of the aggregate, for solver code. The composer keeps
    /// ownership.
    pub fn native_handle(&self) -> Option<B::Handle> {
        self.aggregate.as_ref().map(NestedAggregate::handle)
    }
}

fn check_global_size(
    axis: &str,
    index: usize,
    recorded: Option<AxisSizes>,
    global: usize,
) -> Result<()> {
    match recorded {
        Some((_, previous)) if previous != global => Err(BlockMatrixError::InvalidSize(format!(
            "blocks in block {} {} disagree on global size ({} vs {})",
            axis, index, previous, global
        ))),
        _ => Ok(()),
    }
}

fn foreign_block(row: usize, col: usize) -> BlockMatrixError {
    BlockMatrixError::PreconditionViolation(format!(
        "block ({}, {}) was created on a different backend",
        row, col
    ))
}

impl<B: MatrixBackend> Drop for BlockMatrixComposer<B> {
    fn drop(&mut self) {
        // Aggregate first, then the blocks it references. `OwnedMat::drop`
        // logs a failed release and asserts in debug builds.
        drop(self.aggregate.take());
    }
}

impl<B: MatrixBackend> fmt::Debug for BlockMatrixComposer<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockMatrixComposer")
            .field("state", &self.state)
            .field("n_block_rows", &self.n_block_rows)
            .field("n_block_cols", &self.n_block_cols)
            .field("row_sizes", &self.row_indexing.sizes())
            .field("col_sizes", &self.col_indexing.sizes())
            .field("aggregate", &self.aggregate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestmat_backend::{LocalBackend, SparsityPattern};

    fn block(
        backend: &Arc<LocalBackend>,
        rows: usize,
        cols: usize,
        entries: &[(usize, usize)],
    ) -> DistributedMatrixBlock<LocalBackend> {
        DistributedMatrixBlock::from_partition(
            backend,
            &IndexSet::complete(rows),
            &IndexSet::complete(cols),
            &SparsityPattern::from_entries(rows, cols, entries.iter().copied()),
            &ProcessGroup::local(),
        )
        .unwrap()
    }

    #[test]
    fn test_new_is_empty() {
        let composer = BlockMatrixComposer::new(Arc::new(LocalBackend::new()));
        assert_eq!(composer.state(), ComposerState::Empty);
        assert_eq!(composer.n_block_rows(), 0);
        assert_eq!(composer.global_row_count(), 0);
        assert!(composer.native_handle().is_none());
        assert_eq!(composer.process_group(), ProcessGroup::local());
    }

    #[test]
    fn test_reinit_shapes_grid() {
        let mut composer = BlockMatrixComposer::new(Arc::new(LocalBackend::new()));
        composer.reinit(2, 3).unwrap();
        assert_eq!(composer.state(), ComposerState::Shaped);
        assert_eq!(composer.row_indexing().block_count(), 2);
        assert_eq!(composer.col_indexing().block_count(), 3);
        assert_eq!(composer.col_indexing().total_size(), 0);
        assert!(!composer.block(1, 2).unwrap().is_assigned());
    }

    #[test]
    fn test_block_out_of_range() {
        let mut composer = BlockMatrixComposer::new(Arc::new(LocalBackend::new()));
        composer.reinit(2, 2).unwrap();
        let err = composer.block(2, 0).unwrap_err();
        assert!(matches!(
            err,
            BlockMatrixError::IndexOutOfRange { ref index, ref shape }
                if index == &[2, 0] && shape == &[2, 2]
        ));
        assert!(composer.block_mut(0, 5).is_err());
        assert!(composer.take_block(3, 3).is_err());
    }

    #[test]
    fn test_synchronize_empty_grid_is_precondition_violation() {
        let backend = Arc::new(LocalBackend::new());
        let mut composer = BlockMatrixComposer::new(backend.clone());
        composer.reinit(0, 0).unwrap();
        let err = composer.synchronize().unwrap_err();
        assert!(matches!(err, BlockMatrixError::PreconditionViolation(_)));
        assert!(composer.native_handle().is_none());
        assert!(backend.collective_trace().is_empty());
    }

    #[test]
    fn test_synchronize_without_assigned_blocks_is_precondition_violation() {
        let backend = Arc::new(LocalBackend::new());
        let mut composer = BlockMatrixComposer::new(backend.clone());
        composer.reinit(2, 2).unwrap();
        let err = composer.synchronize().unwrap_err();
        assert!(matches!(err, BlockMatrixError::PreconditionViolation(_)));
        assert_eq!(composer.state(), ComposerState::Shaped);
        assert!(backend.collective_trace().is_empty());
    }

    #[test]
    fn test_set_block_marks_stale() {
        let backend = Arc::new(LocalBackend::new());
        let mut composer = BlockMatrixComposer::new(backend.clone());
        composer.reinit(1, 1).unwrap();
        composer.set_block(0, 0, block(&backend, 2, 2, &[(0, 0)])).unwrap();
        composer.synchronize().unwrap();
        assert_eq!(composer.state(), ComposerState::Consistent);

        let old = composer.set_block(0, 0, block(&backend, 2, 2, &[(0, 0), (1, 1)])).unwrap();
        assert_eq!(composer.state(), ComposerState::Shaped);
        assert!(composer.total_nonzero_count().is_err());
        // The stale aggregate still references the old block's matrix.
        assert_eq!(composer.aggregate().unwrap().nonzero_count().unwrap(), 1);
        drop(old);

        composer.synchronize().unwrap();
        assert_eq!(composer.total_nonzero_count().unwrap(), 2);
        assert_eq!(composer.aggregate().unwrap().nonzero_count().unwrap(), 2);
    }

    #[test]
    fn test_block_mut_marks_stale() {
        let backend = Arc::new(LocalBackend::new());
        let mut composer = BlockMatrixComposer::new(backend.clone());
        composer.reinit(1, 1).unwrap();
        composer.set_block(0, 0, block(&backend, 1, 1, &[])).unwrap();
        composer.synchronize().unwrap();
        let _ = composer.block_mut(0, 0).unwrap();
        assert_eq!(composer.state(), ComposerState::Shaped);
    }

    fn five_by_five_dense(backend: &Arc<LocalBackend>) -> DistributedMatrixBlock<LocalBackend> {
        let entries: Vec<_> = (0..5).flat_map(|r| (0..4).map(move |c| (r, c))).collect();
        block(backend, 5, 5, &entries)
    }

    #[test]
    fn test_set_block_rejects_block_from_other_backend() {
        let backend = Arc::new(LocalBackend::new());
        let other = Arc::new(LocalBackend::new());
        let mut composer = BlockMatrixComposer::new(backend.clone());
        composer.reinit(1, 1).unwrap();
        composer.set_block(0, 0, block(&backend, 2, 2, &[(0, 0)])).unwrap();

        let foreign = five_by_five_dense(&other);
        assert_eq!(foreign.nonzero_count().unwrap(), 20);
        let err = composer.set_block(0, 0, foreign).unwrap_err();
        assert!(matches!(err, BlockMatrixError::PreconditionViolation(_)));
        assert_eq!(composer.block(0, 0).unwrap().global_row_count(), 2);
        assert_eq!(other.live_handles(), 0);

        composer.synchronize().unwrap();
        let view = composer.aggregate().unwrap();
        assert_eq!(composer.global_row_count(), view.global_row_count().unwrap());
        assert_eq!(composer.total_nonzero_count().unwrap(), view.nonzero_count().unwrap());
    }

    #[test]
    fn test_synchronize_rejects_block_swapped_in_from_other_backend() {
        let backend = Arc::new(LocalBackend::new());
        let other = Arc::new(LocalBackend::new());
        let mut composer = BlockMatrixComposer::new(backend.clone());
        composer.reinit(1, 1).unwrap();
        composer.set_block(0, 0, block(&backend, 2, 2, &[(0, 0)])).unwrap();
        composer.synchronize().unwrap();

        *composer.block_mut(0, 0).unwrap() = five_by_five_dense(&other);
        backend.clear_trace();
        let err = composer.synchronize().unwrap_err();
        assert!(matches!(err, BlockMatrixError::PreconditionViolation(_)));
        assert_eq!(composer.state(), ComposerState::Shaped);
        assert!(backend.collective_trace().is_empty());
        assert!(composer.total_nonzero_count().is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "failed to release native matrix")]
    fn test_drop_asserts_on_failed_aggregate_release() {
        let backend = Arc::new(LocalBackend::new());
        let mut composer = BlockMatrixComposer::new(backend.clone());
        composer.reinit(1, 1).unwrap();
        composer.set_block(0, 0, block(&backend, 1, 1, &[(0, 0)])).unwrap();
        composer.synchronize().unwrap();

        backend.fail_next("destroy", 42);
        drop(composer);
    }

    #[test]
    fn test_clear_releases_everything() {
        let backend = Arc::new(LocalBackend::new());
        let mut composer = BlockMatrixComposer::new(backend.clone());
        composer.reinit(2, 1).unwrap();
        composer.set_block(0, 0, block(&backend, 2, 3, &[(1, 2)])).unwrap();
        composer.synchronize().unwrap();
        assert!(backend.live_handles() > 0);

        composer.clear().unwrap();
        assert_eq!(composer.state(), ComposerState::Empty);
        assert_eq!(composer.n_block_rows(), 0);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_drop_releases_everything() {
        let backend = Arc::new(LocalBackend::new());
        {
            let mut composer = BlockMatrixComposer::new(backend.clone());
            composer.reinit(2, 2).unwrap();
            composer.set_block(0, 0, block(&backend, 1, 1, &[(0, 0)])).unwrap();
            composer.set_block(1, 1, block(&backend, 2, 2, &[])).unwrap();
            composer.synchronize().unwrap();
        }
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_reinit_from_own_aggregate() {
        let backend = Arc::new(LocalBackend::new());
        let mut composer = BlockMatrixComposer::new(backend.clone());
        composer.reinit(1, 2).unwrap();
        composer.set_block(0, 0, block(&backend, 2, 2, &[(0, 0)])).unwrap();
        composer.set_block(0, 1, block(&backend, 2, 3, &[(1, 2), (0, 1)])).unwrap();
        composer.synchronize().unwrap();

        let own = composer.native_handle().unwrap();
        composer.reinit_from_native(own).unwrap();
        assert_eq!(composer.state(), ComposerState::Consistent);
        assert_eq!(composer.n_block_cols(), 2);
        assert_eq!(composer.global_col_count(), 5);
        assert_eq!(composer.total_nonzero_count().unwrap(), 3);
        assert_eq!(backend.ref_count(own), None);
    }

    #[test]
    fn test_fallback_group_before_first_synchronize() {
        let group = ProcessGroup::new(11, 0, 1);
        let composer = BlockMatrixComposer::with_options(
            Arc::new(LocalBackend::new()),
            ComposerOptions::default().with_fallback_group(group),
        );
        assert_eq!(composer.process_group(), group);
    }
}
