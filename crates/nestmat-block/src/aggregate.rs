//! The nested aggregate: an owning handle and a non-owning view.

use std::fmt;
use std::sync::Arc;

use nestmat_backend::{IndexSet, Layout, MatrixBackend, ProcessGroup};
use tracing::debug;

use crate::error::Result;
use crate::handle::OwnedMat;

/// Owns the native nested composition of a block grid.
///
/// The composition references the blocks' native matrices; it does not
/// copy them. It is never mutated: a grid change means releasing this
/// aggregate and building a new one.
pub struct NestedAggregate<B: MatrixBackend> {
    mat: OwnedMat<B>,
    n_block_rows: usize,
    n_block_cols: usize,
}

impl<B: MatrixBackend> NestedAggregate<B> {
    /// Compose `n_block_rows × n_block_cols` handles given in row-major order.
    ///
    /// # Collective
    /// Over `group`.
    pub fn build(
        backend: &Arc<B>,
        group: &ProcessGroup,
        n_block_rows: usize,
        n_block_cols: usize,
        subs: &[B::Handle],
    ) -> Result<Self> {
        let subs: Vec<Option<B::Handle>> = subs.iter().copied().map(Some).collect();
        let handle = backend.build_nested(group, n_block_rows, n_block_cols, &subs)?;
        debug!(?handle, n_block_rows, n_block_cols, "built aggregate");
        Ok(Self {
            mat: OwnedMat::from_raw(backend.clone(), handle),
            n_block_rows,
            n_block_cols,
        })
    }

    /// Non-owning view of the aggregate.
    pub fn view(&self) -> AggregateView<'_, B> {
        AggregateView {
            backend: self.mat.backend().as_ref(),
            handle: self.mat.handle(),
            n_block_rows: self.n_block_rows,
            n_block_cols: self.n_block_cols,
        }
    }

    /// The native handle.
    pub fn handle(&self) -> B::Handle {
        self.mat.handle()
    }

    /// Release the aggregate, reporting native failure.
    pub fn release(self) -> Result<()> {
        debug!(handle = ?self.mat.handle(), "releasing aggregate");
        Ok(self.mat.release()?)
    }
}

impl<B: MatrixBackend> fmt::Debug for NestedAggregate<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestedAggregate")
            .field("handle", &self.mat.handle())
            .field("n_block_rows", &self.n_block_rows)
            .field("n_block_cols", &self.n_block_cols)
            .finish()
    }
}

/// Read-only view of a nested aggregate.
///
/// Borrowing the view keeps the owning composer immutable, so the aggregate
/// cannot be released or rebuilt while the view is alive. The view never
/// releases the handle.
pub struct AggregateView<'a, B: MatrixBackend> {
    backend: &'a B,
    handle: B::Handle,
    n_block_rows: usize,
    n_block_cols: usize,
}

impl<B: MatrixBackend> Clone for AggregateView<'_, B> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: MatrixBackend> Copy for AggregateView<'_, B> {}

impl<'a, B: MatrixBackend> AggregateView<'a, B> {
    /// The native handle, for passing to solver code.
    pub fn handle(&self) -> B::Handle {
        self.handle
    }

    /// Number of block rows.
    pub fn n_block_rows(&self) -> usize {
        self.n_block_rows
    }

    /// Number of block columns.
    pub fn n_block_cols(&self) -> usize {
        self.n_block_cols
    }

    /// Local and global dimensions of the composed matrix.
    pub fn layout(&self) -> Result<Layout> {
        Ok(self.backend.layout(self.handle)?)
    }

    /// Rows of the composed matrix.
    pub fn global_row_count(&self) -> Result<usize> {
        Ok(self.layout()?.global_rows)
    }

    /// Columns of the composed matrix.
    pub fn global_col_count(&self) -> Result<usize> {
        Ok(self.layout()?.global_cols)
    }

    /// Stored entries of the composed matrix, summed over the group.
    ///
    /// # Collective
    /// A reduction over the aggregate's group.
    pub fn nonzero_count(&self) -> Result<u64> {
        Ok(self.backend.nonzero_count(self.handle)?)
    }

    /// Rows of the composed matrix owned by the calling process.
    pub fn owned_row_indices(&self) -> Result<IndexSet> {
        Ok(self.backend.owned_row_index_set(self.handle)?)
    }

    /// Domain columns of the composed matrix owned by the calling process.
    pub fn owned_col_indices(&self) -> Result<IndexSet> {
        Ok(self.backend.owned_col_index_set(self.handle)?)
    }

    /// Group the aggregate is defined over.
    pub fn process_group(&self) -> Option<ProcessGroup> {
        self.backend.associated_process_group(self.handle)
    }
}

impl<B: MatrixBackend> fmt::Debug for AggregateView<'_, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateView")
            .field("handle", &self.handle)
            .field("n_block_rows", &self.n_block_rows)
            .field("n_block_cols", &self.n_block_cols)
            .finish()
    }
}
