//! One distributed sparse-matrix block of the grid.

use std::fmt;
use std::sync::Arc;

use nestmat_backend::{IndexSet, Layout, MatrixBackend, ProcessGroup, SparsityPattern, StorageKind};
use tracing::debug;

use crate::error::{BlockMatrixError, Result};
use crate::handle::OwnedMat;

/// Thin wrapper around one native distributed matrix, or none.
///
/// A block without a native matrix is *unassigned*: all its size queries
/// return 0 and the composer fills its cell with a placeholder during
/// synchronization. Shape and process group are read once at construction,
/// since a finalized native matrix cannot change them.
pub struct DistributedMatrixBlock<B: MatrixBackend> {
    mat: Option<OwnedMat<B>>,
    layout: Layout,
    group: Option<ProcessGroup>,
}

impl<B: MatrixBackend> Default for DistributedMatrixBlock<B> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<B: MatrixBackend> DistributedMatrixBlock<B> {
    /// Create an unassigned block.
    pub fn empty() -> Self {
        Self {
            mat: None,
            layout: Layout::default(),
            group: None,
        }
    }

    /// Allocate and finalize a native matrix for the given partition.
    ///
    /// `rows` and `cols` describe the global size (`size()`) and the part owned
    /// by the calling process; `pattern` spans the global block.
    ///
    /// # Collective
    /// Over `group`.
    pub fn from_partition(
        backend: &Arc<B>,
        rows: &IndexSet,
        cols: &IndexSet,
        pattern: &SparsityPattern,
        group: &ProcessGroup,
    ) -> Result<Self> {
        if pattern.n_rows() != rows.size() || pattern.n_cols() != cols.size() {
            return Err(BlockMatrixError::InvalidSize(format!(
                "sparsity pattern is {}x{} but partition is {}x{}",
                pattern.n_rows(),
                pattern.n_cols(),
                rows.size(),
                cols.size()
            )));
        }
        let layout = Layout::new(rows.n_elements(), cols.n_elements(), rows.size(), cols.size());

        // Wrap before configuring so a failure below still frees the handle.
        let mat = OwnedMat::from_raw(backend.clone(), backend.create(group)?);
        let handle = mat.handle();
        backend.set_shape(handle, layout)?;
        backend.set_storage_kind(handle, StorageKind::Aij)?;
        backend.preallocate(handle, pattern)?;
        backend.finalize_begin(handle)?;
        backend.finalize_end(handle)?;

        Ok(Self {
            mat: Some(mat),
            layout,
            group: Some(*group),
        })
    }

    /// Adopt an already finalized native matrix owned elsewhere.
    ///
    /// Takes a new reference; the caller keeps its own.
    pub fn from_handle(backend: &Arc<B>, handle: B::Handle) -> Result<Self> {
        let layout = backend.layout(handle)?;
        let group = backend.associated_process_group(handle);
        let mat = OwnedMat::adopt(backend.clone(), handle)?;
        Ok(Self {
            mat: Some(mat),
            layout,
            group,
        })
    }

    /// Wrap a reference the caller hands over.
    pub fn from_owned(mat: OwnedMat<B>) -> Result<Self> {
        let handle = mat.handle();
        let layout = mat.backend().layout(handle)?;
        let group = mat.backend().associated_process_group(handle);
        Ok(Self {
            mat: Some(mat),
            layout,
            group,
        })
    }

    /// Whether the block wraps a native matrix.
    pub fn is_assigned(&self) -> bool {
        self.mat.is_some()
    }

    /// Whether the native matrix lives on `backend`. Unassigned blocks live
    /// nowhere and match any backend.
    pub fn belongs_to(&self, backend: &Arc<B>) -> bool {
        self.mat
            .as_ref()
            .map_or(true, |mat| Arc::ptr_eq(mat.backend(), backend))
    }

    /// The native handle, `None` when unassigned.
    pub fn handle(&self) -> Option<B::Handle> {
        self.mat.as_ref().map(OwnedMat::handle)
    }

    /// Local and global dimensions (all zero when unassigned).
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Rows across the process group.
    pub fn global_row_count(&self) -> usize {
        self.layout.global_rows
    }

    /// Columns across the process group.
    pub fn global_col_count(&self) -> usize {
        self.layout.global_cols
    }

    /// Rows owned by the calling process.
    pub fn local_row_count(&self) -> usize {
        self.layout.local_rows
    }

    /// Domain columns owned by the calling process.
    pub fn local_col_count(&self) -> usize {
        self.layout.local_cols
    }

    /// Stored entries summed over the process group.
    ///
    /// # Collective
    /// A reduction over the block's group.
    pub fn nonzero_count(&self) -> Result<u64> {
        match &self.mat {
            Some(mat) => Ok(mat.backend().nonzero_count(mat.handle())?),
            None => Ok(0),
        }
    }

    /// Rows owned by the calling process.
    pub fn owned_row_indices(&self) -> Result<IndexSet> {
        match &self.mat {
            Some(mat) => Ok(mat.backend().owned_row_index_set(mat.handle())?),
            None => Ok(IndexSet::new(0)),
        }
    }

    /// Domain columns owned by the calling process.
    pub fn owned_col_indices(&self) -> Result<IndexSet> {
        match &self.mat {
            Some(mat) => Ok(mat.backend().owned_col_index_set(mat.handle())?),
            None => Ok(IndexSet::new(0)),
        }
    }

    /// The process group the block is defined over, `None` when unassigned.
    pub fn process_group(&self) -> Option<ProcessGroup> {
        self.group
    }

    /// Release the native matrix, reporting native failure.
    pub fn release(self) -> Result<()> {
        if let Some(mat) = self.mat {
            debug!(handle = ?mat.handle(), "releasing block");
            mat.release()?;
        }
        Ok(())
    }
}

impl<B: MatrixBackend> fmt::Debug for DistributedMatrixBlock<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedMatrixBlock")
            .field("handle", &self.handle())
            .field("layout", &self.layout)
            .field("group", &self.group)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestmat_backend::{LocalBackend, STATUS_ERR_ARG_WRONG};

    fn identity_pattern(n: usize) -> SparsityPattern {
        SparsityPattern::from_entries(n, n, (0..n).map(|i| (i, i)))
    }

    #[test]
    fn test_empty_block() {
        let block = DistributedMatrixBlock::<LocalBackend>::empty();
        assert!(!block.is_assigned());
        assert_eq!(block.global_row_count(), 0);
        assert_eq!(block.local_col_count(), 0);
        assert_eq!(block.nonzero_count().unwrap(), 0);
        assert_eq!(block.owned_row_indices().unwrap().n_elements(), 0);
        assert_eq!(block.process_group(), None);
    }

    #[test]
    fn test_from_partition() {
        let backend = Arc::new(LocalBackend::new());
        let block = DistributedMatrixBlock::from_partition(
            &backend,
            &IndexSet::complete(4),
            &IndexSet::complete(4),
            &identity_pattern(4),
            &ProcessGroup::local(),
        )
        .unwrap();
        assert!(block.is_assigned());
        assert_eq!(block.layout(), Layout::serial(4, 4));
        assert_eq!(block.nonzero_count().unwrap(), 4);
        assert_eq!(block.owned_col_indices().unwrap(), IndexSet::complete(4));
        assert_eq!(block.process_group(), Some(ProcessGroup::local()));
        drop(block);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_from_partition_rejects_mismatched_pattern_before_native_calls() {
        let backend = Arc::new(LocalBackend::new());
        let err = DistributedMatrixBlock::from_partition(
            &backend,
            &IndexSet::complete(3),
            &IndexSet::complete(4),
            &identity_pattern(4),
            &ProcessGroup::local(),
        )
        .unwrap_err();
        assert!(matches!(err, BlockMatrixError::InvalidSize(_)));
        assert!(backend.collective_trace().is_empty());
    }

    #[test]
    fn test_from_partition_frees_handle_on_backend_failure() {
        let backend = Arc::new(LocalBackend::new());
        backend.fail_next("finalize_end", 77);
        let err = DistributedMatrixBlock::from_partition(
            &backend,
            &IndexSet::complete(2),
            &IndexSet::complete(2),
            &identity_pattern(2),
            &ProcessGroup::local(),
        )
        .unwrap_err();
        assert!(matches!(err, BlockMatrixError::Backend(e) if e.code == 77));
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_from_handle_shares_resource() {
        let backend = Arc::new(LocalBackend::new());
        let original = DistributedMatrixBlock::from_partition(
            &backend,
            &IndexSet::complete(2),
            &IndexSet::complete(3),
            &SparsityPattern::from_entries(2, 3, [(0, 2), (1, 0)]),
            &ProcessGroup::local(),
        )
        .unwrap();
        let handle = original.handle().unwrap();
        let adopted = DistributedMatrixBlock::from_handle(&backend, handle).unwrap();
        assert_eq!(adopted.layout(), original.layout());
        assert_eq!(adopted.nonzero_count().unwrap(), 2);
        assert_eq!(backend.ref_count(handle), Some(2));

        original.release().unwrap();
        assert_eq!(backend.ref_count(handle), Some(1));
        adopted.release().unwrap();
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_from_handle_rejects_dead_handle() {
        let backend = Arc::new(LocalBackend::new());
        let mat = backend.create(&ProcessGroup::local()).unwrap();
        backend.destroy(mat).unwrap();
        let err = DistributedMatrixBlock::from_handle(&backend, mat).unwrap_err();
        assert!(matches!(err, BlockMatrixError::Backend(e) if e.code == STATUS_ERR_ARG_WRONG));
    }
}
