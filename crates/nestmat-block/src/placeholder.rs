//! Empty blocks for grid positions without real data.

use std::sync::Arc;

use nestmat_backend::{Layout, MatrixBackend, MatrixOption, ProcessGroup, SparsityPattern, StorageKind};
use tracing::trace;

use crate::block::DistributedMatrixBlock;
use crate::error::Result;
use crate::handle::OwnedMat;

/// Synthesizes finalized, entry-free native matrices of a requested shape.
///
/// Placeholders are never written to, so they are created with
/// [`MatrixOption::NoOffProcessEntries`] switched on.
#[derive(Debug)]
pub struct PlaceholderBlockFactory<B: MatrixBackend> {
    backend: Arc<B>,
    storage: StorageKind,
}

impl<B: MatrixBackend> PlaceholderBlockFactory<B> {
    /// Create a factory producing placeholders with the given storage kind.
    pub fn new(backend: Arc<B>, storage: StorageKind) -> Self {
        Self { backend, storage }
    }

    /// Create an empty `global_rows × global_cols` block.
    ///
    /// Ownership of the native matrix passes to the returned block.
    ///
    /// # Collective
    /// Over `group`.
    pub fn create(
        &self,
        group: &ProcessGroup,
        local_rows: usize,
        global_rows: usize,
        local_cols: usize,
        global_cols: usize,
    ) -> Result<DistributedMatrixBlock<B>> {
        let backend = &self.backend;
        let mat = OwnedMat::from_raw(backend.clone(), backend.create(group)?);
        let handle = mat.handle();
        backend.set_shape(handle, Layout::new(local_rows, local_cols, global_rows, global_cols))?;
        backend.set_storage_kind(handle, self.storage)?;
        backend.preallocate(handle, &SparsityPattern::new(global_rows, global_cols))?;
        backend.set_option(handle, MatrixOption::NoOffProcessEntries, true)?;
        backend.finalize_begin(handle)?;
        backend.finalize_end(handle)?;
        trace!(?handle, global_rows, global_cols, "created placeholder block");
        DistributedMatrixBlock::from_owned(mat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestmat_backend::LocalBackend;

    #[test]
    fn test_placeholder_shape_and_flags() {
        let backend = Arc::new(LocalBackend::new());
        let factory = PlaceholderBlockFactory::new(backend.clone(), StorageKind::Sell);
        let block = factory.create(&ProcessGroup::local(), 3, 3, 4, 4).unwrap();

        let handle = block.handle().unwrap();
        assert_eq!(block.layout(), Layout::serial(3, 4));
        assert_eq!(block.nonzero_count().unwrap(), 0);
        assert_eq!(block.process_group(), Some(ProcessGroup::local()));
        assert!(backend.has_option(handle, MatrixOption::NoOffProcessEntries));
        assert_eq!(backend.storage_kind(handle), Some(StorageKind::Sell));
        assert_eq!(backend.ref_count(handle), Some(1));
    }

    #[test]
    fn test_placeholder_failure_leaves_nothing_behind() {
        let backend = Arc::new(LocalBackend::new());
        let factory = PlaceholderBlockFactory::new(backend.clone(), StorageKind::Aij);
        backend.fail_next("set_option", 5);
        assert!(factory.create(&ProcessGroup::local(), 1, 1, 1, 1).is_err());
        assert_eq!(backend.live_handles(), 0);
    }
}
