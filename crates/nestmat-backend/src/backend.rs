//! The native matrix capability contract.
//!
//! [`MatrixBackend`] is the only way the composer reaches native matrices.
//! Implementations wrap a real distributed sparse-matrix library, or serve
//! as an in-process stand-in ([`crate::LocalBackend`]).

use std::fmt::Debug;
use std::hash::Hash;

use crate::error::BackendResult;
use crate::group::ProcessGroup;
use crate::index_set::IndexSet;
use crate::sparsity::SparsityPattern;

/// Local and global dimensions of a distributed matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    /// Rows owned by the calling process.
    pub local_rows: usize,
    /// Columns of the domain owned by the calling process.
    pub local_cols: usize,
    /// Rows across the whole process group.
    pub global_rows: usize,
    /// Columns across the whole process group.
    pub global_cols: usize,
}

impl Layout {
    /// Create a layout (argument order matches [`MatrixBackend::set_shape`]).
    pub fn new(local_rows: usize, local_cols: usize, global_rows: usize, global_cols: usize) -> Self {
        Self {
            local_rows,
            local_cols,
            global_rows,
            global_cols,
        }
    }

    /// Layout of a matrix held entirely by one process.
    pub fn serial(rows: usize, cols: usize) -> Self {
        Self::new(rows, cols, rows, cols)
    }
}

/// Storage format of a primitive native matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// Compressed sparse rows split into diagonal and off-diagonal parts.
    #[default]
    Aij,
    /// Sliced ELLPACK.
    Sell,
}

/// Options that can be switched on a native matrix before finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixOption {
    /// Entries will never be written to rows owned by another process,
    /// so finalization may skip the off-process exchange.
    NoOffProcessEntries,
}

/// What a handle refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// A nested composition of sub-handles.
    Nested,
    /// A single matrix with its own storage.
    Primitive,
}

/// Capability set of a native distributed sparse-matrix library.
///
/// Handles are reference counted by the backend: [`create`](Self::create)
/// and [`build_nested`](Self::build_nested) return a handle carrying one
/// reference, [`retain`](Self::retain) adds one, [`destroy`](Self::destroy)
/// drops one. A nested composition takes its own reference on each
/// sub-handle.
///
/// Every fallible call reports failure as a [`crate::BackendError`] with the
/// native status code. Callers propagate these and never retry.
pub trait MatrixBackend {
    /// Opaque native handle.
    type Handle: Copy + Eq + Hash + Debug;

    /// Create an unshaped primitive matrix over `group`.
    ///
    /// # Collective
    /// Over `group`.
    fn create(&self, group: &ProcessGroup) -> BackendResult<Self::Handle>;

    /// Set local and global dimensions.
    fn set_shape(&self, mat: Self::Handle, layout: Layout) -> BackendResult<()>;

    /// Choose the storage format.
    ///
    /// # Collective
    /// Over the handle's group.
    fn set_storage_kind(&self, mat: Self::Handle, kind: StorageKind) -> BackendResult<()>;

    /// Switch an option on or off.
    fn set_option(&self, mat: Self::Handle, option: MatrixOption, flag: bool) -> BackendResult<()>;

    /// Preallocate storage for the entries of `pattern`.
    ///
    /// The pattern spans the global dimensions; each process reserves the
    /// rows it owns.
    ///
    /// # Collective
    /// Over the handle's group.
    fn preallocate(&self, mat: Self::Handle, pattern: &SparsityPattern) -> BackendResult<()>;

    /// Start finalization (assembly).
    ///
    /// # Collective
    /// Over the handle's group.
    fn finalize_begin(&self, mat: Self::Handle) -> BackendResult<()>;

    /// Complete finalization. The matrix is usable afterwards.
    ///
    /// # Collective
    /// Over the handle's group.
    fn finalize_end(&self, mat: Self::Handle) -> BackendResult<()>;

    /// Add a reference to `mat`.
    fn retain(&self, mat: Self::Handle) -> BackendResult<()>;

    /// Drop one reference to `mat`; the resource is freed with the last one.
    ///
    /// # Collective
    /// Over the handle's group.
    fn destroy(&self, mat: Self::Handle) -> BackendResult<()>;

    /// Whether `mat` is a nested composition.
    fn inspect_kind(&self, mat: Self::Handle) -> BackendResult<HandleKind>;

    /// Block grid shape of a nested composition.
    fn nested_shape(&self, mat: Self::Handle) -> BackendResult<(usize, usize)>;

    /// Sub-handle at `(row, col)` of a nested composition, `None` for a null
    /// entry. No reference is added.
    fn nested_get(
        &self,
        mat: Self::Handle,
        row: usize,
        col: usize,
    ) -> BackendResult<Option<Self::Handle>>;

    /// Compose `n_rows × n_cols` sub-handles (row-major) into one matrix.
    ///
    /// # Collective
    /// Over `group`.
    fn build_nested(
        &self,
        group: &ProcessGroup,
        n_rows: usize,
        n_cols: usize,
        subs: &[Option<Self::Handle>],
    ) -> BackendResult<Self::Handle>;

    /// Local and global dimensions.
    fn layout(&self, mat: Self::Handle) -> BackendResult<Layout>;

    /// Number of stored entries summed over the group.
    ///
    /// # Collective
    /// Over the handle's group (a reduction).
    fn nonzero_count(&self, mat: Self::Handle) -> BackendResult<u64>;

    /// Rows owned by the calling process.
    fn owned_row_index_set(&self, mat: Self::Handle) -> BackendResult<IndexSet>;

    /// Domain columns owned by the calling process.
    fn owned_col_index_set(&self, mat: Self::Handle) -> BackendResult<IndexSet>;

    /// The group `mat` is defined over, if the handle is live.
    fn associated_process_group(&self, mat: Self::Handle) -> Option<ProcessGroup>;

    /// Rows owned by the calling process.
    fn local_row_count(&self, mat: Self::Handle) -> BackendResult<usize> {
        Ok(self.layout(mat)?.local_rows)
    }

    /// Domain columns owned by the calling process.
    fn local_col_count(&self, mat: Self::Handle) -> BackendResult<usize> {
        Ok(self.layout(mat)?.local_cols)
    }

    /// Rows across the group.
    fn global_row_count(&self, mat: Self::Handle) -> BackendResult<usize> {
        Ok(self.layout(mat)?.global_rows)
    }

    /// Columns across the group.
    fn global_col_count(&self, mat: Self::Handle) -> BackendResult<usize> {
        Ok(self.layout(mat)?.global_cols)
    }
}
