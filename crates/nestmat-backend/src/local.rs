//! In-process, single-rank reference backend.
//!
//! [`LocalBackend`] keeps every matrix in a handle table guarded by a mutex.
//! It only accepts single-process groups, so a process owns every row and
//! column of each matrix it creates. It enforces the same call-order rules
//! a native library would (shape before preallocation, finalization before
//! use in a nested composition, matching sizes across a nested row/column)
//! and reports violations with native status codes.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::backend::{HandleKind, Layout, MatrixBackend, MatrixOption, StorageKind};
use crate::error::{
    BackendError, BackendResult, StatusCode, STATUS_ERR_ARG_INCOMP, STATUS_ERR_ARG_NOTSAMECOMM,
    STATUS_ERR_ARG_NULL, STATUS_ERR_ARG_OUTOFRANGE, STATUS_ERR_ARG_SIZ, STATUS_ERR_ARG_WRONG,
    STATUS_ERR_ARG_WRONGSTATE, STATUS_ERR_SUP,
};
use crate::group::ProcessGroup;
use crate::index_set::IndexSet;
use crate::sparsity::SparsityPattern;

/// Handle into a [`LocalBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatId(u64);

impl MatId {
    /// Raw numeric id.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mat#{}", self.0)
    }
}

/// One collective call observed by a [`LocalBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectiveCall {
    /// Capability name, e.g. `"build_nested"`.
    pub operation: &'static str,
    /// Id of the group the call was collective over.
    pub group: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Building,
    Finalizing,
    Final,
}

#[derive(Debug)]
struct Primitive {
    layout: Option<Layout>,
    storage: Option<StorageKind>,
    reserved: Option<u64>,
    no_off_process: bool,
    phase: Phase,
}

#[derive(Debug)]
struct Nested {
    n_rows: usize,
    n_cols: usize,
    subs: Vec<Option<MatId>>,
    layout: Layout,
}

#[derive(Debug)]
enum Body {
    Primitive(Primitive),
    Nested(Nested),
}

#[derive(Debug)]
struct Entry {
    group: ProcessGroup,
    refs: usize,
    body: Body,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    mats: HashMap<MatId, Entry>,
    trace: Vec<CollectiveCall>,
    fault: Option<(&'static str, StatusCode)>,
}

impl State {
    fn check_fault(&mut self, operation: &'static str) -> BackendResult<()> {
        if let Some((op, code)) = self.fault {
            if op == operation {
                self.fault = None;
                return Err(BackendError::new(operation, code));
            }
        }
        Ok(())
    }

    fn record(&mut self, operation: &'static str, group: &ProcessGroup) {
        self.trace.push(CollectiveCall {
            operation,
            group: group.id(),
        });
    }

    /// Record a collective call on an existing handle, then apply any pending fault.
    fn enter_collective(&mut self, operation: &'static str, mat: MatId) -> BackendResult<()> {
        let group = self.entry(operation, mat)?.group;
        self.record(operation, &group);
        self.check_fault(operation)
    }

    fn entry(&self, operation: &'static str, mat: MatId) -> BackendResult<&Entry> {
        self.mats
            .get(&mat)
            .ok_or(BackendError::new(operation, STATUS_ERR_ARG_WRONG))
    }

    fn entry_mut(&mut self, operation: &'static str, mat: MatId) -> BackendResult<&mut Entry> {
        self.mats
            .get_mut(&mat)
            .ok_or(BackendError::new(operation, STATUS_ERR_ARG_WRONG))
    }

    fn primitive_mut(
        &mut self,
        operation: &'static str,
        mat: MatId,
    ) -> BackendResult<&mut Primitive> {
        match &mut self.entry_mut(operation, mat)?.body {
            Body::Primitive(p) => Ok(p),
            Body::Nested(_) => Err(BackendError::new(operation, STATUS_ERR_ARG_WRONG)),
        }
    }

    fn nested(&self, operation: &'static str, mat: MatId) -> BackendResult<&Nested> {
        match &self.entry(operation, mat)?.body {
            Body::Nested(n) => Ok(n),
            Body::Primitive(_) => Err(BackendError::new(operation, STATUS_ERR_ARG_WRONG)),
        }
    }

    /// Layout of a matrix that is ready to be read or composed.
    fn finished_layout(&self, operation: &'static str, mat: MatId) -> BackendResult<Layout> {
        match &self.entry(operation, mat)?.body {
            Body::Primitive(p) => match (p.phase, p.layout) {
                (Phase::Final, Some(layout)) => Ok(layout),
                _ => Err(BackendError::new(operation, STATUS_ERR_ARG_WRONGSTATE)),
            },
            Body::Nested(n) => Ok(n.layout),
        }
    }

    fn nonzeros(&self, mat: MatId) -> BackendResult<u64> {
        const OP: &str = "nonzero_count";
        match &self.entry(OP, mat)?.body {
            Body::Primitive(p) => match p.phase {
                Phase::Final => Ok(p.reserved.unwrap_or(0)),
                _ => Err(BackendError::new(OP, STATUS_ERR_ARG_WRONGSTATE)),
            },
            Body::Nested(n) => n
                .subs
                .iter()
                .flatten()
                .try_fold(0u64, |acc, &sub| -> BackendResult<u64> {
                    Ok(acc + self.nonzeros(sub)?)
                }),
        }
    }

    fn release(&mut self, mat: MatId) -> BackendResult<()> {
        let entry = self.entry_mut("destroy", mat)?;
        entry.refs -= 1;
        if entry.refs > 0 {
            return Ok(());
        }
        if let Some(entry) = self.mats.remove(&mat) {
            trace!(handle = %mat, "freed native matrix");
            if let Body::Nested(nested) = entry.body {
                for sub in nested.subs.into_iter().flatten() {
                    self.release(sub)?;
                }
            }
        }
        Ok(())
    }
}

/// In-process reference implementation of [`MatrixBackend`].
///
/// Besides the backend contract it offers introspection used by tests:
/// live handle and reference counts, the ordered trace of collective calls,
/// and one-shot fault injection.
///
/// # Example
///
/// ```
/// use nestmat_backend::{Layout, LocalBackend, MatrixBackend, ProcessGroup, SparsityPattern, StorageKind};
///
/// let backend = LocalBackend::new();
/// let mat = backend.create(&ProcessGroup::local()).unwrap();
/// backend.set_shape(mat, Layout::serial(2, 2)).unwrap();
/// backend.set_storage_kind(mat, StorageKind::Aij).unwrap();
/// backend.preallocate(mat, &SparsityPattern::from_entries(2, 2, [(0, 0), (1, 1)])).unwrap();
/// backend.finalize_begin(mat).unwrap();
/// backend.finalize_end(mat).unwrap();
///
/// assert_eq!(backend.nonzero_count(mat).unwrap(), 2);
/// backend.destroy(mat).unwrap();
/// assert_eq!(backend.live_handles(), 0);
/// ```
#[derive(Debug, Default)]
pub struct LocalBackend {
    state: Mutex<State>,
}

impl LocalBackend {
    /// Create a backend with an empty handle table.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of handles not yet freed.
    pub fn live_handles(&self) -> usize {
        self.state().mats.len()
    }

    /// Current reference count of `mat`, `None` once freed.
    pub fn ref_count(&self, mat: MatId) -> Option<usize> {
        self.state().mats.get(&mat).map(|e| e.refs)
    }

    /// Storage kind of a primitive matrix, if set.
    pub fn storage_kind(&self, mat: MatId) -> Option<StorageKind> {
        match &self.state().mats.get(&mat)?.body {
            Body::Primitive(p) => p.storage,
            Body::Nested(_) => None,
        }
    }

    /// Whether `option` is switched on for `mat`.
    pub fn has_option(&self, mat: MatId, option: MatrixOption) -> bool {
        match self.state().mats.get(&mat).map(|e| &e.body) {
            Some(Body::Primitive(p)) => match option {
                MatrixOption::NoOffProcessEntries => p.no_off_process,
            },
            _ => false,
        }
    }

    /// Collective calls observed so far, in call order.
    pub fn collective_trace(&self) -> Vec<CollectiveCall> {
        self.state().trace.clone()
    }

    /// Forget the recorded collective calls.
    pub fn clear_trace(&self) {
        self.state().trace.clear();
    }

    /// Make the next call of `operation` fail with `code`.
    pub fn fail_next(&self, operation: &'static str, code: StatusCode) {
        self.state().fault = Some((operation, code));
    }
}

impl MatrixBackend for LocalBackend {
    type Handle = MatId;

    fn create(&self, group: &ProcessGroup) -> BackendResult<MatId> {
        const OP: &str = "create";
        let mut state = self.state();
        state.record(OP, group);
        state.check_fault(OP)?;
        if group.size() != 1 {
            return Err(BackendError::new(OP, STATUS_ERR_SUP));
        }
        state.next_id += 1;
        let id = MatId(state.next_id);
        state.mats.insert(
            id,
            Entry {
                group: *group,
                refs: 1,
                body: Body::Primitive(Primitive {
                    layout: None,
                    storage: None,
                    reserved: None,
                    no_off_process: false,
                    phase: Phase::Building,
                }),
            },
        );
        trace!(handle = %id, %group, "created native matrix");
        Ok(id)
    }

    fn set_shape(&self, mat: MatId, layout: Layout) -> BackendResult<()> {
        const OP: &str = "set_shape";
        let mut state = self.state();
        state.check_fault(OP)?;
        let p = state.primitive_mut(OP, mat)?;
        if p.phase != Phase::Building {
            return Err(BackendError::new(OP, STATUS_ERR_ARG_WRONGSTATE));
        }
        // A single rank owns everything.
        if layout.local_rows != layout.global_rows || layout.local_cols != layout.global_cols {
            return Err(BackendError::new(OP, STATUS_ERR_ARG_SIZ));
        }
        p.layout = Some(layout);
        Ok(())
    }

    fn set_storage_kind(&self, mat: MatId, kind: StorageKind) -> BackendResult<()> {
        const OP: &str = "set_storage_kind";
        let mut state = self.state();
        state.enter_collective(OP, mat)?;
        let p = state.primitive_mut(OP, mat)?;
        if p.phase != Phase::Building {
            return Err(BackendError::new(OP, STATUS_ERR_ARG_WRONGSTATE));
        }
        p.storage = Some(kind);
        Ok(())
    }

    fn set_option(&self, mat: MatId, option: MatrixOption, flag: bool) -> BackendResult<()> {
        const OP: &str = "set_option";
        let mut state = self.state();
        state.check_fault(OP)?;
        let p = state.primitive_mut(OP, mat)?;
        match option {
            MatrixOption::NoOffProcessEntries => p.no_off_process = flag,
        }
        Ok(())
    }

    fn preallocate(&self, mat: MatId, pattern: &SparsityPattern) -> BackendResult<()> {
        const OP: &str = "preallocate";
        let mut state = self.state();
        state.enter_collective(OP, mat)?;
        let p = state.primitive_mut(OP, mat)?;
        let layout = match (p.phase, p.layout, p.storage) {
            (Phase::Building, Some(layout), Some(_)) => layout,
            _ => return Err(BackendError::new(OP, STATUS_ERR_ARG_WRONGSTATE)),
        };
        if pattern.n_rows() != layout.global_rows || pattern.n_cols() != layout.global_cols {
            return Err(BackendError::new(OP, STATUS_ERR_ARG_SIZ));
        }
        p.reserved = Some(pattern.n_nonzero_elements() as u64);
        Ok(())
    }

    fn finalize_begin(&self, mat: MatId) -> BackendResult<()> {
        const OP: &str = "finalize_begin";
        let mut state = self.state();
        state.enter_collective(OP, mat)?;
        let p = state.primitive_mut(OP, mat)?;
        if p.layout.is_none() || p.storage.is_none() || p.phase == Phase::Finalizing {
            return Err(BackendError::new(OP, STATUS_ERR_ARG_WRONGSTATE));
        }
        p.phase = Phase::Finalizing;
        Ok(())
    }

    fn finalize_end(&self, mat: MatId) -> BackendResult<()> {
        const OP: &str = "finalize_end";
        let mut state = self.state();
        state.enter_collective(OP, mat)?;
        let p = state.primitive_mut(OP, mat)?;
        if p.phase != Phase::Finalizing {
            return Err(BackendError::new(OP, STATUS_ERR_ARG_WRONGSTATE));
        }
        p.reserved.get_or_insert(0);
        p.phase = Phase::Final;
        Ok(())
    }

    fn retain(&self, mat: MatId) -> BackendResult<()> {
        const OP: &str = "retain";
        let mut state = self.state();
        state.check_fault(OP)?;
        state.entry_mut(OP, mat)?.refs += 1;
        Ok(())
    }

    fn destroy(&self, mat: MatId) -> BackendResult<()> {
        const OP: &str = "destroy";
        let mut state = self.state();
        state.enter_collective(OP, mat)?;
        state.release(mat)
    }

    fn inspect_kind(&self, mat: MatId) -> BackendResult<HandleKind> {
        match self.state().entry("inspect_kind", mat)?.body {
            Body::Primitive(_) => Ok(HandleKind::Primitive),
            Body::Nested(_) => Ok(HandleKind::Nested),
        }
    }

    fn nested_shape(&self, mat: MatId) -> BackendResult<(usize, usize)> {
        let state = self.state();
        let nested = state.nested("nested_shape", mat)?;
        Ok((nested.n_rows, nested.n_cols))
    }

    fn nested_get(&self, mat: MatId, row: usize, col: usize) -> BackendResult<Option<MatId>> {
        const OP: &str = "nested_get";
        let state = self.state();
        let nested = state.nested(OP, mat)?;
        if row >= nested.n_rows || col >= nested.n_cols {
            return Err(BackendError::new(OP, STATUS_ERR_ARG_OUTOFRANGE));
        }
        Ok(nested.subs[row * nested.n_cols + col])
    }

    fn build_nested(
        &self,
        group: &ProcessGroup,
        n_rows: usize,
        n_cols: usize,
        subs: &[Option<MatId>],
    ) -> BackendResult<MatId> {
        const OP: &str = "build_nested";
        let mut state = self.state();
        state.record(OP, group);
        state.check_fault(OP)?;
        if n_rows == 0 || n_cols == 0 || subs.len() != n_rows * n_cols {
            return Err(BackendError::new(OP, STATUS_ERR_ARG_SIZ));
        }

        let mut rows: Vec<Option<(usize, usize)>> = vec![None; n_rows];
        let mut cols: Vec<Option<(usize, usize)>> = vec![None; n_cols];
        for (linear, sub) in subs.iter().enumerate() {
            let Some(sub) = *sub else { continue };
            if state.entry(OP, sub)?.group != *group {
                return Err(BackendError::new(OP, STATUS_ERR_ARG_NOTSAMECOMM));
            }
            let layout = state.finished_layout(OP, sub)?;
            let (r, c) = (linear / n_cols, linear % n_cols);
            for (slot, sizes) in [
                (&mut rows[r], (layout.local_rows, layout.global_rows)),
                (&mut cols[c], (layout.local_cols, layout.global_cols)),
            ] {
                match *slot {
                    Some(existing) if existing != sizes => {
                        return Err(BackendError::new(OP, STATUS_ERR_ARG_INCOMP));
                    }
                    _ => *slot = Some(sizes),
                }
            }
        }

        let mut layout = Layout::default();
        for sizes in &rows {
            let (local, global) = sizes.ok_or(BackendError::new(OP, STATUS_ERR_ARG_NULL))?;
            layout.local_rows += local;
            layout.global_rows += global;
        }
        for sizes in &cols {
            let (local, global) = sizes.ok_or(BackendError::new(OP, STATUS_ERR_ARG_NULL))?;
            layout.local_cols += local;
            layout.global_cols += global;
        }

        for sub in subs.iter().flatten() {
            state.entry_mut(OP, *sub)?.refs += 1;
        }
        state.next_id += 1;
        let id = MatId(state.next_id);
        state.mats.insert(
            id,
            Entry {
                group: *group,
                refs: 1,
                body: Body::Nested(Nested {
                    n_rows,
                    n_cols,
                    subs: subs.to_vec(),
                    layout,
                }),
            },
        );
        trace!(handle = %id, n_rows, n_cols, "built nested matrix");
        Ok(id)
    }

    fn layout(&self, mat: MatId) -> BackendResult<Layout> {
        const OP: &str = "layout";
        match &self.state().entry(OP, mat)?.body {
            Body::Primitive(p) => p
                .layout
                .ok_or(BackendError::new(OP, STATUS_ERR_ARG_WRONGSTATE)),
            Body::Nested(n) => Ok(n.layout),
        }
    }

    fn nonzero_count(&self, mat: MatId) -> BackendResult<u64> {
        const OP: &str = "nonzero_count";
        let mut state = self.state();
        state.enter_collective(OP, mat)?;
        state.nonzeros(mat)
    }

    fn owned_row_index_set(&self, mat: MatId) -> BackendResult<IndexSet> {
        let layout = self.layout(mat)?;
        Ok(IndexSet::from_range(layout.global_rows, 0..layout.local_rows))
    }

    fn owned_col_index_set(&self, mat: MatId) -> BackendResult<IndexSet> {
        let layout = self.layout(mat)?;
        Ok(IndexSet::from_range(layout.global_cols, 0..layout.local_cols))
    }

    fn associated_process_group(&self, mat: MatId) -> Option<ProcessGroup> {
        self.state().mats.get(&mat).map(|e| e.group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finalized(backend: &LocalBackend, rows: usize, cols: usize, nnz: &[(usize, usize)]) -> MatId {
        let mat = backend.create(&ProcessGroup::local()).unwrap();
        backend.set_shape(mat, Layout::serial(rows, cols)).unwrap();
        backend.set_storage_kind(mat, StorageKind::Aij).unwrap();
        backend
            .preallocate(mat, &SparsityPattern::from_entries(rows, cols, nnz.iter().copied()))
            .unwrap();
        backend.finalize_begin(mat).unwrap();
        backend.finalize_end(mat).unwrap();
        mat
    }

    #[test]
    fn test_primitive_lifecycle() {
        let backend = LocalBackend::new();
        let mat = finalized(&backend, 3, 2, &[(0, 0), (2, 1)]);
        assert_eq!(backend.inspect_kind(mat).unwrap(), HandleKind::Primitive);
        assert_eq!(backend.layout(mat).unwrap(), Layout::serial(3, 2));
        assert_eq!(backend.nonzero_count(mat).unwrap(), 2);
        assert_eq!(backend.owned_row_index_set(mat).unwrap(), IndexSet::complete(3));
        assert_eq!(backend.storage_kind(mat), Some(StorageKind::Aij));
        backend.destroy(mat).unwrap();
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_double_destroy_is_reported() {
        let backend = LocalBackend::new();
        let mat = finalized(&backend, 1, 1, &[]);
        backend.destroy(mat).unwrap();
        let err = backend.destroy(mat).unwrap_err();
        assert_eq!(err.code, STATUS_ERR_ARG_WRONG);
    }

    #[test]
    fn test_preallocate_requires_shape_and_storage() {
        let backend = LocalBackend::new();
        let mat = backend.create(&ProcessGroup::local()).unwrap();
        let err = backend.preallocate(mat, &SparsityPattern::new(1, 1)).unwrap_err();
        assert_eq!(err.code, STATUS_ERR_ARG_WRONGSTATE);

        backend.set_shape(mat, Layout::serial(2, 2)).unwrap();
        backend.set_storage_kind(mat, StorageKind::Aij).unwrap();
        let err = backend.preallocate(mat, &SparsityPattern::new(3, 2)).unwrap_err();
        assert_eq!(err.code, STATUS_ERR_ARG_SIZ);
    }

    #[test]
    fn test_multi_process_group_is_unsupported() {
        let backend = LocalBackend::new();
        let err = backend.create(&ProcessGroup::new(3, 0, 2)).unwrap_err();
        assert_eq!(err.code, STATUS_ERR_SUP);
    }

    #[test]
    fn test_local_size_must_match_global() {
        let backend = LocalBackend::new();
        let mat = backend.create(&ProcessGroup::local()).unwrap();
        let err = backend.set_shape(mat, Layout::new(1, 2, 2, 2)).unwrap_err();
        assert_eq!(err.code, STATUS_ERR_ARG_SIZ);
    }

    #[test]
    fn test_nested_references_and_sizes() {
        let backend = LocalBackend::new();
        let a = finalized(&backend, 2, 2, &[(0, 0), (1, 1)]);
        let b = finalized(&backend, 3, 3, &[(0, 0)]);
        let nest = backend
            .build_nested(&ProcessGroup::local(), 2, 2, &[Some(a), None, None, Some(b)])
            .unwrap();

        assert_eq!(backend.ref_count(a), Some(2));
        assert_eq!(backend.inspect_kind(nest).unwrap(), HandleKind::Nested);
        assert_eq!(backend.nested_shape(nest).unwrap(), (2, 2));
        assert_eq!(backend.nested_get(nest, 0, 1).unwrap(), None);
        assert_eq!(backend.nested_get(nest, 1, 1).unwrap(), Some(b));
        assert_eq!(backend.layout(nest).unwrap(), Layout::serial(5, 5));
        assert_eq!(backend.nonzero_count(nest).unwrap(), 3);

        backend.destroy(a).unwrap();
        backend.destroy(b).unwrap();
        assert_eq!(backend.live_handles(), 3);
        backend.destroy(nest).unwrap();
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_nested_rejects_incompatible_rows() {
        let backend = LocalBackend::new();
        let a = finalized(&backend, 2, 2, &[]);
        let b = finalized(&backend, 3, 2, &[]);
        let err = backend
            .build_nested(&ProcessGroup::local(), 1, 2, &[Some(a), Some(b)])
            .unwrap_err();
        assert_eq!(err.code, STATUS_ERR_ARG_INCOMP);
        assert_eq!(backend.ref_count(a), Some(1));
    }

    #[test]
    fn test_nested_rejects_empty_row() {
        let backend = LocalBackend::new();
        let a = finalized(&backend, 2, 2, &[]);
        let err = backend
            .build_nested(&ProcessGroup::local(), 2, 1, &[Some(a), None])
            .unwrap_err();
        assert_eq!(err.code, STATUS_ERR_ARG_NULL);
    }

    #[test]
    fn test_nested_rejects_unfinalized_sub() {
        let backend = LocalBackend::new();
        let a = backend.create(&ProcessGroup::local()).unwrap();
        backend.set_shape(a, Layout::serial(1, 1)).unwrap();
        let err = backend
            .build_nested(&ProcessGroup::local(), 1, 1, &[Some(a)])
            .unwrap_err();
        assert_eq!(err.code, STATUS_ERR_ARG_WRONGSTATE);
    }

    #[test]
    fn test_nested_rejects_foreign_group() {
        let backend = LocalBackend::new();
        let a = finalized(&backend, 1, 1, &[]);
        let err = backend
            .build_nested(&ProcessGroup::new(9, 0, 1), 1, 1, &[Some(a)])
            .unwrap_err();
        assert_eq!(err.code, STATUS_ERR_ARG_NOTSAMECOMM);
    }

    #[test]
    fn test_fault_injection_is_one_shot() {
        let backend = LocalBackend::new();
        backend.fail_next("create", 99);
        let err = backend.create(&ProcessGroup::local()).unwrap_err();
        assert_eq!(err, BackendError::new("create", 99));
        assert!(backend.create(&ProcessGroup::local()).is_ok());
    }

    #[test]
    fn test_collective_trace_order() {
        let backend = LocalBackend::new();
        let mat = finalized(&backend, 1, 1, &[]);
        backend.destroy(mat).unwrap();
        let ops: Vec<_> = backend
            .collective_trace()
            .into_iter()
            .map(|c| c.operation)
            .collect();
        assert_eq!(
            ops,
            vec![
                "create",
                "set_storage_kind",
                "preallocate",
                "finalize_begin",
                "finalize_end",
                "destroy"
            ]
        );
        backend.clear_trace();
        assert!(backend.collective_trace().is_empty());
    }
}
