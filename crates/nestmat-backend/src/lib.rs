//! Native distributed sparse-matrix backend contract.
//!
//! The block composer in `nestmat-block` never touches a matrix storage
//! format directly. Every matrix it owns lives behind an opaque handle
//! managed by a [`MatrixBackend`], which exposes a fixed capability set:
//! creation, shaping, preallocation, finalization, reference counting,
//! nested composition, and read accessors.
//!
//! This crate provides:
//! - [`MatrixBackend`]: the capability contract (the seam)
//! - [`ProcessGroup`], [`IndexSet`], [`SparsityPattern`], [`Layout`]: value types
//!   passed across the seam
//! - [`BackendError`]: native failures carrying a status code
//! - [`LocalBackend`]: an in-process, single-rank reference implementation
//!
//! ## Collective operations
//!
//! Backend methods documented under a `# Collective` heading must be called by
//! every process of the handle's [`ProcessGroup`], in the same order and with
//! matching arguments. They behave like barriers: a process that skips one
//! hangs the whole group. [`LocalBackend`] records each collective call so
//! tests can check that two processes would stay in lockstep.

mod backend;
mod error;
mod group;
mod index_set;
mod local;
mod sparsity;

pub use backend::{HandleKind, Layout, MatrixBackend, MatrixOption, StorageKind};
pub use error::{
    BackendError, BackendResult, StatusCode, STATUS_ERR_ARG_INCOMP, STATUS_ERR_ARG_NOTSAMECOMM,
    STATUS_ERR_ARG_NULL, STATUS_ERR_ARG_OUTOFRANGE, STATUS_ERR_ARG_SIZ, STATUS_ERR_ARG_WRONG,
    STATUS_ERR_ARG_WRONGSTATE, STATUS_ERR_SUP,
};
pub use group::ProcessGroup;
pub use index_set::IndexSet;
pub use local::{CollectiveCall, LocalBackend, MatId};
pub use sparsity::SparsityPattern;
