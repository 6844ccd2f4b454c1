//! Block-structured distributed sparse matrices composed into one nested matrix.
//!
//! A solver sees one distributed matrix; the application assembles an R×C
//! grid of independently owned blocks. This crate keeps the two consistent:
//! it tracks the block grid, fills missing blocks with empty placeholders,
//! derives the global row/column partitioning from the blocks, and rebuilds
//! the native nested aggregate whenever the structure changes.
//!
//! # Core Types
//!
//! - [`BlockMatrixComposer`]: owns the grid and the aggregate
//! - [`DistributedMatrixBlock`]: one block, wrapping an [`OwnedMat`]
//! - [`BlockIndexing`]: block sizes and offsets along one axis
//! - [`PlaceholderBlockFactory`]: empty blocks for unassigned cells
//! - [`NestedAggregate`] / [`AggregateView`]: owning and borrowed aggregate
//!
//! Native matrices are reached only through a
//! [`MatrixBackend`](nestmat_backend::MatrixBackend). Operations that touch the
//! backend are collective; see the `nestmat-backend` crate documentation.

mod aggregate;
mod block;
mod composer;
mod error;
mod handle;
mod indexing;
mod options;
mod placeholder;
mod sparsity;

pub use aggregate::{AggregateView, NestedAggregate};
pub use block::DistributedMatrixBlock;
pub use composer::{BlockMatrixComposer, ComposerState};
pub use error::{BlockMatrixError, Result};
pub use handle::OwnedMat;
pub use indexing::BlockIndexing;
pub use options::{ComposerOptions, SizeCheck};
pub use placeholder::PlaceholderBlockFactory;
pub use sparsity::BlockSparsityPattern;
