//! Error types for block matrix composition.

use nestmat_backend::BackendError;
use thiserror::Error;

/// Error type for block matrix operations.
#[derive(Debug, Error)]
pub enum BlockMatrixError {
    /// Caller-supplied sizes or partitions disagree with the block grid.
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    /// Block index is outside the grid.
    #[error("Block index {index:?} out of range for shape {shape:?}")]
    IndexOutOfRange {
        index: Vec<usize>,
        shape: Vec<usize>,
    },

    /// A native backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The operation was used in a state that does not allow it.
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),
}

/// Result type for block matrix operations.
pub type Result<T> = std::result::Result<T, BlockMatrixError>;
