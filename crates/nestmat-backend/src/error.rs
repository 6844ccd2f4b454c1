//! Error type for native backend operations.

use thiserror::Error;

/// Native status code.
pub type StatusCode = i32;

// Status codes reported by backends. The numbering follows the usual
// native sparse-matrix library convention so codes can be passed through
// unchanged from a real implementation.
pub const STATUS_ERR_SUP: StatusCode = 56;
pub const STATUS_ERR_ARG_SIZ: StatusCode = 60;
pub const STATUS_ERR_ARG_WRONG: StatusCode = 62;
pub const STATUS_ERR_ARG_OUTOFRANGE: StatusCode = 63;
pub const STATUS_ERR_ARG_WRONGSTATE: StatusCode = 73;
pub const STATUS_ERR_ARG_INCOMP: StatusCode = 75;
pub const STATUS_ERR_ARG_NOTSAMECOMM: StatusCode = 80;
pub const STATUS_ERR_ARG_NULL: StatusCode = 85;

/// A native operation failed.
///
/// Carries the name of the failing capability and the native status code
/// verbatim. Backend errors are never retried by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("native operation `{operation}` failed with status code {code}")]
pub struct BackendError {
    /// Name of the capability that failed (e.g. `"create"`).
    pub operation: &'static str,
    /// Native status code.
    pub code: StatusCode,
}

impl BackendError {
    /// Create a new backend error.
    pub fn new(operation: &'static str, code: StatusCode) -> Self {
        Self { operation, code }
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
