//! Exclusive ownership of one native matrix reference.

use std::fmt;
use std::sync::Arc;

use nestmat_backend::{BackendResult, MatrixBackend};
use tracing::error;

/// Owns one reference to a native matrix and drops it exactly once.
///
/// `OwnedMat` is move-only: a distributed resource is never implicitly
/// copied. Dropping it releases the reference through
/// [`MatrixBackend::destroy`]; use [`OwnedMat::release`] to observe the
/// outcome instead. Release failures during `Drop` are logged, and trip a
/// debug assertion unless the thread is already unwinding.
pub struct OwnedMat<B: MatrixBackend> {
    backend: Arc<B>,
    /// `None` once released.
    handle: Option<B::Handle>,
}

impl<B: MatrixBackend> OwnedMat<B> {
    /// Take over a reference the caller already holds (e.g. from `create`).
    pub fn from_raw(backend: Arc<B>, handle: B::Handle) -> Self {
        Self {
            backend,
            handle: Some(handle),
        }
    }

    /// Take a new reference on a handle owned elsewhere.
    ///
    /// The caller keeps its own reference.
    pub fn adopt(backend: Arc<B>, handle: B::Handle) -> BackendResult<Self> {
        backend.retain(handle)?;
        Ok(Self::from_raw(backend, handle))
    }

    /// The native handle.
    pub fn handle(&self) -> B::Handle {
        match self.handle {
            Some(handle) => handle,
            // `handle` is only taken in `release` and `drop`, both of which consume `self`.
            None => unreachable!("OwnedMat used after release"),
        }
    }

    /// The backend the handle belongs to.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Release the reference, reporting native failure.
    pub fn release(mut self) -> BackendResult<()> {
        match self.handle.take() {
            Some(handle) => self.backend.destroy(handle),
            None => Ok(()),
        }
    }
}

impl<B: MatrixBackend> Drop for OwnedMat<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(err) = self.backend.destroy(handle) {
                error!(?handle, %err, "failed to release native matrix");
                debug_assert!(
                    std::thread::panicking(),
                    "failed to release native matrix {:?}: {}",
                    handle,
                    err
                );
            }
        }
    }
}

impl<B: MatrixBackend> fmt::Debug for OwnedMat<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedMat")
            .field("handle", &self.handle)
            .finish()
    }
}
