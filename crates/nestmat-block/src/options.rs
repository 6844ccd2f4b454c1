//! Configuration options for block matrix composition.

use nestmat_backend::{ProcessGroup, StorageKind};

/// How synchronization treats real blocks that disagree on a row or column size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizeCheck {
    /// Reject disagreeing global sizes with `InvalidSize` before any
    /// collective call. Local sizes are left to the backend, since they may
    /// differ on only some processes.
    #[default]
    Strict,
    /// Take the last real block's sizes per row and column without checking
    /// the others; the backend reports any mismatch when composing.
    LastWriterWins,
}

/// Options for [`crate::BlockMatrixComposer`].
///
/// # Example
///
/// ```
/// use nestmat_backend::{ProcessGroup, StorageKind};
/// use nestmat_block::{ComposerOptions, SizeCheck};
///
/// let opts = ComposerOptions::default()
///     .with_fallback_group(ProcessGroup::new(3, 0, 1))
///     .with_placeholder_storage(StorageKind::Sell)
///     .with_size_check(SizeCheck::LastWriterWins);
/// assert_eq!(opts.fallback_group.id(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct ComposerOptions {
    /// Group reported by `process_group()` while no aggregate exists.
    pub fallback_group: ProcessGroup,

    /// Storage kind for synthesized placeholder blocks.
    pub placeholder_storage: StorageKind,

    /// Consistency check applied while collecting block sizes.
    pub size_check: SizeCheck,
}

impl Default for ComposerOptions {
    fn default() -> Self {
        Self {
            fallback_group: ProcessGroup::local(),
            placeholder_storage: StorageKind::Aij,
            size_check: SizeCheck::Strict,
        }
    }
}

impl ComposerOptions {
    /// Set the fallback process group.
    pub fn with_fallback_group(mut self, group: ProcessGroup) -> Self {
        self.fallback_group = group;
        self
    }

    /// Set the placeholder storage kind.
    pub fn with_placeholder_storage(mut self, storage: StorageKind) -> Self {
        self.placeholder_storage = storage;
        self
    }

    /// Set the size consistency check.
    pub fn with_size_check(mut self, size_check: SizeCheck) -> Self {
        self.size_check = size_check;
        self
    }
}
