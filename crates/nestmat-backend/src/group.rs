//! Process group identity.

use std::fmt;

/// The set of cooperating processes a distributed resource is partitioned over.
///
/// A `ProcessGroup` is a plain value: it names a group (`id`) and the calling
/// process's position in it. Creating and tearing down the underlying
/// communicator is the caller's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessGroup {
    id: u64,
    rank: usize,
    size: usize,
}

impl ProcessGroup {
    /// Identifier of the process-local group.
    pub const LOCAL_ID: u64 = 0;

    /// Create a group handle.
    ///
    /// # Panics
    /// If `size == 0` or `rank >= size`.
    pub fn new(id: u64, rank: usize, size: usize) -> Self {
        assert!(size > 0, "Process group must contain at least one process");
        assert!(rank < size, "Rank {} out of range for group of size {}", rank, size);
        Self { id, rank, size }
    }

    /// The group containing only the calling process.
    pub const fn local() -> Self {
        Self {
            id: Self::LOCAL_ID,
            rank: 0,
            size: 1,
        }
    }

    /// Group identifier.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Rank of the calling process within the group.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of processes in the group.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this is the process-local group.
    pub fn is_local(&self) -> bool {
        self.id == Self::LOCAL_ID && self.size == 1
    }
}

impl Default for ProcessGroup {
    fn default() -> Self {
        Self::local()
    }
}

impl fmt::Display for ProcessGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}[{}/{}]", self.id, self.rank, self.size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_group() {
        let g = ProcessGroup::local();
        assert!(g.is_local());
        assert_eq!(g.rank(), 0);
        assert_eq!(g.size(), 1);
        assert_eq!(g, ProcessGroup::default());
    }

    #[test]
    fn test_named_group_is_not_local() {
        let g = ProcessGroup::new(7, 0, 1);
        assert!(!g.is_local());
        assert_eq!(g.id(), 7);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_rank_out_of_range() {
        let _ = ProcessGroup::new(1, 2, 2);
    }
}
