//! Ownership index sets.

use std::ops::Range;

/// A subset of `0..size`, stored as sorted, disjoint, non-adjacent ranges.
///
/// Used to describe which rows or columns of a distributed matrix the
/// calling process owns. Ownership from a native backend is usually one
/// contiguous range, but the type allows arbitrary subsets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexSet {
    size: usize,
    ranges: Vec<Range<usize>>,
}

impl IndexSet {
    /// Create an empty subset of `0..size`.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ranges: Vec::new(),
        }
    }

    /// Create a subset of `0..size` containing one contiguous range.
    ///
    /// # Panics
    /// If `range` exceeds `size`.
    pub fn from_range(size: usize, range: Range<usize>) -> Self {
        let mut set = Self::new(size);
        set.add_range(range);
        set
    }

    /// Create the full set `0..size`.
    pub fn complete(size: usize) -> Self {
        Self::from_range(size, 0..size)
    }

    /// Add a range of indices, merging with existing ranges.
    ///
    /// # Panics
    /// If `range.end > size` or `range.start > range.end`.
    pub fn add_range(&mut self, range: Range<usize>) {
        assert!(
            range.start <= range.end && range.end <= self.size,
            "Range {:?} out of bounds for index set of size {}",
            range,
            self.size
        );
        if range.is_empty() {
            return;
        }
        self.ranges.push(range);
        self.ranges.sort_by_key(|r| r.start);

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(self.ranges.len());
        for r in self.ranges.drain(..) {
            match merged.last_mut() {
                Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
                _ => merged.push(r),
            }
        }
        self.ranges = merged;
    }

    /// Add a single index.
    pub fn add_index(&mut self, index: usize) {
        self.add_range(index..index + 1);
    }

    /// Size of the enclosing index space.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of indices in the set.
    pub fn n_elements(&self) -> usize {
        self.ranges.iter().map(|r| r.len()).sum()
    }

    /// Whether the set contains no indices.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Whether `index` is in the set.
    pub fn contains(&self, index: usize) -> bool {
        self.ranges
            .binary_search_by(|r| {
                if r.end <= index {
                    std::cmp::Ordering::Less
                } else if r.start > index {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Whether the set is a single contiguous range (or empty).
    pub fn is_contiguous(&self) -> bool {
        self.ranges.len() <= 1
    }

    /// The stored ranges, sorted and disjoint.
    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// Iterate over the indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.ranges.iter().flat_map(|r| r.clone())
    }
}
