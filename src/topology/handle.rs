//! `EntityHandle`: a strong, zero-cost handle for mesh entities.
//!
//! The mesh database addresses every vertex, edge, face and cell by an
//! opaque identifier. `EntityHandle` wraps a nonzero `u64` so that 0 stays
//! reserved as an invalid/sentinel value, with `repr(transparent)` layout
//! guarantees for cheap storage in flat arrays.

use crate::error::ReconcileError;
use std::{fmt, num::NonZeroU64};

/// Opaque identifier for a mesh vertex or element, owned by the mesh database.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct EntityHandle(NonZeroU64);

impl EntityHandle {
    /// Creates a handle from a raw `u64`, rejecting the reserved value 0.
    #[inline]
    pub fn new(raw: u64) -> Result<Self, ReconcileError> {
        NonZeroU64::new(raw)
            .map(EntityHandle)
            .ok_or(ReconcileError::InvalidHandle)
    }

    /// Returns the raw `u64` behind this handle.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Debug for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityHandle").field(&self.get()).finish()
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// A contiguous run of handles allocated in one database request.
///
/// Handle arithmetic between file-local indices and the canonical handle
/// space goes through [`EntityRange::handle`]; raw integer offsets are never
/// mixed with handles directly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EntityRange {
    start: EntityHandle,
    count: usize,
}

impl EntityRange {
    /// Builds a range from its first handle and length.
    pub fn new(start: EntityHandle, count: usize) -> Self {
        Self { start, count }
    }

    /// First handle in the range.
    pub fn start(&self) -> EntityHandle {
        self.start
    }

    /// Number of handles in the range.
    pub fn len(&self) -> usize {
        self.count
    }

    /// True when the range holds no handles.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Handle at a 0-based offset into the range, if in bounds.
    pub fn handle(&self, offset: usize) -> Option<EntityHandle> {
        if offset < self.count {
            // start is nonzero and offsets stay within the allocated run
            NonZeroU64::new(self.start.get() + offset as u64).map(EntityHandle)
        } else {
            None
        }
    }

    /// Iterates all handles in the range in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = EntityHandle> + '_ {
        (0..self.count).filter_map(move |i| self.handle(i))
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::{assert_eq_align, assert_eq_size};

    assert_eq_size!(EntityHandle, u64);

    #[test]
    fn alignment_matches_u64() {
        assert_eq_align!(EntityHandle, u64);
    }
}
