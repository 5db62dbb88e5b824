use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// SentenceId is an opaque handle of a sentence in a document.
///
/// Identities are monotonically increasing and never reused. Two sentences that look the same
/// across an edit only share an identity when the reparse diff decides they are the same sentence.
///
/// # Examples
///
/// ```
/// # use proof_flow::IdAllocator;
/// let ids = IdAllocator::new();
/// let a = ids.next();
/// let b = ids.next();
/// assert!(a < b);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SentenceId(pub u64);

impl fmt::Display for SentenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// IdAllocator hands out fresh sentence identities.
///
/// This is cheap to clone; clones share the same counter.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    next: Arc<AtomicU64>,
}

impl IdAllocator {
    /// Create a new allocator starting at zero.
    pub fn new() -> Self {
        Default::default()
    }

    /// Allocate a fresh identity.
    pub fn next(&self) -> SentenceId {
        SentenceId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// JobId identifies an outstanding delegated proof job.
///
/// `slot` is the position in the pending job table and may be reused once the job is gone;
/// `serial` is unique for the lifetime of the execution manager, so a late result for a dropped
/// job never matches a newer job living in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JobId {
    /// Slot in the pending job table.
    pub slot: usize,
    /// Unique serial number.
    pub serial: u64,
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job{}", self.serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_is_monotonic() {
        let ids = IdAllocator::new();
        let first = ids.next();
        let shared = ids.clone();
        let second = shared.next();
        let third = ids.next();
        assert_eq!(first, SentenceId(0));
        assert!(first < second && second < third);
    }

    #[test]
    fn test_display() {
        assert_eq!(SentenceId(7).to_string(), "s7");
        assert_eq!(JobId { slot: 0, serial: 3 }.to_string(), "job3");
    }
}
