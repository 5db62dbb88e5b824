use crate::id::SentenceId;

/// Invalidation is a record of why a cached result was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Invalidation {
    /// The sentence whose cache entry was discarded.
    pub sentence: SentenceId,
    /// The sentence the invalidation started from.
    pub source: SentenceId,
    /// The direct dependency through which the invalidation arrived.
    pub dependency: SentenceId,
    /// Why the entry was discarded.
    pub reason: InvalidationReason,
}

impl Invalidation {
    /// Create a new invalidation as source.
    pub fn new_source(source: SentenceId, reason: InvalidationReason) -> Self {
        Self {
            sentence: source,
            source,
            dependency: source,
            reason,
        }
    }

    /// Create the invalidation of `sentence` caused by this one reaching `dependency`.
    pub(crate) fn propagated(
        &self,
        sentence: SentenceId,
        dependency: SentenceId,
        reason: InvalidationReason,
    ) -> Self {
        Self {
            sentence,
            source: self.source,
            dependency,
            reason,
        }
    }
}

/// InvalidationReason is a reason why a cache entry is invalidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InvalidationReason {
    /// The sentence itself was edited, deleted or rescheduled.
    Edited,
    /// A sentence it depends on was invalidated.
    DependencyInvalidated,
    /// It was a step of a delegated proof whose pending job was dropped.
    DelegatedJobDropped,
}
