//! Ordered storage of sentences by identity and by text position.
//!
//! The store keeps two indices over the same set of sentences: a hash map by identity for point
//! lookups and an ordered map by stop offset for range queries. Sentences are pairwise
//! non-overlapping, so stop offsets are unique keys. Parse errors are kept apart, keyed by their
//! stop offset as well.

use std::collections::{BTreeMap, HashMap};

use crate::error::{Error, Result};
use crate::id::SentenceId;
use crate::parser::ParsedForm;
use crate::scheduler::SchedulerState;
use crate::text::Span;

/// A sentence of the document.
#[derive(Debug, Clone, PartialEq)]
pub struct Sentence<A, S> {
    /// Identity.
    pub id: SentenceId,
    /// Start offset in the current text.
    pub start: usize,
    /// Stop offset in the current text.
    pub stop: usize,
    /// Parsed form.
    pub parsed: ParsedForm<A>,
    /// Parsing scope valid right after this sentence.
    pub scope: S,
    /// Scheduler state before this sentence.
    pub scheduler_state_before: SchedulerState,
    /// Scheduler state after this sentence.
    pub scheduler_state_after: SchedulerState,
}

impl<A, S> Sentence<A, S> {
    /// Byte span of the sentence.
    pub fn span(&self) -> Span {
        Span::new(self.start, self.stop)
    }
}

/// A span of text that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseError {
    /// Start offset.
    pub start: usize,
    /// Stop offset.
    pub stop: usize,
    /// Parser message.
    pub message: String,
}

impl ParseError {
    /// Byte span of the error.
    pub fn span(&self) -> Span {
        Span::new(self.start, self.stop)
    }
}

/// RangeStore indexes sentences by identity and by stop offset.
#[derive(Debug, Clone)]
pub struct RangeStore<A, S> {
    sentences_by_id: HashMap<SentenceId, Sentence<A, S>>,
    sentences_by_end: BTreeMap<usize, SentenceId>,
    parse_errors_by_end: BTreeMap<usize, ParseError>,
}

impl<A, S> Default for RangeStore<A, S> {
    fn default() -> Self {
        Self {
            sentences_by_id: Default::default(),
            sentences_by_end: Default::default(),
            parse_errors_by_end: Default::default(),
        }
    }
}

impl<A, S> RangeStore<A, S> {
    /// Create an empty store.
    pub fn new() -> Self {
        Default::default()
    }

    /// Insert a sentence in both indices.
    pub fn insert(&mut self, sentence: Sentence<A, S>) {
        debug_assert!(
            !self.sentences_by_end.contains_key(&sentence.stop),
            "two sentences stop at {}",
            sentence.stop
        );
        if let Some(previous) = self.sentences_by_id.get(&sentence.id) {
            self.sentences_by_end.remove(&previous.stop);
        }
        self.sentences_by_end.insert(sentence.stop, sentence.id);
        self.sentences_by_id.insert(sentence.id, sentence);
    }

    /// Remove a sentence from both indices.
    pub fn remove(&mut self, id: SentenceId) -> Option<Sentence<A, S>> {
        let sentence = self.sentences_by_id.remove(&id)?;
        self.sentences_by_end.remove(&sentence.stop);
        Some(sentence)
    }

    /// Remove and return every sentence starting at or after `offset`, in document order.
    pub fn take_after(&mut self, offset: usize) -> Vec<Sentence<A, S>> {
        let ids: Vec<_> = self
            .sentences_after(offset)
            .map(|sentence| sentence.id)
            .collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Get a sentence by identity.
    pub fn get(&self, id: SentenceId) -> Result<&Sentence<A, S>> {
        self.sentences_by_id
            .get(&id)
            .ok_or(Error::UnknownSentence(id))
    }

    /// Returns true if the sentence is stored.
    pub fn contains(&self, id: SentenceId) -> bool {
        self.sentences_by_id.contains_key(&id)
    }

    /// Returns the number of sentences.
    pub fn len(&self) -> usize {
        self.sentences_by_id.len()
    }

    /// Returns true if there are no sentences.
    pub fn is_empty(&self) -> bool {
        self.sentences_by_id.is_empty()
    }

    fn lookup(&self, id: &SentenceId) -> &Sentence<A, S> {
        &self.sentences_by_id[id]
    }

    /// The sentence containing `offset`, bounds included.
    pub fn find_sentence_at(&self, offset: usize) -> Option<&Sentence<A, S>> {
        self.sentences_by_end
            .range(offset..)
            .next()
            .map(|(_, id)| self.lookup(id))
            .filter(|sentence| sentence.start <= offset)
    }

    /// The last sentence stopping at or before `offset`.
    pub fn find_sentence_before(&self, offset: usize) -> Option<&Sentence<A, S>> {
        self.sentences_by_end
            .range(..=offset)
            .next_back()
            .map(|(_, id)| self.lookup(id))
    }

    /// The last sentence stopping strictly before `offset`.
    pub fn find_sentence_strictly_before(&self, offset: usize) -> Option<&Sentence<A, S>> {
        self.sentences_by_end
            .range(..offset)
            .next_back()
            .map(|(_, id)| self.lookup(id))
    }

    /// The first sentence starting at or after `offset`.
    pub fn find_sentence_after(&self, offset: usize) -> Option<&Sentence<A, S>> {
        self.sentences_after(offset).next()
    }

    /// The first sentence of the document.
    pub fn first_sentence(&self) -> Option<&Sentence<A, S>> {
        self.sentences_by_end
            .values()
            .next()
            .map(|id| self.lookup(id))
    }

    /// The last sentence of the document.
    pub fn last_sentence(&self) -> Option<&Sentence<A, S>> {
        self.sentences_by_end
            .values()
            .next_back()
            .map(|id| self.lookup(id))
    }

    /// Sentences stopping at or before `offset`, in document order.
    pub fn sentences_before(&self, offset: usize) -> impl Iterator<Item = &Sentence<A, S>> + '_ {
        self.sentences_by_end
            .range(..=offset)
            .map(|(_, id)| self.lookup(id))
    }

    /// Sentences starting at or after `offset`, in document order.
    pub fn sentences_after(&self, offset: usize) -> impl Iterator<Item = &Sentence<A, S>> + '_ {
        // The sentence straddling `offset`, if any, is the only one stopping after it and
        // starting before it.
        self.sentences_by_end
            .range(offset..)
            .map(|(_, id)| self.lookup(id))
            .filter(move |sentence| sentence.start >= offset)
    }

    /// All sentences in document order.
    pub fn sentences(&self) -> impl Iterator<Item = &Sentence<A, S>> + '_ {
        self.sentences_by_end.values().map(|id| self.lookup(id))
    }

    /// All identities, by the identity index.
    pub fn ids(&self) -> impl Iterator<Item = SentenceId> + '_ {
        self.sentences_by_id.keys().copied()
    }

    /// Record a parse error.
    pub fn insert_error(&mut self, error: ParseError) {
        self.parse_errors_by_end.insert(error.stop, error);
    }

    /// Remove parse errors starting at or after `offset`.
    pub fn remove_errors_from(&mut self, offset: usize) {
        self.parse_errors_by_end
            .retain(|_, error| error.start < offset);
    }

    /// All parse errors in document order.
    pub fn parse_errors(&self) -> impl Iterator<Item = &ParseError> + '_ {
        self.parse_errors_by_end.values()
    }

    /// Returns true if both indices hold the same sentences and the sentences do not overlap.
    pub fn is_consistent(&self) -> bool {
        if self.sentences_by_id.len() != self.sentences_by_end.len() {
            return false;
        }
        let mut previous_stop = 0;
        for (stop, id) in &self.sentences_by_end {
            let Some(sentence) = self.sentences_by_id.get(id) else {
                return false;
            };
            if sentence.stop != *stop || sentence.start < previous_stop || sentence.start > *stop
            {
                return false;
            }
            previous_stop = *stop;
        }
        true
    }
}
