//! The document: raw text, its sentences and their schedule.
//!
//! Edits only touch the raw text and lower the parsed high-water mark. [`Document::validate`]
//! then reparses from the last sentence known to be unaffected, matches the new sentences
//! against the old ones and reschedules what follows. Sentences that survive the reparse keep
//! their identity, so cached execution results stay attached to them.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::id::{IdAllocator, SentenceId};
use crate::parser::{Candidate, ParseOutcome, Parser};
use crate::policy::ProofBlockPolicy;
use crate::range_store::{ParseError, RangeStore, Sentence};
use crate::scheduler::{ExecutableSentence, Schedule, Scheduler, SchedulerState};
use crate::text::{self, Range, TextEdit};

/// One step of the reparse diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiffOp {
    /// An old sentence matched a new one and kept its identity.
    Equal(SentenceId),
    /// An old sentence disappeared.
    Deleted(SentenceId),
    /// A new sentence got a fresh identity.
    Added(SentenceId),
}

/// Result of [`Document::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Validation {
    /// Sentences whose cached results no longer hold: the deleted ones and the surviving ones
    /// whose dependencies changed.
    pub invalidated: BTreeSet<SentenceId>,
    /// The reparse diff in document order.
    pub diff: Vec<DiffOp>,
}

impl Validation {
    /// Identities added by the reparse.
    pub fn added(&self) -> impl Iterator<Item = SentenceId> + '_ {
        self.diff.iter().filter_map(|op| match op {
            DiffOp::Added(id) => Some(*id),
            _ => None,
        })
    }

    /// Identities deleted by the reparse.
    pub fn deleted(&self) -> impl Iterator<Item = SentenceId> + '_ {
        self.diff.iter().filter_map(|op| match op {
            DiffOp::Deleted(id) => Some(*id),
            _ => None,
        })
    }
}

/// A proof script being edited.
pub struct Document<P: Parser> {
    parser: P,
    scheduler: Scheduler,
    ids: IdAllocator,
    initial_scope: P::Scope,
    text: String,
    parsed_offset: usize,
    store: RangeStore<P::Ast, P::Scope>,
    schedule: Schedule<P::Ast>,
}

impl<P: Parser> Document<P> {
    /// Create a document over `text`. Nothing is parsed before the first [`Document::validate`].
    pub fn new(parser: P, initial_scope: P::Scope, text: impl Into<String>) -> Self {
        Self::builder(parser, initial_scope).text(text).build()
    }

    /// Create a builder.
    pub fn builder(parser: P, initial_scope: P::Scope) -> DocumentBuilder<P> {
        DocumentBuilder::new(parser, initial_scope)
    }

    /// The raw text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Scope the first sentence is parsed under.
    pub fn initial_scope(&self) -> &P::Scope {
        &self.initial_scope
    }

    /// Offset up to which the sentences reflect the text.
    pub fn parsed_offset(&self) -> usize {
        self.parsed_offset
    }

    /// The sentence store.
    pub fn store(&self) -> &RangeStore<P::Ast, P::Scope> {
        &self.store
    }

    /// The current schedule.
    pub fn schedule(&self) -> &Schedule<P::Ast> {
        &self.schedule
    }

    /// Get a sentence by identity.
    pub fn sentence(&self, id: SentenceId) -> Result<&Sentence<P::Ast, P::Scope>> {
        self.store.get(id)
    }

    /// All sentences in document order.
    pub fn sentences(&self) -> impl Iterator<Item = &Sentence<P::Ast, P::Scope>> + '_ {
        self.store.sentences()
    }

    /// Identities of all sentences in document order.
    pub fn sentence_ids(&self) -> Vec<SentenceId> {
        self.store.sentences().map(|sentence| sentence.id).collect()
    }

    /// Parse errors in document order.
    pub fn parse_errors(&self) -> impl Iterator<Item = &ParseError> + '_ {
        self.store.parse_errors()
    }

    /// The sentence containing `offset`.
    pub fn find_sentence_at(&self, offset: usize) -> Option<&Sentence<P::Ast, P::Scope>> {
        self.store.find_sentence_at(offset)
    }

    /// The last sentence stopping at or before `offset`.
    pub fn find_sentence_before(&self, offset: usize) -> Option<&Sentence<P::Ast, P::Scope>> {
        self.store.find_sentence_before(offset)
    }

    /// The first sentence starting at or after `offset`.
    pub fn find_sentence_after(&self, offset: usize) -> Option<&Sentence<P::Ast, P::Scope>> {
        self.store.find_sentence_after(offset)
    }

    /// The first sentence of the document.
    pub fn first_sentence(&self) -> Option<&Sentence<P::Ast, P::Scope>> {
        self.store.first_sentence()
    }

    /// The last sentence of the document.
    pub fn last_sentence(&self) -> Option<&Sentence<P::Ast, P::Scope>> {
        self.store.last_sentence()
    }

    /// Sentences stopping at or before `offset`.
    pub fn sentences_before(
        &self,
        offset: usize,
    ) -> impl Iterator<Item = &Sentence<P::Ast, P::Scope>> + '_ {
        self.store.sentences_before(offset)
    }

    /// Sentences starting at or after `offset`.
    pub fn sentences_after(
        &self,
        offset: usize,
    ) -> impl Iterator<Item = &Sentence<P::Ast, P::Scope>> + '_ {
        self.store.sentences_after(offset)
    }

    /// Line/column range of a sentence.
    pub fn range_of(&self, id: SentenceId) -> Result<Range> {
        let sentence = self.store.get(id)?;
        Ok(text::range_of_span(&self.text, sentence.span()))
    }

    /// The scheduler state after the last sentence stopping at or before `offset`.
    pub fn scheduler_state_at(&self, offset: usize) -> SchedulerState {
        self.store
            .find_sentence_before(offset)
            .map(|sentence| sentence.scheduler_state_after.clone())
            .unwrap_or_default()
    }

    /// Apply an edit to the raw text and return the new parsed offset.
    ///
    /// Sentences are left untouched until the next [`Document::validate`].
    pub fn apply_edit(&mut self, edit: &TextEdit) -> Result<usize> {
        edit.check(&self.text)?;
        self.text.replace_range(edit.start..edit.end, &edit.text);
        self.parsed_offset = self.parsed_offset.min(edit.start);
        tracing::debug!(
            start = edit.start,
            end = edit.end,
            inserted = edit.text.len(),
            parsed_offset = self.parsed_offset,
            "applied edit"
        );
        Ok(self.parsed_offset)
    }

    /// Apply edits in order, each one relative to the text produced by the previous ones.
    ///
    /// Stops at the first invalid edit; the edits before it stay applied.
    pub fn apply_edits<'a>(
        &mut self,
        edits: impl IntoIterator<Item = &'a TextEdit>,
    ) -> Result<usize> {
        for edit in edits {
            self.apply_edit(edit)?;
        }
        Ok(self.parsed_offset)
    }

    /// Reparse from the last unaffected sentence, reconcile and reschedule.
    pub fn validate(&mut self) -> Validation {
        let (resume, scope, mut state) =
            match self.store.find_sentence_strictly_before(self.parsed_offset) {
                Some(sentence) => (
                    sentence.stop,
                    sentence.scope.clone(),
                    sentence.scheduler_state_after.clone(),
                ),
                None => (0, self.initial_scope.clone(), SchedulerState::new()),
            };
        let _span = tracing::debug_span!("validate", resume).entered();

        self.store.remove_errors_from(resume);
        let (candidates, errors) = self.reparse(resume, scope);
        for error in errors {
            tracing::debug!(
                start = error.start,
                stop = error.stop,
                message = %error.message,
                "parse error"
            );
            self.store.insert_error(error);
        }
        let old = self.store.take_after(resume);

        let mut validation = Validation::default();
        let mut old_sentences = old.into_iter();
        let mut new_sentences = candidates.into_iter();
        loop {
            match (old_sentences.next(), new_sentences.next()) {
                (Some(old), Some(new)) if old.parsed.tokens == new.parsed.tokens => {
                    state = self.reconcile_equal(old, new, state, &mut validation);
                }
                (Some(old), Some(new)) => {
                    self.reconcile_deleted(old, &mut validation);
                    state = self.reconcile_added(new, state, &mut validation);
                }
                (Some(old), None) => self.reconcile_deleted(old, &mut validation),
                (None, Some(new)) => state = self.reconcile_added(new, state, &mut validation),
                (None, None) => break,
            }
        }

        self.parsed_offset = self.text.len();
        debug_assert!(self.store.is_consistent());
        tracing::debug!(
            invalidated = validation.invalidated.len(),
            diff = validation.diff.len(),
            "validated"
        );
        validation
    }

    fn reparse(
        &self,
        from: usize,
        mut scope: P::Scope,
    ) -> (Vec<Candidate<P::Ast, P::Scope>>, Vec<ParseError>) {
        let mut candidates = Vec::new();
        let mut errors = Vec::new();
        let mut position = from;
        while position <= self.text.len() {
            match self.parser.parse_next(&scope, &self.text, position) {
                ParseOutcome::Parsed {
                    sentences,
                    terminates,
                } => {
                    let progressed = !sentences.is_empty();
                    for candidate in sentences {
                        if candidate.start < position || candidate.stop <= candidate.start {
                            tracing::warn!(
                                start = candidate.start,
                                stop = candidate.stop,
                                position,
                                "parser returned a sentence out of order"
                            );
                            return (candidates, errors);
                        }
                        position = candidate.stop;
                        scope = candidate.scope.clone();
                        candidates.push(candidate);
                    }
                    if terminates || !progressed {
                        break;
                    }
                }
                ParseOutcome::Failed {
                    start,
                    stop,
                    message,
                } => {
                    errors.push(ParseError {
                        start,
                        stop,
                        message,
                    });
                    if stop <= position {
                        tracing::warn!(position, "parser failed without progress");
                        break;
                    }
                    position = stop;
                }
            }
        }
        (candidates, errors)
    }

    fn reconcile_equal(
        &mut self,
        old: Sentence<P::Ast, P::Scope>,
        new: Candidate<P::Ast, P::Scope>,
        state: SchedulerState,
        validation: &mut Validation,
    ) -> SchedulerState {
        let id = old.id;
        let previous = self
            .schedule
            .task_for(id)
            .ok()
            .map(|(base, task)| (base, task.kind(), task.sources(base)));

        let after = self.schedule_candidate(id, &new, &state);

        let changed = match (previous, self.schedule.task_for(id)) {
            (Some((old_base, old_kind, old_sources)), Ok((base, task))) => {
                old_base != base
                    || old_kind != task.kind()
                    || old_sources != task.sources(base)
                    || old_sources
                        .iter()
                        .any(|source| validation.invalidated.contains(source))
            }
            _ => true,
        };
        if changed {
            tracing::trace!(sentence = %id, "dependencies changed");
            validation.invalidated.insert(id);
        }

        self.store.insert(Sentence {
            id,
            start: new.start,
            stop: new.stop,
            parsed: new.parsed,
            scope: new.scope,
            scheduler_state_before: state,
            scheduler_state_after: after.clone(),
        });
        validation.diff.push(DiffOp::Equal(id));
        after
    }

    fn reconcile_deleted(&mut self, old: Sentence<P::Ast, P::Scope>, validation: &mut Validation) {
        tracing::trace!(sentence = %old.id, "deleted");
        self.schedule.remove(old.id);
        validation.invalidated.insert(old.id);
        validation.diff.push(DiffOp::Deleted(old.id));
    }

    fn reconcile_added(
        &mut self,
        new: Candidate<P::Ast, P::Scope>,
        state: SchedulerState,
        validation: &mut Validation,
    ) -> SchedulerState {
        let id = self.ids.next();
        tracing::trace!(sentence = %id, start = new.start, stop = new.stop, "added");
        let after = self.schedule_candidate(id, &new, &state);
        self.store.insert(Sentence {
            id,
            start: new.start,
            stop: new.stop,
            parsed: new.parsed,
            scope: new.scope,
            scheduler_state_before: state,
            scheduler_state_after: after.clone(),
        });
        validation.diff.push(DiffOp::Added(id));
        after
    }

    fn schedule_candidate(
        &mut self,
        id: SentenceId,
        candidate: &Candidate<P::Ast, P::Scope>,
        state: &SchedulerState,
    ) -> SchedulerState {
        let sentence = ExecutableSentence {
            id,
            ast: candidate.parsed.ast.clone(),
            classification: candidate.parsed.classification,
        };
        self.scheduler.schedule_sentence(
            sentence,
            candidate.parsed.scope_change,
            state,
            &mut self.schedule,
        )
    }
}

impl<P: Parser> std::fmt::Debug for Document<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.text.len())
            .field("parsed_offset", &self.parsed_offset)
            .field("sentences", &self.store.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Document`].
///
/// ```
/// # use std::sync::Arc;
/// # use proof_flow::{Document, DelegateOpaqueProofs};
/// # use proof_flow::toy::{ToyParser, ToyScope};
/// let mut document = Document::builder(ToyParser, ToyScope::default())
///     .text("Lemma l. trivial. Qed.")
///     .policy(Arc::new(DelegateOpaqueProofs))
///     .build();
/// assert_eq!(document.validate().diff.len(), 3);
/// ```
pub struct DocumentBuilder<P: Parser> {
    parser: P,
    initial_scope: P::Scope,
    text: String,
    policy: Option<Arc<dyn ProofBlockPolicy>>,
    ids: IdAllocator,
}

impl<P: Parser> DocumentBuilder<P> {
    /// Create a new builder with an empty text and the default policy.
    pub fn new(parser: P, initial_scope: P::Scope) -> Self {
        Self {
            parser,
            initial_scope,
            text: String::new(),
            policy: None,
            ids: IdAllocator::new(),
        }
    }

    /// Set the initial text.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Set the proof block policy.
    pub fn policy(mut self, policy: Arc<dyn ProofBlockPolicy>) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Apply the document settings of a [`Config`].
    pub fn config(self, config: &Config) -> Self {
        self.policy(config.proof_blocks.policy())
    }

    /// Share an identity allocator, e.g. between documents of one session.
    pub fn ids(mut self, ids: IdAllocator) -> Self {
        self.ids = ids;
        self
    }

    /// Build the document.
    pub fn build(self) -> Document<P> {
        Document {
            parser: self.parser,
            scheduler: self.policy.map(Scheduler::new).unwrap_or_default(),
            ids: self.ids,
            initial_scope: self.initial_scope,
            text: self.text,
            parsed_offset: 0,
            store: RangeStore::new(),
            schedule: Schedule::new(),
        }
    }
}
