//! Dependency scheduling of sentences.
//!
//! Each sentence is assigned a dependency base, the sentence whose resulting state it executes
//! on, according to its [`Classification`] and the proof nesting it appears in. The resulting
//! [`Schedule`] is extended one sentence at a time and never rebuilt wholesale.
//!
//! The nesting bookkeeping lives in [`SchedulerState`], a persistent value: every scheduling call
//! returns a new state and leaves the previous one untouched, so the document can keep a
//! snapshot per sentence and resume scheduling anywhere after an edit.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::id::SentenceId;
use crate::parser::{Classification, ScopeChange};
use crate::policy::{AlwaysFlatten, BlockClosing, ClosingContext, ProofBlockPolicy};

/// ScopeList is an ordered list of sentence identities.
///
/// The list is persistent: identities are kept in an `Arc` linked list, newest first, so a push
/// shares the whole existing list and snapshots taken at different points share their prefix.
#[derive(Clone, Default)]
pub struct ScopeList {
    head: Option<Arc<ScopeNode>>,
    len: usize,
}

struct ScopeNode {
    id: SentenceId,
    next: Option<Arc<ScopeNode>>,
}

impl Drop for ScopeNode {
    // Unlink iteratively so that dropping a long list does not recurse.
    fn drop(&mut self) {
        let mut next = self.next.take();
        while let Some(node) = next {
            match Arc::try_unwrap(node) {
                Ok(mut node) => next = node.next.take(),
                Err(_) => break,
            }
        }
    }
}

impl ScopeList {
    /// Returns the most recent identity.
    pub fn last(&self) -> Option<SentenceId> {
        self.head.as_ref().map(|node| node.id)
    }

    /// Returns a new list with `id` appended.
    #[must_use]
    pub fn pushed(&self, id: SentenceId) -> Self {
        ScopeList {
            head: Some(Arc::new(ScopeNode {
                id,
                next: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Returns a new list with the identities of `other` appended in order, skipping those
    /// appended to this list after `since`.
    ///
    /// Only the part of this list newer than `since` is searched for duplicates.
    #[must_use]
    pub(crate) fn extended_since(&self, since: SentenceId, other: &ScopeList) -> Self {
        let recent: HashSet<SentenceId> =
            self.rev_iter().take_while(|id| *id != since).collect();
        other
            .to_vec()
            .into_iter()
            .filter(|id| !recent.contains(id))
            .fold(self.clone(), |list, id| list.pushed(id))
    }

    /// Returns true if `id` is in the list.
    pub fn contains(&self, id: SentenceId) -> bool {
        self.rev_iter().any(|other| other == id)
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of identities.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Iterate over the identities from the most recent to the oldest.
    pub fn rev_iter(&self) -> impl Iterator<Item = SentenceId> + '_ {
        let mut node = self.head.as_deref();
        std::iter::from_fn(move || {
            let current = node?;
            node = current.next.as_deref();
            Some(current.id)
        })
    }

    /// Copy the identities into a vector, oldest first.
    pub fn to_vec(&self) -> Vec<SentenceId> {
        let mut ids: Vec<_> = self.rev_iter().collect();
        ids.reverse();
        ids
    }
}

impl PartialEq for ScopeList {
    fn eq(&self, other: &Self) -> bool {
        if self.len != other.len {
            return false;
        }
        let mut left = self.head.as_ref();
        let mut right = other.head.as_ref();
        loop {
            match (left, right) {
                (Some(a), Some(b)) if Arc::ptr_eq(a, b) => return true,
                (Some(a), Some(b)) if a.id == b.id => {
                    left = a.next.as_ref();
                    right = b.next.as_ref();
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

impl Eq for ScopeList {}

impl fmt::Debug for ScopeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.to_vec()).finish()
    }
}

impl FromIterator<SentenceId> for ScopeList {
    fn from_iter<T: IntoIterator<Item = SentenceId>>(iter: T) -> Self {
        iter.into_iter()
            .fold(ScopeList::default(), |list, id| list.pushed(id))
    }
}

/// ProofBlock collects the sentences between a proof opener and its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBlock {
    /// The sentence that opened the block.
    pub opener: SentenceId,
    /// Sentences of the block in order.
    pub sentences: ScopeList,
    /// Whether a side effect happened inside the block.
    pub has_side_effect: bool,
    /// Whether a proof was opened inside the block.
    pub has_nested_proof: bool,
}

impl ProofBlock {
    /// Create an empty block.
    pub fn new(opener: SentenceId) -> Self {
        Self {
            opener,
            sentences: Default::default(),
            has_side_effect: false,
            has_nested_proof: false,
        }
    }

    /// The sentence the next step of this block executes on.
    pub fn top(&self) -> SentenceId {
        self.sentences.last().unwrap_or(self.opener)
    }
}

/// SchedulerState is the proof nesting context at a point of the document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedulerState {
    document_scope: ScopeList,
    // Innermost block last.
    proof_blocks: Arc<Vec<ProofBlock>>,
    section_depth: usize,
}

impl SchedulerState {
    /// The state at the start of a document.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sentences whose effect spans the rest of the document.
    pub fn document_scope(&self) -> &ScopeList {
        &self.document_scope
    }

    /// Open proof blocks, outermost first.
    pub fn proof_blocks(&self) -> &[ProofBlock] {
        &self.proof_blocks
    }

    /// Number of open sections.
    pub fn section_depth(&self) -> usize {
        self.section_depth
    }

    /// The current dependency base: the top of the innermost open block, else the last sentence
    /// of the document scope.
    pub fn top(&self) -> Option<SentenceId> {
        match self.proof_blocks.last() {
            Some(block) => Some(block.top()),
            None => self.document_scope.last(),
        }
    }

    fn with_blocks(&self, blocks: Vec<ProofBlock>) -> Self {
        Self {
            proof_blocks: Arc::new(blocks),
            ..self.clone()
        }
    }

    /// Append to the innermost block, or to the document scope outside of proofs.
    #[must_use]
    fn pushed(&self, id: SentenceId) -> Self {
        let mut blocks = Vec::clone(&self.proof_blocks);
        match blocks.last_mut() {
            Some(block) => {
                block.sentences = block.sentences.pushed(id);
                self.with_blocks(blocks)
            }
            None => Self {
                document_scope: self.document_scope.pushed(id),
                ..self.clone()
            },
        }
    }

    /// Append a side effect to the document scope and to every open block.
    #[must_use]
    fn extruded(&self, id: SentenceId) -> Self {
        let blocks = self
            .proof_blocks
            .iter()
            .map(|block| ProofBlock {
                sentences: block.sentences.pushed(id),
                has_side_effect: true,
                ..block.clone()
            })
            .collect();
        Self {
            document_scope: self.document_scope.pushed(id),
            ..self.with_blocks(blocks)
        }
    }

    /// Record the opener in the current scope and push a new block.
    #[must_use]
    fn opened(&self, opener: SentenceId) -> Self {
        let state = self.pushed(opener);
        let mut blocks = Vec::clone(&state.proof_blocks);
        if let Some(parent) = blocks.last_mut() {
            parent.has_nested_proof = true;
        }
        blocks.push(ProofBlock::new(opener));
        state.with_blocks(blocks)
    }

    /// Pop the innermost block.
    fn popped(&self) -> Option<(ProofBlock, Self)> {
        let mut blocks = Vec::clone(&self.proof_blocks);
        let block = blocks.pop()?;
        Some((block, self.with_blocks(blocks)))
    }

    /// Append the sentences of a closed block to the parent scope, skipping duplicates.
    #[must_use]
    fn flattened(&self, block: &ProofBlock) -> Self {
        let mut blocks = Vec::clone(&self.proof_blocks);
        match blocks.last_mut() {
            Some(parent) => {
                parent.sentences = parent
                    .sentences
                    .extended_since(block.opener, &block.sentences);
                parent.has_side_effect |= block.has_side_effect;
                self.with_blocks(blocks)
            }
            None => Self {
                document_scope: self
                    .document_scope
                    .extended_since(block.opener, &block.sentences),
                ..self.clone()
            },
        }
    }

    #[must_use]
    fn with_scope_change(self, change: ScopeChange) -> Self {
        let section_depth = match change {
            ScopeChange::None => self.section_depth,
            ScopeChange::OpenSection => self.section_depth + 1,
            ScopeChange::CloseSection => self.section_depth.saturating_sub(1),
        };
        Self {
            section_depth,
            ..self
        }
    }
}

/// A sentence as seen by the execution backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutableSentence<A> {
    /// Identity of the sentence.
    pub id: SentenceId,
    /// Syntax tree.
    pub ast: A,
    /// Dependency shape.
    pub classification: Classification,
}

/// Unit of execution.
#[derive(Debug, Clone, PartialEq)]
pub enum Task<A> {
    /// No-op placeholder; passes its base state through.
    Skip(SentenceId),
    /// Ordinary cached execution.
    Exec(ExecutableSentence<A>),
    /// Executed for feedback only; its result is never a dependency base.
    Query(ExecutableSentence<A>),
    /// A proof replayed as one unit without retaining interior states.
    OpaqueProof {
        /// The proof terminator.
        terminator: ExecutableSentence<A>,
        /// The sentence that opened the proof.
        opener: SentenceId,
        /// Steps of the proof in order.
        steps: Vec<SentenceId>,
    },
}

/// TaskKind is a payload-free tag of [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TaskKind {
    /// [`Task::Skip`].
    Skip,
    /// [`Task::Exec`].
    Exec,
    /// [`Task::Query`].
    Query,
    /// [`Task::OpaqueProof`].
    OpaqueProof,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::Skip => "skip",
            TaskKind::Exec => "exec",
            TaskKind::Query => "query",
            TaskKind::OpaqueProof => "opaque-proof",
        };
        f.write_str(name)
    }
}

impl<A> Task<A> {
    /// Identity of the sentence owning this task.
    pub fn id(&self) -> SentenceId {
        match self {
            Task::Skip(id) => *id,
            Task::Exec(sentence) | Task::Query(sentence) => sentence.id,
            Task::OpaqueProof { terminator, .. } => terminator.id,
        }
    }

    /// Tag of this task.
    pub fn kind(&self) -> TaskKind {
        match self {
            Task::Skip(_) => TaskKind::Skip,
            Task::Exec(_) => TaskKind::Exec,
            Task::Query(_) => TaskKind::Query,
            Task::OpaqueProof { .. } => TaskKind::OpaqueProof,
        }
    }

    /// Sentences whose invalidation must invalidate this task, given its base.
    pub(crate) fn sources(&self, base: Option<SentenceId>) -> Vec<SentenceId> {
        let mut sources: Vec<_> = base.into_iter().collect();
        if let Task::OpaqueProof { steps, .. } = self {
            sources.extend(steps.iter().copied());
        }
        sources
    }
}

/// Schedule maps each sentence to its dependency base and task, and keeps the reverse edges.
#[derive(Debug, Clone)]
pub struct Schedule<A> {
    tasks: BTreeMap<SentenceId, (Option<SentenceId>, Task<A>)>,
    dependents: BTreeMap<SentenceId, BTreeSet<SentenceId>>,
}

impl<A> Default for Schedule<A> {
    fn default() -> Self {
        Self {
            tasks: Default::default(),
            dependents: Default::default(),
        }
    }
}

impl<A> Schedule<A> {
    /// Create an empty schedule.
    pub fn new() -> Self {
        Default::default()
    }

    /// Get the dependency base and the task of a sentence.
    pub fn task_for(&self, id: SentenceId) -> Result<(Option<SentenceId>, &Task<A>)> {
        self.tasks
            .get(&id)
            .map(|(base, task)| (*base, task))
            .ok_or(Error::UnknownTask(id))
    }

    /// Get the sentences that directly depend on a sentence.
    pub fn dependents(&self, id: SentenceId) -> Result<BTreeSet<SentenceId>> {
        if !self.tasks.contains_key(&id) {
            return Err(Error::UnknownTask(id));
        }
        Ok(self.dependents.get(&id).cloned().unwrap_or_default())
    }

    /// Returns true if the sentence is scheduled.
    pub fn contains(&self, id: SentenceId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Returns the number of scheduled sentences.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterate over the scheduled identities.
    pub fn ids(&self) -> impl Iterator<Item = SentenceId> + '_ {
        self.tasks.keys().copied()
    }

    /// Insert or replace the entry of a sentence, maintaining the reverse edges.
    pub(crate) fn insert(&mut self, id: SentenceId, base: Option<SentenceId>, task: Task<A>) {
        self.remove(id);
        for source in task.sources(base) {
            self.dependents.entry(source).or_default().insert(id);
        }
        self.tasks.insert(id, (base, task));
    }

    /// Remove the entry of a sentence and the edges pointing to it.
    ///
    /// Edges from the removed sentence to its dependents are kept until those dependents are
    /// rescheduled or removed themselves.
    pub(crate) fn remove(&mut self, id: SentenceId) -> Option<(Option<SentenceId>, Task<A>)> {
        let (base, task) = self.tasks.remove(&id)?;
        for source in task.sources(base) {
            if let Some(dependents) = self.dependents.get_mut(&source) {
                dependents.remove(&id);
                if dependents.is_empty() {
                    self.dependents.remove(&source);
                }
            }
        }
        Some((base, task))
    }
}

/// Scheduler assigns dependency bases and tasks to sentences.
#[derive(Clone)]
pub struct Scheduler {
    policy: Arc<dyn ProofBlockPolicy>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(Arc::new(AlwaysFlatten))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler closing proof blocks with `policy`.
    pub fn new(policy: Arc<dyn ProofBlockPolicy>) -> Self {
        Self { policy }
    }

    /// Schedule a sentence after `state`, recording its task in `schedule`, and return the state
    /// after the sentence.
    pub fn schedule_sentence<A>(
        &self,
        sentence: ExecutableSentence<A>,
        scope_change: ScopeChange,
        state: &SchedulerState,
        schedule: &mut Schedule<A>,
    ) -> SchedulerState {
        let id = sentence.id;
        let top = state.top();
        let classification = sentence.classification;
        let (base, next, task) = match classification {
            Classification::StartProof => (top, state.opened(id), Task::Exec(sentence)),
            Classification::Sideff => (top, state.extruded(id), Task::Exec(sentence)),
            Classification::ProofStep => (top, state.pushed(id), Task::Exec(sentence)),
            Classification::Query => (top, state.clone(), Task::Query(sentence)),
            Classification::Qed(kind) => match state.popped() {
                Some((block, rest)) => {
                    let context = ClosingContext {
                        block: &block,
                        kind,
                        section_depth: state.section_depth,
                        enclosing_blocks: rest.proof_blocks.len(),
                    };
                    match self.policy.close(&context) {
                        BlockClosing::Flatten => (
                            top,
                            rest.flattened(&block).pushed(id),
                            Task::Exec(sentence),
                        ),
                        BlockClosing::Delegate => (
                            Some(block.opener),
                            rest.pushed(id),
                            Task::OpaqueProof {
                                terminator: sentence,
                                opener: block.opener,
                                steps: block.sentences.to_vec(),
                            },
                        ),
                    }
                }
                None => {
                    tracing::debug!(sentence = %id, "proof terminator outside of a proof");
                    (top, state.pushed(id), Task::Skip(id))
                }
            },
        };
        tracing::trace!(sentence = %id, base = ?base, task = %task.kind(), "scheduled sentence");
        schedule.insert(id, base, task);
        next.with_scope_change(scope_change)
    }
}
