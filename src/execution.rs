//! Execution of scheduled sentences against a backend.
//!
//! The [`ExecutionManager`] owns the execution cache. To reach a sentence it walks dependency
//! bases backward until it finds a cached state, then replays the collected tasks forward one
//! at a time through [`ExecutionManager::step`], checking an [`Interrupt`] flag before each
//! task so a driver can stop between steps.
//!
//! Opaque proofs are either replayed locally without caching their interior states, or, with
//! [`DelegationMode::Worker`], handed to a [`Worker`] while the terminator is admitted locally.
//! Worker results and asynchronous feedback come back through a channel drained by
//! [`ExecutionManager::poll_messages`].

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use slab::Slab;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::error::{ExecError, Result};
use crate::id::{JobId, SentenceId};
use crate::invalidation::{Invalidation, InvalidationReason};
use crate::parser::Classification;
use crate::scheduler::{ExecutableSentence, Schedule, Task, TaskKind};
use crate::text::Span;
use crate::tracer::{ExecutionResult, NoopTracer, Tracer};

/// The execution backend.
///
/// States are immutable values: `run` must not mutate the state it is given, so cached states can
/// be shared between replays.
pub trait Backend<A> {
    /// State of the backend between sentences.
    type State: Clone;

    /// Execute `sentence` on `state`.
    fn run(
        &mut self,
        state: &Self::State,
        sentence: &ExecutableSentence<A>,
    ) -> Result<Self::State, ExecError>;

    /// Close the current proof without checking it.
    ///
    /// Used for delegated proofs and to recover from a failing terminator. Defaults to `run`.
    fn admit(
        &mut self,
        state: &Self::State,
        terminator: &ExecutableSentence<A>,
    ) -> Result<Self::State, ExecError> {
        self.run(state, terminator)
    }

    /// Feedback buffered by the last call to `run` or `admit`.
    ///
    /// Drained after every call; the feedback is attached to the sentence just executed.
    /// Backends reporting through a [`MessageSender`] instead keep the default.
    fn take_feedback(&mut self) -> Vec<Feedback> {
        Vec::new()
    }
}

/// Severity of a feedback message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Severity {
    /// Hint.
    Hint,
    /// Informational message.
    #[default]
    Information,
    /// Warning.
    Warning,
    /// Error.
    Error,
}

/// A message attached to a sentence by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Feedback {
    /// Severity.
    pub severity: Severity,
    /// Location in the document, if known.
    pub location: Option<Span>,
    /// Message text.
    pub message: String,
}

impl Feedback {
    /// Create a feedback message without location.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            location: None,
            message: message.into(),
        }
    }

    /// Attach a location.
    pub fn at(mut self, location: Span) -> Self {
        self.location = Some(location);
        self
    }
}

/// Outcome of executing a sentence.
///
/// The state is `None` when the sentence is not a dependency base (queries), or when it was
/// executed inside an opaque proof whose interior states are not kept.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecStatus<S> {
    /// The backend accepted the sentence.
    Success(Option<S>),
    /// The backend rejected the sentence. The state is the one later sentences continue from.
    Error(ExecError, Option<S>),
}

impl<S> ExecStatus<S> {
    /// The state later sentences execute on, if kept.
    pub fn state(&self) -> Option<&S> {
        match self {
            ExecStatus::Success(state) | ExecStatus::Error(_, state) => state.as_ref(),
        }
    }

    /// Returns true if the backend accepted the sentence.
    pub fn is_success(&self) -> bool {
        matches!(self, ExecStatus::Success(_))
    }

    /// The error, if the backend rejected the sentence.
    pub fn error(&self) -> Option<&ExecError> {
        match self {
            ExecStatus::Success(_) => None,
            ExecStatus::Error(error, _) => Some(error),
        }
    }
}

/// A cache entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<S> {
    /// Execution outcome.
    pub status: ExecStatus<S>,
    /// Feedback received while the entry was live.
    pub feedback: Vec<Feedback>,
    // Clock reading when the execution producing this entry started. Messages sent earlier
    // belong to a previous execution of the sentence.
    since: u64,
}

impl<S> CacheEntry<S> {
    fn new(status: ExecStatus<S>, feedback: Vec<Feedback>, since: u64) -> Self {
        Self {
            status,
            feedback,
            since,
        }
    }
}

/// How opaque proofs are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DelegationMode {
    /// Replay the steps locally, keeping no interior state.
    #[default]
    Replay,
    /// Hand the steps to the configured [`Worker`] and admit the terminator locally.
    Worker,
}

/// A task ready to run.
#[derive(Debug, Clone, PartialEq)]
pub enum PreparedTask<A> {
    /// Pass the state through.
    Skip(SentenceId),
    /// Execute and cache the resulting state.
    Exec(ExecutableSentence<A>),
    /// Execute for feedback; the state is neither cached nor carried.
    Query(ExecutableSentence<A>),
    /// Step of an opaque proof: the state is carried to the next step but not cached.
    OpaqueStep(ExecutableSentence<A>),
    /// Hand an opaque proof to the worker and admit its terminator.
    Delegate {
        /// The proof terminator.
        terminator: ExecutableSentence<A>,
        /// The sentence that opened the proof.
        opener: SentenceId,
        /// Steps of the proof in order.
        steps: Vec<ExecutableSentence<A>>,
    },
}

impl<A> PreparedTask<A> {
    /// The sentence whose cache entry this task writes last.
    pub fn id(&self) -> SentenceId {
        match self {
            PreparedTask::Skip(id) => *id,
            PreparedTask::Exec(sentence)
            | PreparedTask::Query(sentence)
            | PreparedTask::OpaqueStep(sentence) => sentence.id,
            PreparedTask::Delegate { terminator, .. } => terminator.id,
        }
    }

    fn kind(&self) -> TaskKind {
        match self {
            PreparedTask::Skip(_) => TaskKind::Skip,
            PreparedTask::Exec(_) | PreparedTask::OpaqueStep(_) => TaskKind::Exec,
            PreparedTask::Query(_) => TaskKind::Query,
            PreparedTask::Delegate { .. } => TaskKind::OpaqueProof,
        }
    }
}

/// A pending replay toward a target sentence.
#[derive(Debug, Clone)]
pub struct Replay<A, S> {
    target: SentenceId,
    state: S,
    tasks: VecDeque<PreparedTask<A>>,
}

impl<A, S> Replay<A, S> {
    /// The sentence this replay leads to.
    pub fn target(&self) -> SentenceId {
        self.target
    }

    /// The state the next task runs on.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Tasks still to run, in order.
    pub fn tasks(&self) -> impl Iterator<Item = &PreparedTask<A>> + '_ {
        self.tasks.iter()
    }

    /// Number of tasks still to run.
    pub fn remaining(&self) -> usize {
        self.tasks.len()
    }

    /// Returns true if nothing is left to run.
    pub fn is_finished(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Something observable that happened during execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionEvent {
    /// A cache entry was written.
    Executed {
        /// The sentence.
        sentence: SentenceId,
        /// Whether the backend accepted it.
        success: bool,
    },
    /// An opaque proof was handed to the worker.
    Delegated {
        /// The job.
        job: JobId,
        /// The proof terminator.
        terminator: SentenceId,
    },
    /// The results of a delegated proof were applied.
    JobCompleted {
        /// The job.
        job: JobId,
    },
    /// Feedback was attached to a sentence.
    Feedback {
        /// The sentence.
        sentence: SentenceId,
    },
}

/// Result of [`ExecutionManager::execute`].
#[derive(Debug, Clone)]
pub struct Executed<S> {
    /// The state for the next task.
    pub state: S,
    /// What happened.
    pub events: Vec<ExecutionEvent>,
    /// Set when the task was skipped because the interrupt flag was raised.
    pub interrupted: bool,
}

/// Result of [`ExecutionManager::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// One task ran.
    Progressed(Vec<ExecutionEvent>),
    /// The interrupt flag is set; the next task stays queued.
    Interrupted,
    /// No task is left.
    Finished,
}

/// Result of [`ExecutionManager::run_to`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// What happened, in order.
    pub events: Vec<ExecutionEvent>,
    /// Set when the run stopped on the interrupt flag.
    pub interrupted: bool,
}

/// A flag a driver raises to stop execution between tasks.
///
/// Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    /// Create a lowered flag.
    pub fn new() -> Self {
        Default::default()
    }

    /// Raise the flag.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Lower the flag.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Returns true if the flag is raised.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one step of a delegated proof.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// The step.
    pub sentence: SentenceId,
    /// The failure, if the step was rejected.
    pub error: Option<ExecError>,
    /// Feedback produced by the step.
    pub feedback: Vec<Feedback>,
}

/// Message sent back to the execution manager.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    /// A delegated proof was checked.
    JobFinished {
        /// The job.
        job: JobId,
        /// Per-sentence outcomes: the steps in order, then the terminator.
        results: Vec<StepResult>,
    },
    /// Feedback for a sentence, produced asynchronously.
    Feedback {
        /// The sentence.
        sentence: SentenceId,
        /// The feedback.
        feedback: Feedback,
        /// Execution clock reading at the time of sending.
        sent_at: u64,
    },
}

/// Sending half of the channel drained by [`ExecutionManager::poll_messages`].
///
/// Feedback is stamped with the manager's execution clock, so that messages about an execution
/// which has since been invalidated are not attached to a later one.
#[derive(Debug, Clone)]
pub struct MessageSender {
    sender: mpsc::UnboundedSender<WorkerMessage>,
    clock: Arc<AtomicU64>,
}

impl MessageSender {
    /// Send feedback for a sentence. Returns false if the execution manager is gone.
    pub fn send_feedback(&self, sentence: SentenceId, feedback: Feedback) -> bool {
        self.send(WorkerMessage::Feedback {
            sentence,
            feedback,
            sent_at: self.clock.load(Ordering::SeqCst),
        })
    }

    pub(crate) fn send(&self, message: WorkerMessage) -> bool {
        self.sender.send(message).is_ok()
    }
}

/// An opaque proof handed to a worker.
#[derive(Debug)]
pub struct DelegatedJob<A, S> {
    /// Job identity, to be echoed in the reply.
    pub id: JobId,
    /// State of the opener.
    pub state: S,
    /// The sentence that opened the proof.
    pub opener: SentenceId,
    /// Steps of the proof in order.
    pub steps: Vec<ExecutableSentence<A>>,
    /// The proof terminator.
    pub terminator: ExecutableSentence<A>,
    /// Where to send the result.
    pub reply: MessageSender,
}

impl<A, S: Clone> DelegatedJob<A, S> {
    /// Check the proof with `backend` and send the outcome back.
    ///
    /// A failing step is reported and the next one runs on the state before it. Feedback the
    /// backend buffers is returned with each step. Returns false if the execution manager is
    /// gone.
    pub fn run<B: Backend<A, State = S>>(self, backend: &mut B) -> bool {
        let mut state = self.state;
        let mut results = Vec::with_capacity(self.steps.len() + 1);
        for sentence in self.steps.iter().chain(std::iter::once(&self.terminator)) {
            let error = match backend.run(&state, sentence) {
                Ok(next) => {
                    state = next;
                    None
                }
                Err(error) => Some(error),
            };
            results.push(StepResult {
                sentence: sentence.id,
                error,
                feedback: backend.take_feedback(),
            });
        }
        self.reply.send(WorkerMessage::JobFinished {
            job: self.id,
            results,
        })
    }
}

/// Something that checks delegated proofs out of line.
pub trait Worker<A, S>: Send {
    /// Accept a job. The outcome is sent to `job.reply`.
    fn submit(&mut self, job: DelegatedJob<A, S>);
}

#[derive(Debug)]
struct PendingJob {
    serial: u64,
    started: u64,
    terminator: SentenceId,
    steps: Vec<SentenceId>,
}

/// ExecutionManager caches execution results per sentence.
pub struct ExecutionManager<A, S> {
    initial_state: S,
    cache: BTreeMap<SentenceId, CacheEntry<S>>,
    delegation: DelegationMode,
    worker: Option<Box<dyn Worker<A, S>>>,
    jobs: Slab<PendingJob>,
    next_serial: u64,
    clock: Arc<AtomicU64>,
    sender: MessageSender,
    receiver: mpsc::UnboundedReceiver<WorkerMessage>,
    tracer: Arc<dyn Tracer>,
}

impl<A, S> fmt::Debug for ExecutionManager<A, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionManager")
            .field("cached", &self.cache.len())
            .field("delegation", &self.delegation)
            .field("pending_jobs", &self.jobs.len())
            .finish_non_exhaustive()
    }
}

impl<A: Clone, S: Clone> ExecutionManager<A, S> {
    /// Create a manager replaying opaque proofs locally.
    pub fn new(initial_state: S) -> Self {
        Self::builder(initial_state).build()
    }

    /// Create a builder.
    pub fn builder(initial_state: S) -> ExecutionManagerBuilder<A, S> {
        ExecutionManagerBuilder::new(initial_state)
    }

    /// The state the first sentence executes on.
    pub fn initial_state(&self) -> &S {
        &self.initial_state
    }

    /// The cache entry of a sentence.
    pub fn entry(&self, id: SentenceId) -> Option<&CacheEntry<S>> {
        self.cache.get(&id)
    }

    /// The execution outcome of a sentence.
    pub fn status(&self, id: SentenceId) -> Option<&ExecStatus<S>> {
        self.cache.get(&id).map(|entry| &entry.status)
    }

    /// Returns true if the sentence has a cache entry.
    pub fn is_executed(&self, id: SentenceId) -> bool {
        self.cache.contains_key(&id)
    }

    /// Feedback attached to a sentence.
    pub fn feedback(&self, id: SentenceId) -> &[Feedback] {
        self.cache
            .get(&id)
            .map(|entry| entry.feedback.as_slice())
            .unwrap_or_default()
    }

    /// Identities with a cache entry, in identity order.
    pub fn executed(&self) -> impl Iterator<Item = SentenceId> + '_ {
        self.cache.keys().copied()
    }

    /// Outstanding delegated jobs.
    pub fn pending_jobs(&self) -> Vec<JobId> {
        self.jobs
            .iter()
            .map(|(slot, job)| JobId {
                slot,
                serial: job.serial,
            })
            .collect()
    }

    /// Returns true if the sentence is a step of an outstanding delegated job.
    pub fn is_delegated(&self, id: SentenceId) -> bool {
        self.jobs.iter().any(|(_, job)| job.steps.contains(&id))
    }

    /// A sender for asynchronous feedback, drained by [`ExecutionManager::poll_messages`].
    pub fn message_sender(&self) -> MessageSender {
        self.sender.clone()
    }

    fn delegates(&self) -> bool {
        self.delegation == DelegationMode::Worker && self.worker.is_some()
    }

    /// Collect the tasks leading to `id`, starting from the nearest cached state.
    ///
    /// The walk follows dependency bases backward and stops at the first sentence whose cache
    /// entry holds a state; when none is found it starts from the initial state. If `id` itself
    /// is already executed, the replay is empty.
    pub fn build_tasks_for(&self, schedule: &Schedule<A>, id: SentenceId) -> Result<Replay<A, S>> {
        let target_done = self.cache.contains_key(&id);
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        let state = loop {
            let Some(current) = cursor else {
                break self.initial_state.clone();
            };
            if let Some(state) = self.cache.get(&current).and_then(|e| e.status.state()) {
                break state.clone();
            }
            let (base, task) = schedule.task_for(current)?;
            if !target_done {
                chain.push(task);
            }
            cursor = base;
        };

        let mut tasks = VecDeque::with_capacity(chain.len());
        for task in chain.into_iter().rev() {
            match task {
                Task::Skip(id) => tasks.push_back(PreparedTask::Skip(*id)),
                Task::Exec(sentence) => tasks.push_back(PreparedTask::Exec(sentence.clone())),
                Task::Query(sentence) => tasks.push_back(PreparedTask::Query(sentence.clone())),
                Task::OpaqueProof {
                    terminator,
                    opener,
                    steps,
                } => {
                    let steps = self.proof_steps(schedule, steps)?;
                    if self.delegates() {
                        tasks.push_back(PreparedTask::Delegate {
                            terminator: terminator.clone(),
                            opener: *opener,
                            steps,
                        });
                    } else {
                        tasks.extend(steps.into_iter().map(PreparedTask::OpaqueStep));
                        tasks.push_back(PreparedTask::Exec(terminator.clone()));
                    }
                }
            }
        }
        tracing::debug!(sentence = %id, tasks = tasks.len(), "built replay");
        Ok(Replay {
            target: id,
            state,
            tasks,
        })
    }

    fn proof_steps(
        &self,
        schedule: &Schedule<A>,
        steps: &[SentenceId],
    ) -> Result<Vec<ExecutableSentence<A>>> {
        let mut sentences = Vec::with_capacity(steps.len());
        for step in steps {
            match schedule.task_for(*step)?.1 {
                Task::Skip(_) => {}
                Task::Exec(sentence) | Task::Query(sentence) => sentences.push(sentence.clone()),
                Task::OpaqueProof { terminator, .. } => sentences.push(terminator.clone()),
            }
        }
        Ok(sentences)
    }

    /// Run one task on `state`, unless `interrupt` is raised.
    ///
    /// When interrupted nothing is written and `state` is handed back unchanged.
    pub fn execute<B>(
        &mut self,
        backend: &mut B,
        state: S,
        task: PreparedTask<A>,
        interrupt: &Interrupt,
    ) -> Executed<S>
    where
        B: Backend<A, State = S>,
    {
        if interrupt.is_set() {
            self.tracer.on_interrupted(task.id());
            return Executed {
                state,
                events: Vec::new(),
                interrupted: true,
            };
        }
        let (state, events) = self.run_task(backend, state, task);
        Executed {
            state,
            events,
            interrupted: false,
        }
    }

    /// Run the next task of `replay`.
    pub fn step<B>(
        &mut self,
        backend: &mut B,
        replay: &mut Replay<A, S>,
        interrupt: &Interrupt,
    ) -> StepOutcome
    where
        B: Backend<A, State = S>,
    {
        let Some(task) = replay.tasks.pop_front() else {
            return StepOutcome::Finished;
        };
        if interrupt.is_set() {
            self.tracer.on_interrupted(task.id());
            replay.tasks.push_front(task);
            return StepOutcome::Interrupted;
        }
        let (state, events) = self.run_task(backend, replay.state.clone(), task);
        replay.state = state;
        StepOutcome::Progressed(events)
    }

    /// Execute everything needed to reach `id`, stopping early on `interrupt`.
    pub fn run_to<B>(
        &mut self,
        backend: &mut B,
        schedule: &Schedule<A>,
        id: SentenceId,
        interrupt: &Interrupt,
    ) -> Result<RunReport>
    where
        B: Backend<A, State = S>,
    {
        let mut replay = self.build_tasks_for(schedule, id)?;
        let mut report = RunReport::default();
        loop {
            match self.step(backend, &mut replay, interrupt) {
                StepOutcome::Progressed(events) => report.events.extend(events),
                StepOutcome::Interrupted => {
                    report.interrupted = true;
                    break;
                }
                StepOutcome::Finished => break,
            }
        }
        Ok(report)
    }

    fn run_task<B>(
        &mut self,
        backend: &mut B,
        state: S,
        task: PreparedTask<A>,
    ) -> (S, Vec<ExecutionEvent>)
    where
        B: Backend<A, State = S>,
    {
        let span_id = self.tracer.new_span_id();
        let id = task.id();
        self.clock.fetch_add(1, Ordering::SeqCst);
        self.tracer.on_task_start(span_id, id, task.kind());

        let (state, result, events) = match task {
            PreparedTask::Skip(id) => {
                let status = ExecStatus::Success(Some(state.clone()));
                let event = self.write(id, status, Vec::new());
                (state, ExecutionResult::Success, vec![event])
            }
            PreparedTask::Exec(sentence) => match backend.run(&state, &sentence) {
                Ok(next) => {
                    let status = ExecStatus::Success(Some(next.clone()));
                    let event = self.write(id, status, backend.take_feedback());
                    (next, ExecutionResult::Success, vec![event])
                }
                Err(error) => {
                    let recovered = match sentence.classification {
                        Classification::Qed(_) => backend
                            .admit(&state, &sentence)
                            .unwrap_or_else(|_| state.clone()),
                        _ => state,
                    };
                    let result = ExecutionResult::Error {
                        message: error.message(),
                    };
                    let status = ExecStatus::Error(error, Some(recovered.clone()));
                    let event = self.write(id, status, backend.take_feedback());
                    (recovered, result, vec![event])
                }
            },
            PreparedTask::Query(sentence) => {
                let (status, result) = match backend.run(&state, &sentence) {
                    Ok(_) => (ExecStatus::Success(None), ExecutionResult::Success),
                    Err(error) => {
                        let message = error.message();
                        (
                            ExecStatus::Error(error, None),
                            ExecutionResult::Error { message },
                        )
                    }
                };
                let event = self.write(id, status, backend.take_feedback());
                (state, result, vec![event])
            }
            PreparedTask::OpaqueStep(sentence) => match backend.run(&state, &sentence) {
                Ok(next) => {
                    let feedback = backend.take_feedback();
                    let event = self.write(id, ExecStatus::Success(None), feedback);
                    (next, ExecutionResult::Success, vec![event])
                }
                Err(error) => {
                    let message = error.message();
                    let status = ExecStatus::Error(error, None);
                    let event = self.write(id, status, backend.take_feedback());
                    (state, ExecutionResult::Error { message }, vec![event])
                }
            },
            PreparedTask::Delegate {
                terminator,
                opener,
                steps,
            } => self.delegate(backend, state, terminator, opener, steps),
        };

        self.tracer.on_task_end(span_id, id, result);
        (state, events)
    }

    fn delegate<B>(
        &mut self,
        backend: &mut B,
        state: S,
        terminator: ExecutableSentence<A>,
        opener: SentenceId,
        steps: Vec<ExecutableSentence<A>>,
    ) -> (S, ExecutionResult, Vec<ExecutionEvent>)
    where
        B: Backend<A, State = S>,
    {
        let Some(worker) = self.worker.as_mut() else {
            tracing::warn!(terminator = %terminator.id, "no worker configured, replaying locally");
            let mut state = state;
            let mut events = Vec::new();
            for step in steps {
                let (next, step_events) =
                    self.run_task(backend, state, PreparedTask::OpaqueStep(step));
                state = next;
                events.extend(step_events);
            }
            let (state, terminator_events) =
                self.run_task(backend, state, PreparedTask::Exec(terminator));
            events.extend(terminator_events);
            return (state, ExecutionResult::Success, events);
        };

        let serial = self.next_serial;
        self.next_serial += 1;
        let entry = self.jobs.vacant_entry();
        let job = JobId {
            slot: entry.key(),
            serial,
        };
        entry.insert(PendingJob {
            serial,
            started: self.clock.load(Ordering::SeqCst),
            terminator: terminator.id,
            steps: steps.iter().map(|step| step.id).collect(),
        });
        self.tracer.on_job_delegated(job, terminator.id);
        worker.submit(DelegatedJob {
            id: job,
            state: state.clone(),
            opener,
            steps,
            terminator: terminator.clone(),
            reply: self.sender.clone(),
        });

        let status = match backend.admit(&state, &terminator) {
            Ok(next) => ExecStatus::Success(Some(next)),
            Err(error) => ExecStatus::Error(error, Some(state.clone())),
        };
        let next = status.state().cloned().unwrap_or(state);
        let events = vec![
            ExecutionEvent::Delegated {
                job,
                terminator: terminator.id,
            },
            self.write(terminator.id, status, backend.take_feedback()),
        ];
        (next, ExecutionResult::Delegated, events)
    }

    fn write(
        &mut self,
        id: SentenceId,
        status: ExecStatus<S>,
        feedback: Vec<Feedback>,
    ) -> ExecutionEvent {
        let success = status.is_success();
        let since = self.clock.load(Ordering::SeqCst);
        self.cache.insert(id, CacheEntry::new(status, feedback, since));
        ExecutionEvent::Executed {
            sentence: id,
            success,
        }
    }

    /// Discard the cache entry of `id` and of everything depending on it.
    ///
    /// The walk stops at sentences without a cache entry, except that a step of a pending
    /// delegated job still reaches the job's terminator. Pending jobs whose terminator is
    /// discarded are dropped, together with the entries of their steps. Sentences no longer in
    /// `schedule` are discarded without following their edges. Returns the entries actually
    /// discarded; invalidating an absent entry is a no-op.
    pub fn invalidate(&mut self, schedule: &Schedule<A>, id: SentenceId) -> Vec<Invalidation> {
        self.invalidate_all(schedule, [id])
    }

    /// Invalidate several sentences, e.g. the outcome of a document validation.
    ///
    /// Each entry is visited at most once over the whole call.
    pub fn invalidate_all(
        &mut self,
        schedule: &Schedule<A>,
        ids: impl IntoIterator<Item = SentenceId>,
    ) -> Vec<Invalidation> {
        let mut worklist: Vec<_> = ids
            .into_iter()
            .map(|id| Invalidation::new_source(id, InvalidationReason::Edited))
            .collect();
        worklist.reverse();
        let mut invalidations = Vec::new();
        while let Some(invalidation) = worklist.pop() {
            let current = invalidation.sentence;
            if self.cache.remove(&current).is_none() {
                for terminator in self.terminators_of(current) {
                    worklist.push(invalidation.propagated(
                        terminator,
                        current,
                        InvalidationReason::DependencyInvalidated,
                    ));
                }
                continue;
            }

            for (job, steps) in self.take_jobs_for(current) {
                self.tracer.on_job_dropped(job, current);
                for step in steps.into_iter().rev() {
                    worklist.push(invalidation.propagated(
                        step,
                        current,
                        InvalidationReason::DelegatedJobDropped,
                    ));
                }
            }
            if let Ok(dependents) = schedule.dependents(current) {
                for dependent in dependents.into_iter().rev() {
                    worklist.push(invalidation.propagated(
                        dependent,
                        current,
                        InvalidationReason::DependencyInvalidated,
                    ));
                }
            }

            self.tracer.on_invalidated(&invalidation);
            invalidations.push(invalidation);
        }
        invalidations
    }

    /// Terminators of the pending jobs delegating `step`.
    fn terminators_of(&self, step: SentenceId) -> Vec<SentenceId> {
        self.jobs
            .iter()
            .filter(|(_, job)| job.steps.contains(&step))
            .map(|(_, job)| job.terminator)
            .collect()
    }

    fn take_jobs_for(&mut self, terminator: SentenceId) -> Vec<(JobId, Vec<SentenceId>)> {
        let slots: Vec<_> = self
            .jobs
            .iter()
            .filter(|(_, job)| job.terminator == terminator)
            .map(|(slot, _)| slot)
            .collect();
        slots
            .into_iter()
            .map(|slot| {
                let job = self.jobs.remove(slot);
                (
                    JobId {
                        slot,
                        serial: job.serial,
                    },
                    job.steps,
                )
            })
            .collect()
    }

    /// Drop every cache entry and pending job.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.jobs.clear();
    }

    /// Attach feedback to a sentence.
    ///
    /// Feedback for a sentence without a cache entry is dropped; returns whether it was kept.
    pub fn handle_feedback(&mut self, id: SentenceId, feedback: Feedback) -> bool {
        self.attach_feedback(id, feedback, None)
    }

    fn attach_feedback(
        &mut self,
        id: SentenceId,
        feedback: Feedback,
        sent_at: Option<u64>,
    ) -> bool {
        match self.cache.get_mut(&id) {
            Some(entry) if sent_at.map_or(true, |sent_at| sent_at >= entry.since) => {
                entry.feedback.push(feedback);
                true
            }
            Some(_) => {
                tracing::debug!(sentence = %id, "dropping feedback of a previous execution");
                self.tracer.on_feedback_dropped(id, &feedback);
                false
            }
            None => {
                tracing::debug!(sentence = %id, "dropping feedback for unknown sentence");
                self.tracer.on_feedback_dropped(id, &feedback);
                false
            }
        }
    }

    /// Apply every message received so far from workers and feedback senders.
    pub fn poll_messages(&mut self) -> Vec<ExecutionEvent> {
        let mut events = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            match message {
                WorkerMessage::JobFinished { job, results } => {
                    if self.jobs.get(job.slot).map(|pending| pending.serial) != Some(job.serial) {
                        tracing::debug!(%job, "discarding results of a dropped job");
                        continue;
                    }
                    let pending = self.jobs.remove(job.slot);
                    for result in results {
                        events.push(self.apply_step_result(result, pending.started));
                    }
                    self.tracer.on_job_completed(job);
                    events.push(ExecutionEvent::JobCompleted { job });
                }
                WorkerMessage::Feedback {
                    sentence,
                    feedback,
                    sent_at,
                } => {
                    if self.attach_feedback(sentence, feedback, Some(sent_at)) {
                        events.push(ExecutionEvent::Feedback { sentence });
                    }
                }
            }
        }
        events
    }

    fn apply_step_result(&mut self, result: StepResult, started: u64) -> ExecutionEvent {
        let sentence = result.sentence;
        let kept = self
            .cache
            .get(&sentence)
            .is_some_and(|entry| entry.status.state().is_some());
        if !kept {
            let status = match result.error {
                None => ExecStatus::Success(None),
                Some(error) => ExecStatus::Error(error, None),
            };
            let event = self.write(sentence, status, result.feedback);
            if let Some(entry) = self.cache.get_mut(&sentence) {
                entry.since = started;
            }
            return event;
        }

        // The terminator, admitted locally, or a step replayed locally since.
        let mut success = true;
        if let Some(entry) = self.cache.get_mut(&sentence) {
            if let Some(error) = result.error {
                let state = entry.status.state().cloned();
                entry.status = ExecStatus::Error(error, state);
            }
            entry.feedback.extend(result.feedback);
            success = entry.status.is_success();
        }
        ExecutionEvent::Executed { sentence, success }
    }
}

/// Builder for [`ExecutionManager`].
pub struct ExecutionManagerBuilder<A, S> {
    initial_state: S,
    delegation: DelegationMode,
    worker: Option<Box<dyn Worker<A, S>>>,
    tracer: Arc<dyn Tracer>,
}

impl<A: Clone, S: Clone> ExecutionManagerBuilder<A, S> {
    /// Create a new builder with default settings.
    pub fn new(initial_state: S) -> Self {
        Self {
            initial_state,
            delegation: DelegationMode::default(),
            worker: None,
            tracer: Arc::new(NoopTracer),
        }
    }

    /// Apply the execution settings of a [`Config`].
    pub fn config(self, config: &Config) -> Self {
        self.delegation(config.delegation)
    }

    /// Set the delegation mode.
    pub fn delegation(mut self, delegation: DelegationMode) -> Self {
        self.delegation = delegation;
        self
    }

    /// Set the worker receiving delegated proofs.
    pub fn worker(mut self, worker: impl Worker<A, S> + 'static) -> Self {
        self.worker = Some(Box::new(worker));
        self
    }

    /// Set the tracer.
    pub fn tracer(mut self, tracer: impl Tracer) -> Self {
        self.tracer = Arc::new(tracer);
        self
    }

    /// Build the manager.
    pub fn build(self) -> ExecutionManager<A, S> {
        if self.delegation == DelegationMode::Worker && self.worker.is_none() {
            tracing::warn!("worker delegation requested without a worker, proofs are replayed");
        }
        let (sender, receiver) = mpsc::unbounded_channel();
        let clock = Arc::new(AtomicU64::new(0));
        ExecutionManager {
            initial_state: self.initial_state,
            cache: BTreeMap::new(),
            delegation: self.delegation,
            worker: self.worker,
            jobs: Slab::new(),
            next_serial: 0,
            sender: MessageSender {
                sender,
                clock: clock.clone(),
            },
            clock,
            receiver,
            tracer: self.tracer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{QedKind, ScopeChange};
    use crate::policy::DelegateOpaqueProofs;
    use crate::scheduler::{Scheduler, SchedulerState};

    /// Appends sentence ids to a list; fails on ids listed in `failing`.
    #[derive(Default)]
    struct Trace {
        failing: Vec<SentenceId>,
        runs: Vec<SentenceId>,
    }

    impl Backend<()> for Trace {
        type State = Vec<u64>;

        fn run(
            &mut self,
            state: &Vec<u64>,
            sentence: &ExecutableSentence<()>,
        ) -> Result<Vec<u64>, ExecError> {
            self.runs.push(sentence.id);
            if self.failing.contains(&sentence.id) {
                return Err(anyhow::anyhow!("{} failed", sentence.id).into());
            }
            let mut next = state.clone();
            next.push(sentence.id.0);
            Ok(next)
        }
    }

    fn schedule(scheduler: &Scheduler, classifications: &[Classification]) -> Schedule<()> {
        let mut schedule = Schedule::new();
        let mut state = SchedulerState::new();
        for (id, classification) in classifications.iter().enumerate() {
            state = scheduler.schedule_sentence(
                ExecutableSentence {
                    id: SentenceId(id as u64),
                    ast: (),
                    classification: *classification,
                },
                ScopeChange::None,
                &state,
                &mut schedule,
            );
        }
        schedule
    }

    fn chain(n: usize) -> Schedule<()> {
        schedule(&Scheduler::default(), &vec![Classification::Sideff; n])
    }

    fn proof() -> Vec<Classification> {
        vec![
            Classification::StartProof,
            Classification::ProofStep,
            Classification::ProofStep,
            Classification::Qed(QedKind::Opaque),
        ]
    }

    #[test]
    fn test_run_to_executes_chain_once() {
        let schedule = chain(3);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        let report = manager
            .run_to(&mut backend, &schedule, SentenceId(2), &Interrupt::new())
            .unwrap();
        assert!(!report.interrupted);
        assert_eq!(report.events.len(), 3);
        assert_eq!(
            manager.status(SentenceId(2)).unwrap().state(),
            Some(&vec![0, 1, 2])
        );

        // Test that a cached target needs no task.
        let replay = manager.build_tasks_for(&schedule, SentenceId(2)).unwrap();
        assert!(replay.is_finished());
        assert_eq!(backend.runs.len(), 3);
    }

    #[test]
    fn test_replay_starts_from_nearest_cached_state() {
        let schedule = chain(4);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(1), &Interrupt::new())
            .unwrap();
        let replay = manager.build_tasks_for(&schedule, SentenceId(3)).unwrap();
        assert_eq!(replay.state(), &vec![0, 1]);
        assert_eq!(
            replay.tasks().map(PreparedTask::id).collect::<Vec<_>>(),
            vec![SentenceId(2), SentenceId(3)]
        );
    }

    #[test]
    fn test_error_keeps_previous_state() {
        let schedule = chain(3);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace {
            failing: vec![SentenceId(1)],
            ..Default::default()
        };
        manager
            .run_to(&mut backend, &schedule, SentenceId(2), &Interrupt::new())
            .unwrap();
        let status = manager.status(SentenceId(1)).unwrap();
        assert_eq!(status.error().unwrap().message(), "s1 failed");
        assert_eq!(status.state(), Some(&vec![0]));
        assert_eq!(
            manager.status(SentenceId(2)).unwrap().state(),
            Some(&vec![0, 2])
        );
    }

    #[test]
    fn test_interrupt_skips_without_writing() {
        let schedule = chain(2);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        let interrupt = Interrupt::new();
        let mut replay = manager.build_tasks_for(&schedule, SentenceId(1)).unwrap();
        assert!(matches!(
            manager.step(&mut backend, &mut replay, &interrupt),
            StepOutcome::Progressed(_)
        ));
        interrupt.set();
        assert_eq!(
            manager.step(&mut backend, &mut replay, &interrupt),
            StepOutcome::Interrupted
        );
        assert!(!manager.is_executed(SentenceId(1)));
        assert_eq!(replay.remaining(), 1);

        interrupt.clear();
        assert!(matches!(
            manager.step(&mut backend, &mut replay, &interrupt),
            StepOutcome::Progressed(_)
        ));
        assert_eq!(
            manager.step(&mut backend, &mut replay, &interrupt),
            StepOutcome::Finished
        );
        assert!(manager.is_executed(SentenceId(1)));
    }

    #[test]
    fn test_invalidate_cascades_through_dependents() {
        let schedule = chain(3);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(2), &Interrupt::new())
            .unwrap();
        let invalidations = manager.invalidate(&schedule, SentenceId(1));
        assert_eq!(
            invalidations.iter().map(|i| i.sentence).collect::<Vec<_>>(),
            vec![SentenceId(1), SentenceId(2)]
        );
        assert_eq!(invalidations[1].dependency, SentenceId(1));
        assert!(manager.is_executed(SentenceId(0)));
        assert!(!manager.is_executed(SentenceId(2)));

        // no-op the second time
        assert!(manager.invalidate(&schedule, SentenceId(1)).is_empty());
    }

    #[test]
    fn test_invalidate_all_visits_each_entry_once() {
        let schedule = chain(1000);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(999), &Interrupt::new())
            .unwrap();

        let invalidations = manager.invalidate_all(&schedule, (0..1000).map(SentenceId));
        assert_eq!(
            invalidations.iter().map(|i| i.sentence).collect::<Vec<_>>(),
            (0..1000).map(SentenceId).collect::<Vec<_>>()
        );
        assert!(invalidations.iter().all(|i| i.source == SentenceId(0)));
        assert_eq!(manager.executed().count(), 0);
    }

    #[test]
    fn test_invalidation_stops_at_absent_entry() {
        let schedule = chain(4);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(1), &Interrupt::new())
            .unwrap();
        manager
            .run_to(&mut backend, &schedule, SentenceId(3), &Interrupt::new())
            .unwrap();
        manager.invalidate(&schedule, SentenceId(1));
        let executed: Vec<_> = manager.executed().collect();
        assert_eq!(executed, vec![SentenceId(0)]);

        // s0 still reaches s1, already gone, and the walk ends there
        let invalidations = manager.invalidate(&schedule, SentenceId(0));
        assert_eq!(invalidations.len(), 1);
        assert_eq!(invalidations[0].sentence, SentenceId(0));
    }

    #[test]
    fn test_execute_single_task() {
        let schedule = chain(2);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        let replay = manager.build_tasks_for(&schedule, SentenceId(1)).unwrap();
        let tasks: Vec<_> = replay.tasks().cloned().collect();

        let interrupt = Interrupt::new();
        interrupt.set();
        let skipped = manager.execute(&mut backend, vec![7], tasks[0].clone(), &interrupt);
        assert!(skipped.interrupted);
        assert_eq!(skipped.state, vec![7]);
        assert!(skipped.events.is_empty());
        assert!(!manager.is_executed(SentenceId(0)));
        assert!(backend.runs.is_empty());

        interrupt.clear();
        let first = manager.execute(&mut backend, Vec::new(), tasks[0].clone(), &interrupt);
        assert!(!first.interrupted);
        assert_eq!(first.state, vec![0]);
        assert_eq!(
            first.events,
            vec![ExecutionEvent::Executed {
                sentence: SentenceId(0),
                success: true
            }]
        );
        let second = manager.execute(&mut backend, first.state, tasks[1].clone(), &interrupt);
        assert_eq!(second.state, vec![0, 1]);
        assert_eq!(
            manager.status(SentenceId(1)).unwrap().state(),
            Some(&vec![0, 1])
        );
    }

    #[test]
    fn test_opaque_proof_replay_keeps_no_interior_state() {
        let scheduler = Scheduler::new(Arc::new(DelegateOpaqueProofs));
        let schedule = schedule(&scheduler, &proof());
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(3), &Interrupt::new())
            .unwrap();
        assert_eq!(manager.status(SentenceId(1)), Some(&ExecStatus::Success(None)));
        assert_eq!(manager.status(SentenceId(2)), Some(&ExecStatus::Success(None)));
        assert_eq!(
            manager.status(SentenceId(3)).unwrap().state(),
            Some(&vec![0, 1, 2, 3])
        );
    }

    #[test]
    fn test_query_result_is_not_a_state() {
        let schedule = schedule(
            &Scheduler::default(),
            &[Classification::Sideff, Classification::Query],
        );
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(1), &Interrupt::new())
            .unwrap();
        assert_eq!(manager.status(SentenceId(1)), Some(&ExecStatus::Success(None)));
    }

    #[test]
    fn test_feedback_for_unknown_sentence_is_dropped() {
        let schedule = chain(1);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(0), &Interrupt::new())
            .unwrap();

        let sender = manager.message_sender();
        let defined = Feedback::new(Severity::Information, "defined");
        assert!(sender.send_feedback(SentenceId(0), defined));
        let late = Feedback::new(Severity::Warning, "late");
        assert!(sender.send_feedback(SentenceId(7), late));
        assert_eq!(
            manager.poll_messages(),
            vec![ExecutionEvent::Feedback {
                sentence: SentenceId(0)
            }]
        );
        assert_eq!(manager.feedback(SentenceId(0)).len(), 1);
        assert!(manager.feedback(SentenceId(7)).is_empty());
    }

    #[test]
    fn test_feedback_of_previous_execution_is_dropped() {
        let schedule = chain(1);
        let mut manager = ExecutionManager::new(Vec::new());
        let mut backend = Trace::default();
        let sender = manager.message_sender();
        manager
            .run_to(&mut backend, &schedule, SentenceId(0), &Interrupt::new())
            .unwrap();
        let first = Feedback::new(Severity::Warning, "first run");
        sender.send_feedback(SentenceId(0), first);

        manager.invalidate(&schedule, SentenceId(0));
        manager
            .run_to(&mut backend, &schedule, SentenceId(0), &Interrupt::new())
            .unwrap();
        let second = Feedback::new(Severity::Warning, "second run");
        sender.send_feedback(SentenceId(0), second.clone());

        assert_eq!(
            manager.poll_messages(),
            vec![ExecutionEvent::Feedback {
                sentence: SentenceId(0)
            }]
        );
        assert_eq!(manager.feedback(SentenceId(0)), &[second]);
    }

    /// Keeps submitted jobs for the test to run.
    struct Queue(Arc<parking_lot::Mutex<Vec<DelegatedJob<(), Vec<u64>>>>>);

    impl Worker<(), Vec<u64>> for Queue {
        fn submit(&mut self, job: DelegatedJob<(), Vec<u64>>) {
            self.0.lock().push(job);
        }
    }

    #[test]
    fn test_delegated_proof() {
        let scheduler = Scheduler::new(Arc::new(DelegateOpaqueProofs));
        let schedule = schedule(&scheduler, &proof());
        let jobs = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut manager = ExecutionManager::builder(Vec::new())
            .delegation(DelegationMode::Worker)
            .worker(Queue(jobs.clone()))
            .build();
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(3), &Interrupt::new())
            .unwrap();

        // admitted locally on the opener state
        assert_eq!(
            manager.status(SentenceId(3)).unwrap().state(),
            Some(&vec![0, 3])
        );
        assert!(!manager.is_executed(SentenceId(1)));
        assert!(manager.is_delegated(SentenceId(1)));
        assert_eq!(manager.pending_jobs().len(), 1);

        let job = jobs.lock().pop().unwrap();
        assert!(job.run(&mut Trace::default()));
        let events = manager.poll_messages();
        assert!(events.contains(&ExecutionEvent::JobCompleted {
            job: JobId { slot: 0, serial: 0 }
        }));
        assert_eq!(manager.status(SentenceId(1)), Some(&ExecStatus::Success(None)));
        assert!(manager.pending_jobs().is_empty());
    }

    #[test]
    fn test_results_of_dropped_job_are_discarded() {
        let scheduler = Scheduler::new(Arc::new(DelegateOpaqueProofs));
        let schedule = schedule(&scheduler, &proof());
        let jobs = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut manager = ExecutionManager::builder(Vec::new())
            .delegation(DelegationMode::Worker)
            .worker(Queue(jobs.clone()))
            .build();
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(3), &Interrupt::new())
            .unwrap();

        // editing a step reaches the terminator and drops the job
        let invalidations = manager.invalidate(&schedule, SentenceId(2));
        assert!(invalidations.iter().any(|i| i.sentence == SentenceId(3)));
        assert!(manager.pending_jobs().is_empty());

        let job = jobs.lock().pop().unwrap();
        job.run(&mut Trace::default());
        manager.poll_messages();
        assert!(!manager.is_executed(SentenceId(1)));
        assert!(!manager.is_executed(SentenceId(2)));
    }

    #[test]
    fn test_tracer_sees_tasks_and_invalidations() {
        use crate::tracer::{EventCollector, TraceEvent};

        let schedule = chain(2);
        let collector = Arc::new(EventCollector::new());
        let mut manager = ExecutionManager::builder(Vec::new())
            .tracer(collector.clone())
            .build();
        let mut backend = Trace::default();
        manager
            .run_to(&mut backend, &schedule, SentenceId(1), &Interrupt::new())
            .unwrap();
        assert_eq!(
            collector.take(),
            vec![
                TraceEvent::TaskStart {
                    sentence: SentenceId(0),
                    kind: TaskKind::Exec
                },
                TraceEvent::TaskEnd {
                    sentence: SentenceId(0),
                    result: ExecutionResult::Success
                },
                TraceEvent::TaskStart {
                    sentence: SentenceId(1),
                    kind: TaskKind::Exec
                },
                TraceEvent::TaskEnd {
                    sentence: SentenceId(1),
                    result: ExecutionResult::Success
                },
            ]
        );

        manager.invalidate(&schedule, SentenceId(0));
        assert_eq!(
            collector.take(),
            vec![
                TraceEvent::Invalidated {
                    sentence: SentenceId(0),
                    source: SentenceId(0)
                },
                TraceEvent::Invalidated {
                    sentence: SentenceId(1),
                    source: SentenceId(0)
                },
            ]
        );
    }
}
