//! Tracer trait for observing execution.
//!
//! This module defines the [`Tracer`] trait and related types for observing task execution,
//! cache invalidation and proof delegation. The default [`NoopTracer`] discards everything;
//! [`LogTracer`] forwards to the `tracing` crate and [`EventCollector`] records events for tests.
//!
//! # Example
//!
//! ```
//! use proof_flow::{SentenceId, SpanId, TaskKind, Tracer};
//!
//! struct PrintTracer;
//!
//! impl Tracer for PrintTracer {
//!     fn new_span_id(&self) -> SpanId {
//!         SpanId(1)
//!     }
//!
//!     fn on_task_start(&self, _span_id: SpanId, sentence: SentenceId, kind: TaskKind) {
//!         println!("running {kind} for {sentence}");
//!     }
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::execution::Feedback;
use crate::invalidation::Invalidation;
use crate::id::{JobId, SentenceId};
use crate::scheduler::TaskKind;

/// Unique identifier for a task execution span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpanId(pub u64);

/// Task execution result classification.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExecutionResult {
    /// The backend accepted the sentence.
    Success,
    /// The backend rejected the sentence.
    Error { message: String },
    /// The proof was handed to a worker; only the terminator was admitted locally.
    Delegated,
}

/// Tracer trait for observing execution.
///
/// All methods but [`Tracer::new_span_id`] have default empty implementations, so you only need
/// to override the events you're interested in.
pub trait Tracer: Send + Sync + 'static {
    /// Generate a new unique span ID. Called at the start of each task.
    fn new_span_id(&self) -> SpanId;

    /// Called when a task starts.
    #[inline]
    fn on_task_start(&self, _span_id: SpanId, _sentence: SentenceId, _kind: TaskKind) {}

    /// Called when a task ends.
    #[inline]
    fn on_task_end(&self, _span_id: SpanId, _sentence: SentenceId, _result: ExecutionResult) {}

    /// Called when a cache entry is invalidated.
    #[inline]
    fn on_invalidated(&self, _invalidation: &Invalidation) {}

    /// Called when an execution is skipped because the interrupt flag is set.
    #[inline]
    fn on_interrupted(&self, _sentence: SentenceId) {}

    /// Called when a proof is handed to a worker.
    #[inline]
    fn on_job_delegated(&self, _job: JobId, _terminator: SentenceId) {}

    /// Called when the results of a delegated proof are applied.
    #[inline]
    fn on_job_completed(&self, _job: JobId) {}

    /// Called when a pending job is dropped by invalidation.
    #[inline]
    fn on_job_dropped(&self, _job: JobId, _terminator: SentenceId) {}

    /// Called when feedback arrives for a sentence without a cache entry.
    #[inline]
    fn on_feedback_dropped(&self, _sentence: SentenceId, _feedback: &Feedback) {}
}

/// Global span counter shared by the provided tracers.
static SPAN_COUNTER: AtomicU64 = AtomicU64::new(1);

fn next_span_id() -> SpanId {
    SpanId(SPAN_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Tracer that discards all events.
///
/// This is the default tracer of [`ExecutionManager`](crate::ExecutionManager).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

impl Tracer for NoopTracer {
    #[inline(always)]
    fn new_span_id(&self) -> SpanId {
        next_span_id()
    }
}

/// Tracer forwarding events to the `tracing` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn new_span_id(&self) -> SpanId {
        next_span_id()
    }

    fn on_task_start(&self, span_id: SpanId, sentence: SentenceId, kind: TaskKind) {
        tracing::trace!(span = span_id.0, %sentence, %kind, "task started");
    }

    fn on_task_end(&self, span_id: SpanId, sentence: SentenceId, result: ExecutionResult) {
        match result {
            ExecutionResult::Error { message } => {
                tracing::debug!(span = span_id.0, %sentence, %message, "task failed")
            }
            result => tracing::trace!(span = span_id.0, %sentence, ?result, "task ended"),
        }
    }

    fn on_invalidated(&self, invalidation: &Invalidation) {
        tracing::trace!(
            sentence = %invalidation.sentence,
            source = %invalidation.source,
            reason = ?invalidation.reason,
            "invalidated"
        );
    }

    fn on_interrupted(&self, sentence: SentenceId) {
        tracing::debug!(%sentence, "interrupted");
    }

    fn on_job_delegated(&self, job: JobId, terminator: SentenceId) {
        tracing::debug!(%job, %terminator, "delegated proof");
    }

    fn on_job_completed(&self, job: JobId) {
        tracing::debug!(%job, "delegated proof completed");
    }

    fn on_job_dropped(&self, job: JobId, terminator: SentenceId) {
        tracing::debug!(%job, %terminator, "dropped delegated proof");
    }

    fn on_feedback_dropped(&self, sentence: SentenceId, feedback: &Feedback) {
        tracing::debug!(%sentence, message = %feedback.message, "dropped feedback");
    }
}

/// An event recorded by [`EventCollector`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    TaskStart {
        sentence: SentenceId,
        kind: TaskKind,
    },
    TaskEnd {
        sentence: SentenceId,
        result: ExecutionResult,
    },
    Invalidated {
        sentence: SentenceId,
        source: SentenceId,
    },
    Interrupted {
        sentence: SentenceId,
    },
    JobDelegated {
        job: JobId,
        terminator: SentenceId,
    },
    JobCompleted {
        job: JobId,
    },
    JobDropped {
        job: JobId,
        terminator: SentenceId,
    },
    FeedbackDropped {
        sentence: SentenceId,
    },
}

/// Tracer recording every event in memory.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Mutex<Vec<TraceEvent>>,
}

impl EventCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Default::default()
    }

    /// Take the recorded events.
    pub fn take(&self) -> Vec<TraceEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Copy the recorded events.
    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().clone()
    }

    fn push(&self, event: TraceEvent) {
        self.events.lock().push(event);
    }
}

impl Tracer for EventCollector {
    fn new_span_id(&self) -> SpanId {
        next_span_id()
    }

    fn on_task_start(&self, _span_id: SpanId, sentence: SentenceId, kind: TaskKind) {
        self.push(TraceEvent::TaskStart { sentence, kind });
    }

    fn on_task_end(&self, _span_id: SpanId, sentence: SentenceId, result: ExecutionResult) {
        self.push(TraceEvent::TaskEnd { sentence, result });
    }

    fn on_invalidated(&self, invalidation: &Invalidation) {
        self.push(TraceEvent::Invalidated {
            sentence: invalidation.sentence,
            source: invalidation.source,
        });
    }

    fn on_interrupted(&self, sentence: SentenceId) {
        self.push(TraceEvent::Interrupted { sentence });
    }

    fn on_job_delegated(&self, job: JobId, terminator: SentenceId) {
        self.push(TraceEvent::JobDelegated { job, terminator });
    }

    fn on_job_completed(&self, job: JobId) {
        self.push(TraceEvent::JobCompleted { job });
    }

    fn on_job_dropped(&self, job: JobId, terminator: SentenceId) {
        self.push(TraceEvent::JobDropped { job, terminator });
    }

    fn on_feedback_dropped(&self, sentence: SentenceId, _feedback: &Feedback) {
        self.push(TraceEvent::FeedbackDropped { sentence });
    }
}

impl<T: Tracer> Tracer for std::sync::Arc<T> {
    fn new_span_id(&self) -> SpanId {
        (**self).new_span_id()
    }

    fn on_task_start(&self, span_id: SpanId, sentence: SentenceId, kind: TaskKind) {
        (**self).on_task_start(span_id, sentence, kind)
    }

    fn on_task_end(&self, span_id: SpanId, sentence: SentenceId, result: ExecutionResult) {
        (**self).on_task_end(span_id, sentence, result)
    }

    fn on_invalidated(&self, invalidation: &Invalidation) {
        (**self).on_invalidated(invalidation)
    }

    fn on_interrupted(&self, sentence: SentenceId) {
        (**self).on_interrupted(sentence)
    }

    fn on_job_delegated(&self, job: JobId, terminator: SentenceId) {
        (**self).on_job_delegated(job, terminator)
    }

    fn on_job_completed(&self, job: JobId) {
        (**self).on_job_completed(job)
    }

    fn on_job_dropped(&self, job: JobId, terminator: SentenceId) {
        (**self).on_job_dropped(job, terminator)
    }

    fn on_feedback_dropped(&self, sentence: SentenceId, feedback: &Feedback) {
        (**self).on_feedback_dropped(sentence, feedback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct CountingTracer {
        start_count: AtomicUsize,
        end_count: AtomicUsize,
    }

    impl Tracer for CountingTracer {
        fn new_span_id(&self) -> SpanId {
            SpanId(1)
        }

        fn on_task_start(&self, _span_id: SpanId, _sentence: SentenceId, _kind: TaskKind) {
            self.start_count.fetch_add(1, Ordering::Relaxed);
        }

        fn on_task_end(&self, _span_id: SpanId, _sentence: SentenceId, _result: ExecutionResult) {
            self.end_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn test_noop_tracer_span_id() {
        let tracer = NoopTracer;
        let id1 = tracer.new_span_id();
        let id2 = tracer.new_span_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_counting_tracer() {
        let tracer = CountingTracer {
            start_count: AtomicUsize::new(0),
            end_count: AtomicUsize::new(0),
        };
        tracer.on_task_start(SpanId(1), SentenceId(0), TaskKind::Exec);
        tracer.on_task_start(SpanId(2), SentenceId(1), TaskKind::Exec);
        tracer.on_task_end(SpanId(1), SentenceId(0), ExecutionResult::Success);

        assert_eq!(tracer.start_count.load(Ordering::Relaxed), 2);
        assert_eq!(tracer.end_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_event_collector_take() {
        let collector = Arc::new(EventCollector::new());
        collector.on_interrupted(SentenceId(4));
        assert_eq!(
            collector.take(),
            vec![TraceEvent::Interrupted {
                sentence: SentenceId(4)
            }]
        );
        assert!(collector.events().is_empty());
    }

    #[test]
    fn test_tracer_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NoopTracer>();
        assert_send_sync::<Arc<EventCollector>>();
    }
}
