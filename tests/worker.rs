//! Tests for proofs delegated to a worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use proof_flow::report::{diagnostics, executed_ranges};
use proof_flow::toy::{ToyAst, ToyBackend, ToyParser, ToyScope, ToyState, ToyWorker};
use proof_flow::{
    DelegateOpaqueProofs, DelegatedJob, DelegationMode, DiagnosticsConfig, Document, ExecStatus,
    ExecutionEvent, ExecutionManager, Interrupt, JobId, Severity, TextEdit, Worker,
};
use tokio::sync::mpsc;

/// Runs each job on the blocking pool and reports its id once the result is sent.
struct BlockingWorker {
    done: mpsc::UnboundedSender<JobId>,
}

impl Worker<ToyAst, ToyState> for BlockingWorker {
    fn submit(&mut self, job: DelegatedJob<ToyAst, ToyState>) {
        let done = self.done.clone();
        tokio::task::spawn_blocking(move || {
            let id = job.id;
            job.run(&mut ToyBackend::default());
            let _ = done.send(id);
        });
    }
}

/// Keeps jobs until the test releases them.
#[derive(Clone, Default)]
struct HeldWorker {
    jobs: Arc<Mutex<Vec<DelegatedJob<ToyAst, ToyState>>>>,
}

impl Worker<ToyAst, ToyState> for HeldWorker {
    fn submit(&mut self, job: DelegatedJob<ToyAst, ToyState>) {
        self.jobs.lock().push(job);
    }
}

fn delegating(text: &str) -> Document<ToyParser> {
    let mut document = Document::builder(ToyParser, ToyScope::default())
        .text(text)
        .policy(Arc::new(DelegateOpaqueProofs))
        .build();
    document.validate();
    document
}

fn manager_with(
    worker: impl Worker<ToyAst, ToyState> + 'static,
) -> ExecutionManager<ToyAst, ToyState> {
    ExecutionManager::builder(ToyState::default())
        .delegation(DelegationMode::Worker)
        .worker(worker)
        .build()
}

// ============================================================================
// Delegation
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_delegated_proof_completes() {
    let document = delegating("op a. lemma l. tac1. tac2. qed. check l.");
    let ids = document.sentence_ids();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut manager = manager_with(BlockingWorker { done: done_tx });
    let mut backend = ToyBackend::default();

    let report = manager
        .run_to(&mut backend, document.schedule(), ids[5], &Interrupt::new())
        .unwrap();
    let job = match report.events.iter().find_map(|event| match event {
        ExecutionEvent::Delegated { job, terminator } => Some((*job, *terminator)),
        _ => None,
    }) {
        Some((job, terminator)) => {
            assert_eq!(terminator, ids[4]);
            job
        }
        None => panic!("no delegated job in {:?}", report.events),
    };
    // the terminator is admitted locally, later sentences run right away
    assert!(manager.status(ids[4]).unwrap().is_success());
    assert!(manager.status(ids[5]).unwrap().is_success());
    assert!(!backend.runs.contains(&ids[2]));

    assert_eq!(done_rx.recv().await, Some(job));
    let events = manager.poll_messages();
    assert_eq!(events.last(), Some(&ExecutionEvent::JobCompleted { job }));
    assert!(manager.pending_jobs().is_empty());
    assert!(!manager.is_delegated(ids[2]));
    assert_eq!(manager.status(ids[2]), Some(&ExecStatus::Success(None)));
    assert_eq!(manager.status(ids[3]), Some(&ExecStatus::Success(None)));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failing_step_is_reported_after_completion() {
    let document = delegating("lemma l. intro. fail. qed.");
    let ids = document.sentence_ids();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut manager = manager_with(BlockingWorker { done: done_tx });
    let mut backend = ToyBackend::default();

    manager
        .run_to(&mut backend, document.schedule(), ids[3], &Interrupt::new())
        .unwrap();
    let pending = executed_ranges(&document, &manager);
    assert_eq!(pending.pending.len(), 1);
    assert!(pending.errored.is_empty());

    done_rx.recv().await.unwrap();
    manager.poll_messages();

    assert_eq!(
        manager.status(ids[2]).unwrap().error().unwrap().message(),
        "tactic failed"
    );
    assert!(manager.status(ids[3]).unwrap().is_success());
    let ranges = executed_ranges(&document, &manager);
    assert!(ranges.pending.is_empty());
    assert_eq!(ranges.errored.len(), 1);

    let reported = diagnostics(&document, &manager, &DiagnosticsConfig::default());
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].severity, Severity::Error);
    assert_eq!(reported[0].sentence, Some(ids[2]));
}

#[tokio::test]
async fn test_edit_drops_outstanding_job() {
    let mut document = delegating("lemma l. tac1. tac2. qed. op b.");
    let ids = document.sentence_ids();
    let worker = HeldWorker::default();
    let mut manager = manager_with(worker.clone());
    let mut backend = ToyBackend::default();
    manager
        .run_to(&mut backend, document.schedule(), ids[4], &Interrupt::new())
        .unwrap();
    assert_eq!(manager.pending_jobs().len(), 1);
    assert!(manager.is_delegated(ids[1]));

    // rewrite `tac1.`
    document.apply_edit(&TextEdit::new(9, 13, "tac3")).unwrap();
    let validation = document.validate();
    manager.invalidate_all(document.schedule(), validation.invalidated.iter().copied());
    assert!(manager.pending_jobs().is_empty());
    assert!(!manager.is_executed(ids[3]));
    assert!(!manager.is_executed(ids[4]));

    // the stale result arrives late and is ignored
    let jobs = std::mem::take(&mut *worker.jobs.lock());
    for job in jobs {
        tokio::task::spawn_blocking(move || job.run(&mut ToyBackend::default()))
            .await
            .unwrap();
    }
    assert!(manager.poll_messages().is_empty());
    assert!(!manager.is_executed(ids[2]));

    // running again delegates a fresh job
    let new_ids = document.sentence_ids();
    manager
        .run_to(&mut backend, document.schedule(), new_ids[4], &Interrupt::new())
        .unwrap();
    assert_eq!(manager.pending_jobs().len(), 1);
    assert_eq!(worker.jobs.lock().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_step_feedback_surfaces_after_completion() {
    let document = delegating("lemma l. note almost there. qed.");
    let ids = document.sentence_ids();
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    let mut manager = manager_with(BlockingWorker { done: done_tx });
    let mut backend = ToyBackend::default();
    manager
        .run_to(&mut backend, document.schedule(), ids[2], &Interrupt::new())
        .unwrap();
    assert!(manager.feedback(ids[1]).is_empty());

    done_rx.recv().await.unwrap();
    manager.poll_messages();
    assert_eq!(manager.feedback(ids[1]).len(), 1);
    assert_eq!(manager.feedback(ids[1])[0].severity, Severity::Warning);
    assert_eq!(manager.feedback(ids[1])[0].message, "almost there");

    let reported = diagnostics(&document, &manager, &DiagnosticsConfig::default());
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].sentence, Some(ids[1]));
}

// ============================================================================
// Thread worker and feedback
// ============================================================================

#[test]
fn test_toy_worker() {
    let document = delegating("lemma l. tac. qed.");
    let ids = document.sentence_ids();
    let mut manager = manager_with(ToyWorker);
    let mut backend = ToyBackend::default();
    manager
        .run_to(&mut backend, document.schedule(), ids[2], &Interrupt::new())
        .unwrap();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !manager.pending_jobs().is_empty() {
        assert!(Instant::now() < deadline, "worker did not answer");
        manager.poll_messages();
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(manager.status(ids[1]), Some(&ExecStatus::Success(None)));
}

#[test]
fn test_asynchronous_feedback() {
    let document = delegating("op a. print a. print b.");
    let ids = document.sentence_ids();
    let mut manager = ExecutionManager::new(ToyState::default());
    let mut backend = ToyBackend::with_feedback(manager.message_sender());
    manager
        .run_to(&mut backend, document.schedule(), ids[1], &Interrupt::new())
        .unwrap();
    manager
        .run_to(&mut backend, document.schedule(), ids[2], &Interrupt::new())
        .unwrap();

    // feedback is queued until polled
    assert!(manager.feedback(ids[1]).is_empty());
    assert_eq!(
        manager.poll_messages(),
        vec![ExecutionEvent::Feedback { sentence: ids[1] }]
    );
    assert_eq!(manager.feedback(ids[1])[0].severity, Severity::Information);
    assert_eq!(manager.feedback(ids[1])[0].message, "a is declared");
    assert!(manager.status(ids[2]).unwrap().error().is_some());

    // information is below the default threshold
    let reported = diagnostics(&document, &manager, &DiagnosticsConfig::default());
    assert_eq!(reported.len(), 1);
    let verbose = DiagnosticsConfig {
        min_severity: Severity::Information,
        ..Default::default()
    };
    assert_eq!(diagnostics(&document, &manager, &verbose).len(), 2);
}

#[test]
fn test_feedback_of_invalidated_run_is_dropped() {
    let document = delegating("op a. print a.");
    let ids = document.sentence_ids();
    let mut manager = ExecutionManager::new(ToyState::default());
    let mut backend = ToyBackend::with_feedback(manager.message_sender());
    manager
        .run_to(&mut backend, document.schedule(), ids[1], &Interrupt::new())
        .unwrap();
    let invalidated = manager.invalidate(document.schedule(), ids[0]);
    assert_eq!(invalidated.len(), 2);
    manager
        .run_to(&mut backend, document.schedule(), ids[1], &Interrupt::new())
        .unwrap();

    // both runs queued a message; only the second one is kept
    assert_eq!(
        manager.poll_messages(),
        vec![ExecutionEvent::Feedback { sentence: ids[1] }]
    );
    assert_eq!(manager.feedback(ids[1]).len(), 1);
    assert_eq!(manager.feedback(ids[1])[0].message, "a is declared");
}
