//! Execution engine
//!
//! The calling thread dispatches test cases into a bounded [`WorkQueue`];
//! a fixed pool of scoped worker threads pulls them one at a time and runs
//! each through the [`Pipeline`] (classify, invoke, judge, record).
//!
//! ```text
//! dispatcher ──send──▶ WorkQueue(N) ──recv──▶ worker × N ──record──▶ Aggregator
//!      ▲                                           │
//!      └────────── AbortSignal ◀── Fail ───────────┘
//! ```
//!
//! Aborting only stops dispatch. Work already queued drains and is recorded,
//! and child processes are always waited for.

pub mod queue;

pub use queue::WorkQueue;

use crate::case::TestCase;
use crate::classify::{judge, Classifier, ExpectedOutcome, Mode, Verdict};
use crate::manifest::ResumeCursor;
use crate::report::{Aggregator, Summary, TestResult};
use crate::toolchain::Invoker;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// One-way latch raised by the first failing test
#[derive(Debug, Default)]
pub struct AbortSignal(AtomicBool);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise the latch; returns `true` for the call that raised it
    pub fn trigger(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    /// The dispatcher is feeding the queue
    Dispatching,
    /// Dispatch has stopped; workers finish what was queued
    Draining,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::Idle => write!(f, "idle"),
            RunPhase::Dispatching => write!(f, "dispatching"),
            RunPhase::Draining => write!(f, "draining"),
            RunPhase::Done => write!(f, "done"),
        }
    }
}

/// Per-test work shared by every worker
pub struct Pipeline<'a> {
    classifier: Classifier<'a>,
    invoker: Invoker<'a>,
    aggregator: &'a Aggregator,
    mode: Mode,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        classifier: Classifier<'a>,
        invoker: Invoker<'a>,
        aggregator: &'a Aggregator,
        mode: Mode,
    ) -> Self {
        Self {
            classifier,
            invoker,
            aggregator,
            mode,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn aggregator(&self) -> &Aggregator {
        self.aggregator
    }

    /// Decide the verdict for `case` without recording it
    pub fn evaluate(&self, case: &TestCase, verbose: bool) -> TestResult {
        let name = case.name();
        if self.classifier.is_skipped(case) {
            return TestResult::skipped(name);
        }

        let source = match case.read_source() {
            Ok(source) => source,
            Err(e) => {
                error!(test = %name, error = %e, "unable to read test");
                return TestResult::new(name, Verdict::Fail, None);
            }
        };

        let expected = self.classifier.classify(case, &source, self.mode);
        if expected == ExpectedOutcome::Skip {
            return TestResult::skipped(name);
        }

        match self.invoker.run(case, &source, expected, self.mode, verbose) {
            Ok(invocation) => {
                let verdict = judge(expected, invocation.actual);
                debug!(
                    test = %name,
                    expected = ?expected,
                    actual = %invocation.actual,
                    verdict = %verdict,
                    "judged"
                );
                TestResult::new(name, verdict, Some(invocation.actual))
            }
            Err(e) => {
                error!(test = %name, error = %e, "pipeline error");
                TestResult::new(name, Verdict::Fail, None)
            }
        }
    }

    /// Decide and record the verdict for `case`
    pub fn process(&self, case: &TestCase, verbose: bool) -> Verdict {
        let result = self.evaluate(case, verbose);
        self.aggregator.record(&result);
        result.verdict
    }

    /// Run `cases` one after another on the calling thread, with child output shown
    pub fn run_single(&self, cases: &[TestCase]) -> Summary {
        for case in cases {
            self.aggregator.dispatched();
            self.process(case, true);
        }
        self.aggregator.summary()
    }
}

impl fmt::Debug for Pipeline<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("mode", &self.mode)
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}

/// Concurrent test runner
#[derive(Debug)]
pub struct Engine<'a> {
    pipeline: Pipeline<'a>,
    workers: usize,
    abort_on_fail: bool,
    abort: AbortSignal,
    phase: Mutex<RunPhase>,
}

impl<'a> Engine<'a> {
    /// Engine with `workers` threads (at least one)
    pub fn new(pipeline: Pipeline<'a>, workers: usize) -> Self {
        Self {
            pipeline,
            workers: workers.max(1),
            abort_on_fail: true,
            abort: AbortSignal::new(),
            phase: Mutex::new(RunPhase::Idle),
        }
    }

    /// Whether a failing test stops further dispatch
    pub fn with_abort_on_fail(mut self, abort_on_fail: bool) -> Self {
        self.abort_on_fail = abort_on_fail;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn pipeline(&self) -> &Pipeline<'a> {
        &self.pipeline
    }

    pub fn abort_signal(&self) -> &AbortSignal {
        &self.abort
    }

    pub fn phase(&self) -> RunPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, phase: RunPhase) {
        debug!(%phase, "run phase");
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
    }

    fn work(&self, queue: &WorkQueue<TestCase>) {
        while let Some(case) = queue.recv() {
            let verdict = self.pipeline.process(&case, false);
            if verdict == Verdict::Fail && self.abort_on_fail && self.abort.trigger() {
                info!(test = %case.name(), "test failed, stopping dispatch");
            }
            queue.task_done();
        }
    }

    fn dispatch<I>(&self, queue: &WorkQueue<TestCase>, tests: I, cursor: &mut ResumeCursor)
    where
        I: IntoIterator<Item = TestCase>,
    {
        for case in tests {
            if !cursor.admit(case.path()) {
                continue;
            }
            if self.abort.is_set() {
                break;
            }
            self.pipeline.aggregator().dispatched();
            if queue.send(case).is_err() {
                break;
            }
        }
    }

    /// Run every test in `tests` admitted by `cursor` and return the final counters
    pub fn run<I>(&self, tests: I, mut cursor: ResumeCursor) -> Summary
    where
        I: IntoIterator<Item = TestCase>,
    {
        let queue = WorkQueue::with_capacity(self.workers);
        info!(workers = self.workers, mode = %self.pipeline.mode(), "starting run");

        std::thread::scope(|s| {
            for _ in 0..self.workers {
                s.spawn(|| self.work(&queue));
            }

            self.set_phase(RunPhase::Dispatching);
            self.dispatch(&queue, tests, &mut cursor);
            self.set_phase(RunPhase::Draining);
            queue.close();
        });
        self.set_phase(RunPhase::Done);

        if !cursor.found() {
            warn!("resume point was never reached; nothing was run");
        }
        if self.abort.is_set() {
            info!("run aborted after a failure");
        }
        debug!(peak = queue.peak(), "queue drained");
        self.pipeline.aggregator().summary()
    }
}
