//! Result aggregation and reporting
//!
//! The [`Aggregator`] is the only shared mutable state the workers write to.
//! Counting a verdict and printing its line happen under one lock, so the
//! per-test lines never interleave and the counters always agree with what
//! was printed.

use crate::classify::{ActualOutcome, Verdict};
use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

/// Outcome of one test, as handed to the aggregator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    /// Base name printed after the verdict tag
    pub name: String,
    pub verdict: Verdict,
    /// What the toolchain reported; `None` for skipped tests and pipeline errors
    pub actual: Option<ActualOutcome>,
}

impl TestResult {
    pub fn new(name: impl Into<String>, verdict: Verdict, actual: Option<ActualOutcome>) -> Self {
        Self {
            name: name.into(),
            verdict,
            actual,
        }
    }

    pub fn skipped(name: impl Into<String>) -> Self {
        Self::new(name, Verdict::Skip, None)
    }
}

/// Snapshot of the run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub ok: usize,
    pub skip: usize,
    pub fail: usize,
    /// Failures of the system compiler or linker, whatever their verdict
    pub toolchain_errors: usize,
    /// Tests handed to the workers
    pub dispatched: usize,
}

impl Summary {
    /// Tests that received a verdict
    pub fn total(&self) -> usize {
        self.ok + self.skip + self.fail
    }

    pub fn passed(&self) -> bool {
        self.fail == 0
    }

    pub fn to_json(&self) -> String {
        // plain integers cannot fail to serialize
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(f, "summary:")?;
        writeln!(f, "  {} succeeded.", self.ok)?;
        writeln!(f, "  {} skipped.", self.skip)?;
        writeln!(f, "  {} failed.", self.fail)
    }
}

struct Inner {
    summary: Summary,
    sink: Box<dyn Write + Send>,
}

/// Thread-safe verdict counter and printer
pub struct Aggregator {
    inner: Mutex<Inner>,
}

impl Aggregator {
    /// Aggregator printing to `sink`
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                summary: Summary::default(),
                sink,
            }),
        }
    }

    /// Aggregator printing to standard output
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut inner)
    }

    /// Count one test as handed to a worker
    pub fn dispatched(&self) {
        self.with(|inner| inner.summary.dispatched += 1);
    }

    /// Count `result` and print its verdict line
    pub fn record(&self, result: &TestResult) {
        self.with(|inner| {
            let summary = &mut inner.summary;
            match result.verdict {
                Verdict::Ok => summary.ok += 1,
                Verdict::Skip => summary.skip += 1,
                Verdict::Fail => summary.fail += 1,
            }
            if matches!(result.actual, Some(ActualOutcome::ToolchainError { .. })) {
                summary.toolchain_errors += 1;
            }

            let line = writeln!(inner.sink, "{} {}", result.verdict.tag(), result.name)
                .and_then(|()| inner.sink.flush());
            if let Err(e) = line {
                warn!(test = %result.name, error = %e, "unable to print verdict");
            }
        })
    }

    pub fn summary(&self) -> Summary {
        self.with(|inner| inner.summary)
    }

    /// Print the final report, as text or JSON, and return the counters
    pub fn report(&self, json: bool) -> io::Result<Summary> {
        self.with(|inner| {
            let summary = inner.summary;
            if json {
                writeln!(inner.sink, "{}", summary.to_json())?;
            } else {
                write!(inner.sink, "{}", summary)?;
            }
            inner.sink.flush()?;
            Ok(summary)
        })
    }
}

impl fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Aggregator")
            .field("summary", &self.summary())
            .finish_non_exhaustive()
    }
}
