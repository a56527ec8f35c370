//! Expected-outcome classification
//!
//! Each test gets exactly one [`ExpectedOutcome`]. The rules are layered:
//!
//! 1. anything on the skip list is skipped;
//! 2. a test whose source carries `@negative` must fail, otherwise it must
//!    succeed;
//! 3. when compiling, the runtime-fail list moves a negative test from
//!    "fails to translate" to "translates, then fails when run".
//!
//! The runtime-fail list only ever refines a negative expectation; it cannot
//! turn a passing test into a failing one.

pub mod lists;

pub use lists::CuratedLists;

use crate::case::{TestCase, TestSource};
use crate::error::Stage;
use std::fmt;

/// Exit status a test program uses to report failure
pub const EXPECTED_FAILURE_STATUS: i32 = 1;

/// How tests are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Hand the source to the evaluator
    Evaluate,
    /// Translate, compile, link and run a native binary
    CompileAndRun,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Evaluate => write!(f, "evaluate"),
            Mode::CompileAndRun => write!(f, "compile-and-run"),
        }
    }
}

/// What a test is supposed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExpectedOutcome {
    Skip,
    ExpectParseFailure,
    ExpectRuntimeFailure,
    ExpectSuccess,
}

/// What a test actually did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActualOutcome {
    /// The front-end rejected the source
    ParseFailure,
    /// The program ran and exited with a nonzero status
    RuntimeFailure(i32),
    /// The program ran and exited with status 0
    RuntimeSuccess,
    /// The system compiler or linker failed
    ToolchainError { stage: Stage, code: i32 },
}

impl fmt::Display for ActualOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActualOutcome::ParseFailure => write!(f, "parse failure"),
            ActualOutcome::RuntimeFailure(code) => write!(f, "runtime failure (status {})", code),
            ActualOutcome::RuntimeSuccess => write!(f, "runtime success"),
            ActualOutcome::ToolchainError { stage, code } => {
                write!(f, "{} error (status {})", stage, code)
            }
        }
    }
}

/// Per-test verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    Ok,
    Fail,
    Skip,
}

impl Verdict {
    /// Fixed-width tag printed in front of the test name
    pub fn tag(self) -> &'static str {
        match self {
            Verdict::Ok => "[ OK ]",
            Verdict::Fail => "[FAIL]",
            Verdict::Skip => "[SKIP]",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Compare what happened against what was expected.
///
/// A compiler or linker failure counts as a translation failure, so it
/// satisfies [`ExpectedOutcome::ExpectParseFailure`].
pub fn judge(expected: ExpectedOutcome, actual: ActualOutcome) -> Verdict {
    let matched = match expected {
        ExpectedOutcome::Skip => return Verdict::Skip,
        ExpectedOutcome::ExpectParseFailure => matches!(
            actual,
            ActualOutcome::ParseFailure | ActualOutcome::ToolchainError { .. }
        ),
        ExpectedOutcome::ExpectRuntimeFailure => {
            actual == ActualOutcome::RuntimeFailure(EXPECTED_FAILURE_STATUS)
        }
        ExpectedOutcome::ExpectSuccess => actual == ActualOutcome::RuntimeSuccess,
    };
    if matched {
        Verdict::Ok
    } else {
        Verdict::Fail
    }
}

/// Applies the curated lists and the `@negative` convention
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    lists: &'a CuratedLists,
}

impl<'a> Classifier<'a> {
    pub fn new(lists: &'a CuratedLists) -> Self {
        Self { lists }
    }

    /// Whether `case` is skipped; decidable without reading the source
    pub fn is_skipped(&self, case: &TestCase) -> bool {
        self.lists.is_skipped(case.relative())
    }

    /// The single expected outcome of `case`
    pub fn classify(&self, case: &TestCase, source: &TestSource, mode: Mode) -> ExpectedOutcome {
        if self.is_skipped(case) {
            return ExpectedOutcome::Skip;
        }
        if !source.is_negative() {
            return ExpectedOutcome::ExpectSuccess;
        }
        if mode == Mode::CompileAndRun && self.lists.fails_at_runtime(case.relative()) {
            ExpectedOutcome::ExpectRuntimeFailure
        } else {
            ExpectedOutcome::ExpectParseFailure
        }
    }
}
