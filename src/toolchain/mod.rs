//! Toolchain invocation
//!
//! [`Toolchain`] is the boundary to the external programs: the front-end, the
//! evaluator, the system compiler and the test binaries themselves. Every
//! method reports the child's exit status; `Err` means the child could not be
//! started at all. [`Invoker`] sequences those calls for one test and turns
//! the statuses into an [`ActualOutcome`].

pub mod process;

pub use process::ProcessToolchain;

use crate::case::{TestCase, TestSource};
use crate::classify::{ActualOutcome, ExpectedOutcome, Mode, EXPECTED_FAILURE_STATUS};
use crate::error::{Result, Stage};
use crate::preprocess::Preprocessor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Extension of object files
pub const OBJECT_EXTENSION: &str = "o";

/// Extension of the slow-test timing artifact
pub const TIMING_EXTENSION: &str = "time";

/// Exit status and wall-clock time of a test binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Execution {
    pub code: i32,
    pub elapsed: Duration,
}

/// External programs a test run depends on
pub trait Toolchain: Send + Sync {
    /// `frontend <source> -o <unit>`
    fn translate(&self, source: &Path, unit: &Path, verbose: bool) -> Result<i32>;
    /// Compile a translation unit to an object file
    fn compile(&self, unit: &Path, object: &Path, verbose: bool) -> Result<i32>;
    /// Link an object file against the runtime libraries
    fn link(&self, object: &Path, binary: &Path, verbose: bool) -> Result<i32>;
    /// Run a produced test binary
    fn execute(&self, binary: &Path, verbose: bool) -> Result<Execution>;
    /// `evaluator <source>`
    fn evaluate(&self, source: &Path, verbose: bool) -> Result<i32>;
}

/// Result of invoking the toolchain on one test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub actual: ActualOutcome,
    /// Wall-clock time of the test binary, when it ran
    pub elapsed: Option<Duration>,
}

impl Invocation {
    fn stopped(actual: ActualOutcome) -> Self {
        Self {
            actual,
            elapsed: None,
        }
    }
}

/// Runs the per-test toolchain pipeline
pub struct Invoker<'a> {
    toolchain: &'a dyn Toolchain,
    preprocessor: &'a Preprocessor,
    unit_extension: String,
    slow_threshold: Duration,
}

impl<'a> Invoker<'a> {
    pub fn new(toolchain: &'a dyn Toolchain, preprocessor: &'a Preprocessor) -> Self {
        Self {
            toolchain,
            preprocessor,
            unit_extension: "cc".to_string(),
            slow_threshold: Duration::from_secs(1),
        }
    }

    /// Extension of translation units written by the front-end
    pub fn with_unit_extension(mut self, extension: impl Into<String>) -> Self {
        self.unit_extension = extension.into();
        self
    }

    /// Runs longer than this leave a timing artifact
    pub fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }

    /// Source the front-end sees: the `.pp` sibling when the test includes libraries
    fn input(&self, case: &TestCase, source: &TestSource) -> Result<PathBuf> {
        if source.has_include() {
            self.preprocessor.write_sibling(case, source.text())
        } else {
            Ok(case.path().to_path_buf())
        }
    }

    /// Run `case` through the toolchain in `mode`.
    ///
    /// A binary built from a test expected to fail translation is never
    /// executed; the invocation reports `RuntimeSuccess` with no elapsed time.
    pub fn run(
        &self,
        case: &TestCase,
        source: &TestSource,
        expected: ExpectedOutcome,
        mode: Mode,
        verbose: bool,
    ) -> Result<Invocation> {
        let input = self.input(case, source)?;
        match mode {
            Mode::Evaluate => self.evaluate(&input, verbose),
            Mode::CompileAndRun => self.compile_and_run(case, &input, expected, verbose),
        }
    }

    fn evaluate(&self, input: &Path, verbose: bool) -> Result<Invocation> {
        let actual = match self.toolchain.evaluate(input, verbose)? {
            0 => ActualOutcome::RuntimeSuccess,
            EXPECTED_FAILURE_STATUS => ActualOutcome::ParseFailure,
            code => ActualOutcome::RuntimeFailure(code),
        };
        Ok(Invocation::stopped(actual))
    }

    fn compile_and_run(
        &self,
        case: &TestCase,
        input: &Path,
        expected: ExpectedOutcome,
        verbose: bool,
    ) -> Result<Invocation> {
        let unit = case.artifact(&self.unit_extension);
        let object = case.artifact(OBJECT_EXTENSION);
        let binary = case.binary();

        let code = self.toolchain.translate(input, &unit, verbose)?;
        if code != 0 {
            debug!(test = %case.name(), code, "translation failed");
            return Ok(Invocation::stopped(ActualOutcome::ParseFailure));
        }

        let code = self.toolchain.compile(&unit, &object, verbose)?;
        if code != 0 {
            warn!(test = %case.name(), stage = %Stage::Compile, code, "toolchain error");
            return Ok(Invocation::stopped(ActualOutcome::ToolchainError {
                stage: Stage::Compile,
                code,
            }));
        }

        let code = self.toolchain.link(&object, &binary, verbose)?;
        if code != 0 {
            warn!(test = %case.name(), stage = %Stage::Link, code, "toolchain error");
            return Ok(Invocation::stopped(ActualOutcome::ToolchainError {
                stage: Stage::Link,
                code,
            }));
        }

        if expected == ExpectedOutcome::ExpectParseFailure {
            debug!(test = %case.name(), "negative test translated, not running it");
            return Ok(Invocation::stopped(ActualOutcome::RuntimeSuccess));
        }

        let execution = self.toolchain.execute(&binary, verbose)?;
        if execution.elapsed > self.slow_threshold {
            write_timing(case, execution.elapsed);
        }

        let actual = if execution.code == 0 {
            ActualOutcome::RuntimeSuccess
        } else {
            ActualOutcome::RuntimeFailure(execution.code)
        };
        Ok(Invocation {
            actual,
            elapsed: Some(execution.elapsed),
        })
    }
}

/// Leave the elapsed seconds next to a slow test
fn write_timing(case: &TestCase, elapsed: Duration) {
    let target = case.artifact(TIMING_EXTENSION);
    match std::fs::write(&target, format!("{}\n", elapsed.as_secs_f64())) {
        Ok(()) => debug!(test = %case.name(), secs = elapsed.as_secs_f64(), "slow test"),
        Err(e) => warn!(target = %target.display(), error = %e, "unable to write timing file"),
    }
}

impl std::fmt::Debug for Invoker<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invoker")
            .field("unit_extension", &self.unit_extension)
            .field("slow_threshold", &self.slow_threshold)
            .finish_non_exhaustive()
    }
}
