//! test262-harness CLI
//!
//! Runs every test listed by the manifest, or a single test when one is named.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use test262_harness::case::TestCase;
use test262_harness::classify::{Classifier, CuratedLists, Mode};
use test262_harness::config::HarnessConfig;
use test262_harness::engine::{Engine, Pipeline};
use test262_harness::manifest::{self, ResumeCursor};
use test262_harness::preprocess::Preprocessor;
use test262_harness::report::{Aggregator, Summary};
use test262_harness::toolchain::{Invoker, ProcessToolchain};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "TEST262_LOG";

#[derive(Parser)]
#[command(name = "test262-harness")]
#[command(author, version, long_about = None)]
#[command(about = "Run the test262 conformance suite against the compiler")]
struct Cli {
    /// Run only this test: a path, or a file-name pattern searched under the suite directory
    #[arg(value_name = "TEST", conflicts_with = "start_at")]
    test: Option<String>,

    /// Number of worker threads
    #[arg(long, value_name = "N")]
    num_threads: Option<usize>,

    /// Skip tests until the one with this file name (inclusive)
    #[arg(long, value_name = "NAME")]
    start_at: Option<String>,

    /// Evaluate tests directly instead of compiling them
    #[arg(long)]
    use_evaluator: bool,

    /// Keep dispatching after a test fails
    #[arg(long)]
    keep_going: bool,

    /// JSON configuration file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Manifest listing the test directories
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<HarnessConfig> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    if let Some(workers) = cli.num_threads {
        config.workers = workers;
    }
    if let Some(manifest) = &cli.manifest {
        config.manifest = manifest.clone();
    }
    if cli.keep_going {
        config.abort_on_fail = false;
    }
    Ok(config)
}

/// Cases named by the single-test argument
fn single_tests(config: &HarnessConfig, test: &str) -> Result<Vec<TestCase>> {
    let suite_dir = config.resolve(&config.suite_dir);
    let root = absolute(&config.root)?;
    manifest::find_tests(&suite_dir, test)?
        .into_iter()
        .map(|path| Ok(TestCase::new(absolute(&path)?, &root)))
        .collect()
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("unable to resolve {}", path.display()))
}

fn run(cli: Cli) -> Result<Summary> {
    let config = load_config(&cli)?;
    let mode = if cli.use_evaluator {
        Mode::Evaluate
    } else {
        Mode::CompileAndRun
    };

    let toolchain =
        ProcessToolchain::from_config(&config, mode).context("toolchain is not usable")?;
    toolchain.prepare()?;

    let preprocessor = Preprocessor::new(
        config.resolve(&config.user_include_dir),
        config.resolve(&config.system_include_dir),
    );
    let invoker = Invoker::new(&toolchain, &preprocessor)
        .with_unit_extension(config.unit_extension.clone())
        .with_slow_threshold(config.slow_threshold);
    let aggregator = Aggregator::stdout();
    let pipeline = Pipeline::new(
        Classifier::new(CuratedLists::builtin()),
        invoker,
        &aggregator,
        mode,
    );

    if let Some(test) = &cli.test {
        let cases = single_tests(&config, test)?;
        pipeline.run_single(&cases);
    } else {
        let manifest_path = config.resolve(&config.manifest);
        let dirs = manifest::read_manifest(&manifest_path)
            .with_context(|| format!("unable to read manifest {}", manifest_path.display()))?;
        info!(directories = dirs.len(), "loaded manifest");

        let root = config.root.as_path();
        let tests = manifest::expand_directories(root, &dirs).map(|path| TestCase::new(path, root));
        Engine::new(pipeline, config.workers)
            .with_abort_on_fail(config.abort_on_fail)
            .run(tests, ResumeCursor::new(cli.start_at.clone()));
    }

    Ok(aggregator.report(cli.json)?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match run(cli) {
        Ok(summary) if summary.passed() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
