//! Shared test helpers for integration tests
#![allow(dead_code)]

use rustc_hash::FxHashMap as HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use test262_harness::case::TestCase;
use test262_harness::classify::{Classifier, CuratedLists, Mode};
use test262_harness::engine::{Engine, Pipeline};
use test262_harness::preprocess::{FixedTimezone, Preprocessor};
use test262_harness::report::Aggregator;
use test262_harness::toolchain::{Execution, Invoker, Toolchain};
use test262_harness::Result;

/// Exit statuses a fake test goes through
#[derive(Debug, Clone, Copy, Default)]
pub struct Script {
    pub translate: i32,
    pub compile: i32,
    pub link: i32,
    pub run: i32,
    pub elapsed: Duration,
    /// Real time the fake binary holds its worker
    pub hold: Duration,
}

/// Toolchain whose statuses are scripted per test stem
#[derive(Default)]
pub struct FakeToolchain {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<(String, &'static str)>>,
    running: AtomicUsize,
    peak: AtomicUsize,
}

/// Test name shared by the source and all of its artifacts
fn stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    [".js", ".pp", ".cc", ".o"]
        .iter()
        .find_map(|ext| name.strip_suffix(ext))
        .map(str::to_string)
        .unwrap_or(name)
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, stem: &str, script: Script) -> Self {
        self.scripts.insert(stem.to_string(), script);
        self
    }

    fn lookup(&self, path: &Path, stage: &'static str) -> Script {
        let stem = stem(path);
        let script = self.scripts.get(&stem).copied().unwrap_or_default();
        self.calls.lock().unwrap().push((stem, stage));
        script
    }

    /// Stages invoked for `stem`, in order
    pub fn stages(&self, stem: &str) -> Vec<&'static str> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| s == stem)
            .map(|(_, stage)| *stage)
            .collect()
    }

    /// Distinct tests that reached the toolchain
    pub fn invoked(&self) -> usize {
        let calls = self.calls.lock().unwrap();
        let mut stems: Vec<&String> = calls.iter().map(|(s, _)| s).collect();
        stems.sort();
        stems.dedup();
        stems.len()
    }

    /// Most binaries observed running at once
    pub fn peak_running(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Toolchain for FakeToolchain {
    fn translate(&self, source: &Path, _unit: &Path, _verbose: bool) -> Result<i32> {
        Ok(self.lookup(source, "translate").translate)
    }

    fn compile(&self, unit: &Path, _object: &Path, _verbose: bool) -> Result<i32> {
        Ok(self.lookup(unit, "compile").compile)
    }

    fn link(&self, object: &Path, _binary: &Path, _verbose: bool) -> Result<i32> {
        Ok(self.lookup(object, "link").link)
    }

    fn execute(&self, binary: &Path, _verbose: bool) -> Result<Execution> {
        let script = self.lookup(binary, "execute");
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if !script.hold.is_zero() {
            std::thread::sleep(script.hold);
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        Ok(Execution {
            code: script.run,
            elapsed: script.elapsed,
        })
    }

    fn evaluate(&self, source: &Path, _verbose: bool) -> Result<i32> {
        Ok(self.lookup(source, "evaluate").run)
    }
}

/// Cloneable in-memory writer for captured verdict lines
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A harness root on disk with a suite and an include directory
pub struct Workspace {
    pub dir: tempfile::TempDir,
    pub lists: CuratedLists,
    pub preprocessor: Preprocessor,
    pub aggregator: Aggregator,
    pub output: SharedBuf,
}

impl Workspace {
    pub fn new() -> Self {
        Self::with_lists(CuratedLists::default())
    }

    pub fn with_lists(lists: CuratedLists) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let include = dir.path().join("lib");
        fs::create_dir_all(&include).unwrap();
        let preprocessor = Preprocessor::with_timezone(
            &include,
            &include,
            Box::new(FixedTimezone("var $LocalTZ = 0;\n".to_string())),
        );
        let output = SharedBuf::default();
        Self {
            aggregator: Aggregator::new(Box::new(output.clone())),
            dir,
            lists,
            preprocessor,
            output,
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a test file at `relative` and return its case
    pub fn test(&self, relative: &str, source: &str) -> TestCase {
        let path = self.root().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, source).unwrap();
        TestCase::new(path, self.root())
    }

    /// Write an include library
    pub fn library(&self, name: &str, body: &str) -> PathBuf {
        let path = self.root().join("lib").join(name);
        fs::write(&path, body).unwrap();
        path
    }

    pub fn pipeline<'a>(&'a self, toolchain: &'a dyn Toolchain, mode: Mode) -> Pipeline<'a> {
        let invoker = Invoker::new(toolchain, &self.preprocessor)
            .with_slow_threshold(Duration::from_secs(1));
        Pipeline::new(Classifier::new(&self.lists), invoker, &self.aggregator, mode)
    }

    pub fn engine<'a>(&'a self, toolchain: &'a dyn Toolchain, workers: usize) -> Engine<'a> {
        Engine::new(self.pipeline(toolchain, Mode::CompileAndRun), workers)
    }
}

pub const NEGATIVE: &str = "/**\n * @negative\n */\nvar = ;\n";
pub const POSITIVE: &str = "var x = 1;\n";
