//! Test-suite manifest
//!
//! A manifest lists one test directory per line:
//!
//! ```text
//! # line comments start with '#'
//! test262/test/suite/ch07/7.2
//! {
//! test262/test/suite/ch15/15.10   (disabled: inside a block comment)
//! }
//! test262/test/suite/ch08/8.4
//! ```
//!
//! Parsing is a plain two-state scan with no filesystem access;
//! [`expand_directories`] turns the result into test paths.

use crate::error::{Error, Result};
use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension of test files inside a suite directory
pub const TEST_EXTENSION: &str = "js";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Normal,
    InBlockComment,
}

/// Parse manifest text into the list of enabled directories
pub fn parse_manifest(text: &str) -> Vec<String> {
    let mut state = ScanState::Normal;
    let mut dirs = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match state {
            ScanState::Normal => {
                if line.starts_with('#') {
                    continue;
                }
                if line.starts_with('{') {
                    state = ScanState::InBlockComment;
                    continue;
                }
                if line.starts_with('}') {
                    // stray close: nothing to end
                    continue;
                }
                dirs.push(line.to_string());
            }
            ScanState::InBlockComment => {
                if line.starts_with('}') {
                    state = ScanState::Normal;
                }
            }
        }
    }

    dirs
}

/// Read and parse a manifest file
pub fn read_manifest(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(parse_manifest(&text))
}

/// Test files directly inside `dir`, sorted by name
pub fn list_tests(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "skipping unreadable test directory");
            return Vec::new();
        }
    };

    let mut tests: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file() && path.extension().map(|e| e == TEST_EXTENSION).unwrap_or(false)
        })
        .collect();
    tests.sort();
    debug!(dir = %dir.display(), count = tests.len(), "expanded test directory");
    tests
}

/// Lazily expand manifest directories (relative to `root`) into test paths
pub fn expand_directories<'a>(
    root: &'a Path,
    dirs: &'a [String],
) -> impl Iterator<Item = PathBuf> + 'a {
    dirs.iter().flat_map(move |dir| list_tests(&root.join(dir)))
}

/// Resolve a single-test argument: an existing path, or a file-name glob
/// searched recursively under `suite_dir`. Every match is returned, sorted.
pub fn find_tests(suite_dir: &Path, test: &str) -> Result<Vec<PathBuf>> {
    let direct = Path::new(test);
    if direct.is_file() {
        return Ok(vec![direct.to_path_buf()]);
    }

    let matcher = Glob::new(test)?.compile_matcher();
    let mut found = Vec::new();
    walk(suite_dir, &matcher, &mut found);
    if found.is_empty() {
        return Err(Error::NoSuchTest(test.to_string()));
    }
    found.sort();
    debug!(pattern = test, count = found.len(), "resolved single test");
    Ok(found)
}

fn walk(dir: &Path, matcher: &GlobMatcher, found: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|entry| entry.path()) {
        if path.is_dir() {
            walk(&path, matcher, found);
        } else if path.file_name().map(|name| matcher.is_match(name)).unwrap_or(false) {
            found.push(path);
        }
    }
}

/// Suppresses paths until one whose file name equals the cursor
#[derive(Debug, Clone)]
pub struct ResumeCursor {
    start_at: Option<String>,
    found: bool,
}

impl ResumeCursor {
    /// A cursor that lets everything through when `start_at` is `None` or empty
    pub fn new(start_at: Option<String>) -> Self {
        let start_at = start_at.filter(|s| !s.is_empty());
        let found = start_at.is_none();
        Self { start_at, found }
    }

    /// Whether `path` should be dispatched; the named file itself is included
    pub fn admit(&mut self, path: &Path) -> bool {
        if self.found {
            return true;
        }
        let matches = match (&self.start_at, path.file_name()) {
            (Some(start), Some(name)) => name.to_string_lossy() == start.as_str(),
            _ => false,
        };
        if matches {
            debug!(path = %path.display(), "resume point reached");
            self.found = true;
        }
        matches
    }

    /// Whether the resume point has been seen
    pub fn found(&self) -> bool {
        self.found
    }
}
