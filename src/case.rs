//! Test cases and their sources

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Marker declaring that a test must fail somewhere in the pipeline
pub const NEGATIVE_MARKER: &str = "@negative";

/// Directive that pulls a library file into a test
pub const INCLUDE_DIRECTIVE: &str = "$INCLUDE";

/// A single test file, identified by its path relative to the harness root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    path: PathBuf,
    relative: String,
}

impl TestCase {
    /// Create a test case for `path`, naming it relative to `root`
    pub fn new(path: impl Into<PathBuf>, root: &Path) -> Self {
        let path = path.into();
        let relative = normalize(path.strip_prefix(root).unwrap_or(&path));
        Self { path, relative }
    }

    /// Path used to read the test and to derive artifact paths
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `/`-separated path relative to the harness root
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// File name shown in verdict lines
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.relative.clone())
    }

    /// Path with the extension replaced, used for every per-test artifact
    pub fn artifact(&self, extension: &str) -> PathBuf {
        self.path.with_extension(extension)
    }

    /// Path of the produced test binary (the source path without extension)
    pub fn binary(&self) -> PathBuf {
        self.path.with_extension("")
    }

    /// Read the test source
    pub fn read_source(&self) -> Result<TestSource> {
        std::fs::read_to_string(&self.path)
            .map(TestSource::new)
            .map_err(|e| Error::io(&self.path, e))
    }
}

/// Source text of a test with the attributes the classifier looks at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSource {
    text: String,
}

impl TestSource {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Whether the source must go through the preprocessor
    pub fn has_include(&self) -> bool {
        self.text.contains(INCLUDE_DIRECTIVE)
    }

    /// Whether the author declared the test negative
    pub fn is_negative(&self) -> bool {
        self.text.contains(NEGATIVE_MARKER)
    }
}

/// Render a path with `/` separators, dropping `.` components
fn normalize(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if parts.last().is_some_and(|p| p != "..") {
                    parts.pop();
                } else {
                    parts.push("..".to_string());
                }
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::RootDir | Component::Prefix(_) => {
                parts.clear();
                parts.push(String::new());
            }
        }
    }
    parts.join("/")
}
