//! Curated path lists
//!
//! The lists live in `data/` as plain text so they can be reviewed without
//! touching code. Each non-comment line is a path relative to the harness
//! root; `#` starts a comment anywhere on a line.

use rustc_hash::FxHashSet as HashSet;
use std::sync::LazyLock;

const SKIP_LIST: &str = include_str!("../../data/skip.list");
const RUNTIME_FAIL_LIST: &str = include_str!("../../data/runtime-fail.list");

static BUILTIN: LazyLock<CuratedLists> =
    LazyLock::new(|| CuratedLists::from_lists(SKIP_LIST, RUNTIME_FAIL_LIST));

/// Parse a path list into a set
pub fn parse_list(text: &str) -> HashSet<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// The two override sets consulted by the classifier
#[derive(Debug, Clone, Default)]
pub struct CuratedLists {
    skip: HashSet<String>,
    runtime_fail: HashSet<String>,
}

impl CuratedLists {
    /// The lists shipped with the harness
    pub fn builtin() -> &'static CuratedLists {
        &BUILTIN
    }

    pub fn from_lists(skip: &str, runtime_fail: &str) -> Self {
        Self {
            skip: parse_list(skip),
            runtime_fail: parse_list(runtime_fail),
        }
    }

    pub fn new<S, R>(skip: S, runtime_fail: R) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            skip: skip.into_iter().map(Into::into).collect(),
            runtime_fail: runtime_fail.into_iter().map(Into::into).collect(),
        }
    }

    /// Tests that are never run
    pub fn is_skipped(&self, relative: &str) -> bool {
        self.skip.contains(relative)
    }

    /// Negative tests expected to translate and then fail at runtime
    pub fn fails_at_runtime(&self, relative: &str) -> bool {
        self.runtime_fail.contains(relative)
    }

    pub fn skip_count(&self) -> usize {
        self.skip.len()
    }

    pub fn runtime_fail_count(&self) -> usize {
        self.runtime_fail.len()
    }
}
