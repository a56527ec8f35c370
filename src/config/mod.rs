//! Harness configuration
//!
//! Every path is interpreted relative to [`HarnessConfig::root`], the directory
//! the harness runs in (normally the `test/` directory of the compiler tree).
//! Defaults match the layout the compiler build produces, so a config file is
//! only needed for non-standard checkouts.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for a harness run
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Working directory of the harness; relative test paths are taken from here
    pub root: PathBuf,
    /// Manifest listing test-suite directories
    pub manifest: PathBuf,
    /// Root of the test262 suite, searched for single-test patterns
    pub suite_dir: PathBuf,
    /// Directory searched first for `$INCLUDE` files
    pub user_include_dir: PathBuf,
    /// Fallback directory for `$INCLUDE` files
    pub system_include_dir: PathBuf,
    /// Front-end translating a test into a C++ translation unit
    pub frontend: PathBuf,
    /// Front-end entry point that evaluates a test directly
    pub evaluator: PathBuf,
    /// System compiler driver, also used for linking
    pub compiler: PathBuf,
    /// Language standard flag passed when compiling
    pub std_flag: String,
    /// Additional compile flags
    pub compile_flags: Vec<String>,
    /// Header search paths
    pub include_paths: Vec<PathBuf>,
    /// Directories holding the support libraries
    pub library_dirs: Vec<PathBuf>,
    /// Support libraries every test links against
    pub libraries: Vec<String>,
    /// Packages whose flags come from pkg-config
    pub pkg_config_packages: Vec<String>,
    /// Entry point source compiled once and linked into every test binary
    pub harness_main: Option<PathBuf>,
    /// Extension of translation units emitted by the front-end
    pub unit_extension: String,
    /// Number of worker threads
    pub workers: usize,
    /// Runs slower than this leave a `.time` file next to the test
    #[serde(with = "seconds")]
    pub slow_threshold: Duration,
    /// Stop dispatching once any test fails
    pub abort_on_fail: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            manifest: PathBuf::from("run-test262.input"),
            suite_dir: PathBuf::from("test262/test/suite"),
            user_include_dir: PathBuf::from(
                "test262/external/contributions/Google/sputniktests/lib",
            ),
            system_include_dir: PathBuf::from("test262/test/harness"),
            frontend: PathBuf::from("../compiler/compiler"),
            evaluator: PathBuf::from("../tools/evaluator"),
            compiler: PathBuf::from("g++"),
            std_flag: "-std=c++11".to_string(),
            compile_flags: vec!["-g".to_string()],
            include_paths: vec![PathBuf::from(".."), PathBuf::from("../runtime")],
            library_dirs: vec![
                PathBuf::from("../common/.libs"),
                PathBuf::from("../parser/.libs"),
                PathBuf::from("../runtime/.libs"),
            ],
            libraries: vec![
                "common".to_string(),
                "parser".to_string(),
                "runtime".to_string(),
            ],
            pkg_config_packages: vec!["bdw-gc".to_string(), "libpcre".to_string()],
            harness_main: Some(PathBuf::from("main.cc")),
            unit_extension: "cc".to_string(),
            workers: 8,
            slow_threshold: Duration::from_secs(1),
            abort_on_fail: true,
        }
    }
}

impl HarnessConfig {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_json(&text).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse a config from JSON text
    pub fn from_json(text: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Resolve a configured path against the harness root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Preprocessor define naming the host platform
    pub fn platform_define() -> Option<&'static str> {
        if cfg!(target_os = "linux") {
            Some("-DPLATFORM_LINUX")
        } else if cfg!(target_os = "macos") {
            Some("-DPLATFORM_DARWIN")
        } else {
            None
        }
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
