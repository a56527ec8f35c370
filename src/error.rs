//! Error types for the conformance harness

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// System toolchain stage that produced a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// System compiler producing an object file
    Compile,
    /// System linker producing the test binary
    Link,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Compile => write!(f, "compile"),
            Stage::Link => write!(f, "link"),
        }
    }
}

/// Main error type for the harness
#[derive(Error, Debug)]
pub enum Error {
    /// An `$INCLUDE` names a file found in neither include directory
    #[error("couldn't open include file '{name}'")]
    IncludeNotFound { name: String },

    /// Reading or writing a harness file failed
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A child process could not be started
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A required tool does not exist
    #[error("{tool} not found at {}", path.display())]
    ToolMissing { tool: &'static str, path: PathBuf },

    /// pkg-config could not describe a package
    #[error("pkg-config failed for {packages}: {message}")]
    PkgConfig { packages: String, message: String },

    /// The harness entry object failed to compile
    #[error("unable to compile harness entry {} (status {status})", source_path.display())]
    HarnessBuild { source_path: PathBuf, status: i32 },

    /// The configuration file is malformed
    #[error("invalid config {}: {source}", path.display())]
    Config {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No test matched a single-test argument
    #[error("no such test: {0}")]
    NoSuchTest(String),

    /// A single-test argument is not a valid glob
    #[error("invalid test pattern: {0}")]
    Pattern(#[from] globset::Error),
}

impl Error {
    /// Wrap an I/O error with the path it concerns
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Wrap a spawn failure with the program name
    pub fn spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Error::Spawn {
            program: program.into(),
            source,
        }
    }
}

/// Result type for harness operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_include_not_found_message() {
        let err = Error::IncludeNotFound {
            name: "Date_library.js".to_string(),
        };
        assert_eq!(err.to_string(), "couldn't open include file 'Date_library.js'");
    }

    #[test]
    fn test_io_error_carries_path() {
        let err = Error::io(
            "suite/a.js",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.to_string(), "suite/a.js: gone");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Compile.to_string(), "compile");
        assert_eq!(Stage::Link.to_string(), "link");
    }
}
