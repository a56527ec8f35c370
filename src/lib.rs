//! test262-harness: a concurrent conformance runner for an ahead-of-time
//! JavaScript compiler
//!
//! Each test262 case is preprocessed, classified against curated override
//! lists, pushed through the external toolchain (front-end, system compiler,
//! linker, produced binary) or a direct evaluator, and judged against its
//! expected outcome. A fixed pool of workers runs the tests and a single
//! aggregator prints the verdicts and the final summary.
//!
//! # Module Overview
//!
//! The pipeline flows: [`manifest`] → [`engine`] → [`preprocess`] → [`classify`] →
//! [`toolchain`] → [`report`]
//!
//! | Module | Role |
//! |--------|------|
//! | [`manifest`] | manifest parsing, directory expansion, resume cursor |
//! | [`case`] | test cases, their sources and artifact paths |
//! | [`preprocess`] | `$INCLUDE` splicing and host DST facts |
//! | [`classify`] | expected outcomes, curated lists, judging |
//! | [`toolchain`] | child-process invocation of the toolchain |
//! | [`engine`] | bounded queue, worker pool, abort latch |
//! | [`report`] | verdict lines and the summary |
//! | [`config`] | harness configuration |

pub mod case;
pub mod classify;
pub mod config;
pub mod engine;
pub mod manifest;
pub mod preprocess;
pub mod report;
pub mod toolchain;

mod error;

pub use error::{Error, Result, Stage};
