//! Output reporters for check results
//!
//! Supports human-readable text output and pretty-printed JSON. The JSON
//! shape is the stable cross-boundary format downstream tooling consumes.

use std::path::Path;

use thiserror::Error;

use crate::result::CheckResult;

pub mod json;
pub mod text;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("IO error writing report: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for output format reporters.
pub trait Reporter {
    /// Write results to the given output directory.
    /// The filename is determined by the reporter (e.g., "results.json").
    fn emit(&self, results: &[CheckResult], output_dir: &Path) -> Result<(), ReportError>;
}

/// Text reporter also supports writing to stdout (for --format text).
pub struct TextReporter {
    pub use_stdout: bool,
}

impl TextReporter {
    pub fn new(use_stdout: bool) -> Self {
        Self { use_stdout }
    }
}

pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}
