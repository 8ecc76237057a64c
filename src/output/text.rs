//! Human-readable text output reporter
//!
//! Produces plain text output suitable for terminal display:
//! ```text
//! table-structure/src1: failure
//!   FATAL NoPrimaryOrUniqueKey src1:`db`.`orders`
//!     table has no primary key or unique index
//! ```

use crate::output::{ReportError, Reporter, TextReporter};
use crate::result::{CheckError, CheckResult};
use std::fmt::Write as FmtWrite;
use std::io::Write;
use std::path::Path;

/// Format a single error as an indented text block.
fn format_error(error: &CheckError) -> String {
    let mut buf = String::new();
    // Using write! on String is infallible, but we handle the result properly.
    match &error.location {
        Some(loc) => {
            let _ = write!(buf, "  {} {} {}\n", error.severity, error.kind, loc);
        }
        None => {
            let _ = write!(buf, "  {} {}\n", error.severity, error.kind);
        }
    }
    let _ = write!(buf, "    {}\n", error.message);
    if let Some(detail) = &error.detail {
        for line in detail.lines() {
            let _ = write!(buf, "    | {}\n", line);
        }
    }
    buf
}

/// Format all results into a single text string.
///
/// Each result gets a header line with its name and state; results are
/// separated by a blank line for readability.
fn format_all(results: &[CheckResult]) -> String {
    let mut output = String::new();
    for (i, result) in results.iter().enumerate() {
        let _ = write!(output, "{}: {}\n", result.name, result.state);
        for error in &result.errors {
            output.push_str(&format_error(error));
        }
        if i < results.len() - 1 {
            output.push('\n');
        }
    }
    output
}

impl Reporter for TextReporter {
    /// Emit results as human-readable text.
    ///
    /// If `use_stdout` is true, writes to stdout. Otherwise writes
    /// `results.txt` to the given `output_dir`. Creates the directory
    /// if it does not exist.
    fn emit(&self, results: &[CheckResult], output_dir: &Path) -> Result<(), ReportError> {
        let text = format_all(results);

        if self.use_stdout {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(text.as_bytes())?;
            handle.flush()?;
        } else {
            std::fs::create_dir_all(output_dir)?;
            let path = output_dir.join("results.txt");
            std::fs::write(path, text)?;
        }

        Ok(())
    }
}
