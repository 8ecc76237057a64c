//! JSON output reporter
//!
//! Serializes results with their native serde shape: an envelope holding the
//! result list plus a summary of the worst state. This is the stable format
//! downstream orchestration consumes, so field names must not change
//! casually.

use crate::output::{JsonReporter, ReportError, Reporter};
use crate::result::{CheckResult, State};
use serde::Serialize;
use std::path::Path;

/// Top-level report envelope.
#[derive(Serialize)]
struct JsonReport<'a> {
    /// Worst state across all results.
    state: State,
    results: &'a [CheckResult],
}

fn overall_state(results: &[CheckResult]) -> State {
    let mut state = State::Success;
    for r in results {
        if r.state == State::Failure || (r.state == State::Warning && state == State::Success) {
            state = r.state;
        }
    }
    state
}

impl Reporter for JsonReporter {
    /// Emit results as a pretty-printed JSON file.
    ///
    /// Writes `results.json` to the given `output_dir`. Creates the directory
    /// if it does not exist.
    fn emit(&self, results: &[CheckResult], output_dir: &Path) -> Result<(), ReportError> {
        std::fs::create_dir_all(output_dir)?;

        let report = JsonReport {
            state: overall_state(results),
            results,
        };

        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| ReportError::Serialization(e.to_string()))?;

        let path = output_dir.join("results.json");
        std::fs::write(path, json)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{CheckError, CheckResult, ErrorKind, RuleError, TableLocation};

    fn failing_result() -> CheckResult {
        let error = CheckError::new(
            ErrorKind::Rule(RuleError::HasForeignKey),
            "table declares a foreign key",
        )
        .at(TableLocation {
            source: "src1".to_string(),
            schema: "db".to_string(),
            table: "child".to_string(),
        });
        CheckResult::from_errors("table-structure/src1", vec![error])
    }

    #[test]
    fn single_result_produces_valid_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reporter = JsonReporter;

        reporter.emit(&[failing_result()], dir.path()).expect("emit");

        let content = std::fs::read_to_string(dir.path().join("results.json")).expect("read");
        let parsed: serde_json::Value = serde_json::from_str(&content).expect("parse json");

        assert_eq!(parsed["state"], "Failure");
        let results = parsed["results"].as_array().expect("results array");
        assert_eq!(results.len(), 1);

        let result = &results[0];
        assert_eq!(result["name"], "table-structure/src1");
        assert_eq!(result["state"], "Failure");
        let error = &result["errors"][0];
        assert_eq!(error["kind"], "HasForeignKey");
        assert_eq!(error["severity"], "Fatal");
        assert_eq!(error["location"]["source"], "src1");
        assert_eq!(error["location"]["table"], "child");
    }

    #[test]
    fn absent_detail_and_extra_are_omitted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let reporter = JsonReporter;

        reporter.emit(&[failing_result()], dir.path()).expect("emit");

        let content = std::fs::read_to_string(dir.path().join("results.json")).expect("read");
        let parsed: serde_json::Value = serde_json::from_str(&content).expect("parse json");

        let result = &parsed["results"][0];
        assert!(result.get("extra").is_none());
        assert!(result["errors"][0].get("detail").is_none());
    }

    #[test]
    fn overall_state_is_worst_of_results() {
        assert_eq!(
            overall_state(&[CheckResult::success("a"), failing_result()]),
            State::Failure
        );
        assert_eq!(
            overall_state(&[CheckResult::success("a"), CheckResult::success("b")]),
            State::Success
        );
        assert_eq!(overall_state(&[]), State::Success);
    }
}
