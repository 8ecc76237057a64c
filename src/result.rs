//! Check result model
//!
//! Every checker returns a [`CheckResult`]: an overall state plus an ordered
//! list of typed errors. The result is immutable once produced and serializes
//! to JSON for downstream tooling, so the shapes here are the crate's one
//! stable cross-boundary format.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use strum_macros::EnumIter;

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Strongly-typed error identifier.
///
/// Wraps the three error families so that match statements are exhaustive:
/// adding a new variant forces updates in `as_str()`, `default_severity()`,
/// and everywhere else a kind is dispatched on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// Collaborator/infrastructure failures.
    Access(AccessError),
    /// Single-table migration-safety rule violations.
    Rule(RuleError),
    /// Cross-shard structural divergence from the baseline.
    Shard(ShardError),
}

/// Failures reaching or reading a table, before any rule runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum AccessError {
    /// A database round trip failed (connectivity, permissions, bad query).
    Query,
    /// The DDL could not be canonicalized under the session SQL mode.
    Parse,
    /// The check's cancellation token fired before the fetch completed.
    Cancelled,
}

/// Single-table rule violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum RuleError {
    /// Table declares neither a primary key nor a unique key.
    NoPrimaryOrUniqueKey,
    /// Table declares at least one foreign key.
    HasForeignKey,
    /// Table or column charset is outside the configured allow-list.
    UnsupportedCharset,
}

/// Cross-shard comparator violations, one per divergent table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum ShardError {
    /// Column count differs from the baseline table.
    ColumnCountMismatch,
    /// A column definition differs from the baseline at the same ordinal.
    ColumnDefinitionMismatch,
    /// Non-fatal divergence: key set, engine, charset, or collation differ.
    StructureDrift,
}

impl ErrorKind {
    /// Zero-allocation string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Access(a) => match a {
                AccessError::Query => "Query",
                AccessError::Parse => "Parse",
                AccessError::Cancelled => "Cancelled",
            },
            ErrorKind::Rule(r) => match r {
                RuleError::NoPrimaryOrUniqueKey => "NoPrimaryOrUniqueKey",
                RuleError::HasForeignKey => "HasForeignKey",
                RuleError::UnsupportedCharset => "UnsupportedCharset",
            },
            ErrorKind::Shard(s) => match s {
                ShardError::ColumnCountMismatch => "ColumnCountMismatch",
                ShardError::ColumnDefinitionMismatch => "ColumnDefinitionMismatch",
                ShardError::StructureDrift => "StructureDrift",
            },
        }
    }

    /// The severity this kind carries unless the producing checker overrides
    /// it (the comparator escalates `StructureDrift` in strict mode).
    pub fn default_severity(&self) -> Severity {
        match self {
            ErrorKind::Access(_) | ErrorKind::Rule(_) => Severity::Fatal,
            ErrorKind::Shard(ShardError::StructureDrift) => Severity::Info,
            ErrorKind::Shard(_) => Severity::Fatal,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for ErrorKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s: String = serde::Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl FromStr for ErrorKind {
    type Err = ParseErrorKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Query" => Ok(ErrorKind::Access(AccessError::Query)),
            "Parse" => Ok(ErrorKind::Access(AccessError::Parse)),
            "Cancelled" => Ok(ErrorKind::Access(AccessError::Cancelled)),
            "NoPrimaryOrUniqueKey" => Ok(ErrorKind::Rule(RuleError::NoPrimaryOrUniqueKey)),
            "HasForeignKey" => Ok(ErrorKind::Rule(RuleError::HasForeignKey)),
            "UnsupportedCharset" => Ok(ErrorKind::Rule(RuleError::UnsupportedCharset)),
            "ColumnCountMismatch" => Ok(ErrorKind::Shard(ShardError::ColumnCountMismatch)),
            "ColumnDefinitionMismatch" => {
                Ok(ErrorKind::Shard(ShardError::ColumnDefinitionMismatch))
            }
            "StructureDrift" => Ok(ErrorKind::Shard(ShardError::StructureDrift)),
            _ => Err(ParseErrorKindError(s.to_string())),
        }
    }
}

/// Error returned when a string cannot be parsed into an [`ErrorKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseErrorKindError(pub String);

impl fmt::Display for ParseErrorKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown error kind: '{}'", self.0)
    }
}

impl std::error::Error for ParseErrorKindError {}

// ---------------------------------------------------------------------------
// Severity and state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Info,
    Warning,
    Fatal,
}

impl Severity {
    /// Parse from config string. Case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum State {
    Success,
    Warning,
    Failure,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            State::Success => "success",
            State::Warning => "warning",
            State::Failure => "failure",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Errors and results
// ---------------------------------------------------------------------------

/// Identifies one table inside a target set. `source` is empty for
/// single-source checks. Used for diagnostics and deterministic ordering,
/// never for structural comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TableLocation {
    pub source: String,
    pub schema: String,
    pub table: String,
}

impl TableLocation {
    pub fn new(
        source: impl Into<String>,
        schema: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.source.is_empty() {
            write!(f, "`{}`.`{}`", self.schema, self.table)
        } else {
            write!(f, "{}:`{}`.`{}`", self.source, self.schema, self.table)
        }
    }
}

/// One typed error entry in a [`CheckResult`].
#[derive(Debug, Clone, Serialize)]
pub struct CheckError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    /// Verbatim supporting material, e.g. the offending DDL fragment or the
    /// expected-vs-actual column definitions. Omitted from JSON when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<TableLocation>,
}

impl CheckError {
    /// Create an error with the kind's default severity.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            detail: None,
            location: None,
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn at(mut self, location: TableLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Sort key giving deterministic output regardless of task completion
    /// order: location first, then kind.
    pub(crate) fn sort_key(&self) -> (TableLocation, ErrorKind) {
        (self.location.clone().unwrap_or_default(), self.kind)
    }
}

/// The single output contract every checker returns.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    /// Name of the check that produced this result.
    pub name: String,
    pub state: State,
    pub errors: Vec<CheckError>,
    /// Opaque diagnostic payload, e.g. the comparator's baseline table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
}

impl CheckResult {
    /// A passing result with no errors.
    pub fn success(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: State::Success,
            errors: vec![],
            extra: None,
        }
    }

    /// Build a result from accumulated errors. Errors are sorted by
    /// `(location, kind)` and the state is derived from the worst severity
    /// present: any `Fatal` error fails the check, any `Warning` downgrades
    /// an otherwise clean result to `Warning`.
    pub fn from_errors(name: impl Into<String>, mut errors: Vec<CheckError>) -> Self {
        errors.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        let state = if errors.iter().any(|e| e.severity == Severity::Fatal) {
            State::Failure
        } else if errors.iter().any(|e| e.severity == Severity::Warning) {
            State::Warning
        } else {
            State::Success
        };
        Self {
            name: name.into(),
            state,
            errors,
            extra: None,
        }
    }

    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Merge several results into one, keeping the worst state. Error order
    /// follows the input result order; each result's own errors are already
    /// sorted by construction.
    pub fn merge(name: impl Into<String>, results: Vec<CheckResult>) -> Self {
        let mut errors = Vec::new();
        let mut state = State::Success;
        for r in results {
            if r.state == State::Failure
                || (r.state == State::Warning && state == State::Success)
            {
                state = r.state;
            }
            errors.extend(r.errors);
        }
        Self {
            name: name.into(),
            state,
            errors,
            extra: None,
        }
    }

    /// True when the check passed, treating `Warning` as passing.
    pub fn is_success(&self) -> bool {
        self.state != State::Failure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn all_kinds() -> Vec<ErrorKind> {
        AccessError::iter()
            .map(ErrorKind::Access)
            .chain(RuleError::iter().map(ErrorKind::Rule))
            .chain(ShardError::iter().map(ErrorKind::Shard))
            .collect()
    }

    #[test]
    fn test_error_kind_display_round_trip() {
        // Every variant should survive Display → FromStr round-trip
        let all = all_kinds();
        for kind in &all {
            let s = kind.to_string();
            let parsed: ErrorKind = s.parse().unwrap_or_else(|_| panic!("failed to parse {s}"));
            assert_eq!(*kind, parsed, "round-trip failed for {s}");
            assert_eq!(kind.as_str(), s.as_str());
        }
        assert_eq!(all.len(), 9);
    }

    #[test]
    fn test_error_kind_from_str_unknown() {
        assert!("Bogus".parse::<ErrorKind>().is_err());
        assert!("query".parse::<ErrorKind>().is_err()); // case-sensitive
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Fatal);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!(Severity::parse("fatal"), Some(Severity::Fatal));
        assert_eq!(Severity::parse("WARNING"), Some(Severity::Warning));
        assert_eq!(Severity::parse("Info"), Some(Severity::Info));
        assert_eq!(Severity::parse("garbage"), None);
    }

    #[test]
    fn test_from_errors_state_derivation() {
        let fatal = CheckError::new(ErrorKind::Rule(RuleError::HasForeignKey), "fk");
        let info = CheckError::new(ErrorKind::Shard(ShardError::StructureDrift), "drift");

        let r = CheckResult::from_errors("t", vec![]);
        assert_eq!(r.state, State::Success);

        let r = CheckResult::from_errors("t", vec![info.clone()]);
        assert_eq!(r.state, State::Success);

        let r = CheckResult::from_errors(
            "t",
            vec![info.clone().with_severity(Severity::Warning)],
        );
        assert_eq!(r.state, State::Warning);

        let r = CheckResult::from_errors("t", vec![info, fatal]);
        assert_eq!(r.state, State::Failure);
    }

    #[test]
    fn test_from_errors_sorts_by_location_then_kind() {
        let a = CheckError::new(ErrorKind::Rule(RuleError::HasForeignKey), "fk")
            .at(TableLocation::new("", "db2", "t1"));
        let b = CheckError::new(ErrorKind::Rule(RuleError::NoPrimaryOrUniqueKey), "no key")
            .at(TableLocation::new("", "db1", "t2"));
        let c = CheckError::new(ErrorKind::Rule(RuleError::HasForeignKey), "fk")
            .at(TableLocation::new("", "db1", "t2"));

        let r = CheckResult::from_errors("t", vec![a, b, c]);
        let schemas: Vec<&str> = r
            .errors
            .iter()
            .map(|e| e.location.as_ref().unwrap().schema.as_str())
            .collect();
        assert_eq!(schemas, vec!["db1", "db1", "db2"]);
        // Same location: NoPrimaryOrUniqueKey sorts before HasForeignKey
        assert_eq!(
            r.errors[0].kind,
            ErrorKind::Rule(RuleError::NoPrimaryOrUniqueKey)
        );
    }

    #[test]
    fn test_merge_keeps_worst_state() {
        let ok = CheckResult::success("a");
        let warn = CheckResult::from_errors(
            "b",
            vec![
                CheckError::new(ErrorKind::Shard(ShardError::StructureDrift), "d")
                    .with_severity(Severity::Warning),
            ],
        );
        let fail = CheckResult::from_errors(
            "c",
            vec![CheckError::new(
                ErrorKind::Rule(RuleError::HasForeignKey),
                "fk",
            )],
        );

        let merged = CheckResult::merge("all", vec![ok.clone(), warn.clone()]);
        assert_eq!(merged.state, State::Warning);

        let merged = CheckResult::merge("all", vec![ok, warn, fail]);
        assert_eq!(merged.state, State::Failure);
        assert_eq!(merged.errors.len(), 2);
    }

    #[test]
    fn test_result_serializes_to_json() {
        let r = CheckResult::from_errors(
            "sharding",
            vec![
                CheckError::new(
                    ErrorKind::Shard(ShardError::ColumnCountMismatch),
                    "column count differs",
                )
                .with_detail("2 vs 1")
                .at(TableLocation::new("shard-1", "test-db", "t2")),
            ],
        );
        let json = serde_json::to_value(&r).expect("serialize");
        assert_eq!(json["state"], "Failure");
        assert_eq!(json["errors"][0]["kind"], "ColumnCountMismatch");
        assert_eq!(json["errors"][0]["severity"], "Fatal");
        assert_eq!(json["errors"][0]["location"]["source"], "shard-1");
        // extra is omitted entirely when absent
        assert!(json.get("extra").is_none());
    }
}
