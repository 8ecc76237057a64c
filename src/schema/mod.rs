//! Canonical table structure model
//!
//! The structure layer decouples the DDL parser from the checkers. It holds
//! only what the rules and the shard comparator need: columns in declaration
//! order, keys, and table-level storage options, not the full SQL AST.

use std::fmt;

use serde::Serialize;

use crate::result::TableLocation;

pub mod canonicalize;

pub use canonicalize::{CanonicalizeError, canonicalize};

/// Session SQL mode bits that affect how DDL is tokenized.
///
/// The only bit the canonicalizer consumes is `ANSI_QUOTES`: under it,
/// double-quoted strings are identifiers rather than literals, so the DDL
/// must be parsed with different quoting rules. The combination mode `ANSI`
/// implies `ANSI_QUOTES`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqlMode {
    pub ansi_quotes: bool,
}

impl SqlMode {
    /// Parse a session `sql_mode` value, e.g.
    /// `"ONLY_FULL_GROUP_BY,ANSI_QUOTES,NO_ENGINE_SUBSTITUTION"`.
    pub fn from_session_value(value: &str) -> Self {
        let ansi_quotes = value
            .split(',')
            .map(str::trim)
            .any(|m| m.eq_ignore_ascii_case("ANSI_QUOTES") || m.eq_ignore_ascii_case("ANSI"));
        Self { ansi_quotes }
    }
}

/// One column of a table, in canonical form.
///
/// Two columns are equivalent iff name, type, nullability, and default all
/// match; ordinal position is compared separately at table level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    /// Declared type, lowercased: `int(11)`, `varchar(20)`, etc.
    pub type_name: String,
    /// true = nullable (default), false = NOT NULL
    pub nullable: bool,
    /// Default expression text, verbatim from the DDL.
    pub default: Option<String>,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` {}", self.name, self.type_name)?;
        if !self.nullable {
            write!(f, " NOT NULL")?;
        }
        if let Some(d) = &self.default {
            write!(f, " DEFAULT {d}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum KeyKind {
    Primary,
    Unique,
    Foreign,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            KeyKind::Primary => "PRIMARY KEY",
            KeyKind::Unique => "UNIQUE KEY",
            KeyKind::Foreign => "FOREIGN KEY",
        };
        f.write_str(s)
    }
}

/// A key declared on a table. Keys are deduplicated by `(kind, columns)`
/// during canonicalization; key names are irrelevant to the merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Key {
    pub kind: KeyKind,
    /// Column names in key order.
    pub columns: Vec<String>,
}

/// Canonical, comparison-ready representation of one table.
///
/// Derived purely from a DDL statement plus the session SQL mode, so the same
/// inputs always produce an identical structure. The identifier is carried
/// only for diagnostics; table names are never part of equivalence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStructure {
    pub id: TableLocation,
    /// Columns in DDL declaration order. Reordering is a reportable
    /// difference, not something to normalize away.
    pub columns: Vec<Column>,
    pub keys: Vec<Key>,
    pub engine: Option<String>,
    pub charset: Option<String>,
    pub collation: Option<String>,
    /// Per-column `CHARACTER SET` overrides, for the charset allow-list rule.
    pub column_charsets: Vec<String>,
}

impl TableStructure {
    /// True if the table declares at least one primary or unique key.
    pub fn has_primary_or_unique_key(&self) -> bool {
        self.keys
            .iter()
            .any(|k| matches!(k.kind, KeyKind::Primary | KeyKind::Unique))
    }

    /// All foreign keys declared on the table.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Key> {
        self.keys.iter().filter(|k| k.kind == KeyKind::Foreign)
    }

    /// Every charset in effect on this table: the table default plus any
    /// per-column override. Lowercased.
    pub fn effective_charsets(&self) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(cs) = &self.charset {
            out.push(cs.to_lowercase());
        }
        for cs in &self.column_charsets {
            let cs = cs.to_lowercase();
            if !out.contains(&cs) {
                out.push(cs);
            }
        }
        out
    }

    /// Non-fatal comparison against another structure: key sets and storage
    /// options. Returns a human-readable description per difference.
    pub fn drift_from(&self, baseline: &TableStructure) -> Vec<String> {
        let mut drifts = Vec::new();
        if self.keys != baseline.keys {
            drifts.push(format!(
                "key set differs: {} vs {}",
                describe_keys(&self.keys),
                describe_keys(&baseline.keys)
            ));
        }
        if self.engine != baseline.engine {
            drifts.push(format!(
                "engine differs: {:?} vs {:?}",
                self.engine, baseline.engine
            ));
        }
        if self.charset != baseline.charset {
            drifts.push(format!(
                "charset differs: {:?} vs {:?}",
                self.charset, baseline.charset
            ));
        }
        if self.collation != baseline.collation {
            drifts.push(format!(
                "collation differs: {:?} vs {:?}",
                self.collation, baseline.collation
            ));
        }
        drifts
    }
}

fn describe_keys(keys: &[Key]) -> String {
    if keys.is_empty() {
        return "(none)".to_string();
    }
    let parts: Vec<String> = keys
        .iter()
        .map(|k| format!("{}({})", k.kind, k.columns.join(",")))
        .collect();
    parts.join(", ")
}
