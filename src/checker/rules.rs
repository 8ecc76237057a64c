//! Single-table migration-safety rules
//!
//! Each rule examines one canonical [`TableStructure`] and yields at most one
//! error entry per violation. Rules are independent: a table violating two
//! rules contributes two errors, and no rule short-circuits another.

use crate::result::{CheckError, ErrorKind, RuleError};
use crate::schema::TableStructure;

/// Charsets the migration pipeline can carry without lossy transcoding.
pub const DEFAULT_ALLOWED_CHARSETS: &[&str] = &["utf8", "utf8mb4", "latin1", "ascii", "binary"];

/// Tables must declare at least one primary or unique key, otherwise the
/// merge cannot deduplicate rows across shards.
pub(crate) fn check_key_presence(table: &TableStructure) -> Option<CheckError> {
    if table.has_primary_or_unique_key() {
        return None;
    }
    Some(
        CheckError::new(
            ErrorKind::Rule(RuleError::NoPrimaryOrUniqueKey),
            format!("table {} has no primary or unique key", table.id),
        )
        .at(table.id.clone()),
    )
}

/// Foreign keys are disallowed: the migration does not preserve cross-table
/// referential actions, so a declared FK would silently change behavior on
/// the destination.
pub(crate) fn check_no_foreign_keys(table: &TableStructure) -> Option<CheckError> {
    let fks: Vec<String> = table
        .foreign_keys()
        .map(|k| format!("({})", k.columns.join(",")))
        .collect();
    if fks.is_empty() {
        return None;
    }
    Some(
        CheckError::new(
            ErrorKind::Rule(RuleError::HasForeignKey),
            format!("table {} declares a foreign key", table.id),
        )
        .with_detail(format!("foreign keys: {}", fks.join(", ")))
        .at(table.id.clone()),
    )
}

/// Every charset in effect on the table (table default and per-column
/// overrides) must appear in the allow-list. One error regardless of how
/// many columns share the offending charset.
pub(crate) fn check_charset(table: &TableStructure, allowed: &[String]) -> Option<CheckError> {
    let bad: Vec<String> = table
        .effective_charsets()
        .into_iter()
        .filter(|cs| !allowed.iter().any(|a| a.eq_ignore_ascii_case(cs)))
        .collect();
    if bad.is_empty() {
        return None;
    }
    Some(
        CheckError::new(
            ErrorKind::Rule(RuleError::UnsupportedCharset),
            format!(
                "table {} uses unsupported charset(s): {}",
                table.id,
                bad.join(", ")
            ),
        )
        .with_detail(format!("allowed charsets: {}", allowed.join(", ")))
        .at(table.id.clone()),
    )
}

/// Run every rule against one table, accumulating all violations.
pub(crate) fn check_table(table: &TableStructure, allowed_charsets: &[String]) -> Vec<CheckError> {
    [
        check_key_presence(table),
        check_no_foreign_keys(table),
        check_charset(table, allowed_charsets),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// The default allow-list as owned strings, for checker construction.
pub fn default_allowed_charsets() -> Vec<String> {
    DEFAULT_ALLOWED_CHARSETS
        .iter()
        .map(|s| s.to_string())
        .collect()
}
