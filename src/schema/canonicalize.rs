//! DDL canonicalization
//!
//! Converts one `CREATE TABLE` statement into a [`TableStructure`]. The SQL
//! grammar itself is delegated to the `sqlparser` crate; this module only
//! selects the quoting rules from the session SQL mode, extracts columns and
//! keys from the AST, and reads table storage options from the raw DDL tail.
//!
//! Canonicalization is pure: same DDL text + same SQL mode always yields the
//! same structure, independent of invocation order or concurrency.

use std::sync::LazyLock;

use regex::Regex;
use sqlparser::ast::{ColumnOption, Statement, TableConstraint};
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect};
use sqlparser::parser::Parser;
use thiserror::Error;

use crate::result::TableLocation;
use crate::schema::{Column, Key, KeyKind, SqlMode, TableStructure};

#[derive(Debug, Error)]
pub enum CanonicalizeError {
    #[error("DDL parse error: {0}")]
    Parse(String),

    #[error("DDL is empty")]
    Empty,

    #[error("statement is not CREATE TABLE")]
    NotCreateTable,
}

static ENGINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bENGINE\s*=?\s*([0-9A-Za-z_]+)").expect("valid regex"));
static CHARSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:CHARSET|CHARACTER\s+SET)\s*=?\s*([0-9A-Za-z_]+)").expect("valid regex")
});
static COLLATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCOLLATE\s*=?\s*([0-9A-Za-z_]+)").expect("valid regex"));

/// Canonicalize one `CREATE TABLE` statement under the given SQL mode.
///
/// Under `ANSI_QUOTES`, double-quoted tokens are identifiers, so the DDL is
/// parsed with generic quoting rules; otherwise the MySQL dialect applies
/// (backtick identifiers, double-quoted strings). The returned structure
/// carries the table name parsed from the DDL; callers that know the full
/// (source, schema, table) location overwrite `id` afterwards.
pub fn canonicalize(ddl: &str, mode: SqlMode) -> Result<TableStructure, CanonicalizeError> {
    if ddl.trim().is_empty() {
        return Err(CanonicalizeError::Empty);
    }

    let dialect: &dyn Dialect = if mode.ansi_quotes {
        &GenericDialect {}
    } else {
        &MySqlDialect {}
    };

    let statements = Parser::parse_sql(dialect, ddl)
        .map_err(|e| CanonicalizeError::Parse(e.to_string()))?;

    let create = statements
        .into_iter()
        .find_map(|s| match s {
            Statement::CreateTable(ct) => Some(ct),
            _ => None,
        })
        .ok_or(CanonicalizeError::NotCreateTable)?;

    let table_name = last_name_part(&create.name.to_string());

    let mut columns = Vec::with_capacity(create.columns.len());
    let mut keys: Vec<Key> = Vec::new();
    let mut column_charsets = Vec::new();

    for col in &create.columns {
        let name = col.name.value.clone();
        let mut nullable = true;
        let mut default = None;

        for opt in &col.options {
            match &opt.option {
                ColumnOption::NotNull => nullable = false,
                ColumnOption::Null => nullable = true,
                ColumnOption::Default(expr) => default = Some(expr.to_string()),
                ColumnOption::Unique { is_primary, .. } => {
                    let kind = if *is_primary {
                        // Primary key columns are implicitly NOT NULL.
                        nullable = false;
                        KeyKind::Primary
                    } else {
                        KeyKind::Unique
                    };
                    push_key(&mut keys, kind, vec![name.clone()]);
                }
                ColumnOption::ForeignKey { .. } => {
                    push_key(&mut keys, KeyKind::Foreign, vec![name.clone()]);
                }
                ColumnOption::CharacterSet(cs) => {
                    column_charsets.push(last_name_part(&cs.to_string()));
                }
                _ => {}
            }
        }

        columns.push(Column {
            name,
            type_name: col.data_type.to_string().to_lowercase(),
            nullable,
            default,
        });
    }

    for constraint in &create.constraints {
        match constraint {
            TableConstraint::PrimaryKey { columns: cols, .. } => {
                push_key(&mut keys, KeyKind::Primary, key_columns(cols));
            }
            TableConstraint::Unique { columns: cols, .. } => {
                push_key(&mut keys, KeyKind::Unique, key_columns(cols));
            }
            TableConstraint::ForeignKey { columns: cols, .. } => {
                push_key(&mut keys, KeyKind::Foreign, key_columns(cols));
            }
            _ => {}
        }
    }

    // Storage options (ENGINE / CHARSET / COLLATE) are read from the raw
    // options tail after the column list, which is stable across dialects.
    let tail = options_tail(ddl);
    let engine = capture(&ENGINE_RE, tail);
    let charset = capture(&CHARSET_RE, tail);
    let collation = capture(&COLLATE_RE, tail);

    Ok(TableStructure {
        id: TableLocation::new("", "", table_name),
        columns,
        keys,
        engine,
        charset,
        collation,
        column_charsets,
    })
}

/// Append a key unless an identical `(kind, columns)` pair is already present.
fn push_key(keys: &mut Vec<Key>, kind: KeyKind, columns: Vec<String>) {
    let key = Key { kind, columns };
    if !keys.contains(&key) {
        keys.push(key);
    }
}

/// Render constraint column references to bare names, stripping quoting.
fn key_columns<T: std::fmt::Display>(cols: &[T]) -> Vec<String> {
    cols.iter().map(|c| unquote(&c.to_string())).collect()
}

/// Strip one layer of identifier quoting (`"x"` or `` `x` ``).
fn unquote(raw: &str) -> String {
    let s = raw.trim();
    let b = s.as_bytes();
    if b.len() >= 2
        && ((b[0] == b'"' && b[b.len() - 1] == b'"') || (b[0] == b'`' && b[b.len() - 1] == b'`'))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Last segment of a possibly schema-qualified name, unquoted.
fn last_name_part(name: &str) -> String {
    unquote(name.rsplit('.').next().unwrap_or(name))
}

/// The table-options text after the parenthesis that closes the column list.
///
/// Tracked by paren depth rather than `rfind`, since the options themselves
/// may contain parentheses (`COMMENT='users (archived)'`, partition clauses).
/// Quoted spans are skipped so a paren inside a string literal or quoted
/// identifier never affects the depth.
fn options_tail(ddl: &str) -> &str {
    let bytes = ddl.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            q @ (b'\'' | b'"' | b'`') => {
                i += 1;
                while i < bytes.len() && bytes[i] != q {
                    i += 1;
                }
            }
            b'(' => depth += 1,
            b')' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return &ddl[i + 1..];
                }
            }
            _ => {}
        }
        i += 1;
    }
    ""
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|c| c[1].to_string())
}
