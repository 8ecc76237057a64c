//! Schema source collaborator contract
//!
//! Checkers never own a database connection. They consume a [`SchemaSource`]
//! that answers exactly two questions: what is the session's SQL mode, and
//! what is the CREATE TABLE text for one table. Every failure is a
//! [`QueryError`] that the checkers degrade into a per-table error entry.
//!
//! Two implementations ship with the crate: [`MemorySource`] for programmatic
//! use and tests, and [`DumpSource`] for `mysqldump --no-data` style schema
//! dumps on disk. Live-database adapters belong to the embedding migration
//! tool and implement the same trait.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// A database round trip failed before any structural validation could run.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("table `{schema}`.`{table}` not found")]
    TableNotFound { schema: String, table: String },

    #[error("IO error reading schema: {0}")]
    Io(#[from] std::io::Error),
}

/// The minimal query protocol a checker issues against a database.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// The session `sql_mode` value, equivalent to
    /// `SHOW VARIABLES LIKE 'sql_mode'`. Fetched before any DDL is parsed,
    /// because the mode decides identifier quoting.
    async fn session_sql_mode(&self) -> Result<String, QueryError>;

    /// The full CREATE TABLE statement text for one table, equivalent to
    /// `SHOW CREATE TABLE`.
    async fn table_ddl(&self, schema: &str, table: &str) -> Result<String, QueryError>;
}

/// In-memory schema source: a fixed SQL mode plus a `(schema, table) → DDL`
/// map. The standard test double for checkers.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    sql_mode: String,
    tables: HashMap<(String, String), String>,
}

impl MemorySource {
    pub fn new(sql_mode: impl Into<String>) -> Self {
        Self {
            sql_mode: sql_mode.into(),
            tables: HashMap::new(),
        }
    }

    /// Register a table's DDL. Replaces any previous entry.
    pub fn with_table(
        mut self,
        schema: impl Into<String>,
        table: impl Into<String>,
        ddl: impl Into<String>,
    ) -> Self {
        self.tables
            .insert((schema.into(), table.into()), ddl.into());
        self
    }
}

#[async_trait]
impl SchemaSource for MemorySource {
    async fn session_sql_mode(&self) -> Result<String, QueryError> {
        Ok(self.sql_mode.clone())
    }

    async fn table_ddl(&self, schema: &str, table: &str) -> Result<String, QueryError> {
        self.tables
            .get(&(schema.to_string(), table.to_string()))
            .cloned()
            .ok_or_else(|| QueryError::TableNotFound {
                schema: schema.to_string(),
                table: table.to_string(),
            })
    }
}

/// Schema source backed by an on-disk dump directory:
///
/// ```text
/// <root>/sql_mode          optional, one line (defaults to empty mode)
/// <root>/<schema>/<table>.sql
/// ```
#[derive(Debug, Clone)]
pub struct DumpSource {
    root: PathBuf,
}

impl DumpSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SchemaSource for DumpSource {
    async fn session_sql_mode(&self) -> Result<String, QueryError> {
        let path = self.root.join("sql_mode");
        if !path.exists() {
            return Ok(String::new());
        }
        let mode = tokio::fs::read_to_string(&path).await?;
        Ok(mode.trim().to_string())
    }

    async fn table_ddl(&self, schema: &str, table: &str) -> Result<String, QueryError> {
        if !self.root.exists() {
            return Err(QueryError::Unavailable(format!(
                "dump directory {} does not exist",
                self.root.display()
            )));
        }
        let path = self.root.join(schema).join(format!("{table}.sql"));
        if !path.exists() {
            return Err(QueryError::TableNotFound {
                schema: schema.to_string(),
                table: table.to_string(),
            });
        }
        Ok(tokio::fs::read_to_string(&path).await?)
    }
}
