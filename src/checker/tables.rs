//! Per-table migration-safety validation
//!
//! For each target table: fetch the session SQL mode and DDL, canonicalize,
//! and evaluate every rule in [`super::rules`], accumulating all violations.
//! A fetch or parse failure for one table becomes that table's error entry;
//! the remaining tables are still checked to maximize diagnostic coverage.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::checker::rules;
use crate::checker::{Checker, DEFAULT_CONCURRENCY, fetch_sql_mode, fetch_structures, flatten_tables};
use crate::result::{AccessError, CheckError, CheckResult, ErrorKind, TableLocation};
use crate::source::SchemaSource;

pub struct TablesChecker {
    name: String,
    source: Arc<dyn SchemaSource>,
    /// Pre-flattened (schema, table) targets in stable order.
    targets: Vec<TableLocation>,
    allowed_charsets: Vec<String>,
    concurrency: usize,
}

impl TablesChecker {
    /// Build a checker over one source and a `{schema → [tables]}` target
    /// set. The charset allow-list defaults to
    /// [`rules::DEFAULT_ALLOWED_CHARSETS`].
    pub fn new(
        name: impl Into<String>,
        source: Arc<dyn SchemaSource>,
        tables: &HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            targets: flatten_tables("", tables),
            allowed_charsets: rules::default_allowed_charsets(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_allowed_charsets(mut self, charsets: Vec<String>) -> Self {
        self.allowed_charsets = charsets;
        self
    }

    /// Bound on in-flight fetches, to respect the source's connection pool.
    /// Clamped to at least 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

#[async_trait]
impl Checker for TablesChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &CancellationToken) -> CheckResult {
        if self.targets.is_empty() {
            return CheckResult::from_errors(
                self.name.clone(),
                vec![CheckError::new(
                    ErrorKind::Access(AccessError::Query),
                    "target set is empty: nothing to check",
                )],
            );
        }

        // SQL mode decides DDL quoting; without it no table can be parsed,
        // so a failure here fails the whole check with the connectivity cause.
        let mode = match fetch_sql_mode(&self.name, self.source.as_ref(), ctx).await {
            Ok(mode) => mode,
            Err(e) => {
                warn!(checker = %self.name, "sql_mode fetch failed: {}", e.message);
                return CheckResult::from_errors(self.name.clone(), vec![e]);
            }
        };

        let targets: Vec<(Arc<dyn SchemaSource>, TableLocation)> = self
            .targets
            .iter()
            .map(|loc| (Arc::clone(&self.source), loc.clone()))
            .collect();
        let modes = HashMap::from([(String::new(), mode)]);

        let outcomes = fetch_structures(&targets, &modes, self.concurrency, ctx).await;

        let mut errors = Vec::new();
        for outcome in outcomes {
            match outcome.structure {
                Ok(table) => errors.extend(rules::check_table(&table, &self.allowed_charsets)),
                Err(e) => errors.push(e),
            }
        }

        CheckResult::from_errors(self.name.clone(), errors)
    }
}
