//! Cross-shard structural equivalence
//!
//! Verifies that every table in a `{source → {schema → [tables]}}` target set
//! is structurally interchangeable, because their rows will be merged into
//! one destination table. The first successfully canonicalized structure (in
//! flattened target order) is the baseline; every other table is compared
//! against it. Violations are reported at table granularity: a table that
//! diverges contributes exactly one fatal error, never one per column.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::checker::{Checker, DEFAULT_CONCURRENCY, fetch_sql_mode, fetch_structures, flatten_sharded};
use crate::result::{
    AccessError, CheckError, CheckResult, ErrorKind, Severity, ShardError, TableLocation,
};
use crate::schema::{SqlMode, TableStructure};
use crate::source::SchemaSource;

pub struct ShardingTablesChecker {
    name: String,
    sources: HashMap<String, Arc<dyn SchemaSource>>,
    /// Pre-flattened (source, schema, table) triples in stable order.
    targets: Vec<TableLocation>,
    /// When set, key-set/engine/charset drift fails the check instead of
    /// being reported as informational entries.
    strict: bool,
    concurrency: usize,
}

impl ShardingTablesChecker {
    pub fn new(
        name: impl Into<String>,
        sources: HashMap<String, Arc<dyn SchemaSource>>,
        targets: &HashMap<String, HashMap<String, Vec<String>>>,
        strict: bool,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            targets: flatten_sharded(targets),
            strict,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Compare one structure against the baseline. At most one fatal error
    /// per table; non-fatal drift entries are Info unless `strict`.
    fn compare(&self, table: &TableStructure, baseline: &TableStructure) -> Vec<CheckError> {
        let mut errors = Vec::new();

        if table.columns.len() != baseline.columns.len() {
            errors.push(
                CheckError::new(
                    ErrorKind::Shard(ShardError::ColumnCountMismatch),
                    format!(
                        "table {} has {} column(s), baseline {} has {}",
                        table.id,
                        table.columns.len(),
                        baseline.id,
                        baseline.columns.len()
                    ),
                )
                .at(table.id.clone()),
            );
            return errors;
        }

        // Equal counts: find the first ordinal where the definitions diverge.
        // One error per divergent table, naming that column.
        if let Some((idx, (col, base))) = table
            .columns
            .iter()
            .zip(&baseline.columns)
            .enumerate()
            .find(|(_, (a, b))| a != b)
        {
            errors.push(
                CheckError::new(
                    ErrorKind::Shard(ShardError::ColumnDefinitionMismatch),
                    format!(
                        "table {} column #{} differs from baseline {}",
                        table.id,
                        idx + 1,
                        baseline.id
                    ),
                )
                .with_detail(format!("{col} vs {base}"))
                .at(table.id.clone()),
            );
            return errors;
        }

        let drifts = table.drift_from(baseline);
        if !drifts.is_empty() {
            let severity = if self.strict {
                Severity::Fatal
            } else {
                Severity::Info
            };
            errors.push(
                CheckError::new(
                    ErrorKind::Shard(ShardError::StructureDrift),
                    format!(
                        "table {} drifts from baseline {}",
                        table.id, baseline.id
                    ),
                )
                .with_severity(severity)
                .with_detail(drifts.join("; "))
                .at(table.id.clone()),
            );
        }

        errors
    }
}

#[async_trait]
impl Checker for ShardingTablesChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &CancellationToken) -> CheckResult {
        if self.targets.is_empty() {
            return CheckResult::from_errors(
                self.name.clone(),
                vec![CheckError::new(
                    ErrorKind::Access(AccessError::Query),
                    "target set is empty: nothing to compare",
                )],
            );
        }

        // One SQL-mode fetch per distinct source, cached for this invocation.
        let mut modes: HashMap<String, SqlMode> = HashMap::new();
        let mut source_names: Vec<&String> = self.sources.keys().collect();
        source_names.sort();
        for name in source_names {
            let Some(source) = self.sources.get(name) else {
                continue;
            };
            match fetch_sql_mode(name, source.as_ref(), ctx).await {
                Ok(mode) => {
                    modes.insert(name.clone(), mode);
                }
                Err(e) => {
                    warn!(checker = %self.name, source = %name, "sql_mode fetch failed: {}", e.message);
                    return CheckResult::from_errors(self.name.clone(), vec![e]);
                }
            }
        }

        let targets: Result<Vec<(Arc<dyn SchemaSource>, TableLocation)>, CheckError> = self
            .targets
            .iter()
            .map(|loc| {
                self.sources
                    .get(&loc.source)
                    .map(|s| (Arc::clone(s), loc.clone()))
                    .ok_or_else(|| {
                        CheckError::new(
                            ErrorKind::Access(AccessError::Query),
                            format!("no schema source registered for `{}`", loc.source),
                        )
                        .at(loc.clone())
                    })
            })
            .collect();
        let targets = match targets {
            Ok(t) => t,
            Err(e) => return CheckResult::from_errors(self.name.clone(), vec![e]),
        };

        let outcomes = fetch_structures(&targets, &modes, self.concurrency, ctx).await;

        let mut errors = Vec::new();
        let mut structures = Vec::new();
        for outcome in outcomes {
            match outcome.structure {
                Ok(table) => structures.push(table),
                Err(e) => errors.push(e),
            }
        }

        // Baseline = first successfully canonicalized structure in target order.
        let mut extra = None;
        if let Some((baseline, rest)) = structures.split_first() {
            debug!(checker = %self.name, baseline = %baseline.id, "selected baseline structure");
            for table in rest {
                errors.extend(self.compare(table, baseline));
            }
            extra = serde_json::to_value(&baseline.id).ok();
        }

        let mut result = CheckResult::from_errors(self.name.clone(), errors);
        if let Some(extra) = extra {
            result = result.with_extra(serde_json::json!({ "baseline": extra }));
        }
        result
    }
}
