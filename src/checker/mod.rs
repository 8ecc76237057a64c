//! Checker engine
//!
//! Each checker implements the [`Checker`] trait and validates some aspect of
//! a migration target set, returning one aggregated [`CheckResult`]. Checkers
//! are stateless between invocations apart from the target set they were
//! constructed with; schema sources are injected and owned by the caller.
//!
//! The fetch fan-out in this module is shared by all checker variants: one
//! task per (source, schema, table) triple, bounded by a concurrency limit,
//! cancellation observed at every database round trip, and results re-ordered
//! by the flattened target order so output never depends on task scheduling.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::result::{AccessError, CheckError, CheckResult, ErrorKind, TableLocation};
use crate::schema::{SqlMode, TableStructure, canonicalize};
use crate::source::SchemaSource;

pub mod rules;
pub mod sharding;
pub mod tables;

pub use sharding::ShardingTablesChecker;
pub use tables::TablesChecker;

/// Default bound on in-flight schema fetches per check.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Trait that every checker implements.
#[async_trait]
pub trait Checker: Send + Sync {
    /// Name of the check, echoed into the produced result.
    fn name(&self) -> &str;

    /// Run the check. All per-table failures degrade to error entries in the
    /// result; the returned value is always structurally complete, even when
    /// `ctx` is cancelled mid-flight.
    async fn check(&self, ctx: &CancellationToken) -> CheckResult;
}

/// Runs a list of checkers in order and merges their results into one.
pub struct CompositeChecker {
    name: String,
    checkers: Vec<Box<dyn Checker>>,
}

impl CompositeChecker {
    pub fn new(name: impl Into<String>, checkers: Vec<Box<dyn Checker>>) -> Self {
        Self {
            name: name.into(),
            checkers,
        }
    }
}

#[async_trait]
impl Checker for CompositeChecker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self, ctx: &CancellationToken) -> CheckResult {
        let mut results = Vec::with_capacity(self.checkers.len());
        for checker in &self.checkers {
            debug!(checker = checker.name(), "running sub-check");
            results.push(checker.check(ctx).await);
        }
        CheckResult::merge(self.name.clone(), results)
    }
}

// ---------------------------------------------------------------------------
// Target flattening
// ---------------------------------------------------------------------------

/// Flatten a `{schema → [tables]}` map into a stable, deduplicated list of
/// locations ordered by (schema, table). Map iteration order never leaks
/// into results.
pub(crate) fn flatten_tables(
    source: &str,
    tables: &HashMap<String, Vec<String>>,
) -> Vec<TableLocation> {
    let mut out: Vec<TableLocation> = tables
        .iter()
        .flat_map(|(schema, names)| {
            names
                .iter()
                .map(|t| TableLocation::new(source, schema.clone(), t.clone()))
        })
        .collect();
    out.sort();
    out.dedup();
    out
}

/// Flatten a `{source → {schema → [tables]}}` map, ordered by
/// (source, schema, table).
pub(crate) fn flatten_sharded(
    targets: &HashMap<String, HashMap<String, Vec<String>>>,
) -> Vec<TableLocation> {
    let mut out: Vec<TableLocation> = targets
        .iter()
        .flat_map(|(source, tables)| flatten_tables(source, tables))
        .collect();
    out.sort();
    out.dedup();
    out
}

// ---------------------------------------------------------------------------
// Fetch fan-out
// ---------------------------------------------------------------------------

/// Per-table outcome of the fetch/canonicalize stage.
pub(crate) struct FetchOutcome {
    pub location: TableLocation,
    pub structure: Result<TableStructure, CheckError>,
}

/// Fetch the session SQL mode from one source, observing cancellation.
///
/// A failure here means the source cannot be used at all (no DDL can be
/// parsed without knowing the quoting rules), so callers escalate it to an
/// immediate failure result rather than a per-table entry.
pub(crate) async fn fetch_sql_mode(
    source_name: &str,
    source: &dyn SchemaSource,
    ctx: &CancellationToken,
) -> Result<SqlMode, CheckError> {
    if ctx.is_cancelled() {
        return Err(cancelled_error(source_name));
    }
    let value = tokio::select! {
        _ = ctx.cancelled() => return Err(cancelled_error(source_name)),
        res = source.session_sql_mode() => res.map_err(|e| {
            CheckError::new(
                ErrorKind::Access(AccessError::Query),
                format!("failed to fetch sql_mode from source `{source_name}`: {e}"),
            )
        })?,
    };
    debug!(source = source_name, sql_mode = %value, "fetched session sql_mode");
    Ok(SqlMode::from_session_value(&value))
}

/// Fetch and canonicalize every target table, at most `concurrency` fetches
/// in flight. `modes` holds the per-source SQL mode, cached for this one
/// invocation. Outcomes come back in flattened target order regardless of
/// completion order.
pub(crate) async fn fetch_structures(
    targets: &[(Arc<dyn SchemaSource>, TableLocation)],
    modes: &HashMap<String, SqlMode>,
    concurrency: usize,
    ctx: &CancellationToken,
) -> Vec<FetchOutcome> {
    let concurrency = concurrency.max(1);

    // Each job owns its source handle, location, mode, and token clone, so
    // the boxed futures are 'static and independent of this stack frame.
    let mut jobs: Vec<BoxFuture<'static, (usize, FetchOutcome)>> =
        Vec::with_capacity(targets.len());
    for (idx, (source, location)) in targets.iter().enumerate() {
        let source = Arc::clone(source);
        let location = location.clone();
        let mode = modes.get(&location.source).copied().unwrap_or_default();
        let ctx = ctx.clone();
        jobs.push(Box::pin(async move {
            (idx, fetch_one(source, location, mode, ctx).await)
        }));
    }

    let mut indexed: Vec<(usize, FetchOutcome)> = futures::stream::iter(jobs)
        .buffer_unordered(concurrency)
        .collect()
        .await;

    indexed.sort_by_key(|(idx, _)| *idx);
    indexed.into_iter().map(|(_, outcome)| outcome).collect()
}

async fn fetch_one(
    source: Arc<dyn SchemaSource>,
    location: TableLocation,
    mode: SqlMode,
    ctx: CancellationToken,
) -> FetchOutcome {
    if ctx.is_cancelled() {
        let err = cancelled_error(&location.to_string()).at(location.clone());
        return FetchOutcome {
            location,
            structure: Err(err),
        };
    }

    let ddl = tokio::select! {
        _ = ctx.cancelled() => {
            let err = cancelled_error(&location.to_string()).at(location.clone());
            return FetchOutcome { location, structure: Err(err) };
        }
        res = source.table_ddl(&location.schema, &location.table) => res,
    };

    let structure = match ddl {
        Ok(ddl) => {
            debug!(table = %location, "fetched DDL");
            match canonicalize(&ddl, mode) {
                Ok(mut table) => {
                    table.id = location.clone();
                    Ok(table)
                }
                Err(e) => Err(CheckError::new(
                    ErrorKind::Access(AccessError::Parse),
                    format!("failed to parse DDL for {location}: {e}"),
                )
                .with_detail(ddl)
                .at(location.clone())),
            }
        }
        Err(e) => Err(CheckError::new(
            ErrorKind::Access(AccessError::Query),
            format!("failed to fetch DDL for {location}: {e}"),
        )
        .at(location.clone())),
    };

    FetchOutcome {
        location,
        structure,
    }
}

fn cancelled_error(what: &str) -> CheckError {
    CheckError::new(
        ErrorKind::Access(AccessError::Cancelled),
        format!("check cancelled before {what} was fetched"),
    )
}
