//! shard-precheck: Pre-migration structure validator for sharded MySQL tables
//!
//! This library provides the core functionality for validating table
//! structures before a sharding merge. It canonicalizes CREATE TABLE DDL
//! under the session SQL mode, runs per-table compatibility rules, and
//! compares shard tables against a baseline for structural equivalence.

pub mod checker;
pub mod config;
pub mod output;
pub mod result;
pub mod schema;
pub mod source;

// Re-export commonly used types
pub use checker::{Checker, CompositeChecker, ShardingTablesChecker, TablesChecker};
pub use config::Config;
pub use result::{CheckError, CheckResult, ErrorKind, Severity, State, TableLocation};
pub use schema::{SqlMode, TableStructure, canonicalize};
pub use source::{DumpSource, MemorySource, SchemaSource};
