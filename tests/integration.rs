//! Integration tests for the full check pipeline: dump directories on disk,
//! schema sources reading them, checkers producing results, reporters
//! writing files.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use shard_precheck::output::{JsonReporter, Reporter};
use shard_precheck::result::{AccessError, ErrorKind, RuleError, ShardError};
use shard_precheck::{
    Checker, Config, DumpSource, SchemaSource, ShardingTablesChecker, State, TablesChecker,
};

/// Lay out a `mysqldump --no-data` style dump directory:
/// an optional `sql_mode` file at the root and one `<schema>/<table>.sql`
/// per table.
fn write_dump(root: &Path, sql_mode: &str, tables: &[(&str, &str, &str)]) {
    if !sql_mode.is_empty() {
        std::fs::write(root.join("sql_mode"), sql_mode).expect("write sql_mode");
    }
    for (schema, table, ddl) in tables {
        let dir = root.join(schema);
        std::fs::create_dir_all(&dir).expect("mkdir schema");
        std::fs::write(dir.join(format!("{table}.sql")), ddl).expect("write ddl");
    }
}

fn targets(schema: &str, tables: &[&str]) -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    map.insert(
        schema.to_string(),
        tables.iter().map(|t| t.to_string()).collect(),
    );
    map
}

const CLEAN_DDL: &str = "CREATE TABLE t (\n  id int(11) NOT NULL,\n  name varchar(64) DEFAULT NULL,\n  PRIMARY KEY (id)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";

#[tokio::test]
async fn dump_backed_structure_check_passes_for_clean_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_dump(dir.path(), "", &[("shop", "t", CLEAN_DDL)]);

    let source: Arc<dyn SchemaSource> = Arc::new(DumpSource::new(dir.path()));
    let checker = TablesChecker::new("table-structure/src1", source, &targets("shop", &["t"]));

    let result = checker.check(&CancellationToken::new()).await;
    assert_eq!(result.state, State::Success, "errors: {:?}", result.errors);
}

#[tokio::test]
async fn dump_backed_structure_check_flags_keyless_fk_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ddl = "CREATE TABLE child (\n  id int(11) NOT NULL,\n  parent_id int(11) DEFAULT NULL,\n  FOREIGN KEY (parent_id) REFERENCES parent (id)\n) ENGINE=InnoDB";
    write_dump(dir.path(), "", &[("shop", "child", ddl)]);

    let source: Arc<dyn SchemaSource> = Arc::new(DumpSource::new(dir.path()));
    let checker = TablesChecker::new("table-structure/src1", source, &targets("shop", &["child"]));

    let result = checker.check(&CancellationToken::new()).await;
    assert_eq!(result.state, State::Failure);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(
        result.errors[0].kind,
        ErrorKind::Rule(RuleError::NoPrimaryOrUniqueKey)
    );
    assert_eq!(
        result.errors[1].kind,
        ErrorKind::Rule(RuleError::HasForeignKey)
    );
}

#[tokio::test]
async fn sql_mode_file_switches_identifier_quoting() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ddl = "CREATE TABLE \"t\" (\n  \"id\" int NOT NULL,\n  PRIMARY KEY (\"id\")\n)";
    write_dump(
        dir.path(),
        "ANSI_QUOTES,NO_AUTO_VALUE_ON_ZERO",
        &[("shop", "t", ddl)],
    );

    let source: Arc<dyn SchemaSource> = Arc::new(DumpSource::new(dir.path()));
    let checker = TablesChecker::new("table-structure/src1", source, &targets("shop", &["t"]));

    let result = checker.check(&CancellationToken::new()).await;
    assert_eq!(result.state, State::Success, "errors: {:?}", result.errors);
}

#[tokio::test]
async fn sharding_check_accepts_identical_shards() {
    let dir1 = tempfile::tempdir().expect("tempdir");
    let dir2 = tempfile::tempdir().expect("tempdir");
    write_dump(dir1.path(), "", &[("shop", "t_0", CLEAN_DDL)]);
    write_dump(dir2.path(), "", &[("shop", "t_1", CLEAN_DDL)]);

    let mut sources: HashMap<String, Arc<dyn SchemaSource>> = HashMap::new();
    sources.insert("src1".to_string(), Arc::new(DumpSource::new(dir1.path())));
    sources.insert("src2".to_string(), Arc::new(DumpSource::new(dir2.path())));

    let mut all_targets = HashMap::new();
    all_targets.insert("src1".to_string(), targets("shop", &["t_0"]));
    all_targets.insert("src2".to_string(), targets("shop", &["t_1"]));

    let checker = ShardingTablesChecker::new("sharding-tables", sources, &all_targets, false);
    let result = checker.check(&CancellationToken::new()).await;
    assert_eq!(result.state, State::Success, "errors: {:?}", result.errors);
}

#[tokio::test]
async fn sharding_check_flags_divergent_column_type() {
    let dir1 = tempfile::tempdir().expect("tempdir");
    let dir2 = tempfile::tempdir().expect("tempdir");
    let divergent = "CREATE TABLE t_1 (\n  id int(11) NOT NULL,\n  name varchar(128) DEFAULT NULL,\n  PRIMARY KEY (id)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4";
    write_dump(dir1.path(), "", &[("shop", "t_0", CLEAN_DDL)]);
    write_dump(dir2.path(), "", &[("shop", "t_1", divergent)]);

    let mut sources: HashMap<String, Arc<dyn SchemaSource>> = HashMap::new();
    sources.insert("src1".to_string(), Arc::new(DumpSource::new(dir1.path())));
    sources.insert("src2".to_string(), Arc::new(DumpSource::new(dir2.path())));

    let mut all_targets = HashMap::new();
    all_targets.insert("src1".to_string(), targets("shop", &["t_0"]));
    all_targets.insert("src2".to_string(), targets("shop", &["t_1"]));

    let checker = ShardingTablesChecker::new("sharding-tables", sources, &all_targets, false);
    let result = checker.check(&CancellationToken::new()).await;

    assert_eq!(result.state, State::Failure);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(
        result.errors[0].kind,
        ErrorKind::Shard(ShardError::ColumnDefinitionMismatch)
    );
}

#[tokio::test]
async fn missing_dump_directory_surfaces_as_query_error() {
    let source: Arc<dyn SchemaSource> =
        Arc::new(DumpSource::new("/nonexistent/shard-precheck-dump"));
    let checker = TablesChecker::new("table-structure/src1", source, &targets("shop", &["t"]));

    let result = checker.check(&CancellationToken::new()).await;
    assert_eq!(result.state, State::Failure);
    assert!(
        result
            .errors
            .iter()
            .all(|e| e.kind == ErrorKind::Access(AccessError::Query))
    );
}

#[tokio::test]
async fn json_report_written_for_pipeline_results() {
    let dump = tempfile::tempdir().expect("tempdir");
    write_dump(dump.path(), "", &[("shop", "t", CLEAN_DDL)]);

    let source: Arc<dyn SchemaSource> = Arc::new(DumpSource::new(dump.path()));
    let checker = TablesChecker::new("table-structure/src1", source, &targets("shop", &["t"]));
    let results = vec![checker.check(&CancellationToken::new()).await];

    let out = tempfile::tempdir().expect("tempdir");
    JsonReporter.emit(&results, out.path()).expect("emit");

    let content = std::fs::read_to_string(out.path().join("results.json")).expect("read");
    let parsed: serde_json::Value = serde_json::from_str(&content).expect("parse json");
    assert_eq!(parsed["state"], "Success");
    assert_eq!(parsed["results"][0]["name"], "table-structure/src1");
    assert_eq!(parsed["results"][0]["errors"].as_array().map(Vec::len), Some(0));
}

#[test]
fn config_file_drives_source_layout() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shard-precheck.toml");
    std::fs::write(
        &path,
        r#"
concurrency = 8
strict = true

[[sources]]
id = "src1"
dump_dir = "dumps/shard-1"
[sources.tables]
shop = ["t_0", "t_1"]

[[sources]]
id = "src2"
dump_dir = "dumps/shard-2"
[sources.tables]
shop = ["t_2"]
"#,
    )
    .expect("write config");

    let config = Config::from_file(&path).expect("load config");
    assert_eq!(config.concurrency, 8);
    assert!(config.strict);
    assert!(config.compare_shards);
    assert_eq!(config.sources.len(), 2);
    assert_eq!(config.sources[1].tables["shop"], vec!["t_2"]);
}
