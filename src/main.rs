//! shard-precheck CLI
//!
//! Entry point for the command-line tool.
//!
//! Exit codes:
//! - 0: All checks passed (warnings allowed)
//! - 1: One or more checks failed
//! - 2: Tool error (config error, report I/O error, etc.)

use anyhow::{Context, Result};
use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use shard_precheck::output::{JsonReporter, Reporter, TextReporter};
use shard_precheck::source::DumpSource;
use shard_precheck::{
    CheckResult, Checker, Config, SchemaSource, ShardingTablesChecker, State, TablesChecker,
};

/// Default config file name used when --config is not explicitly provided.
const DEFAULT_CONFIG_FILE: &str = "shard-precheck.toml";

#[derive(Parser, Debug)]
#[command(name = "shard-precheck")]
#[command(about = "Pre-migration structure validator for sharded MySQL tables", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override output format (text, json)
    #[arg(long)]
    format: Option<String>,

    /// Treat structure drift between shards as fatal
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args).await {
        Ok(all_passed) => {
            if !all_passed {
                std::process::exit(1);
            }
            // exit 0 is implicit
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            std::process::exit(2);
        }
    }
}

/// Run all configured checks.
///
/// Returns `Ok(true)` if every check passed (warnings allowed), `Ok(false)`
/// if at least one check failed, or `Err` on tool errors.
async fn run(args: Args) -> Result<bool> {
    let mut config = load_config(&args.config)?;
    if args.strict {
        config.strict = true;
    }

    let ctx = CancellationToken::new();
    {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling checks");
                ctx.cancel();
            }
        });
    }

    // --- Step 1: Build one schema source per [[sources]] entry ---
    let mut sources: HashMap<String, Arc<dyn SchemaSource>> = HashMap::new();
    for sc in &config.sources {
        sources.insert(sc.id.clone(), Arc::new(DumpSource::new(&sc.dump_dir)));
    }

    // --- Step 2: Per-source structure checks ---
    let mut results: Vec<CheckResult> = Vec::new();
    for sc in &config.sources {
        let source = sources
            .get(&sc.id)
            .cloned()
            .context("source map missing a configured id")?;
        let checker = TablesChecker::new(format!("table-structure/{}", sc.id), source, &sc.tables)
            .with_allowed_charsets(config.allowed_charsets.clone())
            .with_concurrency(config.concurrency);
        info!(source = sc.id.as_str(), "running table structure check");
        results.push(checker.check(&ctx).await);
    }

    // --- Step 3: Cross-shard comparison ---
    if config.compare_shards {
        let targets: HashMap<String, HashMap<String, Vec<String>>> = config
            .sources
            .iter()
            .map(|sc| (sc.id.clone(), sc.tables.clone()))
            .collect();
        let checker =
            ShardingTablesChecker::new("sharding-tables", sources, &targets, config.strict)
                .with_concurrency(config.concurrency);
        info!("running sharding consistency check");
        results.push(checker.check(&ctx).await);
    }

    // --- Step 4: Emit reports ---
    let formats: Vec<String> = if let Some(ref fmt) = args.format {
        vec![fmt.clone()]
    } else {
        config.output.formats.clone()
    };

    for format in &formats {
        let reporter: Box<dyn Reporter> = match format.as_str() {
            "text" => Box::new(TextReporter::new(true)),
            "json" => Box::new(JsonReporter::new()),
            other => {
                eprintln!("Warning: Unknown output format '{}', skipping", other);
                continue;
            }
        };

        reporter
            .emit(&results, &config.output.dir)
            .context(format!("Failed to write {} report", format))?;
    }

    // --- Step 5: Summary and exit code ---
    let failed = results.iter().filter(|r| r.state == State::Failure).count();
    eprintln!(
        "shard-precheck: {} check(s), {} failed",
        results.len(),
        failed
    );

    Ok(failed == 0)
}

/// Load configuration from file.
///
/// If `config_path` is `Some`, the user explicitly passed `--config` and the
/// file must exist (error if not found). If `None`, the default config path
/// is used; a missing default config file is a tool error too, since there is
/// nothing to check without configured sources.
fn load_config(config_path: &Option<PathBuf>) -> Result<Config> {
    let path = match config_path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            path.clone()
        }
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default_path.exists() {
                anyhow::bail!(
                    "Config file {} not found and no --config given",
                    default_path.display()
                );
            }
            default_path
        }
    };
    Config::from_file(&path).context("Failed to load configuration")
}
