//! Configuration file parsing
//!
//! Reads shard-precheck.toml configuration files.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checker::DEFAULT_CONCURRENCY;
use crate::checker::rules::default_allowed_charsets;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Bound on in-flight schema fetches per check.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Treat key-set/engine/charset drift between shards as fatal.
    #[serde(default)]
    pub strict: bool,

    /// Run the cross-shard consistency comparison over all sources combined.
    #[serde(default = "default_true")]
    pub compare_shards: bool,

    /// Charset allow-list for the single-table rules.
    #[serde(default = "default_allowed_charsets")]
    pub allowed_charsets: Vec<String>,

    /// Participating schema sources, one entry per shard.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            strict: false,
            compare_shards: true,
            allowed_charsets: default_allowed_charsets(),
            sources: vec![],
            output: OutputConfig::default(),
        }
    }
}

/// One schema source: a dump directory plus the tables to check in it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
    /// Unique source identifier, used in diagnostics and error ordering.
    pub id: String,

    /// Root of a `mysqldump --no-data` style dump directory.
    pub dump_dir: PathBuf,

    /// Target set: schema name → table names.
    pub tables: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Output formats: "text", "json"
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,

    /// Output directory for report files
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            formats: default_formats(),
            dir: default_output_dir(),
        }
    }
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_true() -> bool {
    true
}

fn default_formats() -> Vec<String> {
    vec!["text".to_string()]
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("build/reports/shard-precheck")
}

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[sources]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.is_empty() {
                return Err(ConfigError::Validation(
                    "source id must not be empty".to_string(),
                ));
            }
            if !seen.insert(&source.id) {
                return Err(ConfigError::Validation(format!(
                    "duplicate source id '{}'",
                    source.id
                )));
            }
            if source.tables.values().all(|t| t.is_empty()) {
                return Err(ConfigError::Validation(format!(
                    "source '{}' declares no tables to check",
                    source.id
                )));
            }
        }

        if self.concurrency == 0 {
            return Err(ConfigError::Validation(
                "concurrency must be at least 1".to_string(),
            ));
        }

        for format in &self.output.formats {
            if !matches!(format.as_str(), "text" | "json") {
                return Err(ConfigError::Validation(format!(
                    "unknown output format '{format}'. Valid values: text, json"
                )));
            }
        }

        Ok(())
    }
}
