//! Configuration handling for SchemaDiff

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::schema::diff::DiffOptions;
use crate::schema::generator::OutputPolicy;
use crate::schema::tolerance::TolerancePolicy;
use crate::utils::naming::NameFilter;

/// Load configuration from a TOML file
pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config_str = fs::read_to_string(path.as_ref())
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    from_toml_str(&config_str)
}

/// Parse configuration from TOML text
pub fn from_toml_str(config_str: &str) -> Result<Config> {
    let config: Config = toml::from_str(config_str)?;
    Ok(config)
}

/// Represents the complete SchemaDiff configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub tolerance: TolerancePolicy,
    pub diff: DiffConfig,
    pub output: OutputConfig,
    pub parser: ParserConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Options for the diff engine, with the tolerance section folded in
    pub fn diff_options(&self) -> Result<DiffOptions> {
        self.diff.to_options(&self.tolerance)
    }

    pub fn output_policy(&self) -> Result<OutputPolicy> {
        self.output.to_policy()
    }
}

/// Which tables are compared
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DiffConfig {
    /// Regular expression a table name must match to be compared at all
    pub table_filter: Option<String>,
    /// Only report tables present on both sides
    pub only_common_tables: bool,
    pub skip_triggers: bool,
}

impl DiffConfig {
    pub fn to_options(&self, tolerance: &TolerancePolicy) -> Result<DiffOptions> {
        Ok(DiffOptions {
            tolerance: tolerance.clone(),
            table_filter: NameFilter::from_optional(self.table_filter.as_deref())?,
            only_common_tables: self.only_common_tables,
            skip_triggers: self.skip_triggers,
        })
    }
}

/// How migration statements are rendered
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub suppress_drop_tables: bool,
    /// Also covers removed indexes and foreign keys
    pub suppress_drop_columns: bool,
    pub suppress_old_definitions: bool,
    pub table_filter: Option<String>,
    pub list_only: bool,
    pub include_header: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suppress_drop_tables: false,
            suppress_drop_columns: false,
            suppress_old_definitions: false,
            table_filter: None,
            list_only: false,
            include_header: true,
        }
    }
}

impl OutputConfig {
    pub fn to_policy(&self) -> Result<OutputPolicy> {
        Ok(OutputPolicy {
            suppress_drop_tables: self.suppress_drop_tables,
            suppress_drop_columns: self.suppress_drop_columns,
            suppress_old_definitions: self.suppress_old_definitions,
            table_filter: NameFilter::from_optional(self.table_filter.as_deref())?,
            list_only: self.list_only,
            include_header: self.include_header,
        })
    }
}

/// Definition parser behavior
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ParserConfig {
    /// Skip recognized-but-unmodeled constructs with a warning instead of failing
    pub skip_unsupported: bool,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            stdout: true,
        }
    }
}
