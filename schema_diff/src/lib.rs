//! SchemaDiff: structural comparison of MySQL schema definitions
//!
//! SchemaDiff parses the table definitions `mysqldump --no-data` prints,
//! compares two such schemas under a configurable tolerance policy and
//! renders the ordered `ALTER`/`CREATE`/`DROP` statements that turn the first
//! schema into the second. Row data is never looked at.
//!
//! ```no_run
//! use schema_diff::{Config, SchemaDiffClient};
//!
//! let client = SchemaDiffClient::new(Config::default());
//! let old = std::fs::read_to_string("old.sql")?;
//! let new = std::fs::read_to_string("new.sql")?;
//! let output = client.compare(&old, &new)?;
//! print!("{}", output.to_script());
//! # Ok::<(), schema_diff::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod schema;
pub mod utils;

// Re-export main types for easier access
pub use config::Config;
pub use error::{Error, Result};
pub use schema::diff::{DeltaRecord, DiffOptions, SchemaDiff};
pub use schema::generator::{Migration, MigrationGenerator, MigrationOutput, OutputPolicy};
pub use schema::parser::DefinitionParser;
pub use schema::tolerance::TolerancePolicy;
pub use schema::types::{Schema, SourceKind};

/// Initialize SchemaDiff with the specified configuration file
pub fn init(config_path: &str) -> Result<SchemaDiffClient> {
    let config = config::load_from_file(config_path)?;
    utils::logging::init_logging(&config.logging)?;
    Ok(SchemaDiffClient::new(config))
}

/// The main client: parser, diff engine and generator behind one configuration
#[derive(Debug, Clone)]
pub struct SchemaDiffClient {
    config: Config,
    parser: DefinitionParser,
}

impl SchemaDiffClient {
    /// Create a new SchemaDiff client from configuration
    pub fn new(config: Config) -> Self {
        let parser = DefinitionParser::new(&config.parser);
        Self { config, parser }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Parse one schema's definition text
    pub fn parse_schema(&self, name: &str, source_kind: SourceKind, text: &str) -> Result<Schema> {
        self.parser.parse(name, source_kind, text)
    }

    /// Generate a schema diff between two parsed schemas
    pub fn generate_schema_diff(&self, old: &Schema, new: &Schema) -> Result<SchemaDiff> {
        let options = self.config.diff_options()?;
        SchemaDiff::generate(old, new, &options)
    }

    /// Render migration statements for a schema diff
    pub fn generate_migrations(&self, diff: &SchemaDiff) -> Result<MigrationOutput> {
        let policy = self.config.output_policy()?;
        MigrationGenerator::new(&policy).generate(diff)
    }

    /// Complete workflow: parse both texts, diff them and render the result
    pub fn compare(&self, old_text: &str, new_text: &str) -> Result<MigrationOutput> {
        let old = self.parse_schema("old", SourceKind::Unspecified, old_text)?;
        let new = self.parse_schema("new", SourceKind::Unspecified, new_text)?;

        let diff = self.generate_schema_diff(&old, &new)?;
        if diff.is_empty() {
            tracing::debug!("Schemas are structurally identical");
        }

        self.generate_migrations(&diff)
    }
}
