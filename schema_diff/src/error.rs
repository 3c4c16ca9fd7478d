//! Error types for SchemaDiff

use thiserror::Error;

/// Result type for SchemaDiff operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for SchemaDiff
#[derive(Error, Debug)]
pub enum Error {
    /// A definition statement could not be parsed
    #[error("Parse error at line {line}: {reason}\n  in statement: {statement}")]
    ParseError {
        line: usize,
        statement: String,
        reason: String,
    },

    /// A model breaks one of the structural invariants (duplicate names, bad positions)
    #[error("Model invariant violation in {context}: {reason}")]
    ModelInvariantViolation { context: String, reason: String },

    /// A construct the parser recognizes but cannot represent in the model
    #[error("Unsupported construct at line {line} ({construct}): {statement}")]
    UnsupportedConstruct {
        line: usize,
        construct: String,
        statement: String,
    },

    #[error("Invalid table name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invariant(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::ModelInvariantViolation {
            context: context.into(),
            reason: reason.into(),
        }
    }
}

/// Convert Serde JSON errors to SchemaDiff errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to SchemaDiff errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(format!("Failed to parse config file: {}", error))
    }
}
