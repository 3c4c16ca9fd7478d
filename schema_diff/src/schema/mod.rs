//! Schema module for SchemaDiff
//!
//! This module handles parsing definition text into the structural model,
//! comparing two models and rendering the migration between them.

pub mod apply;
pub mod ddl;
pub mod diff;
pub mod generator;
pub mod lexer;
pub mod parser;
pub mod tolerance;
pub mod types;

// Re-export key types
pub use apply::apply;
pub use diff::{
    ColumnAttribute, ColumnDelta, DeltaRecord, DiffOptions, IndexDelta, OptionDelta, Placement,
    SchemaDiff, TableChange, TriggerDelta,
};
pub use generator::{Migration, MigrationGenerator, MigrationOutput, OutputPolicy, Statement};
pub use parser::DefinitionParser;
pub use tolerance::TolerancePolicy;
pub use types::{
    Column, DefaultValue, ForeignKeyRef, GeneratedColumn, Index, IndexColumn, IndexKey, IndexKind,
    Schema, SourceKind, Table, Trigger, TriggerEvent, TriggerTiming,
};
