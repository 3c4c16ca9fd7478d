//! Type definitions for schema objects
//!
//! Every value here is built once (by the parser, or by hand in tests) and
//! only read afterwards. Transformations such as tolerance normalization
//! return new values instead of editing these in place.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::error::{Error, Result};

/// Where a schema's definition text came from. The core never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    File,
    Database,
    #[default]
    Unspecified,
}

/// Represents one side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub source_kind: SourceKind,
    pub tables: BTreeMap<String, Table>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new(name: &str, source_kind: SourceKind) -> Self {
        Self {
            name: name.to_string(),
            source_kind,
            tables: BTreeMap::new(),
        }
    }

    /// Add a table to the schema, replacing any table of the same name
    pub fn add_table(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Builder form of [`Schema::add_table`]
    pub fn with_table(mut self, table: Table) -> Self {
        self.add_table(table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Check every structural invariant of the model
    pub fn validate(&self) -> Result<()> {
        for (key, table) in &self.tables {
            if key != &table.name {
                return Err(Error::invariant(
                    format!("schema '{}'", self.name),
                    format!("table '{}' is stored under the name '{}'", table.name, key),
                ));
            }
            table.validate()?;
        }
        Ok(())
    }
}

/// Represents a table definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub triggers: Vec<Trigger>,
    /// Canonical upper-case option name to verbatim value, in declaration order
    pub options: IndexMap<String, String>,
}

impl Table {
    /// Create a new table with the given name
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            triggers: Vec::new(),
            options: IndexMap::new(),
        }
    }

    /// Append a column; its position is taken from the sequence
    pub fn add_column(&mut self, mut column: Column) {
        column.position = self.columns.len();
        self.columns.push(column);
    }

    pub fn add_index(&mut self, index: Index) {
        self.indexes.push(index);
    }

    pub fn add_trigger(&mut self, trigger: Trigger) {
        self.triggers.push(trigger);
    }

    pub fn set_option(&mut self, name: &str, value: &str) {
        self.options.insert(name.to_string(), value.to_string());
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.add_column(column);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.add_index(index);
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.add_trigger(trigger);
        self
    }

    pub fn with_option(mut self, name: &str, value: &str) -> Self {
        self.set_option(name, value);
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find an index by its identity (foreign keys live in their own namespace)
    pub fn index(&self, key: &IndexKey) -> Option<&Index> {
        self.indexes.iter().find(|i| &i.key() == key)
    }

    pub fn primary_key(&self) -> Option<&Index> {
        self.indexes.iter().find(|i| i.kind == IndexKind::Primary)
    }

    pub fn foreign_keys(&self) -> impl Iterator<Item = &Index> {
        self.indexes.iter().filter(|i| i.kind == IndexKind::Foreign)
    }

    /// Tables this table references through foreign keys, excluding itself
    pub fn referenced_tables(&self) -> Vec<&str> {
        let mut tables: Vec<&str> = self
            .foreign_keys()
            .filter_map(|fk| fk.reference.as_ref())
            .map(|r| r.table.as_str())
            .filter(|t| *t != self.name)
            .collect();
        tables.sort_unstable();
        tables.dedup();
        tables
    }

    /// Renumber column positions after the sequence was rearranged
    pub(crate) fn renumber_columns(&mut self) {
        for (position, column) in self.columns.iter_mut().enumerate() {
            column.position = position;
        }
    }

    /// Check the table-level invariants
    pub fn validate(&self) -> Result<()> {
        let context = format!("table '{}'", self.name);

        let mut column_names = HashSet::new();
        for (position, column) in self.columns.iter().enumerate() {
            if !column_names.insert(column.name.as_str()) {
                return Err(Error::invariant(
                    &context,
                    format!("duplicate column '{}'", column.name),
                ));
            }
            if column.position != position {
                return Err(Error::invariant(
                    &context,
                    format!(
                        "column '{}' claims position {} but is stored at {}",
                        column.name, column.position, position
                    ),
                ));
            }
        }

        let mut index_keys = HashSet::new();
        for index in &self.indexes {
            if !index_keys.insert(index.key()) {
                return Err(Error::invariant(
                    &context,
                    format!("duplicate {} '{}'", index.kind, index.name),
                ));
            }
            if index.columns.is_empty() {
                return Err(Error::invariant(
                    &context,
                    format!("{} '{}' has no columns", index.kind, index.name),
                ));
            }
            if let Some(missing) = index
                .columns
                .iter()
                .find(|c| !column_names.contains(c.name.as_str()))
            {
                return Err(Error::invariant(
                    &context,
                    format!(
                        "{} '{}' references unknown column '{}'",
                        index.kind, index.name, missing.name
                    ),
                ));
            }
            if (index.kind == IndexKind::Foreign) != index.reference.is_some() {
                return Err(Error::invariant(
                    &context,
                    format!("index '{}' has a reference that does not match its kind", index.name),
                ));
            }
        }
        if self.indexes.iter().filter(|i| i.kind == IndexKind::Primary).count() > 1 {
            return Err(Error::invariant(&context, "more than one primary key"));
        }

        let mut trigger_names = HashSet::new();
        for trigger in &self.triggers {
            if !trigger_names.insert(trigger.name.as_str()) {
                return Err(Error::invariant(
                    &context,
                    format!("duplicate trigger '{}'", trigger.name),
                ));
            }
            if trigger.table != self.name {
                return Err(Error::invariant(
                    &context,
                    format!("trigger '{}' belongs to table '{}'", trigger.name, trigger.table),
                ));
            }
        }

        Ok(())
    }
}

/// A column default: an explicit `DEFAULT NULL` is not the same as no default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultValue {
    Null,
    /// Verbatim literal or expression, e.g. `'abc'`, `0`, `CURRENT_TIMESTAMP`
    Value(String),
}

impl fmt::Display for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Null => write!(f, "NULL"),
            DefaultValue::Value(v) => write!(f, "{}", v),
        }
    }
}

/// Expression of a generated column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedColumn {
    /// Parenthesized expression text
    pub expression: String,
    pub stored: bool,
}

/// Represents a table column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<DefaultValue>,
    pub auto_increment: bool,
    pub charset: Option<String>,
    pub collation: Option<String>,
    pub on_update: Option<String>,
    pub generated: Option<GeneratedColumn>,
    pub comment: Option<String>,
    pub position: usize,
}

impl Column {
    /// Create a new nullable column with the given name and type
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            default: None,
            auto_increment: false,
            charset: None,
            collation: None,
            on_update: None,
            generated: None,
            comment: None,
            position: 0,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set a default value for the column
    pub fn default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn collation(mut self, collation: &str) -> Self {
        self.collation = Some(collation.to_string());
        self
    }

    pub fn charset(mut self, charset: &str) -> Self {
        self.charset = Some(charset.to_string());
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Kind of index or key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Primary,
    Unique,
    Index,
    Fulltext,
    Foreign,
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IndexKind::Primary => "primary key",
            IndexKind::Unique => "unique key",
            IndexKind::Index => "index",
            IndexKind::Fulltext => "fulltext index",
            IndexKind::Foreign => "foreign key",
        };
        f.write_str(label)
    }
}

/// One column reference inside an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    pub name: String,
    /// Prefix length, e.g. `name`(10)
    pub length: Option<u32>,
    pub descending: bool,
}

impl IndexColumn {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            length: None,
            descending: false,
        }
    }
}

/// Target of a foreign key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

/// Identity of an index within its table.
///
/// MySQL keeps foreign key constraint names apart from index names, and dumps
/// often carry `KEY fk_x` next to `CONSTRAINT fk_x FOREIGN KEY`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexKey {
    pub name: String,
    pub foreign: bool,
}

/// Represents an index, key or foreign key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub kind: IndexKind,
    pub columns: Vec<IndexColumn>,
    /// Trailing options verbatim, e.g. `USING BTREE COMMENT 'x'`
    pub options: Option<String>,
    pub reference: Option<ForeignKeyRef>,
}

impl Index {
    /// Create an index over plain column references
    pub fn new(name: &str, kind: IndexKind, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind,
            columns: columns.iter().map(|c| IndexColumn::new(c)).collect(),
            options: None,
            reference: None,
        }
    }

    pub fn primary(columns: &[&str]) -> Self {
        Self::new("PRIMARY", IndexKind::Primary, columns)
    }

    pub fn foreign(name: &str, columns: &[&str], table: &str, ref_columns: &[&str]) -> Self {
        let mut index = Self::new(name, IndexKind::Foreign, columns);
        index.reference = Some(ForeignKeyRef {
            table: table.to_string(),
            columns: ref_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: None,
            on_update: None,
        });
        index
    }

    pub fn key(&self) -> IndexKey {
        IndexKey {
            name: self.name.clone(),
            foreign: self.kind == IndexKind::Foreign,
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerTiming {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for TriggerTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerTiming::Before => f.write_str("BEFORE"),
            TriggerTiming::After => f.write_str("AFTER"),
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerEvent::Insert => f.write_str("INSERT"),
            TriggerEvent::Update => f.write_str("UPDATE"),
            TriggerEvent::Delete => f.write_str("DELETE"),
        }
    }
}

/// Represents a row trigger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    pub name: String,
    pub table: String,
    pub timing: TriggerTiming,
    pub event: TriggerEvent,
    /// Everything after `FOR EACH ROW`, compared verbatim
    pub body: String,
}
