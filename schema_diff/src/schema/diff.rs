//! Schema difference calculator
//!
//! This module compares two schemas and produces an ordered list of typed
//! delta records. Comparison happens on tolerance-normalized copies; the
//! records themselves carry the original definitions so the generator can
//! render complete statements.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, trace};

use crate::error::Result;
use crate::schema::tolerance::TolerancePolicy;
use crate::schema::types::{Column, Index, IndexKey, Schema, Table, Trigger};
use crate::utils::naming::{passes, quote_identifier, NameFilter};

/// Options controlling which differences are reported
#[derive(Debug, Clone, Default)]
pub struct DiffOptions {
    pub tolerance: TolerancePolicy,
    /// Only tables whose name matches are compared
    pub table_filter: Option<NameFilter>,
    /// Suppress table additions and removals
    pub only_common_tables: bool,
    pub skip_triggers: bool,
}

/// Where a column lands in the new column sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    First,
    After(String),
}

impl Placement {
    /// Placement of the column at `position` within `columns`
    fn of(columns: &[Column], position: usize) -> Self {
        match position.checked_sub(1).and_then(|p| columns.get(p)) {
            Some(predecessor) => Placement::After(predecessor.name.clone()),
            None => Placement::First,
        }
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::First => write!(f, "FIRST"),
            Placement::After(name) => write!(f, "AFTER {}", quote_identifier(name)),
        }
    }
}

/// Column attribute classes that can differ between two versions of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnAttribute {
    Type,
    Nullability,
    Default,
    AutoIncrement,
    Charset,
    Collation,
    OnUpdate,
    Generated,
    Comment,
}

impl fmt::Display for ColumnAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnAttribute::Type => "type",
            ColumnAttribute::Nullability => "nullability",
            ColumnAttribute::Default => "default",
            ColumnAttribute::AutoIncrement => "auto_increment",
            ColumnAttribute::Charset => "charset",
            ColumnAttribute::Collation => "collation",
            ColumnAttribute::OnUpdate => "on update",
            ColumnAttribute::Generated => "generated",
            ColumnAttribute::Comment => "comment",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnDelta {
    Added {
        column: Column,
        placement: Placement,
    },
    Removed {
        column: Column,
    },
    Changed {
        old: Column,
        new: Column,
        attributes: Vec<ColumnAttribute>,
    },
    /// The column moved relative to the other columns present on both sides
    Reordered {
        column: Column,
        old_position: usize,
        new_position: usize,
        placement: Placement,
    },
}

impl ColumnDelta {
    pub fn column_name(&self) -> &str {
        match self {
            ColumnDelta::Added { column, .. }
            | ColumnDelta::Removed { column }
            | ColumnDelta::Reordered { column, .. } => &column.name,
            ColumnDelta::Changed { new, .. } => &new.name,
        }
    }
}

impl fmt::Display for ColumnDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnDelta::Added { column, placement } => {
                write!(f, "+ column {}: {} {}", column.name, column.data_type, placement)
            }
            ColumnDelta::Removed { column } => write!(f, "- column {}", column.name),
            ColumnDelta::Changed { new, attributes, .. } => {
                let labels: Vec<String> = attributes.iter().map(|a| a.to_string()).collect();
                write!(f, "~ column {}: {}", new.name, labels.join(", "))
            }
            ColumnDelta::Reordered {
                column,
                old_position,
                new_position,
                ..
            } => write!(
                f,
                "~ column {}: position {} -> {}",
                column.name, old_position, new_position
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexDelta {
    Added(Index),
    Removed(Index),
    /// Same name, different definition
    Changed { old: Index, new: Index },
}

impl IndexDelta {
    pub fn key(&self) -> IndexKey {
        match self {
            IndexDelta::Added(index) | IndexDelta::Removed(index) => index.key(),
            IndexDelta::Changed { new, .. } => new.key(),
        }
    }
}

impl fmt::Display for IndexDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexDelta::Added(index) => write!(f, "+ {} {}", index.kind, index.name),
            IndexDelta::Removed(index) => write!(f, "- {} {}", index.kind, index.name),
            IndexDelta::Changed { new, .. } => write!(f, "~ {} {}", new.kind, new.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerDelta {
    Added(Trigger),
    Removed(Trigger),
    Changed { old: Trigger, new: Trigger },
}

impl fmt::Display for TriggerDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerDelta::Added(trigger) => write!(f, "+ trigger {}", trigger.name),
            TriggerDelta::Removed(trigger) => write!(f, "- trigger {}", trigger.name),
            TriggerDelta::Changed { new, .. } => write!(f, "~ trigger {}", new.name),
        }
    }
}

/// A table option that was added, removed or given a new value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDelta {
    pub name: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl fmt::Display for OptionDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let old = self.old.as_deref().unwrap_or("(none)");
        let new = self.new.as_deref().unwrap_or("(none)");
        write!(f, "~ option {}: {} -> {}", self.name, old, new)
    }
}

/// Every difference found in a table present on both sides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableChange {
    pub table: String,
    pub columns: Vec<ColumnDelta>,
    pub indexes: Vec<IndexDelta>,
    pub triggers: Vec<TriggerDelta>,
    pub options: Vec<OptionDelta>,
    /// Columns flagged `AUTO_INCREMENT` on either side. Not a delta: MySQL
    /// requires such a column to lead a key, which constrains rendering.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auto_increment_columns: Vec<String>,
}

impl TableChange {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
            && self.indexes.is_empty()
            && self.triggers.is_empty()
            && self.options.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.columns.len() + self.indexes.len() + self.triggers.len() + self.options.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeltaRecord {
    TableAdded(Table),
    TableRemoved(Table),
    TableChanged(TableChange),
}

impl DeltaRecord {
    pub fn table_name(&self) -> &str {
        match self {
            DeltaRecord::TableAdded(table) | DeltaRecord::TableRemoved(table) => &table.name,
            DeltaRecord::TableChanged(change) => &change.table,
        }
    }
}

impl fmt::Display for DeltaRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeltaRecord::TableAdded(table) => write!(f, "+ table {}", table.name),
            DeltaRecord::TableRemoved(table) => write!(f, "- table {}", table.name),
            DeltaRecord::TableChanged(change) => {
                write!(f, "~ table {}", change.table)?;
                for delta in &change.columns {
                    write!(f, "\n  {}", delta)?;
                }
                for delta in &change.indexes {
                    write!(f, "\n  {}", delta)?;
                }
                for delta in &change.triggers {
                    write!(f, "\n  {}", delta)?;
                }
                for delta in &change.options {
                    write!(f, "\n  {}", delta)?;
                }
                Ok(())
            }
        }
    }
}

/// Represents the changes that turn one schema into another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDiff {
    pub old_schema: String,
    pub new_schema: String,
    pub deltas: Vec<DeltaRecord>,
}

impl SchemaDiff {
    /// Generate a schema diff between two schemas
    pub fn generate(old: &Schema, new: &Schema, options: &DiffOptions) -> Result<Self> {
        old.validate()?;
        new.validate()?;

        let filter = options.table_filter.as_ref();
        let names: BTreeSet<&String> = old
            .tables
            .keys()
            .chain(new.tables.keys())
            .filter(|name| passes(filter, name))
            .collect();

        let mut existence = Vec::new();
        let mut changed = Vec::new();

        for name in names {
            match (old.tables.get(name), new.tables.get(name)) {
                (Some(table), None) if !options.only_common_tables => {
                    existence.push(DeltaRecord::TableRemoved(prepare(table, options)));
                }
                (None, Some(table)) if !options.only_common_tables => {
                    existence.push(DeltaRecord::TableAdded(prepare(table, options)));
                }
                (Some(old_table), Some(new_table)) => {
                    let change = diff_table(
                        &prepare(old_table, options),
                        &prepare(new_table, options),
                        &options.tolerance,
                    );
                    if !change.is_empty() {
                        trace!(table = %name, changes = change.change_count(), "Table changed");
                        changed.push(DeltaRecord::TableChanged(change));
                    }
                }
                _ => {}
            }
        }

        existence.extend(changed);
        let diff = Self {
            old_schema: old.name.clone(),
            new_schema: new.name.clone(),
            deltas: existence,
        };

        debug!(
            old = %diff.old_schema,
            new = %diff.new_schema,
            tables = diff.deltas.len(),
            changes = diff.change_count(),
            "Generated schema diff"
        );
        Ok(diff)
    }

    /// Check if the diff is empty (no changes needed)
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Number of leaf deltas; an added or removed table counts once
    pub fn change_count(&self) -> usize {
        self.deltas
            .iter()
            .map(|delta| match delta {
                DeltaRecord::TableChanged(change) => change.change_count(),
                _ => 1,
            })
            .sum()
    }

    /// Names of every table with at least one delta, sorted
    pub fn touched_tables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.deltas.iter().map(|d| d.table_name()).collect();
        names.sort_unstable();
        names
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for SchemaDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for delta in &self.deltas {
            writeln!(f, "{}", delta)?;
        }
        Ok(())
    }
}

fn prepare(table: &Table, options: &DiffOptions) -> Table {
    let mut table = table.clone();
    if options.skip_triggers {
        table.triggers.clear();
    }
    table
}

/// Compare two versions of the same table
pub(crate) fn diff_table(old: &Table, new: &Table, policy: &TolerancePolicy) -> TableChange {
    let old_normalized = policy.normalize_table(old);
    let new_normalized = policy.normalize_table(new);

    TableChange {
        table: new.name.clone(),
        columns: diff_columns(old, new, &old_normalized, &new_normalized),
        indexes: diff_indexes(old, new, &old_normalized, &new_normalized),
        triggers: diff_triggers(old, new),
        options: diff_options(old, new, &old_normalized, &new_normalized),
        auto_increment_columns: old
            .columns
            .iter()
            .chain(&new.columns)
            .filter(|c| c.auto_increment)
            .map(|c| c.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect(),
    }
}

fn diff_columns(
    old: &Table,
    new: &Table,
    old_normalized: &Table,
    new_normalized: &Table,
) -> Vec<ColumnDelta> {
    let old_by_name: HashMap<&str, usize> = old
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| (c.name.as_str(), i))
        .collect();

    // Relative order of the columns present on both sides
    let old_common: Vec<&str> = old
        .columns
        .iter()
        .map(|c| c.name.as_str())
        .filter(|name| new.column(name).is_some())
        .collect();
    let mut common_index = 0;

    let mut deltas = Vec::new();
    for (position, column) in new.columns.iter().enumerate() {
        let Some(&old_position) = old_by_name.get(column.name.as_str()) else {
            deltas.push(ColumnDelta::Added {
                column: column.clone(),
                placement: Placement::of(&new.columns, position),
            });
            continue;
        };

        let attributes = changed_attributes(
            &old_normalized.columns[old_position],
            &new_normalized.columns[position],
        );
        if !attributes.is_empty() {
            deltas.push(ColumnDelta::Changed {
                old: old.columns[old_position].clone(),
                new: column.clone(),
                attributes,
            });
        }

        if old_common.get(common_index) != Some(&column.name.as_str()) {
            deltas.push(ColumnDelta::Reordered {
                column: column.clone(),
                old_position,
                new_position: position,
                placement: Placement::of(&new.columns, position),
            });
        }
        common_index += 1;
    }

    deltas.extend(
        old.columns
            .iter()
            .filter(|c| new.column(&c.name).is_none())
            .map(|c| ColumnDelta::Removed { column: c.clone() }),
    );
    deltas
}

fn changed_attributes(old: &Column, new: &Column) -> Vec<ColumnAttribute> {
    let checks = [
        (old.data_type != new.data_type, ColumnAttribute::Type),
        (old.nullable != new.nullable, ColumnAttribute::Nullability),
        (old.default != new.default, ColumnAttribute::Default),
        (old.auto_increment != new.auto_increment, ColumnAttribute::AutoIncrement),
        (old.charset != new.charset, ColumnAttribute::Charset),
        (old.collation != new.collation, ColumnAttribute::Collation),
        (old.on_update != new.on_update, ColumnAttribute::OnUpdate),
        (old.generated != new.generated, ColumnAttribute::Generated),
        (old.comment != new.comment, ColumnAttribute::Comment),
    ];
    checks
        .into_iter()
        .filter_map(|(differs, attribute)| differs.then_some(attribute))
        .collect()
}

fn diff_indexes(
    old: &Table,
    new: &Table,
    old_normalized: &Table,
    new_normalized: &Table,
) -> Vec<IndexDelta> {
    let keys: BTreeSet<IndexKey> = old
        .indexes
        .iter()
        .chain(new.indexes.iter())
        .map(Index::key)
        .collect();

    keys.into_iter()
        .filter_map(|key| {
            match (old.index(&key), new.index(&key)) {
                (Some(index), None) => Some(IndexDelta::Removed(index.clone())),
                (None, Some(index)) => Some(IndexDelta::Added(index.clone())),
                (Some(old_index), Some(new_index)) => {
                    (old_normalized.index(&key) != new_normalized.index(&key)).then(|| {
                        IndexDelta::Changed {
                            old: old_index.clone(),
                            new: new_index.clone(),
                        }
                    })
                }
                (None, None) => None,
            }
        })
        .collect()
}

fn diff_triggers(old: &Table, new: &Table) -> Vec<TriggerDelta> {
    let names: BTreeSet<&str> = old
        .triggers
        .iter()
        .chain(new.triggers.iter())
        .map(|t| t.name.as_str())
        .collect();

    let find = |table: &Table, name: &str| -> Option<Trigger> {
        table.triggers.iter().find(|t| t.name == name).cloned()
    };

    names
        .into_iter()
        .filter_map(|name| match (find(old, name), find(new, name)) {
            (Some(trigger), None) => Some(TriggerDelta::Removed(trigger)),
            (None, Some(trigger)) => Some(TriggerDelta::Added(trigger)),
            (Some(old_trigger), Some(new_trigger)) if old_trigger != new_trigger => {
                Some(TriggerDelta::Changed {
                    old: old_trigger,
                    new: new_trigger,
                })
            }
            _ => None,
        })
        .collect()
}

fn diff_options(
    old: &Table,
    new: &Table,
    old_normalized: &Table,
    new_normalized: &Table,
) -> Vec<OptionDelta> {
    let names: BTreeSet<&String> = old.options.keys().chain(new.options.keys()).collect();

    names
        .into_iter()
        .filter(|name| old_normalized.options.get(*name) != new_normalized.options.get(*name))
        .map(|name| OptionDelta {
            name: name.clone(),
            old: old.options.get(name).cloned(),
            new: new.options.get(name).cloned(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{DefaultValue, IndexKind, SourceKind, TriggerEvent, TriggerTiming};

    fn schema(name: &str, tables: Vec<Table>) -> Schema {
        tables
            .into_iter()
            .fold(Schema::new(name, SourceKind::Unspecified), Schema::with_table)
    }

    fn table(name: &str, columns: &[&str]) -> Table {
        columns
            .iter()
            .fold(Table::new(name), |t, c| t.with_column(Column::new(c, "int")))
    }

    fn changes(diff: &SchemaDiff) -> &TableChange {
        match &diff.deltas[0] {
            DeltaRecord::TableChanged(change) => change,
            other => panic!("expected a table change, got {other}"),
        }
    }

    #[test]
    fn test_identical_schemas_produce_empty_diff() {
        let a = schema("a", vec![table("users", &["id", "name"])]);
        let diff = SchemaDiff::generate(&a, &a, &DiffOptions::default()).unwrap();
        assert!(diff.is_empty());
        assert_eq!(diff.change_count(), 0);
    }

    #[test]
    fn test_table_existence_deltas_sorted() {
        let old = schema("old", vec![table("b", &["id"]), table("d", &["id"])]);
        let new = schema("new", vec![table("a", &["id"]), table("c", &["id"])]);
        let diff = SchemaDiff::generate(&old, &new, &DiffOptions::default()).unwrap();

        let summary: Vec<String> = diff.deltas.iter().map(|d| d.to_string()).collect();
        assert_eq!(summary, vec!["+ table a", "- table b", "+ table c", "- table d"]);
        assert_eq!(diff.touched_tables(), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_only_common_tables() {
        let old = schema("old", vec![table("b", &["id"])]);
        let new = schema("new", vec![table("a", &["id"])]);
        let options = DiffOptions {
            only_common_tables: true,
            ..Default::default()
        };
        assert!(SchemaDiff::generate(&old, &new, &options).unwrap().is_empty());
    }

    #[test]
    fn test_column_add_remove_change() {
        let old = schema(
            "old",
            vec![table("t", &["id", "legacy"]).with_column(Column::new("name", "varchar(10)"))],
        );
        let new = schema(
            "new",
            vec![table("t", &["id"])
                .with_column(Column::new("name", "varchar(20)").nullable(false))
                .with_column(Column::new("email", "varchar(255)"))],
        );
        let diff = SchemaDiff::generate(&old, &new, &DiffOptions::default()).unwrap();
        let change = changes(&diff);

        assert_eq!(change.columns.len(), 3);
        match &change.columns[0] {
            ColumnDelta::Changed { attributes, .. } => assert_eq!(
                attributes,
                &vec![ColumnAttribute::Type, ColumnAttribute::Nullability]
            ),
            other => panic!("unexpected delta {other}"),
        }
        assert_eq!(
            change.columns[1],
            ColumnDelta::Added {
                column: new.tables["t"].columns[2].clone(),
                placement: Placement::After("name".to_string()),
            }
        );
        assert!(matches!(&change.columns[2], ColumnDelta::Removed { column } if column.name == "legacy"));
    }

    #[test]
    fn test_reorder_marks_moved_columns() {
        let old = schema("old", vec![table("t", &["a", "b", "c"])]);
        let new = schema("new", vec![table("t", &["a", "c", "b"])]);
        let diff = SchemaDiff::generate(&old, &new, &DiffOptions::default()).unwrap();
        let change = changes(&diff);

        let moved: Vec<(&str, &Placement)> = change
            .columns
            .iter()
            .map(|d| match d {
                ColumnDelta::Reordered { column, placement, .. } => (column.name.as_str(), placement),
                other => panic!("unexpected delta {other}"),
            })
            .collect();
        assert_eq!(
            moved,
            vec![
                ("c", &Placement::After("a".to_string())),
                ("b", &Placement::After("c".to_string())),
            ]
        );
    }

    #[test]
    fn test_removed_column_does_not_count_as_reorder() {
        let old = schema("old", vec![table("t", &["a", "x", "b"])]);
        let new = schema("new", vec![table("t", &["a", "b"])]);
        let diff = SchemaDiff::generate(&old, &new, &DiffOptions::default()).unwrap();
        let change = changes(&diff);
        assert_eq!(change.columns.len(), 1);
        assert!(matches!(change.columns[0], ColumnDelta::Removed { .. }));
    }

    #[test]
    fn test_index_changes_matched_by_name_and_namespace() {
        let base = table("t", &["id", "owner_id"]).with_index(Index::primary(&["id"]));
        let old = schema(
            "old",
            vec![base
                .clone()
                .with_index(Index::new("fk_owner", IndexKind::Index, &["owner_id"]))
                .with_index(Index::new("idx_old", IndexKind::Index, &["owner_id"]))],
        );
        let new = schema(
            "new",
            vec![base
                .with_index(Index::new("fk_owner", IndexKind::Index, &["owner_id"]))
                .with_index(Index::foreign("fk_owner", &["owner_id"], "owners", &["id"]))
                .with_index(Index::new("idx_old", IndexKind::Unique, &["owner_id"]))],
        );
        let diff = SchemaDiff::generate(&old, &new, &DiffOptions::default()).unwrap();
        let summary: Vec<String> = changes(&diff).indexes.iter().map(|d| d.to_string()).collect();
        assert_eq!(summary, vec!["+ foreign key fk_owner", "~ unique key idx_old"]);
    }

    #[test]
    fn test_tolerance_hides_default_and_option_changes() {
        let old = schema(
            "old",
            vec![Table::new("t")
                .with_column(Column::new("n", "INT(11)").default(DefaultValue::Value("'0'".into())))
                .with_option("AUTO_INCREMENT", "5")],
        );
        let new = schema(
            "new",
            vec![Table::new("t")
                .with_column(Column::new("n", "int").default(DefaultValue::Value("1".into())))
                .with_option("AUTO_INCREMENT", "90")],
        );

        let strict = SchemaDiff::generate(&old, &new, &DiffOptions::default()).unwrap();
        assert_eq!(strict.change_count(), 2);

        let options = DiffOptions {
            tolerance: TolerancePolicy::tolerant(),
            ..Default::default()
        };
        assert!(SchemaDiff::generate(&old, &new, &options).unwrap().is_empty());
    }

    #[test]
    fn test_changed_record_keeps_original_values() {
        let old = schema("old", vec![Table::new("t").with_column(Column::new("n", "INT(11)"))]);
        let new = schema(
            "new",
            vec![Table::new("t").with_column(Column::new("n", "INT(11)").nullable(false))],
        );
        let options = DiffOptions {
            tolerance: TolerancePolicy {
                ignore_formatting: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let diff = SchemaDiff::generate(&old, &new, &options).unwrap();
        match &changes(&diff).columns[0] {
            ColumnDelta::Changed { new, .. } => assert_eq!(new.data_type, "INT(11)"),
            other => panic!("unexpected delta {other}"),
        }
    }

    #[test]
    fn test_triggers_and_skip_triggers() {
        let trigger = |body: &str| Trigger {
            name: "t_bi".to_string(),
            table: "t".to_string(),
            timing: TriggerTiming::Before,
            event: TriggerEvent::Insert,
            body: body.to_string(),
        };
        let old = schema("old", vec![table("t", &["id"]).with_trigger(trigger("SET @a = 1"))]);
        let new = schema("new", vec![table("t", &["id"]).with_trigger(trigger("SET @a = 2"))]);

        let diff = SchemaDiff::generate(&old, &new, &DiffOptions::default()).unwrap();
        assert!(matches!(changes(&diff).triggers[0], TriggerDelta::Changed { .. }));

        let options = DiffOptions {
            skip_triggers: true,
            ..Default::default()
        };
        assert!(SchemaDiff::generate(&old, &new, &options).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_model_is_rejected() {
        let mut broken = table("t", &["id"]);
        broken.columns[0].position = 3;
        let a = schema("a", vec![broken]);
        let b = schema("b", vec![]);
        assert!(matches!(
            SchemaDiff::generate(&a, &b, &DiffOptions::default()),
            Err(crate::error::Error::ModelInvariantViolation { .. })
        ));
    }
}
