//! Delta application
//!
//! Replays a [`SchemaDiff`] against a model, producing the schema the
//! rendered migration would leave behind. Useful to preview a migration and
//! to check that a diff really closes the gap between two schemas.

use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::diff::{
    ColumnDelta, DeltaRecord, IndexDelta, Placement, SchemaDiff, TableChange, TriggerDelta,
};
use crate::schema::types::{Column, Schema, Table};

/// Apply every delta of `diff` to a copy of `schema`
pub fn apply(schema: &Schema, diff: &SchemaDiff) -> Result<Schema> {
    let mut result = schema.clone();

    for delta in &diff.deltas {
        match delta {
            DeltaRecord::TableAdded(table) => {
                if result.tables.contains_key(&table.name) {
                    return Err(missing(format!("table '{}' already exists", table.name)));
                }
                result.add_table(table.clone());
            }
            DeltaRecord::TableRemoved(table) => {
                result
                    .tables
                    .remove(&table.name)
                    .ok_or_else(|| missing(format!("cannot drop unknown table '{}'", table.name)))?;
            }
            DeltaRecord::TableChanged(change) => {
                let table = result.tables.get_mut(&change.table).ok_or_else(|| {
                    missing(format!("cannot alter unknown table '{}'", change.table))
                })?;
                apply_change(table, change)?;
            }
        }
    }

    result.validate()?;
    debug!(schema = %result.name, deltas = diff.deltas.len(), "Applied schema diff");
    Ok(result)
}

fn apply_change(table: &mut Table, change: &TableChange) -> Result<()> {
    for delta in &change.columns {
        match delta {
            ColumnDelta::Added { column, placement } => {
                if table.column(&column.name).is_some() {
                    return Err(missing(format!(
                        "column '{}' already exists in '{}'",
                        column.name, table.name
                    )));
                }
                place(table, column.clone(), placement)?;
            }
            ColumnDelta::Changed { new, .. } => {
                let at = column_index(table, &new.name)?;
                table.columns[at] = new.clone();
            }
            ColumnDelta::Reordered {
                column, placement, ..
            } => {
                let at = column_index(table, &column.name)?;
                let current = table.columns.remove(at);
                place(table, current, placement)?;
            }
            ColumnDelta::Removed { column } => {
                let at = column_index(table, &column.name)?;
                table.columns.remove(at);
            }
        }
    }
    table.renumber_columns();

    for delta in &change.indexes {
        let key = delta.key();
        let existing = table.indexes.iter().position(|i| i.key() == key);
        match (delta, existing) {
            (IndexDelta::Added(index), None) => table.indexes.push(index.clone()),
            (IndexDelta::Removed(_), Some(at)) => {
                table.indexes.remove(at);
            }
            (IndexDelta::Changed { new, .. }, Some(at)) => table.indexes[at] = new.clone(),
            (IndexDelta::Added(index), Some(_)) => {
                return Err(missing(format!(
                    "{} '{}' already exists in '{}'",
                    index.kind, index.name, table.name
                )));
            }
            (_, None) => {
                return Err(missing(format!(
                    "unknown index '{}' in '{}'",
                    key.name, table.name
                )));
            }
        }
    }

    for delta in &change.triggers {
        match delta {
            TriggerDelta::Added(trigger) => {
                if table.triggers.iter().any(|t| t.name == trigger.name) {
                    return Err(missing(format!("trigger '{}' already exists", trigger.name)));
                }
                table.triggers.push(trigger.clone());
            }
            TriggerDelta::Removed(trigger) | TriggerDelta::Changed { old: trigger, .. } => {
                let at = table
                    .triggers
                    .iter()
                    .position(|t| t.name == trigger.name)
                    .ok_or_else(|| missing(format!("unknown trigger '{}'", trigger.name)))?;
                match delta {
                    TriggerDelta::Changed { new, .. } => table.triggers[at] = new.clone(),
                    _ => {
                        table.triggers.remove(at);
                    }
                }
            }
        }
    }

    for option in &change.options {
        match &option.new {
            Some(value) => table.set_option(&option.name, value),
            None => {
                table.options.shift_remove(&option.name);
            }
        }
    }

    Ok(())
}

fn place(table: &mut Table, column: Column, placement: &Placement) -> Result<()> {
    let at = match placement {
        Placement::First => 0,
        Placement::After(predecessor) => column_index(table, predecessor)? + 1,
    };
    table.columns.insert(at, column);
    Ok(())
}

fn column_index(table: &Table, name: &str) -> Result<usize> {
    table
        .columns
        .iter()
        .position(|c| c.name == name)
        .ok_or_else(|| missing(format!("unknown column '{}' in '{}'", name, table.name)))
}

fn missing(reason: String) -> Error {
    Error::MigrationError(reason)
}
