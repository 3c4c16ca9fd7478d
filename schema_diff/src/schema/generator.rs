//! Migration generator
//!
//! This module turns a [`SchemaDiff`] into an ordered list of migration
//! statements. Statements are emitted in phases so that every statement only
//! depends on objects created by earlier ones:
//!
//! 1. foreign key and trigger drops on changed tables
//! 2. `CREATE TABLE` for new tables, referenced tables first
//! 3. per changed table: index drops, column adds and modifies, column
//!    drops, index adds, table options
//! 4. foreign key adds and trigger creation
//! 5. `DROP TABLE` for removed tables, referencing tables first

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::schema::ddl;
use crate::schema::diff::{
    ColumnDelta, DeltaRecord, IndexDelta, OptionDelta, Placement, SchemaDiff, TableChange,
    TriggerDelta,
};
use crate::schema::types::{Column, Index, IndexKey, IndexKind, Table, Trigger};
use crate::utils::naming::{passes, quote_identifier, NameFilter};

/// How the delta is rendered
#[derive(Debug, Clone)]
pub struct OutputPolicy {
    /// Emit a comment instead of `DROP TABLE`
    pub suppress_drop_tables: bool,
    /// Emit a comment instead of `DROP COLUMN`, and for indexes and foreign
    /// keys that only exist on the old side
    pub suppress_drop_columns: bool,
    /// Leave out the `-- was:` comments
    pub suppress_old_definitions: bool,
    pub table_filter: Option<NameFilter>,
    /// Report touched table names instead of statements
    pub list_only: bool,
    pub include_header: bool,
}

impl Default for OutputPolicy {
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

/// One migration statement, stored without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Comment(String),
    Ddl(String),
    /// Trigger definitions need a different delimiter in scripts
    Trigger(String),
}

impl Statement {
    pub fn is_comment(&self) -> bool {
        matches!(self, Statement::Comment(_))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Comment(text) => {
                let lines: Vec<String> = text.lines().map(|line| format!("-- {}", line)).collect();
                f.write_str(&lines.join("\n"))
            }
            Statement::Ddl(sql) => write!(f, "{};", sql),
            Statement::Trigger(sql) => f.write_str(sql),
        }
    }
}

/// An ordered migration script
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Migration {
    pub statements: Vec<Statement>,
}

impl Migration {
    /// Statements that change the schema, ignoring comments
    pub fn executable(&self) -> impl Iterator<Item = &Statement> {
        self.statements.iter().filter(|s| !s.is_comment())
    }

    pub fn is_empty(&self) -> bool {
        self.executable().next().is_none()
    }

    /// Each statement rendered on its own, comments included
    pub fn lines(&self) -> Vec<String> {
        self.statements.iter().map(|s| s.to_string()).collect()
    }

    /// Render as a script that can be fed to the `mysql` client
    pub fn to_script(&self) -> String {
        let mut out = Vec::new();
        let mut in_trigger_block = false;

        for statement in &self.statements {
            match statement {
                Statement::Trigger(sql) => {
                    if !in_trigger_block {
                        out.push("DELIMITER ;;".to_string());
                        in_trigger_block = true;
                    }
                    out.push(format!("{};;", sql));
                }
                other => {
                    if in_trigger_block {
                        out.push("DELIMITER ;".to_string());
                        in_trigger_block = false;
                    }
                    out.push(other.to_string());
                }
            }
        }
        if in_trigger_block {
            out.push("DELIMITER ;".to_string());
        }

        let mut script = out.join("\n");
        if !script.is_empty() {
            script.push('\n');
        }
        script
    }
}

/// Result of rendering a diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutput {
    Statements(Migration),
    /// Sorted names of the touched tables
    TableList(Vec<String>),
}

impl MigrationOutput {
    pub fn to_script(&self) -> String {
        match self {
            MigrationOutput::Statements(migration) => migration.to_script(),
            MigrationOutput::TableList(tables) => tables
                .iter()
                .map(|name| format!("{}\n", name))
                .collect(),
        }
    }
}

/// Migration SQL generator
pub struct MigrationGenerator<'a> {
    policy: &'a OutputPolicy,
}

impl<'a> MigrationGenerator<'a> {
    /// Create a new migration generator
    pub fn new(policy: &'a OutputPolicy) -> Self {
        Self { policy }
    }

    /// Render a schema diff
    pub fn generate(&self, diff: &SchemaDiff) -> Result<MigrationOutput> {
        let filter = self.policy.table_filter.as_ref();
        let deltas: Vec<&DeltaRecord> = diff
            .deltas
            .iter()
            .filter(|delta| passes(filter, delta.table_name()))
            .collect();

        if self.policy.list_only {
            let tables: BTreeSet<String> =
                deltas.iter().map(|d| d.table_name().to_string()).collect();
            return Ok(MigrationOutput::TableList(tables.into_iter().collect()));
        }

        let mut added = Vec::new();
        let mut removed = Vec::new();
        let mut changed = Vec::new();
        for delta in deltas {
            match delta {
                DeltaRecord::TableAdded(table) => added.push(table),
                DeltaRecord::TableRemoved(table) => removed.push(table),
                DeltaRecord::TableChanged(change) => changed.push(change),
            }
        }

        let mut out = Vec::new();
        if self.policy.include_header {
            out.push(Statement::Comment(format!(
                "schema_diff: {} -> {}",
                diff.old_schema, diff.new_schema
            )));
        }

        for change in &changed {
            self.drop_constraints(change, &mut out);
        }

        let changed_names: HashSet<&str> = changed.iter().map(|c| c.table.as_str()).collect();
        let deferred = self.create_tables(&added, &changed_names, &mut out);

        for change in &changed {
            self.alter_table(change, &mut out);
        }

        for change in &changed {
            for delta in &change.indexes {
                match delta {
                    IndexDelta::Added(index) | IndexDelta::Changed { new: index, .. }
                        if index.kind == IndexKind::Foreign =>
                    {
                        out.push(alter(&change.table, &ddl::add_index_clause(index)));
                    }
                    _ => {}
                }
            }
        }
        for (table, index) in &deferred {
            out.push(alter(table, &ddl::add_index_clause(index)));
        }

        for change in &changed {
            for delta in &change.triggers {
                match delta {
                    TriggerDelta::Added(trigger) | TriggerDelta::Changed { new: trigger, .. } => {
                        out.push(create_trigger(trigger)?);
                    }
                    TriggerDelta::Removed(_) => {}
                }
            }
        }
        for table in &added {
            for trigger in &table.triggers {
                out.push(create_trigger(trigger)?);
            }
        }

        self.drop_tables(&removed, &mut out);

        let migration = Migration { statements: out };
        debug!(
            statements = migration.executable().count(),
            created = added.len(),
            dropped = removed.len(),
            altered = changed.len(),
            "Generated migration"
        );
        Ok(MigrationOutput::Statements(migration))
    }

    fn was(&self, definition: &str, out: &mut Vec<Statement>) {
        if !self.policy.suppress_old_definitions {
            out.push(Statement::Comment(format!("was: {}", definition)));
        }
    }

    /// Phase 1: foreign keys and triggers that go away or get redefined
    fn drop_constraints(&self, change: &TableChange, out: &mut Vec<Statement>) {
        for delta in &change.indexes {
            match delta {
                IndexDelta::Removed(index) if index.kind == IndexKind::Foreign => {
                    self.drop_removed_index(&change.table, index, out);
                }
                IndexDelta::Changed { old, .. } if old.kind == IndexKind::Foreign => {
                    self.was(&ddl::index_definition(old), out);
                    out.push(alter(&change.table, &ddl::drop_index_clause(old)));
                }
                _ => {}
            }
        }

        for delta in &change.triggers {
            match delta {
                TriggerDelta::Removed(trigger) | TriggerDelta::Changed { old: trigger, .. } => {
                    self.was(&ddl::create_trigger(trigger), out);
                    out.push(Statement::Ddl(format!(
                        "DROP TRIGGER IF EXISTS {}",
                        quote_identifier(&trigger.name)
                    )));
                }
                TriggerDelta::Added(_) => {}
            }
        }
    }

    fn drop_removed_index(&self, table: &str, index: &Index, out: &mut Vec<Statement>) {
        if self.policy.suppress_drop_columns {
            trace!(table, index = %index.name, "Suppressed index drop");
            out.push(Statement::Comment(format!(
                "skipped: ALTER TABLE {} {}",
                quote_identifier(table),
                ddl::drop_index_clause(index)
            )));
        } else {
            self.was(&ddl::index_definition(index), out);
            out.push(alter(table, &ddl::drop_index_clause(index)));
        }
    }

    /// Phase 2. Returns the foreign keys held back until every table exists.
    fn create_tables<'t>(
        &self,
        added: &[&'t Table],
        changed: &HashSet<&str>,
        out: &mut Vec<Statement>,
    ) -> Vec<(&'t str, &'t Index)> {
        let added_names: HashSet<&str> = added.iter().map(|t| t.name.as_str()).collect();
        let (order, _) = dependency_order(added, |table| table.referenced_tables());

        let mut created: HashSet<&str> = HashSet::new();
        let mut deferred = Vec::new();

        for table in order {
            let held_back: HashSet<IndexKey> = table
                .foreign_keys()
                .filter(|fk| {
                    fk.reference.as_ref().is_some_and(|r| {
                        let target = r.table.as_str();
                        // a changed table may only get the referenced key in phase 3
                        target != table.name
                            && ((added_names.contains(target) && !created.contains(target))
                                || changed.contains(target))
                    })
                })
                .map(Index::key)
                .collect();

            out.push(Statement::Ddl(ddl::create_table(table, &held_back)));
            deferred.extend(
                table
                    .foreign_keys()
                    .filter(|fk| held_back.contains(&fk.key()))
                    .map(|fk| (table.name.as_str(), fk)),
            );
            created.insert(table.name.as_str());
        }

        deferred
    }

    /// Phase 3 for one table
    fn alter_table(&self, change: &TableChange, out: &mut Vec<Statement>) {
        let table = change.table.as_str();
        let binding = KeyBinding::new(change);

        for (position, delta) in change.indexes.iter().enumerate() {
            if binding.is_bound(position) {
                continue;
            }
            match delta {
                IndexDelta::Removed(index) if index.kind != IndexKind::Foreign => {
                    self.drop_removed_index(table, index, out);
                }
                IndexDelta::Changed { old, .. } if old.kind != IndexKind::Foreign => {
                    self.was(&ddl::index_definition(old), out);
                    out.push(alter(table, &ddl::drop_index_clause(old)));
                }
                _ => {}
            }
        }

        for step in column_steps(&change.columns) {
            match step {
                ColumnStep::Add(column, placement) => {
                    let mut clauses = vec![format!(
                        "ADD COLUMN {} {}",
                        ddl::column_definition(column),
                        placement
                    )];
                    clauses.extend(self.key_clauses(&binding, table, &column.name, out));
                    out.push(alter(table, &clauses.join(", ")));
                }
                ColumnStep::Modify {
                    old,
                    new,
                    placement,
                } => {
                    if let Some(old) = old {
                        self.was(&ddl::column_definition(old), out);
                    }
                    let mut clause = format!("MODIFY COLUMN {}", ddl::column_definition(new));
                    if let Some(placement) = placement {
                        clause.push_str(&format!(" {}", placement));
                    }
                    let mut clauses = vec![clause];
                    if old.is_some() {
                        clauses.extend(self.key_clauses(&binding, table, &new.name, out));
                    }
                    out.push(alter(table, &clauses.join(", ")));
                }
            }
        }

        for delta in &change.columns {
            if let ColumnDelta::Removed { column } = delta {
                let mut clauses = vec![format!("DROP COLUMN {}", quote_identifier(&column.name))];
                if self.policy.suppress_drop_columns {
                    trace!(table, column = %column.name, "Suppressed column drop");
                    clauses.extend(
                        binding
                            .attached_to(&column.name)
                            .into_iter()
                            .flat_map(key_delta_clauses),
                    );
                    out.push(Statement::Comment(format!(
                        "skipped: ALTER TABLE {} {}",
                        quote_identifier(table),
                        clauses.join(", ")
                    )));
                } else {
                    self.was(&ddl::column_definition(column), out);
                    clauses.extend(self.key_clauses(&binding, table, &column.name, out));
                    out.push(alter(table, &clauses.join(", ")));
                }
            }
        }

        for (position, delta) in change.indexes.iter().enumerate() {
            match delta {
                IndexDelta::Changed { old, new } if binding.is_swapped(position) => {
                    self.was(&ddl::index_definition(old), out);
                    out.push(alter(table, &key_delta_clauses(delta).join(", ")));
                    trace!(table, index = %new.name, "Key swapped in one statement");
                }
                _ if binding.is_bound(position) => {}
                IndexDelta::Added(index) | IndexDelta::Changed { new: index, .. }
                    if index.kind != IndexKind::Foreign =>
                {
                    out.push(alter(table, &ddl::add_index_clause(index)));
                }
                _ => {}
            }
        }

        for option in &change.options {
            self.alter_option(table, option, out);
        }
    }

    /// Key clauses that ride along with the statement for `column`
    fn key_clauses(
        &self,
        binding: &KeyBinding,
        table: &str,
        column: &str,
        out: &mut Vec<Statement>,
    ) -> Vec<String> {
        let mut clauses = Vec::new();
        for delta in binding.attached_to(column) {
            match delta {
                IndexDelta::Removed(index) if self.policy.suppress_drop_columns => {
                    self.drop_removed_index(table, index, out);
                    continue;
                }
                IndexDelta::Removed(old) | IndexDelta::Changed { old, .. } => {
                    self.was(&ddl::index_definition(old), out);
                }
                IndexDelta::Added(_) => {}
            }
            clauses.extend(key_delta_clauses(delta));
        }
        clauses
    }

    fn alter_option(&self, table: &str, option: &OptionDelta, out: &mut Vec<Statement>) {
        if let Some(old) = &option.old {
            self.was(&ddl::table_option(&option.name, old), out);
        }

        let clause = match (&option.new, option.name.as_str()) {
            (Some(value), name) => ddl::table_option(name, value),
            (None, "COMMENT") => "COMMENT=''".to_string(),
            (None, "PARTITION BY") => "REMOVE PARTITIONING".to_string(),
            (None, name) => {
                out.push(Statement::Comment(format!(
                    "option {} removed from {}; no statement resets it",
                    name,
                    quote_identifier(table)
                )));
                return;
            }
        };
        out.push(alter(table, &clause));
    }

    /// Phase 5
    fn drop_tables(&self, removed: &[&Table], out: &mut Vec<Statement>) {
        // Drop a table only once nothing that is still around references it
        let (order, released) = dependency_order(removed, |table| {
            removed
                .iter()
                .filter(|other| other.referenced_tables().contains(&table.name.as_str()))
                .map(|other| other.name.as_str())
                .collect()
        });

        let mut cycle_fks = Vec::new();
        for name in &released {
            let Some(at) = order.iter().position(|t| t.name == *name) else {
                continue;
            };
            for later in &order[at + 1..] {
                cycle_fks.extend(
                    later
                        .foreign_keys()
                        .filter(|fk| fk.reference.as_ref().is_some_and(|r| r.table == *name))
                        .map(|fk| (later.name.as_str(), fk)),
                );
            }
        }

        if self.policy.suppress_drop_tables {
            for table in order {
                trace!(table = %table.name, "Suppressed table drop");
                out.push(Statement::Comment(format!(
                    "skipped: DROP TABLE {}",
                    quote_identifier(&table.name)
                )));
            }
            return;
        }

        for (table, fk) in cycle_fks {
            out.push(alter(table, &ddl::drop_index_clause(fk)));
        }
        for table in order {
            let deferred = HashSet::new();
            self.was(&ddl::create_table(table, &deferred), out);
            out.push(Statement::Ddl(format!(
                "DROP TABLE {}",
                quote_identifier(&table.name)
            )));
        }
    }
}

fn alter(table: &str, clause: &str) -> Statement {
    Statement::Ddl(format!("ALTER TABLE {} {}", quote_identifier(table), clause))
}

fn create_trigger(trigger: &Trigger) -> Result<Statement> {
    if trigger.body.contains(";;") {
        return Err(Error::MigrationError(format!(
            "trigger '{}' on '{}' contains ';;' and cannot be delimited",
            trigger.name, trigger.table
        )));
    }
    Ok(Statement::Trigger(ddl::create_trigger(trigger)))
}

/// Key deltas that must share an `ALTER TABLE` with a column statement.
///
/// MySQL rejects every intermediate state in which an `AUTO_INCREMENT` column
/// does not lead a key (error 1075), so a key added or removed together with
/// the flag travels with the column, and a changed key on such a column is
/// dropped and re-added in one statement.
struct KeyBinding<'d> {
    attached: HashMap<&'d str, Vec<&'d IndexDelta>>,
    swapped: HashSet<usize>,
    bound: HashSet<usize>,
}

impl<'d> KeyBinding<'d> {
    fn new(change: &'d TableChange) -> Self {
        let toggled: Vec<&str> = change
            .columns
            .iter()
            .filter_map(|delta| match delta {
                ColumnDelta::Added { column, .. } | ColumnDelta::Removed { column }
                    if column.auto_increment =>
                {
                    Some(column.name.as_str())
                }
                ColumnDelta::Changed { old, new, .. } if old.auto_increment != new.auto_increment => {
                    Some(new.name.as_str())
                }
                _ => None,
            })
            .collect();

        let mut binding = Self {
            attached: HashMap::new(),
            swapped: HashSet::new(),
            bound: HashSet::new(),
        };
        for (position, delta) in change.indexes.iter().enumerate() {
            if let Some(column) = toggled.iter().copied().find(|c| leads_with(delta, c)) {
                binding.attached.entry(column).or_default().push(delta);
            } else if matches!(delta, IndexDelta::Changed { .. })
                && change
                    .auto_increment_columns
                    .iter()
                    .any(|c| leads_with(delta, c))
            {
                binding.swapped.insert(position);
            } else {
                continue;
            }
            binding.bound.insert(position);
        }
        binding
    }

    fn attached_to(&self, column: &str) -> Vec<&'d IndexDelta> {
        self.attached.get(column).cloned().unwrap_or_default()
    }

    fn is_bound(&self, position: usize) -> bool {
        self.bound.contains(&position)
    }

    fn is_swapped(&self, position: usize) -> bool {
        self.swapped.contains(&position)
    }
}

/// Whether a non-foreign key on either side of `delta` starts with `column`
fn leads_with(delta: &IndexDelta, column: &str) -> bool {
    let sides = match delta {
        IndexDelta::Added(index) | IndexDelta::Removed(index) => [Some(index), None],
        IndexDelta::Changed { old, new } => [Some(old), Some(new)],
    };
    sides.into_iter().flatten().any(|index| {
        index.kind != IndexKind::Foreign
            && index.columns.first().is_some_and(|first| first.name == column)
    })
}

fn key_delta_clauses(delta: &IndexDelta) -> Vec<String> {
    match delta {
        IndexDelta::Added(index) => vec![ddl::add_index_clause(index)],
        IndexDelta::Removed(index) => vec![ddl::drop_index_clause(index)],
        IndexDelta::Changed { old, new } => {
            vec![ddl::drop_index_clause(old), ddl::add_index_clause(new)]
        }
    }
}

enum ColumnStep<'d> {
    Add(&'d Column, &'d Placement),
    /// Attribute change, move, or both in one statement
    Modify {
        old: Option<&'d Column>,
        new: &'d Column,
        placement: Option<&'d Placement>,
    },
}

/// Merge the column deltas of one table into one step per column, in new
/// declaration order
fn column_steps(deltas: &[ColumnDelta]) -> Vec<ColumnStep<'_>> {
    let mut steps: Vec<ColumnStep> = Vec::new();

    for delta in deltas {
        match delta {
            ColumnDelta::Added { column, placement } => {
                steps.push(ColumnStep::Add(column, placement));
            }
            ColumnDelta::Changed { old, new, .. } => {
                steps.push(ColumnStep::Modify {
                    old: Some(old),
                    new,
                    placement: None,
                });
            }
            ColumnDelta::Reordered {
                column, placement, ..
            } => {
                if let Some(ColumnStep::Modify {
                    new,
                    placement: slot,
                    ..
                }) = steps.last_mut()
                {
                    if new.name == column.name {
                        *slot = Some(placement);
                        continue;
                    }
                }
                steps.push(ColumnStep::Modify {
                    old: None,
                    new: column,
                    placement: Some(placement),
                });
            }
            ColumnDelta::Removed { .. } => {}
        }
    }

    steps
}

/// Order tables so that each comes after the tables `depends_on` names,
/// breaking ties alphabetically. When only cycles remain, the alphabetically
/// first pending table is released early; those tables are returned as well.
fn dependency_order<'t, F>(tables: &[&'t Table], depends_on: F) -> (Vec<&'t Table>, Vec<&'t str>)
where
    F: Fn(&'t Table) -> Vec<&'t str>,
{
    let names: HashSet<&str> = tables.iter().map(|t| t.name.as_str()).collect();
    let mut pending: BTreeMap<&str, (&Table, BTreeSet<&str>)> = tables
        .iter()
        .map(|table| {
            let deps = depends_on(*table)
                .into_iter()
                .filter(|d| names.contains(d) && *d != table.name)
                .collect();
            (table.name.as_str(), (*table, deps))
        })
        .collect();

    let mut done: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(tables.len());
    let mut released = Vec::new();

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .find(|(_, (_, deps))| deps.iter().all(|d| done.contains(d)))
            .map(|(name, _)| *name);

        let name = match ready {
            Some(name) => name,
            None => {
                let Some(first) = pending.keys().next().copied() else {
                    break;
                };
                released.push(first);
                first
            }
        };

        if let Some((table, _)) = pending.remove(name) {
            order.push(table);
            done.insert(name);
        }
    }

    (order, released)
}
