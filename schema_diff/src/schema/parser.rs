//! Definition parser
//!
//! Turns canonical definition text (the output of `mysqldump --no-data`) into
//! a [`Schema`]. Parsing is fail-fast: the first malformed statement aborts
//! the whole schema. Constructs that are understood but not modeled are
//! either rejected or skipped with a warning, depending on [`ParserConfig`].

use std::collections::HashSet;

use tracing::{debug, trace, warn};

use crate::config::ParserConfig;
use crate::error::{Error, Result};
use crate::schema::lexer::{split_statements, tokenize, Cursor, RawStatement, TokenKind};
use crate::schema::types::{
    Column, DefaultValue, ForeignKeyRef, GeneratedColumn, Index, IndexColumn, IndexKey,
    IndexKind, Schema, SourceKind, Table, Trigger, TriggerEvent, TriggerTiming,
};

/// Why a statement (or part of one) was not turned into model values
enum Reject {
    Malformed(String),
    Unsupported(String),
}

impl From<String> for Reject {
    fn from(reason: String) -> Self {
        Reject::Malformed(reason)
    }
}

type Step<T> = std::result::Result<T, Reject>;

enum StatementKind {
    Table,
    Trigger,
    /// Dump boilerplate with no structural content
    Ignored,
    Unsupported(String),
    Unknown,
}

/// Parser for canonical definition text
#[derive(Debug, Clone, Default)]
pub struct DefinitionParser {
    skip_unsupported: bool,
}

impl DefinitionParser {
    pub fn new(config: &ParserConfig) -> Self {
        Self {
            skip_unsupported: config.skip_unsupported,
        }
    }

    /// Parse one schema's definition text
    pub fn parse(&self, name: &str, source_kind: SourceKind, text: &str) -> Result<Schema> {
        let statements = split_statements(text)?;
        let mut schema = Schema::new(name, source_kind);
        let mut triggers = Vec::new();

        for statement in &statements {
            let tokens = tokenize(&statement.text).map_err(|reason| malformed(statement, reason))?;
            let mut cursor = Cursor::new(&statement.text, &tokens);

            match classify(statement, &cursor) {
                StatementKind::Table => {
                    let parsed = self.parse_create_table(&mut cursor);
                    if let Some(table) = self.accept(statement, parsed)? {
                        table
                            .validate()
                            .map_err(|e| malformed(statement, e.to_string()))?;
                        if schema.tables.contains_key(&table.name) {
                            return Err(malformed(
                                statement,
                                format!("table '{}' is defined twice", table.name),
                            ));
                        }
                        trace!(table = %table.name, columns = table.columns.len(), "Parsed table");
                        schema.add_table(table);
                    }
                }
                StatementKind::Trigger => {
                    let parsed = self.parse_create_trigger(&mut cursor);
                    if let Some(trigger) = self.accept(statement, parsed)? {
                        triggers.push((trigger, statement));
                    }
                }
                StatementKind::Ignored => {
                    trace!(line = statement.line, "Skipping dump boilerplate");
                }
                StatementKind::Unsupported(construct) => {
                    self.accept::<()>(statement, Err(Reject::Unsupported(construct)))?;
                }
                StatementKind::Unknown => {
                    return Err(malformed(statement, "unrecognized statement"));
                }
            }
        }

        // Triggers follow their table in dumps, but nothing guarantees it.
        // Trigger names are scoped to the schema, not the table.
        let mut trigger_names = HashSet::new();
        for (trigger, statement) in triggers {
            if !trigger_names.insert(trigger.name.clone()) {
                return Err(malformed(
                    statement,
                    format!("trigger '{}' is defined twice", trigger.name),
                ));
            }
            let table = schema.tables.get_mut(&trigger.table).ok_or_else(|| {
                malformed(
                    statement,
                    format!("trigger '{}' refers to unknown table '{}'", trigger.name, trigger.table),
                )
            })?;
            table.add_trigger(trigger);
        }

        debug!(
            schema = %schema.name,
            tables = schema.tables.len(),
            statements = statements.len(),
            "Parsed schema definition"
        );
        Ok(schema)
    }

    fn accept<T>(&self, statement: &RawStatement, step: Step<T>) -> Result<Option<T>> {
        match step {
            Ok(value) => Ok(Some(value)),
            Err(Reject::Malformed(reason)) => Err(malformed(statement, reason)),
            Err(Reject::Unsupported(construct)) if self.skip_unsupported => {
                warn!(line = statement.line, construct = %construct, "Skipping unsupported statement");
                Ok(None)
            }
            Err(Reject::Unsupported(construct)) => Err(Error::UnsupportedConstruct {
                line: statement.line,
                construct,
                statement: statement.text.clone(),
            }),
        }
    }

    /// Element-level counterpart of [`DefinitionParser::accept`]: `Ok` means
    /// the caller drops the element and carries on.
    fn unsupported(&self, construct: &str) -> Step<()> {
        if self.skip_unsupported {
            warn!(construct, "Skipping unsupported table element");
            Ok(())
        } else {
            Err(Reject::Unsupported(construct.to_string()))
        }
    }

    fn parse_create_table(&self, c: &mut Cursor) -> Step<Table> {
        c.expect_keyword("CREATE")?;
        c.eat_keyword("TEMPORARY");
        c.expect_keyword("TABLE")?;
        c.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let name = c.identifier()?;

        if c.peek_keyword("LIKE") {
            return Err(Reject::Unsupported("CREATE TABLE ... LIKE".to_string()));
        }

        let body = c.group()?;
        let mut builder = TableBuilder::new(&name);

        for item in c.sub_cursor(body.inner).split_top_level(',') {
            if item.is_empty() {
                return Err(format!("empty element in definition of table '{}'", name).into());
            }
            let mut item_cursor = c.sub_cursor(item);
            self.parse_table_item(&mut item_cursor, &mut builder)?;
        }

        parse_table_options(c, &mut builder.table)?;
        Ok(builder.finish())
    }

    fn parse_table_item(&self, c: &mut Cursor, builder: &mut TableBuilder) -> Step<()> {
        if c.eat_keyword("CONSTRAINT") {
            let symbol = if ["PRIMARY", "UNIQUE", "FOREIGN", "CHECK"]
                .iter()
                .any(|k| c.peek_keyword(k))
            {
                None
            } else {
                Some(c.identifier()?)
            };

            if c.eat_keywords(&["PRIMARY", "KEY"]) {
                return self.parse_key(c, builder, IndexKind::Primary, None);
            }
            if c.eat_keyword("UNIQUE") {
                let _ = c.eat_keyword("KEY") || c.eat_keyword("INDEX");
                return self.parse_key(c, builder, IndexKind::Unique, symbol);
            }
            if c.eat_keywords(&["FOREIGN", "KEY"]) {
                return self.parse_foreign_key(c, builder, symbol);
            }
            if c.peek_keyword("CHECK") {
                c.rest();
                return self.unsupported("CHECK constraint");
            }
            return Err(format!("unexpected {} after CONSTRAINT", c.describe_next()).into());
        }

        if c.eat_keywords(&["PRIMARY", "KEY"]) {
            return self.parse_key(c, builder, IndexKind::Primary, None);
        }
        if c.eat_keyword("UNIQUE") {
            let _ = c.eat_keyword("KEY") || c.eat_keyword("INDEX");
            return self.parse_key(c, builder, IndexKind::Unique, None);
        }
        if c.eat_keyword("KEY") || c.eat_keyword("INDEX") {
            return self.parse_key(c, builder, IndexKind::Index, None);
        }
        if c.eat_keyword("FULLTEXT") {
            let _ = c.eat_keyword("KEY") || c.eat_keyword("INDEX");
            return self.parse_key(c, builder, IndexKind::Fulltext, None);
        }
        if c.peek_keyword("SPATIAL") {
            c.rest();
            return self.unsupported("SPATIAL index");
        }
        if c.eat_keywords(&["FOREIGN", "KEY"]) {
            return self.parse_foreign_key(c, builder, None);
        }
        if c.peek_keyword("CHECK") {
            c.rest();
            return self.unsupported("CHECK constraint");
        }

        self.parse_column(c, builder)
    }

    fn parse_key(
        &self,
        c: &mut Cursor,
        builder: &mut TableBuilder,
        kind: IndexKind,
        symbol: Option<String>,
    ) -> Step<()> {
        let mut name = symbol;
        if !c.peek_punct('(') && !c.peek_keyword("USING") {
            name = Some(c.identifier()?);
        }

        let mut options = Vec::new();
        if c.eat_keyword("USING") {
            options.push(format!("USING {}", c.word()?.to_ascii_uppercase()));
        }

        let Some(columns) = self.parse_key_columns(c)? else {
            return Ok(());
        };

        let trailing = collapse_whitespace(c.rest());
        if !trailing.is_empty() {
            options.push(trailing);
        }

        builder.pending.push(PendingIndex {
            name: if kind == IndexKind::Primary { None } else { name },
            index: Index {
                name: String::new(),
                kind,
                columns,
                options: if options.is_empty() { None } else { Some(options.join(" ")) },
                reference: None,
            },
        });
        Ok(())
    }

    /// `None` when the key was skipped as unsupported
    fn parse_key_columns(&self, c: &mut Cursor) -> Step<Option<Vec<IndexColumn>>> {
        let group = c.group()?;
        let mut columns = Vec::new();

        for part in c.sub_cursor(group.inner).split_top_level(',') {
            let mut pc = c.sub_cursor(part);
            if pc.is_at_end() {
                return Err("empty column in key definition".to_string().into());
            }
            if pc.peek_punct('(') {
                self.unsupported("functional key part")?;
                return Ok(None);
            }

            let mut column = IndexColumn::new(&pc.identifier()?);
            if pc.peek_punct('(') {
                let length = pc.group()?;
                let text = pc.sub_cursor(length.inner).term()?;
                column.length = Some(
                    text.parse::<u32>()
                        .map_err(|_| format!("invalid key prefix length '{}'", text))?,
                );
            }
            if pc.eat_keyword("DESC") {
                column.descending = true;
            } else {
                pc.eat_keyword("ASC");
            }
            if !pc.is_at_end() {
                return Err(format!("unexpected {} in key column list", pc.describe_next()).into());
            }
            columns.push(column);
        }

        Ok(Some(columns))
    }

    fn parse_foreign_key(
        &self,
        c: &mut Cursor,
        builder: &mut TableBuilder,
        symbol: Option<String>,
    ) -> Step<()> {
        let mut name = symbol;
        if !c.peek_punct('(') {
            let index_name = c.identifier()?;
            if name.is_none() {
                name = Some(index_name);
            }
        }

        let columns = identifier_list(c)?;
        c.expect_keyword("REFERENCES")?;
        let mut reference = ForeignKeyRef {
            table: c.identifier()?,
            columns: identifier_list(c)?,
            on_delete: None,
            on_update: None,
        };

        loop {
            if c.eat_keyword("MATCH") {
                c.word()?;
            } else if c.eat_keywords(&["ON", "DELETE"]) {
                reference.on_delete = Some(referential_action(c)?);
            } else if c.eat_keywords(&["ON", "UPDATE"]) {
                reference.on_update = Some(referential_action(c)?);
            } else {
                break;
            }
        }
        if !c.is_at_end() {
            return Err(format!("unexpected {} in foreign key", c.describe_next()).into());
        }

        builder.pending.push(PendingIndex {
            name,
            index: Index {
                name: String::new(),
                kind: IndexKind::Foreign,
                columns: columns.iter().map(|column| IndexColumn::new(column)).collect(),
                options: None,
                reference: Some(reference),
            },
        });
        Ok(())
    }

    fn parse_column(&self, c: &mut Cursor, builder: &mut TableBuilder) -> Step<()> {
        let name = c.identifier()?;
        let type_start = c
            .peek()
            .filter(|t| t.kind == TokenKind::Word)
            .ok_or_else(|| format!("column '{}' has no type", name))?;
        c.advance();

        let mut type_end = type_start.end;
        if c.peek_punct('(') {
            type_end = c.group()?.end;
        }
        while let Some(t) = c.peek() {
            if ["UNSIGNED", "SIGNED", "ZEROFILL"].iter().any(|m| c.is_keyword(t, m)) {
                c.advance();
                type_end = t.end;
            } else {
                break;
            }
        }

        let data_type = collapse_whitespace(c.source(type_start.start, type_end));
        let mut column = Column::new(&name, &data_type);

        while !c.is_at_end() {
            if c.eat_keywords(&["NOT", "NULL"]) {
                column.nullable = false;
            } else if c.eat_keyword("NULL") {
                column.nullable = true;
            } else if c.eat_keyword("DEFAULT") {
                column.default = Some(if c.eat_keyword("NULL") {
                    DefaultValue::Null
                } else {
                    DefaultValue::Value(c.term()?.to_string())
                });
            } else if c.eat_keyword("AUTO_INCREMENT") {
                column.auto_increment = true;
            } else if c.eat_keywords(&["CHARACTER", "SET"]) || c.eat_keyword("CHARSET") {
                column.charset = Some(c.identifier()?);
            } else if c.eat_keyword("COLLATE") {
                column.collation = Some(c.identifier()?);
            } else if c.eat_keywords(&["ON", "UPDATE"]) {
                column.on_update = Some(c.term()?.to_string());
            } else if c.eat_keyword("COMMENT") {
                column.comment = Some(c.string_literal()?);
            } else if c.eat_keywords(&["PRIMARY", "KEY"]) || c.eat_keyword("KEY") {
                builder.push_inline(IndexKind::Primary, &name);
            } else if c.eat_keyword("UNIQUE") {
                c.eat_keyword("KEY");
                builder.push_inline(IndexKind::Unique, &name);
            } else if c.eat_keywords(&["GENERATED", "ALWAYS", "AS"]) || c.eat_keyword("AS") {
                let expression = c.group()?;
                let stored = if c.eat_keyword("STORED") {
                    true
                } else {
                    c.eat_keyword("VIRTUAL");
                    false
                };
                column.generated = Some(GeneratedColumn {
                    expression: collapse_whitespace(c.source(expression.start, expression.end)),
                    stored,
                });
            } else if c.eat_keyword("VISIBLE") || c.eat_keyword("INVISIBLE") {
                self.unsupported("column visibility")?;
            } else if c.eat_keyword("COLUMN_FORMAT")
                || c.eat_keyword("STORAGE")
                || c.eat_keyword("SRID")
            {
                c.term()?;
                self.unsupported("column storage attribute")?;
            } else if c.peek_keyword("REFERENCES") {
                c.rest();
                self.unsupported("inline REFERENCES")?;
            } else {
                return Err(format!(
                    "unexpected {} in definition of column '{}'",
                    c.describe_next(),
                    name
                )
                .into());
            }
        }

        builder.table.add_column(column);
        Ok(())
    }

    fn parse_create_trigger(&self, c: &mut Cursor) -> Step<Trigger> {
        c.expect_keyword("CREATE")?;
        // DEFINER = `user`@`host` and friends
        while !c.eat_keyword("TRIGGER") {
            if c.advance().is_none() {
                return Err("expected TRIGGER".to_string().into());
            }
        }
        c.eat_keywords(&["IF", "NOT", "EXISTS"]);
        let name = c.identifier()?;

        let timing = if c.eat_keyword("BEFORE") {
            TriggerTiming::Before
        } else if c.eat_keyword("AFTER") {
            TriggerTiming::After
        } else {
            return Err(format!("expected BEFORE or AFTER but found {}", c.describe_next()).into());
        };
        let event = if c.eat_keyword("INSERT") {
            TriggerEvent::Insert
        } else if c.eat_keyword("UPDATE") {
            TriggerEvent::Update
        } else if c.eat_keyword("DELETE") {
            TriggerEvent::Delete
        } else {
            return Err(format!(
                "expected INSERT, UPDATE or DELETE but found {}",
                c.describe_next()
            )
            .into());
        };

        c.expect_keyword("ON")?;
        let table = c.identifier()?;
        for keyword in ["FOR", "EACH", "ROW"] {
            c.expect_keyword(keyword)?;
        }
        if c.eat_keyword("FOLLOWS") || c.eat_keyword("PRECEDES") {
            c.identifier()?;
        }

        let body = c.rest().trim().to_string();
        if body.is_empty() {
            return Err(format!("trigger '{}' has no body", name).into());
        }

        Ok(Trigger {
            name,
            table,
            timing,
            event,
            body,
        })
    }
}

struct PendingIndex {
    /// `None` until MySQL's implicit naming is applied
    name: Option<String>,
    index: Index,
}

struct TableBuilder {
    table: Table,
    pending: Vec<PendingIndex>,
}

impl TableBuilder {
    fn new(name: &str) -> Self {
        Self {
            table: Table::new(name),
            pending: Vec::new(),
        }
    }

    fn push_inline(&mut self, kind: IndexKind, column: &str) {
        self.pending.push(PendingIndex {
            name: None,
            index: Index::new("", kind, &[column]),
        });
    }

    /// Name unnamed keys the way MySQL does and attach them to the table
    fn finish(mut self) -> Table {
        let mut taken: HashSet<IndexKey> = self
            .pending
            .iter()
            .filter(|p| p.index.kind != IndexKind::Primary)
            .filter_map(|p| {
                p.name.as_ref().map(|name| IndexKey {
                    name: name.clone(),
                    foreign: p.index.kind == IndexKind::Foreign,
                })
            })
            .collect();
        let mut foreign_counter = 0;

        for pending in self.pending {
            let mut index = pending.index;
            index.name = match (pending.name, index.kind) {
                (_, IndexKind::Primary) => "PRIMARY".to_string(),
                (Some(name), _) => name,
                (None, IndexKind::Foreign) => loop {
                    foreign_counter += 1;
                    let candidate = format!("{}_ibfk_{}", self.table.name, foreign_counter);
                    if taken.insert(IndexKey { name: candidate.clone(), foreign: true }) {
                        break candidate;
                    }
                },
                (None, _) => {
                    let base = index
                        .columns
                        .first()
                        .map_or_else(|| "key".to_string(), |c| c.name.clone());
                    let mut candidate = base.clone();
                    let mut suffix = 2;
                    while !taken.insert(IndexKey { name: candidate.clone(), foreign: false }) {
                        candidate = format!("{}_{}", base, suffix);
                        suffix += 1;
                    }
                    candidate
                }
            };
            self.table.add_index(index);
        }

        self.table
    }
}

fn classify(statement: &RawStatement, cursor: &Cursor) -> StatementKind {
    let Some(first) = cursor.peek() else {
        return StatementKind::Ignored;
    };

    match cursor.text(first).to_ascii_uppercase().as_str() {
        "SET" | "LOCK" | "UNLOCK" | "USE" | "DROP" | "INSERT" | "REPLACE" => StatementKind::Ignored,
        "ALTER" => {
            let text = statement.text.to_ascii_uppercase();
            let tail = text.split_whitespace().rev().take(2).collect::<Vec<_>>();
            if tail == ["KEYS", "DISABLE"] || tail == ["KEYS", "ENABLE"] {
                StatementKind::Ignored
            } else {
                StatementKind::Unknown
            }
        }
        "CREATE" => {
            let mut offset = 1;
            while let Some(token) = cursor.peek_at(offset) {
                if token.kind == TokenKind::Word {
                    match cursor.text(token).to_ascii_uppercase().as_str() {
                        "TABLE" => return StatementKind::Table,
                        "TRIGGER" => return StatementKind::Trigger,
                        "DATABASE" | "SCHEMA" => return StatementKind::Ignored,
                        other @ ("VIEW" | "FUNCTION" | "PROCEDURE" | "EVENT" | "INDEX") => {
                            return StatementKind::Unsupported(format!("CREATE {}", other));
                        }
                        _ => {}
                    }
                }
                offset += 1;
                if offset > 16 {
                    break;
                }
            }
            StatementKind::Unknown
        }
        _ => StatementKind::Unknown,
    }
}

fn parse_table_options(c: &mut Cursor, table: &mut Table) -> Step<()> {
    while !c.is_at_end() {
        if c.eat_punct(',') {
            continue;
        }
        if c.eat_keyword("PARTITION") {
            c.expect_keyword("BY")?;
            let partitioning = collapse_whitespace(c.rest());
            if partitioning.is_empty() {
                return Err("empty PARTITION BY clause".to_string().into());
            }
            table.set_option("PARTITION BY", &partitioning);
            break;
        }

        c.eat_keyword("DEFAULT");
        let key = if c.eat_keywords(&["CHARACTER", "SET"]) {
            "CHARSET".to_string()
        } else {
            c.word()?.to_ascii_uppercase()
        };
        c.eat_punct('=');
        let value = c.term()?;
        table.set_option(&key, value);
    }
    Ok(())
}

fn identifier_list(c: &mut Cursor) -> Step<Vec<String>> {
    let group = c.group()?;
    let mut names = Vec::new();
    for part in c.sub_cursor(group.inner).split_top_level(',') {
        let mut pc = c.sub_cursor(part);
        names.push(pc.identifier()?);
        if !pc.is_at_end() {
            return Err(format!("unexpected {} in column list", pc.describe_next()).into());
        }
    }
    Ok(names)
}

fn referential_action(c: &mut Cursor) -> std::result::Result<String, String> {
    for action in [["SET", "NULL"], ["SET", "DEFAULT"], ["NO", "ACTION"]] {
        if c.eat_keywords(&action) {
            return Ok(action.join(" "));
        }
    }
    for action in ["RESTRICT", "CASCADE"] {
        if c.eat_keyword(action) {
            return Ok(action.to_string());
        }
    }
    Err(format!("expected a referential action but found {}", c.describe_next()))
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn malformed(statement: &RawStatement, reason: impl Into<String>) -> Error {
    Error::ParseError {
        line: statement.line,
        statement: statement.text.clone(),
        reason: reason.into(),
    }
}
