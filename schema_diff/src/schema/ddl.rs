//! DDL fragment rendering
//!
//! Renders model values back into MySQL definition syntax. The output uses
//! the same shapes `SHOW CREATE TABLE` prints, with every identifier quoted.

use std::collections::HashSet;

use crate::schema::types::{Column, Index, IndexColumn, IndexKey, IndexKind, Table, Trigger};
use crate::utils::naming::{quote_identifier, quote_list, quote_string};

/// Full column definition, e.g. `` `name` varchar(100) NOT NULL DEFAULT '' ``
pub fn column_definition(column: &Column) -> String {
    let mut parts = vec![quote_identifier(&column.name), column.data_type.clone()];

    if let Some(charset) = &column.charset {
        parts.push(format!("CHARACTER SET {}", charset));
    }
    if let Some(collation) = &column.collation {
        parts.push(format!("COLLATE {}", collation));
    }
    if let Some(generated) = &column.generated {
        let kind = if generated.stored { "STORED" } else { "VIRTUAL" };
        parts.push(format!("GENERATED ALWAYS AS {} {}", generated.expression, kind));
    }
    if !column.nullable {
        parts.push("NOT NULL".to_string());
    } else if is_timestamp(&column.data_type) {
        // explicit_defaults_for_timestamp=OFF makes bare timestamps NOT NULL
        parts.push("NULL".to_string());
    }
    if let Some(default) = &column.default {
        parts.push(format!("DEFAULT {}", default));
    }
    if let Some(on_update) = &column.on_update {
        parts.push(format!("ON UPDATE {}", on_update));
    }
    if column.auto_increment {
        parts.push("AUTO_INCREMENT".to_string());
    }
    if let Some(comment) = &column.comment {
        parts.push(format!("COMMENT {}", quote_string(comment)));
    }

    parts.join(" ")
}

fn is_timestamp(data_type: &str) -> bool {
    data_type
        .get(..9)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("timestamp"))
}

fn index_column(column: &IndexColumn) -> String {
    let mut text = quote_identifier(&column.name);
    if let Some(length) = column.length {
        text.push_str(&format!("({})", length));
    }
    if column.descending {
        text.push_str(" DESC");
    }
    text
}

/// Index, key or foreign key clause as it appears inside `CREATE TABLE`
pub fn index_definition(index: &Index) -> String {
    let columns = index
        .columns
        .iter()
        .map(index_column)
        .collect::<Vec<_>>()
        .join(", ");

    let mut definition = match index.kind {
        IndexKind::Primary => format!("PRIMARY KEY ({})", columns),
        IndexKind::Unique => format!("UNIQUE KEY {} ({})", quote_identifier(&index.name), columns),
        IndexKind::Index => format!("KEY {} ({})", quote_identifier(&index.name), columns),
        IndexKind::Fulltext => {
            format!("FULLTEXT KEY {} ({})", quote_identifier(&index.name), columns)
        }
        IndexKind::Foreign => {
            let mut text = format!(
                "CONSTRAINT {} FOREIGN KEY ({})",
                quote_identifier(&index.name),
                columns
            );
            if let Some(reference) = &index.reference {
                text.push_str(&format!(
                    " REFERENCES {} ({})",
                    quote_identifier(&reference.table),
                    quote_list(reference.columns.iter().map(String::as_str))
                ));
                if let Some(action) = &reference.on_delete {
                    text.push_str(&format!(" ON DELETE {}", action));
                }
                if let Some(action) = &reference.on_update {
                    text.push_str(&format!(" ON UPDATE {}", action));
                }
            }
            text
        }
    };

    if let Some(options) = &index.options {
        definition.push(' ');
        definition.push_str(options);
    }
    definition
}

/// `ALTER TABLE` clause adding an index
pub fn add_index_clause(index: &Index) -> String {
    format!("ADD {}", index_definition(index))
}

/// `ALTER TABLE` clause dropping an index
pub fn drop_index_clause(index: &Index) -> String {
    match index.kind {
        IndexKind::Primary => "DROP PRIMARY KEY".to_string(),
        IndexKind::Foreign => format!("DROP FOREIGN KEY {}", quote_identifier(&index.name)),
        _ => format!("DROP INDEX {}", quote_identifier(&index.name)),
    }
}

/// One table option, e.g. `ENGINE=InnoDB` or `DEFAULT CHARSET=utf8mb4`
pub fn table_option(name: &str, value: &str) -> String {
    match name {
        "CHARSET" => format!("DEFAULT CHARSET={}", value),
        "PARTITION BY" => format!("PARTITION BY {}", value),
        _ => format!("{}={}", name, value),
    }
}

/// `CREATE TABLE` statement, leaving out the foreign keys in `deferred`
pub fn create_table(table: &Table, deferred: &HashSet<IndexKey>) -> String {
    let mut items: Vec<String> = table.columns.iter().map(column_definition).collect();
    items.extend(
        table
            .indexes
            .iter()
            .filter(|index| !deferred.contains(&index.key()))
            .map(index_definition),
    );

    let mut statement = format!(
        "CREATE TABLE {} (\n  {}\n)",
        quote_identifier(&table.name),
        items.join(",\n  ")
    );

    let options: Vec<String> = table
        .options
        .iter()
        .map(|(name, value)| table_option(name, value))
        .collect();
    if !options.is_empty() {
        statement.push(' ');
        statement.push_str(&options.join(" "));
    }
    statement
}

/// `CREATE TRIGGER` statement without a terminator
pub fn create_trigger(trigger: &Trigger) -> String {
    format!(
        "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW {}",
        quote_identifier(&trigger.name),
        trigger.timing,
        trigger.event,
        quote_identifier(&trigger.table),
        trigger.body
    )
}
