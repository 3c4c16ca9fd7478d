//! Tolerance policy
//!
//! A policy decides which attribute classes are ignored when two tables are
//! compared. It is applied as a normalization pass: both sides are rewritten
//! into a canonical form and then compared with plain equality.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::schema::lexer::{tokenize, TokenKind};
use crate::schema::types::{Column, DefaultValue, Table};

static INTEGER_DISPLAY_WIDTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(tinyint|smallint|mediumint|int|integer|bigint)\s*\(\s*\d+\s*\)")
        .expect("display width pattern is valid")
});

static QUOTED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^'(-?\d+(\.\d+)?)'$").expect("quoted number pattern is valid")
});

/// Attribute classes ignored during comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TolerancePolicy {
    /// Treat column defaults as absent on both sides
    pub ignore_default: bool,
    /// Ignore the table's AUTO_INCREMENT counter option
    pub ignore_auto_increment: bool,
    /// Ignore column and table character sets and collations
    pub ignore_collation: bool,
    /// Ignore letter case, whitespace and integer display widths
    pub ignore_formatting: bool,
}

impl TolerancePolicy {
    /// Every difference counts
    pub fn strict() -> Self {
        Self::default()
    }

    /// Ignore every attribute class the policy knows about
    pub fn tolerant() -> Self {
        Self {
            ignore_default: true,
            ignore_auto_increment: true,
            ignore_collation: true,
            ignore_formatting: true,
        }
    }

    pub fn is_strict(&self) -> bool {
        *self == Self::strict()
    }

    /// Canonical form of a table under this policy
    pub fn normalize_table(&self, table: &Table) -> Table {
        let mut normalized = table.clone();
        if self.is_strict() {
            return normalized;
        }

        for column in &mut normalized.columns {
            self.normalize_column(column);
        }

        if self.ignore_auto_increment {
            normalized.options.shift_remove("AUTO_INCREMENT");
        }
        if self.ignore_collation {
            normalized.options.shift_remove("CHARSET");
            normalized.options.shift_remove("COLLATE");
        }

        if self.ignore_formatting {
            for index in &mut normalized.indexes {
                index.options = index.options.as_deref().map(fold);
            }
            if let Some(engine) = normalized.options.get_mut("ENGINE") {
                *engine = engine.to_ascii_lowercase();
            }
        }

        normalized
    }

    fn normalize_column(&self, column: &mut Column) {
        if self.ignore_default {
            column.default = None;
        }
        if self.ignore_collation {
            column.charset = None;
            column.collation = None;
        }
        if self.ignore_formatting {
            column.data_type = normalize_type(&column.data_type);
            let unquoted = match &column.default {
                Some(DefaultValue::Value(value)) => QUOTED_NUMBER
                    .captures(value)
                    .map(|caps| caps[1].to_string()),
                _ => None,
            };
            if let Some(number) = unquoted {
                column.default = Some(DefaultValue::Value(number));
            }
            if let Some(generated) = &mut column.generated {
                generated.expression = fold(&generated.expression);
            }
            column.on_update = column.on_update.as_deref().map(fold);
        }
    }
}

/// Lower-case a type and drop integer display widths: `INT(11) UNSIGNED` is `int unsigned`
fn normalize_type(data_type: &str) -> String {
    let folded = fold(data_type);
    INTEGER_DISPLAY_WIDTH
        .replace(&folded, "$1")
        .into_owned()
}

/// Collapse whitespace and lower-case bare words. String literals and quoted
/// identifiers keep their exact text: `ENUM('A')` folds to `enum('A')`.
fn fold(text: &str) -> String {
    let Ok(tokens) = tokenize(text) else {
        return text.split_whitespace().collect::<Vec<_>>().join(" ");
    };

    let mut folded = String::with_capacity(text.len());
    let mut previous_end = None;
    for token in tokens {
        if previous_end.is_some_and(|end| token.start > end) {
            folded.push(' ');
        }
        let piece = &text[token.start..token.end];
        match token.kind {
            TokenKind::Word => folded.push_str(&piece.to_lowercase()),
            _ => folded.push_str(piece),
        }
        previous_end = Some(token.end);
    }
    folded
}
