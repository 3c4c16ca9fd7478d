//! Naming utilities for SchemaDiff
//!
//! Identifier quoting in the MySQL dialect and table-name filters.

use regex::Regex;

use crate::error::{Error, Result};

/// Quote an identifier with backticks, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote and join a list of identifiers
pub fn quote_list<'a, I>(names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Quote a string literal the way `mysqldump` does
pub fn quote_string(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

/// Undo MySQL string literal escaping for the contents of a quoted literal
pub fn unescape_string(body: &str, quote: char) -> String {
    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('r') => result.push('\r'),
                Some('0') => result.push('\0'),
                Some(other) => result.push(other),
                None => result.push('\\'),
            }
        } else if c == quote && chars.peek() == Some(&quote) {
            chars.next();
            result.push(quote);
        } else {
            result.push(c);
        }
    }

    result
}

/// Table-name filter backed by a regular expression
#[derive(Debug, Clone)]
pub struct NameFilter {
    regex: Regex,
}

impl NameFilter {
    /// Compile a filter pattern
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self { regex })
    }

    /// Compile an optional pattern, treating empty strings as "no filter"
    pub fn from_optional(pattern: Option<&str>) -> Result<Option<Self>> {
        match pattern {
            Some(p) if !p.is_empty() => Self::new(p).map(Some),
            _ => Ok(None),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

/// Whether `name` passes an optional filter
pub fn passes(filter: Option<&NameFilter>, name: &str) -> bool {
    filter.map_or(true, |f| f.matches(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "`users`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
        assert_eq!(quote_list(["a", "b"]), "`a`, `b`");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(quote_string("it's"), "'it''s'");
        assert_eq!(unescape_string("it''s", '\''), "it's");
        assert_eq!(unescape_string(r"a\'b\\c", '\''), r"a'b\c");
    }

    #[test]
    fn test_name_filter() {
        let filter = NameFilter::new("^user").unwrap();
        assert!(filter.matches("users"));
        assert!(filter.matches("user_roles"));
        assert!(!filter.matches("app_users"));
        assert!(passes(None, "anything"));
        assert!(NameFilter::from_optional(Some("")).unwrap().is_none());
        assert!(matches!(
            NameFilter::new("(unclosed"),
            Err(Error::InvalidPattern { .. })
        ));
    }
}
