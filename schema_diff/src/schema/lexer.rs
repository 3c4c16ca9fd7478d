//! Statement splitting and tokenizing for definition text
//!
//! Dump output wraps statements in executable comments (`/*!40101 ... */`),
//! switches terminators with `DELIMITER` around trigger bodies and quotes
//! identifiers with backticks. The splitter turns that into plain statements;
//! the tokenizer and [`Cursor`] let the parser walk one statement while still
//! slicing verbatim source text (types, defaults, expressions) out of it.

use crate::error::{Error, Result};

/// One statement cut out of the definition text, without its terminator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    pub text: String,
    /// 1-based line of the statement's first character
    pub line: usize,
}

/// Split definition text into statements
pub fn split_statements(input: &str) -> Result<Vec<RawStatement>> {
    let mut splitter = Splitter {
        input,
        pos: 0,
        line: 1,
        start_line: 1,
        delimiter: ";".to_string(),
        current: String::new(),
        in_version_comment: false,
        statements: Vec::new(),
    };
    splitter.run()?;
    Ok(splitter.statements)
}

struct Splitter<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    start_line: usize,
    delimiter: String,
    current: String,
    in_version_comment: bool,
    statements: Vec<RawStatement>,
}

impl<'a> Splitter<'a> {
    fn run(&mut self) -> Result<()> {
        while self.pos < self.input.len() {
            let rest = &self.input[self.pos..];

            if self.current.trim().is_empty() && is_delimiter_command(rest) {
                self.read_delimiter_command()?;
            } else if rest.starts_with(self.delimiter.as_str()) {
                self.pos += self.delimiter.len();
                self.finish();
            } else if self.in_version_comment && rest.starts_with("*/") {
                self.pos += 2;
                self.in_version_comment = false;
                self.current.push(' ');
            } else if rest.starts_with("/*!") {
                self.pos += 3;
                while self.input[self.pos..].starts_with(|c: char| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                self.in_version_comment = true;
                self.current.push(' ');
            } else if rest.starts_with("/*") {
                let end = rest[2..]
                    .find("*/")
                    .ok_or_else(|| self.error("unterminated block comment"))?;
                let comment = &rest[..end + 4];
                self.line += comment.matches('\n').count();
                self.pos += comment.len();
                self.current.push(' ');
            } else if is_line_comment(rest) {
                let end = rest.find('\n').unwrap_or(rest.len());
                self.pos += end;
            } else if rest.starts_with(['\'', '"', '`']) {
                self.copy_quoted()?;
            } else {
                self.copy_char();
            }
        }

        self.finish();
        Ok(())
    }

    /// `DELIMITER ;;` on its own line
    fn read_delimiter_command(&mut self) -> Result<()> {
        let rest = &self.input[self.pos..];
        let end = rest.find('\n').unwrap_or(rest.len());
        let delimiter = rest[9..end].split_whitespace().next().unwrap_or("");
        if delimiter.is_empty() {
            return Err(self.error("DELIMITER without a terminator"));
        }
        self.delimiter = delimiter.to_string();
        self.current.clear();
        self.pos += end;
        Ok(())
    }

    fn copy_char(&mut self) {
        if let Some(c) = self.input[self.pos..].chars().next() {
            if self.current.trim().is_empty() && !c.is_whitespace() {
                self.start_line = self.line;
            }
            if c == '\n' {
                self.line += 1;
            }
            self.current.push(c);
            self.pos += c.len_utf8();
        }
    }

    fn copy_quoted(&mut self) -> Result<()> {
        let rest = &self.input[self.pos..];
        let quote = rest.chars().next().unwrap_or('\'');
        let len = quoted_len(rest, quote).ok_or_else(|| {
            self.error(&format!("unterminated {} quote", quote))
        })?;

        if self.current.trim().is_empty() {
            self.start_line = self.line;
        }
        let quoted = &rest[..len];
        self.line += quoted.matches('\n').count();
        self.current.push_str(quoted);
        self.pos += len;
        Ok(())
    }

    fn finish(&mut self) {
        let text = self.current.trim();
        if !text.is_empty() {
            self.statements.push(RawStatement {
                text: text.to_string(),
                line: self.start_line,
            });
        }
        self.current.clear();
    }

    fn error(&self, reason: &str) -> Error {
        Error::ParseError {
            line: if self.current.trim().is_empty() { self.line } else { self.start_line },
            statement: self.current.trim().to_string(),
            reason: reason.to_string(),
        }
    }
}

fn is_delimiter_command(rest: &str) -> bool {
    rest.len() > 9
        && rest.is_char_boundary(9)
        && rest[..9].eq_ignore_ascii_case("DELIMITER")
        && rest[9..].starts_with([' ', '\t'])
}

/// `-- ` (dash dash followed by whitespace or end of input) or `#`
fn is_line_comment(rest: &str) -> bool {
    if rest.starts_with('#') {
        return true;
    }
    rest.starts_with("--") && rest[2..].chars().next().map_or(true, char::is_whitespace)
}

/// Byte length of the quoted run at the start of `rest`, quotes included
fn quoted_len(rest: &str, quote: char) -> Option<usize> {
    let mut chars = rest.char_indices().skip(1).peekable();
    while let Some((i, c)) = chars.next() {
        if c == '\\' && quote != '`' {
            chars.next();
        } else if c == quote {
            if chars.peek().map(|(_, next)| *next) == Some(quote) {
                chars.next();
            } else {
                return Some(i + c.len_utf8());
            }
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Bare identifier or keyword
    Word,
    /// Backtick-quoted identifier
    QuotedIdent,
    /// Single- or double-quoted string literal
    Str,
    Number,
    Punct,
}

/// A token with its byte span in the statement text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

/// Tokenize one statement
pub fn tokenize(src: &str) -> std::result::Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut iter = src.char_indices().peekable();

    while let Some(&(start, c)) = iter.peek() {
        if c.is_whitespace() {
            iter.next();
            continue;
        }

        let (kind, end) = if c == '`' || c == '\'' || c == '"' {
            let len = quoted_len(&src[start..], c)
                .ok_or_else(|| format!("unterminated {} quote", c))?;
            let kind = if c == '`' { TokenKind::QuotedIdent } else { TokenKind::Str };
            (kind, start + len)
        } else if is_word_char(c) {
            let mut end = start;
            while let Some(&(i, w)) = iter.peek() {
                if !(is_word_char(w) || (w == '.' && c.is_ascii_digit())) {
                    break;
                }
                end = i + w.len_utf8();
                iter.next();
            }
            let text = &src[start..end];
            let kind = if text.chars().all(|ch| ch.is_ascii_digit() || ch == '.') {
                TokenKind::Number
            } else {
                TokenKind::Word
            };
            tokens.push(Token { kind, start, end });
            continue;
        } else {
            (TokenKind::Punct, start + c.len_utf8())
        };

        tokens.push(Token { kind, start, end });
        while iter.peek().is_some_and(|&(i, _)| i < end) {
            iter.next();
        }
    }

    Ok(tokens)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Contents of a parenthesized group
#[derive(Debug, Clone, Copy)]
pub struct Group<'a> {
    pub inner: &'a [Token],
    /// Byte span including the parentheses
    pub start: usize,
    pub end: usize,
}

/// Walks a token slice of one statement
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    src: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(src: &'a str, tokens: &'a [Token]) -> Self {
        Self { src, tokens, pos: 0 }
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    pub fn peek_at(&self, offset: usize) -> Option<Token> {
        self.tokens.get(self.pos + offset).copied()
    }

    pub fn advance(&mut self) -> Option<Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn text(&self, token: Token) -> &'a str {
        &self.src[token.start..token.end]
    }

    pub fn is_keyword(&self, token: Token, keyword: &str) -> bool {
        token.kind == TokenKind::Word && self.text(token).eq_ignore_ascii_case(keyword)
    }

    pub fn peek_keyword(&self, keyword: &str) -> bool {
        self.peek().is_some_and(|t| self.is_keyword(t, keyword))
    }

    pub fn peek_keyword_at(&self, offset: usize, keyword: &str) -> bool {
        self.peek_at(offset).is_some_and(|t| self.is_keyword(t, keyword))
    }

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.peek_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume a keyword sequence only if all of it is present
    pub fn eat_keywords(&mut self, keywords: &[&str]) -> bool {
        let present = keywords
            .iter()
            .enumerate()
            .all(|(offset, keyword)| self.peek_keyword_at(offset, keyword));
        if present {
            self.pos += keywords.len();
        }
        present
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> std::result::Result<(), String> {
        if self.eat_keyword(keyword) {
            Ok(())
        } else {
            Err(format!("expected {} but found {}", keyword, self.describe_next()))
        }
    }

    pub fn peek_punct(&self, c: char) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Punct && self.text(t).starts_with(c))
    }

    pub fn eat_punct(&mut self, c: char) -> bool {
        if self.peek_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// A bare word, returned as written
    pub fn word(&mut self) -> std::result::Result<&'a str, String> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Word => {
                self.pos += 1;
                Ok(self.text(t))
            }
            _ => Err(format!("expected a word but found {}", self.describe_next())),
        }
    }

    /// An identifier, bare or backtick-quoted. `db`.`name` yields `name`.
    pub fn identifier(&mut self) -> std::result::Result<String, String> {
        let mut name = self.single_identifier()?;
        while self.peek_punct('.') {
            self.pos += 1;
            name = self.single_identifier()?;
        }
        Ok(name)
    }

    fn single_identifier(&mut self) -> std::result::Result<String, String> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Word => {
                self.pos += 1;
                Ok(self.text(t).to_string())
            }
            Some(t) if t.kind == TokenKind::QuotedIdent => {
                self.pos += 1;
                let raw = self.text(t);
                Ok(raw[1..raw.len() - 1].replace("``", "`"))
            }
            _ => Err(format!("expected an identifier but found {}", self.describe_next())),
        }
    }

    /// A string literal's unescaped contents
    pub fn string_literal(&mut self) -> std::result::Result<String, String> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Str => {
                self.pos += 1;
                let raw = self.text(t);
                let quote = raw.chars().next().unwrap_or('\'');
                Ok(crate::utils::naming::unescape_string(&raw[1..raw.len() - 1], quote))
            }
            _ => Err(format!("expected a string but found {}", self.describe_next())),
        }
    }

    /// A parenthesized group starting at the current token
    pub fn group(&mut self) -> std::result::Result<Group<'a>, String> {
        let open = match self.peek() {
            Some(t) if self.peek_punct('(') => t,
            _ => return Err(format!("expected '(' but found {}", self.describe_next())),
        };

        let mut depth = 0usize;
        for (offset, token) in self.tokens[self.pos..].iter().enumerate() {
            if token.kind != TokenKind::Punct {
                continue;
            }
            match self.text(*token) {
                "(" => depth += 1,
                ")" => {
                    depth -= 1;
                    if depth == 0 {
                        let inner = &self.tokens[self.pos + 1..self.pos + offset];
                        self.pos += offset + 1;
                        return Ok(Group {
                            inner,
                            start: open.start,
                            end: token.end,
                        });
                    }
                }
                _ => {}
            }
        }

        Err("unbalanced parentheses".to_string())
    }

    /// One value term, returned verbatim: a literal, a word, a parenthesized
    /// expression, a function call, or a charset-introduced string.
    pub fn term(&mut self) -> std::result::Result<&'a str, String> {
        let first = self
            .peek()
            .ok_or_else(|| "expected a value but found end of statement".to_string())?;

        if self.peek_punct('(') {
            let group = self.group()?;
            return Ok(&self.src[group.start..group.end]);
        }

        if self.peek_punct('-') || self.peek_punct('+') {
            match self.peek_at(1) {
                Some(next) if next.kind == TokenKind::Number && next.start == first.end => {
                    self.pos += 2;
                    return Ok(&self.src[first.start..next.end]);
                }
                _ => return Err(format!("unexpected {}", self.describe_next())),
            }
        }

        if first.kind == TokenKind::Punct {
            return Err(format!("unexpected {}", self.describe_next()));
        }
        self.pos += 1;

        if first.kind == TokenKind::Word {
            if let Some(next) = self.peek() {
                if next.start == first.end && next.kind == TokenKind::Str {
                    self.pos += 1;
                    return Ok(&self.src[first.start..next.end]);
                }
                if next.start == first.end && self.peek_punct('(') {
                    let group = self.group()?;
                    return Ok(&self.src[first.start..group.end]);
                }
            }
        }

        Ok(self.text(first))
    }

    /// Verbatim text from the current token to the end, consuming it
    pub fn rest(&mut self) -> &'a str {
        match (self.peek(), self.tokens.last()) {
            (Some(first), Some(last)) => {
                self.pos = self.tokens.len();
                &self.src[first.start..last.end]
            }
            _ => "",
        }
    }

    /// Split the remaining tokens at top-level occurrences of `separator`
    pub fn split_top_level(&self, separator: char) -> Vec<&'a [Token]> {
        let tokens = &self.tokens[self.pos..];
        let mut parts = Vec::new();
        let mut depth = 0usize;
        let mut part_start = 0;

        for (i, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Punct {
                continue;
            }
            let text = self.text(*token);
            if text == "(" {
                depth += 1;
            } else if text == ")" {
                depth = depth.saturating_sub(1);
            } else if depth == 0 && text.starts_with(separator) {
                parts.push(&tokens[part_start..i]);
                part_start = i + 1;
            }
        }
        parts.push(&tokens[part_start..]);
        parts
    }

    /// Verbatim statement text between two byte offsets
    pub fn source(&self, start: usize, end: usize) -> &'a str {
        &self.src[start..end]
    }

    pub fn sub_cursor(&self, tokens: &'a [Token]) -> Cursor<'a> {
        Cursor::new(self.src, tokens)
    }

    pub fn describe_next(&self) -> String {
        match self.peek() {
            Some(t) => format!("'{}'", self.text(t)),
            None => "end of statement".to_string(),
        }
    }
}
