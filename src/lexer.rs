//! # MOTLY lexical primitives
//!
//! This module provides the [`Lexer`], the token-decoding layer of the
//! pipeline. MOTLY is not tokenized into a flat stream up front: string
//! flavours, heredocs, and the number-vs-bare tie-break all depend on
//! their surrounding context, so the [`Parser`](crate::parser) drives
//! the lexer rule by rule over a shared [`Cursor`].
//!
//! The lexer recognizes the fundamental building blocks of the language:
//!
//! - **Trivia:** whitespace and `#` line comments, skipped freely
//!   between tokens; commas are additionally absorbed at statement-list
//!   level via [`Lexer::skip_trivia_and_commas`].
//! - **Identifiers:** bare identifiers (`[A-Za-z0-9_]` plus the
//!   Latin-Extended ranges `U+00C0–U+024F` and `U+1E00–U+1EFF`) and
//!   backtick-quoted names.
//! - **Strings:** double (`"…"`, escaped), single raw (`'…'`), their
//!   triple multiline forms, and the indentation-dedenting heredoc
//!   (`<<< … >>>`).
//! - **Numbers:** IEEE 754 doubles, with the tie-break that a digit run
//!   followed by a bare-identifier character is a bare string (`v2`,
//!   `8080x`), never a number.
//! - **`@`-forms:** `@true`, `@false`, `@none`, `@env.NAME`, and
//!   ISO-8601 dates consumed with fixed-width digit runs.
//! - **References:** `$` `^`* segments, each an identifier optionally
//!   followed by `[index]`.
//!
//! Every failure is a [`SyntaxError`] with a span over the offending
//! region.
//!
//! ## Example
//!
//! ```rust
//! use motly_core::lexer::Lexer;
//!
//! let mut lexer = Lexer::new("  # a comment\n  deploy_target");
//! lexer.skip_trivia();
//! assert_eq!(lexer.read_identifier().unwrap(), "deploy_target");
//! ```

use crate::ast::{ScalarValue, Segment};
use crate::cursor::{Cursor, Position};
use crate::error::SyntaxError;
use crate::tree::DateStamp;

/// Check whether a character may appear in a bare identifier.
#[must_use]
pub fn is_bare_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric()
        || ch == '_'
        || ('\u{00C0}'..='\u{024F}').contains(&ch)
        || ('\u{1E00}'..='\u{1EFF}').contains(&ch)
}

/// Stateful token decoder over a [`Cursor`].
#[derive(Debug)]
pub struct Lexer<'a> {
    cur: Cursor<'a>,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Lexer {
            cur: Cursor::new(input),
        }
    }

    // === Cursor passthrough ===

    #[must_use]
    pub fn peek(&self) -> Option<char> {
        self.cur.peek()
    }

    #[must_use]
    pub fn at_end(&self) -> bool {
        self.cur.at_end()
    }

    #[must_use]
    pub fn starts_with(&self, s: &str) -> bool {
        self.cur.starts_with(s)
    }

    pub fn advance(&mut self, bytes: usize) {
        self.cur.advance(bytes);
    }

    pub fn eat(&mut self, ch: char) -> bool {
        self.cur.eat(ch)
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.cur.position()
    }

    /// Consume `ch` or fail with a point error.
    pub fn expect(&mut self, ch: char) -> Result<(), SyntaxError> {
        if self.cur.eat(ch) {
            Ok(())
        } else {
            Err(self.err_at(format!("Expected '{ch}'")))
        }
    }

    // === Error helpers ===

    pub(crate) fn err_at(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError::at(message, self.cur.position())
    }

    pub(crate) fn err_span(&self, message: impl Into<String>, begin: Position) -> SyntaxError {
        SyntaxError::new(message, begin, self.cur.position())
    }

    // === Trivia ===

    /// Skip whitespace and `#` line comments.
    pub fn skip_trivia(&mut self) {
        loop {
            while let Some(ch) = self.cur.peek() {
                if ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n' {
                    self.cur.bump();
                } else {
                    break;
                }
            }
            if self.cur.peek() == Some('#') {
                while let Some(ch) = self.cur.peek() {
                    if ch == '\r' || ch == '\n' {
                        break;
                    }
                    self.cur.bump();
                }
            } else {
                break;
            }
        }
    }

    /// Like [`Lexer::skip_trivia`], but also absorbs commas. Used at
    /// statement-list level, where commas are optional separators.
    pub fn skip_trivia_and_commas(&mut self) {
        self.skip_trivia();
        while self.cur.eat(',') {
            self.skip_trivia();
        }
    }

    // === Identifiers ===

    /// Identifier ::= BacktickString | BareString
    pub fn read_identifier(&mut self) -> Result<String, SyntaxError> {
        if self.cur.peek() == Some('`') {
            self.read_backtick_string()
        } else {
            self.read_bare()
        }
    }

    /// A run of bare-identifier characters.
    pub fn read_bare(&mut self) -> Result<String, SyntaxError> {
        let start = self.cur.offset();
        while self.cur.peek().is_some_and(is_bare_char) {
            self.cur.bump();
        }
        if self.cur.offset() == start {
            return Err(self.err_at("Expected an identifier"));
        }
        Ok(self.cur.slice_from(start).to_string())
    }

    // === Strings ===

    fn read_backtick_string(&mut self) -> Result<String, SyntaxError> {
        let begin = self.cur.position();
        self.expect('`')?;
        let mut out = String::new();
        loop {
            match self.cur.peek() {
                None | Some('\r' | '\n') => {
                    return Err(self.err_span("Unterminated backtick string", begin));
                }
                Some('`') => {
                    self.cur.bump();
                    return Ok(out);
                }
                Some('\\') => {
                    self.cur.bump();
                    out.push(self.read_escape()?);
                }
                Some(ch) => {
                    self.cur.bump();
                    out.push(ch);
                }
            }
        }
    }

    /// Double-quoted single-line string with escapes.
    pub fn read_double_quoted(&mut self) -> Result<String, SyntaxError> {
        let begin = self.cur.position();
        self.expect('"')?;
        let mut out = String::new();
        loop {
            match self.cur.peek() {
                None | Some('\r' | '\n') => {
                    return Err(self.err_span("Unterminated string", begin));
                }
                Some('"') => {
                    self.cur.bump();
                    return Ok(out);
                }
                Some('\\') => {
                    self.cur.bump();
                    out.push(self.read_escape()?);
                }
                Some(ch) => {
                    self.cur.bump();
                    out.push(ch);
                }
            }
        }
    }

    /// Triple-double-quoted multiline string, same escapes as double.
    pub fn read_triple_double(&mut self) -> Result<String, SyntaxError> {
        let begin = self.cur.position();
        if !self.cur.starts_with("\"\"\"") {
            return Err(self.err_at("Expected triple-quoted string"));
        }
        self.cur.advance(3);
        let mut out = String::new();
        loop {
            if self.cur.starts_with("\"\"\"") {
                self.cur.advance(3);
                return Ok(out);
            }
            match self.cur.peek() {
                None => {
                    return Err(self.err_span("Unterminated triple-quoted string", begin));
                }
                Some('\\') => {
                    self.cur.bump();
                    out.push(self.read_escape()?);
                }
                Some(ch) => {
                    self.cur.bump();
                    out.push(ch);
                }
            }
        }
    }

    /// Raw single-quoted string. A backslash is literal in the output
    /// but pairs with the next character for delimiter purposes, so
    /// `\'` does not close the string.
    pub fn read_single_raw(&mut self) -> Result<String, SyntaxError> {
        let begin = self.cur.position();
        self.expect('\'')?;
        let mut out = String::new();
        loop {
            match self.cur.peek() {
                None | Some('\r' | '\n') => {
                    return Err(self.err_span("Unterminated string", begin));
                }
                Some('\'') => {
                    self.cur.bump();
                    return Ok(out);
                }
                Some('\\') => {
                    self.cur.bump();
                    out.push('\\');
                    match self.cur.peek() {
                        None | Some('\r' | '\n') => {
                            return Err(self.err_span("Unterminated string", begin));
                        }
                        Some(ch) => {
                            self.cur.bump();
                            out.push(ch);
                        }
                    }
                }
                Some(ch) => {
                    self.cur.bump();
                    out.push(ch);
                }
            }
        }
    }

    /// Raw triple-single-quoted multiline string; only `'''` closes it.
    pub fn read_triple_single_raw(&mut self) -> Result<String, SyntaxError> {
        let begin = self.cur.position();
        if !self.cur.starts_with("'''") {
            return Err(self.err_at("Expected triple-single-quoted string"));
        }
        self.cur.advance(3);
        let mut out = String::new();
        loop {
            if self.cur.starts_with("'''") {
                self.cur.advance(3);
                return Ok(out);
            }
            match self.cur.peek() {
                None => {
                    return Err(self.err_span("Unterminated triple-single-quoted string", begin));
                }
                Some('\\') => {
                    self.cur.bump();
                    out.push('\\');
                    match self.cur.peek() {
                        None => {
                            return Err(
                                self.err_span("Unterminated triple-single-quoted string", begin)
                            );
                        }
                        Some(ch) => {
                            self.cur.bump();
                            out.push(ch);
                        }
                    }
                }
                Some(ch) => {
                    self.cur.bump();
                    out.push(ch);
                }
            }
        }
    }

    /// Heredoc: `<<<` newline, lines until a line whose trimmed content
    /// is `>>>`. The indentation of the first non-blank line is stripped
    /// from every non-blank line; the result ends with a newline.
    pub fn read_heredoc(&mut self) -> Result<String, SyntaxError> {
        let begin = self.cur.position();
        self.cur.advance(3);

        // Spaces and tabs may trail <<< on the same line.
        while matches!(self.cur.peek(), Some(' ' | '\t')) {
            self.cur.bump();
        }
        self.cur.eat('\r');
        if !self.cur.eat('\n') {
            return Err(self.err_span("Expected newline after <<<", begin));
        }

        let mut lines: Vec<&str> = Vec::new();
        loop {
            if self.cur.at_end() {
                return Err(self.err_span("Unterminated heredoc (expected >>>)", begin));
            }
            let line_start = self.cur.offset();
            while let Some(ch) = self.cur.peek() {
                if ch == '\n' {
                    break;
                }
                self.cur.bump();
            }
            let mut line = self.cur.slice_from(line_start);
            if let Some(stripped) = line.strip_suffix('\r') {
                line = stripped;
            }
            self.cur.eat('\n');

            if line.trim() == ">>>" {
                break;
            }
            lines.push(line);
        }

        if lines.is_empty() {
            return Ok(String::new());
        }

        let strip = lines
            .iter()
            .find(|l| !l.trim_start().is_empty())
            .map_or(0, |l| l.len() - l.trim_start().len());

        let mut out = String::new();
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            if line.trim_start().is_empty() {
                // Whitespace-only lines become empty.
            } else if strip <= line.len() {
                out.push_str(&line[strip..]);
            } else {
                out.push_str(line);
            }
        }
        out.push('\n');
        Ok(out)
    }

    fn read_escape(&mut self) -> Result<char, SyntaxError> {
        match self.cur.bump() {
            None => Err(self.err_at("Unterminated escape sequence")),
            Some('b') => Ok('\u{0008}'),
            Some('f') => Ok('\u{000C}'),
            Some('n') => Ok('\n'),
            Some('r') => Ok('\r'),
            Some('t') => Ok('\t'),
            Some('u') => {
                let begin = self.cur.position();
                let start = self.cur.offset();
                for _ in 0..4 {
                    match self.cur.peek() {
                        Some(ch) if ch.is_ascii_hexdigit() => {
                            self.cur.bump();
                        }
                        _ => {
                            return Err(
                                self.err_span("Expected 4 hex digits in \\uXXXX escape", begin)
                            );
                        }
                    }
                }
                let hex = self.cur.slice_from(start);
                let code = u32::from_str_radix(hex, 16)
                    .map_err(|_| self.err_span(format!("Invalid hex in \\u escape: {hex}"), begin))?;
                char::from_u32(code).ok_or_else(|| {
                    self.err_span(format!("Invalid unicode code point: \\u{hex}"), begin)
                })
            }
            // Unknown escapes pass the character through: \x -> x.
            Some(other) => Ok(other),
        }
    }

    // === Numbers ===

    fn eat_digits(&mut self) -> usize {
        let start = self.cur.offset();
        while self.cur.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.cur.bump();
        }
        self.cur.offset() - start
    }

    /// Number ::= "-"? (Digits ("." Digits)? | "." Digits) Exponent?
    ///
    /// A token matching the number shape but continued by a
    /// bare-identifier character is re-read as a bare string.
    pub fn read_number_or_bare(&mut self) -> Result<ScalarValue, SyntaxError> {
        let start = self.cur.offset();
        let begin = self.cur.position();
        let has_minus = self.cur.eat('-');
        let int_digits = self.eat_digits();

        let mut has_fraction = false;
        if self.cur.peek() == Some('.')
            && self.cur.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
        {
            self.cur.bump();
            self.eat_digits();
            has_fraction = true;
        }

        if int_digits == 0 && !has_fraction {
            // No digits at all. There are no negative bare identifiers.
            if has_minus {
                return Err(self.err_at("Expected a value"));
            }
            return self.read_bare().map(ScalarValue::Str);
        }

        if matches!(self.cur.peek(), Some('e' | 'E')) {
            self.cur.bump();
            if matches!(self.cur.peek(), Some('+' | '-')) {
                self.cur.bump();
            }
            if self.eat_digits() == 0 {
                return Err(self.err_span("Expected exponent digits", begin));
            }
        }

        if self.cur.peek().is_some_and(is_bare_char) {
            if has_minus {
                return Err(self.err_span("Expected a value", begin));
            }
            self.cur.rewind(start);
            return self.read_bare().map(ScalarValue::Str);
        }

        let text = self.cur.slice_from(start);
        let n: f64 = text
            .parse()
            .map_err(|_| self.err_span(format!("Invalid number: {text}"), begin))?;
        Ok(ScalarValue::Num(n))
    }

    // === @-forms ===

    /// `@true`, `@false`, `@none`, `@env.NAME`, or an ISO-8601 date.
    pub fn read_at_value(&mut self) -> Result<ScalarValue, SyntaxError> {
        let begin = self.cur.position();
        self.expect('@')?;
        if self.cur.starts_with("true") && !self.bare_char_at(4) {
            self.cur.advance(4);
            return Ok(ScalarValue::Bool(true));
        }
        if self.cur.starts_with("false") && !self.bare_char_at(5) {
            self.cur.advance(5);
            return Ok(ScalarValue::Bool(false));
        }
        if self.cur.starts_with("none") && !self.bare_char_at(4) {
            self.cur.advance(4);
            return Ok(ScalarValue::Empty);
        }
        if self.cur.starts_with("env.") {
            self.cur.advance(4);
            let name = self.read_bare()?;
            return Ok(ScalarValue::Env(name));
        }
        match self.cur.peek() {
            Some(ch) if ch.is_ascii_digit() => self.read_date(begin),
            _ => {
                // Consume the bad token so the span covers it.
                let token_start = self.cur.offset();
                while self.cur.peek().is_some_and(is_bare_char) {
                    self.cur.bump();
                }
                let token = self.cur.slice_from(token_start).to_string();
                Err(self.err_span(
                    format!(
                        "Illegal constant @{token}; expected @true, @false, @none, @env.NAME, or a date"
                    ),
                    begin,
                ))
            }
        }
    }

    fn bare_char_at(&self, n: usize) -> bool {
        self.cur.peek_nth(n).is_some_and(is_bare_char)
    }

    /// Date ::= YYYY "-" MM "-" DD ("T" HH ":" MM (":" SS ("." Digits)?)? Zone?)?
    /// Zone ::= "Z" | ("+" | "-") HH ":"? MM
    fn read_date(&mut self, begin: Position) -> Result<ScalarValue, SyntaxError> {
        let start = self.cur.offset();
        self.consume_digits(4, begin)?;
        self.expect('-')?;
        self.consume_digits(2, begin)?;
        self.expect('-')?;
        self.consume_digits(2, begin)?;

        if self.cur.eat('T') {
            self.consume_digits(2, begin)?;
            self.expect(':')?;
            self.consume_digits(2, begin)?;

            if self.cur.eat(':') {
                self.consume_digits(2, begin)?;
                if self.cur.eat('.') && self.eat_digits() == 0 {
                    return Err(self.err_span("Expected fractional digits in date", begin));
                }
            }

            match self.cur.peek() {
                Some('Z') => {
                    self.cur.bump();
                }
                Some('+' | '-') => {
                    self.cur.bump();
                    self.consume_digits(2, begin)?;
                    self.cur.eat(':');
                    self.consume_digits(2, begin)?;
                }
                _ => {}
            }
        }

        let raw = self.cur.slice_from(start);
        match DateStamp::parse(raw) {
            Some(stamp) => Ok(ScalarValue::Date(stamp)),
            None => Err(self.err_span(format!("Invalid date: {raw}"), begin)),
        }
    }

    fn consume_digits(&mut self, count: usize, begin: Position) -> Result<(), SyntaxError> {
        for _ in 0..count {
            match self.cur.peek() {
                Some(ch) if ch.is_ascii_digit() => {
                    self.cur.bump();
                }
                _ => return Err(self.err_span("Expected digit", begin)),
            }
        }
        Ok(())
    }

    // === References ===

    /// Reference ::= "$" "^"* RefSegment ("." RefSegment)*
    /// RefSegment ::= Identifier ("[" Digits "]")?
    pub fn read_reference(&mut self) -> Result<ScalarValue, SyntaxError> {
        self.expect('$')?;
        let mut ups = 0;
        while self.cur.eat('^') {
            ups += 1;
        }

        let mut segments = Vec::new();
        segments.push(Segment::Name(self.read_identifier()?));
        self.read_optional_index(&mut segments)?;
        while self.cur.eat('.') {
            segments.push(Segment::Name(self.read_identifier()?));
            self.read_optional_index(&mut segments)?;
        }

        Ok(ScalarValue::Link { ups, segments })
    }

    fn read_optional_index(&mut self, segments: &mut Vec<Segment>) -> Result<(), SyntaxError> {
        if self.cur.eat('[') {
            self.skip_trivia();
            let begin = self.cur.position();
            let start = self.cur.offset();
            if self.eat_digits() == 0 {
                return Err(self.err_at("Expected array index"));
            }
            let idx = self
                .cur
                .slice_from(start)
                .parse::<usize>()
                .map_err(|_| self.err_span("Invalid array index", begin))?;
            segments.push(Segment::Index(idx));
            self.skip_trivia();
            self.expect(']')?;
        }
        Ok(())
    }
}
