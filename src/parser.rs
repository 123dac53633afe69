//! Recursive-descent parser producing the statement IR.
//!
//! The parser is single pass with no lookahead beyond what
//! `starts_with` provides. Between tokens it skips whitespace and `#`
//! comments freely; at statement-list level (the top level and inside
//! `{…}` blocks) commas are additionally absorbed as whitespace. Inside
//! arrays commas stay mandatory element separators, with a trailing
//! comma allowed before `]`.

use crate::ast::{ArrayItem, ParsedValue, ScalarValue, Statement};
use crate::error::SyntaxError;
use crate::lexer::{is_bare_char, Lexer};

/// Parse a MOTLY source text into a list of statements.
///
/// # Errors
/// Returns the first [`SyntaxError`]; the parser does not recover.
pub fn parse(input: &str) -> Result<Vec<Statement>, SyntaxError> {
    let mut parser = Parser::new(input);
    parser.parse_statements_to_end()
}

/// A recursive descent parser for the MOTLY statement grammar.
#[derive(Debug)]
pub struct Parser<'a> {
    lx: Lexer<'a>,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Parser {
            lx: Lexer::new(input),
        }
    }

    // === Main Parsing Methods ===

    /// Document ::= { Statement }
    fn parse_statements_to_end(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        let mut statements = Vec::new();
        self.lx.skip_trivia_and_commas();
        while !self.lx.at_end() {
            statements.push(self.parse_statement()?);
            self.lx.skip_trivia_and_commas();
        }
        Ok(statements)
    }

    /// Statement ::= "-..." | "-" Path | Path ( ":=" Value Block?
    ///             | "=" Value Block? | ":" Block | Block )?
    fn parse_statement(&mut self) -> Result<Statement, SyntaxError> {
        if self.lx.starts_with("-...") {
            self.lx.advance(4);
            return Ok(Statement::ClearAll);
        }

        if self.lx.eat('-') {
            let path = self.parse_path()?;
            return Ok(Statement::Define {
                path,
                deleted: true,
            });
        }

        let path = self.parse_path()?;
        self.lx.skip_trivia();

        // := must win over ':' alone.
        if self.lx.starts_with(":=") {
            self.lx.advance(2);
            self.lx.skip_trivia();
            let value = self.parse_value(true)?;
            self.lx.skip_trivia();
            let properties = if self.lx.peek() == Some('{') {
                Some(self.parse_block()?)
            } else {
                None
            };
            return Ok(Statement::AssignBoth {
                path,
                value,
                properties,
            });
        }

        match self.lx.peek() {
            Some('=') => {
                let eq_begin = self.lx.position();
                self.lx.advance(1);
                self.lx.skip_trivia();

                // `= {` has no value to set; property-only operations
                // use ':' instead.
                if self.lx.peek() == Some('{') {
                    return Err(self.lx.err_span(
                        "Expected a value after '='; use ':' for property-only replacement",
                        eq_begin,
                    ));
                }

                let value = self.parse_value(true)?;
                self.lx.skip_trivia();
                let properties = if self.lx.peek() == Some('{') {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                Ok(Statement::SetValue {
                    path,
                    value,
                    properties,
                })
            }
            Some(':') => {
                self.lx.advance(1);
                self.lx.skip_trivia();
                let properties = self.parse_block()?;
                Ok(Statement::ReplaceProperties { path, properties })
            }
            Some('{') => {
                let properties = self.parse_block()?;
                Ok(Statement::MergeProperties { path, properties })
            }
            _ => Ok(Statement::Define {
                path,
                deleted: false,
            }),
        }
    }

    // === EBNF Sub-Rules ===

    /// Path ::= Identifier { "." Identifier }
    fn parse_path(&mut self) -> Result<Vec<String>, SyntaxError> {
        let mut path = vec![self.lx.read_identifier()?];
        while self.lx.eat('.') {
            path.push(self.lx.read_identifier()?);
        }
        Ok(path)
    }

    /// Value ::= Heredoc | Array | AtForm | Reference | String | Number | Bare
    fn parse_value(&mut self, allow_arrays: bool) -> Result<ParsedValue, SyntaxError> {
        if self.lx.starts_with("<<<") {
            return self
                .lx
                .read_heredoc()
                .map(|s| ParsedValue::Scalar(ScalarValue::Str(s)));
        }

        match self.lx.peek() {
            Some('[') if allow_arrays => self.parse_array().map(ParsedValue::Array),
            Some('@') => self.lx.read_at_value().map(ParsedValue::Scalar),
            Some('$') => self.lx.read_reference().map(ParsedValue::Scalar),
            Some('"') => {
                if self.lx.starts_with("\"\"\"") {
                    self.lx
                        .read_triple_double()
                        .map(|s| ParsedValue::Scalar(ScalarValue::Str(s)))
                } else {
                    self.lx
                        .read_double_quoted()
                        .map(|s| ParsedValue::Scalar(ScalarValue::Str(s)))
                }
            }
            Some('\'') => {
                if self.lx.starts_with("'''") {
                    self.lx
                        .read_triple_single_raw()
                        .map(|s| ParsedValue::Scalar(ScalarValue::Str(s)))
                } else {
                    self.lx
                        .read_single_raw()
                        .map(|s| ParsedValue::Scalar(ScalarValue::Str(s)))
                }
            }
            Some(ch) if ch == '-' || ch == '.' || ch.is_ascii_digit() => {
                self.lx.read_number_or_bare().map(ParsedValue::Scalar)
            }
            Some(ch) if is_bare_char(ch) => self
                .lx
                .read_bare()
                .map(|s| ParsedValue::Scalar(ScalarValue::Str(s))),
            _ => Err(self.lx.err_at("Expected a value")),
        }
    }

    /// Array ::= "[" [ ArrayItem { "," ArrayItem } [ "," ] ] "]"
    fn parse_array(&mut self) -> Result<Vec<ArrayItem>, SyntaxError> {
        let begin = self.lx.position();
        self.lx.expect('[')?;
        self.lx.skip_trivia();

        if self.lx.eat(']') {
            return Ok(Vec::new());
        }

        let mut items = vec![self.parse_array_item()?];
        loop {
            self.lx.skip_trivia();
            if self.lx.eat(']') {
                return Ok(items);
            }
            if self.lx.eat(',') {
                self.lx.skip_trivia();
                if self.lx.eat(']') {
                    return Ok(items);
                }
                items.push(self.parse_array_item()?);
            } else if self.lx.at_end() {
                return Err(self.lx.err_span("Unclosed '['", begin));
            } else {
                return Err(self.lx.err_at("Expected ',' or ']' in array"));
            }
        }
    }

    /// ArrayItem ::= Block | Array | Value Block?
    fn parse_array_item(&mut self) -> Result<ArrayItem, SyntaxError> {
        self.lx.skip_trivia();
        match self.lx.peek() {
            Some('{') => {
                let properties = self.parse_block()?;
                Ok(ArrayItem {
                    value: None,
                    properties: Some(properties),
                })
            }
            Some('[') => {
                let items = self.parse_array()?;
                Ok(ArrayItem {
                    value: Some(ParsedValue::Array(items)),
                    properties: None,
                })
            }
            _ => {
                let value = self.parse_value(false)?;
                self.lx.skip_trivia();
                let properties = if self.lx.peek() == Some('{') {
                    Some(self.parse_block()?)
                } else {
                    None
                };
                Ok(ArrayItem {
                    value: Some(value),
                    properties,
                })
            }
        }
    }

    /// Block ::= "{" { Statement } "}"  (commas are whitespace inside)
    fn parse_block(&mut self) -> Result<Vec<Statement>, SyntaxError> {
        let begin = self.lx.position();
        self.lx.expect('{')?;

        let mut statements = Vec::new();
        loop {
            self.lx.skip_trivia_and_commas();
            if self.lx.eat('}') {
                return Ok(statements);
            }
            if self.lx.at_end() {
                return Err(self.lx.err_span("Unclosed '{'", begin));
            }
            statements.push(self.parse_statement()?);
        }
    }
}
