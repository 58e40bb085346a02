use std::fmt::Display;

use crate::compile::assemble::Assembler;
use crate::compile::lex::{Lexer, Token};
use crate::types::span::Span;
use crate::{Error, Result, Value};

/// A parser for the expression language used inside tags and variables.
///
/// The parser does not build a tree, instead it emits postfix instructions
/// straight into an [`Assembler`]. It always holds the current token and the
/// one after it which is enough lookahead to tell keyword arguments apart
/// from positional ones.
#[derive(Clone)]
pub struct Parser<'source> {
    /// A lexer that tokenizes the markup.
    tokens: Lexer<'source>,

    /// The current token.
    cur: (Token, Span),

    /// The token after the current one.
    next: (Token, Span),
}

/// Lookups that are resolved as a command if there is no such key.
const COMMANDS: &[&str] = &["size", "first", "last"];

impl<'source> Parser<'source> {
    /// Construct a new parser over the given span of the source.
    pub fn new(source: &'source str, span: Span) -> Result<Self> {
        let mut tokens = Lexer::new(source, span);
        let cur = tokens.next()?;
        let next = tokens.next()?;
        Ok(Self { tokens, cur, next })
    }

    pub fn source(&self) -> &'source str {
        self.tokens.source()
    }

    /// Returns the current token.
    pub fn current(&self) -> Token {
        self.cur.0
    }

    /// Returns `true` if the current token is equal to the provided one.
    pub fn look(&self, tk: Token) -> bool {
        self.cur.0 == tk
    }

    /// Returns `true` if the token after the current one is equal to the
    /// provided one.
    pub fn look_ahead(&self, tk: Token) -> bool {
        self.next.0 == tk
    }

    /// Returns `true` if the current token is the given identifier.
    pub fn look_ident(&self, ident: &str) -> bool {
        self.look(Token::Ident) && &self.source()[self.cur.1] == ident
    }

    /// Returns the text of the current token.
    pub fn text(&self) -> &'source str {
        &self.source()[self.cur.1]
    }

    /// Advances past the current token, returning its span.
    pub fn advance(&mut self) -> Result<Span> {
        let (_, span) = self.cur;
        self.cur = self.next;
        self.next = self.tokens.next()?;
        Ok(span)
    }

    /// Parses the specified token and returns its span.
    pub fn consume(&mut self, exp: Token) -> Result<Span> {
        if !self.look(exp) {
            return Err(self.err_unexpected_token(exp.human()));
        }
        self.advance()
    }

    /// Parses the specified token if it is next.
    pub fn consume_optional(&mut self, exp: Token) -> Result<Option<Span>> {
        if !self.look(exp) {
            return Ok(None);
        }
        self.advance().map(Some)
    }

    /// Makes sure the whole markup has been parsed.
    pub fn finish(&self) -> Result<()> {
        if self.look(Token::Eos) {
            Ok(())
        } else {
            Err(self.err_unexpected_token(Token::Eos.human()))
        }
    }

    ////////////////////////////////////////////////////////////////////////
    // Expressions
    ////////////////////////////////////////////////////////////////////////

    /// Parses an expression emitting code that leaves its value on the
    /// stack.
    pub fn parse_expression(&mut self, asm: &mut Assembler) -> Result<()> {
        if let Some(value) = self.try_parse_constant()? {
            return asm.add_push_literal(value);
        }
        match self.cur.0 {
            // A range with at least one dynamic endpoint, e.g. `(1..n)`
            Token::OpenRound => {
                self.advance()?;
                self.parse_expression(asm)?;
                self.consume(Token::DotDot)?;
                self.parse_expression(asm)?;
                self.consume(Token::CloseRound)?;
                asm.add_new_int_range();
                Ok(())
            }
            Token::Ident | Token::OpenSquare => self.parse_variable_lookup(asm),
            _ => Err(self.err_unexpected_token("expression")),
        }
    }

    /// Parses a constant expression, returning `None` and leaving the parser
    /// untouched if the expression is not constant.
    pub fn try_parse_constant(&mut self) -> Result<Option<Value>> {
        let mut p = self.clone();
        let value = p.parse_constant()?;
        if value.is_some() {
            *self = p;
        }
        Ok(value)
    }

    fn parse_constant(&mut self) -> Result<Option<Value>> {
        let (tk, span) = self.cur;
        let value = match tk {
            Token::String => {
                self.advance()?;
                Value::String(self.parse_string(span))
            }
            Token::Number => {
                self.advance()?;
                self.parse_number(span)?
            }
            Token::Ident => {
                let value = match literal(&self.source()[span]) {
                    Some(value) => value,
                    None => return Ok(None),
                };
                // e.g. `blank.size` is a variable named `blank`
                if matches!(self.next.0, Token::Dot | Token::OpenSquare) {
                    return Ok(None);
                }
                self.advance()?;
                value
            }
            Token::OpenRound => {
                self.advance()?;
                let start = match self.parse_constant()? {
                    Some(start) => start,
                    None => return Ok(None),
                };
                self.consume(Token::DotDot)?;
                let end = match self.parse_constant()? {
                    Some(end) => end,
                    None => return Ok(None),
                };
                let end_span = self.consume(Token::CloseRound)?;
                let span = span.combine(end_span);
                let to_integer = |v: &Value| {
                    v.to_integer()
                        .map_err(|err| Error::syntax(err.message(), self.source(), span))
                };
                Value::Range(to_integer(&start)?, to_integer(&end)?)
            }
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Parses a variable lookup.
    ///
    ///   user.name
    ///
    ///   users[0]["name"].size
    ///
    ///   [key]
    ///
    fn parse_variable_lookup(&mut self, asm: &mut Assembler) -> Result<()> {
        if self.consume_optional(Token::OpenSquare)?.is_some() {
            self.parse_expression(asm)?;
            self.consume(Token::CloseSquare)?;
            asm.add_find_variable();
        } else {
            let span = self.consume(Token::Ident)?;
            asm.add_find_static_variable(&self.source()[span])?;
        }

        loop {
            match self.cur.0 {
                Token::OpenSquare => {
                    self.advance()?;
                    match self.try_parse_constant()? {
                        Some(Value::String(key)) => asm.add_lookup_const_key(&key)?,
                        Some(key) => {
                            asm.add_push_literal(key)?;
                            asm.add_lookup_key();
                        }
                        None => {
                            self.parse_expression(asm)?;
                            asm.add_lookup_key();
                        }
                    }
                    self.consume(Token::CloseSquare)?;
                }
                Token::Dot => {
                    self.advance()?;
                    let span = self.consume(Token::Ident)?;
                    let key = &self.source()[span];
                    if COMMANDS.contains(&key) {
                        asm.add_lookup_command(key)?;
                    } else {
                        asm.add_lookup_const_key(key)?;
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    /// Parses an expression followed by a chain of filters.
    ///
    ///   name | append: "!", sep: ", " | upcase
    ///
    /// Empty markup evaluates to nil.
    pub fn parse_filtered_expression(&mut self, asm: &mut Assembler) -> Result<()> {
        if self.look(Token::Eos) {
            return asm.add_push_literal(Value::Nil);
        }
        self.parse_expression(asm)?;
        while self.consume_optional(Token::Pipe)?.is_some() {
            let span = self.consume(Token::Ident)?;
            let argc = self.parse_filter_args(asm)?;
            asm.add_filter(&self.source()[span], argc)?;
        }
        Ok(())
    }

    /// Parses filter arguments, returning the argument count including the
    /// input value.
    ///
    /// Keyword arguments are collected separately and emitted after all the
    /// positional ones as a single map argument.
    fn parse_filter_args(&mut self, asm: &mut Assembler) -> Result<usize> {
        let mut argc = 1;
        if self.consume_optional(Token::Colon)?.is_none() {
            return Ok(argc);
        }

        let mut kwargs = Assembler::new();
        let mut pairs = 0;
        loop {
            if self.look(Token::Ident) && self.look_ahead(Token::Colon) {
                let span = self.advance()?;
                self.advance()?;
                kwargs.add_push_literal(Value::from(&self.source()[span]))?;
                self.parse_expression(&mut kwargs)?;
                pairs += 1;
            } else {
                self.parse_expression(asm)?;
                argc += 1;
            }
            if self.consume_optional(Token::Comma)?.is_none() {
                break;
            }
        }

        if pairs > 0 {
            asm.concat(&kwargs)?;
            asm.add_hash_new(pairs)?;
            argc += 1;
        }
        Ok(argc)
    }

    ////////////////////////////////////////////////////////////////////////
    // Literals
    ////////////////////////////////////////////////////////////////////////

    /// Parses an integer or a float, integers that overflow become floats.
    fn parse_number(&self, span: Span) -> Result<Value> {
        let raw = &self.source()[span];
        if !raw.contains('.') {
            if let Ok(int) = raw.parse() {
                return Ok(Value::Integer(int));
            }
        }
        raw.parse()
            .map(Value::Float)
            .map_err(|_| Error::syntax("invalid number literal", self.source(), span))
    }

    /// Strips the quotes from a string literal, the contents are kept as is.
    fn parse_string(&self, span: Span) -> String {
        let raw = &self.source()[span];
        raw[1..raw.len() - 1].to_owned()
    }

    fn err_unexpected_token(&self, exp: impl Display) -> Error {
        let (tk, span) = self.cur;
        let msg = match tk {
            Token::Eos => format!("expected {exp}, found {}", tk.human()),
            _ => format!("expected {exp}, found {} `{}`", tk.human(), &self.source()[span]),
        };
        Error::syntax(msg, self.source(), span)
    }
}

/// Returns the value of a literal identifier.
fn literal(ident: &str) -> Option<Value> {
    match ident {
        "nil" | "null" => Some(Value::Nil),
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "empty" | "blank" => Some(Value::String(String::new())),
        _ => None,
    }
}
