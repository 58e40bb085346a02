use std::fmt;

use crate::compile::assemble::Assembler;
use crate::compile::lex::Token;
use crate::compile::parse::Parser;
use crate::instr::disassemble;
use crate::render::{self, Context};
use crate::types::span::Span;
use crate::{Result, Value};

/// A compiled expression, for example the condition of an `if` tag.
///
/// Constant expressions are stored as their value, everything else is
/// compiled to instructions that are evaluated on the renderer's stack.
#[derive(Clone)]
pub struct Expression {
    repr: Repr,
}

#[derive(Clone)]
enum Repr {
    Constant(Value),
    Code {
        code: Vec<u8>,
        constants: Vec<Value>,
        max_stack: usize,
    },
}

impl Expression {
    fn from_assembler(mut asm: Assembler) -> Self {
        asm.add_leave();
        let (code, constants, max_stack) = asm.into_parts();
        Self {
            repr: Repr::Code {
                code: code.into_vec(),
                constants,
                max_stack,
            },
        }
    }

    /// Returns the value if the expression is constant.
    pub fn constant(&self) -> Option<&Value> {
        match &self.repr {
            Repr::Constant(value) => Some(value),
            Repr::Code { .. } => None,
        }
    }

    /// Evaluates the expression in the given context.
    pub fn evaluate(&self, cx: &mut Context<'_>) -> Result<Value> {
        match &self.repr {
            Repr::Constant(value) => Ok(value.clone()),
            Repr::Code {
                code,
                constants,
                max_stack,
            } => render::evaluate(cx, code, constants, *max_stack),
        }
    }

    /// Returns a listing of the instructions that evaluate the expression.
    pub fn disassemble(&self) -> Result<String> {
        match &self.repr {
            Repr::Constant(value) => {
                let mut asm = Assembler::new();
                asm.add_push_literal(value.clone())?;
                asm.add_leave();
                disassemble(asm.code(), asm.constants())
            }
            Repr::Code {
                code, constants, ..
            } => disassemble(code, constants),
        }
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
            Repr::Code { code, .. } => f
                .debug_struct("Code")
                .field("bytes", &code.len())
                .finish_non_exhaustive(),
        }
    }
}

/// Parses the markup of a tag.
///
/// This wraps the expression parser with the handful of operations tags
/// need: expressions, identifiers, keywords, comparison operators and
/// punctuation.
pub struct MarkupParser<'s> {
    parser: Parser<'s>,
}

impl<'s> MarkupParser<'s> {
    pub(crate) fn new(source: &'s str, span: Span) -> Result<Self> {
        Parser::new(source, span).map(|parser| Self { parser })
    }

    /// Parses an expression without filters.
    pub fn expression(&mut self) -> Result<Expression> {
        if let Some(value) = self.parser.try_parse_constant()? {
            return Ok(Expression {
                repr: Repr::Constant(value),
            });
        }
        let mut asm = Assembler::new();
        self.parser.parse_expression(&mut asm)?;
        Ok(Expression::from_assembler(asm))
    }

    /// Parses an expression followed by any number of filters.
    pub fn filtered_expression(&mut self) -> Result<Expression> {
        let mut p = self.parser.clone();
        if let Some(value) = p.try_parse_constant()? {
            if !p.look(Token::Pipe) {
                self.parser = p;
                return Ok(Expression {
                    repr: Repr::Constant(value),
                });
            }
        }
        let mut asm = Assembler::new();
        self.parser.parse_filtered_expression(&mut asm)?;
        Ok(Expression::from_assembler(asm))
    }

    /// Parses an identifier.
    pub fn ident(&mut self) -> Result<&'s str> {
        let span = self.parser.consume(Token::Ident)?;
        Ok(&self.parser.source()[span])
    }

    /// Returns `true` if the next token is the given identifier.
    pub fn look_keyword(&self, keyword: &str) -> bool {
        self.parser.look_ident(keyword)
    }

    /// Parses the given identifier if it is next.
    pub fn keyword(&mut self, keyword: &str) -> Result<bool> {
        if !self.parser.look_ident(keyword) {
            return Ok(false);
        }
        self.parser.advance()?;
        Ok(true)
    }

    /// Parses a comparison operator if it is next, e.g. `==` or `contains`.
    pub fn comparison(&mut self) -> Result<Option<&'s str>> {
        match self.parser.consume_optional(Token::Comparison)? {
            Some(span) => Ok(Some(&self.parser.source()[span])),
            None => Ok(None),
        }
    }

    /// Parses the given punctuation if it is next, e.g. `:` or `,`.
    pub fn symbol(&mut self, symbol: &str) -> Result<bool> {
        let punct = matches!(
            self.parser.current(),
            Token::Colon
                | Token::Comma
                | Token::Pipe
                | Token::Dot
                | Token::DotDot
                | Token::OpenSquare
                | Token::CloseSquare
                | Token::OpenRound
                | Token::CloseRound
        );
        if !(punct && self.parser.text() == symbol) {
            return Ok(false);
        }
        self.parser.advance()?;
        Ok(true)
    }

    /// Returns `true` if the whole markup has been parsed.
    pub fn is_finished(&self) -> bool {
        self.parser.look(Token::Eos)
    }

    /// Makes sure the whole markup has been parsed.
    pub fn finish(&self) -> Result<()> {
        self.parser.finish()
    }

    /// Parses a filtered expression into an existing assembler, used for
    /// variables that compile inline into a block body.
    pub(crate) fn assemble_filtered(&mut self, asm: &mut Assembler) -> Result<()> {
        self.parser.parse_filtered_expression(asm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{value, Engine};

    fn parser(source: &str) -> MarkupParser<'_> {
        MarkupParser::new(source, Span::from(0..source.len())).unwrap()
    }

    #[test]
    fn constant_fast_path() {
        let expr = parser("(1..3)").expression().unwrap();
        assert_eq!(expr.constant(), Some(&Value::Range(1, 3)));
        assert_eq!(
            expr.disassemble().unwrap(),
            "0x0000: push_const(1..3)\n0x0003: leave\n"
        );
    }

    #[test]
    fn filtered_constant_is_code() {
        let expr = parser("'a' | upcase").filtered_expression().unwrap();
        assert!(expr.constant().is_none());
        let expr = parser("'a'").filtered_expression().unwrap();
        assert_eq!(expr.constant(), Some(&Value::from("a")));
    }

    #[test]
    fn evaluate_code() {
        let engine = Engine::empty();
        let mut cx = Context::new(&engine);
        cx.push_environment(value! { a: { b: [1, 2, 3] } }).unwrap();
        let expr = parser("a.b.last").expression().unwrap();
        assert_eq!(expr.evaluate(&mut cx).unwrap(), Value::Integer(3));
    }

    #[test]
    fn tag_markup_operations() {
        let mut p = parser("item in items limit: 2, reversed");
        assert_eq!(p.ident().unwrap(), "item");
        assert!(!p.keyword("on").unwrap());
        assert!(p.keyword("in").unwrap());
        p.expression().unwrap();
        assert!(p.look_keyword("limit"));
        assert_eq!(p.ident().unwrap(), "limit");
        assert!(p.symbol(":").unwrap());
        p.expression().unwrap();
        assert!(!p.symbol(":").unwrap());
        assert!(p.symbol(",").unwrap());
        assert!(p.keyword("reversed").unwrap());
        assert!(p.is_finished());
        p.finish().unwrap();
    }

    #[test]
    fn comparison_operators() {
        let mut p = parser("a contains 'b'");
        p.expression().unwrap();
        assert_eq!(p.comparison().unwrap(), Some("contains"));
        p.expression().unwrap();
        assert_eq!(p.comparison().unwrap(), None);
    }
}
