//! Compile a template into a program that can be executed by the renderer.
//!
//! This process has four stages:
//! - The tokenizer chunks the template source into raw text, tags and
//!   variables.
//! - The lexer tokenizes the markup of each tag and variable.
//! - The parser emits instructions for expressions straight into an
//!   assembler, there is no syntax tree.
//! - Block bodies are sealed into one document buffer as they complete.

pub(crate) mod assemble;
mod block;
mod expression;
mod lex;
mod parse;
mod tokenize;

pub use crate::compile::block::{Delimiter, TagParser};
pub use crate::compile::expression::{Expression, MarkupParser};
use crate::body::serialize;
use crate::compile::block::{Compiler, Loader};
use crate::compile::tokenize::Tokenizer;
use crate::types::program::Program;
use crate::types::span::Span;
use crate::{Engine, Result};

/// Compile a template into a program.
pub fn template(engine: &Engine<'_>, source: &str) -> Result<Program> {
    let line = if engine.line_numbers { 1 } else { 0 };
    let mut tokens = Tokenizer::new(source, line);
    let mut compiler = Compiler::new(engine, source);
    let (entrypoint, _) = compiler.parse_block(&mut tokens, false)?;
    let program = compiler.finish(entrypoint);
    log::debug!(
        "compiled {} byte template into {} byte document with {} constants and {} nodes",
        source.len(),
        program.document.buffer().len(),
        program.document.constants().len(),
        program.nodes.len()
    );
    Ok(program)
}

/// Load a precompiled template, rebuilding its nodes.
pub fn load(engine: &Engine<'_>, data: &[u8]) -> Result<Program> {
    let document = serialize::load(data)?;
    let nodes = {
        let mut loader = Loader::new(engine, &document);
        loader.rebuild(document.entrypoint())?;
        loader.into_nodes()
    };
    Ok(Program { document, nodes })
}

/// Compile a standalone expression, e.g. for use as a tag argument.
pub fn expression(source: &str) -> Result<Expression> {
    let mut p = MarkupParser::new(source, Span::from(0..source.len()))?;
    let expr = p.filtered_expression()?;
    p.finish()?;
    Ok(expr)
}
