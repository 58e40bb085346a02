//! Parses template tokens into block bodies.
//!
//! Raw text and variables are compiled inline into the body's instructions.
//! Tags are handed to the [`Tag`][crate::Tag] registered under their name,
//! the node a tag returns is stored in the program and referenced by a
//! `write_node` instruction. A tag that is not registered ends a nested body
//! and is handed back to the enclosing tag as a [`Delimiter`], e.g. `else` or
//! `endif`.
//!
//! Loading a precompiled template runs the same tags again but walks the tag
//! records stored in each body instead of the source.

use crate::body::{
    BlockBody, BlockBodyBuilder, Document, DocumentBuilder, TagRecord, TagRecordBuilder,
};
use crate::compile::expression::MarkupParser;
use crate::compile::tokenize::{trim, Token, TokenKind, Tokenizer};
use crate::tags::Resolution;
use crate::types::program::{NodeEntry, Program};
use crate::types::span::{offset_in, Span};
use crate::{Engine, Error, Result};

/// Compiles template source into a document and its nodes.
pub(crate) struct Compiler<'s> {
    engine: &'s Engine<'s>,
    source: &'s str,
    document: DocumentBuilder,
    nodes: Vec<NodeEntry>,
}

/// Rebuilds the nodes of a loaded document from its tag records.
pub(crate) struct Loader<'s> {
    engine: &'s Engine<'s>,
    document: &'s Document,
    nodes: Vec<NodeEntry>,
}

/// The interface a [`Tag`][crate::Tag] parses itself through.
pub struct TagParser<'p, 's> {
    name: &'s str,
    markup_source: &'s str,
    markup_span: Span,
    line: Option<u32>,
    mode: Mode<'p, 's>,
}

enum Mode<'p, 's> {
    Compile {
        compiler: &'p mut Compiler<'s>,
        tokens: &'p mut Tokenizer<'s>,
        parent: &'p mut BlockBodyBuilder,
        token: Token,
        /// The record that the next parsed body is attached to.
        attach: usize,
    },
    Load {
        loader: &'p mut Loader<'s>,
        records: &'p [TagRecord<'s>],
        attach: usize,
        /// The next unread record.
        cursor: usize,
    },
}

/// An unregistered tag that ended a block body, e.g. `else` or `endfor`.
#[derive(Debug, Clone, Copy)]
pub struct Delimiter<'s> {
    name: &'s str,
    markup_source: &'s str,
    markup_span: Span,
    line: Option<u32>,
}

////////////////////////////////////////////////////////////////////////////////
// Compiler
////////////////////////////////////////////////////////////////////////////////

impl<'s> Compiler<'s> {
    pub fn new(engine: &'s Engine<'s>, source: &'s str) -> Self {
        Self {
            engine,
            source,
            document: DocumentBuilder::new(),
            nodes: Vec::new(),
        }
    }

    pub fn finish(self, entrypoint: BlockBody) -> Program {
        Program {
            document: self.document.finish(entrypoint),
            nodes: self.nodes,
        }
    }

    /// Parses tokens into a block body until the tokens are exhausted or, if
    /// `nested`, an unregistered tag is found.
    pub fn parse_block(
        &mut self,
        tokens: &mut Tokenizer<'s>,
        nested: bool,
    ) -> Result<(BlockBody, Option<Delimiter<'s>>)> {
        let source = self.source;
        let mut body = BlockBodyBuilder::new();
        let mut delimiter = None;

        while let Some(token) = tokens.next() {
            let line = (token.line_number != 0).then_some(token.line_number);
            match token.kind {
                TokenKind::Raw => body.add_write_raw(&source[token.trimmed]),
                TokenKind::BlankLine => {}
                TokenKind::Variable => {
                    body.render_score += 1;
                    self.compile_variable(&mut body, token.markup(source), line)?;
                }
                TokenKind::Tag => {
                    if let Some(d) = self.parse_tag(tokens, &mut body, token, line, nested)? {
                        delimiter = Some(d);
                        break;
                    }
                }
                TokenKind::Invalid => return Err(self.err_unterminated(token, line)),
            }
        }

        body.asm.add_leave();
        let body = self.document.seal(body, nested)?;
        Ok((body, delimiter))
    }

    /// Compiles a variable as a unit that renders the error message instead
    /// of failing the whole render.
    fn compile_variable(
        &mut self,
        body: &mut BlockBodyBuilder,
        markup: Span,
        line: Option<u32>,
    ) -> Result<()> {
        body.blank = false;
        body.asm.add_render_variable_rescue(line.unwrap_or(0));
        let mut p = MarkupParser::new(self.source, markup).map_err(|err| err.with_line(line))?;
        p.assemble_filtered(&mut body.asm)
            .and_then(|_| p.finish())
            .map_err(|err| err.with_line(line))?;
        body.asm.add_pop_write();
        Ok(())
    }

    fn parse_tag(
        &mut self,
        tokens: &mut Tokenizer<'s>,
        body: &mut BlockBodyBuilder,
        token: Token,
        line: Option<u32>,
        nested: bool,
    ) -> Result<Option<Delimiter<'s>>> {
        let source = self.source;
        let content = token.markup(source);
        let text = &source[content];
        let name_len = text
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(text.len());
        if name_len == 0 {
            let msg = format!("expected tag name, found `{text}`");
            return Err(Error::syntax(msg, source, content).with_line(line));
        }
        let name = &source[content.m..content.m + name_len];
        let markup_span = trim(source, Span::from(content.m + name_len..content.n), true, true);

        let engine = self.engine;
        let tag = match engine.resolve_tag(name) {
            Resolution::Found(tag) => tag,
            Resolution::NotFound if nested => {
                return Ok(Some(Delimiter {
                    name,
                    markup_source: source,
                    markup_span,
                    line,
                }));
            }
            Resolution::NotFound => {
                let msg = format!("Unknown tag '{name}'");
                return Err(Error::syntax(msg, source, content).with_line(line));
            }
        };

        log::trace!("parsing `{name}` tag");
        let attach = body.tags.len();
        body.tags
            .push(TagRecordBuilder::new(name, &source[markup_span], line));
        let mut parser = TagParser {
            name,
            markup_source: source,
            markup_span,
            line,
            mode: Mode::Compile {
                compiler: &mut *self,
                tokens: &mut *tokens,
                parent: &mut *body,
                token,
                attach,
            },
        };
        let node = tag.parse(&mut parser).map_err(|err| err.with_line(line))?;

        body.render_score += 1;
        if let Some(node) = node {
            body.blank &= node.blank();
            let index = u16::try_from(self.nodes.len())
                .map_err(|_| Error::syntax_msg("too many tags in one template"))?;
            body.asm.add_write_node(index);
            self.nodes.push(NodeEntry { node, line });
        }
        Ok(None)
    }

    fn err_unterminated(&self, token: Token, line: Option<u32>) -> Error {
        let span = match token.full.len() > 2 {
            // A variable cut short by a single `}`.
            true => token.full,
            false => {
                let rest = &self.source[token.full.m..];
                Span::from(token.full.m..token.full.m + rest.find('\n').unwrap_or(rest.len()))
            }
        };
        let text = &self.source[span];
        let msg = match text.starts_with("{%") {
            true => format!("tag '{text}' was not properly terminated with '%}}'"),
            false => format!("variable '{text}' was not properly terminated with '}}}}'"),
        };
        Error::syntax(msg, self.source, span).with_line(line)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Loader
////////////////////////////////////////////////////////////////////////////////

impl<'s> Loader<'s> {
    pub fn new(engine: &'s Engine<'s>, document: &'s Document) -> Self {
        Self {
            engine,
            document,
            nodes: Vec::new(),
        }
    }

    pub fn into_nodes(self) -> Vec<NodeEntry> {
        self.nodes
    }

    /// Rebuilds the nodes of the tags in a body, in the same order the
    /// compiler created them.
    pub fn rebuild(&mut self, body: BlockBody) -> Result<()> {
        let document = self.document;
        let engine = self.engine;
        let records = document
            .block(body)?
            .tags()
            .collect::<Result<Vec<_>>>()?;

        // Child bodies are sealed before their parent.
        if let Some(child) = records
            .iter()
            .filter_map(|record| record.body)
            .find(|child| child.0 >= body.0)
        {
            return Err(Error::deserialize(format!(
                "invalid tag body offset {} in body at offset {}",
                child.0, body.0
            )));
        }

        let mut i = 0;
        while i < records.len() {
            let record = records[i];
            if record.unknown {
                i += 1;
                continue;
            }
            let tag = match engine.resolve_tag(record.name) {
                Resolution::Found(tag) => tag,
                Resolution::NotFound => {
                    return Err(Error::deserialize(format!(
                        "unknown tag '{}'",
                        record.name
                    )));
                }
            };
            let mut parser = TagParser {
                name: record.name,
                markup_source: record.markup,
                markup_span: Span::from(0..record.markup.len()),
                line: record.line,
                mode: Mode::Load {
                    loader: &mut *self,
                    records: &records,
                    attach: i,
                    cursor: i + 1,
                },
            };
            let node = tag.parse(&mut parser)?;
            i = match parser.mode {
                Mode::Load { cursor, .. } => cursor,
                Mode::Compile { .. } => i + 1,
            };
            if let Some(node) = node {
                self.nodes.push(NodeEntry {
                    node,
                    line: record.line,
                });
            }
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// TagParser
////////////////////////////////////////////////////////////////////////////////

impl<'p, 's> TagParser<'p, 's> {
    /// The name of the tag, e.g. `if`.
    pub fn name(&self) -> &'s str {
        self.name
    }

    /// The markup after the tag name with surrounding whitespace removed.
    pub fn markup(&self) -> &'s str {
        &self.markup_source[self.markup_span]
    }

    pub fn line_number(&self) -> Option<u32> {
        self.line
    }

    /// Returns a parser over the markup.
    pub fn parser(&self) -> Result<MarkupParser<'s>> {
        MarkupParser::new(self.markup_source, self.markup_span)
    }

    /// Returns a parser over part of the markup.
    pub fn parser_for(&self, part: &'s str) -> Result<MarkupParser<'s>> {
        let m = offset_in(self.markup_source, part)
            .ok_or_else(|| Error::internal("markup part is not a slice of the markup"))?;
        MarkupParser::new(self.markup_source, Span::from(m..m + part.len()))
    }

    /// Parses the next block body, returning it and the tag that ended it.
    ///
    /// `None` means the template ended without a delimiter.
    pub fn parse_body(&mut self) -> Result<(BlockBody, Option<Delimiter<'s>>)> {
        match &mut self.mode {
            Mode::Compile {
                compiler,
                tokens,
                parent,
                attach,
                ..
            } => {
                let (body, delimiter) = compiler.parse_block(tokens, true)?;
                parent.tags[*attach].body = Some(body);
                if let Some(d) = &delimiter {
                    parent
                        .tags
                        .push(TagRecordBuilder::unknown(d.name, d.markup(), d.line));
                    *attach = parent.tags.len() - 1;
                }
                Ok((body, delimiter))
            }
            Mode::Load {
                loader,
                records,
                attach,
                cursor,
            } => {
                let body = stored_body(records, *attach)?;
                loader.rebuild(body)?;
                let delimiter = match records.get(*cursor) {
                    Some(record) if record.unknown => {
                        *attach = *cursor;
                        *cursor += 1;
                        Some(Delimiter {
                            name: record.name,
                            markup_source: record.markup,
                            markup_span: Span::from(0..record.markup.len()),
                            line: record.line,
                        })
                    }
                    _ => None,
                };
                Ok((body, delimiter))
            }
        }
    }

    /// Takes the source up to the matching `end<name>` tag verbatim, tags
    /// and variables inside it are not parsed.
    pub fn parse_raw_body(&mut self) -> Result<BlockBody> {
        let name = self.name;
        match &mut self.mode {
            Mode::Compile {
                compiler,
                tokens,
                parent,
                token,
                attach,
            } => {
                let source = compiler.source;
                let end = loop {
                    match tokens.next() {
                        Some(t) if t.kind == TokenKind::Tag && is_end_tag(source, &t, name) => {
                            break t
                        }
                        Some(_) => {}
                        None => {
                            return Err(Error::syntax_msg(format!(
                                "'{name}' tag was never closed"
                            )))
                        }
                    }
                };
                let content = trim(
                    source,
                    Span::from(token.full.n..end.full.m),
                    token.rstrip,
                    end.lstrip,
                );
                let mut builder = BlockBodyBuilder::new();
                builder.add_write_raw(&source[content]);
                builder.asm.add_leave();
                let body = compiler.document.seal(builder, false)?;
                parent.tags[*attach].body = Some(body);
                Ok(body)
            }
            Mode::Load {
                records, attach, ..
            } => stored_body(records, *attach),
        }
    }

    /// Parses the markup as a `liquid` tag body, one tag per line.
    pub fn parse_liquid_body(&mut self) -> Result<BlockBody> {
        let markup_span = self.markup_span;
        match &mut self.mode {
            Mode::Compile {
                compiler,
                parent,
                token,
                attach,
                ..
            } => {
                let source = compiler.source;
                let line = match token.line_number {
                    0 => 0,
                    n => {
                        let before = &source[token.full.m..markup_span.m];
                        n + before.bytes().filter(|&b| b == b'\n').count() as u32
                    }
                };
                let mut tokens = Tokenizer::for_liquid_tag(source, markup_span, line);
                let (body, _) = compiler.parse_block(&mut tokens, false)?;
                parent.tags[*attach].body = Some(body);
                Ok(body)
            }
            Mode::Load {
                loader,
                records,
                attach,
                ..
            } => {
                let body = stored_body(records, *attach)?;
                loader.rebuild(body)?;
                Ok(body)
            }
        }
    }

    /// Compiles the markup inline into the enclosing body as a variable,
    /// the tag itself then renders nothing.
    pub fn add_variable(&mut self) -> Result<()> {
        let (markup_span, line) = (self.markup_span, self.line);
        match &mut self.mode {
            Mode::Compile {
                compiler, parent, ..
            } => compiler.compile_variable(parent, markup_span, line),
            Mode::Load { .. } => Ok(()),
        }
    }

    /// Whether a parsed body is blank.
    pub fn is_blank(&self, body: BlockBody) -> Result<bool> {
        match &self.mode {
            Mode::Compile { compiler, .. } => Ok(compiler.document.header(body)?.is_blank()),
            Mode::Load { loader, .. } => Ok(loader.document.block(body)?.is_blank()),
        }
    }

    /// Returns the error for a body that ended with an unexpected delimiter
    /// or not at all.
    pub fn err_unexpected_delimiter(&self, delimiter: Option<Delimiter<'_>>) -> Error {
        match delimiter {
            Some(d) => Error::syntax_msg(format!("Unknown tag '{}'", d.name)).with_line(d.line),
            None => Error::syntax_msg(format!("'{}' tag was never closed", self.name)),
        }
    }
}

fn stored_body(records: &[TagRecord<'_>], attach: usize) -> Result<BlockBody> {
    records
        .get(attach)
        .and_then(|record| record.body)
        .ok_or_else(|| Error::deserialize("tag record is missing its block body"))
}

/// Whether a tag token is `end<name>`.
fn is_end_tag(source: &str, token: &Token, name: &str) -> bool {
    let text = &source[token.markup(source)];
    let word = text
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .next()
        .unwrap_or_default();
    word.strip_prefix("end") == Some(name)
}

////////////////////////////////////////////////////////////////////////////////
// Delimiter
////////////////////////////////////////////////////////////////////////////////

impl<'s> Delimiter<'s> {
    pub fn name(&self) -> &'s str {
        self.name
    }

    pub fn markup(&self) -> &'s str {
        &self.markup_source[self.markup_span]
    }

    pub fn line_number(&self) -> Option<u32> {
        self.line
    }

    /// Returns a parser over the delimiter's markup, e.g. the condition of
    /// an `elsif`.
    pub fn parser(&self) -> Result<MarkupParser<'s>> {
        MarkupParser::new(self.markup_source, self.markup_span)
    }
}
