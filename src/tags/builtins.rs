//! The standard Liquid tags.
//!
//! These are registered by [`Engine::new`][crate::Engine::new].

use std::iter;

use crate::body::BlockBody;
use crate::compile::{Delimiter, Expression, TagParser};
use crate::render::{assign_score_of, Interrupt, NodeRenderer};
use crate::tags::condition::Conditions;
use crate::tags::{Node, Tag};
use crate::value::{range_len, Map};
use crate::{Engine, Error, Result, Value};

pub(crate) fn register(engine: &mut Engine<'_>) {
    engine.add_tag("assign", AssignTag);
    engine.add_tag("capture", CaptureTag);
    engine.add_tag("echo", EchoTag);
    engine.add_tag("if", IfTag { negate: false });
    engine.add_tag("unless", IfTag { negate: true });
    engine.add_tag("for", ForTag);
    engine.add_tag("break", InterruptTag(Interrupt::Break));
    engine.add_tag("continue", InterruptTag(Interrupt::Continue));
    engine.add_tag("raw", RawTag);
    engine.add_tag("comment", CommentTag);
    engine.add_tag("liquid", LiquidTag);
}

type Parsed = Result<Option<Box<dyn Node>>>;

/// Parses the next body and checks it ended with `end<name>`.
fn parse_closed_body(parser: &mut TagParser<'_, '_>) -> Result<BlockBody> {
    let (body, delimiter) = parser.parse_body()?;
    expect_end(parser, delimiter)?;
    Ok(body)
}

fn expect_end(parser: &TagParser<'_, '_>, delimiter: Option<Delimiter<'_>>) -> Result<()> {
    match delimiter {
        Some(d) if is_end(parser, &d) => Ok(()),
        d => Err(parser.err_unexpected_delimiter(d)),
    }
}

fn is_end(parser: &TagParser<'_, '_>, d: &Delimiter<'_>) -> bool {
    d.name().strip_prefix("end") == Some(parser.name())
}

////////////////////////////////////////////////////////////////////////////////
// assign
////////////////////////////////////////////////////////////////////////////////

/// `{% assign name = expression | filter %}`
struct AssignTag;

#[derive(Debug)]
struct Assign {
    name: String,
    value: Expression,
}

impl Tag for AssignTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Parsed {
        let err = || {
            Error::syntax_msg("Syntax Error in 'assign' - Valid syntax: assign [var] = [source]")
        };
        let (name, value) = parser.markup().split_once('=').ok_or_else(err)?;
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(err());
        }
        let mut p = parser.parser_for(value)?;
        let value = p.filtered_expression()?;
        p.finish()?;
        Ok(Some(Box::new(Assign {
            name: name.to_owned(),
            value,
        })))
    }
}

impl Node for Assign {
    fn render(&self, r: &mut NodeRenderer<'_, '_>) -> Result<()> {
        let value = r.evaluate(&self.value)?;
        let cx = r.context();
        cx.resource_limits_mut()
            .increment_assign_score(assign_score_of(&value))?;
        cx.assign(self.name.as_str(), value);
        Ok(())
    }

    fn blank(&self) -> bool {
        true
    }
}

////////////////////////////////////////////////////////////////////////////////
// capture
////////////////////////////////////////////////////////////////////////////////

/// `{% capture name %} ... {% endcapture %}`
struct CaptureTag;

#[derive(Debug)]
struct Capture {
    name: String,
    body: BlockBody,
}

impl Tag for CaptureTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Parsed {
        let mut p = parser.parser()?;
        let name = p.ident()?.to_owned();
        p.finish()?;
        let body = parse_closed_body(parser)?;
        Ok(Some(Box::new(Capture { name, body })))
    }
}

impl Node for Capture {
    fn render(&self, r: &mut NodeRenderer<'_, '_>) -> Result<()> {
        let output = r.capture_body(self.body)?;
        r.context().assign(self.name.as_str(), Value::String(output));
        Ok(())
    }

    fn blank(&self) -> bool {
        true
    }
}

////////////////////////////////////////////////////////////////////////////////
// echo
////////////////////////////////////////////////////////////////////////////////

/// `{% echo expression | filter %}`, the same as a `{{ .. }}` variable.
struct EchoTag;

impl Tag for EchoTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Parsed {
        parser.add_variable()?;
        Ok(None)
    }
}

////////////////////////////////////////////////////////////////////////////////
// if / unless
////////////////////////////////////////////////////////////////////////////////

/// `{% if a %} ... {% elsif b %} ... {% else %} ... {% endif %}` and the
/// same with `unless`, which negates the first condition.
struct IfTag {
    negate: bool,
}

#[derive(Debug)]
struct If {
    branches: Vec<Branch>,
    otherwise: Option<BlockBody>,
    blank: bool,
}

#[derive(Debug)]
struct Branch {
    conditions: Conditions,
    negate: bool,
    body: BlockBody,
}

impl Tag for IfTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Parsed {
        let mut conditions = Some(Conditions::parse(&mut parser.parser()?)?);
        let mut negate = self.negate;
        let mut branches = Vec::new();
        let mut otherwise = None;
        let mut blank = true;

        loop {
            let (body, delimiter) = parser.parse_body()?;
            blank &= parser.is_blank(body)?;
            match conditions.take() {
                Some(conditions) => branches.push(Branch {
                    conditions,
                    negate,
                    body,
                }),
                None => otherwise = Some(body),
            }
            negate = false;

            match delimiter {
                Some(d) if is_end(parser, &d) => break,
                Some(d) if d.name() == "elsif" && otherwise.is_none() => {
                    conditions = Some(Conditions::parse(&mut d.parser()?)?);
                }
                Some(d) if d.name() == "else" && otherwise.is_none() => {}
                d => return Err(parser.err_unexpected_delimiter(d)),
            }
        }

        Ok(Some(Box::new(If {
            branches,
            otherwise,
            blank,
        })))
    }
}

impl Node for If {
    fn render(&self, r: &mut NodeRenderer<'_, '_>) -> Result<()> {
        for branch in &self.branches {
            if branch.conditions.evaluate(r.context())? != branch.negate {
                return r.render_body(branch.body);
            }
        }
        match self.otherwise {
            Some(body) => r.render_body(body),
            None => Ok(()),
        }
    }

    fn blank(&self) -> bool {
        self.blank
    }
}

////////////////////////////////////////////////////////////////////////////////
// for
////////////////////////////////////////////////////////////////////////////////

/// `{% for item in collection reversed limit: 2 offset: 1 %} ... {% else %}
/// ... {% endfor %}`
struct ForTag;

#[derive(Debug)]
struct For {
    var: String,
    collection: Expression,
    reversed: bool,
    limit: Option<Expression>,
    offset: Option<Expression>,
    body: BlockBody,
    otherwise: Option<BlockBody>,
    blank: bool,
}

impl Tag for ForTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Parsed {
        let err = || {
            Error::syntax_msg(
                "Syntax Error in 'for loop' - Valid syntax: for [item] in [collection]",
            )
        };
        let mut p = parser.parser()?;
        let var = p.ident()?.to_owned();
        if !p.keyword("in")? {
            return Err(err());
        }
        let collection = p.expression()?;
        let mut reversed = false;
        let mut limit = None;
        let mut offset = None;
        while !p.is_finished() {
            if p.keyword("reversed")? {
                reversed = true;
                continue;
            }
            p.symbol(",")?;
            let attr = p.ident()?;
            if !p.symbol(":")? {
                return Err(err());
            }
            let value = p.expression()?;
            match attr {
                "limit" => limit = Some(value),
                "offset" => offset = Some(value),
                _ => {
                    return Err(Error::syntax_msg(format!(
                        "Invalid attribute '{attr}' in 'for loop'"
                    )))
                }
            }
        }

        let (body, delimiter) = parser.parse_body()?;
        let mut blank = parser.is_blank(body)?;
        let otherwise = match delimiter {
            Some(d) if d.name() == "else" => {
                let otherwise = parse_closed_body(parser)?;
                blank &= parser.is_blank(otherwise)?;
                Some(otherwise)
            }
            d => {
                expect_end(parser, d)?;
                None
            }
        };

        Ok(Some(Box::new(For {
            var,
            collection,
            reversed,
            limit,
            offset,
            body,
            otherwise,
            blank,
        })))
    }
}

/// The items of a loop, ranges are not materialized.
type Items = Box<dyn DoubleEndedIterator<Item = Value>>;

impl For {
    /// Evaluates the collection and applies `offset` and `limit`, returning
    /// the number of items and the items.
    fn items(&self, r: &mut NodeRenderer<'_, '_>) -> Result<(usize, Items)> {
        let offset = match &self.offset {
            Some(expr) => non_negative(r.evaluate(expr)?.to_integer()?),
            None => 0,
        };
        let limit = match &self.limit {
            Some(expr) => Some(non_negative(r.evaluate(expr)?.to_integer()?)),
            None => None,
        };
        let window = |len: usize| {
            let from = offset.min(len);
            let to = limit.map_or(len, |limit| from.saturating_add(limit).min(len));
            from..to
        };

        let items = match r.evaluate(&self.collection)? {
            Value::List(list) => {
                let w = window(list.len());
                sized(w.len(), list.into_iter().skip(w.start).take(w.len()))
            }
            Value::Range(m, n) => {
                let len = usize::try_from(range_len(m, n)).unwrap_or(usize::MAX);
                let w = window(len);
                sized(w.len(), w.map(move |i| Value::Integer(m + i as i64)))
            }
            Value::Map(map) => {
                let w = window(map.len());
                let items = map
                    .into_iter()
                    .skip(w.start)
                    .take(w.len())
                    .map(|(k, v)| Value::List(vec![Value::String(k), v]));
                sized(w.len(), items)
            }
            Value::String(s) if !s.is_empty() && !window(1).is_empty() => {
                sized(1, iter::once(Value::String(s)))
            }
            _ => sized(0, iter::empty()),
        };
        Ok(items)
    }
}

fn sized<I>(len: usize, items: I) -> (usize, Items)
where
    I: DoubleEndedIterator<Item = Value> + 'static,
{
    (len, Box::new(items))
}

fn non_negative(n: i64) -> usize {
    usize::try_from(n).unwrap_or(0)
}

impl Node for For {
    fn render(&self, r: &mut NodeRenderer<'_, '_>) -> Result<()> {
        let (length, items) = self.items(r)?;
        if length == 0 {
            return match self.otherwise {
                Some(body) => r.render_body(body),
                None => Ok(()),
            };
        }
        let items: Box<dyn Iterator<Item = Value>> = match self.reversed {
            true => Box::new(items.rev()),
            false => Box::new(items),
        };

        r.context().push_scope(Map::new());
        let mut result = Ok(());
        for (i, item) in items.enumerate() {
            let cx = r.context();
            cx.set(self.var.as_str(), item);
            cx.set("forloop", forloop(i, length));
            result = r.render_body(self.body);
            if result.is_err() {
                break;
            }
            if let Some(Interrupt::Break) = r.context().pop_interrupt() {
                break;
            }
        }
        r.context().pop_scope();
        result
    }

    fn blank(&self) -> bool {
        self.blank
    }
}

fn forloop(i: usize, length: usize) -> Value {
    let mut map = Map::new();
    map.insert("index".into(), Value::from(i + 1));
    map.insert("index0".into(), Value::from(i));
    map.insert("rindex".into(), Value::from(length - i));
    map.insert("rindex0".into(), Value::from(length - i - 1));
    map.insert("first".into(), Value::Bool(i == 0));
    map.insert("last".into(), Value::Bool(i + 1 == length));
    map.insert("length".into(), Value::from(length));
    Value::Map(map)
}

////////////////////////////////////////////////////////////////////////////////
// break / continue
////////////////////////////////////////////////////////////////////////////////

struct InterruptTag(Interrupt);

#[derive(Debug)]
struct InterruptNode(Interrupt);

impl Tag for InterruptTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Parsed {
        parser.parser()?.finish()?;
        Ok(Some(Box::new(InterruptNode(self.0))))
    }
}

impl Node for InterruptNode {
    fn render(&self, r: &mut NodeRenderer<'_, '_>) -> Result<()> {
        r.context().push_interrupt(self.0);
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// raw / comment
////////////////////////////////////////////////////////////////////////////////

/// `{% raw %}{{ not parsed }}{% endraw %}`
struct RawTag;

#[derive(Debug)]
struct Raw(BlockBody);

impl Tag for RawTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Parsed {
        let body = parser.parse_raw_body()?;
        Ok(Some(Box::new(Raw(body))))
    }
}

impl Node for Raw {
    fn render(&self, r: &mut NodeRenderer<'_, '_>) -> Result<()> {
        r.render_body(self.0)
    }
}

/// `{% comment %} ... {% endcomment %}`, nothing inside is parsed.
struct CommentTag;

impl Tag for CommentTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Parsed {
        parser.parse_raw_body()?;
        Ok(None)
    }
}

////////////////////////////////////////////////////////////////////////////////
// liquid
////////////////////////////////////////////////////////////////////////////////

/// `{% liquid %}` with one tag per line and no delimiters.
struct LiquidTag;

#[derive(Debug)]
struct Liquid {
    body: BlockBody,
    blank: bool,
}

impl Tag for LiquidTag {
    fn parse(&self, parser: &mut TagParser<'_, '_>) -> Parsed {
        let body = parser.parse_liquid_body()?;
        let blank = parser.is_blank(body)?;
        Ok(Some(Box::new(Liquid { body, blank })))
    }
}

impl Node for Liquid {
    fn render(&self, r: &mut NodeRenderer<'_, '_>) -> Result<()> {
        r.render_body(self.body)
    }

    fn blank(&self) -> bool {
        self.blank
    }
}
