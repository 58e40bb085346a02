use crate::compile::tokenize::is_space;
use crate::types::span::Span;
use crate::{Error, Result};

/// A lexer that tokenizes the markup of a single tag or variable into the
/// expression sub-language.
///
/// Spans are always relative to the full template source so that errors can
/// point at the offending text.
#[derive(Clone)]
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Lexer<'source> {
    /// The original template source.
    source: &'source str,

    /// A cursor over the markup.
    cursor: usize,

    /// The end of the markup.
    end: usize,
}

/// The unit yielded by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    /// `==`, `!=`, `<>`, `<`, `>`, `<=`, `>=` or `contains`
    Comparison,
    /// A quoted string literal, e.g. `"hello"` or `'hello'`
    String,
    /// An integer or decimal literal, e.g. `-12` or `1.5`
    Number,
    /// A variable or keyword, e.g. `user`, `first-name` or `empty?`
    Ident,
    /// `..`
    DotDot,
    /// `.`
    Dot,
    /// `|`
    Pipe,
    /// `:`
    Colon,
    /// `,`
    Comma,
    /// `[`
    OpenSquare,
    /// `]`
    CloseSquare,
    /// `(`
    OpenRound,
    /// `)`
    CloseRound,
    /// The end of the markup
    Eos,
}

impl<'source> Lexer<'source> {
    /// Construct a new lexer over the given span of the source.
    pub fn new(source: &'source str, span: Span) -> Self {
        Self {
            source,
            cursor: span.m,
            end: span.n,
        }
    }

    pub fn source(&self) -> &'source str {
        self.source
    }

    /// Returns the next token and its span, [`Token::Eos`] once the markup is
    /// exhausted.
    pub fn next(&mut self) -> Result<(Token, Span)> {
        let rest = &self.source[self.cursor..self.end];
        let skipped = rest.len() - rest.trim_start_matches(is_space).len();
        let i = self.cursor + skipped;

        // We iterate over chars because that is nicer than operating on raw
        // bytes. The map call here fixes the index to be relative to the
        // actual template source.
        let mut iter = self.source[i..self.end]
            .char_indices()
            .map(|(d, c)| (i + d, c));

        let (tk, j) = match iter.next() {
            None => (Token::Eos, i),
            Some((_, c)) => match c {
                '|' => (Token::Pipe, i + 1),
                ':' => (Token::Colon, i + 1),
                ',' => (Token::Comma, i + 1),
                '[' => (Token::OpenSquare, i + 1),
                ']' => (Token::CloseSquare, i + 1),
                '(' => (Token::OpenRound, i + 1),
                ')' => (Token::CloseRound, i + 1),
                '.' => match iter.next() {
                    Some((_, '.')) => (Token::DotDot, i + 2),
                    _ => (Token::Dot, i + 1),
                },
                '=' | '!' | '<' | '>' => self.lex_comparison(iter, i, c)?,
                '"' | '\'' => self.lex_string(iter, i, c)?,
                '-' => match iter.clone().next() {
                    Some((_, d)) if d.is_ascii_digit() => self.lex_number(iter),
                    _ => return Err(self.err_unexpected_character(i..i + 1)),
                },
                c if c.is_ascii_digit() => self.lex_number(iter),
                c if is_ident_start(c) => self.lex_ident(iter, i),
                c => return Err(self.err_unexpected_character(i..i + c.len_utf8())),
            },
        };

        self.cursor = j;
        Ok((tk, Span::from(i..j)))
    }

    fn lex_comparison<I>(&self, mut iter: I, i: usize, c: char) -> Result<(Token, usize)>
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let next = iter.next().map(|(_, d)| d);
        match (c, next) {
            ('=', Some('=')) | ('!', Some('=')) | ('<', Some('=' | '>')) | ('>', Some('=')) => {
                Ok((Token::Comparison, i + 2))
            }
            ('<' | '>', _) => Ok((Token::Comparison, i + 1)),
            _ => Err(self.err_unexpected_character(i..i + 1)),
        }
    }

    fn lex_string<I>(&self, mut iter: I, i: usize, quote: char) -> Result<(Token, usize)>
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let mut curr = quote;
        loop {
            match iter.next() {
                None => {
                    return Err(self.err_undelimited_string(i..self.end));
                }
                Some((j, c)) if c == quote && curr != '\\' => {
                    return Ok((Token::String, j + 1));
                }
                Some((_, c)) => {
                    curr = c;
                }
            }
        }
    }

    fn lex_number<I>(&self, mut iter: I) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let j = self.lex_while(&mut iter, |c| c.is_ascii_digit());
        // A fraction only follows if the dot is followed by a digit, this
        // keeps `1..5` a range.
        let mut peek = iter.clone();
        match (peek.next(), peek.next()) {
            (Some((_, '.')), Some((_, d))) if d.is_ascii_digit() => {
                iter.next();
                (Token::Number, self.lex_while(&mut iter, |c| c.is_ascii_digit()))
            }
            _ => (Token::Number, j),
        }
    }

    fn lex_ident<I>(&self, mut iter: I, i: usize) -> (Token, usize)
    where
        I: Iterator<Item = (usize, char)> + Clone,
    {
        let mut j = self.lex_while(&mut iter, |c| is_ident(c) || c == '-');
        if let Some((_, '?' | '!')) = iter.clone().next() {
            j += 1;
        }
        let tk = match &self.source[i..j] {
            "contains" => Token::Comparison,
            _ => Token::Ident,
        };
        (tk, j)
    }

    fn lex_while<I, P>(&self, iter: &mut I, pred: P) -> usize
    where
        I: Iterator<Item = (usize, char)> + Clone,
        P: Fn(char) -> bool,
    {
        loop {
            match iter.clone().next() {
                Some((_, c)) if pred(c) => {
                    iter.next();
                }
                Some((j, _)) => return j,
                None => return self.end,
            }
        }
    }

    fn err_unexpected_character(&self, span: impl Into<Span>) -> Error {
        let span = span.into();
        let c = &self.source[span];
        Error::syntax(format!("unexpected character `{c}`"), self.source, span)
    }

    fn err_undelimited_string(&self, span: impl Into<Span>) -> Error {
        Error::syntax("undelimited string", self.source, span)
    }
}

impl Token {
    pub fn human(&self) -> &'static str {
        match self {
            Self::Comparison => "comparison",
            Self::String => "string",
            Self::Number => "number",
            Self::Ident => "identifier",
            Self::DotDot => "range operator",
            Self::Dot => "dot",
            Self::Pipe => "pipe",
            Self::Colon => "colon",
            Self::Comma => "comma",
            Self::OpenSquare => "open square bracket",
            Self::CloseSquare => "close square bracket",
            Self::OpenRound => "open parenthesis",
            Self::CloseRound => "close parenthesis",
            Self::Eos => "end of string",
        }
    }
}

#[cfg(feature = "unicode")]
fn is_ident_start(c: char) -> bool {
    c == '_' || unicode_ident::is_xid_start(c)
}

#[cfg(feature = "unicode")]
fn is_ident(c: char) -> bool {
    unicode_ident::is_xid_continue(c)
}

#[cfg(not(feature = "unicode"))]
fn is_ident_start(c: char) -> bool {
    matches!(c, 'A'..='Z' | 'a'..='z' | '_')
}

#[cfg(not(feature = "unicode"))]
fn is_ident(c: char) -> bool {
    matches!(c, '0'..='9' | 'A'..='Z' | 'a'..='z' | '_')
}
