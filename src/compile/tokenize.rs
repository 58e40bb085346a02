//! Splits template source into raw text, tag and variable tokens.
//!
//! Tokens are spans into the source, never copies. Concatenating the full
//! span of every token reproduces the source exactly.

use crate::types::span::Span;

/// The kind of a [`Token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An unterminated tag or variable, e.g. `{% if`.
    Invalid,
    /// Raw template text.
    Raw,
    /// A tag, e.g. `{% if x %}` or a line inside a `liquid` tag.
    Tag,
    /// A variable, e.g. `{{ x }}`.
    Variable,
    /// An empty line inside a `liquid` tag.
    BlankLine,
}

/// How a tag or variable ends.
enum End {
    /// Offset just past the end delimiter.
    Closed(usize),
    /// A variable with a single `}`, offset just past it.
    Stray(usize),
    Missing,
}

/// A span of the template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// The whole token including delimiters.
    pub full: Span,
    /// The token without delimiters and trim markers. For raw tokens this is
    /// the text with whitespace trimmed according to the neighbouring trim
    /// markers.
    pub trimmed: Span,
    /// Whether the token starts with a trim marker (`{{-` or `{%-`), for raw
    /// tokens whether leading whitespace was trimmed.
    pub lstrip: bool,
    /// Whether the token ends with a trim marker (`-}}` or `-%}`), for raw
    /// tokens whether trailing whitespace was trimmed.
    pub rstrip: bool,
    /// The line the token starts on, zero if lines are not tracked.
    pub line_number: u32,
}

/// A tokenizer over a region of template source.
#[cfg_attr(internal_debug, derive(Debug))]
pub struct Tokenizer<'source> {
    /// The template source.
    source: &'source str,

    /// A cursor over the template source.
    cursor: usize,

    /// The end of the region being tokenized.
    end: usize,

    /// The current line number, zero disables tracking.
    line_number: u32,

    /// Whether this tokenizes the body of a `liquid` tag, one tag per line.
    for_liquid_tag: bool,

    /// Whether to left trim the next raw token.
    lstrip_flag: bool,
}

impl<'source> Tokenizer<'source> {
    /// Construct a new tokenizer over the whole source.
    pub fn new(source: &'source str, line_number: u32) -> Self {
        Self {
            source,
            cursor: 0,
            end: source.len(),
            line_number,
            for_liquid_tag: false,
            lstrip_flag: false,
        }
    }

    /// Construct a tokenizer over the markup of a `liquid` tag that spans the
    /// given region of the source.
    pub fn for_liquid_tag(source: &'source str, region: Span, line_number: u32) -> Self {
        Self {
            source,
            cursor: region.m,
            end: region.n,
            line_number,
            for_liquid_tag: true,
            lstrip_flag: false,
        }
    }

    pub fn source(&self) -> &'source str {
        self.source
    }

    pub fn is_for_liquid_tag(&self) -> bool {
        self.for_liquid_tag
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    /// Returns the next token, or `None` once the region is exhausted.
    pub fn next(&mut self) -> Option<Token> {
        if self.cursor >= self.end {
            return None;
        }
        let line_number = self.line_number;
        let mut token = if self.for_liquid_tag {
            self.next_line()
        } else {
            self.next_token()
        };
        token.line_number = line_number;
        if self.line_number != 0 {
            let newlines = self.source[token.full].bytes().filter(|&b| b == b'\n').count();
            self.line_number += newlines as u32;
            if self.for_liquid_tag && token.full.n < self.end {
                // the terminating newline is not part of the line
                self.line_number += 1;
            }
        }
        Some(token)
    }

    /// Returns the next line of a `liquid` tag body.
    fn next_line(&mut self) -> Token {
        let bytes = self.source.as_bytes();
        let i = self.cursor;
        let j = bytes[i..self.end]
            .iter()
            .position(|&b| b == b'\n')
            .map(|p| i + p)
            .unwrap_or(self.end);
        self.cursor = if j < self.end { j + 1 } else { j };

        let trimmed = trim(self.source, Span::from(i..j), true, true);
        let kind = match trimmed.is_empty() {
            true => TokenKind::BlankLine,
            false => TokenKind::Tag,
        };
        Token {
            kind,
            full: Span::from(i..j),
            trimmed,
            lstrip: false,
            rstrip: false,
            line_number: 0,
        }
    }

    /// Scans for the next `{{` or `{%` delimiter. The following diagram helps
    /// describe the variable naming.
    ///
    /// ```text
    /// xxxxxxx{{-xxxxxxxxx
    ///    ^   ^  ^
    ///    i   j  k
    /// ```
    fn next_token(&mut self) -> Token {
        let bytes = self.source.as_bytes();
        let i = self.cursor;

        let mut j = i;
        while j + 1 < self.end {
            if bytes[j] == b'{' && matches!(bytes[j + 1], b'{' | b'%') {
                break;
            }
            j += 1;
        }

        if j + 1 >= self.end {
            // No more delimiters, the rest is raw text.
            self.cursor = self.end;
            return self.raw(i, self.end, false);
        }

        let dash = j + 2 < self.end && bytes[j + 2] == b'-';
        if j > i {
            // Emit the raw text before the delimiter first.
            self.cursor = j;
            return self.raw(i, j, dash);
        }

        let is_tag = bytes[j + 1] == b'%';
        let k = j + 2 + usize::from(dash);
        match self.find_end(k, is_tag) {
            End::Closed(n) => {
                // The end delimiter is at `n - 2..n`.
                let right = n - 3 >= k && bytes[n - 3] == b'-';
                self.cursor = n;
                self.lstrip_flag = right;
                let inner_end = if right { n - 3 } else { n - 2 };
                Token {
                    kind: if is_tag {
                        TokenKind::Tag
                    } else {
                        TokenKind::Variable
                    },
                    full: Span::from(j..n),
                    trimmed: Span::from(k..inner_end.max(k)),
                    lstrip: dash,
                    rstrip: right,
                    line_number: 0,
                }
            }
            End::Stray(n) => self.invalid(j, n, dash),
            // Unterminated, only the opening delimiter is consumed.
            End::Missing => self.invalid(j, j + 2, dash),
        }
    }

    fn invalid(&mut self, j: usize, n: usize, lstrip: bool) -> Token {
        self.cursor = n;
        self.lstrip_flag = false;
        Token {
            kind: TokenKind::Invalid,
            full: Span::from(j..n),
            trimmed: Span::from(j..n),
            lstrip,
            rstrip: false,
            line_number: 0,
        }
    }

    /// Finds the end delimiter matching a tag (`%}`) or a variable (`}}`)
    /// starting the search at `k`.
    fn find_end(&self, k: usize, is_tag: bool) -> End {
        let bytes = &self.source.as_bytes()[..self.end];
        if is_tag {
            let mut n = k;
            while n + 1 < bytes.len() {
                if bytes[n] == b'%' && bytes[n + 1] == b'}' {
                    return End::Closed(n + 2);
                }
                n += 1;
            }
            End::Missing
        } else {
            let mut n = k;
            while n < bytes.len() {
                if bytes[n] == b'}' {
                    return match bytes.get(n + 1) {
                        Some(b'}') => End::Closed(n + 2),
                        _ => End::Stray(n + 1),
                    };
                }
                n += 1;
            }
            End::Missing
        }
    }

    fn raw(&mut self, i: usize, j: usize, rstrip: bool) -> Token {
        let lstrip = self.lstrip_flag;
        self.lstrip_flag = false;
        Token {
            kind: TokenKind::Raw,
            full: Span::from(i..j),
            trimmed: trim(self.source, Span::from(i..j), lstrip, rstrip),
            lstrip,
            rstrip,
            line_number: 0,
        }
    }
}

impl Token {
    /// Returns the content of a tag or variable with surrounding whitespace
    /// removed, e.g. `x | upcase` for `{{- x | upcase }}`.
    pub fn markup(&self, source: &str) -> Span {
        trim(source, self.trimmed, true, true)
    }
}

/// Returns the span with leading and/or trailing whitespace removed.
pub fn trim(source: &str, span: Span, left: bool, right: bool) -> Span {
    let s = &source[span];
    let mut m = span.m;
    let mut n = span.n;
    if left {
        m += s.len() - s.trim_start_matches(is_space).len();
    }
    if right {
        n -= s.len() - s.trim_end_matches(is_space).len();
    }
    Span::from(m..n.max(m))
}

/// Whitespace as understood by the template language.
pub fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0b' | '\x0c' | '\r')
}
