use std::cmp::max;
use std::fmt;
use std::io;

use crate::types::span::Span;

/// A convenient type alias for results in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed template source: an unexpected token, a missing terminator
    /// or an unknown tag.
    Syntax,
    /// A variable was not found and strict variables are enabled.
    UndefinedVariable,
    /// A filter was not found and strict filters are enabled.
    UndefinedFilter,
    /// A filter was called with arguments of the wrong type or arity.
    FilterArgument,
    /// A value had an unexpected type.
    Type,
    /// One of the configured resource limits was exceeded.
    ResourceLimits,
    /// A generic error raised while rendering, usually by a filter or tag.
    Render,
    /// A serialized template could not be loaded.
    Deserialize,
    /// The instruction stream or document body is inconsistent.
    Internal,
}

/// An error that can occur during template compilation, loading or
/// rendering.
#[derive(Clone)]
pub struct Error {
    kind: ErrorKind,
    msg: String,
    line: Option<u32>,
    span: Option<(String, Span)>,
}

impl Error {
    /// Construct a new error of the given kind.
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            line: None,
            span: None,
        }
    }

    /// Construct a new render error, this is the error filters and tags
    /// usually want to return.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Render, msg)
    }

    pub(crate) fn syntax(msg: impl Into<String>, source: &str, span: impl Into<Span>) -> Self {
        let mut err = Self::new(ErrorKind::Syntax, msg);
        if !source.is_empty() {
            err.span = Some((source.to_owned(), span.into()));
        }
        err
    }

    pub(crate) fn syntax_msg(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, msg)
    }

    pub(crate) fn type_mismatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, msg)
    }

    pub(crate) fn undefined_variable(name: &str) -> Self {
        Self::new(
            ErrorKind::UndefinedVariable,
            format!("undefined variable {name}"),
        )
    }

    pub(crate) fn undefined_filter(name: &str) -> Self {
        Self::new(ErrorKind::UndefinedFilter, format!("undefined filter {name}"))
    }

    pub(crate) fn resource_limits() -> Self {
        Self::new(ErrorKind::ResourceLimits, "memory limits exceeded")
    }

    pub(crate) fn deserialize(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Deserialize, msg)
    }

    pub(crate) fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the error message without any location information.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// Returns the template line number the error occurred on, if line
    /// numbers are tracked.
    pub fn line_number(&self) -> Option<u32> {
        self.line
    }

    /// Attach a line number if the error does not have one yet.
    pub(crate) fn with_line(mut self, line: Option<u32>) -> Self {
        if self.line.is_none() {
            self.line = line.filter(|&n| n != 0);
        }
        self
    }

    /// Type errors raised during a filter call are argument errors.
    pub(crate) fn into_filter_argument(mut self) -> Self {
        if self.kind == ErrorKind::Type {
            self.kind = ErrorKind::FilterArgument;
        }
        self
    }

    /// Whether the renderer may resume after this error.
    pub(crate) fn is_recoverable(&self) -> bool {
        !matches!(
            self.kind,
            ErrorKind::ResourceLimits | ErrorKind::Internal | ErrorKind::Deserialize
        )
    }

    fn prefix(&self) -> &'static str {
        match self.kind {
            ErrorKind::Syntax => "Liquid syntax error",
            _ => "Liquid error",
        }
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Self::render(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Self::render(msg)
    }
}

impl From<postcard::Error> for Error {
    fn from(err: postcard::Error) -> Self {
        Self::deserialize(format!("invalid constant pool: {err}"))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::render(format!("failed to write output: {err}"))
    }
}

impl std::error::Error for Error {}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some((source, span)) => fmt_pretty(&self.msg, source, *span, f),
            None => fmt::Display::fmt(self, f),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.span, f.alternate()) {
            (Some((source, span)), true) => fmt_pretty(&self.msg, source, *span, f),
            _ => match self.line {
                Some(line) => write!(f, "{} (line {}): {}", self.prefix(), line, self.msg),
                None => write!(f, "{}: {}", self.prefix(), self.msg),
            },
        }
    }
}

fn fmt_pretty(msg: &str, source: &str, span: Span, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let (line, start) = to_line_start(source, span.m);
    let code = source[start..].split('\n').next().unwrap_or("");
    let code = code.strip_suffix('\r').unwrap_or(code);
    let col = width(&source[start..span.m.min(start + code.len())]);
    let end = span.n.min(start + code.len()).max(span.m);
    let width = max(1, self::width(&source[span.m..end]));

    let num = (line + 1).to_string();
    let pad = num.len();
    let pipe = "|";
    let underline = "^".repeat(width);

    write!(
        f,
        "\n \
        {0:pad$} {pipe}\n \
        {num:>} {pipe} {code}\n \
        {0:pad$} {pipe} {underline:>width$} {msg}\n",
        "",
        pad = pad,
        pipe = pipe,
        num = num,
        code = code,
        underline = underline,
        width = col + width,
        msg = msg
    )
}

/// Returns the zero based line index and the byte offset the line starts at.
fn to_line_start(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count();
    let start = before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    (line, start)
}

#[cfg(feature = "unicode")]
fn width(s: &str) -> usize {
    unicode_width::UnicodeWidthStr::width(s)
}

#[cfg(not(feature = "unicode"))]
fn width(s: &str) -> usize {
    s.chars().count()
}
