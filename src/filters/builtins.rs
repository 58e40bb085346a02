//! The standard Liquid filters.
//!
//! These are registered by [`Engine::new`][crate::Engine::new]. Each one is
//! a plain function, most of them use typed arguments and are converted by
//! the [`Filter`][crate::Filter] machinery. Filters with optional or keyword
//! arguments take the raw argument list instead.

use crate::filters::err_wrong_number_of_arguments;
use crate::value::Map;
use crate::{Engine, Error, Result, Value};

pub(crate) fn register(engine: &mut Engine<'_>) {
    engine.add_filter("append", append);
    engine.add_filter("prepend", prepend);
    engine.add_filter("upcase", upcase);
    engine.add_filter("downcase", downcase);
    engine.add_filter("capitalize", capitalize);
    engine.add_filter("strip", strip);
    engine.add_filter("split", split);
    engine.add_filter_fn("join", join);
    engine.add_filter("size", size);
    engine.add_filter("first", first);
    engine.add_filter("last", last);
    engine.add_filter("reverse", reverse);
    engine.add_filter("plus", plus);
    engine.add_filter("minus", minus);
    engine.add_filter("times", times);
    engine.add_filter_fn("default", default);
}

////////////////////////////////////////////////////////////////////////////////
// Strings
////////////////////////////////////////////////////////////////////////////////

/// Concatenates two strings.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn append(s: String, suffix: String) -> String {
    s + &suffix
}

/// Adds the given string to the start of another.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn prepend(s: String, prefix: String) -> String {
    prefix + &s
}

/// Returns the uppercase equivalent of this string.
///
/// See [`str::to_uppercase`].
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn upcase(s: String) -> String {
    s.to_uppercase()
}

/// Returns the lowercase equivalent of this string.
///
/// See [`str::to_lowercase`].
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn downcase(s: String) -> String {
    s.to_lowercase()
}

/// Uppercases the first character and lowercases the rest.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn capitalize(s: String) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
        None => s,
    }
}

/// Removes leading and trailing whitespace.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn strip(s: String) -> String {
    s.trim().to_owned()
}

/// Splits a string into a list of strings.
///
/// A single space separator splits on runs of whitespace, an empty
/// separator splits into characters. Trailing empty strings are dropped.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn split(s: String, sep: String) -> Vec<String> {
    let mut parts: Vec<String> = match sep.as_str() {
        " " => s.split_whitespace().map(String::from).collect(),
        "" => s.chars().map(String::from).collect(),
        sep => s.split(sep).map(String::from).collect(),
    };
    while parts.last().map_or(false, |p| p.is_empty()) {
        parts.pop();
    }
    parts
}

////////////////////////////////////////////////////////////////////////////////
// Collections
////////////////////////////////////////////////////////////////////////////////

/// Joins the elements of a list with the given separator, a space if none
/// is given.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn join(args: Vec<Value>) -> Result<Value> {
    let (input, glue) = match <[Value; 1]>::try_from(args) {
        Ok([input]) => (input, String::from(" ")),
        Err(args) => match <[Value; 2]>::try_from(args) {
            Ok([input, glue]) => (input, glue.to_liquid_string()),
            Err(args) => return Err(err_wrong_number_of_arguments(args.len(), 2)),
        },
    };
    let joined = match input {
        Value::List(list) => {
            let items: Vec<String> = list.iter().map(Value::to_liquid_string).collect();
            items.join(&glue)
        }
        input => input.to_liquid_string(),
    };
    Ok(Value::String(joined))
}

/// Returns the number of characters in a string or elements in a
/// collection, zero for anything else.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn size(value: Value) -> i64 {
    match value {
        Value::String(s) => s.chars().count() as i64,
        Value::List(l) => l.len() as i64,
        Value::Map(m) => m.len() as i64,
        Value::Range(m, n) => (n - m + 1).max(0),
        _ => 0,
    }
}

/// Returns the first element of a list.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn first(value: Value) -> Value {
    match value {
        Value::List(l) => l.into_iter().next().unwrap_or_default(),
        Value::Range(m, n) if m <= n => Value::Integer(m),
        _ => Value::Nil,
    }
}

/// Returns the last element of a list.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn last(value: Value) -> Value {
    match value {
        Value::List(mut l) => l.pop().unwrap_or_default(),
        Value::Range(m, n) if m <= n => Value::Integer(n),
        _ => Value::Nil,
    }
}

/// Reverses a list, other values are returned unchanged.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn reverse(value: Value) -> Value {
    match value {
        Value::List(list) => Value::List(list.into_iter().rev().collect()),
        Value::Range(m, n) => (m..=n).rev().collect(),
        value => value,
    }
}

////////////////////////////////////////////////////////////////////////////////
// Math
////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy)]
enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    /// Strings are parsed leniently, anything unparsable is zero.
    fn new(value: &Value) -> Self {
        match value {
            Value::Integer(i) => Self::Integer(*i),
            Value::Float(f) => Self::Float(*f),
            Value::String(s) => {
                let s = s.trim();
                match s.parse() {
                    Ok(i) => Self::Integer(i),
                    Err(_) if s.contains('.') => {
                        s.parse().map(Self::Float).unwrap_or(Self::Integer(0))
                    }
                    Err(_) => Self::Integer(0),
                }
            }
            _ => Self::Integer(0),
        }
    }

    fn to_f64(self) -> f64 {
        match self {
            Self::Integer(i) => i as f64,
            Self::Float(f) => f,
        }
    }
}

fn arithmetic(
    a: &Value,
    b: &Value,
    int: fn(i64, i64) -> Option<i64>,
    float: fn(f64, f64) -> f64,
) -> Value {
    match (Number::new(a), Number::new(b)) {
        (Number::Integer(x), Number::Integer(y)) => match int(x, y) {
            Some(r) => Value::Integer(r),
            None => Value::Float(float(x as f64, y as f64)),
        },
        (x, y) => Value::Float(float(x.to_f64(), y.to_f64())),
    }
}

/// Adds two numbers.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn plus(a: Value, b: Value) -> Value {
    arithmetic(&a, &b, i64::checked_add, |x, y| x + y)
}

/// Subtracts a number from another.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn minus(a: Value, b: Value) -> Value {
    arithmetic(&a, &b, i64::checked_sub, |x, y| x - y)
}

/// Multiplies two numbers.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn times(a: Value, b: Value) -> Value {
    arithmetic(&a, &b, i64::checked_mul, |x, y| x * y)
}

////////////////////////////////////////////////////////////////////////////////
// Other
////////////////////////////////////////////////////////////////////////////////

/// Returns the default value if the input is nil, false or empty.
///
/// Accepts the keyword argument `allow_false: true` to keep a false input.
#[cfg_attr(docsrs, doc(cfg(feature = "builtins")))]
pub fn default(args: Vec<Value>) -> Result<Value> {
    let mut args = args.into_iter();
    let (input, fallback, kwargs) = match (args.next(), args.next(), args.next(), args.next()) {
        (Some(input), fallback, kwargs, None) => (input, fallback.unwrap_or_default(), kwargs),
        (None, ..) => return Err(err_wrong_number_of_arguments(0, 2)),
        (Some(_), ..) => return Err(err_wrong_number_of_arguments(4, 3)),
    };
    let allow_false = match kwargs {
        None => false,
        Some(Value::Map(map)) => allow_false(&map),
        Some(v) => {
            return Err(Error::type_mismatch(format!(
                "expected keyword arguments, found {}",
                v.human()
            )))
        }
    };
    let use_default = match &input {
        Value::Nil => true,
        Value::Bool(false) => !allow_false,
        Value::String(s) => s.is_empty(),
        Value::List(l) => l.is_empty(),
        Value::Map(m) => m.is_empty(),
        _ => false,
    };
    Ok(if use_default { fallback } else { input })
}

fn allow_false(kwargs: &Map<String, Value>) -> bool {
    kwargs.get("allow_false").map_or(false, Value::is_truthy)
}
