//! Defines the [`Value`] enum, representing any data a template can look up,
//! compute with or render.

mod from;
mod ser;

pub use std::collections::btree_map;
pub use std::collections::BTreeMap as Map;
pub use std::vec::Vec as List;

use std::fmt;
use std::fmt::Write;
use std::sync::Arc;

use crate::render::Context;
use crate::{Error, Result};

/// Data to be rendered represented as a recursive enum.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(List<Value>),
    Map(Map<String, Value>),
    /// An inclusive integer range, e.g. `(1..5)`.
    Range(i64, i64),
    /// A host object resolved through the [`Object`] capability.
    Object(Arc<dyn Object>),
    /// A deferred computation, evaluated the first time it is looked up.
    Lazy(Lazy),
}

/// A host value that is not a plain map but can still be queried by key.
///
/// Objects can be used as environments or nested anywhere inside a
/// [`Value`]. The renderer only ever talks to them through this trait.
///
/// # Examples
///
/// ```
/// use sluice::{Object, Value};
///
/// #[derive(Debug)]
/// struct Counter(i64);
///
/// impl Object for Counter {
///     fn has_key(&self, key: &str) -> bool {
///         key == "count"
///     }
///
///     fn get(&self, key: &str) -> Option<Value> {
///         (key == "count").then(|| Value::Integer(self.0))
///     }
/// }
/// ```
pub trait Object: fmt::Debug + Send + Sync {
    /// Whether the object has a member named `key`.
    fn has_key(&self, key: &str) -> bool;

    /// Returns the member named `key`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Invoke a zero argument command, one of `size`, `first` or `last`.
    ///
    /// Defaults to looking up a member of the same name.
    fn invoke(&self, command: &str) -> Option<Value> {
        self.get(command)
    }

    /// Coerce the object into a renderable value. This is called every time
    /// the object is resolved as a variable, the context is provided so
    /// that the result can depend on render state. Returning `None` keeps
    /// the object as is.
    fn to_liquid(&self, cx: &Context<'_>) -> Option<Value> {
        let _ = cx;
        None
    }

    /// The text written when the object itself is output.
    fn to_liquid_string(&self) -> String {
        String::new()
    }
}

type LazyFn = dyn Fn(&Context<'_>) -> Value + Send + Sync;

/// A value that is computed on first lookup and memoized.
#[derive(Clone)]
pub struct Lazy(Arc<LazyFn>);

impl Lazy {
    /// Construct a lazy value from a function with no arguments.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(move |_: &Context<'_>| f()))
    }

    /// Construct a lazy value from a function that receives the render
    /// context.
    pub fn with_context<F>(f: F) -> Self
    where
        F: Fn(&Context<'_>) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub(crate) fn call(&self, cx: &Context<'_>) -> Value {
        (self.0)(cx)
    }
}

impl fmt::Debug for Lazy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Lazy(..)")
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("Nil"),
            Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Self::Integer(i) => f.debug_tuple("Integer").field(i).finish(),
            Self::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Self::String(s) => f.debug_tuple("String").field(s).finish(),
            Self::List(l) => f.debug_tuple("List").field(l).finish(),
            Self::Map(m) => f.debug_tuple("Map").field(m).finish(),
            Self::Range(m, n) => f.debug_tuple("Range").field(m).field(n).finish(),
            Self::Object(o) => f.debug_tuple("Object").field(o).finish(),
            Self::Lazy(l) => l.fmt(f),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(s), Self::Bool(o)) => s == o,
            (Self::Integer(s), Self::Integer(o)) => s == o,
            (Self::Float(s), Self::Float(o)) => s == o,
            (Self::String(s), Self::String(o)) => s == o,
            (Self::List(s), Self::List(o)) => s == o,
            (Self::Map(s), Self::Map(o)) => s == o,
            (Self::Range(a, b), Self::Range(c, d)) => a == c && b == d,
            (Self::Object(s), Self::Object(o)) => {
                std::ptr::eq(Arc::as_ptr(s) as *const u8, Arc::as_ptr(o) as *const u8)
            }
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Nil
    }
}

/// The number of integers in the range `m..=n`, saturating at `i64::MAX`.
pub(crate) fn range_len(m: i64, n: i64) -> i64 {
    (i128::from(n) - i128::from(m) + 1).clamp(0, i128::from(i64::MAX)) as i64
}

/// The integer at index `i` of the range `m..=n`, negative indexes count
/// from the end.
pub(crate) fn range_nth(m: i64, n: i64, i: i64) -> Option<i64> {
    let v = match i < 0 {
        true => i128::from(n) + 1 + i128::from(i),
        false => i128::from(m) + i128::from(i),
    };
    (i128::from(m)..=i128::from(n))
        .contains(&v)
        .then(|| v as i64)
}

impl Value {
    pub(crate) fn human(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Range(..) => "range",
            Self::Object(_) => "object",
            Self::Lazy(_) => "lazy value",
        }
    }

    /// Only `nil` and `false` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the text written when this value is output.
    pub fn to_liquid_string(&self) -> String {
        let mut s = String::new();
        self.render_to(&mut s);
        s
    }

    /// Appends the text written when this value is output.
    pub fn render_to(&self, out: &mut String) {
        match self {
            Self::Nil | Self::Lazy(_) => {}
            Self::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Self::Integer(i) => {
                let _ = write!(out, "{i}");
            }
            Self::Float(f) => fmt_float(*f, out),
            Self::String(s) => out.push_str(s),
            Self::List(list) => {
                for item in list {
                    item.render_to(out);
                }
            }
            Self::Map(_) => inspect(self, out),
            Self::Range(m, n) => {
                let _ = write!(out, "{m}..{n}");
            }
            Self::Object(obj) => out.push_str(&obj.to_liquid_string()),
        }
    }

    /// Returns the key used when this value indexes a map or names a
    /// variable.
    pub(crate) fn to_key(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            v => v.to_liquid_string(),
        }
    }

    /// Converts a range endpoint or numeric argument to an integer.
    pub(crate) fn to_integer(&self) -> Result<i64> {
        match self {
            Self::Integer(i) => Ok(*i),
            Self::Float(f) if f.is_finite() => Ok(f.trunc() as i64),
            Self::String(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::type_mismatch("invalid integer")),
            _ => Err(Error::type_mismatch("invalid integer")),
        }
    }
}

fn fmt_float(f: f64, out: &mut String) {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        let _ = write!(out, "{f:.1}");
    } else {
        let _ = write!(out, "{f}");
    }
}

/// Writes the debug style representation used for maps, e.g.
/// `{"a"=>1, "b"=>[nil, "x"]}`.
fn inspect(value: &Value, out: &mut String) {
    match value {
        Value::Nil => out.push_str("nil"),
        Value::String(s) => {
            let _ = write!(out, "{s:?}");
        }
        Value::List(list) => {
            out.push('[');
            for (i, item) in list.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                inspect(item, out);
            }
            out.push(']');
        }
        Value::Map(map) => {
            out.push('{');
            for (i, (k, v)) in map.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{k:?}=>");
                inspect(v, out);
            }
            out.push('}');
        }
        v => v.render_to(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_render_scalars() {
        assert_eq!(Value::Nil.to_liquid_string(), "");
        assert_eq!(Value::Bool(true).to_liquid_string(), "true");
        assert_eq!(Value::Integer(-3).to_liquid_string(), "-3");
        assert_eq!(Value::Float(1.0).to_liquid_string(), "1.0");
        assert_eq!(Value::Float(123.4).to_liquid_string(), "123.4");
        assert_eq!(Value::Range(1, 5).to_liquid_string(), "1..5");
    }

    #[test]
    fn range_len_saturates() {
        assert_eq!(range_len(1, 5), 5);
        assert_eq!(range_len(5, 1), 0);
        assert_eq!(range_len(-2, i64::MAX), i64::MAX);
        assert_eq!(range_len(i64::MAX, i64::MIN), 0);
    }

    #[test]
    fn range_nth_bounds() {
        assert_eq!(range_nth(1, 5, 0), Some(1));
        assert_eq!(range_nth(1, 5, -1), Some(5));
        assert_eq!(range_nth(1, 5, 5), None);
        assert_eq!(range_nth(1, 5, -6), None);
        assert_eq!(range_nth(-2, i64::MAX, -1), Some(i64::MAX));
        assert_eq!(range_nth(0, 5, i64::MAX), None);
        assert_eq!(range_nth(0, 5, i64::MIN), None);
        assert_eq!(range_nth(i64::MIN, i64::MAX, i64::MAX), Some(-1));
    }

    #[test]
    fn value_render_collections() {
        let list = Value::from(vec![Value::from(1), Value::from("a"), Value::Nil]);
        assert_eq!(list.to_liquid_string(), "1a");

        let mut map = Map::new();
        map.insert("a".to_owned(), Value::from(1));
        map.insert("b".to_owned(), Value::from(vec!["x"]));
        assert_eq!(Value::Map(map).to_liquid_string(), r#"{"a"=>1, "b"=>["x"]}"#);
    }

    #[test]
    fn value_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::from("").is_truthy());
        assert!(Value::Integer(0).is_truthy());
    }
}
