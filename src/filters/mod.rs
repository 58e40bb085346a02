mod args;
#[cfg(feature = "builtins")]
pub mod builtins;

use crate::{Error, Result, Value};

/// A filter function or closure operating on the flat argument list.
///
/// The first argument is always the piped value, followed by the positional
/// arguments and finally a map of the keyword arguments if there were any.
pub type FilterFn = dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync + 'static;

pub fn new<F, R, A>(f: F) -> Box<FilterFn>
where
    F: Filter<R, A> + Send + Sync + 'static,
    R: FilterReturn,
    A: FilterArgs,
{
    Box::new(move |args: Vec<Value>| -> Result<Value> {
        let args = A::from_args(args)?;
        let result = Filter::filter(&f, args);
        FilterReturn::to_value(result)
    })
}

/// Represents any filter function.
///
/// This trait is used by the [`Engine::add_filter`][crate::Engine::add_filter]
/// method to abstract over a variety of function and closure types. This
/// includes filters with variable argument types, return types and arity. The
/// first argument to a filter function will always receive the piped value or
/// expression. It can then have up to three more arguments, keyword arguments
/// are passed as a single trailing map. The renderer checks the number and the
/// type of the arguments when the filter is called.
///
/// [`Filter`] is implemented for functions that return any of the following
/// types.
///
/// - `R` where `R` implements `Into<Value>`, this includes `Option<R>`
/// - `Result<R>` where `R` implements `Into<Value>`
///
/// [`Filter`] is implemented for functions that take any of the following
/// types as arguments.
/// - [`bool`]
/// - integer types, e.g. [`i64`] and [`usize`]
/// - [`f64`]
/// - [`String`]
/// - [`Vec<Value>`]
/// - [`BTreeMap<String, Value>`][std::collections::BTreeMap]
/// - [`Value`]
/// - `Option<T>` where `T` is one of the above, `nil` becomes `None`
///
/// ## Examples
///
/// Consider the following template.
///
/// ```text
/// {{ user.name | split: " " | last }}
/// ```
///
/// We could implement the `split` and `last` filters like this:
///
/// ```rust
/// use sluice::{Engine, Value};
///
/// let mut engine = Engine::empty();
/// engine.add_filter("split", split);
/// engine.add_filter("last", last);
///
/// fn split(s: String, sep: String) -> Vec<String> {
///     s.split(sep.as_str()).map(String::from).collect()
/// }
///
/// fn last(mut list: Vec<Value>) -> Option<Value> {
///     list.pop()
/// }
/// ```
pub trait Filter<R, A>
where
    A: FilterArgs,
{
    #[doc(hidden)]
    fn filter(&self, args: A) -> R;
}

pub trait FilterArgs: Sized {
    fn from_args(args: Vec<Value>) -> Result<Self>;
}

pub trait FilterArg: Sized {
    fn from_value(v: Value) -> args::Result<Self>;
}

pub trait FilterReturn {
    fn to_value(self) -> Result<Value>;
}

////////////////////////////////////////////////////////////////////////////////
// Filter
////////////////////////////////////////////////////////////////////////////////

impl<Func, R, V> Filter<R, (V,)> for Func
where
    Func: Fn(V) -> R,
    R: FilterReturn,
    V: FilterArg,
{
    #[doc(hidden)]
    fn filter(&self, (v,): (V,)) -> R {
        self(v)
    }
}

impl<Func, R, V, A> Filter<R, (V, A)> for Func
where
    Func: Fn(V, A) -> R,
    R: FilterReturn,
    V: FilterArg,
    A: FilterArg,
{
    #[doc(hidden)]
    fn filter(&self, (v, a): (V, A)) -> R {
        self(v, a)
    }
}

impl<Func, R, V, A, B> Filter<R, (V, A, B)> for Func
where
    Func: Fn(V, A, B) -> R,
    R: FilterReturn,
    V: FilterArg,
    A: FilterArg,
    B: FilterArg,
{
    #[doc(hidden)]
    fn filter(&self, (v, a, b): (V, A, B)) -> R {
        self(v, a, b)
    }
}

impl<Func, R, V, A, B, C> Filter<R, (V, A, B, C)> for Func
where
    Func: Fn(V, A, B, C) -> R,
    R: FilterReturn,
    V: FilterArg,
    A: FilterArg,
    B: FilterArg,
    C: FilterArg,
{
    #[doc(hidden)]
    fn filter(&self, (v, a, b, c): (V, A, B, C)) -> R {
        self(v, a, b, c)
    }
}

////////////////////////////////////////////////////////////////////////////////
// FilterArgs
////////////////////////////////////////////////////////////////////////////////

impl<V> FilterArgs for (V,)
where
    V: FilterArg,
{
    fn from_args(args: Vec<Value>) -> Result<Self> {
        let [v] = check_args(args)?;
        Ok((get_arg(v)?,))
    }
}

impl<V, A> FilterArgs for (V, A)
where
    V: FilterArg,
    A: FilterArg,
{
    fn from_args(args: Vec<Value>) -> Result<Self> {
        let [v, a] = check_args(args)?;
        Ok((get_arg(v)?, get_arg(a)?))
    }
}

impl<V, A, B> FilterArgs for (V, A, B)
where
    V: FilterArg,
    A: FilterArg,
    B: FilterArg,
{
    fn from_args(args: Vec<Value>) -> Result<Self> {
        let [v, a, b] = check_args(args)?;
        Ok((get_arg(v)?, get_arg(a)?, get_arg(b)?))
    }
}

impl<V, A, B, C> FilterArgs for (V, A, B, C)
where
    V: FilterArg,
    A: FilterArg,
    B: FilterArg,
    C: FilterArg,
{
    fn from_args(args: Vec<Value>) -> Result<Self> {
        let [v, a, b, c] = check_args(args)?;
        Ok((get_arg(v)?, get_arg(a)?, get_arg(b)?, get_arg(c)?))
    }
}

fn check_args<const N: usize>(args: Vec<Value>) -> Result<[Value; N]> {
    let given = args.len();
    args.try_into()
        .map_err(|_| err_wrong_number_of_arguments(given, N))
}

fn get_arg<T: FilterArg>(v: Value) -> Result<T> {
    T::from_value(v).map_err(|err| Error::type_mismatch(err.message()))
}

pub(crate) fn err_wrong_number_of_arguments(given: usize, expected: usize) -> Error {
    Error::type_mismatch(format!(
        "wrong number of arguments (given {given}, expected {expected})"
    ))
}

////////////////////////////////////////////////////////////////////////////////
// FilterReturn
////////////////////////////////////////////////////////////////////////////////

impl<T> FilterReturn for T
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        Ok(self.into())
    }
}

impl<T> FilterReturn for Result<T>
where
    T: Into<Value>,
{
    fn to_value(self) -> Result<Value> {
        self.map(Into::into)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Well known filters
////////////////////////////////////////////////////////////////////////////////

/// Filters that get a compact `builtin_filter` instruction, the id is the
/// index in this table. They are still resolved by name when called.
const BUILTIN_FILTERS: &[&str] = &[
    "abs",
    "append",
    "at_least",
    "at_most",
    "capitalize",
    "ceil",
    "compact",
    "concat",
    "date",
    "default",
    "divided_by",
    "downcase",
    "escape",
    "escape_once",
    "first",
    "floor",
    "join",
    "last",
    "lstrip",
    "map",
    "minus",
    "modulo",
    "newline_to_br",
    "plus",
    "prepend",
    "remove",
    "remove_first",
    "replace",
    "replace_first",
    "reverse",
    "round",
    "rstrip",
    "size",
    "slice",
    "sort",
    "sort_natural",
    "split",
    "strip",
    "strip_html",
    "strip_newlines",
    "sum",
    "times",
    "truncate",
    "truncatewords",
    "uniq",
    "upcase",
    "url_decode",
    "url_encode",
    "where",
];

pub fn builtin_id(name: &str) -> Option<u8> {
    BUILTIN_FILTERS
        .binary_search(&name)
        .ok()
        .and_then(|i| u8::try_from(i).ok())
}

pub fn builtin_name(id: u8) -> Option<&'static str> {
    BUILTIN_FILTERS.get(usize::from(id)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn builtin_table_is_sorted() {
        assert!(BUILTIN_FILTERS.windows(2).all(|w| w[0] < w[1]));
        for (i, name) in BUILTIN_FILTERS.iter().enumerate() {
            assert_eq!(builtin_id(name), Some(i as u8));
            assert_eq!(builtin_name(i as u8), Some(*name));
        }
        assert_eq!(builtin_id("custom"), None);
        assert_eq!(builtin_name(u8::MAX), None);
    }

    #[test]
    fn filter_wrong_number_of_arguments() {
        let f = new(|s: String| s.to_uppercase());
        let err = f(vec![Value::from("a"), Value::from("b")]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.message(), "wrong number of arguments (given 2, expected 1)");
    }

    #[test]
    fn filter_argument_type_mismatch() {
        let f = new(|s: String, n: i64| s.repeat(n as usize));
        assert_eq!(
            f(vec![Value::from("ab"), Value::Integer(2)]).unwrap(),
            Value::from("abab")
        );
        let err = f(vec![Value::from("ab"), Value::from(vec![1])]).unwrap_err();
        assert_eq!(err.message(), "expected i64 argument, found list");
    }

    #[test]
    fn filter_optional_return() {
        let f = new(|mut list: Vec<Value>| list.pop());
        assert_eq!(f(vec![Value::List(vec![])]).unwrap(), Value::Nil);
    }
}
