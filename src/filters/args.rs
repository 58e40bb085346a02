use crate::filters::FilterArg;
use crate::value::{List, Map};
use crate::Value;

pub type Result<T> = std::result::Result<T, Error>;

pub enum Error {
    /// When there is a type mismatch.
    Type(
        /// Expected
        &'static str,
        /// Got
        &'static str,
    ),
    /// Failed to convert to the integer type.
    TryFromInt(
        /// Type
        &'static str,
        /// Value
        i64,
    ),
}

impl Error {
    pub fn message(&self) -> String {
        match self {
            Self::Type(exp, got) => format!("expected {exp} argument, found {got}"),
            Self::TryFromInt(ty, i) => format!("integer {i} out of range for {ty}"),
        }
    }
}

impl FilterArg for Value {
    fn from_value(v: Value) -> Result<Self> {
        Ok(v)
    }
}

impl FilterArg for bool {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Bool(b) => Ok(b),
            v => Err(Error::Type("bool", v.human())),
        }
    }
}

macro_rules! impl_for_int {
    ($($ty:ty)+) => {
        $(
            impl FilterArg for $ty {
                fn from_value(v: Value) -> Result<Self> {
                    let i = match &v {
                        Value::Integer(i) => *i,
                        Value::Float(_) | Value::String(_) => v
                            .to_integer()
                            .map_err(|_| Error::Type(stringify!($ty), v.human()))?,
                        v => return Err(Error::Type(stringify!($ty), v.human())),
                    };
                    i.try_into().map_err(|_| Error::TryFromInt(stringify!($ty), i))
                }
            }
        )+
    };
}

impl_for_int! { u8 u16 u32 u64 usize i8 i16 i32 i64 isize }

macro_rules! impl_for_float {
    ($($ty:ty)+) => {
        $(
            impl FilterArg for $ty {
                fn from_value(v: Value) -> Result<Self> {
                    match v {
                        Value::Float(f) => Ok(f as $ty),
                        Value::Integer(i) => Ok(i as $ty),
                        v => Err(Error::Type(stringify!($ty), v.human())),
                    }
                }
            }
        )+
    }
}

impl_for_float! { f32 f64 }

/// Scalars are converted to their output text, nil becomes empty.
impl FilterArg for String {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::String(s) => Ok(s),
            Value::Nil => Ok(String::new()),
            v @ (Value::Bool(_) | Value::Integer(_) | Value::Float(_)) => Ok(v.to_liquid_string()),
            v => Err(Error::Type("string", v.human())),
        }
    }
}

impl FilterArg for List<Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::List(l) => Ok(l),
            Value::Range(m, n) => Ok((m..=n).map(Value::Integer).collect()),
            v => Err(Error::Type("list", v.human())),
        }
    }
}

impl FilterArg for Map<String, Value> {
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Map(m) => Ok(m),
            v => Err(Error::Type("map", v.human())),
        }
    }
}

impl<T> FilterArg for Option<T>
where
    T: FilterArg,
{
    fn from_value(v: Value) -> Result<Self> {
        match v {
            Value::Nil => Ok(None),
            v => T::from_value(v).map(Some),
        }
    }
}
