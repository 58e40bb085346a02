//! Conversions from host data into [`Value`]s.

use std::collections::{BTreeMap, HashMap};
use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::value::{Lazy, Object};
use crate::Value;

macro_rules! impl_from {
    ($($ty:ty => |$v:ident| $conv:expr),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from($v: $ty) -> Self {
                    $conv
                }
            }
        )+
    };
}

impl_from! {
    bool => |b| Self::Bool(b),
    i8 => |i| Self::Integer(i.into()),
    i16 => |i| Self::Integer(i.into()),
    i32 => |i| Self::Integer(i.into()),
    i64 => |i| Self::Integer(i),
    u8 => |i| Self::Integer(i.into()),
    u16 => |i| Self::Integer(i.into()),
    u32 => |i| Self::Integer(i.into()),
    usize => |i| Self::Integer(i64::try_from(i).unwrap_or(i64::MAX)),
    f64 => |f| Self::Float(f),
    String => |s| Self::String(s),
    &str => |s| Self::String(s.to_owned()),
    RangeInclusive<i64> => |r| Self::Range(*r.start(), *r.end()),
    Lazy => |lazy| Self::Lazy(lazy),
}

/// Host objects are shared, rendering never clones the object itself.
impl<T> From<Arc<T>> for Value
where
    T: Object + 'static,
{
    fn from(obj: Arc<T>) -> Self {
        Self::Object(obj)
    }
}

impl<V> From<Option<V>> for Value
where
    V: Into<Value>,
{
    fn from(opt: Option<V>) -> Self {
        opt.map_or(Self::Nil, Into::into)
    }
}

impl<V> From<Vec<V>> for Value
where
    V: Into<Value>,
{
    fn from(list: Vec<V>) -> Self {
        list.into_iter().collect()
    }
}

impl<K, V> From<BTreeMap<K, V>> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(map: BTreeMap<K, V>) -> Self {
        Self::Map(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K, V> From<HashMap<K, V>> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(map: HashMap<K, V>) -> Self {
        Self::Map(map.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Collects into a list.
impl<V> FromIterator<V> for Value
where
    V: Into<Value>,
{
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = V>,
    {
        Self::List(iter.into_iter().map(Into::into).collect())
    }
}
