//! Serialization of values stored in a template's constant pool.
//!
//! Only plain data can be serialized, host objects and lazy values are
//! rejected. The variant indices of the manual [`Serialize`] implementation
//! must match the declaration order of [`Repr`].

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, SerializeTupleVariant, Serializer};

use crate::value::{List, Map};
use crate::Value;

const NAME: &str = "Value";

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Nil => serializer.serialize_unit_variant(NAME, 0, "Nil"),
            Self::Bool(b) => serializer.serialize_newtype_variant(NAME, 1, "Bool", b),
            Self::Integer(i) => serializer.serialize_newtype_variant(NAME, 2, "Integer", i),
            Self::Float(f) => serializer.serialize_newtype_variant(NAME, 3, "Float", f),
            Self::String(s) => serializer.serialize_newtype_variant(NAME, 4, "String", s),
            Self::List(l) => serializer.serialize_newtype_variant(NAME, 5, "List", l),
            Self::Map(m) => serializer.serialize_newtype_variant(NAME, 6, "Map", m),
            Self::Range(m, n) => {
                let mut tv = serializer.serialize_tuple_variant(NAME, 7, "Range", 2)?;
                tv.serialize_field(m)?;
                tv.serialize_field(n)?;
                tv.end()
            }
            v => Err(S::Error::custom(format!("cannot serialize {}", v.human()))),
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(rename = "Value")]
enum Repr {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(List<Repr>),
    Map(Map<String, Repr>),
    Range(i64, i64),
}

impl From<Repr> for Value {
    fn from(repr: Repr) -> Self {
        match repr {
            Repr::Nil => Self::Nil,
            Repr::Bool(b) => Self::Bool(b),
            Repr::Integer(i) => Self::Integer(i),
            Repr::Float(f) => Self::Float(f),
            Repr::String(s) => Self::String(s),
            Repr::List(l) => Self::List(l.into_iter().map(Self::from).collect()),
            Repr::Map(m) => Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect()),
            Repr::Range(m, n) => Self::Range(m, n),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Repr::deserialize(deserializer).map(Self::from)
    }
}
