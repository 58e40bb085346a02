#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Value {
    Nil,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Range(i8, i8),
}

impl From<Value> for sluice::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Nil => Self::Nil,
            Value::Bool(b) => Self::Bool(b),
            Value::Integer(i) => Self::Integer(i),
            Value::Float(f) => Self::Float(f),
            Value::String(s) => Self::String(s),
            Value::List(l) => Self::List(l.into_iter().map(Into::into).collect()),
            Value::Map(m) => Self::Map(m.into_iter().map(|(k, v)| (k, v.into())).collect()),
            Value::Range(m, n) => Self::Range(m.into(), n.into()),
        }
    }
}

fuzz_target!(|data: (&str, BTreeMap<String, Value>)| {
    let (source, env) = data;
    let engine = sluice::Engine::new();
    let template = match engine.compile(source) {
        Ok(template) => template,
        Err(_) => return,
    };
    let env: BTreeMap<String, sluice::Value> =
        env.into_iter().map(|(k, v)| (k, v.into())).collect();
    let limits = sluice::Limits {
        render_length_limit: Some(1 << 16),
        render_score_limit: Some(1 << 12),
        assign_score_limit: Some(1 << 16),
    };
    let _ = template
        .renderer()
        .with_environment(sluice::Value::Map(env))
        .with_limits(limits)
        .to_string();
});
