use std::collections::BTreeMap;

use sluice::{value, Engine, Error, ErrorKind, Value};

fn render(engine: &Engine<'_>, source: &str, env: Value) -> String {
    engine.compile(source).unwrap().render(env).unwrap()
}

#[test]
fn render_filter_arity_1() {
    let mut engine = Engine::new();
    engine.add_filter("lower", |v: String| v.to_lowercase());
    assert_eq!(render(&engine, "{{ name | lower }}", value! { name: "JOHN" }), "john");
}

#[test]
fn render_filter_arity_2() {
    let mut engine = Engine::new();
    engine.add_filter("surround", |v: String, a: String| format!("{a}{v}{a}"));
    assert_eq!(
        render(&engine, "{{ name | surround: '*' }}", value! { name: "John" }),
        "*John*"
    );
}

#[test]
fn render_filter_arity_4() {
    let mut engine = Engine::new();
    engine.add_filter("clamp3", |v: i64, lo: i64, hi: i64, fallback: Option<String>| {
        match fallback {
            Some(s) if v < lo || v > hi => Value::from(s),
            _ => Value::from(v.clamp(lo, hi)),
        }
    });
    assert_eq!(render(&engine, "{{ 15 | clamp3: 1, 10, nil }}", value! {}), "10");
    assert_eq!(render(&engine, "{{ 15 | clamp3: 1, 10, 'no' }}", value! {}), "no");
}

#[test]
fn render_filter_result_return() {
    let mut engine = Engine::new();
    engine.add_filter("checked", |v: i64| -> sluice::Result<i64> {
        match v {
            0 => Err(Error::render("zero is not allowed")),
            v => Ok(v),
        }
    });
    assert_eq!(render(&engine, "{{ 1 | checked }}", value! {}), "1");
    assert_eq!(
        render(&engine, "{{ 0 | checked }}", value! {}),
        "Liquid error (line 1): zero is not allowed"
    );
}

#[test]
fn render_filter_collection_args() {
    let mut engine = Engine::new();
    engine.add_filter("keys", |m: BTreeMap<String, Value>| {
        m.into_keys().collect::<Vec<_>>()
    });
    engine.add_filter("count", |l: Vec<Value>| l.len());
    assert_eq!(
        render(
            &engine,
            "{{ map | keys | join: ',' }} {{ list | count }} {{ (1..4) | count }}",
            value! { map: { a: 1, b: 2 }, list: [1, 2] }
        ),
        "a,b 2 4"
    );
}

#[test]
fn render_filter_keyword_arguments() {
    let mut engine = Engine::new();
    engine.add_filter_fn("debug_args", |args: Vec<Value>| {
        Ok(Value::from(format!("{args:?}")))
    });
    assert_eq!(
        render(&engine, "{{ 1 | debug_args: 2, key: 'v' }}", value! {}),
        r#"[Integer(1), Integer(2), Map({"key": String("v")})]"#
    );
}

#[test]
fn render_filter_argument_type_error() {
    let engine = Engine::new();
    let (result, errors) = engine
        .compile("{{ 'a' | append: list }}")
        .unwrap()
        .renderer()
        .with_environment(value! { list: [1] })
        .to_string_with_errors()
        .unwrap();
    assert_eq!(
        result,
        "Liquid error (line 1): expected string argument, found list"
    );
    assert_eq!(errors[0].kind(), ErrorKind::FilterArgument);
}

#[test]
fn render_filter_undefined_passes_through() {
    let engine = Engine::new();
    assert_eq!(render(&engine, "{{ 'a' | nope: 1 }}", value! {}), "a");
}

#[test]
fn render_filter_overrides_builtin() {
    let mut engine = Engine::new();
    engine.add_filter("upcase", |s: String| format!("<{s}>"));
    assert_eq!(render(&engine, "{{ 'a' | upcase }}", value! {}), "<a>");
}

#[test]
fn render_filter_empty_engine() {
    let engine = Engine::empty();
    assert_eq!(render(&engine, "{{ 'a' | upcase }}", value! {}), "a");
}

////////////////////////////////////////////////////////////////////////////////
// Standard filters
////////////////////////////////////////////////////////////////////////////////

#[test]
fn render_builtin_string_filters() {
    let engine = Engine::new();
    assert_eq!(
        render(
            &engine,
            "{{ s | strip | capitalize | append: '!' | prepend: '> ' }}|{{ s | upcase }}|{{ s | downcase }}",
            value! { s: "  hello World " }
        ),
        "> Hello world!|  HELLO WORLD |  hello world "
    );
}

#[test]
fn render_builtin_split_join() {
    let engine = Engine::new();
    assert_eq!(
        render(&engine, "{{ 'a b  c' | split: ' ' | join: '-' }}", value! {}),
        "a-b-c"
    );
    assert_eq!(
        render(&engine, "{{ 'a,b' | split: ',' | join }}", value! {}),
        "a b"
    );
}

#[test]
fn render_builtin_collection_filters() {
    let engine = Engine::new();
    let env = value! { list: [3, 1, 2] };
    assert_eq!(
        render(
            &engine,
            "{{ list | size }} {{ list | first }} {{ list | last }} {{ list | reverse | join: ',' }} {{ 'abc' | size }}",
            env
        ),
        "3 3 2 2,1,3 3"
    );
}

#[test]
fn render_builtin_math_filters() {
    let engine = Engine::new();
    assert_eq!(
        render(
            &engine,
            "{{ 1 | plus: 2 }} {{ 5 | minus: 7 }} {{ 3 | times: 1.5 }} {{ '4' | plus: '1' }}",
            value! {}
        ),
        "3 -2 4.5 5"
    );
}

#[test]
fn render_builtin_default() {
    let engine = Engine::new();
    let env = value! { a: nil, b: "", c: "x", d: false };
    assert_eq!(
        render(
            &engine,
            "{{ a | default: 1 }} {{ b | default: 2 }} {{ c | default: 3 }} {{ d | default: 4 }} {{ d | default: 5, allow_false: true }}",
            env
        ),
        "1 2 x 4 false"
    );
}
