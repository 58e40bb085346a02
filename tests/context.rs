use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sluice::{value, Context, Engine, ErrorKind, Lazy, Object, Value};

#[derive(Debug)]
struct Product {
    title: &'static str,
    variants: Vec<&'static str>,
}

impl Object for Product {
    fn has_key(&self, key: &str) -> bool {
        matches!(key, "title" | "variants")
    }

    fn get(&self, key: &str) -> Option<Value> {
        match key {
            "title" => Some(Value::from(self.title)),
            "variants" => Some(Value::from(self.variants.clone())),
            _ => None,
        }
    }

    fn invoke(&self, command: &str) -> Option<Value> {
        match command {
            "size" => Some(Value::from(self.variants.len())),
            _ => None,
        }
    }

    fn to_liquid_string(&self) -> String {
        format!("Product({})", self.title)
    }
}

fn product() -> Value {
    Value::from(Arc::new(Product {
        title: "Shirt",
        variants: vec!["S", "M", "L"],
    }))
}

#[test]
fn render_environments_in_order() {
    let engine = Engine::new();
    let template = engine.compile("{{ a }}{{ b }}{{ c }}").unwrap();
    let result = template
        .renderer()
        .with_environment(value! { a: 1 })
        .with_environment(value! { a: 2, b: 2 })
        .with_static_environment(value! { a: 3, b: 3, c: 3 })
        .to_string()
        .unwrap();
    assert_eq!(result, "123");
}

#[test]
fn render_err_environment_not_a_map() {
    let engine = Engine::new();
    let template = engine.compile("lorem").unwrap();
    let err = template.render(Value::from(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(err.message(), "expected map or object environment, found integer");
}

#[test]
fn render_object_members() {
    let env = value! { product: product() };
    let result = Engine::new()
        .compile("{{ product.title }} {{ product.variants | join: '/' }} {{ product.size }} {{ product }}")
        .unwrap()
        .render(env)
        .unwrap();
    assert_eq!(result, "Shirt S/M/L 3 Product(Shirt)");
}

#[test]
fn render_object_environment() {
    let result = Engine::new()
        .compile("{{ title }}[{{ missing }}]")
        .unwrap()
        .render(product())
        .unwrap();
    assert_eq!(result, "Shirt[]");
}

#[test]
fn render_lazy_is_memoized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let lazy = Lazy::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Value::from("computed")
    });
    let result = Engine::new()
        .compile("{{ x }} {{ x }}")
        .unwrap()
        .render(value! { x: lazy })
        .unwrap();
    assert_eq!(result, "computed computed");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn render_lazy_in_static_environment_is_not_memoized() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let lazy = Lazy::new(move || Value::from(counter.fetch_add(1, Ordering::SeqCst)));
    let result = Engine::new()
        .compile("{{ x }} {{ x }}")
        .unwrap()
        .renderer()
        .with_static_environment(value! { x: lazy })
        .to_string()
        .unwrap();
    assert_eq!(result, "0 1");
}

#[test]
fn render_with_existing_context() {
    let engine = Engine::new();
    let template = engine
        .compile("{% assign y = x | plus: 1 %}{{ y }}")
        .unwrap();

    let mut cx = Context::new(&engine);
    cx.push_environment(value! { x: 1 }).unwrap();
    assert_eq!(template.render_with(&mut cx).unwrap(), "2");

    // Assignments stay in the context.
    let next = engine.compile("{{ y | plus: 1 }}").unwrap();
    assert_eq!(next.render_with(&mut cx).unwrap(), "3");
}

#[test]
fn context_scopes() {
    let engine = Engine::empty();
    let mut cx = Context::new(&engine);
    cx.assign("a", Value::from(1));
    cx.push_scope(Default::default());
    cx.set("a", Value::from(2));
    cx.assign("b", Value::from(3));
    assert_eq!(cx.find_variable("a", false).unwrap(), Value::from(2));
    assert!(cx.pop_scope().is_some());
    assert_eq!(cx.find_variable("a", false).unwrap(), Value::from(1));
    assert_eq!(cx.find_variable("b", false).unwrap(), Value::from(3));
    assert!(cx.pop_scope().is_none());
}

#[test]
fn context_errors_are_collected() {
    let engine = Engine::new();
    let template = engine.compile("{{ a }}{{ b }}").unwrap();
    let mut cx = Context::new(&engine);
    cx.set_strict_variables(true);
    let result = template.render_with(&mut cx).unwrap();
    assert_eq!(
        result,
        "Liquid error (line 1): undefined variable aLiquid error (line 1): undefined variable b"
    );
    assert_eq!(cx.errors().len(), 2);
    assert_eq!(cx.take_errors().len(), 2);
    assert!(cx.errors().is_empty());
}

#[test]
fn context_call_filter() {
    let engine = Engine::new();
    let cx = Context::new(&engine);
    assert_eq!(
        cx.call_filter("append", vec![Value::from("a"), Value::from("b")])
            .unwrap(),
        Value::from("ab")
    );
    assert!(!cx.filtering());
}
