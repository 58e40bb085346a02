use sluice::{value, Engine, ErrorKind, Limits};

fn limits(f: impl FnOnce(&mut Limits)) -> Limits {
    let mut limits = Limits::default();
    f(&mut limits);
    limits
}

#[test]
fn render_length_limit() {
    let engine = Engine::new();
    let template = engine
        .compile("{% for i in (1..100) %}abc{% endfor %}")
        .unwrap();

    let err = template
        .renderer()
        .with_limits(limits(|l| l.render_length_limit = Some(10)))
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimits);
    assert_eq!(err.message(), "memory limits exceeded");

    let result = template
        .renderer()
        .with_limits(limits(|l| l.render_length_limit = Some(300)))
        .to_string()
        .unwrap();
    assert_eq!(result.len(), 300);
}

#[test]
fn render_length_limit_is_not_rescued_by_variables() {
    let engine = Engine::new();
    let template = engine.compile("{{ a }}{{ a }}").unwrap();
    let err = template
        .renderer()
        .with_environment(value! { a: "abcdef" })
        .with_limits(limits(|l| l.render_length_limit = Some(8)))
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimits);
}

#[test]
fn render_score_limit() {
    let engine = Engine::new();
    let template = engine
        .compile("{% for i in (1..10) %}{{ i }}{% endfor %}")
        .unwrap();
    let err = template
        .renderer()
        .with_limits(limits(|l| l.render_score_limit = Some(5)))
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimits);

    template
        .renderer()
        .with_limits(limits(|l| l.render_score_limit = Some(100)))
        .to_string()
        .unwrap();
}

#[test]
fn assign_score_limit() {
    let engine = Engine::new();
    let template = engine
        .compile("{% assign x = 'abcdef' %}{{ x }}")
        .unwrap();
    let err = template
        .renderer()
        .with_limits(limits(|l| l.assign_score_limit = Some(5)))
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimits);

    let result = template
        .renderer()
        .with_limits(limits(|l| l.assign_score_limit = Some(6)))
        .to_string()
        .unwrap();
    assert_eq!(result, "abcdef");
}

#[test]
fn assign_score_limit_counts_captures() {
    let engine = Engine::new();
    let template = engine
        .compile("{% capture x %}{% for i in (1..10) %}ab{% endfor %}{% endcapture %}")
        .unwrap();
    let err = template
        .renderer()
        .with_limits(limits(|l| l.assign_score_limit = Some(15)))
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimits);
}

#[test]
fn captured_output_does_not_count_towards_render_length() {
    let engine = Engine::new();
    let template = engine
        .compile("{% capture x %}{% for i in (1..10) %}ab{% endfor %}{% endcapture %}ok")
        .unwrap();
    let result = template
        .renderer()
        .with_limits(limits(|l| l.render_length_limit = Some(5)))
        .to_string()
        .unwrap();
    assert_eq!(result, "ok");
}

#[test]
fn engine_default_limits() {
    let mut engine = Engine::new();
    engine.set_limits(limits(|l| l.render_length_limit = Some(2)));
    let template = engine.compile("abc").unwrap();
    let err = template.render(value! {}).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceLimits);

    let result = template
        .renderer()
        .with_limits(Limits::default())
        .to_string()
        .unwrap();
    assert_eq!(result, "abc");
}
