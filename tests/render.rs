use sluice::{value, Engine, ErrorKind, Value};

fn render(source: &str, env: Value) -> String {
    Engine::new().compile(source).unwrap().render(env).unwrap()
}

#[test]
fn render_raw() {
    assert_eq!(render("lorem ipsum", value! {}), "lorem ipsum");
}

#[test]
fn render_variable_bool() {
    assert_eq!(render("lorem {{ ipsum }}", value! { ipsum: true }), "lorem true");
}

#[test]
fn render_variable_integer() {
    assert_eq!(render("lorem {{ ipsum }}", value! { ipsum: 123 }), "lorem 123");
}

#[test]
fn render_variable_float() {
    assert_eq!(render("{{ a }} {{ b }}", value! { a: 123.4, b: 2.0 }), "123.4 2.0");
}

#[test]
fn render_variable_string() {
    assert_eq!(render("lorem {{ ipsum }}", value! { ipsum: "dolor" }), "lorem dolor");
}

#[test]
fn render_variable_nil_and_missing() {
    assert_eq!(render("[{{ a }}][{{ b }}]", value! { a: nil }), "[][]");
}

#[test]
fn render_variable_list() {
    assert_eq!(render("{{ list }}", value! { list: [1, "a", [2, 3]] }), "1a23");
}

#[test]
fn render_variable_map() {
    assert_eq!(
        render("{{ map }}", value! { map: { a: 1, b: ["x"] } }),
        r#"{"a"=>1, "b"=>["x"]}"#
    );
}

#[test]
fn render_literals() {
    assert_eq!(
        render("{{ 'a' }}{{ \"b\" }}{{ 1 }}{{ 1.5 }}{{ nil }}{{ true }}{{ (1..3) }}", value! {}),
        "ab11.5true1..3"
    );
}

#[test]
fn render_member_access() {
    let env = value! { user: { name: "John", tags: ["a", "b", "c"] } };
    assert_eq!(
        render(
            "{{ user.name }} {{ user['name'] }} {{ user.tags[0] }} {{ user.tags[-1] }}",
            env
        ),
        "John John a c"
    );
}

#[test]
fn render_dynamic_member_access() {
    let env = value! { user: { name: "John" }, key: "name" };
    assert_eq!(render("{{ user[key] }}", env), "John");
}

#[test]
fn render_commands() {
    let env = value! { list: ["a", "b", "c"], s: "héllo", map: { x: 1 } };
    assert_eq!(
        render(
            "{{ list.size }} {{ list.first }} {{ list.last }} {{ s.size }} {{ map.size }}",
            env
        ),
        "3 a c 5 1"
    );
}

#[test]
fn render_member_before_command() {
    let env = value! { map: { size: "big" } };
    assert_eq!(render("{{ map.size }}", env), "big");
}

#[test]
fn render_out_of_bounds_index() {
    let env = value! { list: [1] };
    assert_eq!(render("[{{ list[5] }}][{{ list.missing }}]", env), "[][]");
}

#[test]
fn render_range_commands_and_index() {
    assert_eq!(
        render(
            "{% assign r = (2..4) %}{{ r.size }} {{ r.first }} {{ r.last }} {{ r[1] }} {{ r[-1] }} [{{ r[3] }}]",
            value! {}
        ),
        "3 2 4 3 4 []"
    );
}

#[test]
fn render_range_spanning_all_integers() {
    let source = "\
{%- assign a = -2 -%}
{%- assign b = 9223372036854775807 -%}
{%- assign r = (a..b) -%}
{{ r.size }} {{ r[0] }} {{ r[-1] }}";
    assert_eq!(
        render(source, value! {}),
        "9223372036854775807 -2 9223372036854775807"
    );
}

#[test]
fn render_whitespace_control() {
    assert_eq!(
        render("a  {%- if true -%}  b  {%- endif -%}  c", value! {}),
        "abc"
    );
    assert_eq!(render("a \n {{- 'b' -}} \n c", value! {}), "abc");
}

#[test]
fn render_blank_block_is_empty() {
    assert_eq!(
        render("[{% if true %}  \n  {% assign x = 1 %}  {% endif %}]", value! {}),
        "[]"
    );
}

#[test]
fn render_err_inline_with_line_number() {
    let engine = Engine::new();
    let template = engine
        .compile("lorem\n{{ 'x' | nope }} ipsum")
        .unwrap();
    let (result, errors) = template
        .renderer()
        .strict_filters(true)
        .to_string_with_errors()
        .unwrap();
    assert_eq!(result, "lorem\nLiquid error (line 2): undefined filter nope ipsum");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind(), ErrorKind::UndefinedFilter);
    assert_eq!(errors[0].line_number(), Some(2));
}

#[test]
fn render_err_inline_from_tag() {
    assert_eq!(
        render("a{% if 1 < 'b' %}x{% endif %}c", value! {}),
        "aLiquid error (line 1): comparison of integer with string failedc"
    );
}

#[test]
fn render_err_strict_variables() {
    let engine = Engine::new();
    let template = engine.compile("{{ a }}|{{ b.c }}").unwrap();
    let result = template
        .renderer()
        .with_environment(value! { b: {} })
        .strict_variables(true)
        .to_string()
        .unwrap();
    assert_eq!(
        result,
        "Liquid error (line 1): undefined variable a|Liquid error (line 1): undefined variable c"
    );
}

#[test]
fn render_err_strict_variables_engine_setting() {
    let mut engine = Engine::new();
    engine.set_strict_variables(true);
    let template = engine.compile("{{ a }}").unwrap();
    let (_, errors) = template.renderer().to_string_with_errors().unwrap();
    assert_eq!(errors[0].kind(), ErrorKind::UndefinedVariable);

    let result = template.renderer().strict_variables(false).to_string().unwrap();
    assert_eq!(result, "");
}

#[test]
fn render_err_rethrow() {
    let engine = Engine::new();
    let template = engine.compile("lorem {{ a }}").unwrap();
    let err = template
        .renderer()
        .strict_variables(true)
        .rethrow_errors(true)
        .to_string()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UndefinedVariable);
    assert_eq!(err.message(), "undefined variable a");
    assert_eq!(err.line_number(), Some(1));
}

#[test]
fn render_err_resumes_after_variable() {
    let engine = Engine::new();
    let template = engine
        .compile("{{ 'a' | upcase: 1 }}{{ 'b' }}")
        .unwrap();
    let (result, errors) = template.renderer().to_string_with_errors().unwrap();
    assert_eq!(
        result,
        "Liquid error (line 1): wrong number of arguments (given 2, expected 1)b"
    );
    assert_eq!(errors[0].kind(), ErrorKind::FilterArgument);
}

#[test]
fn render_to_writer() {
    let engine = Engine::new();
    let template = engine.compile("lorem {{ ipsum }}").unwrap();
    let mut buf = Vec::new();
    template
        .renderer()
        .with_environment(value! { ipsum: "dolor" })
        .to_writer(&mut buf)
        .unwrap();
    assert_eq!(buf, b"lorem dolor");
}

#[test]
fn render_template_is_reusable() {
    let engine = Engine::new();
    let template = engine.compile("{{ x }}").unwrap();
    assert_eq!(template.render(value! { x: 1 }).unwrap(), "1");
    assert_eq!(template.clone().render(value! { x: 2 }).unwrap(), "2");
}
