use sluice::{Engine, ErrorKind};

#[test]
fn compile_empty() {
    Engine::new().compile("").unwrap();
}

#[test]
fn compile_raw() {
    Engine::new().compile("lorem ipsum dolor sit amet").unwrap();
}

#[test]
fn compile_variable_with_filters() {
    Engine::new()
        .compile("lorem {{ ipsum.dolor | append: 'x' | upcase }} sit amet")
        .unwrap();
}

#[test]
fn compile_variable_index() {
    Engine::new()
        .compile("lorem {{ ipsum[0].dolor['sit'] }} amet")
        .unwrap();
}

#[test]
fn compile_nested_blocks() {
    Engine::new()
        .compile(
            "{% for x in xs %}{% if x > 1 %}{{ x }}{% elsif x == 1 %}one{% else %}-{% endif %}{% endfor %}",
        )
        .unwrap();
}

#[test]
fn compile_comment_body_is_not_parsed() {
    Engine::new()
        .compile("{% comment %}{% nope %}{{ x }}{% endcomment %}")
        .unwrap();
}

#[test]
fn compile_disassemble() {
    let engine = Engine::new();
    let template = engine.compile("Hello {{ name }}").unwrap();
    assert_eq!(
        template.disassemble().unwrap(),
        "\
0x0000: write_raw(\"Hello \")
0x0008: render_variable_rescue(line_number: 1)
0x000c: find_static_var(\"name\")
0x000f: pop_write
0x0010: leave
"
    );
}

#[test]
fn compile_err_unknown_tag() {
    let err = Engine::new().compile("lorem\n{% nope %}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "Unknown tag 'nope'");
    assert_eq!(err.line_number(), Some(2));
    assert_eq!(err.to_string(), "Liquid syntax error (line 2): Unknown tag 'nope'");
}

#[test]
fn compile_err_unknown_tag_without_line_numbers() {
    let mut engine = Engine::new();
    engine.set_line_numbers(false);
    let err = engine.compile("lorem\n{% nope %}").unwrap_err();
    assert_eq!(err.line_number(), None);
    assert_eq!(err.to_string(), "Liquid syntax error: Unknown tag 'nope'");
}

#[test]
fn compile_err_block_never_closed() {
    let err = Engine::new().compile("{% if x %}lorem").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.message(), "'if' tag was never closed");
}

#[test]
fn compile_err_mismatched_end_tag() {
    let err = Engine::new()
        .compile("{% if x %}\nlorem\n{% endfor %}")
        .unwrap_err();
    assert_eq!(err.message(), "Unknown tag 'endfor'");
    assert_eq!(err.line_number(), Some(3));
}

#[test]
fn compile_err_else_after_else() {
    let err = Engine::new()
        .compile("{% if x %}a{% else %}b{% else %}c{% endif %}")
        .unwrap_err();
    assert_eq!(err.message(), "Unknown tag 'else'");
}

#[test]
fn compile_err_raw_never_closed() {
    let err = Engine::new().compile("{% raw %}{{ x }}").unwrap_err();
    assert_eq!(err.message(), "'raw' tag was never closed");
}

#[test]
fn compile_err_assign_syntax() {
    let err = Engine::new().compile("{% assign x %}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(
        err.message(),
        "Syntax Error in 'assign' - Valid syntax: assign [var] = [source]"
    );
    assert_eq!(err.line_number(), Some(1));
}

#[test]
fn compile_err_for_syntax() {
    let err = Engine::new()
        .compile("{% for x on xs %}{% endfor %}")
        .unwrap_err();
    assert_eq!(
        err.message(),
        "Syntax Error in 'for loop' - Valid syntax: for [item] in [collection]"
    );
}

#[test]
fn compile_err_for_invalid_attribute() {
    let err = Engine::new()
        .compile("{% for x in xs skip: 2 %}{% endfor %}")
        .unwrap_err();
    assert_eq!(err.message(), "Invalid attribute 'skip' in 'for loop'");
}

#[test]
fn compile_err_unknown_operator() {
    let err = Engine::new()
        .compile("{% if a =! b %}{% endif %}")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
}

#[test]
fn compile_err_unterminated_variable() {
    let err = Engine::new().compile("lorem {{ ipsum").unwrap_err();
    assert_eq!(
        err.message(),
        "variable '{{ ipsum' was not properly terminated with '}}'"
    );
}

#[test]
fn compile_err_variable_trailing_markup() {
    let err = Engine::new().compile("\n{{ a b }}").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.line_number(), Some(2));
}

#[test]
fn parse_expression_constant() {
    let expr = Engine::new().parse_expression("'lorem'").unwrap();
    assert_eq!(expr.constant(), Some(&sluice::Value::from("lorem")));
}

#[test]
fn parse_expression_filtered() {
    let engine = Engine::new();
    let expr = engine.parse_expression("name | upcase").unwrap();
    assert_eq!(expr.constant(), None);

    let mut cx = sluice::Context::new(&engine);
    cx.push_environment(sluice::value! { name: "john" }).unwrap();
    assert_eq!(expr.evaluate(&mut cx).unwrap(), sluice::Value::from("JOHN"));
}
