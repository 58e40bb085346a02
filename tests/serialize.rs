use sluice::{value, Engine, ErrorKind, FORMAT_VERSION};

const SOURCE: &str = "\
{% assign greeting = 'hello' | capitalize %}
{%- capture list -%}
  {%- for item in items reversed limit: 2 -%}
    {{ item | upcase }}{% unless forloop.last %},{% endunless %}
  {%- endfor -%}
{%- endcapture -%}
{{ greeting }} {{ list }}{% if user.admin %} (admin){% else %} (guest){% endif %}
{% raw %}{{ untouched }}{% endraw %}{% comment %}gone{% endcomment %}
{%- liquid
  for i in (1..3)
    echo i
  endfor
%}";

#[test]
fn dump_and_load_render_the_same() {
    let engine = Engine::new();
    let compiled = engine.compile(SOURCE).unwrap();
    let data = compiled.dump().unwrap();
    let loaded = engine.load(&data).unwrap();

    let env = value! { items: ["a", "b", "c"], user: { admin: true } };
    let expected = "Hello B,A (admin)\n{{ untouched }}123";
    assert_eq!(compiled.render(env.clone()).unwrap(), expected);
    assert_eq!(loaded.render(env).unwrap(), expected);
}

#[test]
fn dump_and_load_keep_disassembly() {
    let engine = Engine::new();
    let compiled = engine.compile("a{{ b | append: 'c' }}{% if d %}e{% endif %}").unwrap();
    let loaded = engine.load(&compiled.dump().unwrap()).unwrap();
    assert_eq!(
        compiled.disassemble().unwrap(),
        loaded.disassemble().unwrap()
    );
}

#[test]
fn dump_and_load_are_stable() {
    let engine = Engine::new();
    let data = engine.compile(SOURCE).unwrap().dump().unwrap();
    let again = engine.load(&data).unwrap().dump().unwrap();
    assert_eq!(data, again);
}

#[test]
fn dump_starts_with_format_version() {
    let data = Engine::new().compile("lorem").unwrap().dump().unwrap();
    assert_eq!(&data[..4], &FORMAT_VERSION.to_le_bytes());
}

#[test]
fn load_keeps_line_numbers() {
    let engine = Engine::new();
    let data = engine
        .compile("lorem\n{% if 1 < 'a' %}{% endif %}")
        .unwrap()
        .dump()
        .unwrap();
    let result = engine.load(&data).unwrap().render(value! {}).unwrap();
    assert_eq!(
        result,
        "lorem\nLiquid error (line 2): comparison of integer with string failed"
    );
}

#[test]
fn load_err_unknown_tag() {
    let data = Engine::new()
        .compile("{% if x %}y{% endif %}")
        .unwrap()
        .dump()
        .unwrap();
    let err = Engine::empty().load(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialize);
    assert_eq!(err.message(), "unknown tag 'if'");
}

#[test]
fn load_err_version_mismatch() {
    let mut data = Engine::new().compile("lorem").unwrap().dump().unwrap();
    data[..4].copy_from_slice(&(FORMAT_VERSION + 1).to_le_bytes());
    let err = Engine::new().load(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialize);
    assert_eq!(
        err.message(),
        format!(
            "incompatible serialization versions, expected {} but got {}",
            FORMAT_VERSION,
            FORMAT_VERSION + 1
        )
    );
}

#[test]
fn load_err_truncated() {
    let data = Engine::new().compile("lorem").unwrap().dump().unwrap();
    let err = Engine::new().load(&data[..10]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialize);
    assert_eq!(err.message(), "serialized template is truncated");
}

#[test]
fn load_err_tag_body_not_sealed_before_parent() {
    let engine = Engine::new();
    let mut data = engine
        .compile("{% if x %}a{% endif %}")
        .unwrap()
        .dump()
        .unwrap();
    let entrypoint: [u8; 4] = data[4..8].try_into().unwrap();

    // name length, markup length, then "if" and "x"
    let tail = [2, 0, 0, 0, 1, 0, 0, 0, b'i', b'f', b'x'];
    let at = data
        .windows(tail.len())
        .position(|w| w == tail)
        .unwrap();
    data[at - 4..at].copy_from_slice(&entrypoint);

    let err = engine.load(&data).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Deserialize);
    assert_eq!(
        err.message(),
        format!(
            "invalid tag body offset {0} in body at offset {0}",
            u32::from_le_bytes(entrypoint)
        )
    );
}
