//! Directive parsing across the three comment styles.

use automark::core::ToolchainKind;
use automark::core::directive::parse;

const ADDER_TEST: &str = r#"// plain comment
//@mark TIMEOUT=2 CHECKS=style CFLAGS="-Wall -std=gnu99"
int main(void) { return 0; }
//@test test_add EXPECT=5
//| 2 3
//|   4
//@with ARGS=add
//@mark CFLAGS=-O2
//@test test_sub expect=1
//@frobnicate everything
"#;

#[test]
fn globals_keep_every_occurrence_in_order() {
    let spec = parse(ToolchainKind::Compiled, ADDER_TEST);

    let cflags = spec.globals.get("CFLAGS").expect("CFLAGS is set");
    let values: Vec<&str> = cflags.iter().map(|o| o.value.as_str()).collect();
    assert_eq!(values, ["-Wall -std=gnu99", "-O2"]);
    assert_eq!(cflags[0].line, 2);
    assert_eq!(cflags[1].line, 8);
    assert_eq!(spec.globals.last("TIMEOUT").map(|o| o.value.as_str()), Some("2"));
}

#[test]
fn sub_tests_collect_overrides_and_body() {
    let spec = parse(ToolchainKind::Compiled, ADDER_TEST);

    assert_eq!(spec.tests.len(), 2);
    let add = &spec.tests[0];
    assert_eq!(add.name, "test_add");
    assert_eq!(add.line, 4);
    assert_eq!(add.directives.last("EXPECT").map(|o| o.value.as_str()), Some("5"));
    assert_eq!(add.directives.last("ARGS").map(|o| o.value.as_str()), Some("add"));
    assert_eq!(add.body, ["2 3", "  4"]);
    assert_eq!(add.body_text().as_deref(), Some("2 3\n  4\n"));

    let sub = &spec.tests[1];
    assert_eq!(sub.directives.last("EXPECT").map(|o| o.value.as_str()), Some("1"));
    assert!(sub.body_text().is_none());
}

#[test]
fn parsing_is_idempotent() {
    assert_eq!(
        parse(ToolchainKind::Compiled, ADDER_TEST),
        parse(ToolchainKind::Compiled, ADDER_TEST)
    );
}

#[test]
fn zero_declarations_is_not_an_error() {
    let spec = parse(ToolchainKind::Compiled, "int main(void) { return 0; }\n");
    assert!(spec.tests.is_empty());
    assert!(spec.globals.is_empty());
}

#[test]
fn script_files_use_hash_comments() {
    let spec = parse(
        ToolchainKind::Script,
        "#@mark MODULE=calc ENTRY=add\n#@test adds ARGS=\"2 3\" EXPECT=5\n//@test ignored\n",
    );
    assert_eq!(spec.tests.len(), 1);
    assert_eq!(spec.tests[0].directives.last("ARGS").map(|o| o.value.as_str()), Some("2 3"));
}

#[test]
fn hdl_vectors_turn_unknown_keys_into_generics() {
    let spec = parse(
        ToolchainKind::Hdl,
        "--@mark ENTITY=adder_tb\n--@vector small A=1 B=2 TIMEOUT=3\n",
    );
    let small = &spec.tests[0];
    assert_eq!(small.generics.get("A").map(String::as_str), Some("1"));
    assert_eq!(small.generics.get("B").map(String::as_str), Some("2"));
    assert!(!small.generics.contains_key("TIMEOUT"));
    assert_eq!(small.directives.last("TIMEOUT").map(|o| o.value.as_str()), Some("3"));
}

#[test]
fn vectors_are_hdl_only() {
    let spec = parse(ToolchainKind::Compiled, "//@vector small A=1\n");
    assert!(spec.tests.is_empty());
}

#[test]
fn environment_directives_are_reported() {
    let spec = parse(
        ToolchainKind::Compiled,
        "//@mark COMPILER=clang\n//@test t SEARCH_PATHS=/opt\n",
    );
    let flagged: Vec<String> = spec
        .environment_directives()
        .into_iter()
        .map(|(key, _)| key)
        .collect();
    assert_eq!(flagged, ["COMPILER", "SEARCH_PATHS"]);
}
