//! Layered configuration resolution.

use automark::core::ToolchainKind;
use automark::core::config::{
    CompareMode, ConfigError, ConfigLayer, ConfigStore, LayerSource, parse_duration, resolve,
};
use automark::core::directive::parse;
use std::path::PathBuf;
use std::time::Duration;

fn layers(text: &str) -> (ConfigLayer, ConfigLayer) {
    let spec = parse(ToolchainKind::Compiled, text);
    let file = ConfigLayer::from_directives(LayerSource::File, &spec.globals);
    let subtest = ConfigLayer::from_directives(LayerSource::SubTest, &spec.tests[0].directives);
    (file, subtest)
}

fn defaults(timeout: i64) -> ConfigLayer {
    ConfigLayer::defaults(ToolchainKind::Compiled).with("TIMEOUT", timeout)
}

#[test]
fn sub_test_beats_file_beats_defaults() {
    let cohort = ConfigLayer::new(LayerSource::Cohort);

    let (file, subtest) = layers("//@mark TIMEOUT=30\n//@test t TIMEOUT=5\n");
    let cfg = resolve(ToolchainKind::Compiled, &defaults(60), &cohort, &file, &subtest).unwrap();
    assert_eq!(cfg.limits.timeout, Some(Duration::from_secs(5)));
    assert_eq!(cfg.source_of("TIMEOUT"), Some(LayerSource::SubTest));

    let (file, subtest) = layers("//@mark TIMEOUT=30\n//@test t\n");
    let cfg = resolve(ToolchainKind::Compiled, &defaults(60), &cohort, &file, &subtest).unwrap();
    assert_eq!(cfg.limits.timeout, Some(Duration::from_secs(30)));
    assert_eq!(cfg.source_of("timeout"), Some(LayerSource::File));

    let (file, subtest) = layers("//@test t\n");
    let cfg = resolve(ToolchainKind::Compiled, &defaults(60), &cohort, &file, &subtest).unwrap();
    assert_eq!(cfg.limits.timeout, Some(Duration::from_secs(60)));
    assert_eq!(cfg.source_of("TIMEOUT"), Some(LayerSource::Defaults));
}

#[test]
fn cohort_sits_between_defaults_and_file() {
    let cohort = ConfigLayer::new(LayerSource::Cohort).with("TIMEOUT", 20);
    let (file, subtest) = layers("//@test t\n");
    let cfg = resolve(ToolchainKind::Compiled, &defaults(60), &cohort, &file, &subtest).unwrap();
    assert_eq!(cfg.limits.timeout, Some(Duration::from_secs(20)));
}

#[test]
fn resolution_is_pure() {
    let cohort = ConfigLayer::new(LayerSource::Cohort).with("COMPILER", "gcc");
    let (file, subtest) = layers("//@mark CFLAGS=-O2 CFLAGS=-g\n//@test t EXPECT=5 COMPARE=numeric\n");
    let base = ConfigLayer::defaults(ToolchainKind::Compiled);
    let first = resolve(ToolchainKind::Compiled, &base, &cohort, &file, &subtest).unwrap();
    let second = resolve(ToolchainKind::Compiled, &base, &cohort, &file, &subtest).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.artifact_key(), second.artifact_key());
}

#[test]
fn lists_concatenate_within_the_winning_layer_only() {
    let cohort = ConfigLayer::new(LayerSource::Cohort);
    let (file, subtest) = layers("//@mark CFLAGS=\"-Wall -O2\"\n//@mark CFLAGS=-g\n//@test t\n");
    let cfg = resolve(
        ToolchainKind::Compiled,
        &ConfigLayer::defaults(ToolchainKind::Compiled),
        &cohort,
        &file,
        &subtest,
    )
    .unwrap();
    assert_eq!(cfg.build.cflags, ["-Wall", "-O2", "-g"]);
}

#[test]
fn compiled_defaults_apply() {
    let cohort = ConfigLayer::new(LayerSource::Cohort);
    let (file, subtest) = layers("//@test t\n");
    let cfg = resolve(
        ToolchainKind::Compiled,
        &ConfigLayer::defaults(ToolchainKind::Compiled),
        &cohort,
        &file,
        &subtest,
    )
    .unwrap();
    assert_eq!(cfg.build.cflags, ["-Wall", "-std=gnu99"]);
    assert_eq!(cfg.limits.timeout, Some(Duration::from_secs(10)));
    assert_eq!(cfg.limits.build_timeout, Some(Duration::from_secs(60)));
    assert_eq!(cfg.limits.output_cap, 65536);
    assert_eq!(cfg.run.compare, CompareMode::Exact);
    assert_eq!(cfg.run.exit_code, 0);
    assert_eq!(cfg.env.compiler.as_deref(), Some("cc"));
    assert!(!cfg.lint.enabled);
}

#[test]
fn environment_keys_ignore_directive_layers() {
    let cohort = ConfigLayer::new(LayerSource::Cohort).with("COMPILER", "gcc");
    let (file, subtest) = layers("//@mark COMPILER=evil BUILD_ROOT=/tmp/x\n//@test t COMPILER=worse\n");
    let cfg = resolve(
        ToolchainKind::Compiled,
        &ConfigLayer::defaults(ToolchainKind::Compiled),
        &cohort,
        &file,
        &subtest,
    )
    .unwrap();
    assert_eq!(cfg.env.compiler.as_deref(), Some("gcc"));
    assert_eq!(cfg.source_of("COMPILER"), Some(LayerSource::Cohort));
    assert_ne!(cfg.env.build_root, Some(PathBuf::from("/tmp/x")));
}

#[test]
fn coercion_failures_name_key_and_layer() {
    let cohort = ConfigLayer::new(LayerSource::Cohort);
    let (file, subtest) = layers("//@mark EXIT_CODE=zero\n//@test t\n");
    let err = resolve(
        ToolchainKind::Compiled,
        &ConfigLayer::defaults(ToolchainKind::Compiled),
        &cohort,
        &file,
        &subtest,
    )
    .unwrap_err();
    match err {
        ConfigError::Invalid { key, layer, value, .. } => {
            assert_eq!(key, "EXIT_CODE");
            assert_eq!(layer, LayerSource::File);
            assert_eq!(value, "zero");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn invalid_regex_expectation_is_rejected() {
    let cohort = ConfigLayer::new(LayerSource::Cohort);
    let (file, subtest) = layers("//@test t EXPECT=\"(unclosed\" COMPARE=regex\n");
    let err = resolve(
        ToolchainKind::Compiled,
        &ConfigLayer::defaults(ToolchainKind::Compiled),
        &cohort,
        &file,
        &subtest,
    )
    .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "EXPECT"));
}

#[test]
fn lint_is_enabled_by_checks_or_threshold() {
    let cohort = ConfigLayer::new(LayerSource::Cohort);
    let base = ConfigLayer::defaults(ToolchainKind::Compiled);
    let (file, subtest) = layers("//@mark CHECKS=style\n//@test t\n");
    let cfg = resolve(ToolchainKind::Compiled, &base, &cohort, &file, &subtest).unwrap();
    assert!(cfg.lint.enabled);
    assert_eq!(cfg.lint.checks, ["style"]);
}

#[test]
fn durations_accept_units_and_none() {
    assert_eq!(parse_duration("250ms"), Ok(Some(Duration::from_millis(250))));
    assert_eq!(parse_duration("2m"), Ok(Some(Duration::from_secs(120))));
    assert_eq!(parse_duration("none"), Ok(None));
    assert_eq!(parse_duration("0"), Ok(None));
    assert!(parse_duration("fortnight").is_err());
}

#[test]
fn store_loads_global_and_cohort_tables() {
    let store = ConfigStore::from_toml_str(
        r#"
name = "cs101-2026"

[global]
TIMEOUT = 20
CFLAGS = ["-Wall", "-Wextra"]

[cohort]
compiler = "gcc"
SEARCH_PATHS = ["/opt/tools"]
no_such_key = 1
"#,
    )
    .unwrap();
    assert_eq!(store.cohort_name.as_deref(), Some("cs101-2026"));

    let spec = parse(ToolchainKind::Compiled, "//@test t\n");
    let cfg = resolve(
        ToolchainKind::Compiled,
        &store.defaults_layer(ToolchainKind::Compiled),
        &store.cohort_layer(),
        &ConfigLayer::from_directives(LayerSource::File, &spec.globals),
        &ConfigLayer::from_directives(LayerSource::SubTest, &spec.tests[0].directives),
    )
    .unwrap();
    assert_eq!(cfg.limits.timeout, Some(Duration::from_secs(20)));
    assert_eq!(cfg.build.cflags, ["-Wall", "-Wextra"]);
    assert_eq!(cfg.env.compiler.as_deref(), Some("gcc"));
    assert_eq!(cfg.env.search_paths, [PathBuf::from("/opt/tools")]);
    assert_eq!(cfg.source_of("TIMEOUT"), Some(LayerSource::Defaults));
}

#[test]
fn malformed_store_is_an_error() {
    assert!(matches!(
        ConfigStore::from_toml_str("[global\nTIMEOUT = 1"),
        Err(ConfigError::Store(_))
    ));
}

#[test]
fn programmatic_globals_overlay_compiled_defaults() {
    let mut store = ConfigStore::default();
    store.set_global("timeout", 15_i64);
    store.set_cohort("compiler", "clang");

    let spec = parse(ToolchainKind::Compiled, "//@test t\n");
    let cfg = resolve(
        ToolchainKind::Compiled,
        &store.defaults_layer(ToolchainKind::Compiled),
        &store.cohort_layer(),
        &ConfigLayer::from_directives(LayerSource::File, &spec.globals),
        &ConfigLayer::from_directives(LayerSource::SubTest, &spec.tests[0].directives),
    )
    .unwrap();
    assert_eq!(cfg.limits.timeout, Some(Duration::from_secs(15)));
    assert_eq!(cfg.env.compiler.as_deref(), Some("clang"));
    assert_eq!(cfg.source_of("COMPILER"), Some(LayerSource::Cohort));
}
