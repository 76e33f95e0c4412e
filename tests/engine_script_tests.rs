//! End-to-end tests of the scripting toolchain. They need a real `python3`
//! and skip themselves when it is absent.

mod common;

use automark::core::{ConfigStore, Engine, OutcomeKind};
use std::path::PathBuf;
use common::{Workspace, have, outcome_of, report_of, run_file, write_script};

const CALC_TEST: &str = r#"#@mark MODULE=calc ENTRY=add TIMEOUT=5
#@test adds ARGS="2 3" EXPECT=5
#@test adds_floats ARGS="0.1 0.2" EXPECT=0.3 COMPARE=numeric
"#;

fn engine(ws: &Workspace) -> Engine {
    let mut store = ConfigStore::default();
    store.set_cohort("BUILD_ROOT", ws.build_root());
    Engine::new(store, ws.submission())
}

macro_rules! require_python {
    () => {
        if !have("python3") {
            eprintln!("python3 not found, skipping");
            return;
        }
    };
}

#[tokio::test]
async fn entry_point_return_value_is_compared() {
    require_python!();
    let ws = Workspace::new();
    ws.write_student("calc.py", "def add(a, b):\n    print('debugging output')\n    return a + b\n");
    let path = ws.write_test("calc_test.py", CALC_TEST);

    let summary = run_file(engine(&ws), &path).await;

    assert_eq!(outcome_of(&summary, "adds"), OutcomeKind::Pass, "{:?}", summary.reports);
    assert_eq!(outcome_of(&summary, "adds_floats"), OutcomeKind::Pass, "{:?}", summary.reports);
}

#[tokio::test]
async fn missing_entry_point_is_a_runtime_error_naming_it() {
    require_python!();
    let ws = Workspace::new();
    ws.write_student("calc.py", "def subtract(a, b):\n    return a - b\n");
    let path = ws.write_test("calc_test.py", CALC_TEST);

    let summary = run_file(engine(&ws), &path).await;

    let report = report_of(&summary, "adds");
    assert_eq!(report.outcome, OutcomeKind::RuntimeError);
    assert!(report.diagnostic.contains("has no attribute 'add'"), "{}", report.diagnostic);
    assert_eq!(report.exit_code, Some(1));
}

#[tokio::test]
async fn syntax_error_is_a_compile_error() {
    require_python!();
    let ws = Workspace::new();
    ws.write_student("calc.py", "def add(a, b)\n    return a + b\n");
    let path = ws.write_test("calc_test.py", CALC_TEST);

    let summary = run_file(engine(&ws), &path).await;

    assert!(summary.reports.iter().all(|r| r.outcome == OutcomeKind::CompileError));
    assert!(report_of(&summary, "adds").diagnostic.contains("SyntaxError"));
}

#[tokio::test]
async fn raising_entry_point_is_a_runtime_error() {
    require_python!();
    let ws = Workspace::new();
    ws.write_student("calc.py", "def add(a, b):\n    raise ValueError('nope')\n");
    let path = ws.write_test("calc_test.py", CALC_TEST);

    let summary = run_file(engine(&ws), &path).await;

    let report = report_of(&summary, "adds");
    assert_eq!(report.outcome, OutcomeKind::RuntimeError);
    assert!(report.diagnostic.contains("ValueError: nope"), "{}", report.diagnostic);
}

#[tokio::test]
async fn module_without_entry_runs_as_a_script_with_stdin() {
    require_python!();
    let ws = Workspace::new();
    ws.write_student("echo.py", "import sys\nprint(sys.stdin.read().strip().upper())\n");
    let path = ws.write_test(
        "echo_test.py",
        "#@mark MODULE=echo\n#@test shouts EXPECT=HELLO\n#| hello\n",
    );

    let summary = run_file(engine(&ws), &path).await;

    assert_eq!(outcome_of(&summary, "shouts"), OutcomeKind::Pass, "{:?}", summary.reports);
}

#[tokio::test]
async fn missing_module_directive_is_a_config_error() {
    let ws = Workspace::new();
    let path = ws.write_test("calc_test.py", "#@test adds EXPECT=5\n");

    let summary = run_file(engine(&ws), &path).await;

    let report = report_of(&summary, "adds");
    assert_eq!(report.outcome, OutcomeKind::ConfigError);
    assert!(report.diagnostic.contains("MODULE"));
}

#[tokio::test]
async fn return_value_after_unterminated_print_is_found() {
    require_python!();
    let ws = Workspace::new();
    ws.write_student("calc.py", "def add(a, b):\n    print('working', end='')\n    return a + b\n");
    let path = ws.write_test("calc_test.py", CALC_TEST);

    let summary = run_file(engine(&ws), &path).await;

    let report = report_of(&summary, "adds");
    assert_eq!(report.outcome, OutcomeKind::Pass, "{}", report.diagnostic);
    assert!(!report.diagnostic.contains("@@automark-result@@"), "{}", report.diagnostic);
}

#[tokio::test]
async fn script_can_import_a_sibling_module() {
    require_python!();
    let ws = Workspace::new();
    ws.write_student("helpers.py", "def shout(text):\n    return text.upper() + '!'\n");
    ws.write_student("echo.py", "import sys\nfrom helpers import shout\nprint(shout(sys.stdin.read().strip()))\n");
    let path = ws.write_test(
        "echo_test.py",
        "#@mark MODULE=echo\n#@test shouts EXPECT=HELLO!\n#| hello\n",
    );

    let summary = run_file(engine(&ws), &path).await;

    let report = report_of(&summary, "shouts");
    assert_eq!(report.outcome, OutcomeKind::Pass, "{}", report.diagnostic);
}

#[tokio::test]
async fn script_receives_its_arguments_and_exit_status() {
    require_python!();
    let ws = Workspace::new();
    ws.write_student("argv.py", "import sys\nprint(' '.join(sys.argv[1:]))\nsys.exit(len(sys.argv) - 1)\n");
    let path = ws.write_test(
        "argv_test.py",
        "#@mark MODULE=argv\n#@test two ARGS=\"a b\" EXPECT=\"a b\" EXIT_CODE=2\n",
    );

    let summary = run_file(engine(&ws), &path).await;

    let report = report_of(&summary, "two");
    assert_eq!(report.outcome, OutcomeKind::Pass, "{}", report.diagnostic);
    assert_eq!(report.exit_code, Some(2));
}

/// A stand-in `pylint` that rates every module 5.00/10 with the given exit status.
fn fake_pylint(ws: &Workspace, status: u8) -> PathBuf {
    write_script(
        &ws.tools().join("pylint"),
        &format!(
            "#!/bin/sh\necho 'calc.py:1:0: C0114: Missing module docstring (missing-module-docstring)'\necho 'Your code has been rated at 5.00/10'\nexit {status}\n"
        ),
    )
}

fn linted_engine(ws: &Workspace, pylint: &PathBuf) -> Engine {
    Engine::new(ws.store(&[("LINTER", pylint)]), ws.submission())
}

#[tokio::test]
async fn lint_score_below_the_threshold_is_a_lint_error() {
    require_python!();
    let ws = Workspace::new();
    let pylint = fake_pylint(&ws, 16);
    ws.write_student("calc.py", "def add(a, b):\n    return a + b\n");
    let path = ws.write_test(
        "calc_test.py",
        r#"#@mark MODULE=calc ENTRY=add ARGS="2 3" EXPECT=5
#@test strict LINT_THRESHOLD=8
#@test lenient LINT_THRESHOLD=4
"#,
    );

    let summary = run_file(linted_engine(&ws, &pylint), &path).await;

    let strict = report_of(&summary, "strict");
    assert_eq!(strict.outcome, OutcomeKind::LintError);
    assert!(strict.diagnostic.contains("Code Rating of 5.00 lower than 8.00"), "{}", strict.diagnostic);
    assert_eq!(outcome_of(&summary, "lenient"), OutcomeKind::Pass);
}

#[tokio::test]
async fn fatal_lint_message_is_a_lint_error() {
    require_python!();
    let ws = Workspace::new();
    let pylint = fake_pylint(&ws, 1);
    ws.write_student("calc.py", "def add(a, b):\n    return a + b\n");
    let path = ws.write_test(
        "calc_test.py",
        "#@mark MODULE=calc ENTRY=add\n#@test adds ARGS=\"2 3\" EXPECT=5 LINT_THRESHOLD=1\n",
    );

    let summary = run_file(linted_engine(&ws, &pylint), &path).await;

    let report = report_of(&summary, "adds");
    assert_eq!(report.outcome, OutcomeKind::LintError);
    assert!(report.diagnostic.contains("fatal"), "{}", report.diagnostic);
}

#[tokio::test]
async fn linter_usage_error_is_reported_as_a_tool_failure() {
    require_python!();
    let ws = Workspace::new();
    let pylint = fake_pylint(&ws, 32);
    ws.write_student("calc.py", "def add(a, b):\n    return a + b\n");
    let path = ws.write_test(
        "calc_test.py",
        "#@mark MODULE=calc ENTRY=add LINT\n#@test adds ARGS=\"2 3\" EXPECT=5\n",
    );

    let summary = run_file(linted_engine(&ws, &pylint), &path).await;

    assert_eq!(outcome_of(&summary, "adds"), OutcomeKind::CompileError);
}
