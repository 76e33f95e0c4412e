//! Tests of the reference host binary.

mod common;

use assert_cmd::prelude::*;
use common::{Workspace, fake_cc};
use predicates::prelude::*;
use std::process::Command;

const ADDER_TEST: &str = r#"#include "student.h"
//@test test_add EXPECT=5
//@test test_twice EXPECT=10 ARGS=twice
//sh: case "$1" in test_add) add 2 3 ;; twice) add 5 5 ;; esac
"#;

fn automark(ws: &Workspace) -> Command {
    let mut cmd = Command::cargo_bin("automark").unwrap();
    cmd.current_dir(ws.dir.path())
        .env("AUTOMARK_LOG", "off")
        .env("NO_COLOR", "1")
        .arg("--lang")
        .arg("en");
    cmd
}

#[test]
fn collect_lists_sub_tests() {
    let ws = Workspace::new();
    let path = ws.write_test("adder_test.c", ADDER_TEST);

    automark(&ws)
        .arg("collect")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("test_add"))
        .stdout(predicate::str::contains("test_twice"))
        .stdout(predicate::str::contains("2 sub-tests in 1 files"));
}

#[test]
fn collect_reports_zero_sub_tests() {
    let ws = Workspace::new();
    let path = ws.write_test("empty_test.c", "int main(void) { return 0; }\n");

    automark(&ws)
        .arg("collect")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 sub-tests in 1 files"));
}

#[test]
fn collect_rejects_unknown_extensions() {
    let ws = Workspace::new();
    let path = ws.write_test("notes.txt", "//@test t\n");

    automark(&ws)
        .arg("collect")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported test specification file"));
}

#[test]
fn passing_run_writes_reports() {
    let ws = Workspace::new();
    let cc = fake_cc(&ws);
    ws.write_student("adder.c", "//sh: add() { echo $(($1 + $2)); }\n");
    let path = ws.write_test("adder_test.c", ADDER_TEST);
    let html = ws.dir.path().join("report.html");
    let json = ws.dir.path().join("report.json");

    automark(&ws)
        .arg("run")
        .arg("--submission")
        .arg(ws.submission_root())
        .arg("--student")
        .arg("alice")
        .arg("--set")
        .arg(format!("COMPILER={}", cc.display()))
        .arg("--html")
        .arg(&html)
        .arg("--json")
        .arg(&json)
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Grading alice"))
        .stdout(predicate::str::contains("2 of 2 sub-tests passed"))
        .stdout(predicate::str::contains("All sub-tests passed."));

    let page = std::fs::read_to_string(&html).unwrap();
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("test_twice"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(report["student"], "alice");
    assert_eq!(report["totals"]["Pass"], 2);
    assert_eq!(report["reports"].as_array().map(Vec::len), Some(2));
}

#[test]
fn failing_run_exits_non_zero_with_details() {
    let ws = Workspace::new();
    let cc = fake_cc(&ws);
    ws.write_student("adder.c", "//sh: add() { echo 4; }\n");
    let path = ws.write_test("adder_test.c", ADDER_TEST);

    automark(&ws)
        .arg("run")
        .arg("--submission")
        .arg(ws.submission_root())
        .arg("--set")
        .arg(format!("COMPILER={}", cc.display()))
        .arg("-j")
        .arg("1")
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("--- Failure Details ---"))
        .stdout(predicate::str::contains("expected:\n5"))
        .stderr(predicate::str::contains("2 of 2 sub-tests did not pass."));
}

#[test]
fn uncollectable_file_is_skipped_and_the_rest_still_run() {
    let ws = Workspace::new();
    let cc = fake_cc(&ws);
    ws.write_student("adder.c", "//sh: add() { echo $(($1 + $2)); }\n");
    let path = ws.write_test("adder_test.c", ADDER_TEST);
    let notes = ws.write_test("notes.txt", "not a test\n");

    automark(&ws)
        .arg("run")
        .arg("--submission")
        .arg(ws.submission_root())
        .arg("--set")
        .arg(format!("COMPILER={}", cc.display()))
        .arg(&notes)
        .arg(&path)
        .assert()
        .failure()
        .stdout(predicate::str::contains("2 of 2 sub-tests passed"))
        .stdout(predicate::str::contains("All sub-tests passed.").not())
        .stderr(predicate::str::contains("Skipping file:"))
        .stderr(predicate::str::contains("unsupported test specification file"))
        .stderr(predicate::str::contains("1 file(s) could not be collected."));
}

#[test]
fn config_file_supplies_the_cohort_layer() {
    let ws = Workspace::new();
    let cc = fake_cc(&ws);
    ws.write_student("adder.c", "//sh: add() { echo $(($1 + $2)); }\n");
    let path = ws.write_test("adder_test.c", ADDER_TEST);
    let config = ws.dir.path().join("cohort.toml");
    std::fs::write(
        &config,
        format!("name = \"cs101\"\n\n[cohort]\nCOMPILER = \"{}\"\n", cc.display()),
    )
    .unwrap();

    automark(&ws)
        .arg("run")
        .arg("--submission")
        .arg(ws.submission_root())
        .arg("--config")
        .arg(&config)
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn missing_submission_is_an_error() {
    let ws = Workspace::new();
    let path = ws.write_test("adder_test.c", ADDER_TEST);

    automark(&ws)
        .arg("run")
        .arg("--submission")
        .arg(ws.dir.path().join("nobody"))
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Submission directory not found"));
}

#[test]
fn chinese_locale_is_available() {
    let ws = Workspace::new();
    let path = ws.write_test("adder_test.c", ADDER_TEST);

    Command::cargo_bin("automark")
        .unwrap()
        .env("AUTOMARK_LOG", "off")
        .env("NO_COLOR", "1")
        .arg("--lang")
        .arg("zh-CN")
        .arg("collect")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 个文件中共 2 个子测试"));
}
