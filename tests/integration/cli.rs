//! Tests for the `fixcap` binary

use assert_cmd::Command;
use predicates::prelude::*;

use super::common::project::{read_document, TestProject};
use super::common::units::calculator;
use fixcap::value::Value;

fn fixcap(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("fixcap").unwrap();
    cmd.current_dir(&project.root)
        .env_remove("FIXCAP_MODE")
        .env_remove("FIXCAP_SRCDIR")
        .env_remove("FIXCAP_DESTDIR")
        .env("RUST_LOG", "off");
    cmd
}

/// Record a couple of calls and return the fixture path, left open
fn record_unterminated(project: &TestProject) -> std::path::PathBuf {
    let src = project.write_source("calculator.rs");
    let mut unit = calculator();
    let intercepted = project.instrumenter().instrument_unit(&src, &mut unit);
    let calc = unit.construct(vec![Value::data(1)]).unwrap();
    unit.call(&calc, "add", vec![Value::data(2)]).unwrap();
    let path = intercepted.recorder.current_path().unwrap();
    std::mem::forget(intercepted);
    std::mem::forget(unit);
    path
}

#[test]
fn test_init_writes_config_once() {
    let project = TestProject::new();

    fixcap(&project)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote"));
    assert!(project.root.join("fixcap.toml").is_file());

    fixcap(&project)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_units_lists_sources_and_destinations() {
    let project = TestProject::new();
    project.write_source("math/calculator.rs");
    project.write_source("notes.txt");

    fixcap(&project)
        .arg("units")
        .assert()
        .success()
        .stdout(predicate::str::contains("math/calculator"))
        .stdout(predicate::str::contains("calculator.<date>.json"))
        .stdout(predicate::str::contains("notes").not());
}

#[test]
fn test_units_honors_config_file() {
    let project = TestProject::new();
    project.write_config("[capture]\nsrcdir = \"lib\"\nextensions = [\"ron\"]\n");
    std::fs::create_dir_all(project.root.join("lib")).unwrap();
    std::fs::write(project.root.join("lib/table.ron"), "()").unwrap();
    project.write_source("ignored.rs");

    fixcap(&project)
        .arg("units")
        .assert()
        .success()
        .stdout(predicate::str::contains("table"))
        .stdout(predicate::str::contains("ignored").not());
}

#[test]
fn test_check_reports_status_and_fails_on_corruption() {
    let project = TestProject::new();
    record_unterminated(&project);

    fixcap(&project)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("unterminated"))
        .stdout(predicate::str::contains("2 records"));

    std::fs::write(project.destdir().join("broken.json"), "{\"type\":").unwrap();
    fixcap(&project)
        .arg("check")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("corrupt"));
}

#[test]
fn test_repair_closes_unterminated_files() {
    let project = TestProject::new();
    let path = record_unterminated(&project);

    fixcap(&project)
        .arg("repair")
        .assert()
        .success()
        .stdout(predicate::str::contains("repaired"));
    assert_eq!(read_document(&path).tests.len(), 2);

    fixcap(&project)
        .arg("repair")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[test]
fn test_show_prints_calls() {
    let project = TestProject::new();
    let path = record_unterminated(&project);

    fixcap(&project)
        .arg("show")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("calculator.rs#Calculator (2 records)"))
        .stdout(predicate::str::contains("new(1) => {\"total\":1}"))
        .stdout(predicate::str::contains("add(2) => 3"));

    fixcap(&project)
        .args(["show", "--json"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"type\": \"unit\""));
}

#[test]
fn test_show_rejects_garbage() {
    let project = TestProject::new();
    let path = project.root.join("garbage.json");
    std::fs::write(&path, "not json").unwrap();

    fixcap(&project)
        .arg("show")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a fixture document"));
}
