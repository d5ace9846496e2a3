//! Daily rotation and recovery of fixture streams

use super::common::project::{read_document, TestProject};
use super::common::units::calculator;
use fixcap::fixture::{inspect_file, repair_file, FixtureStatus};
use fixcap::value::Value;

/// A day boundary closes yesterday's document and opens today's
#[test]
fn test_rollover_splits_documents_by_day() {
    let project = TestProject::new();
    let src = project.write_source("calculator.rs");
    let mut unit = calculator();
    let intercepted = project.instrumenter().instrument_unit(&src, &mut unit);

    let calc = unit.construct(vec![]).unwrap();
    unit.call(&calc, "add", vec![Value::data(1)]).unwrap();

    project.clock.set(project.day(10));
    unit.call(&calc, "add", vec![Value::data(2)]).unwrap();

    project.clock.advance_days(2);
    unit.call(&calc, "add", vec![Value::data(3)]).unwrap();
    intercepted.recorder.close().unwrap();

    let files = project.fixtures();
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec![
            "calculator.2024-03-09.json",
            "calculator.2024-03-10.json",
            "calculator.2024-03-12.json",
        ]
    );

    let counts: Vec<usize> = files.iter().map(|p| read_document(p).tests.len()).collect();
    assert_eq!(counts, vec![2, 1, 1]);
    for path in &files {
        assert!(matches!(
            inspect_file(path).unwrap(),
            FixtureStatus::Complete(_)
        ));
    }
}

/// A second recorder on the same day never appends to a closed document
#[test]
fn test_restart_on_same_day_uses_a_fresh_file() {
    let project = TestProject::new();
    let src = project.write_source("calculator.rs");

    for _ in 0..2 {
        let mut unit = calculator();
        let intercepted = project.instrumenter().instrument_unit(&src, &mut unit);
        unit.construct(vec![]).unwrap();
        intercepted.recorder.close().unwrap();
    }

    let files = project.fixtures();
    assert_eq!(files.len(), 2);
    assert!(files[0].ends_with("calculator.2024-03-09.1.json"));
    assert!(files[1].ends_with("calculator.2024-03-09.json"));
    for path in &files {
        assert_eq!(read_document(path).tests.len(), 1);
    }
}

/// A stream abandoned without its footer can be repaired afterwards
#[test]
fn test_abandoned_stream_is_repairable() {
    let project = TestProject::new();
    let src = project.write_source("calculator.rs");
    let mut unit = calculator();
    let intercepted = project.instrumenter().instrument_unit(&src, &mut unit);

    let calc = unit.construct(vec![]).unwrap();
    unit.call(&calc, "add", vec![Value::data(4)]).unwrap();
    let path = intercepted.recorder.current_path().unwrap();

    // Simulate a crash: the footer never gets written.
    std::mem::forget(intercepted);
    std::mem::forget(unit);

    assert!(matches!(
        inspect_file(&path).unwrap(),
        FixtureStatus::Unterminated(_)
    ));
    assert!(repair_file(&path).unwrap());
    assert_eq!(read_document(&path).tests.len(), 2);
}
