//! End-to-end capture: discover sources, instrument the units they export,
//! drive calls through every style and read back the fixture files.

use std::sync::Arc;

use super::common::project::{read_document, TestProject};
use super::common::units::{calculator, directory, remote};
use fixcap::capture::Callback;
use fixcap::fixture::FixtureOutput;
use fixcap::value::{Object, Opaque, Value};
use fixcap::{discover_sources, instrument_all, CallError, Export, ModuleRegistry};
use parking_lot::Mutex;
use serde_json::json;

/// Sources map onto mirrored fixture paths named after the source file
#[test]
fn test_discovered_units_record_to_mirrored_paths() {
    let project = TestProject::new();
    let calc_src = project.write_source("math/calculator.rs");
    let consts_src = project.write_source("consts.rs");
    project.write_source("README.md");

    let mut registry = ModuleRegistry::new()
        .with(&calc_src, calculator())
        .with(&consts_src, Export::Value(Value::data(42)));

    let sources = discover_sources(&project.srcdir(), &["rs".to_string()]).unwrap();
    assert_eq!(sources, vec![consts_src.clone(), calc_src.clone()]);

    let units = instrument_all(&sources, &mut registry, &project.instrumenter());
    assert_eq!(units.len(), 1, "only unit exports are instrumented");
    let loaded = &units[&calc_src];
    let intercepted = loaded.intercepted.as_ref().unwrap();
    let calc = &loaded.unit;
    assert_eq!(intercepted.label, "math/calculator");
    assert_eq!(intercepted.source, calc_src);

    let instance = calc.construct(vec![Value::data(10)]).unwrap();
    assert_eq!(
        calc.call(&instance, "add", vec![Value::data(2), Value::data(3)]).unwrap(),
        Value::data(15)
    );
    let err = calc.call(&instance, "div", vec![Value::data(0)]).unwrap_err();
    assert_eq!(err.name, "RangeError");
    assert_eq!(calc.call_static("version", vec![]).unwrap(), Value::data("2.1.0"));

    let path = intercepted.recorder.close().unwrap().unwrap();
    assert_eq!(
        path,
        project.destdir().join("math/calculator.2024-03-09.json")
    );

    let doc = read_document(&path);
    assert_eq!(doc.kind, "unit");
    assert_eq!(doc.require, "math/calculator.rs#Calculator");
    assert_eq!(doc.tests.len(), 4);

    let ctor = &doc.tests[0];
    assert!(ctor.request.construct);
    assert_eq!(ctor.request.payload, vec![json!(10)]);
    assert_eq!(ctor.require, json!({"name": "Calculator"}));
    assert_eq!(ctor.output, FixtureOutput::Output(json!({"total": 10})));

    let add = &doc.tests[1];
    assert_eq!(add.request.method, "add");
    assert_eq!(add.require, json!({"total": 10}), "receiver captured before the call");
    assert_eq!(add.output, FixtureOutput::Output(json!(15)));

    let div = &doc.tests[2];
    assert_eq!(div.require, json!({"total": 15}));
    assert_eq!(
        div.output,
        FixtureOutput::Error(json!({"name": "RangeError", "message": "division by zero"}))
    );

    assert_eq!(doc.tests[3].request.method, "version");
    assert_eq!(doc.tests[3].output, FixtureOutput::Output(json!("2.1.0")));
}

/// Callback results are recorded and still reach the caller unchanged
#[test]
fn test_callback_members_record_each_settlement() {
    let project = TestProject::new();
    let src = project.write_source("directory.rs");
    let mut unit = directory();
    let intercepted = project.instrumenter().instrument_unit(&src, &mut unit);

    let seen: Arc<Mutex<Vec<Result<Vec<Value>, CallError>>>> = Arc::new(Mutex::new(Vec::new()));
    let collect = |seen: &Arc<Mutex<Vec<Result<Vec<Value>, CallError>>>>| -> Callback {
        let sink = Arc::clone(seen);
        Box::new(move |result| sink.lock().push(result))
    };

    let lookup = unit.static_member("lookup").unwrap();
    lookup
        .call_with_callback(unit.statics(), vec![Value::data("root")], collect(&seen))
        .unwrap();
    lookup
        .call_with_callback(unit.statics(), vec![Value::data("tmp")], collect(&seen))
        .unwrap();
    let sync_err = lookup
        .call_with_callback(unit.statics(), vec![], collect(&seen))
        .unwrap_err();
    assert_eq!(sync_err.name, "TypeError");

    assert_eq!(seen.lock().len(), 2, "synchronous failure never calls back");
    assert_eq!(
        seen.lock()[0],
        Ok(vec![Value::data(0), Value::data("/")])
    );

    let doc = read_document(&intercepted.recorder.close().unwrap().unwrap());
    let outputs: Vec<&FixtureOutput> = doc.tests.iter().map(|t| &t.output).collect();
    assert_eq!(
        outputs,
        vec![
            &FixtureOutput::Output(json!([0, "/"])),
            &FixtureOutput::Error(json!({"name": "NotFound", "message": "no entry tmp"})),
            &FixtureOutput::Error(json!({"name": "TypeError", "message": "lookup needs a key"})),
        ]
    );
}

/// Deferred members record on settlement; dropped ones record nothing
#[tokio::test]
async fn test_deferred_members_record_when_settled() {
    let project = TestProject::new();
    let src = project.write_source("net/remote.rs");
    let mut unit = remote();
    let intercepted = project.instrumenter().instrument_unit(&src, &mut unit);
    let fetch = unit.static_member("fetch").unwrap().clone();

    let ok = fetch.call_deferred(unit.statics(), vec![Value::data(7)]).unwrap();
    let bad = fetch.call_deferred(unit.statics(), vec![Value::data(-1)]).unwrap();
    let dropped = fetch.call_deferred(unit.statics(), vec![Value::data(9)]).unwrap();
    drop(dropped);

    assert!(
        intercepted.recorder.current_path().is_none(),
        "nothing is written before settlement"
    );

    let (ok, bad) = futures::join!(ok, bad);
    assert_eq!(ok.unwrap(), Value::data(json!({"id": 7, "ok": true})));
    assert_eq!(bad.unwrap_err().message, "bad id");

    let doc = read_document(&intercepted.recorder.close().unwrap().unwrap());
    assert_eq!(doc.require, "net/remote.rs#Remote");
    assert_eq!(doc.tests.len(), 2);
    let payloads: Vec<_> = doc.tests.iter().map(|t| t.request.payload.clone()).collect();
    assert!(payloads.contains(&vec![json!(7)]));
    assert!(payloads.contains(&vec![json!(-1)]));
    assert!(!payloads.contains(&vec![json!(9)]));
}

/// Calling a member in the wrong style is a TypeError
#[test]
fn test_style_mismatch_is_a_type_error() {
    let project = TestProject::new();
    let src = project.write_source("remote.rs");
    let mut unit = remote();
    project.instrumenter().instrument_unit(&src, &mut unit);

    let err = unit.call_static("fetch", vec![Value::data(1)]).unwrap_err();
    assert_eq!(err.name, "TypeError");
}

/// Values that cannot be copied are recorded as null; the call still runs
#[test]
fn test_uncopyable_inputs_do_not_break_calls() {
    let project = TestProject::new();
    let src = project.write_source("sink.rs");
    let mut unit = fixcap::Unit::new("Sink")
        .with_constructor(|_| Ok(Object::new()))
        .with_method(
            "attach",
            fixcap::Callable::sync(|this, args| {
                let handle = args.into_iter().next().unwrap_or_default();
                this.set("handle", handle);
                Ok(Value::data(true))
            }),
        );
    let intercepted = project.instrumenter().instrument_unit(&src, &mut unit);

    let sink = unit.construct(vec![]).unwrap();
    let socket = Value::Opaque(Opaque::new(std::net::Ipv4Addr::LOCALHOST));
    assert_eq!(
        unit.call(&sink, "attach", vec![socket]).unwrap(),
        Value::data(true)
    );
    // Receiver now holds an opaque field: its snapshot fails as a whole.
    assert_eq!(
        unit.call(&sink, "attach", vec![Value::data(1)]).unwrap(),
        Value::data(true)
    );

    let doc = read_document(&intercepted.recorder.close().unwrap().unwrap());
    assert_eq!(doc.tests[1].request.payload, vec![json!(null)]);
    assert_eq!(doc.tests[1].require, json!({}));
    assert_eq!(doc.tests[2].require, json!(null));
    assert_eq!(doc.tests[2].request.payload, vec![json!(1)]);
}

/// Redaction scrubs secrets from recorded snapshots
#[test]
fn test_redaction_applies_to_recorded_values() {
    let project = TestProject::new();
    let src = project.write_source("auth.rs");
    let mut unit = fixcap::Unit::new("Auth").with_static(
        "login",
        fixcap::Callable::sync(|_, args| Ok(args.into_iter().next().unwrap_or_default())),
    );
    let instrumenter = project
        .instrumenter()
        .with_scrub(Some(fixcap::fixture::ScrubConfig::default_shareable()));
    let intercepted = instrumenter.instrument_unit(&src, &mut unit);

    let token = "sk-abcdefghijklmnop";
    assert_eq!(
        unit.call_static("login", vec![Value::data(token)]).unwrap(),
        Value::data(token),
        "the caller sees the real value"
    );

    let doc = read_document(&intercepted.recorder.close().unwrap().unwrap());
    assert_eq!(doc.tests[0].request.payload, vec![json!("[REDACTED]")]);
    assert_eq!(doc.tests[0].output, FixtureOutput::Output(json!("[REDACTED]")));
}

/// Recording on several threads yields one well-formed document
#[test]
fn test_concurrent_calls_share_one_stream() {
    let project = TestProject::new();
    let src = project.write_source("calculator.rs");
    let mut unit = calculator();
    let intercepted = project.instrumenter().instrument_unit(&src, &mut unit);
    let unit = Arc::new(unit);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let unit = Arc::clone(&unit);
            std::thread::spawn(move || {
                let calc = unit.construct(vec![Value::data(i)]).unwrap();
                for n in 0..5 {
                    unit.call(&calc, "add", vec![Value::data(n)]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let doc = read_document(&intercepted.recorder.close().unwrap().unwrap());
    assert_eq!(doc.tests.len(), 8 * 6);
    assert_eq!(doc.tests.iter().filter(|t| t.request.construct).count(), 8);
}
