//! Integration tests: run the submission vectors under tests/fixtures/.
//!
//! Each fixture directory has:
//! - form.json: the form definition
//! - request.json: the submitted request tree
//! - expect.json: expected state, problem codes, flags, and a subset of the
//!   dispatch map

use chrono::NaiveDate;
use formwork_kernel::{FormDefinition, FormEngine, FormworkConfig, RequestContext};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_json(dir: &std::path::Path, file: &str) -> Value {
    let path = dir.join(file);
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", path.display()));
    serde_json::from_str(&text).unwrap_or_else(|e| panic!("failed to parse {}: {e}", path.display()))
}

fn string_set(value: &Value) -> BTreeSet<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn run_fixture(name: &str) {
    let dir = fixtures_dir().join(name);
    let definition = FormDefinition::load(dir.join("form.json"))
        .unwrap_or_else(|e| panic!("fixture {name}: {e}"));
    let request: Map<String, Value> = read_json(&dir, "request.json")
        .as_object()
        .cloned()
        .unwrap_or_else(|| panic!("fixture {name}: request must be an object"));
    let expected = read_json(&dir, "expect.json");

    let engine = FormEngine::new(definition, FormworkConfig::default());
    assert!(
        engine.setup_issues().is_empty(),
        "fixture {name}: unexpected setup issues {:?}",
        engine.setup_issues()
    );
    let ctx = RequestContext::at(
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
    );
    let run = engine.process(&request, &ctx);
    let actual = serde_json::to_value(&run).expect("run serializes");

    assert_eq!(actual["state"], expected["state"], "fixture {name}: state");

    let problems: BTreeMap<String, Vec<String>> = run
        .report
        .per_field
        .iter()
        .map(|(field, problems)| {
            (
                field.clone(),
                problems.codes().into_iter().map(ToOwned::to_owned).collect(),
            )
        })
        .collect();
    let expected_problems: BTreeMap<String, Vec<String>> =
        serde_json::from_value(expected["problems"].clone()).expect("problems map");
    assert_eq!(problems, expected_problems, "fixture {name}: problems");

    let required_but_empty: BTreeSet<String> = run
        .fields
        .iter()
        .filter(|view| view.required_but_empty)
        .map(|view| view.name.clone())
        .collect();
    assert_eq!(
        required_but_empty,
        string_set(&expected["requiredButEmpty"]),
        "fixture {name}: requiredButEmpty"
    );

    let group_types: Vec<&str> = run
        .report
        .group
        .iter()
        .map(|problem| problem.rule_type.as_str())
        .collect();
    let expected_types: Vec<String> =
        serde_json::from_value(expected["groupTypes"].clone()).expect("group types");
    assert_eq!(group_types, expected_types, "fixture {name}: group rules");

    if let Some(fields) = expected["dispatch"].as_object() {
        for (field, channels) in fields {
            for (channel, value) in channels.as_object().into_iter().flatten() {
                assert_eq!(
                    &actual["dispatch"][field][channel], value,
                    "fixture {name}: dispatch {field}.{channel}"
                );
            }
        }
    }
    for field in string_set(&expected["notDispatched"]) {
        assert!(
            actual["dispatch"].get(&field).is_none(),
            "fixture {name}: {field} must not be dispatched"
        );
    }
    if let Some(focus) = expected.get("autofocus") {
        assert_eq!(&actual["autofocus"], focus, "fixture {name}: autofocus");
    }
}

#[test]
fn registration_success() {
    run_fixture("registration_success");
}

#[test]
fn registration_problems() {
    run_fixture("registration_problems");
}

#[test]
fn address_partial() {
    run_fixture("address_partial");
}
