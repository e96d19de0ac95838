//! End-to-end properties of the engine, one test per behaviour a caller
//! relies on.

use chrono::NaiveDate;
use formwork_kernel::{
    CleanedValue, FieldContext, FormDefinition, FormEngine, FormworkConfig, GroupRule,
    GroupRuleKind, MimeTable, OptionItem, OutputChannel, RequestContext, Required,
    SubmissionState, SubmittedShape, WidgetKind, WidgetSpec, validate,
};
use formwork_kernel::registry::ElementRegistry;
use serde_json::{Map, Value, json};

fn ctx() -> RequestContext {
    RequestContext::at(
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap(),
    )
}

fn request(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn engine(widgets: Vec<WidgetSpec>) -> FormEngine {
    FormEngine::new(FormDefinition::new(widgets), FormworkConfig::default())
}

#[test]
fn duplicate_names_disable_the_form() {
    let engine = engine(vec![
        WidgetSpec::new("email", WidgetKind::Email),
        WidgetSpec::new("email", WidgetKind::Text),
    ]);
    assert_eq!(engine.registry().duplicates(), ["email".to_string()]);
    let run = engine.process(
        &request(json!({"__formwork": "1", "email": "a@example.org"})),
        &ctx(),
    );
    assert!(run.dispatch.is_empty());
    assert_ne!(run.state, SubmissionState::Succeeded);
}

#[test]
fn text_presented_value_is_the_trimmed_input() {
    let engine = engine(vec![WidgetSpec::new("note", WidgetKind::Text)]);
    for raw in ["  padded  ", "plain", "\tx y\t"] {
        let run = engine.process(&request(json!({"__formwork": "1", "note": raw})), &ctx());
        assert_eq!(run.state, SubmissionState::Succeeded);
        assert_eq!(
            run.dispatch["note"][&OutputChannel::Screen],
            json!(raw.trim())
        );
    }
}

#[test]
fn validating_a_cleaned_value_changes_nothing() {
    let mut registry = ElementRegistry::new();
    registry.register(
        WidgetSpec::new("to", WidgetKind::Email).constraints(formwork_kernel::Constraints {
            multiple: true,
            ..Default::default()
        }),
    );
    let widget = registry.widget("to").unwrap();
    let config = FormworkConfig::default();
    let mime = MimeTable::builtin();
    let field_ctx = FieldContext {
        config: &config,
        antispam: None,
        mime: &mime,
        current_values: &[],
    };
    let first = validate(
        widget,
        &SubmittedShape::Scalar(" a@x.org;b@y.org , bad ".to_string()),
        &field_ctx,
    );
    let CleanedValue::Text(cleaned) = &first.cleaned else {
        panic!("expected text");
    };
    let second = validate(widget, &SubmittedShape::Scalar(cleaned.clone()), &field_ctx);
    assert_eq!(first.cleaned, second.cleaned);
    assert_eq!(first.problems, second.problems);
}

#[test]
fn required_but_empty_tracks_only_required_and_length() {
    let engine = engine(vec![
        WidgetSpec::new("a", WidgetKind::Text).required(Required::Yes),
        WidgetSpec::new("b", WidgetKind::Text),
        WidgetSpec::new("c", WidgetKind::Text)
            .required(Required::Yes)
            .constraints(formwork_kernel::Constraints {
                min_length: Some(5),
                ..Default::default()
            }),
    ]);
    let run = engine.process(
        &request(json!({"__formwork": "1", "a": "   ", "b": "", "c": "abc"})),
        &ctx(),
    );
    assert!(run.field("a").unwrap().required_but_empty);
    assert!(run.field("a").unwrap().problems.is_empty());
    assert!(!run.field("b").unwrap().required_but_empty);
    assert!(!run.field("c").unwrap().required_but_empty);
    assert!(!run.field("c").unwrap().problems.is_empty());
}

#[test]
fn same_rule_counts_distinct_values() {
    let widgets = || {
        vec![
            WidgetSpec::new("a", WidgetKind::Text),
            WidgetSpec::new("b", WidgetKind::Text),
            WidgetSpec::new("c", WidgetKind::Text),
        ]
    };
    let definition = FormDefinition::new(widgets())
        .with_groups(vec![GroupRule::new(GroupRuleKind::Same, ["a", "b", "c"])]);
    let engine = FormEngine::new(definition, FormworkConfig::default());
    let run = engine.process(
        &request(json!({"__formwork": "1", "a": "x", "b": "x", "c": "x"})),
        &ctx(),
    );
    assert!(run.report.group.is_empty());

    let definition = FormDefinition::new(widgets())
        .with_groups(vec![GroupRule::new(GroupRuleKind::Same, ["a", "b"])]);
    let engine = FormEngine::new(definition, FormworkConfig::default());
    let run = engine.process(
        &request(json!({"__formwork": "1", "a": "x", "b": "y"})),
        &ctx(),
    );
    assert_eq!(run.report.group.len(), 1);
}

#[test]
fn total_rule_needs_exact_sum() {
    let definition = FormDefinition::new(vec![
        WidgetSpec::new("first", WidgetKind::Checkboxes).values(["p", "q", "r"]),
        WidgetSpec::new("second", WidgetKind::Checkboxes).values(["p", "q", "r"]),
    ])
    .with_groups(vec![
        GroupRule::new(GroupRuleKind::Total, ["first", "second"]).with_parameter(2.0),
    ]);
    let engine = FormEngine::new(definition, FormworkConfig::default());
    assert!(engine.setup_issues().is_empty());
    let run = engine.process(
        &request(json!({"__formwork": "1", "first": ["p"], "second": ["p", "q"]})),
        &ctx(),
    );
    assert_eq!(run.report.group.len(), 1);
    assert_eq!(run.state, SubmissionState::SubmittedWithProblems);
}

#[test]
fn checkbox_projection() {
    let engine = engine(vec![WidgetSpec::new("fruit", WidgetKind::Checkboxes).values([
        OptionItem::new("a", "Apple"),
        OptionItem::new("b", "Banana"),
        OptionItem::new("c", "Cherry"),
    ])]);
    let mut pending = engine.begin(
        &request(json!({"__formwork": "1", "fruit": ["a", "c"]})),
        &ctx(),
    );
    let reps = pending.unfinalized()["fruit"].clone();
    assert_eq!(reps.rawcomponents, json!({"a": true, "b": false, "c": true}));
    assert_eq!(reps.compiled, "a,\nc");
    assert_eq!(reps.presented, "Apple, Cherry");

    pending.add_external_problem("other", "noted", "unrelated field");
    let run = pending.finalize();
    assert_eq!(run.state, SubmissionState::SubmittedWithProblems);
}

#[test]
fn state_machine_outcomes() {
    let engine = engine(vec![
        WidgetSpec::new("name", WidgetKind::Text).required(Required::Yes),
    ]);
    let unsubmitted = engine.process(&request(json!({"name": "Ada"})), &ctx());
    assert_eq!(unsubmitted.state, SubmissionState::NotSubmitted);

    let with_problem = engine.process(&request(json!({"__formwork": "1", "name": "a\nb"})), &ctx());
    assert_eq!(with_problem.state, SubmissionState::SubmittedWithProblems);
    assert!(with_problem.dispatch.is_empty());

    let clean = engine.process(&request(json!({"__formwork": "1", "name": "Ada"})), &ctx());
    assert_eq!(clean.state, SubmissionState::Succeeded);
    assert_eq!(clean.dispatch["name"].len(), OutputChannel::ALL.len());
}

#[test]
fn non_editable_timestamp_uses_request_clock() {
    let engine = engine(vec![
        WidgetSpec::new("created", WidgetKind::Datetime)
            .editable(false)
            .default_value(json!("now")),
    ]);
    let run = engine.process(
        &request(json!({"__formwork": "1", "created": "1970-01-01 00:00"})),
        &ctx(),
    );
    assert_eq!(run.state, SubmissionState::Succeeded);
    assert_eq!(
        run.dispatch["created"][&OutputChannel::Database],
        json!("2025-01-15 12:00")
    );
    assert_eq!(
        run.dispatch["created"][&OutputChannel::Processing],
        json!({"day": "15", "month": "01", "year": "2025", "time": "12:00"})
    );
}

#[test]
fn details_rule_fires_on_keyed_yes_option() {
    let definition = FormDefinition::new(vec![
        WidgetSpec::new("allergies", WidgetKind::Radiobuttons)
            .values([("y", "Yes"), ("n", "No")])
            .group_key(formwork_kernel::Representation::Compiled),
        WidgetSpec::new("which", WidgetKind::Text),
    ])
    .with_groups(vec![GroupRule::new(GroupRuleKind::Details, ["allergies", "which"])]);
    let engine = FormEngine::new(definition, FormworkConfig::default());
    let run = engine.process(
        &request(json!({"__formwork": "1", "allergies": "y", "which": ""})),
        &ctx(),
    );
    assert_eq!(run.state, SubmissionState::SubmittedWithProblems);
    assert_eq!(run.report.group.len(), 1);
    assert!(run.field("which").unwrap().required_but_empty);
}
