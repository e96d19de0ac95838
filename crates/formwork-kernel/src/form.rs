//! Form engine and the per-request submission state machine.
//!
//! An engine is built once from a [`FormDefinition`] and a
//! [`FormworkConfig`]; every declaration check runs then, so setup issues
//! are known before any request arrives. Each request goes through
//! [`FormEngine::begin`] (bind and per-field validation) and
//! [`PendingSubmission::finalize`] (external problems, group rules, state
//! decision, projection). [`FormEngine::process`] does both.
//!
//! ```text
//! NotSubmitted ──► SubmittedWithProblems
//!              ├─► Refreshed
//!              ├─► Saved
//!              └─► Succeeded   (only state that dispatches)
//! ```

use crate::binder::{SubmittedShape, bind, bind_default, control_pressed};
use crate::coerce::scalar_string;
use crate::config::FormworkConfig;
use crate::error::FormworkError;
use crate::group::{GroupRule, check_rule_shapes, evaluate};
use crate::mime::MimeTable;
use crate::problem::{
    ProblemReport, Problems, SetupIssue, setup_class, sort_setup_issues,
};
use crate::projection::{DefaultsMatrix, check_overrides};
use crate::registry::ElementRegistry;
use crate::setup::{check_widgets, ensure_defaults_available};
use crate::validator::{FieldContext, ValidationOutcome, accept_as_is, validate};
use crate::value::Representations;
use crate::view::{FieldView, autofocus_target};
use crate::widget::{OutputChannel, WidgetSpec};
use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Fingerprint prefix; bump when the fingerprint input changes.
pub const FINGERPRINT_PREFIX: &str = "fw1_";

/// A complete form declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDefinition {
    pub widgets: Vec<WidgetSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupRule>,
}

impl FormDefinition {
    pub fn new(widgets: Vec<WidgetSpec>) -> Self {
        Self {
            widgets,
            groups: Vec::new(),
        }
    }

    pub fn with_groups(mut self, groups: Vec<GroupRule>) -> Self {
        self.groups = groups;
        self
    }

    /// `fw1_` + hex SHA-256 over the ordered `(name, kind)` list.
    pub fn fingerprint(&self) -> String {
        let identity: Vec<(&str, &str)> = self
            .widgets
            .iter()
            .map(|spec| (spec.name.as_str(), spec.kind.as_str()))
            .collect();
        let bytes = serde_json::to_vec(&identity).unwrap_or_default();
        let digest = Sha256::digest(&bytes);
        let mut rendered = String::with_capacity(FINGERPRINT_PREFIX.len() + digest.len() * 2);
        rendered.push_str(FINGERPRINT_PREFIX);
        for byte in digest {
            rendered.push_str(format!("{byte:02x}").as_str());
        }
        rendered
    }

    pub fn from_json_str(text: &str) -> Result<Self, FormworkError> {
        Self::parse_json(text, "<inline>")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FormworkError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| FormworkError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        Self::parse_json(&text, &path.display().to_string())
    }

    fn parse_json(text: &str, path: &str) -> Result<Self, FormworkError> {
        serde_json::from_str(text).map_err(|error| FormworkError::InvalidJson {
            path: path.to_string(),
            message: error.to_string(),
        })
    }
}

/// Terminal state of one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    NotSubmitted,
    SubmittedWithProblems,
    Refreshed,
    Saved,
    Succeeded,
}

impl SubmissionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotSubmitted => "not_submitted",
            Self::SubmittedWithProblems => "submitted_with_problems",
            Self::Refreshed => "refreshed",
            Self::Saved => "saved",
            Self::Succeeded => "succeeded",
        }
    }
}

impl std::fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-request inputs besides the request tree.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// Clock for `"now"` defaults.
    pub now: NaiveDateTime,
    /// Per-widget values a submission must differ from.
    pub current_values: BTreeMap<String, Vec<String>>,
}

impl RequestContext {
    pub fn at(now: NaiveDateTime) -> Self {
        Self {
            now,
            current_values: BTreeMap::new(),
        }
    }

    /// Context on the local wall clock.
    pub fn local() -> Self {
        Self::at(chrono::Local::now().naive_local())
    }

    pub fn with_current_values<I, S>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.current_values
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }
}

/// Everything one request produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormRun {
    pub state: SubmissionState,
    pub form_id: String,
    pub fields: Vec<FieldView>,
    pub report: ProblemReport,
    /// widget → channel → value. Empty unless the state is `Succeeded`.
    pub dispatch: BTreeMap<String, BTreeMap<OutputChannel, Value>>,
    /// Delay the caller should apply before responding.
    pub antispam_delay_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autofocus: Option<String>,
}

impl FormRun {
    pub fn dispatches(&self) -> bool {
        self.state == SubmissionState::Succeeded
    }

    pub fn field(&self, name: &str) -> Option<&FieldView> {
        self.fields.iter().find(|view| view.name == name)
    }
}

#[derive(Debug)]
pub struct FormEngine {
    registry: ElementRegistry,
    groups: Vec<GroupRule>,
    config: FormworkConfig,
    matrix: DefaultsMatrix,
    mime: MimeTable,
    antispam: Option<Regex>,
    setup: Vec<SetupIssue>,
    fingerprint: String,
}

impl FormEngine {
    /// Build an engine and run every declaration check.
    pub fn new(definition: FormDefinition, config: FormworkConfig) -> Self {
        let fingerprint = definition.fingerprint();
        let FormDefinition { widgets, groups } = definition;

        let mut registry = ElementRegistry::new();
        for spec in widgets {
            registry.register(spec);
        }
        let mut setup = registry.take_issues();
        setup.extend(registry.apply_ordering());
        setup.extend(ensure_defaults_available(
            &mut registry,
            config.defaults.tolerate_invalid,
        ));

        let mime = MimeTable::with_extra(&config.mime.extra);
        setup.extend(check_widgets(&registry, &config, &mime));

        let mut matrix = DefaultsMatrix::builtin();
        setup.extend(matrix.apply_overrides(&config.matrix));
        setup.extend(check_overrides(&registry));
        setup.extend(check_rule_shapes(&groups, &registry));

        let antispam = match config.antispam.deny_pattern.as_deref().map(Regex::new) {
            Some(Ok(regex)) => Some(regex),
            Some(Err(err)) => {
                setup.push(SetupIssue::error(
                    setup_class::INVALID_PATTERN,
                    "antispam.deny_pattern",
                    format!("antispam pattern does not compile: {err}"),
                ));
                None
            }
            None => None,
        };

        sort_setup_issues(&mut setup);
        for issue in &setup {
            tracing::warn!(
                class = %issue.class,
                severity = %issue.severity,
                path = %issue.path,
                "{}",
                issue.message
            );
        }

        Self {
            registry,
            groups,
            config,
            matrix,
            mime,
            antispam,
            setup,
            fingerprint,
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn config(&self) -> &FormworkConfig {
        &self.config
    }

    pub fn matrix(&self) -> &DefaultsMatrix {
        &self.matrix
    }

    pub fn setup_issues(&self) -> &[SetupIssue] {
        &self.setup
    }

    /// Setup errors (duplicates included) block every dispatch.
    pub fn is_disabled(&self) -> bool {
        self.registry.is_disabled() || self.setup.iter().any(SetupIssue::is_error)
    }

    /// Whether the request carries this form's id.
    pub fn is_submitted(&self, request: &Map<String, Value>) -> bool {
        let controls = &self.config.controls;
        request
            .get(&controls.form_id_key)
            .and_then(scalar_string)
            .is_some_and(|id| {
                let id = id.trim();
                id == self.fingerprint || (controls.accept_any_form_id && id == "1")
            })
    }

    /// Bind and validate every field; group rules wait for
    /// [`PendingSubmission::finalize`].
    pub fn begin(&self, request: &Map<String, Value>, ctx: &RequestContext) -> PendingSubmission<'_> {
        let submitted = self.is_submitted(request);
        let controls = &self.config.controls;
        let save = submitted && control_pressed(request, &controls.save_key);
        let mut refresh = submitted && control_pressed(request, &controls.refresh_key);

        let mut outcomes = Vec::with_capacity(self.registry.len());
        for widget in self.registry.widgets() {
            let shape = if submitted {
                bind(widget, request, ctx.now)
            } else {
                bind_default(widget, ctx.now)
            };
            if let SubmittedShape::Repeat { state, .. } = &shape {
                refresh |= state.changed();
            }
            let field_ctx = FieldContext {
                config: &self.config,
                antispam: self.antispam.as_ref(),
                mime: &self.mime,
                current_values: ctx
                    .current_values
                    .get(widget.name())
                    .map(Vec::as_slice)
                    .unwrap_or(&[]),
            };
            let outcome = if submitted && !save {
                validate(widget, &shape, &field_ctx)
            } else {
                accept_as_is(widget, &shape, &field_ctx)
            };
            outcomes.push(outcome);
        }

        PendingSubmission {
            engine: self,
            submitted,
            save,
            refresh,
            outcomes,
            external: BTreeMap::new(),
        }
    }

    pub fn process(&self, request: &Map<String, Value>, ctx: &RequestContext) -> FormRun {
        self.begin(request, ctx).finalize()
    }
}

/// A request between per-field validation and finalization.
#[derive(Debug)]
pub struct PendingSubmission<'a> {
    engine: &'a FormEngine,
    submitted: bool,
    save: bool,
    refresh: bool,
    outcomes: Vec<ValidationOutcome>,
    external: BTreeMap<String, Problems>,
}

impl PendingSubmission<'_> {
    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn outcomes(&self) -> &[ValidationOutcome] {
        &self.outcomes
    }

    /// Cleaned values before group rules, for checks only the caller can run.
    pub fn unfinalized(&self) -> BTreeMap<String, Representations> {
        self.outcomes
            .iter()
            .map(|outcome| (outcome.name.clone(), outcome.representations.clone()))
            .collect()
    }

    pub fn add_external_problem(
        &mut self,
        field: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.external
            .entry(field.into())
            .or_default()
            .insert(code, message);
    }

    pub fn finalize(self) -> FormRun {
        let engine = self.engine;
        let validating = self.submitted && !self.save;

        let mut report = ProblemReport {
            setup: engine.setup.clone(),
            external: self.external,
            ..ProblemReport::default()
        };
        for outcome in &self.outcomes {
            if !outcome.problems.is_empty() {
                report
                    .per_field
                    .insert(outcome.name.clone(), outcome.problems.clone());
            }
        }

        let mut flagged = BTreeSet::new();
        if validating {
            let by_name: BTreeMap<String, ValidationOutcome> = self
                .outcomes
                .iter()
                .map(|outcome| (outcome.name.clone(), outcome.clone()))
                .collect();
            let evaluation = evaluate(&engine.groups, &engine.registry, &by_name);
            report.group = evaluation.problems;
            flagged = evaluation.flagged_required;
        }

        let specs = engine.registry.all();
        let mut fields: Vec<FieldView> = specs
            .iter()
            .zip(&self.outcomes)
            .map(|(spec, outcome)| {
                let required_but_empty =
                    outcome.required_but_empty || flagged.contains(&outcome.name);
                FieldView::build(
                    spec,
                    outcome,
                    report.field_problems(&outcome.name),
                    required_but_empty,
                )
            })
            .collect();

        let needs_attention =
            report.has_submitter_problems() || fields.iter().any(|view| view.required_but_empty);
        let state = if !self.submitted {
            SubmissionState::NotSubmitted
        } else if self.save && !engine.is_disabled() {
            SubmissionState::Saved
        } else if self.refresh && !self.save {
            SubmissionState::Refreshed
        } else if engine.is_disabled() || needs_attention || self.save {
            SubmissionState::SubmittedWithProblems
        } else {
            SubmissionState::Succeeded
        };

        let mut dispatch = BTreeMap::new();
        if state == SubmissionState::Succeeded {
            for (spec, outcome) in specs.iter().zip(&self.outcomes) {
                if spec.discard || !spec.kind.carries_value() {
                    continue;
                }
                let channels: BTreeMap<OutputChannel, Value> = engine
                    .matrix
                    .resolve_channels(spec)
                    .into_iter()
                    .filter_map(|(channel, representation)| {
                        outcome
                            .representations
                            .get(representation)
                            .map(|value| (channel, value))
                    })
                    .collect();
                dispatch.insert(spec.name.clone(), channels);
            }
        }

        let antispam_delay_secs = if validating {
            self.outcomes.iter().map(|outcome| outcome.penalty_seconds).sum()
        } else {
            0
        };

        let autofocus = autofocus_target(
            &specs,
            &fields,
            state == SubmissionState::SubmittedWithProblems,
        );
        if let Some(target) = &autofocus {
            for view in fields.iter_mut().filter(|view| &view.name == target) {
                view.autofocus = true;
            }
        }

        tracing::debug!(
            %state,
            fields = fields.len(),
            dispatched = dispatch.len(),
            antispam_delay_secs,
            "submission resolved"
        );

        FormRun {
            state,
            form_id: engine.fingerprint.clone(),
            fields,
            report,
            dispatch,
            antispam_delay_secs,
            autofocus,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::GroupRuleKind;
    use crate::problem::problem_code;
    use crate::widget::{Required, WidgetKind};
    use chrono::NaiveDate;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext::at(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        )
    }

    fn request(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn contact_form() -> FormDefinition {
        FormDefinition::new(vec![
            WidgetSpec::new("name", WidgetKind::Text).required(Required::Yes),
            WidgetSpec::new("email", WidgetKind::Email).required(Required::Yes),
            WidgetSpec::new("honeypot", WidgetKind::Hidden).discard(true),
        ])
    }

    #[test]
    fn unsubmitted_request_shows_defaults() {
        let engine = FormEngine::new(contact_form(), FormworkConfig::default());
        let run = engine.process(&Map::new(), &ctx());
        assert_eq!(run.state, SubmissionState::NotSubmitted);
        assert!(run.dispatch.is_empty());
        assert!(!run.field("name").unwrap().required_but_empty);
        assert_eq!(run.autofocus.as_deref(), Some("name"));
    }

    #[test]
    fn succeeded_dispatches_non_discarded_fields() {
        let engine = FormEngine::new(contact_form(), FormworkConfig::default());
        let run = engine.process(
            &request(json!({
                "__formwork": "1",
                "name": " Ada ",
                "email": "ada@example.org",
                "honeypot": ""
            })),
            &ctx(),
        );
        assert_eq!(run.state, SubmissionState::Succeeded);
        assert_eq!(run.dispatch.len(), 2);
        assert_eq!(run.dispatch["name"][&OutputChannel::Screen], json!("Ada"));
        assert!(!run.dispatch.contains_key("honeypot"));
    }

    #[test]
    fn fingerprint_form_id_is_accepted_when_strict() {
        let mut config = FormworkConfig::default();
        config.controls.accept_any_form_id = false;
        let engine = FormEngine::new(contact_form(), config);
        assert!(!engine.is_submitted(&request(json!({"__formwork": "1"}))));
        let id = engine.fingerprint().to_string();
        assert!(id.starts_with(FINGERPRINT_PREFIX));
        assert!(engine.is_submitted(&request(json!({"__formwork": id}))));
    }

    #[test]
    fn field_problem_blocks_dispatch() {
        let engine = FormEngine::new(contact_form(), FormworkConfig::default());
        let run = engine.process(
            &request(json!({"__formwork": "1", "name": "Ada", "email": "nope"})),
            &ctx(),
        );
        assert_eq!(run.state, SubmissionState::SubmittedWithProblems);
        assert!(run.dispatch.is_empty());
        assert_eq!(run.autofocus.as_deref(), Some("email"));
        assert!(run.field("email").unwrap().autofocus);
        assert!(
            run.report.per_field["email"].contains(problem_code::INVALID_EMAIL)
        );
    }

    #[test]
    fn save_bypasses_validation() {
        let engine = FormEngine::new(contact_form(), FormworkConfig::default());
        let run = engine.process(
            &request(json!({"__formwork": "1", "__save": "1", "email": "nope"})),
            &ctx(),
        );
        assert_eq!(run.state, SubmissionState::Saved);
        assert!(run.report.per_field.is_empty());
        assert_eq!(run.field("email").unwrap().value, json!("nope"));
    }

    #[test]
    fn refresh_and_expand_controls_refresh() {
        let mut phone = WidgetSpec::new("phone", WidgetKind::Text);
        phone.constraints.expandable = Some(crate::widget::Expandable { available: 3 });
        let engine = FormEngine::new(
            FormDefinition::new(vec![phone, WidgetSpec::new("name", WidgetKind::Text).required(Required::Yes)]),
            FormworkConfig::default(),
        );
        let run = engine.process(
            &request(json!({"__formwork": "1", "phone__count": "1", "phone__add": "+"})),
            &ctx(),
        );
        assert_eq!(run.state, SubmissionState::Refreshed);
        assert_eq!(run.field("phone").unwrap().repeat_count, Some(2));

        let run = engine.process(&request(json!({"__formwork": "1", "__refresh": "1"})), &ctx());
        assert_eq!(run.state, SubmissionState::Refreshed);
        assert!(run.dispatch.is_empty());
    }

    #[test]
    fn external_problems_are_merged() {
        let engine = FormEngine::new(contact_form(), FormworkConfig::default());
        let req = request(json!({"__formwork": "1", "name": "Ada", "email": "ada@example.org"}));
        let mut pending = engine.begin(&req, &ctx());
        assert_eq!(pending.unfinalized()["email"].compiled, "ada@example.org");
        pending.add_external_problem("email", "taken", "this address is already registered");
        let run = pending.finalize();
        assert_eq!(run.state, SubmissionState::SubmittedWithProblems);
        assert!(run.field("email").unwrap().problems.contains("taken"));
        assert!(run.report.per_field.is_empty());
    }

    #[test]
    fn group_flags_show_up_in_views() {
        let definition = FormDefinition::new(vec![
            WidgetSpec::new("street", WidgetKind::Text),
            WidgetSpec::new("city", WidgetKind::Text),
        ])
        .with_groups(vec![GroupRule::new(GroupRuleKind::All, ["street", "city"])]);
        let engine = FormEngine::new(definition, FormworkConfig::default());
        let run = engine.process(
            &request(json!({"__formwork": "1", "street": "Main St"})),
            &ctx(),
        );
        assert_eq!(run.state, SubmissionState::SubmittedWithProblems);
        assert!(run.field("city").unwrap().required_but_empty);
        assert_eq!(run.report.group.len(), 1);
    }

    #[test]
    fn setup_errors_disable_the_form() {
        let definition = FormDefinition::new(vec![
            WidgetSpec::new("a", WidgetKind::Text),
            WidgetSpec::new("a", WidgetKind::Text),
        ]);
        let engine = FormEngine::new(definition, FormworkConfig::default());
        assert!(engine.is_disabled());
        let run = engine.process(&request(json!({"__formwork": "1", "a": "x"})), &ctx());
        assert_eq!(run.state, SubmissionState::SubmittedWithProblems);
        assert!(run.dispatch.is_empty());
        assert!(run.report.has_setup_errors());
    }

    #[test]
    fn antispam_delay_is_summed_across_fields() {
        let mut config = FormworkConfig::default();
        config.antispam.deny_pattern = Some("(?i)casino".to_string());
        let engine = FormEngine::new(
            FormDefinition::new(vec![
                WidgetSpec::new("a", WidgetKind::Text),
                WidgetSpec::new("b", WidgetKind::Textarea),
            ]),
            config,
        );
        let run = engine.process(
            &request(json!({"__formwork": "1", "a": "casino", "b": "CASINO"})),
            &ctx(),
        );
        assert_eq!(run.antispam_delay_secs, 6);
    }

    #[test]
    fn bad_antispam_pattern_is_a_setup_error() {
        let mut config = FormworkConfig::default();
        config.antispam.deny_pattern = Some("(".to_string());
        let engine = FormEngine::new(contact_form(), config);
        assert_eq!(engine.setup_issues()[0].path, "antispam.deny_pattern");
    }
}
