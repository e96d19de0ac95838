//! Cross-field group rules.
//!
//! Rule shape is checked at setup time, independently of any submission.
//! Evaluation runs after every field has been validated and compares each
//! field through its `groupValidationKey` representation (default
//! `presented`).

use crate::problem::{GroupProblem, SetupIssue, setup_class};
use crate::registry::ElementRegistry;
use crate::validator::ValidationOutcome;
use crate::widget::Representation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Literal a `details` trigger must present to require its detail field.
pub const DETAILS_TRIGGER: &str = "Yes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRuleKind {
    Same,
    Different,
    Either,
    All,
    Master,
    Total,
    Details,
}

impl GroupRuleKind {
    pub const ALL: [GroupRuleKind; 7] = [
        Self::Same,
        Self::Different,
        Self::Either,
        Self::All,
        Self::Master,
        Self::Total,
        Self::Details,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Same => "same",
            Self::Different => "different",
            Self::Either => "either",
            Self::All => "all",
            Self::Master => "master",
            Self::Total => "total",
            Self::Details => "details",
        }
    }
}

impl std::fmt::Display for GroupRuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GroupRuleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| format!("unknown group rule type: {s}"))
    }
}

/// A cross-field rule as declared. The type stays a string so that an
/// unknown type surfaces as a setup issue instead of a parse failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRule {
    #[serde(rename = "type")]
    pub rule_type: String,
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter: Option<f64>,
}

impl GroupRule {
    pub fn new<I, S>(kind: GroupRuleKind, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rule_type: kind.as_str().to_string(),
            fields: fields.into_iter().map(Into::into).collect(),
            parameter: None,
        }
    }

    pub fn with_parameter(mut self, parameter: f64) -> Self {
        self.parameter = Some(parameter);
        self
    }

    pub fn kind(&self) -> Result<GroupRuleKind, String> {
        self.rule_type.parse()
    }
}

fn rule_path(index: usize) -> String {
    format!("groups[{index}]")
}

/// Setup check over rule shapes.
pub fn check_rule_shapes(rules: &[GroupRule], registry: &ElementRegistry) -> Vec<SetupIssue> {
    let mut issues = Vec::new();
    for (index, rule) in rules.iter().enumerate() {
        let path = rule_path(index);
        let kind = match rule.kind() {
            Ok(kind) => kind,
            Err(message) => {
                issues.push(SetupIssue::error(
                    setup_class::GROUP_RULE_INVALID,
                    format!("{path}.type"),
                    message,
                ));
                continue;
            }
        };
        if rule.fields.len() < 2 {
            issues.push(SetupIssue::error(
                setup_class::GROUP_RULE_INVALID,
                format!("{path}.fields"),
                format!("{kind} rule needs at least two fields"),
            ));
        }
        for field in &rule.fields {
            match registry.get(field) {
                None => issues.push(SetupIssue::error(
                    setup_class::GROUP_RULE_INVALID,
                    format!("{path}.fields"),
                    format!("{kind} rule references unknown widget {field:?}"),
                )),
                Some(spec) if kind == GroupRuleKind::Total && !spec.is_counting() => {
                    issues.push(SetupIssue::error(
                        setup_class::GROUP_RULE_INVALID,
                        format!("{path}.fields"),
                        format!("total rule references {field:?}, which has no selected count"),
                    ));
                }
                Some(_) => {}
            }
        }
        if kind == GroupRuleKind::Total && rule.parameter.is_none() {
            issues.push(SetupIssue::error(
                setup_class::GROUP_RULE_INVALID,
                format!("{path}.parameter"),
                "total rule needs a numeric parameter",
            ));
        }
        if kind == GroupRuleKind::Details && rule.fields.len() > 2 {
            issues.push(SetupIssue::warning(
                setup_class::GROUP_RULE_INVALID,
                format!("{path}.fields"),
                "details rule only uses its first two fields",
            ));
        }
    }
    issues
}

/// Problems from evaluating every rule, plus fields to flag as required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupEvaluation {
    pub problems: Vec<GroupProblem>,
    pub flagged_required: BTreeSet<String>,
}

struct Operand<'a> {
    name: &'a str,
    label: &'a str,
    value: String,
    /// Human text; the `details` trigger reads this regardless of key.
    presented: String,
    empty: bool,
    count: usize,
}

/// Evaluate rules against validated outcomes. Rules that fail their shape
/// check are skipped; those are reported at setup.
pub fn evaluate(
    rules: &[GroupRule],
    registry: &ElementRegistry,
    outcomes: &BTreeMap<String, ValidationOutcome>,
) -> GroupEvaluation {
    let mut evaluation = GroupEvaluation::default();
    for (index, rule) in rules.iter().enumerate() {
        let Ok(kind) = rule.kind() else {
            continue;
        };
        let operands: Option<Vec<Operand<'_>>> = rule
            .fields
            .iter()
            .map(|field| {
                let spec = registry.get(field)?;
                let outcome = outcomes.get(field)?;
                let key = spec.group_validation_key.unwrap_or(Representation::Presented);
                Some(Operand {
                    name: &spec.name,
                    label: spec.display_label(),
                    value: outcome.representations.text(key),
                    presented: outcome.representations.text(Representation::Presented),
                    empty: outcome.cleaned.is_empty(),
                    count: outcome.cleaned.length(),
                })
            })
            .collect();
        let Some(operands) = operands.filter(|operands| operands.len() >= 2) else {
            continue;
        };

        if let Some((message, flagged)) = check_rule(kind, rule.parameter, &operands) {
            tracing::trace!(rule = index, %kind, "group rule failed");
            evaluation.flagged_required.extend(flagged);
            evaluation.problems.push(GroupProblem {
                rule_index: index,
                rule_type: kind.as_str().to_string(),
                fields: rule.fields.clone(),
                message,
            });
        }
    }
    evaluation
}

fn labels(operands: &[Operand<'_>]) -> String {
    operands
        .iter()
        .map(|operand| operand.label)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `Some((message, fields to flag))` when the rule fails.
fn check_rule(
    kind: GroupRuleKind,
    parameter: Option<f64>,
    operands: &[Operand<'_>],
) -> Option<(String, Vec<String>)> {
    let filled: Vec<&Operand<'_>> = operands.iter().filter(|operand| !operand.empty).collect();
    match kind {
        GroupRuleKind::Same => {
            let distinct: BTreeSet<&str> = filled.iter().map(|operand| operand.value.as_str()).collect();
            (distinct.len() >= 2)
                .then(|| (format!("{} must all be the same", labels(operands)), Vec::new()))
        }
        GroupRuleKind::Different => {
            let mut seen = BTreeSet::new();
            let clash = filled
                .iter()
                .any(|operand| !seen.insert(operand.value.as_str()));
            clash.then(|| (format!("{} must all be different", labels(operands)), Vec::new()))
        }
        GroupRuleKind::Either => filled.is_empty().then(|| {
            (
                format!("at least one of {} must be filled in", labels(operands)),
                Vec::new(),
            )
        }),
        GroupRuleKind::All => (!filled.is_empty() && filled.len() < operands.len()).then(|| {
            let missing = operands
                .iter()
                .filter(|operand| operand.empty)
                .map(|operand| operand.name.to_string())
                .collect();
            (
                format!("{} must be filled in together", labels(operands)),
                missing,
            )
        }),
        GroupRuleKind::Master => {
            let (dependent, triggers) = operands.split_first()?;
            (dependent.empty && triggers.iter().any(|operand| !operand.empty)).then(|| {
                (
                    format!(
                        "{} is needed when {} is filled in",
                        dependent.label,
                        labels(triggers)
                    ),
                    Vec::new(),
                )
            })
        }
        GroupRuleKind::Total => {
            let expected = parameter?;
            let total: usize = operands.iter().map(|operand| operand.count).sum();
            ((total as f64 - expected).abs() > f64::EPSILON).then(|| {
                (
                    format!(
                        "{} must have {} selections in total, not {total}",
                        labels(operands),
                        crate::validator::format_number(expected)
                    ),
                    Vec::new(),
                )
            })
        }
        GroupRuleKind::Details => {
            let trigger = &operands[0];
            let detail = &operands[1];
            (trigger.presented == DETAILS_TRIGGER && detail.empty).then(|| {
                (
                    format!("please give details in {}", detail.label),
                    vec![detail.name.to_string()],
                )
            })
        }
    }
}
