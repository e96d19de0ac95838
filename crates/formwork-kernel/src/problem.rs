//! Problem model: field problems, group problems, setup issues, and the
//! four-bucket [`ProblemReport`].
//!
//! Codes and classes are stable snake_case strings so renderers and callers
//! can key messages and styling off them.

use crate::error::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field problem codes.
pub mod problem_code {
    pub const MULTILINE: &str = "multiline";
    pub const TOO_SHORT: &str = "too_short";
    pub const TOO_LONG: &str = "too_long";
    pub const NOT_NUMERIC: &str = "not_numeric";
    pub const BELOW_MINIMUM: &str = "below_minimum";
    pub const ABOVE_MAXIMUM: &str = "above_maximum";
    pub const PATTERN_MISMATCH: &str = "pattern_mismatch";
    pub const PATTERN_DENIED: &str = "pattern_denied";
    pub const INVALID_EMAIL: &str = "invalid_email";
    pub const INVALID_URL: &str = "invalid_url";
    pub const DATE_INCOMPLETE: &str = "date_incomplete";
    pub const DATE_INVALID: &str = "date_invalid";
    pub const TIME_INVALID: &str = "time_invalid";
    pub const NOT_IN_LIST: &str = "not_in_list";
    pub const TOO_FEW_SELECTED: &str = "too_few_selected";
    pub const TOO_MANY_SELECTED: &str = "too_many_selected";
    pub const EXTENSION_MISSING: &str = "extension_missing";
    pub const EXTENSION_NOT_ALLOWED: &str = "extension_not_allowed";
    pub const EXTENSION_DENIED: &str = "extension_denied";
    pub const FILE_TOO_LARGE: &str = "file_too_large";
    pub const MIME_MISMATCH: &str = "mime_mismatch";
    pub const SPAM_PATTERN: &str = "spam_pattern";
    pub const TOO_MANY_LINKS: &str = "too_many_links";
    pub const NOT_UNIQUE: &str = "not_unique";
}

/// Setup issue classes.
pub mod setup_class {
    pub const DUPLICATE_NAME: &str = "duplicate_name";
    pub const INVALID_NAME: &str = "invalid_name";
    pub const RESERVED_NAME: &str = "reserved_name";
    pub const INVALID_PATTERN: &str = "invalid_pattern";
    pub const IMPOSSIBLE_BOUNDS: &str = "impossible_bounds";
    pub const EMPTY_OPTION_LIST: &str = "empty_option_list";
    pub const DUPLICATE_OPTION: &str = "duplicate_option";
    pub const DEFAULT_NOT_AVAILABLE: &str = "default_not_available";
    pub const EXPANDABLE_UNSUPPORTED: &str = "expandable_unsupported";
    pub const MIME_UNRESOLVABLE: &str = "mime_unresolvable";
    pub const UNSUPPORTED_REPRESENTATION: &str = "unsupported_representation";
    pub const UNKNOWN_MATRIX_ENTRY: &str = "unknown_matrix_entry";
    pub const ORDER_TARGET_NOT_FOUND: &str = "order_target_not_found";
    pub const ORDER_CYCLE: &str = "order_cycle";
    pub const GROUP_RULE_INVALID: &str = "group_rule_invalid";
    pub const REQUIRED_NOT_EDITABLE: &str = "required_not_editable";
    pub const REQUIRED_HEADING: &str = "required_heading";
    pub const OPTION_IGNORED: &str = "option_ignored";
}

/// One problem with a submitted value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Problem {
    pub code: String,
    pub message: String,
}

/// Ordered map of problem code → message.
///
/// Inserting a code that is already present replaces its message but keeps
/// its position.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Problems(Vec<Problem>);

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: impl Into<String>, message: impl Into<String>) {
        let code = code.into();
        let message = message.into();
        match self.0.iter_mut().find(|problem| problem.code == code) {
            Some(existing) => existing.message = message,
            None => self.0.push(Problem { code, message }),
        }
    }

    pub fn extend(&mut self, other: &Problems) {
        for problem in other.iter() {
            self.insert(problem.code.clone(), problem.message.clone());
        }
    }

    pub fn contains(&self, code: &str) -> bool {
        self.0.iter().any(|problem| problem.code == code)
    }

    pub fn message(&self, code: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|problem| problem.code == code)
            .map(|problem| problem.message.as_str())
    }

    pub fn codes(&self) -> Vec<&str> {
        self.0.iter().map(|problem| problem.code.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A problem in the form's own declaration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetupIssue {
    pub class: String,
    pub severity: Severity,
    /// Declaration path, e.g. `widgets.email.constraints.allowPattern`.
    pub path: String,
    pub message: String,
}

impl SetupIssue {
    pub fn error(class: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.to_string(),
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn warning(class: &str, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.to_string(),
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Declaration path of a widget.
pub fn widget_path(name: &str) -> String {
    format!("widgets.{name}")
}

/// A failed cross-field rule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupProblem {
    pub rule_index: usize,
    #[serde(rename = "type")]
    pub rule_type: String,
    pub fields: Vec<String>,
    pub message: String,
}

/// All problems for one request, in four disjoint buckets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProblemReport {
    pub setup: Vec<SetupIssue>,
    pub per_field: BTreeMap<String, Problems>,
    pub group: Vec<GroupProblem>,
    pub external: BTreeMap<String, Problems>,
}

impl ProblemReport {
    pub fn setup_errors(&self) -> impl Iterator<Item = &SetupIssue> {
        self.setup.iter().filter(|issue| issue.is_error())
    }

    pub fn setup_warnings(&self) -> impl Iterator<Item = &SetupIssue> {
        self.setup.iter().filter(|issue| !issue.is_error())
    }

    pub fn has_setup_errors(&self) -> bool {
        self.setup_errors().next().is_some()
    }

    /// Whether the submitter has anything to fix.
    pub fn has_submitter_problems(&self) -> bool {
        self.per_field.values().any(|p| !p.is_empty())
            || !self.group.is_empty()
            || self.external.values().any(|p| !p.is_empty())
    }

    /// Problems for one field across the per-field and external buckets.
    pub fn field_problems(&self, name: &str) -> Problems {
        let mut merged = self.per_field.get(name).cloned().unwrap_or_default();
        if let Some(external) = self.external.get(name) {
            merged.extend(external);
        }
        merged
    }
}

/// Deterministic ordering for setup issues: errors first, then by path.
pub fn sort_setup_issues(issues: &mut [SetupIssue]) {
    issues.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| (&a.path, &a.class, &a.message).cmp(&(&b.path, &b.class, &b.message)))
    });
}
