//! Per-field validation.
//!
//! Checks run in a fixed order because several short-circuit on empty or
//! already-invalid input:
//!
//! 1. whitespace normalization
//! 2. multiline guard for single-line kinds
//! 3. length bounds (rich text counted without markup)
//! 4. numeric coercion and numeric bounds
//! 5. allow/deny patterns, or address syntax for e-mail
//! 6. kind-specific structure (URL, date/time, choice domain, uploads)
//! 7. antispam heuristics
//! 8. uniqueness against the caller's current values
//! 9. `requiredButEmpty`, computed last and kept out of `problems`
//!
//! Validation never fails. Problems accumulate so the submitter sees all of
//! them at once.

use crate::binder::{DateParts, SubmittedShape, UploadDescriptor};
use crate::coerce::{
    WhitespacePolicy, char_length, contains_line_break, count_links, file_extension,
    is_valid_email, is_valid_url, normalize_whitespace, parse_number, split_addresses,
    strip_html,
};
use crate::config::FormworkConfig;
use crate::mime::MimeTable;
use crate::problem::{Problems, problem_code};
use crate::projection::represent;
use crate::registry::{RegisteredWidget, ValueProfile};
use crate::value::{CleanedValue, Representations};
use crate::widget::{DateTimeMode, Required, WidgetKind, WidgetSpec};
use chrono::{NaiveDate, NaiveTime, Timelike};
use regex::Regex;
use serde::Serialize;

/// Everything a field check reads besides the widget and its shape.
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub config: &'a FormworkConfig,
    /// Compiled `[antispam] deny_pattern`, if configured and valid.
    pub antispam: Option<&'a Regex>,
    pub mime: &'a MimeTable,
    /// Values this field must differ from, compared case-insensitively.
    pub current_values: &'a [String],
}

/// Result of validating one widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub name: String,
    pub cleaned: CleanedValue,
    pub problems: Problems,
    pub required_but_empty: bool,
    pub representations: Representations,
    /// Antispam delay this field contributes to the request.
    pub penalty_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<usize>,
}

/// Problems and penalty threaded through the checks of one widget.
#[derive(Debug, Default)]
struct Findings {
    problems: Problems,
    penalty_seconds: u64,
}

impl Findings {
    fn add(&mut self, code: &str, message: impl Into<String>) {
        self.problems.insert(code, message);
    }
}

pub fn validate(
    widget: &RegisteredWidget,
    shape: &SubmittedShape,
    ctx: &FieldContext<'_>,
) -> ValidationOutcome {
    let spec = &widget.spec;
    let mut findings = Findings::default();
    let mut repeat_count = None;

    let cleaned = match (widget.profile, shape) {
        (ValueProfile::NoValue, _) => CleanedValue::Empty,
        (ValueProfile::Repeat, SubmittedShape::Repeat { state, values }) => {
            repeat_count = Some(state.count);
            let cleaned: Vec<String> = values
                .iter()
                .map(|value| check_text(widget, value, ctx, &mut findings))
                .filter(|value| !value.is_empty())
                .collect();
            CleanedValue::List(cleaned)
        }
        (ValueProfile::SingleChoice, SubmittedShape::Scalar(value)) => {
            check_single_choice(spec, value, ctx, &mut findings)
        }
        (ValueProfile::MultiChoice, SubmittedShape::List(values)) => {
            check_multi_choice(spec, values, ctx, &mut findings)
        }
        (ValueProfile::DateTime, SubmittedShape::DateTime(parts)) => {
            check_datetime(spec, parts, &mut findings)
        }
        (ValueProfile::Upload, SubmittedShape::Upload(slots)) => {
            check_uploads(spec, slots, ctx, &mut findings)
        }
        (_, SubmittedShape::Scalar(value)) => {
            let cleaned = check_text(widget, value, ctx, &mut findings);
            text_value(cleaned)
        }
        (profile, other) => {
            tracing::debug!(name = %spec.name, ?profile, ?other, "shape does not match profile");
            CleanedValue::Empty
        }
    };

    finish(widget, cleaned, findings, repeat_count, ctx)
}

/// Outcome for the save control: whitespace is normalized, nothing is
/// checked, nothing is flagged.
pub fn accept_as_is(
    widget: &RegisteredWidget,
    shape: &SubmittedShape,
    ctx: &FieldContext<'_>,
) -> ValidationOutcome {
    let policy = whitespace_policy(&widget.spec, ctx);
    let mut repeat_count = None;
    let cleaned = match shape {
        SubmittedShape::Absent => CleanedValue::Empty,
        SubmittedShape::Scalar(value) => text_value(normalize_whitespace(value, policy)),
        SubmittedShape::List(values) => CleanedValue::List(normalized_entries(values, policy)),
        SubmittedShape::Repeat { state, values } => {
            repeat_count = Some(state.count);
            CleanedValue::List(normalized_entries(values, policy))
        }
        SubmittedShape::DateTime(parts) => CleanedValue::DateTime(trimmed_parts(parts)),
        SubmittedShape::Upload(slots) => CleanedValue::Files(slots.clone()),
    };
    let representations = represent(&widget.spec, &cleaned, &ctx.config.output);
    ValidationOutcome {
        name: widget.spec.name.clone(),
        cleaned,
        problems: Problems::new(),
        required_but_empty: false,
        representations,
        penalty_seconds: 0,
        repeat_count,
    }
}

fn finish(
    widget: &RegisteredWidget,
    cleaned: CleanedValue,
    findings: Findings,
    repeat_count: Option<usize>,
    ctx: &FieldContext<'_>,
) -> ValidationOutcome {
    let spec = &widget.spec;
    let required_but_empty = widget.profile != ValueProfile::NoValue
        && spec.required.is_required()
        && cleaned.length() == 0;
    if !findings.problems.is_empty() {
        tracing::trace!(name = %spec.name, codes = ?findings.problems.codes(), "field problems");
    }
    if findings.penalty_seconds > 0 {
        tracing::debug!(
            name = %spec.name,
            penalty_seconds = findings.penalty_seconds,
            "antispam penalty"
        );
    }
    let representations = represent(spec, &cleaned, &ctx.config.output);
    ValidationOutcome {
        name: spec.name.clone(),
        cleaned,
        problems: findings.problems,
        required_but_empty,
        representations,
        penalty_seconds: findings.penalty_seconds,
        repeat_count,
    }
}

fn text_value(text: String) -> CleanedValue {
    if text.is_empty() {
        CleanedValue::Empty
    } else {
        CleanedValue::Text(text)
    }
}

fn whitespace_policy(spec: &WidgetSpec, ctx: &FieldContext<'_>) -> WhitespacePolicy {
    let mut policy = ctx.config.whitespace.policy();
    if let Some(trim) = spec.constraints.trim {
        policy.trim = trim;
    }
    policy
}

fn normalized_entries(values: &[String], policy: WhitespacePolicy) -> Vec<String> {
    values
        .iter()
        .map(|value| normalize_whitespace(value, policy))
        .filter(|value| !value.is_empty())
        .collect()
}

fn trimmed_parts(parts: &DateParts) -> DateParts {
    DateParts {
        day: parts.day.trim().to_string(),
        month: parts.month.trim().to_string(),
        year: parts.year.trim().to_string(),
        time: parts.time.trim().to_string(),
    }
}

/// Steps 1-8 for one text value. Returns the cleaned text.
fn check_text(
    widget: &RegisteredWidget,
    raw: &str,
    ctx: &FieldContext<'_>,
    findings: &mut Findings,
) -> String {
    let spec = &widget.spec;
    let constraints = &spec.constraints;
    let label = spec.display_label();

    let mut value = normalize_whitespace(raw, whitespace_policy(spec, ctx));
    if value.is_empty() {
        return value;
    }

    if spec.kind.is_single_line() && contains_line_break(&value) {
        findings.add(
            problem_code::MULTILINE,
            format!("{label} must be a single line"),
        );
        return value;
    }

    let counted = if spec.kind == WidgetKind::Richtext {
        char_length(&strip_html(&value))
    } else {
        char_length(&value)
    };
    if let Some(min) = constraints.min_length.filter(|min| counted < *min) {
        findings.add(
            problem_code::TOO_SHORT,
            format!("{label} must be at least {min} characters long"),
        );
    }
    if let Some(max) = constraints.max_length.filter(|max| counted > *max) {
        findings.add(
            problem_code::TOO_LONG,
            format!("{label} must be at most {max} characters long"),
        );
    }

    let wants_number = constraints.numeric
        || constraints.min_value.is_some()
        || constraints.max_value.is_some();
    if wants_number && spec.kind != WidgetKind::Email {
        match parse_number(&value) {
            Some((number, parsed)) => {
                if let Some(min) = constraints.min_value.filter(|min| parsed < *min) {
                    findings.add(
                        problem_code::BELOW_MINIMUM,
                        format!("{label} must be at least {}", format_number(min)),
                    );
                }
                if let Some(max) = constraints.max_value.filter(|max| parsed > *max) {
                    findings.add(
                        problem_code::ABOVE_MAXIMUM,
                        format!("{label} must be at most {}", format_number(max)),
                    );
                }
                if constraints.numeric {
                    value = number;
                }
            }
            None => findings.add(problem_code::NOT_NUMERIC, format!("{label} must be a number")),
        }
    }

    if spec.kind == WidgetKind::Email {
        value = check_addresses(spec, value, findings);
    } else {
        check_patterns(widget, &value, findings);
    }

    if spec.kind == WidgetKind::Url && !is_valid_url(&value) {
        findings.add(
            problem_code::INVALID_URL,
            format!("{label} must be a complete web address"),
        );
    }

    check_antispam(spec, &value, ctx, findings);

    if ctx
        .current_values
        .iter()
        .any(|current| current.to_lowercase() == value.to_lowercase())
    {
        findings.add(
            problem_code::NOT_UNIQUE,
            format!("{label} {value:?} is already in use"),
        );
    }

    value
}

fn check_addresses(spec: &WidgetSpec, value: String, findings: &mut Findings) -> String {
    let label = spec.display_label();
    if !spec.constraints.multiple {
        if !is_valid_email(&value) {
            findings.add(
                problem_code::INVALID_EMAIL,
                format!("{label} is not a valid e-mail address"),
            );
        }
        return value;
    }
    let addresses = split_addresses(&value);
    let invalid: Vec<&str> = addresses
        .iter()
        .filter(|address| !is_valid_email(address))
        .map(String::as_str)
        .collect();
    if !invalid.is_empty() {
        findings.add(
            problem_code::INVALID_EMAIL,
            format!("{label} contains invalid addresses: {}", invalid.join(", ")),
        );
    }
    addresses.join(", ")
}

fn check_patterns(widget: &RegisteredWidget, value: &str, findings: &mut Findings) {
    let label = widget.spec.display_label();
    let patterns = &widget.patterns;
    let allowed = [&patterns.allow, &patterns.allow_ci]
        .into_iter()
        .flatten()
        .all(|regex| regex.is_match(value));
    if !allowed {
        findings.add(
            problem_code::PATTERN_MISMATCH,
            format!("{label} is not in the expected format"),
        );
    }
    let denied = [&patterns.deny, &patterns.deny_ci]
        .into_iter()
        .flatten()
        .any(|regex| regex.is_match(value));
    if denied {
        findings.add(
            problem_code::PATTERN_DENIED,
            format!("{label} contains text that is not allowed"),
        );
    }
}

fn check_antispam(spec: &WidgetSpec, value: &str, ctx: &FieldContext<'_>, findings: &mut Findings) {
    let antispam = &ctx.config.antispam;
    let enabled = spec
        .constraints
        .antispam
        .unwrap_or_else(|| antispam.kinds.contains(&spec.kind));
    if !enabled {
        return;
    }
    let label = spec.display_label();
    if ctx.antispam.is_some_and(|regex| regex.is_match(value)) {
        findings.add(
            problem_code::SPAM_PATTERN,
            format!("{label} looks like spam"),
        );
        findings.penalty_seconds += antispam.penalty_seconds;
    }
    if let Some(max) = antispam.max_links {
        let links = count_links(value);
        if links > max {
            findings.add(
                problem_code::TOO_MANY_LINKS,
                format!("{label} contains {links} links; at most {max} are allowed"),
            );
            findings.penalty_seconds += antispam.penalty_seconds;
        }
    }
}

fn check_single_choice(
    spec: &WidgetSpec,
    value: &str,
    ctx: &FieldContext<'_>,
    findings: &mut Findings,
) -> CleanedValue {
    let value = normalize_whitespace(value, whitespace_policy(spec, ctx));
    if value.is_empty() {
        return CleanedValue::Empty;
    }
    if !spec.has_option(&value) {
        findings.add(
            problem_code::NOT_IN_LIST,
            format!("{} must be one of the listed values", spec.display_label()),
        );
        return CleanedValue::Empty;
    }
    CleanedValue::Text(value)
}

fn check_multi_choice(
    spec: &WidgetSpec,
    values: &[String],
    ctx: &FieldContext<'_>,
    findings: &mut Findings,
) -> CleanedValue {
    let label = spec.display_label();
    let submitted = normalized_entries(values, whitespace_policy(spec, ctx));
    // Domain order, each key once.
    let kept: Vec<String> = spec
        .constraints
        .values
        .iter()
        .filter(|option| submitted.contains(&option.key))
        .map(|option| option.key.clone())
        .collect();
    if kept.len() < submitted.len() {
        tracing::trace!(name = %spec.name, "discarded values outside the option list");
    }
    if kept.is_empty() {
        if !submitted.is_empty() {
            findings.add(
                problem_code::NOT_IN_LIST,
                format!("{label}: none of the chosen values are in the list"),
            );
        }
        return CleanedValue::List(kept);
    }

    let count = kept.len();
    let min = match spec.required {
        Required::AtLeast(n) => spec.constraints.min_selected.unwrap_or(0).max(n),
        _ => spec.constraints.min_selected.unwrap_or(0),
    };
    if count < min {
        findings.add(
            problem_code::TOO_FEW_SELECTED,
            format!("{label}: select at least {min}"),
        );
    }
    if let Some(max) = spec.constraints.max_selected.filter(|max| count > *max) {
        findings.add(
            problem_code::TOO_MANY_SELECTED,
            format!("{label}: select at most {max}"),
        );
    }
    CleanedValue::List(kept)
}

fn check_datetime(spec: &WidgetSpec, parts: &DateParts, findings: &mut Findings) -> CleanedValue {
    let label = spec.display_label();
    let mode = spec.constraints.datetime;
    let parts = trimmed_parts(parts);
    let relevant = parts.relevant(mode);
    let filled = relevant.iter().filter(|part| !part.is_empty()).count();
    if filled == 0 {
        return CleanedValue::DateTime(DateParts::default());
    }
    if filled < relevant.len() {
        findings.add(
            problem_code::DATE_INCOMPLETE,
            format!("{label} is not complete"),
        );
        return CleanedValue::DateTime(parts);
    }

    let mut normalized = DateParts::default();
    match mode {
        DateTimeMode::Date | DateTimeMode::DateTime => {
            let date = match (
                parts.year.parse::<i32>(),
                parts.month.parse::<u32>(),
                parts.day.parse::<u32>(),
            ) {
                (Ok(year), Ok(month), Ok(day)) => NaiveDate::from_ymd_opt(year, month, day)
                    .filter(|_| (1..=9999).contains(&year)),
                _ => None,
            };
            match date {
                Some(_) => {
                    normalized.year = format!("{:04}", parts.year.parse::<i32>().unwrap_or(0));
                    normalized.month = format!("{:02}", parts.month.parse::<u32>().unwrap_or(0));
                    normalized.day = format!("{:02}", parts.day.parse::<u32>().unwrap_or(0));
                }
                None => {
                    findings.add(
                        problem_code::DATE_INVALID,
                        format!("{label} is not a valid date"),
                    );
                    return CleanedValue::DateTime(parts);
                }
            }
        }
        DateTimeMode::Year => match parts.year.parse::<i32>() {
            Ok(year) if (1..=9999).contains(&year) => normalized.year = format!("{year:04}"),
            _ => {
                findings.add(
                    problem_code::DATE_INVALID,
                    format!("{label} is not a valid year"),
                );
                return CleanedValue::DateTime(parts);
            }
        },
        DateTimeMode::Time => {}
    }

    if matches!(mode, DateTimeMode::Time | DateTimeMode::DateTime) {
        match parse_time(&parts.time) {
            Some(time) if time.second() == 0 => normalized.time = time.format("%H:%M").to_string(),
            Some(time) => normalized.time = time.format("%H:%M:%S").to_string(),
            None => {
                findings.add(
                    problem_code::TIME_INVALID,
                    format!("{label} is not a valid time of day"),
                );
                return CleanedValue::DateTime(parts);
            }
        }
    }
    CleanedValue::DateTime(normalized)
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .ok()
}

fn check_uploads(
    spec: &WidgetSpec,
    slots: &[Option<UploadDescriptor>],
    ctx: &FieldContext<'_>,
    findings: &mut Findings,
) -> CleanedValue {
    let constraints = &spec.constraints;
    let label = spec.display_label();
    let allowed: Vec<String> = constraints
        .allowed_extensions
        .iter()
        .map(|ext| normalize_extension(ext))
        .collect();
    let denied: Vec<String> = constraints
        .denied_extensions
        .iter()
        .map(|ext| normalize_extension(ext))
        .collect();

    for file in slots.iter().flatten() {
        let extension = file_extension(&file.name);
        match extension.as_deref() {
            None if !allowed.is_empty() => findings.add(
                problem_code::EXTENSION_MISSING,
                format!("{label}: {:?} has no file extension", file.name),
            ),
            Some(ext)
                if !allowed.is_empty()
                    && !allowed.iter().any(|entry| entry == "*" || entry == ext) =>
            {
                findings.add(
                    problem_code::EXTENSION_NOT_ALLOWED,
                    format!("{label}: files of type .{ext} are not allowed"),
                );
            }
            _ => {}
        }
        if let Some(ext) = extension.as_deref().filter(|ext| denied.iter().any(|d| d == ext)) {
            findings.add(
                problem_code::EXTENSION_DENIED,
                format!("{label}: files of type .{ext} are refused"),
            );
        }
        if let Some(max) = constraints.max_size.filter(|max| file.size > *max) {
            findings.add(
                problem_code::FILE_TOO_LARGE,
                format!("{label}: {:?} is larger than {max} bytes", file.name),
            );
        }
        let expected = extension
            .as_deref()
            .filter(|_| constraints.check_mime)
            .and_then(|ext| ctx.mime.lookup(ext));
        if let Some(expected) = expected {
            let declared = file
                .mime_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            if !declared.is_empty() && declared != expected.to_ascii_lowercase() {
                findings.add(
                    problem_code::MIME_MISMATCH,
                    format!(
                        "{label}: {:?} is declared as {declared} but its extension implies {expected}",
                        file.name
                    ),
                );
            }
        }
    }
    CleanedValue::Files(slots.to_vec())
}

pub(crate) fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}
