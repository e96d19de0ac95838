//! Output projection: the representations each cleaned value exposes and
//! which one every output channel receives.
//!
//! The defaults matrix is keyed by widget kind (with an alternate row for
//! selects in multiple mode) and channel. It is built once per engine from
//! the builtin table plus configured overrides, then shared read-only.

use crate::binder::DateParts;
use crate::config::{OutputConfig, SELECT_MULTIPLE_ROW};
use crate::problem::{SetupIssue, setup_class, widget_path};
use crate::registry::ElementRegistry;
use crate::value::{CleanedValue, Representations};
use crate::widget::{DateTimeMode, OutputChannel, Representation, WidgetKind, WidgetSpec};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const BASIC: &[Representation] = &[
    Representation::Rawcomponents,
    Representation::Compiled,
    Representation::Presented,
];

const SET_LIKE: &[Representation] = &[
    Representation::Rawcomponents,
    Representation::Compiled,
    Representation::Presented,
    Representation::SpecialSetForm,
];

/// Representations a widget can expose.
pub fn supported_representations(spec: &WidgetSpec) -> &'static [Representation] {
    if !spec.kind.carries_value() {
        &[]
    } else if spec.is_multi_value() {
        SET_LIKE
    } else {
        BASIC
    }
}

fn row_supports(row: &str, representation: Representation) -> bool {
    match row {
        SELECT_MULTIPLE_ROW => true,
        _ if row == WidgetKind::Checkboxes.as_str() => true,
        _ => BASIC.contains(&representation),
    }
}

/// Matrix row a widget reads its channel defaults from.
pub fn row_key(spec: &WidgetSpec) -> &'static str {
    if spec.kind == WidgetKind::Select && spec.constraints.multiple {
        SELECT_MULTIPLE_ROW
    } else {
        spec.kind.as_str()
    }
}

fn row(entries: [Representation; 6]) -> BTreeMap<OutputChannel, Representation> {
    OutputChannel::ALL.into_iter().zip(entries).collect()
}

/// `(row, channel) → representation` defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultsMatrix {
    rows: BTreeMap<String, BTreeMap<OutputChannel, Representation>>,
}

impl DefaultsMatrix {
    pub fn builtin() -> Self {
        use Representation::{Compiled as C, Presented as P, Rawcomponents as R, SpecialSetForm as S};

        // Column order follows OutputChannel::ALL:
        // file, email, confirmationEmail, screen, processing, database.
        let text_like = row([C, P, P, P, C, C]);
        let mut rows = BTreeMap::new();
        for kind in [
            WidgetKind::Text,
            WidgetKind::Password,
            WidgetKind::Email,
            WidgetKind::Url,
            WidgetKind::Textarea,
            WidgetKind::Richtext,
            WidgetKind::Select,
            WidgetKind::Radiobuttons,
        ] {
            rows.insert(kind.as_str().to_string(), text_like.clone());
        }
        rows.insert(
            WidgetKind::Checkboxes.as_str().to_string(),
            row([C, P, P, P, R, S]),
        );
        rows.insert(SELECT_MULTIPLE_ROW.to_string(), row([P, P, P, P, R, S]));
        rows.insert(
            WidgetKind::Datetime.as_str().to_string(),
            row([C, P, P, P, R, C]),
        );
        rows.insert(
            WidgetKind::Upload.as_str().to_string(),
            row([C, P, P, P, R, C]),
        );
        rows.insert(
            WidgetKind::Hidden.as_str().to_string(),
            row([C, C, C, C, C, C]),
        );
        Self { rows }
    }

    /// Layer configured overrides on top. Unknown rows or channels and
    /// representations a row cannot supply are reported and skipped.
    pub fn apply_overrides(
        &mut self,
        overrides: &BTreeMap<String, BTreeMap<String, String>>,
    ) -> Vec<SetupIssue> {
        let mut issues = Vec::new();
        for (row_name, channels) in overrides {
            let Some(row) = self.rows.get_mut(row_name) else {
                issues.push(SetupIssue::error(
                    setup_class::UNKNOWN_MATRIX_ENTRY,
                    format!("matrix.{row_name}"),
                    format!("no defaults row named {row_name:?}"),
                ));
                continue;
            };
            for (channel_name, representation_name) in channels {
                let path = format!("matrix.{row_name}.{channel_name}");
                let channel = match channel_name.parse::<OutputChannel>() {
                    Ok(channel) => channel,
                    Err(message) => {
                        issues.push(SetupIssue::error(
                            setup_class::UNKNOWN_MATRIX_ENTRY,
                            path,
                            message,
                        ));
                        continue;
                    }
                };
                let representation = match representation_name.parse::<Representation>() {
                    Ok(representation) if row_supports(row_name, representation) => representation,
                    Ok(representation) => {
                        issues.push(SetupIssue::error(
                            setup_class::UNSUPPORTED_REPRESENTATION,
                            path,
                            format!("row {row_name:?} cannot supply {representation}"),
                        ));
                        continue;
                    }
                    Err(message) => {
                        issues.push(SetupIssue::error(
                            setup_class::UNSUPPORTED_REPRESENTATION,
                            path,
                            message,
                        ));
                        continue;
                    }
                };
                row.insert(channel, representation);
            }
        }
        issues
    }

    pub fn rows(&self) -> &BTreeMap<String, BTreeMap<OutputChannel, Representation>> {
        &self.rows
    }

    pub fn default_for(&self, spec: &WidgetSpec, channel: OutputChannel) -> Option<Representation> {
        self.rows.get(row_key(spec))?.get(&channel).copied()
    }

    /// Channel → representation for one widget, with its overrides applied.
    pub fn resolve_channels(&self, spec: &WidgetSpec) -> BTreeMap<OutputChannel, Representation> {
        let mut resolved = self.rows.get(row_key(spec)).cloned().unwrap_or_default();
        for (channel, representation) in &spec.output_override {
            resolved.insert(*channel, *representation);
        }
        resolved
    }

    pub fn representation_for(
        &self,
        spec: &WidgetSpec,
        channel: OutputChannel,
    ) -> Option<Representation> {
        spec.output_override
            .get(&channel)
            .copied()
            .or_else(|| self.default_for(spec, channel))
    }
}

impl Default for DefaultsMatrix {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Setup check: every `outputOverride` and `groupValidationKey` must name a
/// representation the widget can supply.
pub fn check_overrides(registry: &ElementRegistry) -> Vec<SetupIssue> {
    let mut issues = Vec::new();
    for spec in registry.all() {
        let supported = supported_representations(spec);
        let path = widget_path(&spec.name);
        for (channel, representation) in &spec.output_override {
            if !supported.contains(representation) {
                issues.push(SetupIssue::error(
                    setup_class::UNSUPPORTED_REPRESENTATION,
                    format!("{path}.outputOverride.{channel}"),
                    format!(
                        "{} widget {:?} cannot supply {representation} to {channel}",
                        spec.kind, spec.name
                    ),
                ));
            }
        }
        if let Some(key) = spec
            .group_validation_key
            .filter(|key| !supported.contains(key))
        {
            issues.push(SetupIssue::error(
                setup_class::UNSUPPORTED_REPRESENTATION,
                format!("{path}.groupValidationKey"),
                format!(
                    "{} widget {:?} cannot supply {key} for group rules",
                    spec.kind, spec.name
                ),
            ));
        }
    }
    issues
}

/// Encode a cleaned value in every representation the widget supports.
pub fn represent(spec: &WidgetSpec, cleaned: &CleanedValue, output: &OutputConfig) -> Representations {
    let separator = spec
        .constraints
        .separator
        .as_deref()
        .unwrap_or(&output.separator);
    let mut reps = match cleaned {
        CleanedValue::Empty => Representations::empty(),
        CleanedValue::Text(text) => Representations {
            rawcomponents: Value::String(text.clone()),
            compiled: text.clone(),
            presented: match spec.kind {
                WidgetKind::Select | WidgetKind::Radiobuttons => spec.option_label(text).to_string(),
                WidgetKind::Password if !text.is_empty() => output.password_mask.clone(),
                _ => text.clone(),
            },
            special_set_form: None,
        },
        CleanedValue::List(items) => {
            let labels: Vec<&str> = items.iter().map(|key| spec.option_label(key)).collect();
            Representations {
                rawcomponents: Value::Array(items.iter().cloned().map(Value::String).collect()),
                compiled: items.join(separator),
                presented: labels.join(&output.presented_separator),
                special_set_form: None,
            }
        }
        CleanedValue::DateTime(parts) => {
            let mode = spec.constraints.datetime;
            let compiled = compile_date(parts, mode);
            Representations {
                rawcomponents: serde_json::to_value(parts).unwrap_or(Value::Null),
                presented: present_date(parts, mode).unwrap_or_else(|| compiled.clone()),
                compiled,
                special_set_form: None,
            }
        }
        CleanedValue::Files(slots) => {
            let names: Vec<&str> = slots.iter().flatten().map(|file| file.name.as_str()).collect();
            Representations {
                rawcomponents: serde_json::to_value(slots).unwrap_or(Value::Null),
                compiled: names.join(separator),
                presented: names.join(&output.presented_separator),
                special_set_form: None,
            }
        }
    };

    if spec.is_multi_value() {
        let selected: Vec<&str> = match cleaned {
            CleanedValue::List(items) => items.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        if spec.kind == WidgetKind::Checkboxes {
            let mut flags = Map::new();
            for option in &spec.constraints.values {
                flags.insert(
                    option.key.clone(),
                    Value::Bool(selected.contains(&option.key.as_str())),
                );
            }
            reps.rawcomponents = Value::Object(flags);
        } else if matches!(cleaned, CleanedValue::Empty) {
            reps.rawcomponents = Value::Array(Vec::new());
        }
        reps.special_set_form = Some(selected.join(","));
    }
    reps
}

fn compile_date(parts: &DateParts, mode: DateTimeMode) -> String {
    if parts.relevant(mode).iter().any(|part| part.is_empty()) {
        return String::new();
    }
    let date = || format!("{}-{}-{}", parts.year, parts.month, parts.day);
    match mode {
        DateTimeMode::Date => date(),
        DateTimeMode::Time => parts.time.clone(),
        DateTimeMode::DateTime => format!("{} {}", date(), parts.time),
        DateTimeMode::Year => parts.year.clone(),
    }
}

fn present_date(parts: &DateParts, mode: DateTimeMode) -> Option<String> {
    let date = || {
        NaiveDate::from_ymd_opt(
            parts.year.parse().ok()?,
            parts.month.parse().ok()?,
            parts.day.parse().ok()?,
        )
    };
    let time = || {
        NaiveTime::parse_from_str(&parts.time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&parts.time, "%H:%M"))
            .ok()
    };
    match mode {
        DateTimeMode::Date => Some(date()?.format("%-d %B %Y").to_string()),
        DateTimeMode::DateTime => Some(format!(
            "{}, {}",
            date()?.format("%-d %B %Y"),
            time()?.format("%H:%M")
        )),
        DateTimeMode::Time => Some(time()?.format("%H:%M").to_string()),
        DateTimeMode::Year => None,
    }
}
