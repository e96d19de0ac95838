//! Column metadata → widget declarations.
//!
//! Inference runs per column, in three layers: the column type picks a kind
//! and its constraints, name heuristics may upgrade a plain text widget, and
//! an explicit per-column kind override replaces both.

use crate::column::{ColumnMeta, ColumnType, TemporalType};
use crate::error::SchemaError;
use formwork_kernel::{
    Constraints, DateTimeMode, FormDefinition, OptionItem, Required, WidgetKind, WidgetSpec,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Column defaults that mean "the request clock".
const CLOCK_DEFAULTS: [&str; 3] = ["current_timestamp", "current_timestamp()", "now()"];

/// Default value that makes a date/time widget bind the request clock.
pub const NOW: &str = "now";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InferOptions {
    /// Map integer columns declared exactly one digit wide to a single
    /// checkbox.
    pub boolean_checkboxes: bool,
    /// Upgrade text widgets by column name (e-mail, password, URL).
    pub intelligence: bool,
    /// When non-empty, exactly these columns are required.
    pub required: Vec<String>,
    /// When non-empty, these columns are optional even if `NOT NULL`.
    pub not_required: Vec<String>,
    pub kind_overrides: BTreeMap<String, WidgetKind>,
}

impl InferOptions {
    fn is_required(&self, column: &ColumnMeta) -> bool {
        if !self.required.is_empty() {
            return self.required.contains(&column.name);
        }
        !column.nullable && !self.not_required.contains(&column.name)
    }
}

/// Infer one widget per column, skipping auto-increment columns.
pub fn infer(columns: &[ColumnMeta], options: &InferOptions) -> Result<Vec<WidgetSpec>, SchemaError> {
    if !options.required.is_empty() && !options.not_required.is_empty() {
        return Err(SchemaError::ConflictingRequiredLists);
    }
    for listed in options.required.iter().chain(&options.not_required) {
        if !columns.iter().any(|column| &column.name == listed) {
            tracing::warn!(column = %listed, "required list names an unknown column");
        }
    }

    let mut widgets = Vec::with_capacity(columns.len());
    for column in columns {
        if column.is_auto_increment() {
            tracing::debug!(column = %column.name, "skipping auto_increment column");
            continue;
        }
        widgets.push(infer_column(column, options)?);
    }
    Ok(widgets)
}

/// [`infer`], wrapped as a form definition without group rules.
pub fn infer_definition(
    columns: &[ColumnMeta],
    options: &InferOptions,
) -> Result<FormDefinition, SchemaError> {
    Ok(FormDefinition::new(infer(columns, options)?))
}

pub fn infer_column(column: &ColumnMeta, options: &InferOptions) -> Result<WidgetSpec, SchemaError> {
    let column_type = column.parsed_type()?;
    let mut spec = from_type(column, &column_type, options)
        .label(column.comment.clone().unwrap_or_else(|| humanize(&column.name)));

    let single_checkbox = options.boolean_checkboxes
        && matches!(column_type, ColumnType::Integer { width: Some(1), .. });
    if spec.editable && !single_checkbox {
        spec.required = if options.is_required(column) {
            Required::Yes
        } else {
            Required::Optional
        };
    }

    if options.intelligence && spec.kind == WidgetKind::Text && !spec.constraints.numeric {
        if let Some(kind) = kind_from_name(&column.name) {
            tracing::debug!(column = %column.name, %kind, "upgraded by column name");
            spec.kind = kind;
        }
    }
    if let Some(kind) = options.kind_overrides.get(&column.name) {
        spec.kind = *kind;
    }
    tracing::trace!(column = %column.name, kind = %spec.kind, "inferred widget");
    Ok(spec)
}

fn from_type(column: &ColumnMeta, column_type: &ColumnType, options: &InferOptions) -> WidgetSpec {
    let name = column.name.as_str();
    let default = column
        .default
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.eq_ignore_ascii_case("null"));
    let scalar_default = default
        .filter(|text| !is_clock_default(text))
        .map(|text| Value::String(text.to_string()));

    let spec = match column_type {
        ColumnType::Enum(values) => WidgetSpec::new(name, WidgetKind::Select)
            .values(values.iter().cloned().map(OptionItem::plain)),
        ColumnType::Set(values) => {
            let spec = WidgetSpec::new(name, WidgetKind::Checkboxes)
                .values(values.iter().cloned().map(OptionItem::plain));
            return match default {
                Some(text) => spec.default_value(Value::Array(
                    text.split(',')
                        .map(str::trim)
                        .filter(|key| !key.is_empty())
                        .map(|key| Value::String(key.to_string()))
                        .collect(),
                )),
                None => spec,
            };
        }
        ColumnType::Char { length } => WidgetSpec::new(name, WidgetKind::Text).constraints(Constraints {
            max_length: *length,
            ..Constraints::default()
        }),
        ColumnType::Integer {
            width: Some(1),
            ..
        } if options.boolean_checkboxes => {
            let spec = WidgetSpec::new(name, WidgetKind::Checkboxes)
                .values([OptionItem::new("1", humanize(name))]);
            return match default {
                Some("1") => spec.default_value(Value::Array(vec![Value::String("1".into())])),
                _ => spec,
            };
        }
        ColumnType::Integer {
            width,
            default_width,
            unsigned,
        } => {
            let digits = width.unwrap_or(*default_width);
            let sign = if *unsigned { "" } else { "-?" };
            WidgetSpec::new(name, WidgetKind::Text).constraints(Constraints {
                numeric: true,
                max_length: Some(digits + usize::from(!*unsigned)),
                min_value: unsigned.then_some(0.0),
                allow_pattern: Some(format!("^{sign}[0-9]+$")),
                ..Constraints::default()
            })
        }
        ColumnType::Decimal {
            precision,
            scale,
            unsigned,
        } => {
            let mut constraints = Constraints {
                numeric: true,
                min_value: unsigned.then_some(0.0),
                ..Constraints::default()
            };
            if let Some(precision) = *precision {
                let scale = scale.unwrap_or(0);
                constraints.allow_pattern = Some(decimal_pattern(precision, scale, *unsigned));
                constraints.max_length =
                    Some(precision + usize::from(scale > 0) + usize::from(!*unsigned));
            }
            WidgetSpec::new(name, WidgetKind::Text).constraints(constraints)
        }
        ColumnType::Temporal(temporal) => {
            let mode = match temporal {
                TemporalType::Date => DateTimeMode::Date,
                TemporalType::Time => DateTimeMode::Time,
                TemporalType::Year => DateTimeMode::Year,
                TemporalType::DateTime | TemporalType::Timestamp => DateTimeMode::DateTime,
            };
            let spec = WidgetSpec::new(name, WidgetKind::Datetime).constraints(Constraints {
                datetime: mode,
                ..Constraints::default()
            });
            if *temporal == TemporalType::Timestamp {
                return spec
                    .editable(false)
                    .default_value(Value::String(NOW.to_string()));
            }
            return match default {
                Some(text) if is_clock_default(text) => {
                    spec.default_value(Value::String(NOW.to_string()))
                }
                Some(text) => spec.default_value(Value::String(text.to_string())),
                None => spec,
            };
        }
        ColumnType::LongText(size) => {
            WidgetSpec::new(name, WidgetKind::Textarea).constraints(Constraints {
                max_length: size.max_length(),
                ..Constraints::default()
            })
        }
        ColumnType::Unknown(raw) => {
            tracing::warn!(column = %name, column_type = %raw, "unknown column type, using a text widget");
            WidgetSpec::new(name, WidgetKind::Text)
        }
    };
    match scalar_default {
        Some(value) => spec.default_value(value),
        None => spec,
    }
}

fn is_clock_default(text: &str) -> bool {
    CLOCK_DEFAULTS
        .iter()
        .any(|clock| text.eq_ignore_ascii_case(clock))
}

/// At most `precision - scale` integer digits and exactly `scale`
/// fractional digits.
fn decimal_pattern(precision: usize, scale: usize, unsigned: bool) -> String {
    let sign = if unsigned { "" } else { "-?" };
    let integer_digits = precision.saturating_sub(scale);
    let integer = if integer_digits == 0 {
        "0?".to_string()
    } else {
        format!("[0-9]{{1,{integer_digits}}}")
    };
    if scale == 0 {
        format!("^{sign}{integer}$")
    } else {
        format!("^{sign}{integer}\\.[0-9]{{{scale}}}$")
    }
}

fn kind_from_name(name: &str) -> Option<WidgetKind> {
    let lowered = name.to_ascii_lowercase();
    if lowered.contains("email") || lowered.contains("e_mail") {
        Some(WidgetKind::Email)
    } else if lowered.contains("password") || lowered.contains("passwd") {
        Some(WidgetKind::Password)
    } else if lowered.contains("url") || lowered.contains("website") || lowered.contains("homepage") {
        Some(WidgetKind::Url)
    } else {
        None
    }
}

/// `date_of_birth` → `Date of birth`.
pub fn humanize(name: &str) -> String {
    let spaced = name.replace(['_', '-', '.'], " ");
    let mut chars = spaced.trim().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one(column: ColumnMeta, options: &InferOptions) -> WidgetSpec {
        infer_column(&column, options).unwrap()
    }

    #[test]
    fn varchar_nullable_is_optional_text() {
        let spec = one(ColumnMeta::new("city", "VARCHAR(100)"), &InferOptions::default());
        assert_eq!(spec.kind, WidgetKind::Text);
        assert_eq!(spec.constraints.max_length, Some(100));
        assert_eq!(spec.required, Required::Optional);
        assert_eq!(spec.label.as_deref(), Some("City"));
    }

    #[test]
    fn enum_not_null_is_required_choice() {
        let spec = one(
            ColumnMeta::new("subscribed", "ENUM('Yes','No')").not_null(),
            &InferOptions::default(),
        );
        assert_eq!(spec.kind, WidgetKind::Select);
        let keys: Vec<&str> = spec.constraints.values.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["Yes", "No"]);
        assert_eq!(spec.required, Required::Yes);
    }

    #[test]
    fn set_default_splits_on_commas() {
        let spec = one(
            ColumnMeta::new("tags", "SET('a','b','c')").with_default("a,c"),
            &InferOptions::default(),
        );
        assert_eq!(spec.kind, WidgetKind::Checkboxes);
        assert_eq!(spec.default, Some(serde_json::json!(["a", "c"])));
    }

    #[test]
    fn integers_are_numeric_text() {
        let spec = one(ColumnMeta::new("age", "TINYINT(3) UNSIGNED"), &InferOptions::default());
        assert_eq!(spec.kind, WidgetKind::Text);
        assert!(spec.constraints.numeric);
        assert_eq!(spec.constraints.max_length, Some(3));
        assert_eq!(spec.constraints.min_value, Some(0.0));

        let signed = one(ColumnMeta::new("delta", "INT"), &InferOptions::default());
        assert_eq!(signed.constraints.max_length, Some(11));
        assert_eq!(signed.constraints.allow_pattern.as_deref(), Some("^-?[0-9]+$"));
    }

    #[test]
    fn one_digit_integer_becomes_a_checkbox_on_request() {
        let column = ColumnMeta::new("active", "TINYINT(1)").not_null().with_default("1");
        let plain = one(column.clone(), &InferOptions::default());
        assert_eq!(plain.kind, WidgetKind::Text);
        assert_eq!(plain.required, Required::Yes);

        let options = InferOptions {
            boolean_checkboxes: true,
            ..InferOptions::default()
        };
        let checkbox = one(column, &options);
        assert_eq!(checkbox.kind, WidgetKind::Checkboxes);
        assert_eq!(checkbox.constraints.values.len(), 1);
        assert_eq!(checkbox.required, Required::Optional);
        assert_eq!(checkbox.default, Some(serde_json::json!(["1"])));
    }

    #[test]
    fn decimal_pattern_limits_digits() {
        let spec = one(ColumnMeta::new("price", "DECIMAL(6,2)"), &InferOptions::default());
        let pattern = spec.constraints.allow_pattern.clone().unwrap();
        insta::assert_snapshot!(pattern, @r"^-?[0-9]{1,4}\.[0-9]{2}$");
        let re = regex::Regex::new(&pattern).unwrap();
        assert!(re.is_match("1234.50"));
        assert!(re.is_match("-12.00"));
        assert!(!re.is_match("12"));
        assert!(!re.is_match("12345.00"));
        assert!(!re.is_match("1.5"));
        assert_eq!(decimal_pattern(2, 2, true), "^0?\\.[0-9]{2}$");
        assert_eq!(decimal_pattern(4, 0, false), "^-?[0-9]{1,4}$");
    }

    #[test]
    fn timestamp_is_read_only_clock() {
        let spec = one(ColumnMeta::new("created_at", "TIMESTAMP").not_null(), &InferOptions::default());
        assert_eq!(spec.kind, WidgetKind::Datetime);
        assert!(!spec.editable);
        assert_eq!(spec.default, Some(Value::String(NOW.to_string())));
        assert_eq!(spec.required, Required::Optional);

        let date = one(
            ColumnMeta::new("seen", "DATETIME").with_default("CURRENT_TIMESTAMP"),
            &InferOptions::default(),
        );
        assert!(date.editable);
        assert_eq!(date.default, Some(Value::String(NOW.to_string())));
    }

    #[test]
    fn text_family_is_multiline() {
        let spec = one(ColumnMeta::new("bio", "TEXT"), &InferOptions::default());
        assert_eq!(spec.kind, WidgetKind::Textarea);
        assert_eq!(spec.constraints.max_length, Some(65_535));
        let blob = one(ColumnMeta::new("raw", "LONGBLOB"), &InferOptions::default());
        assert_eq!(blob.kind, WidgetKind::Textarea);
        assert_eq!(blob.constraints.max_length, None);
    }

    #[test]
    fn required_lists_override_nullability() {
        let columns = vec![
            ColumnMeta::new("a", "VARCHAR(5)"),
            ColumnMeta::new("b", "VARCHAR(5)").not_null(),
        ];
        let include = InferOptions {
            required: vec!["a".into()],
            ..InferOptions::default()
        };
        let widgets = infer(&columns, &include).unwrap();
        assert_eq!(widgets[0].required, Required::Yes);
        assert_eq!(widgets[1].required, Required::Optional);

        let exclude = InferOptions {
            not_required: vec!["b".into()],
            ..InferOptions::default()
        };
        let widgets = infer(&columns, &exclude).unwrap();
        assert_eq!(widgets[1].required, Required::Optional);

        let both = InferOptions {
            required: vec!["a".into()],
            not_required: vec!["b".into()],
            ..InferOptions::default()
        };
        assert!(matches!(
            infer(&columns, &both),
            Err(SchemaError::ConflictingRequiredLists)
        ));
    }

    #[test]
    fn name_heuristics_and_overrides() {
        let mut options = InferOptions {
            intelligence: true,
            ..InferOptions::default()
        };
        let email = one(ColumnMeta::new("contact_email", "VARCHAR(80)"), &options);
        assert_eq!(email.kind, WidgetKind::Email);
        let password = one(ColumnMeta::new("password_hash", "CHAR(60)"), &options);
        assert_eq!(password.kind, WidgetKind::Password);
        let choice = one(ColumnMeta::new("url_kind", "ENUM('a','b')"), &options);
        assert_eq!(choice.kind, WidgetKind::Select);

        options
            .kind_overrides
            .insert("contact_email".into(), WidgetKind::Hidden);
        let hidden = one(ColumnMeta::new("contact_email", "VARCHAR(80)"), &options);
        assert_eq!(hidden.kind, WidgetKind::Hidden);
    }

    #[test]
    fn skips_auto_increment_and_tolerates_unknown_types() {
        let columns = vec![
            ColumnMeta::new("id", "INT(10) UNSIGNED").not_null().with_extra("auto_increment"),
            ColumnMeta::new("shape", "GEOMETRY"),
        ];
        let widgets = infer(&columns, &InferOptions::default()).unwrap();
        assert_eq!(widgets.len(), 1);
        assert_eq!(widgets[0].name, "shape");
        assert_eq!(widgets[0].kind, WidgetKind::Text);
    }

    #[test]
    fn malformed_types_are_errors() {
        let result = infer(&[ColumnMeta::new("state", "ENUM('open")], &InferOptions::default());
        assert!(matches!(result, Err(SchemaError::MalformedType { .. })));
    }

    #[test]
    fn humanizes_names() {
        assert_eq!(humanize("date_of_birth"), "Date of birth");
        assert_eq!(humanize(""), "");
    }
}
