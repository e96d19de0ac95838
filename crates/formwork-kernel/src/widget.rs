//! Widget declarations.
//!
//! A [`WidgetSpec`] is the author's declaration of one form field: its kind,
//! its constraints, its default, and how its value should be offered to each
//! output channel. Declarations are plain data; everything derived from them
//! (compiled patterns, value profile) is resolved once by the registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Closed set of widget kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    Text,
    Password,
    Email,
    Url,
    Textarea,
    Richtext,
    Select,
    Radiobuttons,
    Checkboxes,
    Datetime,
    Upload,
    Hidden,
    Heading,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 13] = [
        Self::Text,
        Self::Password,
        Self::Email,
        Self::Url,
        Self::Textarea,
        Self::Richtext,
        Self::Select,
        Self::Radiobuttons,
        Self::Checkboxes,
        Self::Datetime,
        Self::Upload,
        Self::Hidden,
        Self::Heading,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Password => "password",
            Self::Email => "email",
            Self::Url => "url",
            Self::Textarea => "textarea",
            Self::Richtext => "richtext",
            Self::Select => "select",
            Self::Radiobuttons => "radiobuttons",
            Self::Checkboxes => "checkboxes",
            Self::Datetime => "datetime",
            Self::Upload => "upload",
            Self::Hidden => "hidden",
            Self::Heading => "heading",
        }
    }

    /// Kinds whose submitted value must not span lines.
    pub fn is_single_line(self) -> bool {
        matches!(
            self,
            Self::Text | Self::Password | Self::Email | Self::Url | Self::Hidden
        )
    }

    /// Kinds whose value must come from a declared option list.
    pub fn is_choice(self) -> bool {
        matches!(self, Self::Select | Self::Radiobuttons | Self::Checkboxes)
    }

    /// Kinds that may be repeated by the submitter under one logical name.
    pub fn supports_expandable(self) -> bool {
        matches!(self, Self::Text | Self::Email | Self::Url)
    }

    /// Whether the kind carries a value at all.
    pub fn carries_value(self) -> bool {
        !matches!(self, Self::Heading)
    }
}

impl std::fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WidgetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
            .ok_or_else(|| format!("unknown widget kind: {s}"))
    }
}

/// One canonical encoding of a validated value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Representation {
    /// Structured/native shape.
    #[serde(rename = "rawcomponents")]
    Rawcomponents,
    /// Machine-oriented joined string.
    #[serde(rename = "compiled")]
    Compiled,
    /// Human-oriented string.
    #[serde(rename = "presented")]
    Presented,
    /// Comma-joined raw keys with no quoting, for SQL SET literals.
    #[serde(rename = "specialSetForm")]
    SpecialSetForm,
}

impl Representation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rawcomponents => "rawcomponents",
            Self::Compiled => "compiled",
            Self::Presented => "presented",
            Self::SpecialSetForm => "specialSetForm",
        }
    }
}

impl std::fmt::Display for Representation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Representation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "rawcomponents" => Ok(Self::Rawcomponents),
            "compiled" => Ok(Self::Compiled),
            "presented" => Ok(Self::Presented),
            "specialSetForm" | "special_set_form" => Ok(Self::SpecialSetForm),
            _ => Err(format!("unknown representation: {s}")),
        }
    }
}

/// A downstream consumer selecting one representation per widget.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum OutputChannel {
    File,
    Email,
    ConfirmationEmail,
    Screen,
    Processing,
    Database,
}

impl OutputChannel {
    pub const ALL: [OutputChannel; 6] = [
        Self::File,
        Self::Email,
        Self::ConfirmationEmail,
        Self::Screen,
        Self::Processing,
        Self::Database,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Email => "email",
            Self::ConfirmationEmail => "confirmationEmail",
            Self::Screen => "screen",
            Self::Processing => "processing",
            Self::Database => "database",
        }
    }
}

impl std::fmt::Display for OutputChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutputChannel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|channel| {
                channel.as_str() == trimmed
                    || (*channel == Self::ConfirmationEmail && trimmed == "confirmation_email")
            })
            .ok_or_else(|| format!("unknown output channel: {s}"))
    }
}

/// Whether a widget must be filled in, and for multi-value kinds how many
/// entries count as filled.
///
/// Serialized as `false`/`true` or a minimum count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "RequiredRepr", into = "RequiredRepr")]
pub enum Required {
    #[default]
    Optional,
    Yes,
    AtLeast(usize),
}

impl Required {
    pub fn is_required(self) -> bool {
        !matches!(self, Self::Optional | Self::AtLeast(0))
    }

    /// Minimum number of entries the widget must carry.
    pub fn min_count(self) -> usize {
        match self {
            Self::Optional => 0,
            Self::Yes => 1,
            Self::AtLeast(n) => n,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
enum RequiredRepr {
    Flag(bool),
    Count(usize),
}

impl From<RequiredRepr> for Required {
    fn from(value: RequiredRepr) -> Self {
        match value {
            RequiredRepr::Flag(false) | RequiredRepr::Count(0) => Self::Optional,
            RequiredRepr::Flag(true) => Self::Yes,
            RequiredRepr::Count(n) => Self::AtLeast(n),
        }
    }
}

impl From<Required> for RequiredRepr {
    fn from(value: Required) -> Self {
        match value {
            Required::Optional => Self::Flag(false),
            Required::Yes => Self::Flag(true),
            Required::AtLeast(n) => Self::Count(n),
        }
    }
}

/// One entry of a choice widget's value domain.
///
/// Serialized either as a bare string (key and label identical) or as
/// `{"key": ..., "label": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "OptionItemRepr")]
pub struct OptionItem {
    pub key: String,
    pub label: String,
}

impl OptionItem {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }

    pub fn plain(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OptionItemRepr {
    Plain(String),
    Labeled {
        key: String,
        #[serde(default)]
        label: Option<String>,
    },
}

impl From<OptionItemRepr> for OptionItem {
    fn from(value: OptionItemRepr) -> Self {
        match value {
            OptionItemRepr::Plain(key) => OptionItem::plain(key),
            OptionItemRepr::Labeled { key, label } => {
                let label = label.unwrap_or_else(|| key.clone());
                OptionItem { key, label }
            }
        }
    }
}

/// Which parts a date/time widget collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeMode {
    Date,
    Time,
    #[default]
    DateTime,
    Year,
}

/// Repeat configuration for user-extensible widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expandable {
    /// Upper bound on the number of subwidgets.
    pub available: usize,
}

/// Kind-specific constraints. Every field is optional; unused fields are
/// ignored by kinds they do not apply to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Constraints {
    /// Overrides the configured trim policy for this widget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    /// Enforce numeric input (separator normalization, whitespace collapse).
    pub numeric: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_pattern_ci: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deny_pattern_ci: Option<String>,
    /// Multi-address e-mail, or multi-selection select.
    pub multiple: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<OptionItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_selected: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_selected: Option<usize>,
    /// Separator for the `compiled` representation of multi-value widgets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
    pub datetime: DateTimeMode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_extensions: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub denied_extensions: Vec<String>,
    pub check_mime: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    /// Number of upload slots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slots: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expandable: Option<Expandable>,
    /// Forces the antispam heuristic on or off for this widget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub antispam: Option<bool>,
}

fn default_editable() -> bool {
    true
}

fn is_true(value: &bool) -> bool {
    *value
}

/// Declaration of one form field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetSpec {
    pub name: String,
    pub kind: WidgetKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub required: Required,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default)]
    pub constraints: Constraints,
    #[serde(default = "default_editable", skip_serializing_if = "is_true")]
    pub editable: bool,
    /// Processed like any other widget but omitted from output.
    #[serde(default)]
    pub discard: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_override: BTreeMap<OutputChannel, Representation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_validation_key: Option<Representation>,
    /// Relative reorder directive: place this widget right after another.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl WidgetSpec {
    pub fn new(name: impl Into<String>, kind: WidgetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            label: None,
            required: Required::Optional,
            default: None,
            constraints: Constraints::default(),
            editable: true,
            discard: false,
            output_override: BTreeMap::new(),
            group_validation_key: None,
            after: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self, required: Required) -> Self {
        self.required = required;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn values<I, T>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OptionItem>,
    {
        self.constraints.values = values.into_iter().map(Into::into).collect();
        self
    }

    pub fn editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }

    pub fn discard(mut self, discard: bool) -> Self {
        self.discard = discard;
        self
    }

    pub fn output(mut self, channel: OutputChannel, representation: Representation) -> Self {
        self.output_override.insert(channel, representation);
        self
    }

    pub fn group_key(mut self, representation: Representation) -> Self {
        self.group_validation_key = Some(representation);
        self
    }

    pub fn after(mut self, target: impl Into<String>) -> Self {
        self.after = Some(target.into());
        self
    }

    /// Label shown to humans; falls back to the name.
    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Whether the widget binds an ordered list of selections.
    pub fn is_multi_value(&self) -> bool {
        match self.kind {
            WidgetKind::Checkboxes => true,
            WidgetKind::Select => self.constraints.multiple,
            _ => false,
        }
    }

    /// Whether the widget exposes a per-widget selected count.
    pub fn is_counting(&self) -> bool {
        self.is_multi_value()
    }

    pub fn is_expandable(&self) -> bool {
        self.constraints.expandable.is_some()
    }

    pub fn option_label<'a>(&'a self, key: &'a str) -> &'a str {
        self.constraints
            .values
            .iter()
            .find(|item| item.key == key)
            .map(|item| item.label.as_str())
            .unwrap_or(key)
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.constraints.values.iter().any(|item| item.key == key)
    }
}

impl From<&str> for OptionItem {
    fn from(value: &str) -> Self {
        OptionItem::plain(value)
    }
}

impl From<String> for OptionItem {
    fn from(value: String) -> Self {
        OptionItem::plain(value)
    }
}

impl From<(&str, &str)> for OptionItem {
    fn from((key, label): (&str, &str)) -> Self {
        OptionItem::new(key, label)
    }
}
