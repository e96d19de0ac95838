//! What a renderer needs per field. Rendering itself lives elsewhere.

use crate::problem::Problems;
use crate::validator::{ValidationOutcome, format_number};
use crate::widget::{Required, WidgetKind, WidgetSpec};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldView {
    pub name: String,
    pub kind: WidgetKind,
    pub label: String,
    /// Value for redisplay, in `rawcomponents` shape. Passwords are blank.
    pub value: Value,
    pub problems: Problems,
    pub required_but_empty: bool,
    pub restrictions: Vec<String>,
    pub autofocus: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_count: Option<usize>,
}

impl FieldView {
    pub fn build(
        spec: &WidgetSpec,
        outcome: &ValidationOutcome,
        problems: Problems,
        required_but_empty: bool,
    ) -> Self {
        let value = if spec.kind == WidgetKind::Password {
            Value::String(String::new())
        } else {
            outcome.representations.rawcomponents.clone()
        };
        Self {
            name: spec.name.clone(),
            kind: spec.kind,
            label: spec.display_label().to_string(),
            value,
            problems,
            required_but_empty,
            restrictions: restrictions(spec),
            autofocus: false,
            repeat_count: outcome.repeat_count,
        }
    }

    pub fn needs_attention(&self) -> bool {
        !self.problems.is_empty() || self.required_but_empty
    }
}

fn range_text(min: Option<String>, max: Option<String>, unit: &str) -> Option<String> {
    let suffix = if unit.is_empty() {
        String::new()
    } else {
        format!(" {unit}")
    };
    match (min, max) {
        (Some(min), Some(max)) if min == max => Some(format!("exactly {min}{suffix}")),
        (Some(min), Some(max)) => Some(format!("between {min} and {max}{suffix}")),
        (Some(min), None) => Some(format!("at least {min}{suffix}")),
        (None, Some(max)) => Some(format!("at most {max}{suffix}")),
        (None, None) => None,
    }
}

fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{} KB", bytes / KIB)
    } else {
        format!("{bytes} bytes")
    }
}

/// Human restriction hints derived from a widget's constraints.
pub fn restrictions(spec: &WidgetSpec) -> Vec<String> {
    let constraints = &spec.constraints;
    let mut hints = Vec::new();

    hints.extend(range_text(
        constraints.min_length.map(|n| n.to_string()),
        constraints.max_length.map(|n| n.to_string()),
        "characters",
    ));
    if constraints.numeric && constraints.min_value.is_none() && constraints.max_value.is_none() {
        hints.push("a number".to_string());
    }
    hints.extend(
        range_text(
            constraints.min_value.map(format_number),
            constraints.max_value.map(format_number),
            "",
        )
        .map(|text| format!("a number {text}")),
    );

    if spec.is_multi_value() {
        let min = match spec.required {
            Required::AtLeast(n) => Some(constraints.min_selected.unwrap_or(0).max(n)),
            _ => constraints.min_selected,
        }
        .filter(|n| *n > 0);
        hints.extend(
            range_text(
                min.map(|n| n.to_string()),
                constraints.max_selected.map(|n| n.to_string()),
                "",
            )
            .map(|text| format!("select {text}")),
        );
    }
    if spec.kind == WidgetKind::Email && constraints.multiple {
        hints.push("separate several addresses with commas".to_string());
    }

    if spec.kind == WidgetKind::Upload {
        if constraints.allowed_extensions.iter().any(|ext| ext.trim() == "*") {
            hints.push("any file type with an extension".to_string());
        } else if !constraints.allowed_extensions.is_empty() {
            hints.push(format!(
                "allowed file types: {}",
                constraints.allowed_extensions.join(", ")
            ));
        }
        if !constraints.denied_extensions.is_empty() {
            hints.push(format!(
                "refused file types: {}",
                constraints.denied_extensions.join(", ")
            ));
        }
        if let Some(max) = constraints.max_size {
            hints.push(format!("at most {} per file", format_size(max)));
        }
    }
    hints
}

/// First field needing attention after a submission, else the first
/// editable field that carries a value.
pub fn autofocus_target(specs: &[&WidgetSpec], views: &[FieldView], submitted: bool) -> Option<String> {
    let attention = views.iter().find(|view| submitted && view.needs_attention());
    if let Some(view) = attention {
        return Some(view.name.clone());
    }
    specs
        .iter()
        .find(|spec| spec.editable && spec.kind.carries_value() && spec.kind != WidgetKind::Hidden)
        .map(|spec| spec.name.clone())
}
