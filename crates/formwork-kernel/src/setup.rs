//! Declaration checks that run once per engine, before any request.

use crate::coerce::scalar_string;
use crate::config::FormworkConfig;
use crate::mime::MimeTable;
use crate::problem::{SetupIssue, setup_class, widget_path};
use crate::registry::ElementRegistry;
use crate::validator::normalize_extension;
use crate::widget::{Required, WidgetKind, WidgetSpec};
use serde_json::Value;
use std::collections::BTreeSet;

/// Choice defaults must come from the declared option list.
///
/// With `tolerate_invalid` an unavailable default is reset to empty and a
/// warning is recorded; otherwise it is a setup error and the default is
/// left untouched.
pub fn ensure_defaults_available(registry: &mut ElementRegistry, tolerate_invalid: bool) -> Vec<SetupIssue> {
    let candidates: Vec<String> = registry
        .all()
        .into_iter()
        .filter(|spec| spec.kind.is_choice() && spec.default.is_some())
        .map(|spec| spec.name.clone())
        .collect();

    let mut issues = Vec::new();
    for name in candidates {
        let Some(widget) = registry.widget_mut(&name) else {
            continue;
        };
        let spec = &mut widget.spec;
        let unavailable: Vec<String> = default_keys(spec)
            .into_iter()
            .filter(|key| !spec.has_option(key))
            .collect();
        if unavailable.is_empty() {
            continue;
        }
        let path = format!("{}.default", widget_path(&name));
        let message = format!(
            "default {} of {name:?} is not among its values",
            unavailable.join(", ")
        );
        if tolerate_invalid {
            tracing::warn!(%name, "resetting unavailable default");
            spec.default = None;
            issues.push(SetupIssue::warning(setup_class::DEFAULT_NOT_AVAILABLE, path, message));
        } else {
            issues.push(SetupIssue::error(setup_class::DEFAULT_NOT_AVAILABLE, path, message));
        }
    }
    issues
}

fn default_keys(spec: &WidgetSpec) -> Vec<String> {
    match &spec.default {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_string).collect(),
        Some(Value::Object(flags)) => flags
            .iter()
            .filter(|(_, flag)| scalar_string(flag).is_some_and(|s| !s.is_empty() && s != "0"))
            .map(|(key, _)| key.clone())
            .collect(),
        Some(other) => scalar_string(other).into_iter().collect(),
        None => Vec::new(),
    }
    .into_iter()
    .filter(|key| !key.is_empty())
    .collect()
}

/// Per-widget declaration checks.
pub fn check_widgets(
    registry: &ElementRegistry,
    config: &FormworkConfig,
    mime: &MimeTable,
) -> Vec<SetupIssue> {
    let mut issues = Vec::new();
    let control_keys = config.controls.keys();
    for spec in registry.all() {
        let path = widget_path(&spec.name);
        let constraints = &spec.constraints;

        if control_keys.contains(&spec.name.as_str()) {
            issues.push(SetupIssue::error(
                setup_class::RESERVED_NAME,
                path.clone(),
                format!("{:?} is a request control key", spec.name),
            ));
        }

        check_bounds(
            &mut issues,
            &path,
            "Length",
            constraints.min_length.map(|n| n as f64),
            constraints.max_length.map(|n| n as f64),
        );
        check_bounds(
            &mut issues,
            &path,
            "Value",
            constraints.min_value,
            constraints.max_value,
        );
        check_bounds(
            &mut issues,
            &path,
            "Selected",
            constraints.min_selected.map(|n| n as f64),
            constraints.max_selected.map(|n| n as f64),
        );

        if spec.kind.is_choice() {
            check_options(&mut issues, &path, spec);
        } else if !constraints.values.is_empty() {
            issues.push(SetupIssue::warning(
                setup_class::OPTION_IGNORED,
                format!("{path}.constraints.values"),
                format!("{} widgets do not use a value list", spec.kind),
            ));
        }
        if constraints.multiple && !matches!(spec.kind, WidgetKind::Email | WidgetKind::Select) {
            issues.push(SetupIssue::warning(
                setup_class::OPTION_IGNORED,
                format!("{path}.constraints.multiple"),
                format!("{} widgets have no multiple mode", spec.kind),
            ));
        }

        if let Some(expandable) = constraints.expandable {
            if !spec.kind.supports_expandable() {
                issues.push(SetupIssue::error(
                    setup_class::EXPANDABLE_UNSUPPORTED,
                    format!("{path}.constraints.expandable"),
                    format!("{} widgets cannot be expandable", spec.kind),
                ));
            } else if expandable.available == 0
                || expandable.available < spec.required.min_count()
            {
                issues.push(SetupIssue::error(
                    setup_class::IMPOSSIBLE_BOUNDS,
                    format!("{path}.constraints.expandable.available"),
                    format!(
                        "{:?} offers {} subwidgets but requires {}",
                        spec.name,
                        expandable.available,
                        spec.required.min_count().max(1)
                    ),
                ));
            }
            for index in 0..expandable.available {
                let generated = format!("{}_{index}", spec.name);
                if registry.get(&generated).is_some() {
                    issues.push(SetupIssue::error(
                        setup_class::RESERVED_NAME,
                        widget_path(&generated),
                        format!("{generated:?} collides with a subwidget of {:?}", spec.name),
                    ));
                }
            }
        }

        if spec.kind == WidgetKind::Upload && constraints.check_mime {
            for ext in &constraints.allowed_extensions {
                let ext = normalize_extension(ext);
                if ext != "*" && mime.lookup(&ext).is_none() {
                    issues.push(SetupIssue::error(
                        setup_class::MIME_UNRESOLVABLE,
                        format!("{path}.constraints.allowedExtensions"),
                        format!("no MIME type known for .{ext}; add it under [mime.extra]"),
                    ));
                }
            }
        }

        if spec.kind == WidgetKind::Heading && spec.required.is_required() {
            issues.push(SetupIssue::warning(
                setup_class::REQUIRED_HEADING,
                format!("{path}.required"),
                "headings carry no value and cannot be required",
            ));
        }
        if !spec.editable && spec.required.is_required() && spec.default.is_none() {
            issues.push(SetupIssue::warning(
                setup_class::REQUIRED_NOT_EDITABLE,
                format!("{path}.required"),
                format!("{:?} is required, not editable, and has no default", spec.name),
            ));
        }
    }
    issues
}

fn check_bounds(
    issues: &mut Vec<SetupIssue>,
    path: &str,
    what: &str,
    min: Option<f64>,
    max: Option<f64>,
) {
    match (min, max) {
        (Some(min), Some(max)) if min > max => issues.push(SetupIssue::error(
            setup_class::IMPOSSIBLE_BOUNDS,
            format!("{path}.constraints.min{what}"),
            format!("min{what} {min} is greater than max{what} {max}"),
        )),
        _ => {}
    }
}

fn check_options(issues: &mut Vec<SetupIssue>, path: &str, spec: &WidgetSpec) {
    let values = &spec.constraints.values;
    if values.is_empty() {
        issues.push(SetupIssue::error(
            setup_class::EMPTY_OPTION_LIST,
            format!("{path}.constraints.values"),
            format!("{} widget {:?} declares no values", spec.kind, spec.name),
        ));
        return;
    }
    let mut seen = BTreeSet::new();
    for option in values {
        if !seen.insert(option.key.as_str()) {
            issues.push(SetupIssue::error(
                setup_class::DUPLICATE_OPTION,
                format!("{path}.constraints.values"),
                format!("value {:?} is listed more than once", option.key),
            ));
        }
    }
    let min_count = match spec.required {
        Required::AtLeast(n) if spec.is_multi_value() => n,
        _ => 0,
    };
    if min_count > values.len() {
        let n = min_count;
        issues.push(SetupIssue::error(
            setup_class::IMPOSSIBLE_BOUNDS,
            format!("{path}.required"),
            format!("requires {n} selections but only {} values exist", values.len()),
        ));
    }
}
