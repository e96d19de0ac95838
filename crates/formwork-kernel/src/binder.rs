//! Submission binder: structural extraction of one widget's raw value from
//! the request tree.
//!
//! Binding never validates and never fails. Whatever the request carries,
//! each widget gets the shape its profile expects; missing or malformed
//! pieces bind as empty.

use crate::coerce::scalar_string;
use crate::registry::{RegisteredWidget, ValueProfile};
use crate::widget::{DateTimeMode, WidgetSpec};
use chrono::{Datelike, NaiveDateTime, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;

/// Companion counter key suffix of an expandable widget.
pub const COUNT_SUFFIX: &str = "__count";
/// Control key suffix requesting one more subwidget.
pub const ADD_SUFFIX: &str = "__add";
/// Control key suffix requesting one subwidget less.
pub const REMOVE_SUFFIX: &str = "__remove";

/// Default value keyword for date/time widgets: the request clock.
pub const NOW: &str = "now";

/// Date/time parts. Always complete: absent parts are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DateParts {
    pub day: String,
    pub month: String,
    pub year: String,
    pub time: String,
}

impl DateParts {
    /// The parts a widget in `mode` collects, in display order.
    pub fn relevant(&self, mode: DateTimeMode) -> Vec<&str> {
        match mode {
            DateTimeMode::Date => vec![&self.day, &self.month, &self.year],
            DateTimeMode::Time => vec![&self.time],
            DateTimeMode::DateTime => vec![&self.day, &self.month, &self.year, &self.time],
            DateTimeMode::Year => vec![&self.year],
        }
    }

    fn from_clock(now: NaiveDateTime, mode: DateTimeMode) -> Self {
        let mut parts = Self::default();
        if matches!(mode, DateTimeMode::Date | DateTimeMode::DateTime) {
            parts.day = format!("{:02}", now.day());
            parts.month = format!("{:02}", now.month());
        }
        if mode != DateTimeMode::Time {
            parts.year = format!("{:04}", now.year());
        }
        if matches!(mode, DateTimeMode::Time | DateTimeMode::DateTime) {
            parts.time = format!("{:02}:{:02}", now.hour(), now.minute());
        }
        parts
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let part = |key: &str| {
            object
                .get(key)
                .and_then(scalar_string)
                .unwrap_or_default()
        };
        Self {
            day: part("day"),
            month: part("month"),
            year: part("year"),
            time: part("time"),
        }
    }

    /// Split a textual date (`YYYY-MM-DD[ HH:MM[:SS]]`, `HH:MM`, or `YYYY`).
    /// Text that fits none of those lands in `year` so that validation
    /// reports it instead of treating the widget as empty.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();
        if text.is_empty() {
            return Self::default();
        }
        if let Some(caps) = iso_re().captures(text) {
            return Self {
                year: caps[1].to_string(),
                month: caps[2].to_string(),
                day: caps[3].to_string(),
                time: caps.get(4).map(|m| m.as_str().to_string()).unwrap_or_default(),
            };
        }
        if clock_re().is_match(text) {
            return Self {
                time: text.to_string(),
                ..Self::default()
            };
        }
        Self {
            year: text.to_string(),
            ..Self::default()
        }
    }
}

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})(?:[ T](\d{1,2}:\d{2}(?::\d{2})?))?$")
            .expect("iso date regex must compile")
    })
}

fn clock_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}:\d{2}(?::\d{2})?$").expect("clock regex must compile"))
}

/// Descriptor of one uploaded file. The bytes stay with the caller; `tmpRef`
/// is an opaque handle to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadDescriptor {
    pub name: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    #[serde(default)]
    pub tmp_ref: String,
    #[serde(default)]
    pub size: u64,
}

/// Resolved subwidget count of an expandable widget for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatGroupState {
    /// Subwidgets shown and read after applying the requested change.
    pub count: usize,
    /// `+1` for an add control, `-1` for a remove control, else `0`.
    pub requested_delta: i32,
}

impl RepeatGroupState {
    /// Resolve counter and controls from the request.
    ///
    /// The count is always within `[max(required, 1), available]`.
    pub fn resolve(spec: &WidgetSpec, request: &Map<String, Value>) -> Self {
        let (lower, upper) = Self::bounds(spec);
        let counter = request
            .get(&format!("{}{COUNT_SUFFIX}", spec.name))
            .and_then(scalar_string)
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .unwrap_or(lower);
        let requested_delta = if control_pressed(request, &format!("{}{ADD_SUFFIX}", spec.name)) {
            1
        } else if control_pressed(request, &format!("{}{REMOVE_SUFFIX}", spec.name)) {
            -1
        } else {
            0
        };
        Self {
            count: Self::clamp(counter, requested_delta, lower, upper),
            requested_delta,
        }
    }

    /// Initial state for a widget that was not submitted.
    pub fn initial(spec: &WidgetSpec) -> Self {
        let (lower, _) = Self::bounds(spec);
        Self {
            count: lower,
            requested_delta: 0,
        }
    }

    pub fn clamp(count: usize, delta: i32, lower: usize, upper: usize) -> usize {
        let adjusted = if delta < 0 {
            count.saturating_sub(delta.unsigned_abs() as usize)
        } else {
            count.saturating_add(delta as usize)
        };
        adjusted.clamp(lower.min(upper), upper)
    }

    fn bounds(spec: &WidgetSpec) -> (usize, usize) {
        let available = spec
            .constraints
            .expandable
            .map(|expandable| expandable.available)
            .unwrap_or(1)
            .max(1);
        (spec.required.min_count().max(1), available)
    }

    pub fn changed(&self) -> bool {
        self.requested_delta != 0
    }
}

/// Whether a request control key was submitted with a non-empty value.
pub fn control_pressed(request: &Map<String, Value>, key: &str) -> bool {
    request
        .get(key)
        .and_then(scalar_string)
        .is_some_and(|value| !value.trim().is_empty() && value != "0")
}

/// The raw value(s) bound to one widget for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmittedShape {
    Scalar(String),
    List(Vec<String>),
    Repeat {
        state: RepeatGroupState,
        values: Vec<String>,
    },
    DateTime(DateParts),
    Upload(Vec<Option<UploadDescriptor>>),
    Absent,
}

/// Bind a widget's submitted value. Non-editable widgets bind their default
/// regardless of what the request carries.
pub fn bind(
    widget: &RegisteredWidget,
    request: &Map<String, Value>,
    now: NaiveDateTime,
) -> SubmittedShape {
    if !widget.spec.editable {
        return bind_default(widget, now);
    }
    let spec = &widget.spec;
    let submitted = request.get(&spec.name);
    match widget.profile {
        ValueProfile::Scalar | ValueProfile::SingleChoice => {
            SubmittedShape::Scalar(submitted.map(first_scalar).unwrap_or_default())
        }
        ValueProfile::MultiChoice => SubmittedShape::List(submitted.map(list_of).unwrap_or_default()),
        ValueProfile::Repeat => {
            let state = RepeatGroupState::resolve(spec, request);
            let values = (0..state.count)
                .map(|idx| {
                    request
                        .get(&format!("{}_{idx}", spec.name))
                        .map(first_scalar)
                        .unwrap_or_default()
                })
                .collect();
            SubmittedShape::Repeat { state, values }
        }
        ValueProfile::DateTime => SubmittedShape::DateTime(match submitted {
            Some(Value::Object(object)) => DateParts::from_object(object),
            Some(other) => DateParts::from_text(&first_scalar(other)),
            None => DateParts::default(),
        }),
        ValueProfile::Upload => SubmittedShape::Upload(upload_slots(spec, submitted)),
        ValueProfile::NoValue => SubmittedShape::Absent,
    }
}

/// Shape of a widget's declared default, used for redisplay of an
/// unsubmitted form and for non-editable widgets.
pub fn bind_default(widget: &RegisteredWidget, now: NaiveDateTime) -> SubmittedShape {
    let spec = &widget.spec;
    let default = spec.default.as_ref();
    match widget.profile {
        ValueProfile::Scalar | ValueProfile::SingleChoice => {
            SubmittedShape::Scalar(default.map(first_scalar).unwrap_or_default())
        }
        ValueProfile::MultiChoice => SubmittedShape::List(default.map(list_of).unwrap_or_default()),
        ValueProfile::Repeat => {
            let state = RepeatGroupState::initial(spec);
            let mut values = default.map(list_of).unwrap_or_default();
            values.resize(state.count, String::new());
            SubmittedShape::Repeat { state, values }
        }
        ValueProfile::DateTime => SubmittedShape::DateTime(match default {
            Some(Value::String(text)) if text.trim().eq_ignore_ascii_case(NOW) => {
                DateParts::from_clock(now, spec.constraints.datetime)
            }
            Some(Value::Object(object)) => DateParts::from_object(object),
            Some(other) => DateParts::from_text(&first_scalar(other)),
            None => DateParts::default(),
        }),
        ValueProfile::Upload => SubmittedShape::Upload(vec![None; slot_count(spec)]),
        ValueProfile::NoValue => SubmittedShape::Absent,
    }
}

fn first_scalar(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().find_map(scalar_string).unwrap_or_default(),
        other => scalar_string(other).unwrap_or_default(),
    }
}

/// A list binding: arrays keep their scalar entries, a single scalar becomes
/// a one-entry list, and a `{key: bool}` map keeps its truthy keys.
fn list_of(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(scalar_string).collect(),
        Value::Object(object) => object
            .iter()
            .filter(|(_, flag)| scalar_string(flag).is_some_and(|s| !s.is_empty() && s != "0"))
            .map(|(key, _)| key.clone())
            .collect(),
        other => scalar_string(other)
            .filter(|s| !s.is_empty())
            .into_iter()
            .collect(),
    }
}

fn slot_count(spec: &WidgetSpec) -> usize {
    spec.constraints.slots.unwrap_or(1).max(1)
}

fn descriptor(value: &Value) -> Option<UploadDescriptor> {
    serde_json::from_value::<UploadDescriptor>(value.clone())
        .ok()
        .filter(|descriptor| !descriptor.name.trim().is_empty())
}

fn upload_slots(spec: &WidgetSpec, submitted: Option<&Value>) -> Vec<Option<UploadDescriptor>> {
    let mut slots = vec![None; slot_count(spec)];
    match submitted {
        Some(Value::Array(items)) => {
            for (slot, item) in slots.iter_mut().zip(items) {
                *slot = descriptor(item);
            }
        }
        Some(Value::Object(object)) if object.contains_key("name") => {
            slots[0] = descriptor(&Value::Object(object.clone()));
        }
        Some(Value::Object(object)) => {
            for (key, item) in object {
                if let Some(slot) = key.parse::<usize>().ok().and_then(|idx| slots.get_mut(idx)) {
                    *slot = descriptor(item);
                }
            }
        }
        _ => {}
    }
    slots
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ElementRegistry;
    use crate::widget::{Expandable, Required, WidgetKind};
    use chrono::NaiveDate;
    use serde_json::json;

    fn clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 5, 0)
            .unwrap()
    }

    fn registered(spec: WidgetSpec) -> RegisteredWidget {
        let mut registry = ElementRegistry::new();
        let name = spec.name.clone();
        registry.register(spec);
        registry.widget(&name).unwrap().clone()
    }

    fn request(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn scalar_defaults_to_empty_string() {
        let widget = registered(WidgetSpec::new("name", WidgetKind::Text));
        assert_eq!(
            bind(&widget, &Map::new(), clock()),
            SubmittedShape::Scalar(String::new())
        );
        assert_eq!(
            bind(&widget, &request(json!({"name": 42})), clock()),
            SubmittedShape::Scalar("42".to_string())
        );
    }

    #[test]
    fn multi_value_always_binds_a_list() {
        let widget = registered(
            WidgetSpec::new("colours", WidgetKind::Checkboxes).values(["red", "green"]),
        );
        assert_eq!(
            bind(&widget, &Map::new(), clock()),
            SubmittedShape::List(vec![])
        );
        assert_eq!(
            bind(&widget, &request(json!({"colours": "red"})), clock()),
            SubmittedShape::List(vec!["red".to_string()])
        );
        assert_eq!(
            bind(
                &widget,
                &request(json!({"colours": {"red": true, "green": false}})),
                clock()
            ),
            SubmittedShape::List(vec!["red".to_string()])
        );
    }

    #[test]
    fn expandable_applies_controls_within_bounds() {
        let mut spec = WidgetSpec::new("phone", WidgetKind::Text).required(Required::Yes);
        spec.constraints.expandable = Some(Expandable { available: 3 });
        let widget = registered(spec);

        let shape = bind(
            &widget,
            &request(json!({"phone__count": "2", "phone__add": "1", "phone_0": "a", "phone_1": "b"})),
            clock(),
        );
        let SubmittedShape::Repeat { state, values } = shape else {
            panic!("expected repeat shape");
        };
        assert_eq!(state.count, 3);
        assert_eq!(state.requested_delta, 1);
        assert_eq!(values, vec!["a", "b", ""]);

        let shape = bind(
            &widget,
            &request(json!({"phone__count": "3", "phone__add": "1"})),
            clock(),
        );
        let SubmittedShape::Repeat { state, .. } = shape else {
            panic!("expected repeat shape");
        };
        assert_eq!(state.count, 3);

        let shape = bind(
            &widget,
            &request(json!({"phone__count": "1", "phone__remove": "1"})),
            clock(),
        );
        let SubmittedShape::Repeat { state, .. } = shape else {
            panic!("expected repeat shape");
        };
        assert_eq!(state.count, 1);
    }

    #[test]
    fn upload_missing_slots_bind_none() {
        let mut spec = WidgetSpec::new("cv", WidgetKind::Upload);
        spec.constraints.slots = Some(3);
        let widget = registered(spec);
        let shape = bind(
            &widget,
            &request(json!({"cv": [
                {"name": "cv.pdf", "type": "application/pdf", "tmpRef": "t1", "size": 10},
                null,
                "garbage"
            ]})),
            clock(),
        );
        let SubmittedShape::Upload(slots) = shape else {
            panic!("expected upload shape");
        };
        assert_eq!(slots.len(), 3);
        assert_eq!(slots[0].as_ref().unwrap().mime_type, "application/pdf");
        assert!(slots[1].is_none());
        assert!(slots[2].is_none());
    }

    #[test]
    fn date_parts_are_always_complete() {
        let widget = registered(WidgetSpec::new("born", WidgetKind::Datetime));
        assert_eq!(
            bind(&widget, &request(json!({"born": {"day": "3"}})), clock()),
            SubmittedShape::DateTime(DateParts {
                day: "3".to_string(),
                ..DateParts::default()
            })
        );
        assert_eq!(
            bind(&widget, &request(json!({"born": "2020-01-02 10:30"})), clock()),
            SubmittedShape::DateTime(DateParts {
                day: "02".to_string(),
                month: "01".to_string(),
                year: "2020".to_string(),
                time: "10:30".to_string(),
            })
        );
    }

    #[test]
    fn non_editable_binds_default_and_now_uses_clock() {
        let widget = registered(
            WidgetSpec::new("created", WidgetKind::Datetime)
                .editable(false)
                .default_value(json!("now")),
        );
        let shape = bind(&widget, &request(json!({"created": "1999-01-01"})), clock());
        assert_eq!(
            shape,
            SubmittedShape::DateTime(DateParts {
                day: "09".to_string(),
                month: "03".to_string(),
                year: "2024".to_string(),
                time: "14:05".to_string(),
            })
        );
    }

    #[test]
    fn clamp_respects_bounds() {
        assert_eq!(RepeatGroupState::clamp(0, -1, 1, 4), 1);
        assert_eq!(RepeatGroupState::clamp(4, 1, 1, 4), 4);
        assert_eq!(RepeatGroupState::clamp(9, 0, 2, 4), 4);
        assert_eq!(RepeatGroupState::clamp(2, 1, 1, 4), 3);
    }
}
