//! Cleaned values and their canonical representations.

use crate::binder::{DateParts, UploadDescriptor};
use crate::coerce::char_length;
use crate::widget::Representation;
use serde::Serialize;
use serde_json::Value;

/// A widget value after cleaning. Produced fresh from a
/// [`crate::binder::SubmittedShape`]; never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CleanedValue {
    Empty,
    Text(String),
    List(Vec<String>),
    DateTime(DateParts),
    Files(Vec<Option<UploadDescriptor>>),
}

impl CleanedValue {
    /// Length used by "required" and emptiness decisions: characters for
    /// text, entries for lists and files, filled parts for dates.
    pub fn length(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Text(text) => char_length(text),
            Self::List(items) => items.len(),
            Self::DateTime(parts) => [&parts.day, &parts.month, &parts.year, &parts.time]
                .into_iter()
                .filter(|part| !part.is_empty())
                .count(),
            Self::Files(slots) => slots.iter().flatten().count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }
}

/// The encodings one validated value exposes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Representations {
    pub rawcomponents: Value,
    pub compiled: String,
    pub presented: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_set_form: Option<String>,
}

impl Representations {
    pub fn empty() -> Self {
        Self {
            rawcomponents: Value::String(String::new()),
            compiled: String::new(),
            presented: String::new(),
            special_set_form: None,
        }
    }

    pub fn get(&self, representation: Representation) -> Option<Value> {
        match representation {
            Representation::Rawcomponents => Some(self.rawcomponents.clone()),
            Representation::Compiled => Some(Value::String(self.compiled.clone())),
            Representation::Presented => Some(Value::String(self.presented.clone())),
            Representation::SpecialSetForm => self.special_set_form.clone().map(Value::String),
        }
    }

    /// A representation flattened to text, for comparisons.
    pub fn text(&self, representation: Representation) -> String {
        match self.get(representation) {
            Some(Value::String(text)) => text,
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn length_counts_what_a_submitter_filled() {
        assert_eq!(CleanedValue::Empty.length(), 0);
        assert_eq!(CleanedValue::Text("héllo".to_string()).length(), 5);
        assert_eq!(
            CleanedValue::List(vec!["a".to_string(), "b".to_string()]).length(),
            2
        );
        let partial = DateParts {
            day: "1".to_string(),
            ..DateParts::default()
        };
        assert_eq!(CleanedValue::DateTime(partial).length(), 1);
        assert!(CleanedValue::Files(vec![None, None]).is_empty());
    }

    #[test]
    fn representation_lookup() {
        let reps = Representations {
            rawcomponents: json!({"a": true}),
            compiled: "a".to_string(),
            presented: "Apple".to_string(),
            special_set_form: None,
        };
        assert_eq!(reps.get(Representation::Presented), Some(json!("Apple")));
        assert_eq!(reps.get(Representation::SpecialSetForm), None);
        assert_eq!(reps.text(Representation::Rawcomponents), r#"{"a":true}"#);
    }
}
