//! Engine configuration.
//!
//! Loaded once from TOML and injected into [`crate::form::FormEngine`]. The
//! resolved configuration is immutable for the lifetime of the engine.
//!
//! ```toml
//! [whitespace]
//! trim = true
//! whitespace_only_is_empty = true
//!
//! [antispam]
//! deny_pattern = "(?i)casino|viagra"
//! max_links = 3
//! penalty_seconds = 5
//!
//! [output]
//! separator = ",\n"
//!
//! [matrix.checkboxes]
//! database = "compiled"
//! ```

use crate::coerce::WhitespacePolicy;
use crate::error::FormworkError;
use crate::widget::WidgetKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Matrix row key for selects in multiple mode.
pub const SELECT_MULTIPLE_ROW: &str = "select_multiple";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhitespaceConfig {
    pub trim: bool,
    pub whitespace_only_is_empty: bool,
}

impl Default for WhitespaceConfig {
    fn default() -> Self {
        Self {
            trim: true,
            whitespace_only_is_empty: true,
        }
    }
}

impl WhitespaceConfig {
    pub fn policy(&self) -> WhitespacePolicy {
        WhitespacePolicy {
            trim: self.trim,
            whitespace_only_is_empty: self.whitespace_only_is_empty,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AntispamConfig {
    pub deny_pattern: Option<String>,
    pub max_links: Option<usize>,
    pub penalty_seconds: u64,
    /// Kinds the heuristic runs on unless a widget opts out.
    pub kinds: Vec<WidgetKind>,
}

impl Default for AntispamConfig {
    fn default() -> Self {
        Self {
            deny_pattern: None,
            max_links: None,
            penalty_seconds: 3,
            kinds: vec![WidgetKind::Text, WidgetKind::Textarea, WidgetKind::Richtext],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Separator for `compiled` multi-value strings.
    pub separator: String,
    /// Separator for `presented` multi-value strings.
    pub presented_separator: String,
    /// Replacement shown instead of a password's `presented` value.
    pub password_mask: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            separator: ",\n".to_string(),
            presented_separator: ", ".to_string(),
            password_mask: "********".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Reset out-of-domain choice defaults with a warning instead of failing
    /// setup.
    pub tolerate_invalid: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    /// Request key carrying the form id.
    pub form_id_key: String,
    /// Accept `"1"` as a form id, not just the fingerprint.
    pub accept_any_form_id: bool,
    pub save_key: String,
    pub refresh_key: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            form_id_key: "__formwork".to_string(),
            accept_any_form_id: true,
            save_key: "__save".to_string(),
            refresh_key: "__refresh".to_string(),
        }
    }
}

impl ControlsConfig {
    pub fn keys(&self) -> [&str; 3] {
        [&self.form_id_key, &self.save_key, &self.refresh_key]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MimeConfig {
    pub extra: BTreeMap<String, String>,
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FormworkConfig {
    pub whitespace: WhitespaceConfig,
    pub antispam: AntispamConfig,
    pub output: OutputConfig,
    pub defaults: DefaultsConfig,
    pub controls: ControlsConfig,
    pub mime: MimeConfig,
    /// Per-row overrides of the builtin defaults matrix, keyed by widget kind
    /// name or [`SELECT_MULTIPLE_ROW`], then by channel name. Names are
    /// checked when the engine resolves the matrix.
    pub matrix: BTreeMap<String, BTreeMap<String, String>>,
}

impl FormworkConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, FormworkError> {
        Self::parse_toml(text, "<inline>")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, FormworkError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| FormworkError::Io {
            path: path.display().to_string(),
            message: error.to_string(),
        })?;
        Self::parse_toml(&text, &path.display().to_string())
    }

    fn parse_toml(text: &str, path: &str) -> Result<Self, FormworkError> {
        toml::from_str(text).map_err(|source| FormworkError::InvalidToml {
            path: path.to_string(),
            source,
        })
    }
}
