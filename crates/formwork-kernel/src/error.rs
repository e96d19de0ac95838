//! Error types for formwork kernel operations.
//!
//! Submitter mistakes and declaration mistakes are never errors: they are
//! accumulated as [`crate::problem::Problem`] and [`crate::problem::SetupIssue`]
//! rows. The errors here cover loading declarations and configuration.

/// Errors raised while loading declarations or configuration.
#[derive(Debug, thiserror::Error)]
pub enum FormworkError {
    /// Storage or I/O failure.
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    /// A declaration or request payload is not valid JSON for its target type.
    #[error("invalid JSON at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// A configuration file is not valid TOML for [`crate::config::FormworkConfig`].
    #[error("invalid toml at {path}: {source}")]
    InvalidToml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Severity of a setup issue.
///
/// Errors block all output dispatch; warnings are displayed and processing
/// continues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}
