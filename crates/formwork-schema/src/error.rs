//! Errors raised while inferring widget declarations from column metadata.

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("I/O error at {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid JSON at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// The column type could not be read at all (e.g. an unterminated
    /// `ENUM` literal). Merely unknown type names fall back to text.
    #[error("column `{column}`: malformed type `{column_type}`: {reason}")]
    MalformedType {
        column: String,
        column_type: String,
        reason: String,
    },

    /// Include-in-required and exclude-from-required lists are mutually
    /// exclusive.
    #[error("required and not-required column lists are mutually exclusive (both given)")]
    ConflictingRequiredLists,
}
