//! # Formwork Schema
//!
//! Synthesizes widget declarations from database column metadata. The
//! result is an ordinary [`formwork_kernel::FormDefinition`]: callers may
//! edit it before handing it to the engine.

pub mod column;
pub mod error;
pub mod infer;

pub use column::{ColumnMeta, ColumnType, LongTextSize, TemporalType, load_columns};
pub use error::SchemaError;
pub use infer::{InferOptions, humanize, infer, infer_column, infer_definition};
