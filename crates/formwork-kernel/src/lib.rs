//! # Formwork Kernel
//!
//! Declarative form binding, validation, and output projection.
//!
//! Given widget declarations and one raw request tree, the kernel decides
//! what each field's value is, what is wrong with it, which encoding of it
//! every output channel receives, and whether the request succeeded. It
//! performs no I/O: renderers, mailers, and database writers consume its
//! results.
//!
//! ## Architecture
//!
//! ```text
//! FormDefinition + FormworkConfig
//!     │
//! ElementRegistry       ← name-unique widgets, ordering, setup checks
//!     │
//! bind                  ← request tree → SubmittedShape
//!     │
//! validate              ← ordered per-field checks → ValidationOutcome
//!     │
//! group::evaluate       ← cross-field rules
//!     │
//! DefaultsMatrix        ← representation per (widget, channel)
//!     │
//! FormRun               ← SubmissionState, views, report, dispatch map
//! ```

pub mod binder;
pub mod coerce;
pub mod config;
pub mod error;
pub mod form;
pub mod group;
pub mod mime;
pub mod problem;
pub mod projection;
pub mod registry;
pub mod setup;
pub mod validator;
pub mod value;
pub mod view;
pub mod widget;

pub use binder::{DateParts, RepeatGroupState, SubmittedShape, UploadDescriptor, bind, bind_default};
pub use config::FormworkConfig;
pub use error::{FormworkError, Severity};
pub use form::{
    FormDefinition, FormEngine, FormRun, PendingSubmission, RequestContext, SubmissionState,
};
pub use group::{GroupEvaluation, GroupRule, GroupRuleKind};
pub use mime::MimeTable;
pub use problem::{
    GroupProblem, Problem, ProblemReport, Problems, SetupIssue, problem_code, setup_class,
};
pub use projection::{DefaultsMatrix, represent, supported_representations};
pub use registry::{ElementRegistry, RegisteredWidget, ValueProfile};
pub use validator::{FieldContext, ValidationOutcome, validate};
pub use value::{CleanedValue, Representations};
pub use view::FieldView;
pub use widget::{
    Constraints, DateTimeMode, Expandable, OptionItem, OutputChannel, Representation, Required,
    WidgetKind, WidgetSpec,
};
