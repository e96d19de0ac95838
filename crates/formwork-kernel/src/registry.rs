//! Element registry: ordered, name-unique widget declarations.
//!
//! Registration never fails. Duplicate names, reserved names, and patterns
//! that do not compile are recorded as setup issues; a registry with any
//! duplicate is disabled and dispatches nothing until the declaration is
//! fixed.
//!
//! Everything the later stages need per widget (its value profile and its
//! compiled patterns) is resolved here, once.

use crate::binder::{ADD_SUFFIX, COUNT_SUFFIX, REMOVE_SUFFIX};
use crate::problem::{SetupIssue, setup_class, widget_path};
use crate::widget::{WidgetKind, WidgetSpec};
use regex::{Regex, RegexBuilder};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// How a widget's value is shaped, bound, and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueProfile {
    Scalar,
    Repeat,
    SingleChoice,
    MultiChoice,
    DateTime,
    Upload,
    NoValue,
}

impl ValueProfile {
    pub fn for_spec(spec: &WidgetSpec) -> Self {
        match spec.kind {
            WidgetKind::Heading => Self::NoValue,
            WidgetKind::Datetime => Self::DateTime,
            WidgetKind::Upload => Self::Upload,
            WidgetKind::Checkboxes => Self::MultiChoice,
            WidgetKind::Select if spec.constraints.multiple => Self::MultiChoice,
            WidgetKind::Select | WidgetKind::Radiobuttons => Self::SingleChoice,
            kind if kind.supports_expandable() && spec.is_expandable() => Self::Repeat,
            _ => Self::Scalar,
        }
    }
}

/// Allow/deny patterns compiled from a widget's constraints.
#[derive(Debug, Clone, Default)]
pub struct FieldPatterns {
    pub allow: Option<Regex>,
    pub allow_ci: Option<Regex>,
    pub deny: Option<Regex>,
    pub deny_ci: Option<Regex>,
}

/// A declaration plus everything resolved from it at registration.
#[derive(Debug, Clone)]
pub struct RegisteredWidget {
    pub spec: WidgetSpec,
    pub profile: ValueProfile,
    pub patterns: FieldPatterns,
}

impl RegisteredWidget {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn kind(&self) -> WidgetKind {
        self.spec.kind
    }
}

#[derive(Debug, Clone, Default)]
pub struct ElementRegistry {
    widgets: Vec<RegisteredWidget>,
    index: BTreeMap<String, usize>,
    duplicates: Vec<String>,
    issues: Vec<SetupIssue>,
}

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("widget name regex must compile")
    })
}

fn compile_pattern(
    pattern: Option<&str>,
    case_insensitive: bool,
    path: String,
    issues: &mut Vec<SetupIssue>,
) -> Option<Regex> {
    let pattern = pattern?;
    match RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
    {
        Ok(regex) => Some(regex),
        Err(err) => {
            issues.push(SetupIssue::error(
                setup_class::INVALID_PATTERN,
                path,
                format!("pattern {pattern:?} does not compile: {err}"),
            ));
            None
        }
    }
}

impl ElementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a declaration. A name already present is recorded as a
    /// duplicate and the later declaration is dropped.
    pub fn register(&mut self, spec: WidgetSpec) {
        let path = widget_path(&spec.name);

        if self.index.contains_key(&spec.name) {
            tracing::warn!(name = %spec.name, "duplicate widget name; form disabled");
            self.issues.push(SetupIssue::error(
                setup_class::DUPLICATE_NAME,
                path,
                format!("widget name {:?} is declared more than once", spec.name),
            ));
            self.duplicates.push(spec.name);
            return;
        }

        if !name_re().is_match(&spec.name) {
            self.issues.push(SetupIssue::error(
                setup_class::INVALID_NAME,
                path.clone(),
                format!(
                    "widget name {:?} must start with a letter or underscore and contain only letters, digits, `_`, `.` or `-`",
                    spec.name
                ),
            ));
        }

        if let Some(suffix) = [COUNT_SUFFIX, ADD_SUFFIX, REMOVE_SUFFIX]
            .into_iter()
            .find(|suffix| spec.name.ends_with(suffix))
        {
            self.issues.push(SetupIssue::error(
                setup_class::RESERVED_NAME,
                path.clone(),
                format!("widget names may not end in {suffix:?}; it is used by expandable controls"),
            ));
        }

        let constraints = &spec.constraints;
        let patterns = FieldPatterns {
            allow: compile_pattern(
                constraints.allow_pattern.as_deref(),
                false,
                format!("{path}.constraints.allowPattern"),
                &mut self.issues,
            ),
            allow_ci: compile_pattern(
                constraints.allow_pattern_ci.as_deref(),
                true,
                format!("{path}.constraints.allowPatternCi"),
                &mut self.issues,
            ),
            deny: compile_pattern(
                constraints.deny_pattern.as_deref(),
                false,
                format!("{path}.constraints.denyPattern"),
                &mut self.issues,
            ),
            deny_ci: compile_pattern(
                constraints.deny_pattern_ci.as_deref(),
                true,
                format!("{path}.constraints.denyPatternCi"),
                &mut self.issues,
            ),
        };

        let profile = ValueProfile::for_spec(&spec);
        self.index.insert(spec.name.clone(), self.widgets.len());
        self.widgets.push(RegisteredWidget {
            spec,
            profile,
            patterns,
        });
    }

    pub fn get(&self, name: &str) -> Option<&WidgetSpec> {
        self.widget(name).map(|widget| &widget.spec)
    }

    pub fn widget(&self, name: &str) -> Option<&RegisteredWidget> {
        self.index.get(name).map(|&idx| &self.widgets[idx])
    }

    pub(crate) fn widget_mut(&mut self, name: &str) -> Option<&mut RegisteredWidget> {
        let idx = *self.index.get(name)?;
        self.widgets.get_mut(idx)
    }

    /// Declarations in display order.
    pub fn all(&self) -> Vec<&WidgetSpec> {
        self.widgets.iter().map(|widget| &widget.spec).collect()
    }

    pub fn widgets(&self) -> &[RegisteredWidget] {
        &self.widgets
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn duplicates(&self) -> &[String] {
        &self.duplicates
    }

    /// A registry with duplicate names dispatches nothing.
    pub fn is_disabled(&self) -> bool {
        !self.duplicates.is_empty()
    }

    pub fn issues(&self) -> &[SetupIssue] {
        &self.issues
    }

    pub fn take_issues(&mut self) -> Vec<SetupIssue> {
        std::mem::take(&mut self.issues)
    }

    /// Resolve `after` directives with a stable pass.
    ///
    /// Widgets without a directive keep insertion order; each widget with a
    /// valid directive is placed right after its target (followers of one
    /// target keep insertion order among themselves). Invalid directives are
    /// reported and ignored.
    pub fn apply_ordering(&mut self) -> Vec<SetupIssue> {
        let mut issues = Vec::new();
        let count = self.widgets.len();
        let mut followers: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut roots = Vec::with_capacity(count);

        for (idx, widget) in self.widgets.iter().enumerate() {
            let Some(target) = widget.spec.after.as_deref() else {
                roots.push(idx);
                continue;
            };
            match self.index.get(target) {
                Some(&target_idx) if target_idx != idx => {
                    followers.entry(target_idx).or_default().push(idx);
                }
                _ => {
                    issues.push(SetupIssue::error(
                        setup_class::ORDER_TARGET_NOT_FOUND,
                        format!("{}.after", widget_path(widget.name())),
                        format!(
                            "cannot place {:?} after {target:?}: target not found",
                            widget.name()
                        ),
                    ));
                    roots.push(idx);
                }
            }
        }

        let mut placed = vec![false; count];
        let mut order = Vec::with_capacity(count);
        for root in roots {
            place(root, &followers, &mut placed, &mut order);
        }
        for idx in 0..count {
            if !placed[idx] {
                issues.push(SetupIssue::error(
                    setup_class::ORDER_CYCLE,
                    format!("{}.after", widget_path(self.widgets[idx].name())),
                    format!(
                        "placement directives around {:?} form a cycle",
                        self.widgets[idx].name()
                    ),
                ));
                place(idx, &followers, &mut placed, &mut order);
            }
        }

        let mut slots: Vec<Option<RegisteredWidget>> =
            std::mem::take(&mut self.widgets).into_iter().map(Some).collect();
        self.widgets = order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect();
        self.index = self
            .widgets
            .iter()
            .enumerate()
            .map(|(idx, widget)| (widget.spec.name.clone(), idx))
            .collect();
        issues
    }
}

fn place(
    idx: usize,
    followers: &BTreeMap<usize, Vec<usize>>,
    placed: &mut [bool],
    order: &mut Vec<usize>,
) {
    if placed[idx] {
        return;
    }
    placed[idx] = true;
    order.push(idx);
    if let Some(next) = followers.get(&idx) {
        for &follower in next {
            place(follower, followers, placed, order);
        }
    }
}
