//! Workflow Data Model
//!
//! Structures produced by parsing a workflow document and by flattening
//! it into executable tasks.
//!
//! # Example Document
//!
//! ````markdown
//! ---
//! description: Ship a release
//! ---
//!
//! ### Step 1: Run the test suite
//! <!-- workflow:testing -->
//!
//! ### Step 2: Review {{crate}}
//! <!-- loop:crate -->
//! ```bash
//! ls crates
//! ```
//! Read through `crates/{{crate}}` and note anything unusual.
//!
//! ### Step 3: Tag the release
//! Create the git tag and push it.
//! ````

use serde::{Deserialize, Serialize};

/// Classification of a parsed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// Plain unit of work; becomes exactly one task.
    Task,
    /// Replaced by the flattened steps of another workflow.
    NestedWorkflow { target: String },
    /// Expanded into one task per line of the command's output.
    Loop { command: String, variable: String },
}

impl StepKind {
    pub fn label(&self) -> &'static str {
        match self {
            StepKind::Task => "task",
            StepKind::NestedWorkflow { .. } => "nested-workflow",
            StepKind::Loop { .. } => "loop",
        }
    }
}

/// One structural unit of a workflow document.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStep {
    /// Slug derived from the title
    pub id: String,

    /// Title as written after `Step N:`
    pub name: String,

    pub kind: StepKind,

    /// Step content with marker lines (and a loop's command block) removed
    pub body: String,

    /// Workflow the step was parsed from
    pub source_workflow: String,

    /// 1-based line of the step header
    pub line_number: usize,
}

impl WorkflowStep {
    /// Creates a plain task step.
    ///
    /// # Example
    ///
    /// ```
    /// use workflat::workflow::{StepKind, WorkflowStep};
    ///
    /// let step = WorkflowStep::new("Write Tests", "release", 3)
    ///     .with_body("Cover the new parser.");
    /// assert_eq!(step.id, "write-tests");
    /// assert_eq!(step.kind, StepKind::Task);
    /// ```
    pub fn new(name: impl Into<String>, source_workflow: impl Into<String>, line_number: usize) -> Self {
        let name = name.into().trim().to_string();
        Self {
            id: slugify(&name),
            name,
            kind: StepKind::Task,
            body: String::new(),
            source_workflow: source_workflow.into(),
            line_number,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_kind(mut self, kind: StepKind) -> Self {
        self.kind = kind;
        self
    }

    /// Referenced workflow, for nested-workflow steps.
    pub fn target_workflow(&self) -> Option<&str> {
        match &self.kind {
            StepKind::NestedWorkflow { target } => Some(target),
            _ => None,
        }
    }

    /// Discovery command, for loop steps.
    pub fn loop_command(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Loop { command, .. } => Some(command),
            _ => None,
        }
    }

    /// Substitution variable, for loop steps.
    pub fn loop_variable(&self) -> Option<&str> {
        match &self.kind {
            StepKind::Loop { variable, .. } => Some(variable),
            _ => None,
        }
    }
}

/// The persisted unit of execution.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FlattenedTask {
    /// Positional id (`T001`, `T002`, ...), assigned after flattening
    pub id: String,

    pub name: String,

    pub description: String,

    /// Dotted path of the workflows that produced this task
    pub source_workflow: String,

    /// Slug of the originating step
    pub source_step: String,

    #[serde(default)]
    pub completed: bool,
}

impl FlattenedTask {
    /// Creates an unnumbered, incomplete task.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        source_workflow: impl Into<String>,
        source_step: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            description: description.into(),
            source_workflow: source_workflow.into(),
            source_step: source_step.into(),
            completed: false,
        }
    }
}

/// Largest task count whose ids all fit the three-digit `T###` form.
pub const MAX_PADDED_TASKS: usize = 999;

/// Formats the positional task id for a 0-based index.
///
/// Ids are zero-padded to three digits. Past [`MAX_PADDED_TASKS`] they
/// simply grow (`T1000`), so they stay unique but no longer sort
/// lexically.
pub fn task_id(index: usize) -> String {
    format!("T{:03}", index + 1)
}

/// Assigns `T001..` in list order, replacing any existing ids.
pub fn assign_task_ids(tasks: &mut [FlattenedTask]) {
    for (index, task) in tasks.iter_mut().enumerate() {
        task.id = task_id(index);
    }
}

/// Lowercases a title and joins its alphanumeric runs with `-`.
pub fn slugify(title: &str) -> String {
    title
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}
