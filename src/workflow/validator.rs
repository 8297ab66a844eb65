//! Workflow Validation
//!
//! Static checks over a workflow and every workflow it references,
//! without running any loop command:
//!
//! - Referenced documents exist and can be read
//! - No step declares more than one marker
//! - Loop steps have a command and use their variable
//! - Circular references and empty workflows are reported

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info, warn};

use super::loops::uses_variable;
use super::model::StepKind;
use super::parser::WorkflowLibrary;
use crate::error::Error;

/// A problem found by [`validate_workflow`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationIssue {
    MissingWorkflow {
        workflow: String,
        referenced_by: Option<String>,
    },
    Unreadable {
        workflow: String,
        reason: String,
    },
    MarkerConflict {
        workflow: String,
        step: String,
        line: usize,
    },
    EmptyWorkflow(String),
    EmptyLoopCommand {
        workflow: String,
        step: String,
        line: usize,
    },
    UnusedLoopVariable {
        workflow: String,
        step: String,
        variable: String,
    },
    CircularReference {
        workflow: String,
        path: String,
    },
}

impl ValidationIssue {
    /// Errors make generation fail; everything else only degrades the plan.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::MissingWorkflow { .. } | Self::Unreadable { .. } | Self::MarkerConflict { .. }
        )
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingWorkflow {
                workflow,
                referenced_by: Some(parent),
            } => write!(f, "Workflow '{}' (referenced by '{}') not found", workflow, parent),
            Self::MissingWorkflow {
                workflow,
                referenced_by: None,
            } => write!(f, "Workflow '{}' not found", workflow),
            Self::Unreadable { workflow, reason } => {
                write!(f, "Workflow '{}' could not be read: {}", workflow, reason)
            }
            Self::MarkerConflict {
                workflow,
                step,
                line,
            } => write!(
                f,
                "{}:{}: step '{}' declares more than one workflow/loop marker",
                workflow, line, step
            ),
            Self::EmptyWorkflow(workflow) => write!(f, "Workflow '{}' has no steps", workflow),
            Self::EmptyLoopCommand {
                workflow,
                step,
                line,
            } => write!(
                f,
                "{}:{}: loop step '{}' has no command block",
                workflow, line, step
            ),
            Self::UnusedLoopVariable {
                workflow,
                step,
                variable,
            } => write!(
                f,
                "Loop step '{}' in '{}' never uses {{{{{}}}}}; every item gets the same text",
                step, workflow, variable
            ),
            Self::CircularReference { workflow, path } => {
                write!(f, "Circular reference to '{}' via {}", workflow, path)
            }
        }
    }
}

/// Outcome of validating one root workflow.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub workflow: String,
    /// Every workflow reached from the root, in first-visit order
    pub workflows_checked: Vec<String>,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(ValidationIssue::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| !i.is_error())
    }
}

/// Validates `name` and everything reachable from it.
pub fn validate_workflow(library: &WorkflowLibrary, name: &str) -> ValidationReport {
    let mut report = ValidationReport {
        workflow: name.to_string(),
        ..Default::default()
    };

    let mut checked = BTreeSet::new();
    visit(library, name, None, "", &BTreeSet::new(), &mut checked, &mut report);

    let errors = report.errors().count();
    let warnings = report.issues.len() - errors;
    if errors > 0 {
        warn!(
            "Workflow '{}' has {} errors and {} warnings",
            name, errors, warnings
        );
    } else {
        info!(
            "Workflow '{}' is valid ({} workflows, {} warnings)",
            name,
            report.workflows_checked.len(),
            warnings
        );
    }

    report
}

fn visit(
    library: &WorkflowLibrary,
    name: &str,
    parent: Option<&str>,
    path_prefix: &str,
    on_branch: &BTreeSet<String>,
    checked: &mut BTreeSet<String>,
    report: &mut ValidationReport,
) {
    let path = if path_prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", path_prefix, name)
    };

    if on_branch.contains(name) {
        report.issues.push(ValidationIssue::CircularReference {
            workflow: name.to_string(),
            path,
        });
        return;
    }

    // Shared sub-workflows are checked once.
    if !checked.insert(name.to_string()) {
        return;
    }

    let document = match library.load(name) {
        Ok(document) => document,
        Err(Error::DocumentNotFound { .. }) => {
            report.issues.push(ValidationIssue::MissingWorkflow {
                workflow: name.to_string(),
                referenced_by: parent.map(str::to_string),
            });
            return;
        }
        Err(Error::MarkerConflict {
            workflow,
            step,
            line,
        }) => {
            report.issues.push(ValidationIssue::MarkerConflict {
                workflow,
                step,
                line,
            });
            return;
        }
        Err(e) => {
            report.issues.push(ValidationIssue::Unreadable {
                workflow: name.to_string(),
                reason: e.to_string(),
            });
            return;
        }
    };

    report.workflows_checked.push(name.to_string());
    debug!("Validating '{}' ({} steps)", path, document.steps.len());

    if document.steps.is_empty() {
        report
            .issues
            .push(ValidationIssue::EmptyWorkflow(name.to_string()));
    }

    let mut branch = on_branch.clone();
    branch.insert(name.to_string());

    for step in &document.steps {
        match &step.kind {
            StepKind::Task => {}
            StepKind::NestedWorkflow { target } => {
                visit(library, target, Some(name), &path, &branch, checked, report);
            }
            StepKind::Loop { command, variable } => {
                if command.trim().is_empty() {
                    report.issues.push(ValidationIssue::EmptyLoopCommand {
                        workflow: name.to_string(),
                        step: step.name.clone(),
                        line: step.line_number,
                    });
                }
                if !uses_variable(&step.body, variable) && !uses_variable(&step.name, variable) {
                    report.issues.push(ValidationIssue::UnusedLoopVariable {
                        workflow: name.to_string(),
                        step: step.name.clone(),
                        variable: variable.clone(),
                    });
                }
            }
        }
    }
}
