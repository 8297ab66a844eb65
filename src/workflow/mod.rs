//! Workflow Definition Module
//!
//! Parsing markdown workflow documents and flattening them into a
//! linear task list.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (WorkflowStep, FlattenedTask)
//! - [`parser`]: Step parsing and the document library
//! - [`loops`]: Loop item splitting and variable substitution
//! - [`flattener`]: Recursive expansion into tasks
//! - [`validator`]: Static checks over a workflow tree

pub mod flattener;
pub mod loops;
pub mod model;
pub mod parser;
pub mod validator;

pub use flattener::{Diagnostic, FlatPlan, Flattener};
pub use model::{
    assign_task_ids, slugify, FlattenedTask, StepKind, WorkflowStep, MAX_PADDED_TASKS,
};
pub use parser::{parse_document, WorkflowDocument, WorkflowLibrary, WorkflowSummary};
pub use validator::{validate_workflow, ValidationIssue, ValidationReport};
