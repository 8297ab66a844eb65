//! Error Types
//!
//! A single error enum covers document loading, flattening, the task
//! store and configuration. Failures discovered while expanding a
//! workflow (cycles, loop commands) are not errors here; they degrade
//! into diagnostics instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// No markdown document backs the requested workflow.
    #[error("Workflow '{name}' not found (expected document at {})", .path.display())]
    DocumentNotFound { name: String, path: PathBuf },

    #[error("Failed to read workflow document {}: {source}", .path.display())]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A step declares more than one nested-workflow/loop marker.
    #[error(
        "Step '{step}' in workflow '{workflow}' (line {line}) declares more than one \
         workflow/loop marker; keep exactly one"
    )]
    MarkerConflict {
        workflow: String,
        step: String,
        line: usize,
    },

    #[error("Command `{command}` failed: {reason}")]
    CommandFailed { command: String, reason: String },

    #[error("No task list found at {}. Run `workflat generate <workflow>` first.", .path.display())]
    StoreMissing { path: PathBuf },

    #[error("Failed to write task store {}: {source}", .path.display())]
    StoreWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize task store: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unknown task id '{id}'. Valid ids: {}", .valid.join(", "))]
    UnknownTaskId { id: String, valid: Vec<String> },

    #[error("Task {id} is already completed")]
    TaskAlreadyCompleted { id: String },

    #[error("Task {id} is not completed")]
    TaskNotCompleted { id: String },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_task_lists_valid_ids() {
        let err = Error::UnknownTaskId {
            id: "T009".to_string(),
            valid: vec!["T001".to_string(), "T002".to_string()],
        };
        assert_eq!(err.to_string(), "Unknown task id 'T009'. Valid ids: T001, T002");
    }

    #[test]
    fn test_store_missing_is_actionable() {
        let err = Error::StoreMissing {
            path: PathBuf::from(".workflat/tasks.json"),
        };
        assert!(err.to_string().contains("workflat generate"));
    }

    #[test]
    fn test_document_not_found_names_path() {
        let err = Error::DocumentNotFound {
            name: "deploy".to_string(),
            path: PathBuf::from("workflows/deploy.md"),
        };
        let message = err.to_string();
        assert!(message.contains("'deploy'"));
        assert!(message.contains("workflows/deploy.md"));
    }
}
