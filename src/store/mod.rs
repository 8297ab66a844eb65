//! Task Store
//!
//! Persists the flattened task list and each task's completion flag.
//! The document is always rewritten as a whole; a finished workflow is
//! represented by the document's absence.
//!
//! Task ids are positional (`T001`, `T002`, ...). Lists longer than
//! [`MAX_PADDED_TASKS`](crate::workflow::MAX_PADDED_TASKS) continue with
//! `T1000` and up, which stay unique but no longer sort as strings.
//!
//! # Backends
//!
//! - [`file`]: JSON file on disk
//! - [`memory`]: in-process store for tests and embedding

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryTaskStore;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::workflow::FlattenedTask;

/// The persisted task list.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskStoreDocument {
    /// Root workflow the tasks were generated from
    pub workflow_name: String,

    pub generated_at: DateTime<Utc>,

    pub tasks: Vec<FlattenedTask>,
}

impl TaskStoreDocument {
    /// Creates a document stamped with the current time.
    pub fn new(workflow_name: impl Into<String>, tasks: Vec<FlattenedTask>) -> Self {
        Self {
            workflow_name: workflow_name.into(),
            generated_at: Utc::now(),
            tasks,
        }
    }

    pub fn task(&self, task_id: &str) -> Option<&FlattenedTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    /// First incomplete task in store order.
    pub fn next_incomplete(&self) -> Option<&FlattenedTask> {
        self.tasks.iter().find(|t| !t.completed)
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    pub fn remaining_count(&self) -> usize {
        self.tasks.len() - self.completed_count()
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.completed)
    }

    pub fn task_ids(&self) -> Vec<String> {
        self.tasks.iter().map(|t| t.id.clone()).collect()
    }
}

/// Storage for the current task list.
///
/// Callers must not run two mutating operations against the same backing
/// store concurrently; no locking is performed.
pub trait TaskStore {
    /// Replaces the stored document.
    fn save(&self, document: &TaskStoreDocument) -> Result<()>;

    /// Returns the stored document, or `None` if absent or unreadable.
    fn load(&self) -> Option<TaskStoreDocument>;

    /// Whether anything is stored, readable or not.
    fn exists(&self) -> bool {
        self.load().is_some()
    }

    /// Removes the stored document. Absence is not an error.
    fn delete(&self) -> Result<()>;

    /// Human-readable location used in messages.
    fn describe(&self) -> String;

    /// Sets one task's completion flag and saves the whole document.
    ///
    /// Fails if there is no document, the id is unknown, or the task
    /// already has the requested state.
    fn set_completed(&self, task_id: &str, completed: bool) -> Result<TaskStoreDocument> {
        let mut document = self.load().ok_or_else(|| Error::StoreMissing {
            path: self.describe().into(),
        })?;

        let valid = document.task_ids();
        let task = document
            .tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| Error::UnknownTaskId {
                id: task_id.to_string(),
                valid,
            })?;

        match (task.completed, completed) {
            (true, true) => {
                return Err(Error::TaskAlreadyCompleted {
                    id: task_id.to_string(),
                })
            }
            (false, false) => {
                return Err(Error::TaskNotCompleted {
                    id: task_id.to_string(),
                })
            }
            _ => task.completed = completed,
        }

        self.save(&document)?;
        info!("Marked {} as {}", task_id, if completed { "completed" } else { "open" });
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, completed: bool) -> FlattenedTask {
        let mut task = FlattenedTask::new(id, "", "w", id.to_lowercase());
        task.id = id.to_string();
        task.completed = completed;
        task
    }

    #[test]
    fn test_document_counts() {
        let document = TaskStoreDocument::new(
            "w",
            vec![task("T001", true), task("T002", false), task("T003", false)],
        );

        assert_eq!(document.completed_count(), 1);
        assert_eq!(document.remaining_count(), 2);
        assert_eq!(document.next_incomplete().map(|t| t.id.as_str()), Some("T002"));
        assert!(!document.is_finished());
        assert!(document.task("T003").is_some());
        assert!(document.task("T004").is_none());
    }

    #[test]
    fn test_document_json_shape() {
        let document = TaskStoreDocument::new("release", vec![task("T001", false)]);
        let json = serde_json::to_value(&document).unwrap();

        assert_eq!(json["workflowName"], "release");
        assert!(json["generatedAt"].as_str().unwrap().contains('T'));
        assert_eq!(json["tasks"][0]["id"], "T001");
    }

    #[test]
    fn test_set_completed_transitions() {
        let store = MemoryTaskStore::new();
        store
            .save(&TaskStoreDocument::new("w", vec![task("T001", false), task("T002", false)]))
            .unwrap();

        let document = store.set_completed("T001", true).unwrap();
        assert!(document.tasks[0].completed);
        assert!(store.load().unwrap().tasks[0].completed);

        assert!(matches!(
            store.set_completed("T001", true),
            Err(Error::TaskAlreadyCompleted { .. })
        ));
        assert!(matches!(
            store.set_completed("T002", false),
            Err(Error::TaskNotCompleted { .. })
        ));

        store.set_completed("T001", false).unwrap();
        assert!(!store.load().unwrap().tasks[0].completed);
    }

    #[test]
    fn test_set_completed_unknown_id() {
        let store = MemoryTaskStore::new();
        store
            .save(&TaskStoreDocument::new("w", vec![task("T001", false)]))
            .unwrap();

        match store.set_completed("T042", true) {
            Err(Error::UnknownTaskId { id, valid }) => {
                assert_eq!(id, "T042");
                assert_eq!(valid, vec!["T001"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_set_completed_without_document() {
        let store = MemoryTaskStore::new();
        assert!(matches!(
            store.set_completed("T001", true),
            Err(Error::StoreMissing { .. })
        ));
    }
}
