//! Execution Driver
//!
//! Runs the public operations on top of the flattener and a task store:
//!
//! ```text
//! NoTasks --generate--> InProgress --complete (last)--> AllCompleted --> NoTasks
//!                        |    ^                                          ^
//!                        +----+ complete / reopen            reset ------+
//! ```
//!
//! The store is the only state. `generate` replaces it, `complete` and
//! `reopen` flip one flag, and finishing the last task deletes it.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::store::{JsonFileStore, TaskStore, TaskStoreDocument};
use crate::workflow::flattener::{Diagnostic, Flattener};
use crate::workflow::parser::{WorkflowLibrary, WorkflowSummary};
use crate::workflow::validator::{validate_workflow, ValidationReport};
use crate::workflow::FlattenedTask;

use super::command::{CommandRunner, ShellCommandRunner};

/// Outcome of `generate`.
#[derive(Debug, Clone)]
pub struct GenerateReport {
    pub document: TaskStoreDocument,
    pub diagnostics: Vec<Diagnostic>,
    /// False for a dry run
    pub saved: bool,
    /// Workflow of the task list this one replaced, if any
    pub replaced: Option<String>,
}

/// Outcome of `execute_next`.
#[derive(Debug, Clone, PartialEq)]
pub enum NextTask {
    /// The first incomplete task, with its 1-based position.
    Ready {
        task: FlattenedTask,
        position: usize,
        total: usize,
    },
    /// Every task was done; the store has now been deleted.
    AllCompleted { workflow_name: String },
    /// There is no task list: never generated, finished, or reset.
    Idle,
}

/// Outcome of `complete`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionReport {
    pub completed: FlattenedTask,
    /// Next incomplete task in store order, if any remain
    pub next: Option<FlattenedTask>,
    pub completed_count: usize,
    pub total: usize,
}

impl CompletionReport {
    /// True when this completion finished the workflow.
    pub fn finished(&self) -> bool {
        self.next.is_none()
    }
}

/// Snapshot returned by `status`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub workflow_name: String,
    pub generated_at: DateTime<Utc>,
    pub total: usize,
    pub completed: usize,
    pub remaining: usize,
    pub tasks: Vec<FlattenedTask>,
}

impl From<TaskStoreDocument> for StatusReport {
    fn from(document: TaskStoreDocument) -> Self {
        Self {
            total: document.tasks.len(),
            completed: document.completed_count(),
            remaining: document.remaining_count(),
            workflow_name: document.workflow_name,
            generated_at: document.generated_at,
            tasks: document.tasks,
        }
    }
}

/// Drives task generation and execution against a store.
///
/// # Example
///
/// ```rust,no_run
/// use workflat::config::Settings;
/// use workflat::execution::{Driver, NextTask};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let driver = Driver::from_settings(&Settings::default());
///     driver.generate("release", false)?;
///
///     if let NextTask::Ready { task, .. } = driver.execute_next()? {
///         println!("{}: {}", task.id, task.name);
///         driver.complete(&task.id)?;
///     }
///     Ok(())
/// }
/// ```
pub struct Driver<S: TaskStore> {
    library: WorkflowLibrary,
    runner: Box<dyn CommandRunner>,
    store: S,
}

impl Driver<JsonFileStore> {
    /// Builds a driver backed by the JSON file store and a shell runner.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut runner = ShellCommandRunner::new(&settings.shell);
        if let Some(dir) = &settings.working_dir {
            runner = runner.with_working_dir(dir);
        }

        Self::new(
            WorkflowLibrary::new(&settings.docs_dir),
            runner,
            JsonFileStore::new(&settings.store_path),
        )
    }
}

impl<S: TaskStore> Driver<S> {
    pub fn new(library: WorkflowLibrary, runner: impl CommandRunner + 'static, store: S) -> Self {
        Self {
            library,
            runner: Box::new(runner),
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn library(&self) -> &WorkflowLibrary {
        &self.library
    }

    /// Flattens `workflow_name` and replaces the stored task list.
    ///
    /// With `dry_run` the plan is returned without touching the store.
    pub fn generate(&self, workflow_name: &str, dry_run: bool) -> Result<GenerateReport> {
        info!("Generating tasks for workflow '{}'", workflow_name);

        let plan = Flattener::new(&self.library, self.runner.as_ref()).flatten(workflow_name)?;
        if plan.tasks.is_empty() {
            warn!("Workflow '{}' produced no tasks", workflow_name);
        }

        let document = TaskStoreDocument::new(plan.workflow_name, plan.tasks);

        if dry_run {
            info!("Dry run: task list not saved");
            return Ok(GenerateReport {
                document,
                diagnostics: plan.diagnostics,
                saved: false,
                replaced: None,
            });
        }

        let replaced = self.store.load().map(|previous| previous.workflow_name);
        if let Some(previous) = &replaced {
            info!("Replacing existing task list for '{}'", previous);
        }

        self.store.save(&document)?;

        Ok(GenerateReport {
            document,
            diagnostics: plan.diagnostics,
            saved: true,
            replaced,
        })
    }

    /// Presents the first incomplete task without changing it.
    ///
    /// When nothing is left the store is deleted.
    pub fn execute_next(&self) -> Result<NextTask> {
        let Some(document) = self.store.load() else {
            return Ok(NextTask::Idle);
        };

        let total = document.tasks.len();
        match document.tasks.iter().position(|t| !t.completed) {
            Some(index) => Ok(NextTask::Ready {
                task: document.tasks[index].clone(),
                position: index + 1,
                total,
            }),
            None => {
                self.store.delete()?;
                info!("All tasks for '{}' completed", document.workflow_name);
                Ok(NextTask::AllCompleted {
                    workflow_name: document.workflow_name,
                })
            }
        }
    }

    /// Marks `task_id` completed and reports what comes next.
    ///
    /// Completing the last open task deletes the store.
    pub fn complete(&self, task_id: &str) -> Result<CompletionReport> {
        let document = self.store.set_completed(task_id, true)?;

        let completed = document
            .task(task_id)
            .cloned()
            .ok_or_else(|| Error::UnknownTaskId {
                id: task_id.to_string(),
                valid: document.task_ids(),
            })?;
        let next = document.next_incomplete().cloned();

        if next.is_none() {
            self.store.delete()?;
            info!(
                "All {} tasks for '{}' completed",
                document.tasks.len(),
                document.workflow_name
            );
        }

        Ok(CompletionReport {
            completed,
            next,
            completed_count: document.completed_count(),
            total: document.tasks.len(),
        })
    }

    /// Marks a completed task as open again.
    pub fn reopen(&self, task_id: &str) -> Result<FlattenedTask> {
        let document = self.store.set_completed(task_id, false)?;
        document
            .task(task_id)
            .cloned()
            .ok_or_else(|| Error::UnknownTaskId {
                id: task_id.to_string(),
                valid: document.task_ids(),
            })
    }

    /// Current progress, or `None` when there is no task list.
    pub fn status(&self) -> Option<StatusReport> {
        self.store.load().map(StatusReport::from)
    }

    /// Deletes the task list. Returns whether one existed, counting an
    /// unreadable one.
    pub fn reset(&self) -> Result<bool> {
        let existed = self.store.exists();
        self.store.delete()?;
        Ok(existed)
    }

    pub fn list_workflows(&self) -> Result<Vec<WorkflowSummary>> {
        self.library.list()
    }

    pub fn validate(&self, workflow_name: &str) -> ValidationReport {
        validate_workflow(&self.library, workflow_name)
    }
}
