//! Workflow Flattening
//!
//! Expands a workflow into a linear task list, depth first and in
//! document order:
//!
//! - plain steps become one task each
//! - nested-workflow steps are replaced by the referenced workflow's tasks
//! - loop steps become one task per item printed by their command
//!
//! Cycles and failing loop commands do not abort flattening. A workflow
//! already on the current branch contributes nothing; a loop that cannot
//! be resolved contributes one fallback task describing the failure.
//! Missing documents are fatal.

use std::collections::BTreeSet;
use std::fmt;

use log::{debug, info, warn};

use super::loops::{split_items, substitute};
use super::model::{assign_task_ids, FlattenedTask, StepKind, WorkflowStep, MAX_PADDED_TASKS};
use super::parser::WorkflowLibrary;
use crate::error::Result;
use crate::execution::command::CommandRunner;

/// A recoverable problem found while expanding a workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// `workflow` was referenced again from within itself.
    CircularReference { workflow: String, path: String },
    /// A loop command failed or produced no items.
    LoopCommandFailure {
        workflow: String,
        step: String,
        command: String,
        reason: String,
    },
    /// More tasks than three-digit ids can number.
    TaskIdOverflow { count: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CircularReference { workflow, path } => write!(
                f,
                "Circular reference: '{}' is already being expanded (via {}); skipped",
                workflow, path
            ),
            Self::LoopCommandFailure {
                workflow,
                step,
                command,
                reason,
            } => write!(
                f,
                "Loop step '{}' in '{}': `{}` {}; added a fallback task",
                step, workflow, command, reason
            ),
            Self::TaskIdOverflow { count } => write!(
                f,
                "{} tasks exceed the {} three-digit ids; later ids are T{} and up and do not sort lexically",
                count,
                MAX_PADDED_TASKS,
                MAX_PADDED_TASKS + 1
            ),
        }
    }
}

/// Result of flattening a workflow.
#[derive(Debug, Clone)]
pub struct FlatPlan {
    pub workflow_name: String,
    /// Tasks numbered `T001..` in execution order
    pub tasks: Vec<FlattenedTask>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Expands workflows from a library, running loop commands through `runner`.
pub struct Flattener<'a> {
    library: &'a WorkflowLibrary,
    runner: &'a dyn CommandRunner,
}

impl<'a> Flattener<'a> {
    pub fn new(library: &'a WorkflowLibrary, runner: &'a dyn CommandRunner) -> Self {
        Self { library, runner }
    }

    /// Flattens `workflow_name` and numbers the resulting tasks.
    pub fn flatten(&self, workflow_name: &str) -> Result<FlatPlan> {
        let mut diagnostics = Vec::new();
        let mut tasks =
            self.flatten_branch(workflow_name, "", &BTreeSet::new(), &mut diagnostics)?;

        assign_task_ids(&mut tasks);

        if tasks.len() > MAX_PADDED_TASKS {
            let diagnostic = Diagnostic::TaskIdOverflow { count: tasks.len() };
            warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
        }

        info!(
            "Flattened '{}' into {} tasks ({} diagnostics)",
            workflow_name,
            tasks.len(),
            diagnostics.len()
        );

        Ok(FlatPlan {
            workflow_name: workflow_name.to_string(),
            tasks,
            diagnostics,
        })
    }

    /// Expands one workflow under `path_prefix` without numbering.
    ///
    /// `visited` holds the workflows on the current branch. Each call works
    /// on its own copy, so a cycle cut in one branch does not affect its
    /// siblings.
    pub fn flatten_branch(
        &self,
        workflow_name: &str,
        path_prefix: &str,
        visited: &BTreeSet<String>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Result<Vec<FlattenedTask>> {
        let path = if path_prefix.is_empty() {
            workflow_name.to_string()
        } else {
            format!("{}.{}", path_prefix, workflow_name)
        };

        if visited.contains(workflow_name) {
            let diagnostic = Diagnostic::CircularReference {
                workflow: workflow_name.to_string(),
                path,
            };
            warn!("{}", diagnostic);
            diagnostics.push(diagnostic);
            return Ok(Vec::new());
        }

        let mut branch = visited.clone();
        branch.insert(workflow_name.to_string());

        let steps = self.library.parse(workflow_name)?;
        debug!("Expanding '{}' ({} steps)", path, steps.len());

        let mut tasks = Vec::new();
        for step in &steps {
            match &step.kind {
                StepKind::Task => {
                    tasks.push(FlattenedTask::new(&step.name, &step.body, &path, &step.id));
                }
                StepKind::NestedWorkflow { target } => {
                    let nested = self.flatten_branch(target, &path, &branch, diagnostics)?;
                    debug!("'{}' contributed {} tasks to '{}'", target, nested.len(), path);
                    tasks.extend(nested);
                }
                StepKind::Loop { command, variable } => {
                    tasks.extend(self.expand_loop(step, command, variable, &path, diagnostics));
                }
            }
        }

        Ok(tasks)
    }

    /// Produces one task per loop item, or a single fallback task.
    fn expand_loop(
        &self,
        step: &WorkflowStep,
        command: &str,
        variable: &str,
        path: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<FlattenedTask> {
        let items = match self.runner.run(command) {
            Ok(output) => split_items(&output),
            Err(e) => {
                return vec![self.fallback_task(step, command, &e.to_string(), path, diagnostics)];
            }
        };

        if items.is_empty() {
            return vec![self.fallback_task(
                step,
                command,
                "produced no items",
                path,
                diagnostics,
            )];
        }

        debug!(
            "Loop '{}' over {{{{{}}}}}: {} items",
            step.id,
            variable,
            items.len()
        );

        items
            .iter()
            .map(|item| {
                FlattenedTask::new(
                    substitute(&step.name, variable, item),
                    substitute(&step.body, variable, item),
                    path,
                    &step.id,
                )
            })
            .collect()
    }

    fn fallback_task(
        &self,
        step: &WorkflowStep,
        command: &str,
        reason: &str,
        path: &str,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> FlattenedTask {
        let diagnostic = Diagnostic::LoopCommandFailure {
            workflow: step.source_workflow.clone(),
            step: step.name.clone(),
            command: command.to_string(),
            reason: reason.to_string(),
        };
        warn!("{}", diagnostic);
        diagnostics.push(diagnostic);

        let description = format!(
            "The loop in step '{}' of workflow '{}' (line {}) could not be expanded.\n\n\
             Command: `{}`\n\
             Reason: {}\n\n\
             Fix the command in the workflow document and regenerate, or work through \
             the step manually:\n\n{}",
            step.name, step.source_workflow, step.line_number, command, reason, step.body
        );

        FlattenedTask::new(
            format!("{} (loop discovery failed)", step.name),
            description,
            path,
            &step.id,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::execution::command::FixedCommandRunner;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn library_with(docs: &[(&str, &str)]) -> (TempDir, WorkflowLibrary) {
        let temp_dir = tempdir().unwrap();
        for (name, content) in docs {
            fs::write(temp_dir.path().join(format!("{}.md", name)), content).unwrap();
        }
        let library = WorkflowLibrary::new(temp_dir.path());
        (temp_dir, library)
    }

    fn names(plan: &FlatPlan) -> Vec<&str> {
        plan.tasks.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn test_plain_steps_in_order() {
        let (_dir, library) = library_with(&[(
            "w",
            "### Step 1: First\nDo one.\n### Step 2: Second\nDo two.\n",
        )]);
        let runner = FixedCommandRunner::new();
        let plan = Flattener::new(&library, &runner).flatten("w").unwrap();

        assert_eq!(names(&plan), vec!["First", "Second"]);
        assert_eq!(plan.tasks[0].id, "T001");
        assert_eq!(plan.tasks[0].description, "Do one.");
        assert_eq!(plan.tasks[1].source_step, "second");
        assert!(plan.tasks.iter().all(|t| !t.completed));
        assert!(plan.diagnostics.is_empty());
    }

    #[test]
    fn test_nested_workflow_spliced_with_dotted_source() {
        let (_dir, library) = library_with(&[
            (
                "release",
                "### Step 1: Build\n### Step 2: Test\n<!-- workflow:testing -->\n### Step 3: Tag\n",
            ),
            ("testing", "### Step 1: Unit\n### Step 2: Lint\n<!-- workflow:lint -->\n"),
            ("lint", "### Step 1: Clippy\n"),
        ]);
        let runner = FixedCommandRunner::new();
        let plan = Flattener::new(&library, &runner).flatten("release").unwrap();

        assert_eq!(names(&plan), vec!["Build", "Unit", "Clippy", "Tag"]);
        let sources: Vec<_> = plan.tasks.iter().map(|t| t.source_workflow.as_str()).collect();
        assert_eq!(
            sources,
            vec!["release", "release.testing", "release.testing.lint", "release"]
        );
    }

    #[test]
    fn test_ids_are_contiguous() {
        let (_dir, library) = library_with(&[
            ("a", "### Step 1: One\n### Step 2: Nest\n<!-- workflow:b -->\n### Step 3: Three\n"),
            ("b", "### Step 1: Two\n### Step 2: Loop\n<!-- loop:x -->\n```sh\nitems\n```\n{{x}}\n"),
        ]);
        let runner = FixedCommandRunner::new().with_output("items", "p\nq\nr\n");
        let plan = Flattener::new(&library, &runner).flatten("a").unwrap();

        let ids: Vec<_> = plan.tasks.iter().map(|t| t.id.clone()).collect();
        let expected: Vec<_> = (1..=plan.tasks.len()).map(|n| format!("T{:03}", n)).collect();
        assert_eq!(plan.tasks.len(), 6);
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_more_than_999_tasks_flags_id_overflow() {
        let (_dir, library) = library_with(&[(
            "big",
            "### Step 1: Item {{n}}\n<!-- loop:n -->\n```sh\nseq 1000\n```\n",
        )]);
        let items: Vec<String> = (1..=1000).map(|n| n.to_string()).collect();
        let runner = FixedCommandRunner::new().with_output("seq 1000", items.join("\n"));
        let plan = Flattener::new(&library, &runner).flatten("big").unwrap();

        assert_eq!(plan.tasks.len(), 1000);
        assert_eq!(plan.tasks[998].id, "T999");
        assert_eq!(plan.tasks[999].id, "T1000");
        assert_eq!(plan.diagnostics, vec![Diagnostic::TaskIdOverflow { count: 1000 }]);
    }

    #[test]
    fn test_999_tasks_fit_padded_ids() {
        let (_dir, library) = library_with(&[(
            "full",
            "### Step 1: Item {{n}}\n<!-- loop:n -->\n```sh\nseq 999\n```\n",
        )]);
        let items: Vec<String> = (1..=999).map(|n| n.to_string()).collect();
        let runner = FixedCommandRunner::new().with_output("seq 999", items.join("\n"));
        let plan = Flattener::new(&library, &runner).flatten("full").unwrap();

        assert_eq!(plan.tasks.len(), 999);
        assert!(plan.diagnostics.is_empty());
    }

    #[test]
    fn test_cycle_terminates_without_duplicates() {
        let (_dir, library) = library_with(&[
            ("a", "### Step 1: A one\n### Step 2: Go to B\n<!-- workflow:b -->\n### Step 3: A two\n"),
            ("b", "### Step 1: B one\n### Step 2: Back to A\n<!-- workflow:a -->\n"),
        ]);
        let runner = FixedCommandRunner::new();
        let plan = Flattener::new(&library, &runner).flatten("a").unwrap();

        assert_eq!(names(&plan), vec!["A one", "B one", "A two"]);
        assert_eq!(
            plan.diagnostics,
            vec![Diagnostic::CircularReference {
                workflow: "a".to_string(),
                path: "a.b.a".to_string(),
            }]
        );
    }

    #[test]
    fn test_self_reference() {
        let (_dir, library) = library_with(&[("a", "### Step 1: Me\n<!-- workflow:a -->\n### Step 2: Work\n")]);
        let runner = FixedCommandRunner::new();
        let plan = Flattener::new(&library, &runner).flatten("a").unwrap();

        assert_eq!(names(&plan), vec!["Work"]);
        assert_eq!(plan.diagnostics.len(), 1);
    }

    #[test]
    fn test_siblings_do_not_share_visited() {
        let (_dir, library) = library_with(&[
            (
                "root",
                "### Step 1: Left\n<!-- workflow:shared -->\n### Step 2: Right\n<!-- workflow:shared -->\n",
            ),
            ("shared", "### Step 1: Shared work\n"),
        ]);
        let runner = FixedCommandRunner::new();
        let plan = Flattener::new(&library, &runner).flatten("root").unwrap();

        assert_eq!(names(&plan), vec!["Shared work", "Shared work"]);
        assert!(plan.diagnostics.is_empty());
    }

    #[test]
    fn test_loop_expands_one_task_per_item() {
        let (_dir, library) = library_with(&[(
            "review",
            "### Step 1: Review {{module}}\n<!-- loop:module -->\n```bash\nls src\n```\nRead src/{{module}} and {{module}} tests.\n",
        )]);
        let runner = FixedCommandRunner::new().with_output("ls src", "parser.rs\n\n  store.rs \n");
        let plan = Flattener::new(&library, &runner).flatten("review").unwrap();

        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].name, "Review parser.rs");
        assert_eq!(plan.tasks[0].description, "Read src/parser.rs and parser.rs tests.");
        assert_eq!(plan.tasks[1].description, "Read src/store.rs and store.rs tests.");
        for task in &plan.tasks {
            assert_eq!(task.source_workflow, "review");
            assert_eq!(task.source_step, "review-module");
            assert!(!task.completed);
        }
    }

    #[test]
    fn test_loop_failure_yields_fallback_task() {
        let (_dir, library) = library_with(&[(
            "w",
            "### Step 1: Each\n<!-- loop:x -->\n```bash\nbroken\n```\nHandle {{x}}.\n### Step 2: After\n",
        )]);
        let runner = FixedCommandRunner::new().with_failure("broken", "exit code 2");
        let plan = Flattener::new(&library, &runner).flatten("w").unwrap();

        assert_eq!(plan.tasks.len(), 2);
        assert_eq!(plan.tasks[0].name, "Each (loop discovery failed)");
        assert!(plan.tasks[0].description.contains("`broken`"));
        assert!(plan.tasks[0].description.contains("exit code 2"));
        assert_eq!(plan.tasks[1].name, "After");
        assert!(matches!(
            plan.diagnostics[0],
            Diagnostic::LoopCommandFailure { .. }
        ));
    }

    #[test]
    fn test_loop_without_items_yields_fallback_task() {
        let (_dir, library) = library_with(&[(
            "w",
            "### Step 1: Each\n<!-- loop:x -->\n```bash\nquiet\n```\n",
        )]);
        let runner = FixedCommandRunner::new().with_output("quiet", "\n \n");
        let plan = Flattener::new(&library, &runner).flatten("w").unwrap();

        assert_eq!(plan.tasks.len(), 1);
        assert!(plan.tasks[0].description.contains("produced no items"));
    }

    #[test]
    fn test_missing_nested_workflow_is_fatal() {
        let (_dir, library) = library_with(&[("w", "### Step 1: Nest\n<!-- workflow:ghost -->\n")]);
        let runner = FixedCommandRunner::new();
        let err = Flattener::new(&library, &runner).flatten("w").unwrap_err();

        assert!(matches!(err, Error::DocumentNotFound { ref name, .. } if name == "ghost"));
    }

    #[test]
    fn test_flatten_is_idempotent() {
        let (_dir, library) = library_with(&[
            ("a", "### Step 1: One\n### Step 2: B\n<!-- workflow:b -->\n"),
            ("b", "### Step 1: Two\n<!-- loop:v -->\n```\nlist\n```\n{{v}}\n"),
        ]);
        let runner = FixedCommandRunner::new().with_output("list", "x\ny\n");
        let flattener = Flattener::new(&library, &runner);

        let first = flattener.flatten("a").unwrap();
        let second = flattener.flatten("a").unwrap();

        assert_eq!(first.tasks, second.tasks);
    }
}
