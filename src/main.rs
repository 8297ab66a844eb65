//! Workflat CLI Entry Point
//!
//! # Usage
//!
//! ```bash
//! # Flatten a workflow into a fresh task list
//! workflat generate release
//!
//! # Preview the flattened tasks without saving
//! workflat generate release --dry-run
//!
//! # Show the next task, then mark it done
//! workflat next
//! workflat complete T001
//!
//! # Progress, and starting over
//! workflat status
//! workflat reset
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::debug;

use workflat::config::{Settings, DEFAULT_DOCS_DIR, DEFAULT_SHELL, DEFAULT_STORE_PATH};
use workflat::execution::{CompletionReport, Driver, GenerateReport, NextTask, StatusReport};
use workflat::store::JsonFileStore;
use workflat::workflow::FlattenedTask;
use workflat::{APP_NAME, VERSION};

#[derive(Debug, Parser)]
#[command(name = "workflat", version, about = "Flatten markdown workflows into a sequential task list")]
struct Cli {
    /// Directory containing <name>.md workflow documents
    #[arg(long, global = true, env = "WORKFLAT_DOCS_DIR", default_value = DEFAULT_DOCS_DIR)]
    docs_dir: PathBuf,

    /// Path of the persisted task list
    #[arg(long, global = true, env = "WORKFLAT_STORE", default_value = DEFAULT_STORE_PATH)]
    store: PathBuf,

    /// Shell used to run loop discovery commands
    #[arg(long, global = true, env = "WORKFLAT_SHELL", default_value = DEFAULT_SHELL)]
    shell: String,

    /// Directory loop discovery commands run in
    #[arg(long, global = true)]
    working_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Flatten a workflow and replace the task list
    Generate {
        workflow: String,
        /// Print the tasks without saving them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the next incomplete task
    #[command(alias = "execute-next")]
    Next,
    /// Mark a task as completed
    Complete { task_id: String },
    /// Mark a completed task as open again
    Reopen { task_id: String },
    /// Show progress for the current task list
    Status,
    /// Delete the current task list
    Reset,
    /// List available workflows
    #[command(alias = "ls")]
    List,
    /// Check a workflow and everything it references
    Validate { workflow: String },
}

impl Cli {
    fn settings(&self) -> Settings {
        let mut settings = Settings::default()
            .with_docs_dir(&self.docs_dir)
            .with_store_path(&self.store)
            .with_shell(&self.shell);
        if let Some(dir) = &self.working_dir {
            settings = settings.with_working_dir(dir);
        }
        settings
    }
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

fn print_task(task: &FlattenedTask) {
    println!("{} {}", task.id.bold().cyan(), task.name.bold());
    println!(
        "{}",
        format!("from {} / {}", task.source_workflow, task.source_step).dimmed()
    );
    if !task.description.is_empty() {
        println!();
        println!("{}", task.description);
    }
}

fn print_generate(report: &GenerateReport) {
    for diagnostic in &report.diagnostics {
        println!("{} {}", "warning:".yellow().bold(), diagnostic);
    }

    let document = &report.document;
    if report.saved {
        if let Some(previous) = &report.replaced {
            println!("Replaced task list for '{}'", previous);
        }
        println!(
            "{} Generated {} tasks for '{}'",
            "✓".green(),
            document.tasks.len(),
            document.workflow_name
        );
    } else {
        println!(
            "[DRY RUN] {} tasks for '{}' (not saved)",
            document.tasks.len(),
            document.workflow_name
        );
    }

    for task in &document.tasks {
        println!("  {} {}  {}", task.id.cyan(), task.name, task.source_workflow.dimmed());
    }

    if report.saved && !document.tasks.is_empty() {
        println!();
        println!("Run `workflat next` to start with {}.", document.tasks[0].id);
    }
}

fn print_next(next: &NextTask) {
    match next {
        NextTask::Ready {
            task,
            position,
            total,
        } => {
            println!("{}", format!("Task {} of {}", position, total).dimmed());
            print_task(task);
            println!();
            println!("When done, run `workflat complete {}`.", task.id);
        }
        NextTask::AllCompleted { workflow_name } => {
            println!(
                "{} All tasks for '{}' completed. Task list removed.",
                "✓".green(),
                workflow_name
            );
        }
        NextTask::Idle => {
            println!("No pending tasks: all tasks are completed or none were generated.");
            println!("Run `workflat generate <workflow>` to start a workflow.");
        }
    }
}

fn print_completion(report: &CompletionReport) {
    println!(
        "{} {} {} ({}/{})",
        "✓".green(),
        report.completed.id.cyan(),
        report.completed.name,
        report.completed_count,
        report.total
    );

    match &report.next {
        Some(task) => {
            println!();
            println!("{}", "Next:".bold());
            print_task(task);
        }
        None => println!("{} All {} tasks completed. Task list removed.", "✓".green(), report.total),
    }
}

fn print_status(status: Option<&StatusReport>) {
    let Some(status) = status else {
        println!("No active task list. Run `workflat generate <workflow>` to create one.");
        return;
    };

    println!(
        "{} (generated {})",
        status.workflow_name.bold(),
        status.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "{} total, {} completed, {} remaining",
        status.total, status.completed, status.remaining
    );
    println!();

    let next_id = status.tasks.iter().find(|t| !t.completed).map(|t| t.id.as_str());
    for task in &status.tasks {
        let marker = if task.completed {
            "[x]".green()
        } else if Some(task.id.as_str()) == next_id {
            "[>]".yellow()
        } else {
            "[ ]".normal()
        };
        println!("{} {} {}", marker, task.id, task.name);
    }
}

fn validate(driver: &Driver<JsonFileStore>, workflow: &str) -> Result<(), Box<dyn Error>> {
    let report = driver.validate(workflow);

    for issue in report.errors() {
        println!("{} {}", "error:".red().bold(), issue);
    }
    for issue in report.warnings() {
        println!("{} {}", "warning:".yellow().bold(), issue);
    }

    if !report.is_valid() {
        return Err(format!("Workflow '{}' is invalid", workflow).into());
    }

    println!(
        "{} '{}' is valid ({} workflows checked)",
        "✓".green(),
        workflow,
        report.workflows_checked.len()
    );
    Ok(())
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    debug!("{} v{}", APP_NAME, VERSION);

    let settings = cli.settings();
    settings.validate()?;
    settings.log_summary();

    let driver = Driver::from_settings(&settings);

    match &cli.command {
        Command::Generate { workflow, dry_run } => {
            let report = driver.generate(workflow, *dry_run)?;
            print_generate(&report);
        }
        Command::Next => print_next(&driver.execute_next()?),
        Command::Complete { task_id } => print_completion(&driver.complete(task_id)?),
        Command::Reopen { task_id } => {
            let task = driver.reopen(task_id)?;
            println!("Reopened {} {}", task.id.cyan(), task.name);
        }
        Command::Status => print_status(driver.status().as_ref()),
        Command::Reset => {
            if driver.reset()? {
                println!("Task list removed.");
            } else {
                println!("No task list to remove.");
            }
        }
        Command::List => {
            let workflows = driver.list_workflows()?;
            if workflows.is_empty() {
                println!("No workflows found in {}", settings.docs_dir.display());
            }
            for summary in workflows {
                match summary.description {
                    Some(description) => println!("{}  {}", summary.name.bold(), description),
                    None => println!("{}", summary.name.bold()),
                }
            }
        }
        Command::Validate { workflow } => validate(&driver, workflow)?,
    }

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}
