//! Workflat - Workflow Flattening and Task Execution
//!
//! Turns a library of markdown workflow documents into a single numbered
//! list of tasks, persists it with completion state, and hands tasks out
//! one at a time until none are left.
//!
//! # Architecture
//!
//! The library is organized into three main modules:
//!
//! - [`workflow`]: Step parsing, flattening and validation
//! - [`store`]: Persisted task list with completion flags
//! - [`execution`]: Operation driver and loop command execution
//!
//! # Example
//!
//! ```rust,no_run
//! use workflat::config::Settings;
//! use workflat::execution::Driver;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::default().with_docs_dir("docs/workflows");
//!     let driver = Driver::from_settings(&settings);
//!
//!     // Flatten and persist the task list
//!     let report = driver.generate("release", false)?;
//!     println!("{} tasks", report.document.tasks.len());
//!
//!     // Mark the first one done
//!     driver.complete("T001")?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use config::Settings;
pub use error::{Error, Result};
pub use execution::Driver;
pub use store::{JsonFileStore, TaskStore, TaskStoreDocument};
pub use workflow::{FlattenedTask, WorkflowLibrary, WorkflowStep};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "Workflat";
