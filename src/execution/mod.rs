//! Task Execution Module
//!
//! Drives the generated task list one task at a time and provides the
//! command runner used to discover loop items.
//!
//! # Architecture
//!
//! - [`driver`]: generate / execute-next / complete / status / reset
//! - [`command`]: loop discovery command execution

pub mod command;
pub mod driver;

pub use command::{CommandRunner, FixedCommandRunner, ShellCommandRunner};
pub use driver::{CompletionReport, Driver, GenerateReport, NextTask, StatusReport};
