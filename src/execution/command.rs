//! Loop Discovery Commands
//!
//! The flattener asks a [`CommandRunner`] for the output of each loop
//! step's command. [`ShellCommandRunner`] runs it through a shell;
//! [`FixedCommandRunner`] answers from a table for deterministic runs.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Command;

use log::{debug, error};

use crate::error::{Error, Result};

/// Runs a shell command and returns its captured stdout.
pub trait CommandRunner {
    fn run(&self, command: &str) -> Result<String>;
}

/// Executes commands with `<shell> -c <command>`.
#[derive(Debug, Clone)]
pub struct ShellCommandRunner {
    shell: String,
    working_dir: Option<PathBuf>,
}

impl ShellCommandRunner {
    pub fn new(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl Default for ShellCommandRunner {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_SHELL)
    }
}

impl CommandRunner for ShellCommandRunner {
    fn run(&self, command: &str) -> Result<String> {
        if command.trim().is_empty() {
            return Err(Error::CommandFailed {
                command: command.to_string(),
                reason: "no command given".to_string(),
            });
        }

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c").arg(command);

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
            debug!("Running loop command in {}", dir.display());
        }

        debug!("Running loop command: {}", command);
        let output = cmd.output().map_err(|e| Error::CommandFailed {
            command: command.to_string(),
            reason: format!("could not start {}: {}", self.shell, e),
        })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(
            "Loop command `{}` exited with code {:?}",
            command,
            output.status.code()
        );

        let reason = match (output.status.code(), stderr.trim()) {
            (Some(code), "") => format!("exit code {}", code),
            (Some(code), msg) => format!("exit code {}: {}", code, msg),
            (None, "") => "terminated by signal".to_string(),
            (None, msg) => format!("terminated by signal: {}", msg),
        };

        Err(Error::CommandFailed {
            command: command.to_string(),
            reason,
        })
    }
}

/// Answers commands from a fixed table; unknown commands fail.
#[derive(Debug, Clone, Default)]
pub struct FixedCommandRunner {
    responses: HashMap<String, std::result::Result<String, String>>,
}

impl FixedCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the stdout returned for `command`.
    pub fn with_output(mut self, command: impl Into<String>, stdout: impl Into<String>) -> Self {
        self.responses.insert(command.into(), Ok(stdout.into()));
        self
    }

    /// Registers a failure for `command`.
    pub fn with_failure(mut self, command: impl Into<String>, reason: impl Into<String>) -> Self {
        self.responses.insert(command.into(), Err(reason.into()));
        self
    }
}

impl CommandRunner for FixedCommandRunner {
    fn run(&self, command: &str) -> Result<String> {
        match self.responses.get(command) {
            Some(Ok(stdout)) => Ok(stdout.clone()),
            Some(Err(reason)) => Err(Error::CommandFailed {
                command: command.to_string(),
                reason: reason.clone(),
            }),
            None => Err(Error::CommandFailed {
                command: command.to_string(),
                reason: "no canned output registered".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_shell_runner_captures_stdout() {
        let runner = ShellCommandRunner::default();
        let output = runner.run("printf 'a\\nb\\n'").unwrap();
        assert_eq!(output, "a\nb\n");
    }

    #[test]
    fn test_shell_runner_reports_exit_code() {
        let runner = ShellCommandRunner::new("sh");
        let err = runner.run("echo oops >&2; exit 3").unwrap_err();

        match err {
            Error::CommandFailed { reason, .. } => {
                assert!(reason.contains("exit code 3"));
                assert!(reason.contains("oops"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_shell_runner_working_dir() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("marker.txt"), "").unwrap();

        let runner = ShellCommandRunner::new("sh").with_working_dir(temp_dir.path());
        let output = runner.run("ls").unwrap();
        assert!(output.contains("marker.txt"));
    }

    #[test]
    fn test_shell_runner_rejects_empty_command() {
        let runner = ShellCommandRunner::default();
        assert!(runner.run("   ").is_err());
    }

    #[test]
    fn test_shell_runner_missing_shell() {
        let runner = ShellCommandRunner::new("/nonexistent/shell");
        assert!(runner.run("echo hi").is_err());
    }

    #[test]
    fn test_fixed_runner() {
        let runner = FixedCommandRunner::new()
            .with_output("ls", "x\ny\n")
            .with_failure("false", "boom");

        assert_eq!(runner.run("ls").unwrap(), "x\ny\n");
        assert!(matches!(
            runner.run("false"),
            Err(Error::CommandFailed { ref reason, .. }) if reason == "boom"
        ));
        assert!(runner.run("unknown").is_err());
    }
}
