//! Runtime Settings
//!
//! Where workflow documents live, where the task store is persisted and
//! how loop discovery commands are run. The CLI fills these in from
//! flags and `WORKFLAT_*` environment variables.

use std::env;
use std::path::PathBuf;

use log::info;

use crate::error::{Error, Result};

/// Default directory holding `<name>.md` workflow documents.
pub const DEFAULT_DOCS_DIR: &str = "workflows";

/// Default location of the persisted task list.
pub const DEFAULT_STORE_PATH: &str = ".workflat/tasks.json";

/// Default shell used to run loop discovery commands.
pub const DEFAULT_SHELL: &str = "bash";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub docs_dir: PathBuf,
    pub store_path: PathBuf,
    pub shell: String,
    /// Directory loop commands run in; the process cwd when unset.
    pub working_dir: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            docs_dir: PathBuf::from(DEFAULT_DOCS_DIR),
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            shell: DEFAULT_SHELL.to_string(),
            working_dir: None,
        }
    }
}

impl Settings {
    pub fn with_docs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.docs_dir = dir.into();
        self
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Checks the settings before any operation touches the filesystem.
    pub fn validate(&self) -> Result<()> {
        if self.shell.trim().is_empty() {
            return Err(Error::Config("shell must not be empty".to_string()));
        }

        if self.store_path.as_os_str().is_empty() {
            return Err(Error::Config("store path must not be empty".to_string()));
        }

        if let Some(dir) = &self.working_dir {
            if !dir.exists() {
                return Err(Error::Config(format!(
                    "Working directory does not exist: {}",
                    dir.display()
                )));
            }
            if !dir.is_dir() {
                return Err(Error::Config(format!(
                    "Path is not a directory: {}",
                    dir.display()
                )));
            }
        }

        Ok(())
    }

    /// Logs the effective configuration.
    pub fn log_summary(&self) {
        info!("Workflow documents: {}", self.docs_dir.display());
        info!("Task store: {}", self.store_path.display());
        match &self.working_dir {
            Some(dir) => info!("Loop commands run in: {}", dir.display()),
            None => {
                if let Ok(current) = env::current_dir() {
                    info!("Loop commands run in: {}", current.display());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.docs_dir, PathBuf::from("workflows"));
        assert_eq!(settings.store_path, PathBuf::from(".workflat/tasks.json"));
        assert_eq!(settings.shell, "bash");
        assert!(settings.working_dir.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let settings = Settings::default()
            .with_docs_dir("docs/flows")
            .with_store_path("/tmp/store.json")
            .with_shell("sh");

        assert_eq!(settings.docs_dir, PathBuf::from("docs/flows"));
        assert_eq!(settings.store_path, PathBuf::from("/tmp/store.json"));
        assert_eq!(settings.shell, "sh");
    }

    #[test]
    fn test_missing_working_dir_rejected() {
        let settings = Settings::default().with_working_dir("/nonexistent/workflat/dir");
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_working_dir_must_be_directory() {
        let temp_dir = tempdir().unwrap();
        let file = temp_dir.path().join("plain.txt");
        std::fs::write(&file, "x").unwrap();

        let settings = Settings::default().with_working_dir(&file);
        assert!(settings.validate().is_err());

        let settings = Settings::default().with_working_dir(temp_dir.path());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_shell_rejected() {
        let settings = Settings::default().with_shell("  ");
        assert!(settings.validate().is_err());
    }
}
