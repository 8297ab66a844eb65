//! JSON File Store
//!
//! Keeps the task list in a single pretty-printed JSON file. Writes go
//! to a sibling temporary file that is then renamed over the target, so
//! a crash mid-write never leaves a mix of old and new tasks.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use super::{TaskStore, TaskStoreDocument};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "tasks.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::StoreWrite {
            path: self.path.clone(),
            source,
        }
    }
}

impl TaskStore for JsonFileStore {
    fn save(&self, document: &TaskStoreDocument) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
                debug!("Created directory: {}", parent.display());
            }
        }

        let json = serde_json::to_string_pretty(document)?;
        let temp_path = self.temp_path();
        fs::write(&temp_path, json).map_err(|e| self.write_error(e))?;
        fs::rename(&temp_path, &self.path).map_err(|e| self.write_error(e))?;

        info!(
            "Saved {} tasks to {}",
            document.tasks.len(),
            self.path.display()
        );
        Ok(())
    }

    fn load(&self) -> Option<TaskStoreDocument> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No task store at {}", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Could not read task store {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<TaskStoreDocument>(&content) {
            Ok(document) => {
                debug!(
                    "Loaded {} tasks for '{}' from {}",
                    document.tasks.len(),
                    document.workflow_name,
                    self.path.display()
                );
                Some(document)
            }
            Err(e) => {
                warn!(
                    "Ignoring corrupt task store {}: {}",
                    self.path.display(),
                    e
                );
                None
            }
        }
    }

    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Deleted task store: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.write_error(e)),
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::{assign_task_ids, FlattenedTask};
    use tempfile::tempdir;

    fn document() -> TaskStoreDocument {
        let mut tasks = vec![
            FlattenedTask::new("Build", "cargo build", "release", "build"),
            FlattenedTask::new("Tag", "git tag", "release", "tag"),
        ];
        assign_task_ids(&mut tasks);
        TaskStoreDocument::new("release", tasks)
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("nested/state/tasks.json");
        let store = JsonFileStore::new(&path);

        store.save(&document()).unwrap();

        assert!(path.exists());
        assert!(!store.temp_path().exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.workflow_name, "release");
        assert_eq!(loaded.tasks, document().tasks);
    }

    #[test]
    fn test_save_overwrites() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("tasks.json"));

        store.save(&document()).unwrap();
        store
            .save(&TaskStoreDocument::new("other", Vec::new()))
            .unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.workflow_name, "other");
        assert!(loaded.tasks.is_empty());
    }

    #[test]
    fn test_load_missing_is_none() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("absent.json"));
        assert!(store.load().is_none());
    }

    #[test]
    fn test_load_corrupt_is_none() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("tasks.json");

        fs::write(&path, "{ not json").unwrap();
        assert!(JsonFileStore::new(&path).load().is_none());

        fs::write(&path, r#"{"workflowName": "w", "tasks": "nope"}"#).unwrap();
        assert!(JsonFileStore::new(&path).load().is_none());
    }

    #[test]
    fn test_corrupt_file_still_exists() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("tasks.json");
        let store = JsonFileStore::new(&path);
        assert!(!store.exists());

        fs::write(&path, "{ not json").unwrap();
        assert!(store.load().is_none());
        assert!(store.exists());

        store.delete().unwrap();
        assert!(!store.exists());
    }

    #[test]
    fn test_persisted_format() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("tasks.json");
        JsonFileStore::new(&path).save(&document()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["workflowName"], "release");
        assert_eq!(raw["tasks"][1]["id"], "T002");
        assert_eq!(raw["tasks"][1]["sourceStep"], "tag");
        assert_eq!(raw["tasks"][1]["completed"], false);
    }

    #[test]
    fn test_set_completed_persists() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("tasks.json"));
        store.save(&document()).unwrap();

        store.set_completed("T002", true).unwrap();

        let reloaded = JsonFileStore::new(store.path()).load().unwrap();
        assert!(!reloaded.tasks[0].completed);
        assert!(reloaded.tasks[1].completed);
    }

    #[test]
    fn test_delete() {
        let temp_dir = tempdir().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("tasks.json"));
        store.save(&document()).unwrap();

        store.delete().unwrap();
        assert!(!store.path().exists());

        // Deleting again is fine
        assert!(store.delete().is_ok());
    }
}
