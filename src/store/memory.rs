//! In-Memory Store
//!
//! Holds the document in the current process only. Useful for tests and
//! for embedding the driver where nothing should touch the disk.

use std::cell::RefCell;

use super::{TaskStore, TaskStoreDocument};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    document: RefCell<Option<TaskStoreDocument>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.document.borrow().is_none()
    }
}

impl TaskStore for MemoryTaskStore {
    fn save(&self, document: &TaskStoreDocument) -> Result<()> {
        *self.document.borrow_mut() = Some(document.clone());
        Ok(())
    }

    fn load(&self) -> Option<TaskStoreDocument> {
        self.document.borrow().clone()
    }

    fn exists(&self) -> bool {
        !self.is_empty()
    }

    fn delete(&self) -> Result<()> {
        self.document.borrow_mut().take();
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory task store".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_lifecycle() {
        let store = MemoryTaskStore::new();
        assert!(store.is_empty());
        assert!(!store.exists());
        assert!(store.load().is_none());

        store.save(&TaskStoreDocument::new("w", Vec::new())).unwrap();
        assert!(!store.is_empty());
        assert!(store.exists());
        assert_eq!(store.load().unwrap().workflow_name, "w");

        store.delete().unwrap();
        assert!(store.is_empty());
        assert!(store.delete().is_ok());
    }
}
