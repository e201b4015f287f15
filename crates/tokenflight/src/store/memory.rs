//! In-process storage backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokenflight_core::KeyValueStorage;
use tokenflight_core::error::StorageError;

use crate::sync::MutexExt;

/// Map-backed storage. Clones share the same entries, so several
/// coordinators built from clones behave like contexts of one origin.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.lock_or_recover().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock_or_recover().contains_key(key)
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock_or_recover().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock_or_recover()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock_or_recover().remove(key);
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StorageError> {
        let mut entries = self.entries.lock_or_recover();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
