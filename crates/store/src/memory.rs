//! In-memory key-value store backed by a `HashMap` behind a `Mutex`.

use memochat_types::{KeyValueStorage, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// An in-memory [`KeyValueStorage`] implementation for testing and ephemeral use.
pub struct InMemoryStorage {
    data: Mutex<HashMap<String, String>>,
}

impl InMemoryStorage {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a store pre-populated with a single entry.
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let store = Self::new();
        store
            .data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        store
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStorage for InMemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.data
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}
