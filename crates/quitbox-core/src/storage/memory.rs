//! In-memory store for tests and dry runs.

use std::collections::HashMap;

use super::{KeyValueStore, StoreValue};
use crate::error::StoreError;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, StoreValue>,
    /// When set, every write fails. Lets tests exercise the retry path.
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoreValue>, StoreError> {
        Ok(self.values.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: StoreValue) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::QueryFailed(format!("write to '{key}' rejected")));
        }
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.values.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StoreError> {
        self.values.clear();
        Ok(())
    }
}
