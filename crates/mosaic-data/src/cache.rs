use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::Value;

/// A flat, process-wide key/value namespace.
#[derive(Debug, Default)]
pub struct Cache {
    values: RwLock<HashMap<String, Value>>,
}

impl Cache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Read `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Remove `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }
}
