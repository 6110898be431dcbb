//! Observable state.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::warn;

use crate::key::EventKey;

/// Called with the new value whenever the observed key is set.
pub type StoreCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Key/value state with change callbacks.
///
/// Callbacks run synchronously on the setting thread, after the value is
/// stored and outside any lock, so they may read or write the store.
#[derive(Default)]
pub struct Store {
    values: RwLock<HashMap<EventKey, Value>>,
    listeners: RwLock<HashMap<EventKey, Vec<StoreCallback>>>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("values", &self.values)
            .finish_non_exhaustive()
    }
}

impl Store {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one value.
    #[must_use]
    pub fn get(&self, key: impl Into<EventKey>) -> Option<Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.into())
            .cloned()
    }

    /// Every value.
    #[must_use]
    pub fn get_all(&self) -> HashMap<EventKey, Value> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Set one value and notify its callbacks.
    pub fn set(&self, key: impl Into<EventKey>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), value.clone());
        for callback in self.callbacks(&key) {
            callback(&value);
        }
    }

    /// Set every entry of a JSON object, notifying per key.
    pub fn set_many(&self, values: serde_json::Map<String, Value>) {
        for (key, value) in values {
            self.set(key, value);
        }
    }

    /// Observe `key`. With `force`, the callback also runs immediately with
    /// the current value (`null` when unset).
    pub fn on(&self, key: impl Into<EventKey>, callback: StoreCallback, force: bool) {
        let key = key.into();
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .push(Arc::clone(&callback));
        if force {
            callback(&self.get(key).unwrap_or(Value::Null));
        }
    }

    /// Stop observing `key`: one callback (compared by identity), or all of
    /// them when `callback` is `None`.
    pub fn off(&self, key: impl Into<EventKey>, callback: Option<&StoreCallback>) {
        let key = key.into();
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let Some(registered) = listeners.get_mut(&key) else {
            warn!(key = %key, "store.off: key has no callback");
            return;
        };
        match callback {
            Some(callback) => registered.retain(|cb| !Arc::ptr_eq(cb, callback)),
            None => {
                listeners.remove(&key);
            },
        }
    }

    /// Whether `key` has any callback.
    #[must_use]
    pub fn has(&self, key: impl Into<EventKey>) -> bool {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.into())
            .is_some_and(|callbacks| !callbacks.is_empty())
    }

    fn callbacks(&self, key: &EventKey) -> Vec<StoreCallback> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (StoreCallback, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: StoreCallback = Arc::new(move |value: &Value| {
            sink.lock().unwrap().push(value.clone());
        });
        (callback, seen)
    }

    #[test]
    fn set_notifies_observers() {
        let store = Store::new();
        let (callback, seen) = recorder();
        store.on("lang", callback, false);
        store.set("lang", "en");
        store.set("lang", "zh");
        assert_eq!(*seen.lock().unwrap(), vec![Value::from("en"), Value::from("zh")]);
        assert_eq!(store.get("lang"), Some(Value::from("zh")));
    }

    #[test]
    fn force_runs_callback_immediately() {
        let store = Store::new();
        store.set("user", "ana");
        let (callback, seen) = recorder();
        store.on("user", callback, true);
        assert_eq!(*seen.lock().unwrap(), vec![Value::from("ana")]);
    }

    #[test]
    fn off_removes_one_or_all() {
        let store = Store::new();
        let (a, seen_a) = recorder();
        let (b, seen_b) = recorder();
        store.on("k", Arc::clone(&a), false);
        store.on("k", b, false);
        store.off("k", Some(&a));
        store.set("k", 1);
        assert!(seen_a.lock().unwrap().is_empty());
        assert_eq!(seen_b.lock().unwrap().len(), 1);

        store.off("k", None);
        assert!(!store.has("k"));
    }

    #[test]
    fn symbol_keys_do_not_clash_with_names() {
        let store = Store::new();
        let key = EventKey::symbol();
        store.set(key.clone(), true);
        store.set_many(serde_json::json!({ "a": 1, "b": 2 }).as_object().cloned().unwrap());
        assert_eq!(store.get(key), Some(Value::Bool(true)));
        assert_eq!(store.get_all().len(), 3);
    }
}
