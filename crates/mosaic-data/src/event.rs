//! Publish/subscribe.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::warn;

use crate::key::EventKey;

/// Called with the emitted arguments.
pub type EventCallback = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// Named events with any number of subscribers.
#[derive(Default)]
pub struct EventEmitter {
    listeners: RwLock<HashMap<EventKey, Vec<EventCallback>>>,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("EventEmitter")
            .field("events", &listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EventEmitter {
    /// Create an emitter with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Call every subscriber of `key` with `args`. Emitting an event nobody
    /// listens to is logged.
    pub fn emit(&self, key: impl Into<EventKey>, args: &[Value]) {
        let key = key.into();
        let callbacks = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .unwrap_or_default();
        if callbacks.is_empty() {
            warn!(key = %key, "event.emit: no callback is called");
            return;
        }
        for callback in callbacks {
            callback(args);
        }
    }

    /// Subscribe to `key`.
    pub fn on(&self, key: impl Into<EventKey>, callback: EventCallback) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.into())
            .or_default()
            .push(callback);
    }

    /// Unsubscribe one callback (by identity), or every callback of `key`.
    pub fn off(&self, key: impl Into<EventKey>, callback: Option<&EventCallback>) {
        let key = key.into();
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let Some(registered) = listeners.get_mut(&key) else {
            warn!(key = %key, "event.off: key has no callback");
            return;
        };
        match callback {
            Some(callback) => registered.retain(|cb| !Arc::ptr_eq(cb, callback)),
            None => {
                listeners.remove(&key);
            },
        }
    }

    /// Whether `key` has any subscriber.
    #[must_use]
    pub fn has(&self, key: impl Into<EventKey>) -> bool {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key.into())
            .is_some_and(|callbacks| !callbacks.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn emit_reaches_every_subscriber() {
        let emitter = EventEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..2 {
            let hits = Arc::clone(&hits);
            emitter.on(
                "refresh",
                Arc::new(move |args: &[Value]| {
                    assert_eq!(args, [Value::from(7)]);
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        emitter.emit("refresh", &[Value::from(7)]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn off_and_has() {
        let emitter = EventEmitter::new();
        let callback: EventCallback = Arc::new(|_: &[Value]| {});
        let key = EventKey::symbol();
        emitter.on(key.clone(), Arc::clone(&callback));
        assert!(emitter.has(key.clone()));
        assert!(!emitter.has("other"));
        emitter.off(key.clone(), Some(&callback));
        assert!(!emitter.has(key.clone()));
        emitter.emit(key, &[]);
    }
}
