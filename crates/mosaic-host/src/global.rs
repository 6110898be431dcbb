//! The host global object.
//!
//! [`MemoryGlobal`] keeps a property table, an event-listener table and a
//! virtual-clock timer queue. Timers only fire when the embedder calls
//! [`MemoryGlobal::advance`], which keeps tests deterministic.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::scope::Scope;
use crate::value::{HostFunction, HostValue, ScopeRef};

/// Keys under which the global object refers to itself.
pub const SELF_KEYS: [&str; 4] = ["top", "window", "self", "globalThis"];

/// Builtin function names served by [`MemoryGlobal`].
const BUILTINS: [&str; 6] = [
    "addEventListener",
    "removeEventListener",
    "setTimeout",
    "setInterval",
    "clearTimeout",
    "clearInterval",
];

/// An event dispatched on the global object.
#[derive(Debug, Clone, PartialEq)]
pub struct HostEvent {
    /// Event type (`popstate`, `hashchange`, ...).
    pub kind: String,
    /// Location at dispatch time.
    pub url: String,
    /// History state attached to the event.
    pub state: HostValue,
}

impl HostEvent {
    /// Create an event.
    pub fn new(kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            url: url.into(),
            state: HostValue::Null,
        }
    }

    /// Attach history state.
    #[must_use]
    pub fn with_state(mut self, state: HostValue) -> Self {
        self.state = state;
        self
    }

    /// The event as the value passed to listeners.
    #[must_use]
    pub fn to_value(&self) -> HostValue {
        HostValue::object([
            ("type", HostValue::from(self.kind.as_str())),
            ("url", HostValue::from(self.url.as_str())),
            ("state", self.state.clone()),
        ])
    }
}

/// Handle returned by timer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub u32);

/// Hook consulted before listeners are added to or removed from the global.
///
/// Returning `true` means the interceptor took ownership of the call and the
/// global must not register (or unregister) the listener itself.
pub trait ListenerInterceptor: Send + Sync {
    /// Called before `addEventListener`.
    fn intercept_add(&self, event: &str, listener: &HostFunction) -> bool;

    /// Called before `removeEventListener`.
    fn intercept_remove(&self, event: &str, listener: &HostFunction) -> bool;
}

/// The single real global object of the host environment.
#[async_trait]
pub trait HostGlobal: Scope {
    /// Whether the environment can intercept property access on a proxy
    /// object. Sandboxes are disabled when it cannot.
    fn supports_interception(&self) -> bool {
        true
    }

    /// Register a listener.
    fn add_event_listener(&self, event: &str, listener: HostFunction);

    /// Unregister a listener. Unknown listeners are ignored.
    fn remove_event_listener(&self, event: &str, listener: &HostFunction);

    /// Number of listeners registered directly on the global for `event`.
    fn listener_count(&self, event: &str) -> usize;

    /// Invoke every listener registered for `event.kind`.
    async fn dispatch_event(&self, event: &HostEvent);

    /// Schedule a one-shot callback.
    fn set_timeout(&self, callback: HostFunction, delay: Duration) -> TimerHandle;

    /// Schedule a repeating callback.
    fn set_interval(&self, callback: HostFunction, period: Duration) -> TimerHandle;

    /// Cancel a one-shot timer.
    fn clear_timeout(&self, handle: TimerHandle);

    /// Cancel a repeating timer.
    fn clear_interval(&self, handle: TimerHandle);

    /// Install or remove the listener interceptor.
    fn set_listener_interceptor(&self, interceptor: Option<Arc<dyn ListenerInterceptor>>);
}

struct Timer {
    due: Duration,
    period: Option<Duration>,
    callback: HostFunction,
}

#[derive(Default)]
struct TimerQueue {
    now: Duration,
    next_id: u32,
    entries: BTreeMap<TimerHandle, Timer>,
}

/// In-memory [`HostGlobal`].
pub struct MemoryGlobal {
    me: Weak<MemoryGlobal>,
    interception: bool,
    values: RwLock<BTreeMap<String, HostValue>>,
    listeners: Mutex<Vec<(String, HostFunction)>>,
    timers: Mutex<TimerQueue>,
    interceptor: RwLock<Option<Arc<dyn ListenerInterceptor>>>,
}

impl MemoryGlobal {
    /// Create an empty global object.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::build(true)
    }

    /// Create a global object on which sandboxes cannot be built.
    #[must_use]
    pub fn without_interception() -> Arc<Self> {
        Self::build(false)
    }

    fn build(interception: bool) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            interception,
            values: RwLock::new(BTreeMap::new()),
            listeners: Mutex::new(Vec::new()),
            timers: Mutex::new(TimerQueue::default()),
            interceptor: RwLock::new(None),
        })
    }

    /// Seed properties, returning `self` for chaining in fixtures.
    pub fn with_values<K, I>(self: Arc<Self>, values: I) -> Arc<Self>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, HostValue)>,
    {
        for (key, value) in values {
            self.set(&key.into(), value);
        }
        self
    }

    /// A snapshot of every own property.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, HostValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of timers and intervals still scheduled.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Move the virtual clock forward and run every callback that became due.
    ///
    /// Each timer fires at most once per call. Returns the number of callbacks run.
    pub async fn advance(&self, by: Duration) -> usize {
        let due: Vec<(TimerHandle, HostFunction)> = {
            let mut queue = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            queue.now = queue.now.saturating_add(by);
            let now = queue.now;
            let mut fired = Vec::new();
            let mut finished = Vec::new();
            for (handle, timer) in &mut queue.entries {
                if timer.due > now {
                    continue;
                }
                fired.push((*handle, timer.callback.clone()));
                match timer.period {
                    Some(period) => timer.due = now.saturating_add(period),
                    None => finished.push(*handle),
                }
            }
            for handle in finished {
                queue.entries.remove(&handle);
            }
            fired
        };

        let count = due.len();
        for (handle, callback) in due {
            if let Err(e) = callback.call(Vec::new()).await {
                warn!(timer = handle.0, error = %e, "Timer callback failed");
            }
        }
        count
    }

    fn schedule(&self, callback: HostFunction, delay: Duration, period: Option<Duration>) -> TimerHandle {
        let mut queue = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        queue.next_id = queue.next_id.wrapping_add(1);
        let handle = TimerHandle(queue.next_id);
        let due = queue.now.saturating_add(delay);
        queue.entries.insert(
            handle,
            Timer {
                due,
                period,
                callback,
            },
        );
        handle
    }

    fn cancel(&self, handle: TimerHandle) {
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .remove(&handle);
    }

    fn interceptor(&self) -> Option<Arc<dyn ListenerInterceptor>> {
        self.interceptor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn self_ref(&self) -> Option<ScopeRef> {
        let me: Arc<dyn Scope> = self.me.upgrade()?;
        Some(ScopeRef::new(me))
    }

    /// Builtin functions delegate back into this global through a weak handle.
    fn builtin(&self, key: &str) -> Option<HostFunction> {
        if !BUILTINS.contains(&key) {
            return None;
        }
        let me = self.me.clone();
        let name = key.to_string();
        Some(HostFunction::sync(key, move |args| {
            let Some(global) = me.upgrade() else {
                return Ok(HostValue::Undefined);
            };
            Ok(global.call_builtin(&name, &args.args))
        }))
    }

    fn call_builtin(&self, name: &str, args: &[HostValue]) -> HostValue {
        let event = args.first().and_then(HostValue::as_str).unwrap_or_default();
        let callback = args.get(1).and_then(HostValue::as_function).cloned();
        match name {
            "addEventListener" => {
                if let Some(listener) = callback {
                    self.add_event_listener(event, listener);
                }
                HostValue::Undefined
            },
            "removeEventListener" => {
                if let Some(listener) = callback {
                    self.remove_event_listener(event, &listener);
                }
                HostValue::Undefined
            },
            "setTimeout" | "setInterval" => {
                let Some(callback) = args.first().and_then(HostValue::as_function).cloned() else {
                    return HostValue::Undefined;
                };
                let delay = duration_arg(args.get(1));
                let handle = if name == "setTimeout" {
                    self.set_timeout(callback, delay)
                } else {
                    self.set_interval(callback, delay)
                };
                HostValue::Number(f64::from(handle.0))
            },
            "clearTimeout" | "clearInterval" => {
                if let Some(handle) = handle_arg(args.first()) {
                    self.cancel(handle);
                }
                HostValue::Undefined
            },
            _ => HostValue::Undefined,
        }
    }
}

/// Convert a numeric timer argument (milliseconds) into a duration.
///
/// Delays too large to represent saturate to [`Duration::MAX`].
#[must_use]
pub fn duration_arg(value: Option<&HostValue>) -> Duration {
    match value {
        Some(HostValue::Number(ms)) if ms.is_finite() && *ms > 0.0 => {
            Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
        },
        _ => Duration::ZERO,
    }
}

/// Convert a numeric timer handle argument back into a [`TimerHandle`].
#[must_use]
pub fn handle_arg(value: Option<&HostValue>) -> Option<TimerHandle> {
    match value {
        Some(HostValue::Number(n)) if n.is_finite() && *n >= 0.0 && *n <= f64::from(u32::MAX) => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            Some(TimerHandle(*n as u32))
        },
        _ => None,
    }
}

impl Scope for MemoryGlobal {
    fn get(&self, key: &str) -> HostValue {
        if let Some(value) = self
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return value.clone();
        }
        if SELF_KEYS.contains(&key) {
            return self.self_ref().map_or(HostValue::Undefined, HostValue::Scope);
        }
        self.builtin(key)
            .map_or(HostValue::Undefined, HostValue::Function)
    }

    fn set(&self, key: &str, value: HostValue) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn has(&self, key: &str) -> bool {
        SELF_KEYS.contains(&key)
            || BUILTINS.contains(&key)
            || self
                .values
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains_key(key)
    }

    fn has_own(&self, key: &str) -> bool {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn delete(&self, key: &str) -> bool {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    fn keys(&self) -> Vec<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HostGlobal for MemoryGlobal {
    fn supports_interception(&self) -> bool {
        self.interception
    }

    fn add_event_listener(&self, event: &str, listener: HostFunction) {
        if let Some(interceptor) = self.interceptor()
            && interceptor.intercept_add(event, &listener)
        {
            debug!(event, listener = listener.name(), "Listener captured by interceptor");
            return;
        }
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((event.to_string(), listener));
    }

    fn remove_event_listener(&self, event: &str, listener: &HostFunction) {
        if let Some(interceptor) = self.interceptor()
            && interceptor.intercept_remove(event, listener)
        {
            return;
        }
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = listeners
            .iter()
            .position(|(name, registered)| name == event && registered == listener)
        {
            listeners.remove(pos);
        }
    }

    fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }

    async fn dispatch_event(&self, event: &HostEvent) {
        let targets: Vec<HostFunction> = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(name, _)| *name == event.kind)
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in targets {
            if let Err(e) = listener.call(vec![event.to_value()]).await {
                warn!(event = %event.kind, error = %e, "Event listener failed");
            }
        }
    }

    fn set_timeout(&self, callback: HostFunction, delay: Duration) -> TimerHandle {
        self.schedule(callback, delay, None)
    }

    fn set_interval(&self, callback: HostFunction, period: Duration) -> TimerHandle {
        self.schedule(callback, period, Some(period))
    }

    fn clear_timeout(&self, handle: TimerHandle) {
        self.cancel(handle);
    }

    fn clear_interval(&self, handle: TimerHandle) {
        self.cancel(handle);
    }

    fn set_listener_interceptor(&self, interceptor: Option<Arc<dyn ListenerInterceptor>>) {
        *self.interceptor.write().unwrap_or_else(PoisonError::into_inner) = interceptor;
    }
}
