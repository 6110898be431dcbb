//! The sandbox scope and its bookkeeping.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use tracing::{debug, error, warn};

use mosaic_host::global::{SELF_KEYS, duration_arg};
use mosaic_host::{HostFunction, HostGlobal, HostValue, Scope, ScopeRef, ScriptEngine};

use crate::error::SandboxResult;

/// Functions the sandbox serves its own wrappers for.
const WRAPPED: [&str; 4] = [
    "addEventListener",
    "removeEventListener",
    "setTimeout",
    "setInterval",
];

/// Sandbox construction options.
#[derive(Debug, Clone, Default)]
pub struct SandboxOptions {
    /// Keep writes inside the sandbox instead of mirroring them onto the host
    /// global. Needed when several sandboxes are alive at once.
    pub multi_mode: bool,
    /// Values served to the application ahead of the host global.
    pub injection: BTreeMap<String, HostValue>,
}

impl SandboxOptions {
    /// Enable multi-instance mode.
    #[must_use]
    pub fn multi_mode(mut self) -> Self {
        self.multi_mode = true;
        self
    }

    /// Inject a value.
    #[must_use]
    pub fn inject(mut self, key: impl Into<String>, value: HostValue) -> Self {
        self.injection.insert(key.into(), value);
        self
    }
}

/// Everything a sandbox must undo at teardown.
#[derive(Debug, Clone, Default)]
pub struct SandboxState {
    /// Properties that did not exist on the host global, with the value first written.
    pub added: BTreeMap<String, HostValue>,
    /// Host values overwritten through the sandbox. `None` marks a builtin
    /// that was not an own property and must be deleted rather than restored.
    pub originals: BTreeMap<String, Option<HostValue>>,
    /// Listeners registered through the sandbox.
    pub listeners: Vec<(String, HostFunction)>,
    /// Pending one-shot timers.
    pub timeouts: Vec<mosaic_host::TimerHandle>,
    /// Pending intervals.
    pub intervals: Vec<mosaic_host::TimerHandle>,
}

impl SandboxState {
    /// Whether there is nothing to undo.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty()
            && self.originals.is_empty()
            && self.listeners.is_empty()
            && self.timeouts.is_empty()
            && self.intervals.is_empty()
    }
}

/// An emulated global object for one application.
pub struct Sandbox {
    me: Weak<Sandbox>,
    host: Arc<dyn HostGlobal>,
    engine: Arc<dyn ScriptEngine>,
    options: SandboxOptions,
    disabled: bool,
    store: RwLock<BTreeMap<String, HostValue>>,
    state: Mutex<SandboxState>,
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("multi_mode", &self.options.multi_mode)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl Sandbox {
    /// Create a sandbox over `host`.
    ///
    /// If the host cannot intercept property access the sandbox is created
    /// disabled and every operation silently does nothing.
    #[must_use]
    pub fn new(
        host: Arc<dyn HostGlobal>,
        engine: Arc<dyn ScriptEngine>,
        options: SandboxOptions,
    ) -> Arc<Self> {
        let disabled = !host.supports_interception();
        if disabled {
            warn!("Proxy sandbox is not supported by the current host, isolation disabled");
        }
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            host,
            engine,
            options,
            disabled,
            store: RwLock::new(BTreeMap::new()),
            state: Mutex::new(SandboxState::default()),
        })
    }

    /// Whether isolation is unavailable.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Whether writes stay inside the sandbox.
    #[must_use]
    pub fn is_multi_mode(&self) -> bool {
        self.options.multi_mode
    }

    /// This sandbox as a scope handle.
    ///
    /// Returns `None` only while the sandbox is being dropped.
    #[must_use]
    pub fn scope(&self) -> Option<ScopeRef> {
        let me: Arc<dyn Scope> = self.me.upgrade()?;
        Some(ScopeRef::new(me))
    }

    /// A copy of the current bookkeeping.
    #[must_use]
    pub fn state(&self) -> SandboxState {
        self.lock_state().clone()
    }

    /// Names of properties added through this sandbox.
    #[must_use]
    pub fn added_properties(&self) -> Vec<String> {
        self.lock_state().added.keys().cloned().collect()
    }

    fn lock_state(&self) -> MutexGuard<'_, SandboxState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn host_scope(&self) -> ScopeRef {
        let host: Arc<dyn Scope> = self.host.clone();
        ScopeRef::new(host)
    }

    /// Run a program with this sandbox as its global object.
    ///
    /// Disabled sandboxes do nothing.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Execution`](crate::SandboxError::Execution)
    /// with whatever the program threw, after logging it.
    pub fn execute(&self, source: &str) -> SandboxResult<()> {
        if self.disabled {
            return Ok(());
        }
        let Some(scope) = self.scope() else {
            return Ok(());
        };
        self.engine.evaluate(source, scope).map_err(|e| {
            error!(error = %e, "Error occurred while executing script in sandbox");
            e.into()
        })
    }

    /// Undo every recorded side effect on the host global.
    ///
    /// Removes listeners, cancels timers, restores overwritten values and
    /// deletes added properties. The bookkeeping is drained, so calling this
    /// again is a no-op.
    pub fn clear(&self) {
        if self.disabled {
            return;
        }
        let state = std::mem::take(&mut *self.lock_state());
        if state.is_empty() {
            return;
        }
        debug!(
            listeners = state.listeners.len(),
            timers = state.timeouts.len().saturating_add(state.intervals.len()),
            originals = state.originals.len(),
            added = state.added.len(),
            "Clearing sandbox"
        );

        for (event, listener) in &state.listeners {
            self.host.remove_event_listener(event, listener);
        }
        for handle in state.timeouts {
            self.host.clear_timeout(handle);
        }
        for handle in state.intervals {
            self.host.clear_interval(handle);
        }
        for (key, original) in state.originals {
            match original {
                Some(value) => self.host.set(&key, value),
                None => {
                    self.host.delete(&key);
                },
            }
        }
        if !self.options.multi_mode {
            for key in state.added.keys() {
                self.host.delete(key);
            }
        }
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn wrapper(&self, key: &str) -> Option<HostFunction> {
        if !WRAPPED.contains(&key) {
            return None;
        }
        let me = self.me.clone();
        let name = key.to_string();
        Some(HostFunction::sync(key, move |args| {
            let Some(sandbox) = me.upgrade() else {
                return Ok(HostValue::Undefined);
            };
            Ok(sandbox.call_wrapper(&name, &args.args))
        }))
    }

    fn call_wrapper(&self, name: &str, args: &[HostValue]) -> HostValue {
        match name {
            "addEventListener" | "removeEventListener" => {
                let event = args.first().and_then(HostValue::as_str).unwrap_or_default();
                let Some(listener) = args.get(1).and_then(HostValue::as_function).cloned() else {
                    return HostValue::Undefined;
                };
                if name == "addEventListener" {
                    self.lock_state()
                        .listeners
                        .push((event.to_string(), listener.clone()));
                    self.host.add_event_listener(event, listener);
                } else {
                    {
                        let mut state = self.lock_state();
                        if let Some(pos) = state
                            .listeners
                            .iter()
                            .position(|(e, l)| e == event && *l == listener)
                        {
                            state.listeners.remove(pos);
                        }
                    }
                    self.host.remove_event_listener(event, &listener);
                }
                HostValue::Undefined
            },
            "setTimeout" | "setInterval" => {
                let Some(callback) = args.first().and_then(HostValue::as_function).cloned() else {
                    return HostValue::Undefined;
                };
                let delay = duration_arg(args.get(1));
                let handle = if name == "setTimeout" {
                    let handle = self.host.set_timeout(callback, delay);
                    self.lock_state().timeouts.push(handle);
                    handle
                } else {
                    let handle = self.host.set_interval(callback, delay);
                    self.lock_state().intervals.push(handle);
                    handle
                };
                HostValue::Number(f64::from(handle.0))
            },
            _ => HostValue::Undefined,
        }
    }
}

impl Scope for Sandbox {
    fn get(&self, key: &str) -> HostValue {
        if SELF_KEYS.contains(&key) {
            return self.scope().map_or(HostValue::Undefined, HostValue::Scope);
        }

        if let Some(value) = self
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .filter(|v| !v.is_undefined())
        {
            return value.clone();
        }

        if let Some(wrapper) = self.wrapper(key) {
            return HostValue::Function(wrapper);
        }

        if let Some(injected) = self
            .options
            .injection
            .get(key)
            .filter(|v| !matches!(v, HostValue::Undefined | HostValue::Null))
        {
            return injected.clone();
        }

        let value = self.host.get(key);
        if key == "eval" {
            return value;
        }
        match value {
            HostValue::Function(f) if !f.is_constructor() => {
                HostValue::Function(f.bind_to(self.host_scope()))
            },
            other => other,
        }
    }

    fn set(&self, key: &str, value: HostValue) {
        {
            let mut state = self.lock_state();
            if !self.host.has(key) {
                if !state.added.contains_key(key) {
                    state.added.insert(key.to_string(), value.clone());
                }
            } else if !state.added.contains_key(key) && !state.originals.contains_key(key) {
                let original = self.host.has_own(key).then(|| self.host.get(key));
                state.originals.insert(key.to_string(), original);
            }
        }

        if !self.options.multi_mode {
            self.host.set(key, value.clone());
        }
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value);
    }

    fn has(&self, key: &str) -> bool {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
            || self.host.has(key)
    }

    fn has_own(&self, key: &str) -> bool {
        self.store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    fn delete(&self, key: &str) -> bool {
        let existed = self
            .store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some();
        let was_added = self.lock_state().added.remove(key).is_some();
        if was_added && !self.options.multi_mode {
            self.host.delete(key);
        }
        existed
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .store
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.extend(self.host.keys());
        keys.sort();
        keys.dedup();
        keys
    }
}
