//! Mock implementations of the host seams.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mosaic_host::{
    Fetch, FetchError, HostValue, ModuleNamespace, ScopeRef, ScriptEngine, ScriptError,
};

/// Mock implementation of [`Fetch`].
///
/// Serves canned bodies by URL, counts requests per URL and can inject
/// latency or failures. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    responses: Arc<Mutex<HashMap<String, Result<String, String>>>>,
    counts: Arc<Mutex<HashMap<String, usize>>>,
    total: Arc<AtomicUsize>,
    delay: Option<Duration>,
}

impl MockFetcher {
    /// Create a fetcher that knows no URLs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    #[must_use]
    pub fn with_response(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.respond(url, body);
        self
    }

    /// Fail every request for `url`.
    #[must_use]
    pub fn with_failure(self, url: impl Into<String>, message: impl Into<String>) -> Self {
        if let Ok(mut guard) = self.responses.lock() {
            guard.insert(url.into(), Err(message.into()));
        }
        self
    }

    /// Delay every response.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Serve `body` for `url` (after construction).
    pub fn respond(&self, url: impl Into<String>, body: impl Into<String>) {
        if let Ok(mut guard) = self.responses.lock() {
            guard.insert(url.into(), Ok(body.into()));
        }
    }

    /// How many times `url` was requested.
    #[must_use]
    pub fn fetch_count(&self, url: &str) -> usize {
        self.counts
            .lock()
            .map(|guard| guard.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total number of requests.
    #[must_use]
    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetch for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if let Ok(mut guard) = self.counts.lock() {
            let count = guard.entry(url.to_string()).or_insert(0);
            *count = count.saturating_add(1);
        }
        self.total.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self
            .responses
            .lock()
            .ok()
            .and_then(|guard| guard.get(url).cloned());
        match response {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(FetchError::new(url, message)),
            None => Err(FetchError::new(url, "404 Not Found")),
        }
    }
}

/// Behaviour run when a matching program is evaluated.
pub type ScriptBehaviour = Arc<dyn Fn(&ScopeRef) -> Result<(), ScriptError> + Send + Sync>;

/// Mock implementation of [`ScriptEngine`].
///
/// Program text is matched against registered markers (substring match, first
/// registration wins) and the associated Rust closure runs against the scope
/// the program was evaluated in. Unmatched programs evaluate to nothing.
#[derive(Clone, Default)]
pub struct MockEngine {
    scripts: Arc<Mutex<Vec<(String, ScriptBehaviour)>>>,
    modules: Arc<Mutex<HashMap<String, ModuleNamespace>>>,
    evaluated: Arc<Mutex<Vec<String>>>,
    imported: Arc<Mutex<Vec<String>>>,
    dynamic_import: bool,
}

impl MockEngine {
    /// Create an engine without dynamic-import support.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable dynamic import.
    #[must_use]
    pub fn with_dynamic_import(mut self) -> Self {
        self.dynamic_import = true;
        self
    }

    /// Run `behaviour` for programs containing `marker`.
    #[must_use]
    pub fn on_script<F>(self, marker: impl Into<String>, behaviour: F) -> Self
    where
        F: Fn(&ScopeRef) -> Result<(), ScriptError> + Send + Sync + 'static,
    {
        if let Ok(mut guard) = self.scripts.lock() {
            guard.push((marker.into(), Arc::new(behaviour)));
        }
        self
    }

    /// Programs containing `marker` assign `value` to the global `key`.
    #[must_use]
    pub fn assigning(self, marker: impl Into<String>, key: &str, value: HostValue) -> Self {
        let key = key.to_string();
        self.on_script(marker, move |scope| {
            scope.set(&key, value.clone());
            Ok(())
        })
    }

    /// Programs containing `marker` throw `message`.
    #[must_use]
    pub fn throwing(self, marker: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        self.on_script(marker, move |_| Err(ScriptError::Evaluation(message.clone())))
    }

    /// Serve `namespace` when `url` is imported.
    #[must_use]
    pub fn with_module(self, url: impl Into<String>, namespace: ModuleNamespace) -> Self {
        if let Ok(mut guard) = self.modules.lock() {
            guard.insert(url.into(), namespace);
        }
        self
    }

    /// Every program evaluated so far, in order.
    #[must_use]
    pub fn evaluated(&self) -> Vec<String> {
        self.evaluated
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Every module URL imported so far, in order.
    #[must_use]
    pub fn imported(&self) -> Vec<String> {
        self.imported
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn behaviour_for(&self, source: &str) -> Option<ScriptBehaviour> {
        self.scripts.lock().ok().and_then(|guard| {
            guard
                .iter()
                .find(|(marker, _)| source.contains(marker.as_str()))
                .map(|(_, behaviour)| Arc::clone(behaviour))
        })
    }
}

#[async_trait]
impl ScriptEngine for MockEngine {
    fn evaluate(&self, source: &str, scope: ScopeRef) -> Result<(), ScriptError> {
        if let Ok(mut guard) = self.evaluated.lock() {
            guard.push(source.to_string());
        }
        match self.behaviour_for(source) {
            Some(behaviour) => behaviour(&scope),
            None => Ok(()),
        }
    }

    fn supports_dynamic_import(&self) -> bool {
        self.dynamic_import
    }

    async fn import_module(&self, url: &str) -> Result<ModuleNamespace, ScriptError> {
        if !self.dynamic_import {
            return Err(ScriptError::UnsupportedImport);
        }
        if let Ok(mut guard) = self.imported.lock() {
            guard.push(url.to_string());
        }
        self.modules
            .lock()
            .ok()
            .and_then(|guard| guard.get(url).cloned())
            .ok_or_else(|| ScriptError::Import {
                url: url.to_string(),
                message: "module not found".to_string(),
            })
    }
}
