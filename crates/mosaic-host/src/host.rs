//! The host environment bundle.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::document::{Document, Element, ElementId};
use crate::engine::ScriptEngine;
use crate::error::{HostError, HostResult};
use crate::fetch::Fetch;
use crate::global::{HostGlobal, MemoryGlobal};
use crate::history::History;
use crate::value::ScopeRef;

/// Everything the runtime needs from the host page.
#[async_trait]
pub trait Host: Send + Sync {
    /// The real global object.
    fn global(&self) -> Arc<dyn HostGlobal>;

    /// The document.
    fn document(&self) -> &Document;

    /// Session history.
    fn history(&self) -> &History;

    /// The script engine.
    fn engine(&self) -> Arc<dyn ScriptEngine>;

    /// The environment's native network capability, if it has one.
    fn network(&self) -> Option<Arc<dyn Fetch>>;

    /// Attach an element to `<head>` and wait for its `load` or `error` event.
    ///
    /// External scripts are downloaded and executed; external stylesheets are
    /// downloaded; inline scripts execute immediately. The element stays in
    /// the document even when it fails to load.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ElementLoad`] when the element fires `error`.
    async fn append_to_head(&self, element: Element) -> HostResult<ElementId>;
}

/// In-memory [`Host`] for headless embedding and tests.
pub struct MemoryHost {
    global: Arc<MemoryGlobal>,
    document: Document,
    history: History,
    engine: Arc<dyn ScriptEngine>,
    network: Option<Arc<dyn Fetch>>,
}

impl MemoryHost {
    /// Create a host at `location` using `engine` for evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidUrl`] if `location` is not absolute.
    pub fn new(location: &str, engine: Arc<dyn ScriptEngine>) -> HostResult<Self> {
        Self::with_global(MemoryGlobal::new(), location, engine)
    }

    /// Create a host around an existing global object.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidUrl`] if `location` is not absolute.
    pub fn with_global(
        global: Arc<MemoryGlobal>,
        location: &str,
        engine: Arc<dyn ScriptEngine>,
    ) -> HostResult<Self> {
        let history = History::new(global.clone(), location)?;
        Ok(Self {
            global,
            document: Document::new(),
            history,
            engine,
            network: None,
        })
    }

    /// Give the host a native network capability.
    #[must_use]
    pub fn with_network(mut self, network: Arc<dyn Fetch>) -> Self {
        self.network = Some(network);
        self
    }

    /// The concrete global object (for timers and snapshots).
    #[must_use]
    pub fn memory_global(&self) -> &Arc<MemoryGlobal> {
        &self.global
    }

    async fn download(&self, tag: &str, url: &str) -> HostResult<String> {
        let network = self.network.as_ref().ok_or_else(|| HostError::ElementLoad {
            tag: tag.to_string(),
            url: url.to_string(),
            message: "host has no network".to_string(),
        })?;
        network
            .fetch(url)
            .await
            .map_err(|e| HostError::ElementLoad {
                tag: tag.to_string(),
                url: url.to_string(),
                message: e.message,
            })
    }

    fn run(&self, source: &str, origin: &str) {
        let scope = ScopeRef::new(self.global.clone());
        if let Err(e) = self.engine.evaluate(source, scope) {
            warn!(origin, error = %e, "Script threw during execution");
        }
    }
}

#[async_trait]
impl Host for MemoryHost {
    fn global(&self) -> Arc<dyn HostGlobal> {
        self.global.clone()
    }

    fn document(&self) -> &Document {
        &self.document
    }

    fn history(&self) -> &History {
        &self.history
    }

    fn engine(&self) -> Arc<dyn ScriptEngine> {
        Arc::clone(&self.engine)
    }

    fn network(&self) -> Option<Arc<dyn Fetch>> {
        self.network.clone()
    }

    async fn append_to_head(&self, element: Element) -> HostResult<ElementId> {
        let tag = element.tag.clone();
        let src = element.resource_url().map(str::to_string);
        let is_stylesheet = element.is_stylesheet_link();
        let inline = element.text.clone();
        let id = self.document.insert_head(element);
        debug!(tag = %tag, id = id.0, src = ?src, "Element appended to head");

        match (tag.as_str(), src) {
            ("script", Some(url)) => {
                let body = self.download("script", &url).await?;
                self.run(&body, &url);
            },
            ("script", None) => self.run(&inline, "inline"),
            ("link", Some(url)) if is_stylesheet => {
                self.download("link", &url).await?;
            },
            _ => {},
        }
        Ok(id)
    }
}
