//! The three loading strategies.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use mosaic_assets::dom::{self, ScriptAttributes};
use mosaic_assets::{AssetRecord, GlobalAssetCache, ResolvedAssets};
use mosaic_host::{Fetch, Host, HostValue, Scope, ScopeRef, ScriptError};
use mosaic_sandbox::Sandbox;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{LoaderError, LoaderResult};
use crate::hooks::{HookSource, LifecycleHooks};

/// How an application's scripts are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// Insert `<script>` elements and let the host run them.
    #[default]
    Script,
    /// Fetch the program text and evaluate it, inside a sandbox if given.
    Fetch,
    /// Import scripts as native modules.
    Import,
}

impl LoadStrategy {
    /// Canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Script => "script",
            Self::Fetch => "fetch",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "script" => Ok(Self::Script),
            "fetch" => Ok(Self::Fetch),
            "import" => Ok(Self::Import),
            other => Err(format!("unknown load strategy: {other}")),
        }
    }
}

/// One load of one application.
#[derive(Debug, Clone, Copy)]
pub struct LoadRequest<'a> {
    /// Application name; inserted elements are owned by it.
    pub app: &'a str,
    /// What to load.
    pub assets: &'a ResolvedAssets,
    /// How to run the scripts.
    pub strategy: LoadStrategy,
    /// Sandbox for the fetch strategy.
    pub sandbox: Option<&'a Arc<Sandbox>>,
    /// Extra attributes for injected scripts.
    pub script_attributes: Option<&'a ScriptAttributes>,
    /// Fetch stylesheets through the shared cache and inline them.
    pub cache_css: bool,
}

impl<'a> LoadRequest<'a> {
    /// A request with no sandbox, attributes or style caching.
    #[must_use]
    pub fn new(app: &'a str, assets: &'a ResolvedAssets, strategy: LoadStrategy) -> Self {
        Self {
            app,
            assets,
            strategy,
            sandbox: None,
            script_attributes: None,
            cache_css: false,
        }
    }

    /// Evaluate inside `sandbox`.
    #[must_use]
    pub fn with_sandbox(mut self, sandbox: Option<&'a Arc<Sandbox>>) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Extra script attributes.
    #[must_use]
    pub fn with_script_attributes(mut self, attributes: Option<&'a ScriptAttributes>) -> Self {
        self.script_attributes = attributes;
        self
    }

    /// Inline stylesheets through the cache.
    #[must_use]
    pub fn with_cached_css(mut self, cache_css: bool) -> Self {
        self.cache_css = cache_css;
        self
    }
}

/// Runs resolved assets and recovers lifecycle hooks.
pub struct Loader {
    host: Arc<dyn Host>,
    cache: Arc<GlobalAssetCache>,
    fetch: Arc<dyn Fetch>,
}

impl fmt::Debug for Loader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Create a loader.
    #[must_use]
    pub fn new(host: Arc<dyn Host>, cache: Arc<GlobalAssetCache>, fetch: Arc<dyn Fetch>) -> Self {
        Self { host, cache, fetch }
    }

    /// Load `request` and return the application's hooks.
    ///
    /// Finding no hooks is not an error: it is logged and empty hooks are
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`LoaderError::AssetLoad`] when a script fails to load or fetch
    /// - [`LoaderError::UnsupportedImport`] for the import strategy on an
    ///   engine without dynamic import
    /// - [`LoaderError::Sandbox`] / [`LoaderError::Script`] when a program throws
    pub async fn load(&self, request: LoadRequest<'_>) -> LoaderResult<LifecycleHooks> {
        info!(app = %request.app, strategy = %request.strategy, "Loading application");
        let hooks = match request.strategy {
            LoadStrategy::Script => self.load_by_script(&request).await?,
            LoadStrategy::Fetch => self.load_by_fetch(&request).await?,
            LoadStrategy::Import => self.load_by_import(&request).await?,
        };
        if hooks.is_empty() {
            error!(
                app = %request.app,
                error = %LoaderError::EmptyLifecycle(request.app.to_string()),
                "Application exported no lifecycle"
            );
        }
        Ok(hooks)
    }

    fn global_scope(&self) -> ScopeRef {
        let global: Arc<dyn Scope> = self.host.global();
        ScopeRef::new(global)
    }

    async fn load_styles(&self, request: &LoadRequest<'_>) {
        let cache = request
            .cache_css
            .then(|| (&*self.cache, &*self.fetch));
        dom::load_and_append_css(&*self.host, &request.assets.styles, request.app, cache).await;
    }

    async fn load_by_script(&self, request: &LoadRequest<'_>) -> LoaderResult<LifecycleHooks> {
        let ((), scripts) = futures::join!(
            self.load_styles(request),
            dom::load_and_append_scripts(
                &*self.host,
                &request.assets.scripts,
                request.app,
                request.script_attributes,
            ),
        );
        scripts?;

        let global = self.global_scope();
        Ok(HookSource::discover(&*global)
            .map(|source| source.take(&*global))
            .unwrap_or_default())
    }

    async fn load_by_fetch(&self, request: &LoadRequest<'_>) -> LoaderResult<LifecycleHooks> {
        self.load_styles(request).await;
        let texts = self
            .cache
            .fetch_scripts(&request.assets.scripts, &*self.fetch)
            .await?;

        let sandbox = request.sandbox.filter(|sandbox| !sandbox.is_disabled());
        let scope = match sandbox.and_then(|sandbox| sandbox.scope()) {
            Some(scope) => scope,
            None => self.global_scope(),
        };

        let mut exported = None;
        let last = texts.len().saturating_sub(1);
        for (index, text) in texts.iter().enumerate() {
            let before = (index == last).then(|| scope.keys().into_iter().collect::<BTreeSet<_>>());
            match sandbox {
                Some(sandbox) => sandbox.execute(text)?,
                None => self.host.engine().evaluate(text, scope.clone())?,
            }
            if let Some(before) = before {
                exported = new_global(&*scope, &before);
            }
        }

        if let Some(source) = HookSource::discover(&*scope) {
            return Ok(source.take(&*scope));
        }
        Ok(match exported {
            Some(name) => {
                debug!(app = %request.app, export = %name, "Lifecycle found by global diff");
                HookSource::ByNamedExport(name).take(&*scope)
            },
            None => LifecycleHooks::default(),
        })
    }

    async fn load_by_import(&self, request: &LoadRequest<'_>) -> LoaderResult<LifecycleHooks> {
        self.load_styles(request).await;

        let engine = self.host.engine();
        let mut hooks = LifecycleHooks::default();
        for record in &request.assets.scripts {
            let Some(url) = record.url() else {
                let inline = AssetRecord {
                    is_module: true,
                    ..record.clone()
                };
                dom::append_script(&*self.host, &inline, request.app, None).await?;
                continue;
            };
            if !engine.supports_dynamic_import() {
                return Err(LoaderError::UnsupportedImport);
            }
            let namespace = engine.import_module(url).await.map_err(|e| match e {
                ScriptError::UnsupportedImport => LoaderError::UnsupportedImport,
                other => LoaderError::Script(other),
            })?;
            let found = HookSource::ByModuleNamespace(namespace).resolve(&*self.global_scope());
            if found.is_complete() {
                hooks = LifecycleHooks {
                    mount: found.mount,
                    unmount: found.unmount,
                    ..LifecycleHooks::default()
                };
            }
        }
        Ok(hooks)
    }
}

/// The property added to `scope` since `before` was taken. When several were
/// added, one holding an object or function is preferred.
fn new_global(scope: &dyn Scope, before: &BTreeSet<String>) -> Option<String> {
    let added: Vec<String> = scope
        .keys()
        .into_iter()
        .filter(|key| !before.contains(key))
        .collect();
    added
        .iter()
        .rev()
        .find(|key| {
            matches!(
                scope.get(key),
                HostValue::Object(_) | HostValue::Function(_)
            )
        })
        .or_else(|| added.last())
        .cloned()
}
