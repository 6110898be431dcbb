//! The [`Mosaic`] facade.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mosaic_assets::dom::{empty_assets, record_host_assets};
use mosaic_assets::{AssetResolver, GlobalAssetCache, RemovalScope};
use mosaic_config::Config;
use mosaic_host::{Host, HostValue};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{AppConfig, AppRef, MicroApp};
use crate::error::{RuntimeError, RuntimeResult};
use crate::options::StartOptions;
use crate::orchestrator::LifecycleOrchestrator;
use crate::prefetch::{PrefetchPolicy, spawn_prefetch};
use crate::registry::AppRegistry;
use crate::router::Router;
use crate::status::AppStatus;

/// A micro-frontend runtime bound to one host.
///
/// Owns the registry, the shared asset cache, the shared data namespace,
/// the lifecycle orchestrator and the router.
pub struct Mosaic {
    host: Arc<dyn Host>,
    registry: Arc<AppRegistry>,
    cache: Arc<GlobalAssetCache>,
    data: Arc<mosaic_data::Cache>,
    orchestrator: Arc<LifecycleOrchestrator>,
    router: Router,
    started: AtomicBool,
}

impl std::fmt::Debug for Mosaic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mosaic")
            .field("apps", &self.registry.list_names())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl Mosaic {
    /// Create a stopped runtime over `host`.
    #[must_use]
    pub fn new(host: Arc<dyn Host>) -> Self {
        let registry = Arc::new(AppRegistry::new());
        let cache = Arc::new(GlobalAssetCache::new());
        let data = Arc::new(mosaic_data::Cache::new());
        let orchestrator = Arc::new(LifecycleOrchestrator::new(
            Arc::clone(&host),
            Arc::clone(&registry),
            Arc::clone(&cache),
            Arc::clone(&data),
        ));
        let router = Router::new(Arc::clone(&host), Arc::clone(&registry), Arc::clone(&orchestrator));
        Self {
            host,
            registry,
            cache,
            data,
            orchestrator,
            router,
            started: AtomicBool::new(false),
        }
    }

    /// The host.
    #[must_use]
    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    /// The namespace shared with applications (`root`, `basename`).
    #[must_use]
    pub fn data(&self) -> &Arc<mosaic_data::Cache> {
        &self.data
    }

    /// The process-wide asset cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<GlobalAssetCache> {
        &self.cache
    }

    /// The router.
    #[must_use]
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Whether [`Mosaic::start`] has run without a matching [`Mosaic::stop`].
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Register an application.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateName`] if the name is taken.
    pub fn register(&self, config: AppConfig) -> RuntimeResult<()> {
        self.registry.register(config)
    }

    /// Register several applications.
    ///
    /// # Errors
    ///
    /// Stops at the first failing registration.
    pub fn register_many(&self, configs: impl IntoIterator<Item = AppConfig>) -> RuntimeResult<()> {
        self.registry.register_many(configs)
    }

    /// Register every `[[app]]` manifest in `config`.
    ///
    /// # Errors
    ///
    /// Fails on the first manifest that does not convert or register.
    pub fn register_manifests(&self, config: &Config) -> RuntimeResult<()> {
        for manifest in &config.apps {
            self.registry.register(AppConfig::from_manifest(manifest)?)?;
        }
        Ok(())
    }

    /// A snapshot of `name`.
    #[must_use]
    pub fn app(&self, name: &str) -> Option<MicroApp> {
        self.registry.get(name)
    }

    /// Status of `name`.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<AppStatus> {
        self.registry.status(name)
    }

    /// Snapshots of every application, in registration order.
    #[must_use]
    pub fn apps(&self) -> Vec<MicroApp> {
        self.registry.list_all()
    }

    /// Every registered name, in registration order.
    #[must_use]
    pub fn app_names(&self) -> Vec<String> {
        self.registry.list_names()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Activate an application by name, or register and activate a config.
    ///
    /// # Errors
    ///
    /// See [`LifecycleOrchestrator::activate`].
    pub async fn create_app(&self, app: impl Into<AppRef>) -> RuntimeResult<()> {
        self.orchestrator.activate(app.into(), None).await
    }

    /// Like [`Mosaic::create_app`], with options that replace the runtime
    /// options for this application.
    ///
    /// # Errors
    ///
    /// See [`LifecycleOrchestrator::activate`].
    pub async fn create_app_with(
        &self,
        app: impl Into<AppRef>,
        options: StartOptions,
    ) -> RuntimeResult<()> {
        self.orchestrator.activate(app.into(), Some(options)).await
    }

    /// Mount a loaded application.
    ///
    /// # Errors
    ///
    /// See [`LifecycleOrchestrator::mount`].
    pub async fn mount_app(&self, name: &str) -> RuntimeResult<()> {
        self.orchestrator.mount(name).await
    }

    /// Unmount an application.
    ///
    /// # Errors
    ///
    /// See [`LifecycleOrchestrator::unmount`].
    pub async fn unmount_app(&self, name: &str) -> RuntimeResult<()> {
        self.orchestrator.unmount(name).await
    }

    /// Unmount an application and discard what it loaded.
    ///
    /// # Errors
    ///
    /// See [`LifecycleOrchestrator::unload`].
    pub async fn unload_app(&self, name: &str) -> RuntimeResult<()> {
        self.orchestrator.unload(name).await
    }

    /// Send new props to a mounted application.
    ///
    /// # Errors
    ///
    /// See [`LifecycleOrchestrator::update`].
    pub async fn update_app(&self, name: &str, props: HostValue) -> RuntimeResult<()> {
        self.orchestrator.update(name, props).await
    }

    /// Unload an application and remove it from the registry.
    ///
    /// The application is removed even if its `unmount` hook throws; the
    /// hook error is still returned.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingApp`] for an unknown name.
    pub async fn remove_app(&self, name: &str) -> RuntimeResult<()> {
        if !self.registry.contains(name) {
            warn!(app = %name, "Can not find app to remove");
            return Err(RuntimeError::MissingApp(name.to_string()));
        }
        let unloaded = self.orchestrator.unload(name).await;
        self.registry.remove(name);
        unloaded
    }

    /// Remove several applications, continuing past failures.
    ///
    /// # Errors
    ///
    /// Returns the first failure after every name was attempted.
    pub async fn remove_many<S: AsRef<str>>(&self, names: &[S]) -> RuntimeResult<()> {
        let mut first = None;
        for name in names {
            if let Err(e) = self.remove_app(name.as_ref()).await {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Unload every application and empty the registry.
    pub async fn clear(&self) {
        for name in self.registry.list_names() {
            if let Err(e) = self.orchestrator.unload(&name).await {
                warn!(app = %name, error = %e, "Unload failed while clearing");
            }
        }
        let removed = self.registry.clear();
        debug!(count = removed.len(), "Cleared applications");
    }

    // -----------------------------------------------------------------------
    // Start / stop
    // -----------------------------------------------------------------------

    /// Start routing.
    ///
    /// Tags the host's own assets, applies `options` (recompiling activation
    /// paths against its basename), starts prefetching, hooks navigation and
    /// returns once the initial reconciliation for the current location has
    /// settled. Calling it again while started only logs a warning.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::UnsupportedFetch`] if neither `options` nor the
    ///   host provides a fetch capability
    /// - [`RuntimeError::InvalidPath`] if an activation path does not
    ///   compile against the basename
    pub async fn start(&self, options: StartOptions) -> RuntimeResult<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Mosaic has already been started");
            return Ok(());
        }
        let prepared = self
            .orchestrator
            .fetcher(&options)
            .and_then(|fetch| {
                self.registry.rebase(options.basename.as_deref())?;
                Ok(fetch)
            });
        let fetch = match prepared {
            Ok(fetch) => fetch,
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                return Err(e);
            },
        };

        let recorded = record_host_assets(&*self.host);
        debug!(count = recorded, "Recorded host assets");

        let options = Arc::new(options);
        self.orchestrator.set_options(Arc::clone(&options));

        if !options.prefetch.is_disabled() {
            let apps = options.prefetch.select(&self.registry.list_all());
            debug!(count = apps.len(), "Prefetching applications");
            let resolver = Arc::new(AssetResolver::new(Arc::clone(&self.cache), fetch));
            spawn_prefetch(apps, resolver, self.host.history().href());
        }

        self.router.start();
        self.router.settled().await;
        info!(apps = self.registry.len(), "Mosaic started");
        Ok(())
    }

    /// Stop routing, remove every non-host asset and clear all applications.
    pub async fn stop(&self) {
        self.router.stop();
        self.started.store(false, Ordering::SeqCst);
        let options = self.orchestrator.options();
        let removed = empty_assets(
            &*self.host,
            options.should_assets_remove.as_ref(),
            &RemovalScope::All,
        );
        debug!(count = removed.len(), "Removed application assets on stop");
        self.clear().await;
        info!("Mosaic stopped");
    }

    /// Wait until every navigation signalled so far has been reconciled.
    pub async fn settled(&self) {
        self.router.settled().await;
    }

    /// Warm the asset cache for the applications `policy` selects.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnsupportedFetch`] if no fetch capability is
    /// available.
    pub fn prefetch_apps(&self, policy: &PrefetchPolicy) -> RuntimeResult<Vec<JoinHandle<()>>> {
        let fetch = self.orchestrator.fetcher(&self.orchestrator.options())?;
        let apps = policy.select(&self.registry.list_all());
        let resolver = Arc::new(AssetResolver::new(Arc::clone(&self.cache), fetch));
        Ok(spawn_prefetch(apps, resolver, self.host.history().href()))
    }
}
