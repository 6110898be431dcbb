//! The per-application lifecycle state machine.
//!
//! ```text
//! NOT_LOADED ─► LOADING_ASSETS ─► NOT_MOUNTED ⇄ MOUNTED
//!                    │                 │          │
//!                    ▼                 ▼          ▼
//!                LOAD_ERROR        UNMOUNTED ◄────┘
//!                                      │
//!                                      ▼ (unload)
//!                                  NOT_LOADED
//! ```
//!
//! Every status check and transition happens under the registry lock, and
//! nothing awaits while holding it. Each load cycle and each unmount bumps a
//! per-application generation; a load or mount that finishes after its
//! generation moved on does not commit.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use mosaic_assets::dom::{empty_assets, load_and_append_css, restore_assets};
use mosaic_assets::{AssetResolver, GlobalAssetCache, RemovalScope, ResolvedAssets};
use mosaic_data::{BASENAME_KEY, ROOT_KEY};
use mosaic_host::{Fetch, Host, HostValue};
use mosaic_loader::{LifecycleHooks, LoadRequest, LoadStrategy, Loader};
use mosaic_sandbox::Sandbox;
use tracing::{debug, error, info, warn};

use crate::activation::{default_basename, should_set_basename};
use crate::app::{AppRef, MicroApp};
use crate::error::{RuntimeError, RuntimeResult};
use crate::hooks::HookStage;
use crate::options::StartOptions;
use crate::registry::AppRegistry;
use crate::status::AppStatus;

/// What an activation request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    /// Full load of the given generation, then mount.
    Load(u64),
    /// Re-append styles, then mount.
    Remount,
    /// Mount directly.
    Mount,
    /// Already mounted or loading.
    Skip(AppStatus),
}

/// Drives applications through their statuses.
pub struct LifecycleOrchestrator {
    host: Arc<dyn Host>,
    registry: Arc<AppRegistry>,
    cache: Arc<GlobalAssetCache>,
    data: Arc<mosaic_data::Cache>,
    options: RwLock<Arc<StartOptions>>,
}

impl fmt::Debug for LifecycleOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("registry", &self.registry.list_names())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl LifecycleOrchestrator {
    /// Create an orchestrator over shared state.
    #[must_use]
    pub fn new(
        host: Arc<dyn Host>,
        registry: Arc<AppRegistry>,
        cache: Arc<GlobalAssetCache>,
        data: Arc<mosaic_data::Cache>,
    ) -> Self {
        Self {
            host,
            registry,
            cache,
            data,
            options: RwLock::new(Arc::new(StartOptions::default())),
        }
    }

    /// The runtime-wide options.
    #[must_use]
    pub fn options(&self) -> Arc<StartOptions> {
        Arc::clone(&self.options.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the runtime-wide options.
    pub fn set_options(&self, options: Arc<StartOptions>) {
        *self.options.write().unwrap_or_else(PoisonError::into_inner) = options;
    }

    /// The options in effect for `app`: its override, or the runtime's.
    fn options_for(&self, app: &MicroApp) -> Arc<StartOptions> {
        app.options.clone().unwrap_or_else(|| self.options())
    }

    /// The fetch capability from `options`, falling back to the host's.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::UnsupportedFetch`] when neither provides one.
    pub fn fetcher(&self, options: &StartOptions) -> RuntimeResult<Arc<dyn Fetch>> {
        options
            .fetch
            .clone()
            .or_else(|| self.host.network())
            .ok_or(RuntimeError::UnsupportedFetch)
    }

    fn missing(name: &str, operation: &str) -> RuntimeError {
        error!(app = %name, operation = %operation, "Can not find app");
        RuntimeError::MissingApp(name.to_string())
    }

    /// Activate an application: load it if needed, then mount it.
    ///
    /// A [`AppRef::Config`] is registered first, or replaces the config of
    /// the application with the same name. `overrides` replaces the
    /// runtime-wide options for this application from now on.
    ///
    /// Load failures are reported through `on_error` and leave the
    /// application in [`AppStatus::LoadError`]; they are not returned.
    ///
    /// # Errors
    ///
    /// - [`RuntimeError::MissingApp`] if `app` names an unregistered application
    /// - [`RuntimeError::InvalidPath`] if a new config does not compile
    /// - [`RuntimeError::Hook`] if the `mount` hook throws
    pub async fn activate(
        &self,
        app: AppRef,
        overrides: Option<StartOptions>,
    ) -> RuntimeResult<()> {
        let name = match app {
            AppRef::Name(name) => name,
            AppRef::Config(config) => {
                let name = config.name.clone();
                if self.registry.contains(&name) {
                    self.registry.reconfigure(*config)?;
                } else {
                    self.registry.register(*config)?;
                }
                name
            },
        };
        if let Some(overrides) = overrides {
            let overrides = Arc::new(overrides);
            self.registry.update(&name, |app| app.options = Some(overrides));
        }

        let Some(app) = self.registry.get(&name) else {
            return Err(Self::missing(&name, "activate"));
        };
        self.share_mount_context(&app);

        let activation = self
            .registry
            .update(&name, |app| {
                let status = app.status;
                match status {
                    AppStatus::NotLoaded | AppStatus::LoadError => Self::begin_load(app),
                    AppStatus::Unmounted if app.hooks.is_empty() => Self::begin_load(app),
                    AppStatus::Unmounted => Activation::Remount,
                    AppStatus::NotMounted => Activation::Mount,
                    AppStatus::Mounted | AppStatus::LoadingAssets => Activation::Skip(status),
                }
            })
            .ok_or_else(|| Self::missing(&name, "activate"))?;

        match activation {
            Activation::Load(generation) => self.load(&name, generation).await,
            Activation::Remount => self.remount(&name).await,
            Activation::Mount => self.mount(&name).await,
            Activation::Skip(status) => {
                debug!(app = %name, status = %status, "Already active, nothing to do");
                Ok(())
            },
        }
    }

    fn begin_load(app: &mut MicroApp) -> Activation {
        app.status = AppStatus::LoadingAssets;
        app.generation = app.generation.wrapping_add(1);
        Activation::Load(app.generation)
    }

    /// Publish the mount root and basename through the shared data cache.
    fn share_mount_context(&self, app: &MicroApp) {
        if let Some(container) = &app.config.container {
            self.data.set(ROOT_KEY, container.clone());
        }
        let own = app.config.basename.as_deref();
        if !should_set_basename(&app.config.active_path, own) {
            return;
        }
        let matched = app
            .matcher
            .matched_path(&self.host.history().href())
            .unwrap_or_default();
        let basename = match &self.options_for(app).basename_policy {
            Some(policy) => policy(&matched, own),
            None => default_basename(&matched, self.registry.basename().as_deref(), own),
        };
        debug!(app = %app.name(), basename = %basename, "Shared application basename");
        self.data.set(BASENAME_KEY, basename);
    }

    async fn load(&self, name: &str, generation: u64) -> RuntimeResult<()> {
        let Some(app) = self.registry.get(name) else {
            return Err(Self::missing(name, "load"));
        };
        let options = self.options_for(&app);
        if let Some(title) = &app.config.title {
            self.host.document().set_title(title.clone());
        }

        let sandbox = self.prepare_sandbox(&app);
        let hooks = match self
            .load_hooks(&app, &options, generation, sandbox.as_ref())
            .await
        {
            Ok(hooks) => hooks,
            Err(e) => {
                if let Some(on_error) = &options.on_error {
                    on_error(name, &e);
                }
                error!(app = %name, error = %e, "Application failed to load");
                let failed = self
                    .registry
                    .update(name, |app| {
                        if app.generation != generation || app.status != AppStatus::LoadingAssets {
                            return None;
                        }
                        app.status = AppStatus::LoadError;
                        Some(app.sandbox.take())
                    })
                    .flatten();
                if let Some(sandbox) = failed {
                    // Failed elements stay in the document and would be
                    // skipped as duplicates on retry.
                    empty_assets(&*self.host, None, &RemovalScope::Owner(name.to_string()));
                    if let Some(sandbox) = sandbox {
                        sandbox.clear();
                    }
                } else {
                    self.discard_stale_load(name, sandbox.as_ref());
                }
                return Ok(());
            },
        };

        let has_mount = hooks.mount.is_some();
        let bootstrap = hooks.bootstrap.clone();
        let committed = self
            .registry
            .update(name, |app| {
                if app.generation != generation || app.status != AppStatus::LoadingAssets {
                    return false;
                }
                app.hooks = hooks;
                app.status = AppStatus::NotMounted;
                true
            })
            .unwrap_or(false);
        if !committed {
            info!(app = %name, "Load finished after the application left, not mounting");
            self.discard_stale_load(name, sandbox.as_ref());
            return Ok(());
        }
        info!(app = %name, "Application loaded");

        // Once per load cycle, before the first mount.
        if let Some(bootstrap) = bootstrap {
            bootstrap
                .call(vec![app.hook_props()])
                .await
                .map_err(|source| RuntimeError::Hook {
                    app: name.to_string(),
                    hook: "bootstrap",
                    source,
                })?;
        }

        if has_mount {
            self.mount(name).await?;
        }
        Ok(())
    }

    /// The sandbox a load cycle evaluates in: the one kept from an earlier
    /// cycle, or a fresh one when the application asks for isolation.
    fn prepare_sandbox(&self, app: &MicroApp) -> Option<Arc<Sandbox>> {
        match (&app.sandbox, app.config.sandbox.options()) {
            (Some(existing), _) => Some(Arc::clone(existing)),
            (None, Some(sandbox_options)) => Some(Sandbox::new(
                self.host.global(),
                self.host.engine(),
                sandbox_options,
            )),
            (None, None) => None,
        }
    }

    /// Undo what a superseded load left behind.
    ///
    /// The sandbox is cleared unless the application still holds it. Assets
    /// are only removed while the application is idle, since an active cycle
    /// owns the elements tagged with its name.
    fn discard_stale_load(&self, name: &str, sandbox: Option<&Arc<Sandbox>>) {
        let Some(app) = self.registry.get(name) else {
            return;
        };
        if let Some(sandbox) = sandbox {
            let held = app
                .sandbox
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, sandbox));
            if !held {
                sandbox.clear();
            }
        }
        let idle = !matches!(
            app.status,
            AppStatus::LoadingAssets | AppStatus::NotMounted | AppStatus::Mounted
        );
        if idle && !app.is_cached() {
            empty_assets(&*self.host, None, &RemovalScope::Owner(name.to_string()));
        }
        debug!(app = %name, status = %app.status, "Discarded stale load");
    }

    /// Resolve assets, record the sandbox and run the loader.
    async fn load_hooks(
        &self,
        app: &MicroApp,
        options: &StartOptions,
        generation: u64,
        sandbox: Option<&Arc<Sandbox>>,
    ) -> RuntimeResult<LifecycleHooks> {
        let name = app.name();
        let fetch = self.fetcher(options)?;

        let sandbox_enabled = sandbox.as_ref().is_some_and(|s| !s.is_disabled());
        let strategy = app.config.load_strategy.unwrap_or(
            if app.config.umd || sandbox_enabled {
                LoadStrategy::Fetch
            } else {
                LoadStrategy::Script
            },
        );
        self.registry.update(name, |app| {
            if app.generation == generation {
                app.sandbox = sandbox.cloned();
                app.strategy = Some(strategy);
            }
        });

        options.notify(|o| o.on_loading_app.as_ref(), app);

        let resolver = AssetResolver::new(Arc::clone(&self.cache), Arc::clone(&fetch));
        let assets = resolver
            .resolve(&app.config.source, name, &self.host.history().href())
            .await?;
        let current = self
            .registry
            .update(name, |app| {
                let current = app.generation == generation;
                if current {
                    app.assets = Some(Arc::clone(&assets));
                }
                current
            })
            .unwrap_or(false);
        if current {
            self.insert_fragment(app, &assets);
        }

        if strategy == LoadStrategy::Import {
            self.replay_import_assets(name);
        }

        let cache_css = options.should_assets_remove.is_none() && strategy != LoadStrategy::Script;
        let loader = Loader::new(Arc::clone(&self.host), Arc::clone(&self.cache), fetch);
        let hooks = loader
            .load(
                LoadRequest::new(name, &assets, strategy)
                    .with_sandbox(sandbox)
                    .with_script_attributes(app.config.script_attributes.as_ref())
                    .with_cached_css(cache_css),
            )
            .await?;

        options.notify(|o| o.on_finish_loading.as_ref(), app);
        Ok(hooks)
    }

    /// Append an entry document's processed markup to the application's
    /// container. URL lists carry no markup.
    fn insert_fragment(&self, app: &MicroApp, assets: &ResolvedAssets) {
        let (Some(fragment), Some(container)) = (&assets.fragment, &app.config.container) else {
            return;
        };
        match self.host.document().append_to_container(container, fragment) {
            Ok(()) => debug!(app = %app.name(), container = %container, "Inserted entry markup"),
            Err(e) => warn!(app = %app.name(), error = %e, "Entry markup not inserted"),
        }
    }

    /// Put back the host-inserted styles an import-mode unmount removed.
    /// Native modules do not run twice, so nothing else would re-create them.
    fn replay_import_assets(&self, name: &str) {
        let removed = self
            .registry
            .update(name, |app| std::mem::take(&mut app.removed_assets))
            .unwrap_or_default();
        let replay: Vec<_> = removed
            .into_iter()
            .filter(|el| !el.is_dynamic() && matches!(el.tag.as_str(), "link" | "style"))
            .collect();
        if !replay.is_empty() {
            debug!(app = %name, count = replay.len(), "Restoring import-mode styles");
            restore_assets(&*self.host, &replay);
        }
    }

    async fn remount(&self, name: &str) -> RuntimeResult<()> {
        let Some(app) = self.registry.get(name) else {
            return Err(Self::missing(name, "remount"));
        };
        if !app.is_cached() {
            let options = self.options_for(&app);
            let strategy = app.load_strategy();
            if let Some(assets) = &app.assets {
                let cache_css =
                    options.should_assets_remove.is_none() && strategy != LoadStrategy::Script;
                let fetch = self.fetcher(&options).ok();
                let cache = fetch
                    .as_deref()
                    .filter(|_| cache_css)
                    .map(|fetch| (&*self.cache, fetch));
                load_and_append_css(&*self.host, &assets.styles, name, cache).await;
            }
            if strategy == LoadStrategy::Import {
                self.replay_import_assets(name);
            }
        }
        self.mount(name).await
    }

    /// Mount `name` if it is loaded, has a `mount` hook and is active at the
    /// current location. Otherwise does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingApp`] for an unknown name and
    /// [`RuntimeError::Hook`] if `mount` throws.
    pub async fn mount(&self, name: &str) -> RuntimeResult<()> {
        let Some(app) = self.registry.get(name) else {
            return Err(Self::missing(name, "mount"));
        };
        if !app.status.can_mount() {
            debug!(app = %name, status = %app.status, "Not mountable in this status");
            return Ok(());
        }
        let Some(mount) = app.hooks.mount.clone() else {
            return Ok(());
        };
        if !app.is_active(&self.host.history().href()) {
            debug!(app = %name, "Not active at the current location, skipping mount");
            return Ok(());
        }

        let generation = app.generation;
        let hooks = &app.config.extension_hooks;
        hooks.run(HookStage::BeforeMount, &app).await;
        mount
            .call(vec![app.hook_props()])
            .await
            .map_err(|source| RuntimeError::Hook {
                app: name.to_string(),
                hook: "mount",
                source,
            })?;
        hooks.run(HookStage::AfterMount, &app).await;

        let mounted = self
            .registry
            .update(name, |app| {
                let current = app.generation == generation && app.status.can_mount();
                if current {
                    app.status = AppStatus::Mounted;
                }
                current
            })
            .unwrap_or(false);
        if mounted {
            info!(app = %name, "Application mounted");
        } else {
            warn!(app = %name, "Application changed while mounting, status left as is");
        }
        Ok(())
    }

    /// Unmount `name` if it is mounted, loading or loaded. Otherwise does
    /// nothing, so calling it twice is the same as calling it once.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingApp`] for an unknown name and
    /// [`RuntimeError::Hook`] if `unmount` throws.
    pub async fn unmount(&self, name: &str) -> RuntimeResult<()> {
        let taken = self
            .registry
            .update(name, |app| {
                if !app.status.can_unmount() {
                    return None;
                }
                app.status = AppStatus::Unmounted;
                app.generation = app.generation.wrapping_add(1);
                let sandbox = if app.is_cached() { None } else { app.sandbox.take() };
                Some((app.clone(), sandbox))
            })
            .ok_or_else(|| Self::missing(name, "unmount"))?;
        let Some((app, sandbox)) = taken else {
            return Ok(());
        };

        let options = self.options_for(&app);
        let scope = if app.is_cached() {
            RemovalScope::Unowned
        } else {
            RemovalScope::Owner(name.to_string())
        };
        let removed = empty_assets(&*self.host, options.should_assets_remove.as_ref(), &scope);
        if app.load_strategy() == LoadStrategy::Import {
            self.registry.update(name, |app| app.removed_assets = removed);
        }
        if let Some(sandbox) = sandbox {
            sandbox.clear();
        }
        info!(app = %name, "Application unmounted");

        if let Some(unmount) = &app.hooks.unmount {
            let hooks = &app.config.extension_hooks;
            hooks.run(HookStage::BeforeUnmount, &app).await;
            unmount
                .call(vec![app.hook_props()])
                .await
                .map_err(|source| RuntimeError::Hook {
                    app: name.to_string(),
                    hook: "unmount",
                    source,
                })?;
            hooks.run(HookStage::AfterUnmount, &app).await;
        }
        Ok(())
    }

    /// Unmount `name`, then discard its hooks, assets and sandbox so the
    /// next activation loads from scratch.
    ///
    /// # Errors
    ///
    /// See [`LifecycleOrchestrator::unmount`].
    pub async fn unload(&self, name: &str) -> RuntimeResult<()> {
        let unmounted = self.unmount(name).await;
        let sandbox = self
            .registry
            .update(name, |app| {
                app.hooks = LifecycleHooks::default();
                app.assets = None;
                app.strategy = None;
                app.status = AppStatus::NotLoaded;
                app.generation = app.generation.wrapping_add(1);
                app.sandbox.take()
            })
            .flatten();
        if let Some(sandbox) = sandbox {
            sandbox.clear();
        }
        debug!(app = %name, "Application unloaded");
        unmounted
    }

    /// Hand new props to a mounted application through its `update` hook.
    ///
    /// The props are stored either way and passed to later mounts.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingApp`] for an unknown name and
    /// [`RuntimeError::Hook`] if `update` throws.
    pub async fn update(&self, name: &str, props: HostValue) -> RuntimeResult<()> {
        let app = self
            .registry
            .update(name, |app| {
                app.config.props = props;
                app.clone()
            })
            .ok_or_else(|| Self::missing(name, "update"))?;
        if app.status != AppStatus::Mounted {
            debug!(app = %name, status = %app.status, "Not mounted, update deferred to next mount");
            return Ok(());
        }
        let Some(update) = &app.hooks.update else {
            return Ok(());
        };

        let hooks = &app.config.extension_hooks;
        hooks.run(HookStage::BeforeUpdate, &app).await;
        update
            .call(vec![app.hook_props()])
            .await
            .map_err(|source| RuntimeError::Hook {
                app: name.to_string(),
                hook: "update",
                source,
            })?;
        hooks.run(HookStage::AfterUpdate, &app).await;
        Ok(())
    }
}
