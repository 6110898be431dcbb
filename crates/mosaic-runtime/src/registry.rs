//! Application registry.
//!
//! Holds every registered application in registration order together with
//! its runtime state. Activation matchers are compiled against the framework
//! basename; [`AppRegistry::rebase`] recompiles them when it changes.

use std::sync::{PoisonError, RwLock};

use tracing::{debug, info};

use crate::activation::ActivationMatcher;
use crate::app::{AppConfig, MicroApp};
use crate::error::{RuntimeError, RuntimeResult};
use crate::status::AppStatus;

/// Registry of applications, keyed by unique name.
#[derive(Debug, Default)]
pub struct AppRegistry {
    apps: RwLock<Vec<MicroApp>>,
    basename: RwLock<Option<String>>,
}

impl AppRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<MicroApp>> {
        self.apps.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<MicroApp>> {
        self.apps.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The framework basename matchers are compiled against.
    #[must_use]
    pub fn basename(&self) -> Option<String> {
        self.basename
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn compile(&self, config: &AppConfig) -> RuntimeResult<ActivationMatcher> {
        ActivationMatcher::compile(&config.active_path, self.basename().as_deref())
    }

    /// Register an application.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::DuplicateName`] if the name is taken and
    /// [`RuntimeError::InvalidPath`] if an activation path does not compile.
    /// Nothing is registered on error.
    pub fn register(&self, config: AppConfig) -> RuntimeResult<()> {
        let matcher = self.compile(&config)?;
        let mut apps = self.write();
        if apps.iter().any(|app| app.name() == config.name) {
            return Err(RuntimeError::DuplicateName(config.name));
        }
        info!(app = %config.name, "Registered application");
        apps.push(MicroApp::new(config, matcher));
        Ok(())
    }

    /// Register several applications, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// See [`AppRegistry::register`]. Applications before the failing one
    /// stay registered.
    pub fn register_many(&self, configs: impl IntoIterator<Item = AppConfig>) -> RuntimeResult<()> {
        configs.into_iter().try_for_each(|config| self.register(config))
    }

    /// Replace the config of a registered application, keeping its state.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingApp`] if no such application exists.
    pub fn reconfigure(&self, config: AppConfig) -> RuntimeResult<()> {
        let matcher = self.compile(&config)?;
        let mut apps = self.write();
        let app = apps
            .iter_mut()
            .find(|app| app.name() == config.name)
            .ok_or_else(|| RuntimeError::MissingApp(config.name.clone()))?;
        debug!(app = %config.name, "Application config replaced");
        app.config = config;
        app.matcher = matcher;
        Ok(())
    }

    /// Set the framework basename and recompile every matcher.
    ///
    /// # Errors
    ///
    /// Returns the first compile failure; matchers are left unchanged.
    pub fn rebase(&self, basename: Option<&str>) -> RuntimeResult<()> {
        let mut apps = self.write();
        let matchers = apps
            .iter()
            .map(|app| ActivationMatcher::compile(&app.config.active_path, basename))
            .collect::<RuntimeResult<Vec<_>>>()?;
        for (app, matcher) in apps.iter_mut().zip(matchers) {
            app.matcher = matcher;
        }
        *self.basename.write().unwrap_or_else(PoisonError::into_inner) =
            basename.map(str::to_string);
        Ok(())
    }

    /// A snapshot of the application named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<MicroApp> {
        self.read().iter().find(|app| app.name() == name).cloned()
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.read().iter().any(|app| app.name() == name)
    }

    /// Current status of `name`.
    #[must_use]
    pub fn status(&self, name: &str) -> Option<AppStatus> {
        self.read()
            .iter()
            .find(|app| app.name() == name)
            .map(MicroApp::status)
    }

    /// Run `f` on the application named `name` under the registry lock.
    ///
    /// Returns `None` if no such application exists.
    pub fn update<R>(&self, name: &str, f: impl FnOnce(&mut MicroApp) -> R) -> Option<R> {
        self.write()
            .iter_mut()
            .find(|app| app.name() == name)
            .map(f)
    }

    /// Remove `name`, returning its last state.
    pub fn remove(&self, name: &str) -> Option<MicroApp> {
        let mut apps = self.write();
        let index = apps.iter().position(|app| app.name() == name)?;
        info!(app = %name, "Removed application");
        Some(apps.remove(index))
    }

    /// Snapshots of every application, in registration order.
    #[must_use]
    pub fn list_all(&self) -> Vec<MicroApp> {
        self.read().clone()
    }

    /// Every registered name, in registration order.
    #[must_use]
    pub fn list_names(&self) -> Vec<String> {
        self.read().iter().map(|app| app.name().to_string()).collect()
    }

    /// Remove every application, returning their last states.
    pub fn clear(&self) -> Vec<MicroApp> {
        std::mem::take(&mut *self.write())
    }

    /// Number of registered applications.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
