//! Application descriptors.

use std::sync::Arc;

use mosaic_assets::{ResolvedAssets, ScriptAttributes, SourceLocator};
use mosaic_config::{ActivePathManifest, AppManifest, SandboxSetting};
use mosaic_host::{Element, HostValue};
use mosaic_loader::{LifecycleHooks, LoadStrategy};
use mosaic_sandbox::{Sandbox, SandboxOptions};

use crate::activation::{ActivationMatcher, ActivePath, PathRule};
use crate::error::{RuntimeError, RuntimeResult};
use crate::hooks::ExtensionHooks;
use crate::options::StartOptions;
use crate::status::AppStatus;

/// Whether an application runs inside a sandbox.
#[derive(Debug, Clone, Default)]
pub enum SandboxConfig {
    /// Scripts see the real global object.
    #[default]
    Disabled,
    /// A sandbox with default options.
    Default,
    /// A sandbox with explicit options.
    Custom(SandboxOptions),
}

impl SandboxConfig {
    /// Whether a sandbox should be created.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }

    /// Options for the sandbox, if one should be created.
    #[must_use]
    pub fn options(&self) -> Option<SandboxOptions> {
        match self {
            Self::Disabled => None,
            Self::Default => Some(SandboxOptions::default()),
            Self::Custom(options) => Some(options.clone()),
        }
    }
}

impl From<bool> for SandboxConfig {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Default } else { Self::Disabled }
    }
}

/// What the caller provides when registering an application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Unique name.
    pub name: String,
    /// Where the application's code comes from.
    pub source: SourceLocator,
    /// When the application is active.
    pub active_path: ActivePath,
    /// Name of the host container it renders into.
    pub container: Option<String>,
    /// Global isolation.
    pub sandbox: SandboxConfig,
    /// Explicit load strategy. Derived from `umd` and `sandbox` when unset.
    pub load_strategy: Option<LoadStrategy>,
    /// The bundle exports a library global.
    pub umd: bool,
    /// Keep assets and sandbox across unmounts.
    pub cached: bool,
    /// Basename for the application's own router.
    pub basename: Option<String>,
    /// Document title set while loading.
    pub title: Option<String>,
    /// Passed to `mount` as `customProps`.
    pub props: HostValue,
    /// Extra attributes for injected scripts.
    pub script_attributes: Option<ScriptAttributes>,
    /// Before/after extensions around the lifecycle hooks.
    pub extension_hooks: ExtensionHooks,
}

impl AppConfig {
    /// A config that is always active, with no sandbox.
    pub fn new(name: impl Into<String>, source: SourceLocator) -> Self {
        Self {
            name: name.into(),
            source,
            active_path: ActivePath::Always,
            container: None,
            sandbox: SandboxConfig::Disabled,
            load_strategy: None,
            umd: false,
            cached: false,
            basename: None,
            title: None,
            props: HostValue::Undefined,
            script_attributes: None,
            extension_hooks: ExtensionHooks::default(),
        }
    }

    /// Set the activation path.
    #[must_use]
    pub fn active_path(mut self, path: impl Into<ActivePath>) -> Self {
        self.active_path = path.into();
        self
    }

    /// Set the mount container.
    #[must_use]
    pub fn container(mut self, container: impl Into<String>) -> Self {
        self.container = Some(container.into());
        self
    }

    /// Configure the sandbox.
    #[must_use]
    pub fn sandbox(mut self, sandbox: impl Into<SandboxConfig>) -> Self {
        self.sandbox = sandbox.into();
        self
    }

    /// Force a load strategy.
    #[must_use]
    pub fn load_strategy(mut self, strategy: LoadStrategy) -> Self {
        self.load_strategy = Some(strategy);
        self
    }

    /// Mark the bundle as exporting a library global.
    #[must_use]
    pub fn umd(mut self) -> Self {
        self.umd = true;
        self
    }

    /// Keep assets and sandbox across unmounts.
    #[must_use]
    pub fn cached(mut self) -> Self {
        self.cached = true;
        self
    }

    /// Set the application's basename.
    #[must_use]
    pub fn basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = Some(basename.into());
        self
    }

    /// Set the document title used while loading.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the props passed to `mount`.
    #[must_use]
    pub fn props(mut self, props: HostValue) -> Self {
        self.props = props;
        self
    }

    /// Set extra script attributes.
    #[must_use]
    pub fn script_attributes(mut self, attributes: ScriptAttributes) -> Self {
        self.script_attributes = Some(attributes);
        self
    }

    /// Set the extension hooks.
    #[must_use]
    pub fn extension_hooks(mut self, hooks: ExtensionHooks) -> Self {
        self.extension_hooks = hooks;
        self
    }

    /// Build a config from a declarative `[[app]]` manifest.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidStrategy`] for an unknown
    /// `load_script_mode`.
    pub fn from_manifest(manifest: &AppManifest) -> RuntimeResult<Self> {
        let source = if manifest.url.is_empty() {
            SourceLocator::Entry {
                entry: manifest.entry.clone(),
                content: manifest.entry_content.clone(),
            }
        } else {
            SourceLocator::Urls(manifest.url.clone())
        };

        let active_path = if manifest.active_path.is_empty() {
            ActivePath::Always
        } else {
            ActivePath::Rules(
                manifest
                    .active_path
                    .iter()
                    .map(|path| match path {
                        ActivePathManifest::Path(value) => PathRule::new(value.clone()),
                        ActivePathManifest::Rule(rule) => PathRule {
                            value: rule.value.clone(),
                            exact: rule.exact,
                            strict: rule.strict,
                            sensitive: rule.sensitive,
                            hash_type: rule.hash_type,
                        },
                    })
                    .collect(),
            )
        };

        let sandbox = match &manifest.sandbox {
            SandboxSetting::Enabled(enabled) => SandboxConfig::from(*enabled),
            SandboxSetting::Options { multi_mode } => SandboxConfig::Custom(SandboxOptions {
                multi_mode: *multi_mode,
                ..SandboxOptions::default()
            }),
        };

        let load_strategy = manifest
            .load_script_mode
            .as_deref()
            .map(str::parse::<LoadStrategy>)
            .transpose()
            .map_err(RuntimeError::InvalidStrategy)?;

        Ok(Self {
            name: manifest.name.clone(),
            source,
            active_path,
            container: manifest.container.clone(),
            sandbox,
            load_strategy,
            umd: manifest.umd,
            cached: manifest.cached,
            basename: manifest.basename.clone(),
            title: manifest.title.clone(),
            props: HostValue::from(manifest.props.clone()),
            script_attributes: (!manifest.script_attributes.is_empty())
                .then(|| ScriptAttributes::List(manifest.script_attributes.clone())),
            extension_hooks: ExtensionHooks::default(),
        })
    }

    /// The strategy this application loads with.
    ///
    /// An explicit strategy wins; otherwise library bundles and sandboxed
    /// applications are fetched and evaluated, and everything else is
    /// injected as `<script>` elements.
    #[must_use]
    pub fn effective_strategy(&self) -> LoadStrategy {
        self.load_strategy.unwrap_or(if self.umd || self.sandbox.is_enabled() {
            LoadStrategy::Fetch
        } else {
            LoadStrategy::Script
        })
    }
}

/// An application as the registry holds it: its config plus runtime state.
#[derive(Debug, Clone)]
pub struct MicroApp {
    /// What the caller registered.
    pub config: AppConfig,
    /// Current lifecycle status.
    pub status: AppStatus,
    /// Compiled activation paths.
    pub matcher: ActivationMatcher,
    /// Assets from the last resolution.
    pub assets: Option<Arc<ResolvedAssets>>,
    /// Hooks from the last successful load.
    pub hooks: LifecycleHooks,
    /// The sandbox, while one is alive.
    pub sandbox: Option<Arc<Sandbox>>,
    /// Per-application override of the start options.
    pub options: Option<Arc<StartOptions>>,
    pub(crate) strategy: Option<LoadStrategy>,
    pub(crate) generation: u64,
    pub(crate) removed_assets: Vec<Element>,
}

impl MicroApp {
    pub(crate) fn new(config: AppConfig, matcher: ActivationMatcher) -> Self {
        Self {
            config,
            status: AppStatus::NotLoaded,
            matcher,
            assets: None,
            hooks: LifecycleHooks::default(),
            sandbox: None,
            options: None,
            strategy: None,
            generation: 0,
            removed_assets: Vec::new(),
        }
    }

    /// Application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> AppStatus {
        self.status
    }

    /// Whether assets survive unmount.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.config.cached
    }

    /// The strategy this application loads with. Once loaded this accounts
    /// for a sandbox the host could not enable.
    #[must_use]
    pub fn load_strategy(&self) -> LoadStrategy {
        self.strategy
            .unwrap_or_else(|| self.config.effective_strategy())
    }

    /// Whether the application should be active at `url`.
    #[must_use]
    pub fn is_active(&self, url: &str) -> bool {
        self.matcher.is_active(url)
    }

    /// The argument passed to `mount`, `unmount` and `update`.
    #[must_use]
    pub fn hook_props(&self) -> HostValue {
        let container = self
            .config
            .container
            .as_deref()
            .map_or(HostValue::Undefined, HostValue::from);
        HostValue::object([
            ("container", container),
            ("customProps", self.config.props.clone()),
        ])
    }
}

/// An application named, or described in full.
#[derive(Debug, Clone)]
pub enum AppRef {
    /// A registered application.
    Name(String),
    /// A config to register (or update) before activating.
    Config(Box<AppConfig>),
}

impl From<&str> for AppRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for AppRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<AppConfig> for AppRef {
    fn from(config: AppConfig) -> Self {
        Self::Config(Box::new(config))
    }
}
