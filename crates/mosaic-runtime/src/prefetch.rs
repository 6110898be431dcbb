//! Warming the asset cache for applications that are not active yet.

use std::fmt;
use std::sync::Arc;

use mosaic_assets::AssetResolver;
use mosaic_config::PrefetchSetting;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::MicroApp;
use crate::status::AppStatus;

/// Decides whether an application is prefetched.
pub type PrefetchPredicate = Arc<dyn Fn(&MicroApp) -> bool + Send + Sync>;

/// Which applications to prefetch after start.
///
/// Only applications that have never been loaded are considered; the others
/// already have their assets cached.
#[derive(Clone, Default)]
pub enum PrefetchPolicy {
    /// Prefetch nothing.
    #[default]
    Disabled,
    /// Prefetch every application.
    All,
    /// Prefetch the named applications.
    Names(Vec<String>),
    /// Prefetch the applications the predicate accepts.
    Predicate(PrefetchPredicate),
}

impl PrefetchPolicy {
    /// A predicate policy.
    pub fn predicate(f: impl Fn(&MicroApp) -> bool + Send + Sync + 'static) -> Self {
        Self::Predicate(Arc::new(f))
    }

    /// Whether nothing will ever be prefetched.
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        match self {
            Self::Disabled => true,
            Self::Names(names) => names.is_empty(),
            Self::All | Self::Predicate(_) => false,
        }
    }

    /// The applications among `apps` this policy selects.
    #[must_use]
    pub fn select(&self, apps: &[MicroApp]) -> Vec<MicroApp> {
        let unloaded = apps.iter().filter(|app| app.status == AppStatus::NotLoaded);
        match self {
            Self::Disabled => Vec::new(),
            Self::All => unloaded.cloned().collect(),
            Self::Names(names) => unloaded
                .filter(|app| names.iter().any(|n| n == app.name()))
                .cloned()
                .collect(),
            Self::Predicate(accept) => unloaded.filter(|app| accept(app)).cloned().collect(),
        }
    }
}

impl From<&PrefetchSetting> for PrefetchPolicy {
    fn from(setting: &PrefetchSetting) -> Self {
        match setting {
            PrefetchSetting::Enabled(true) => Self::All,
            PrefetchSetting::Enabled(false) => Self::Disabled,
            PrefetchSetting::Names(names) => Self::Names(names.clone()),
        }
    }
}

impl From<bool> for PrefetchPolicy {
    fn from(enabled: bool) -> Self {
        if enabled { Self::All } else { Self::Disabled }
    }
}

impl fmt::Debug for PrefetchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::All => f.write_str("All"),
            Self::Names(names) => f.debug_tuple("Names").field(names).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Resolve and download the assets of every app in `apps` in the background.
///
/// Each application gets its own task. Nothing is evaluated; the fetched
/// text lands in the shared cache so a later load does not hit the network.
/// Failures are logged and otherwise ignored.
pub fn spawn_prefetch(
    apps: Vec<MicroApp>,
    resolver: Arc<AssetResolver>,
    href: String,
) -> Vec<JoinHandle<()>> {
    apps.into_iter()
        .map(|app| {
            let resolver = Arc::clone(&resolver);
            let href = href.clone();
            tokio::spawn(async move {
                let name = app.name().to_string();
                let assets = match resolver.resolve(&app.config.source, &name, &href).await {
                    Ok(assets) => assets,
                    Err(e) => {
                        warn!(app = %name, error = %e, "Prefetch failed to resolve assets");
                        return;
                    },
                };
                let cache = resolver.cache();
                let fetch = &**resolver.fetcher();
                let (scripts, styles) = futures::join!(
                    cache.fetch_scripts(&assets.scripts, fetch),
                    cache.fetch_styles(&assets.styles, fetch),
                );
                if let Err(e) = scripts.and(styles) {
                    warn!(app = %name, error = %e, "Prefetch failed to download assets");
                    return;
                }
                debug!(
                    app = %name,
                    scripts = assets.scripts.len(),
                    styles = assets.styles.len(),
                    "Prefetched application assets"
                );
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use mosaic_assets::SourceLocator;

    use super::*;
    use crate::activation::ActivationMatcher;
    use crate::app::AppConfig;

    fn app(name: &str, status: AppStatus) -> MicroApp {
        let mut app = MicroApp::new(
            AppConfig::new(name, SourceLocator::urls([format!("https://x/{name}.js")])),
            ActivationMatcher::always(),
        );
        app.status = status;
        app
    }

    fn names(apps: &[MicroApp]) -> Vec<&str> {
        apps.iter().map(MicroApp::name).collect()
    }

    #[test]
    fn selection_skips_loaded_apps() {
        let apps = vec![
            app("a", AppStatus::NotLoaded),
            app("b", AppStatus::Mounted),
            app("c", AppStatus::NotLoaded),
        ];
        assert_eq!(names(&PrefetchPolicy::All.select(&apps)), ["a", "c"]);
        assert_eq!(
            names(&PrefetchPolicy::Names(vec!["b".into(), "c".into()]).select(&apps)),
            ["c"]
        );
        assert!(PrefetchPolicy::Disabled.select(&apps).is_empty());
        assert_eq!(
            names(&PrefetchPolicy::predicate(|app| app.name() == "a").select(&apps)),
            ["a"]
        );
    }

    #[test]
    fn setting_conversion() {
        assert!(PrefetchPolicy::from(&PrefetchSetting::Enabled(false)).is_disabled());
        assert!(matches!(
            PrefetchPolicy::from(&PrefetchSetting::Enabled(true)),
            PrefetchPolicy::All
        ));
        assert!(PrefetchPolicy::from(&PrefetchSetting::Names(Vec::new())).is_disabled());
    }
}
