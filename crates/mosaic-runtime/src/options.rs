//! Options passed to [`Mosaic::start`](crate::Mosaic::start).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use mosaic_assets::ShouldRemove;
use mosaic_config::RuntimeSection;
use mosaic_host::{Fetch, NavigationKind};
use url::Url;

use crate::app::MicroApp;
use crate::error::RuntimeError;
use crate::prefetch::PrefetchPolicy;

/// Called with each route change before reconciliation.
pub type RouteChangeCallback = Arc<dyn Fn(&RouteChange) + Send + Sync>;
/// Called with the applications active at the new route.
pub type ActiveAppsCallback = Arc<dyn Fn(&[MicroApp]) + Send + Sync>;
/// Called with one application at a lifecycle milestone.
pub type AppCallback = Arc<dyn Fn(&MicroApp) + Send + Sync>;
/// Called when loading an application fails.
pub type ErrorCallback = Arc<dyn Fn(&str, &RuntimeError) + Send + Sync>;
/// Computes the basename handed to an application: receives the matched
/// activation path and the application's own basename.
pub type BasenamePolicy = Arc<dyn Fn(&str, Option<&str>) -> String + Send + Sync>;

/// A navigation, as reported to [`StartOptions::on_route_change`].
#[derive(Debug, Clone, PartialEq)]
pub struct RouteChange {
    /// Full URL.
    pub url: String,
    /// Path component.
    pub pathname: String,
    /// Query parameters; later duplicates win.
    pub query: BTreeMap<String, String>,
    /// Fragment including the leading `#`, or empty.
    pub hash: String,
    /// What caused the navigation.
    pub kind: NavigationKind,
}

impl RouteChange {
    /// Split `url` into its parts. Unparseable URLs keep only `url` and `kind`.
    #[must_use]
    pub fn parse(url: &str, kind: NavigationKind) -> Self {
        let mut change = Self {
            url: url.to_string(),
            pathname: String::new(),
            query: BTreeMap::new(),
            hash: String::new(),
            kind,
        };
        if let Ok(parsed) = Url::parse(url) {
            change.pathname = parsed.path().to_string();
            change.query = parsed.query_pairs().into_owned().collect();
            change.hash = parsed.fragment().map(|f| format!("#{f}")).unwrap_or_default();
        }
        change
    }
}

/// Runtime-wide options. Individual applications may override them through
/// [`Mosaic::create_app_with`](crate::Mosaic::create_app_with).
#[derive(Clone, Default)]
pub struct StartOptions {
    /// See [`RouteChangeCallback`].
    pub on_route_change: Option<RouteChangeCallback>,
    /// See [`ActiveAppsCallback`].
    pub on_active_apps: Option<ActiveAppsCallback>,
    /// Before an inactive application is activated.
    pub on_app_enter: Option<AppCallback>,
    /// Before an active application is deactivated.
    pub on_app_leave: Option<AppCallback>,
    /// Before an application's assets are resolved.
    pub on_loading_app: Option<AppCallback>,
    /// After an application's assets were evaluated.
    pub on_finish_loading: Option<AppCallback>,
    /// See [`ErrorCallback`].
    pub on_error: Option<ErrorCallback>,
    /// Fetch capability; the host's network is used when absent.
    pub fetch: Option<Arc<dyn Fetch>>,
    /// Which applications to warm up after start.
    pub prefetch: PrefetchPolicy,
    /// Decides which assets an unmount removes. When set, stylesheets are
    /// re-inserted on remount instead of being cached inline.
    pub should_assets_remove: Option<ShouldRemove>,
    /// Prefix prepended to every activation path.
    pub basename: Option<String>,
    /// See [`BasenamePolicy`].
    pub basename_policy: Option<BasenamePolicy>,
    /// Timeout for the default HTTP fetcher.
    pub fetch_timeout: Option<Duration>,
}

impl StartOptions {
    /// Empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options seeded from the `[runtime]` config section.
    #[must_use]
    pub fn from_config(section: &RuntimeSection) -> Self {
        let mut options = Self {
            prefetch: PrefetchPolicy::from(&section.prefetch),
            basename: section.basename.clone(),
            fetch_timeout: Some(Duration::from_secs(section.fetch_timeout_secs)),
            ..Self::default()
        };
        if !section.remove_assets_on_unmount {
            options.should_assets_remove = Some(Arc::new(|_, _| false));
        }
        options
    }

    /// Set the route change callback.
    #[must_use]
    pub fn on_route_change(mut self, f: impl Fn(&RouteChange) + Send + Sync + 'static) -> Self {
        self.on_route_change = Some(Arc::new(f));
        self
    }

    /// Set the active applications callback.
    #[must_use]
    pub fn on_active_apps(mut self, f: impl Fn(&[MicroApp]) + Send + Sync + 'static) -> Self {
        self.on_active_apps = Some(Arc::new(f));
        self
    }

    /// Set the app-enter callback.
    #[must_use]
    pub fn on_app_enter(mut self, f: impl Fn(&MicroApp) + Send + Sync + 'static) -> Self {
        self.on_app_enter = Some(Arc::new(f));
        self
    }

    /// Set the app-leave callback.
    #[must_use]
    pub fn on_app_leave(mut self, f: impl Fn(&MicroApp) + Send + Sync + 'static) -> Self {
        self.on_app_leave = Some(Arc::new(f));
        self
    }

    /// Set the loading callback.
    #[must_use]
    pub fn on_loading_app(mut self, f: impl Fn(&MicroApp) + Send + Sync + 'static) -> Self {
        self.on_loading_app = Some(Arc::new(f));
        self
    }

    /// Set the finished-loading callback.
    #[must_use]
    pub fn on_finish_loading(mut self, f: impl Fn(&MicroApp) + Send + Sync + 'static) -> Self {
        self.on_finish_loading = Some(Arc::new(f));
        self
    }

    /// Set the load error callback.
    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&str, &RuntimeError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Use `fetch` for every network access.
    #[must_use]
    pub fn fetch(mut self, fetch: Arc<dyn Fetch>) -> Self {
        self.fetch = Some(fetch);
        self
    }

    /// Set the prefetch policy.
    #[must_use]
    pub fn prefetch(mut self, policy: PrefetchPolicy) -> Self {
        self.prefetch = policy;
        self
    }

    /// Set the asset removal policy.
    #[must_use]
    pub fn should_assets_remove(
        mut self,
        f: impl Fn(Option<&str>, &mosaic_host::Element) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.should_assets_remove = Some(Arc::new(f));
        self
    }

    /// Set the global basename.
    #[must_use]
    pub fn basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = Some(basename.into());
        self
    }

    /// Set the basename policy.
    #[must_use]
    pub fn basename_policy(
        mut self,
        f: impl Fn(&str, Option<&str>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.basename_policy = Some(Arc::new(f));
        self
    }

    pub(crate) fn notify(&self, pick: impl Fn(&Self) -> Option<&AppCallback>, app: &MicroApp) {
        if let Some(callback) = pick(self) {
            callback(app);
        }
    }
}

impl fmt::Debug for StartOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StartOptions")
            .field("on_route_change", &self.on_route_change.is_some())
            .field("on_active_apps", &self.on_active_apps.is_some())
            .field("on_app_enter", &self.on_app_enter.is_some())
            .field("on_app_leave", &self.on_app_leave.is_some())
            .field("on_loading_app", &self.on_loading_app.is_some())
            .field("on_finish_loading", &self.on_finish_loading.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("fetch", &self.fetch.is_some())
            .field("prefetch", &self.prefetch)
            .field("should_assets_remove", &self.should_assets_remove.is_some())
            .field("basename", &self.basename)
            .field("basename_policy", &self.basename_policy.is_some())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use mosaic_config::PrefetchSetting;

    use super::*;

    #[test]
    fn route_change_splits_url() {
        let change = RouteChange::parse(
            "https://host.test/shop/cart?id=3&tab=a#top",
            NavigationKind::PushState,
        );
        assert_eq!(change.pathname, "/shop/cart");
        assert_eq!(change.query.get("id").map(String::as_str), Some("3"));
        assert_eq!(change.hash, "#top");
        assert_eq!(change.kind, NavigationKind::PushState);
    }

    #[test]
    fn from_config_maps_runtime_section() {
        let section = RuntimeSection {
            basename: Some("/portal".into()),
            prefetch: PrefetchSetting::Names(vec!["shop".into()]),
            fetch_timeout_secs: 5,
            remove_assets_on_unmount: false,
        };
        let options = StartOptions::from_config(&section);
        assert_eq!(options.basename.as_deref(), Some("/portal"));
        assert!(matches!(options.prefetch, PrefetchPolicy::Names(ref n) if n == &["shop"]));
        assert_eq!(options.fetch_timeout, Some(Duration::from_secs(5)));
        let remove = options.should_assets_remove.unwrap();
        assert!(!remove(None, &mosaic_host::Element::new("style")));
    }
}
