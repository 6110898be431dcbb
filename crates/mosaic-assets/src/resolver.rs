//! Source locator resolution.

use std::sync::Arc;

use mosaic_host::Fetch;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::GlobalAssetCache;
use crate::error::{AssetError, AssetResult};
use crate::html::process_html;
use crate::record::ResolvedAssets;
use crate::urls::classify_urls;

/// Where an application's assets come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocator {
    /// An explicit, ordered list of script and stylesheet URLs.
    Urls(Vec<String>),
    /// An entry document, fetched from `entry` unless `content` is given.
    Entry {
        /// URL of the entry document.
        entry: Option<String>,
        /// Literal document content.
        content: Option<String>,
    },
}

impl SourceLocator {
    /// An explicit URL list.
    pub fn urls<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Urls(urls.into_iter().map(Into::into).collect())
    }

    /// An entry document at `url`.
    pub fn entry(url: impl Into<String>) -> Self {
        Self::Entry {
            entry: Some(url.into()),
            content: None,
        }
    }

    /// Literal entry content, optionally attributed to `entry`.
    pub fn content(entry: Option<String>, content: impl Into<String>) -> Self {
        Self::Entry {
            entry,
            content: Some(content.into()),
        }
    }

    /// Whether the locator names nothing to load.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Urls(urls) => urls.is_empty(),
            Self::Entry { entry, content } => entry.is_none() && content.is_none(),
        }
    }
}

/// Turns source locators into [`ResolvedAssets`].
pub struct AssetResolver {
    cache: Arc<GlobalAssetCache>,
    fetch: Arc<dyn Fetch>,
}

impl AssetResolver {
    /// Create a resolver over a shared cache and fetch capability.
    #[must_use]
    pub fn new(cache: Arc<GlobalAssetCache>, fetch: Arc<dyn Fetch>) -> Self {
        Self { cache, fetch }
    }

    /// The shared asset cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<GlobalAssetCache> {
        &self.cache
    }

    /// The fetch capability.
    #[must_use]
    pub fn fetcher(&self) -> &Arc<dyn Fetch> {
        &self.fetch
    }

    /// Resolve `locator` for the application cached under `cache_key`.
    ///
    /// URL lists are classified on every call. Entry documents are fetched
    /// and processed once per `cache_key`; relative references resolve
    /// against the entry URL, or against `href` (the host location) when only
    /// literal content is given.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::MissingSource`] for an empty entry locator and
    /// [`AssetError::Fetch`] when the entry document cannot be fetched.
    pub async fn resolve(
        &self,
        locator: &SourceLocator,
        cache_key: &str,
        href: &str,
    ) -> AssetResult<Arc<ResolvedAssets>> {
        let (entry, content) = match locator {
            SourceLocator::Urls(urls) => return Ok(Arc::new(classify_urls(urls.as_slice()))),
            SourceLocator::Entry { entry, content } => (entry.as_deref(), content.as_deref()),
        };
        if entry.is_none() && content.is_none() {
            return Err(AssetError::MissingSource(cache_key.to_string()));
        }

        self.cache
            .entry_or_try_init(cache_key, || async {
                let html = match (content, entry) {
                    (Some(content), _) => content.to_string(),
                    (None, Some(url)) => {
                        info!(app = %cache_key, entry = %url, "Fetching entry document");
                        self.fetch.fetch(url).await?
                    },
                    (None, None) => return Err(AssetError::MissingSource(cache_key.to_string())),
                };
                let assets = process_html(&html, Some(entry.unwrap_or(href)));
                debug!(
                    app = %cache_key,
                    scripts = assets.scripts.len(),
                    styles = assets.styles.len(),
                    "Entry document processed"
                );
                Ok(Arc::new(assets))
            })
            .await
    }
}

impl std::fmt::Debug for AssetResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetResolver")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
