//! Process-wide, write-once asset caches.
//!
//! Each key maps to a shared [`OnceCell`]; the first caller to reach an empty
//! cell performs the fetch and every concurrent caller awaits the same result.
//! Failed initialisations leave the cell empty, so a later call retries.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::try_join_all;
use mosaic_host::Fetch;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::{AssetError, AssetResult};
use crate::record::{AssetRecord, ResolvedAssets};

type Cells<T> = DashMap<String, Arc<OnceCell<T>>>;

/// Shared cache of fetched script and style text plus processed entries.
#[derive(Default)]
pub struct GlobalAssetCache {
    scripts: Cells<String>,
    styles: Cells<String>,
    entries: Cells<Arc<ResolvedAssets>>,
}

fn cell<T>(cells: &Cells<T>, key: &str) -> Arc<OnceCell<T>> {
    // Clone the cell out so no shard lock is held across an await.
    Arc::clone(cells.entry(key.to_string()).or_default().value())
}

fn peek<T: Clone>(cells: &Cells<T>, key: &str) -> Option<T> {
    cells.get(key).and_then(|cell| cell.get().cloned())
}

/// Append the `sourceURL` annotation to fetched program text.
#[must_use]
pub fn with_source_url(body: &str, url: &str) -> String {
    format!("{body} \n //# sourceURL={url}")
}

impl GlobalAssetCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a script's text, annotated with its `sourceURL`.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::Fetch`] when the
    /// request fails. The failure is not cached.
    pub async fn fetch_script(&self, url: &str, fetch: &dyn Fetch) -> AssetResult<String> {
        let cell = cell(&self.scripts, url);
        let text = cell
            .get_or_try_init(|| async {
                debug!(url = %url, "Fetching script");
                let body = fetch.fetch(url).await?;
                Ok::<_, AssetError>(with_source_url(&body, url))
            })
            .await?;
        Ok(text.clone())
    }

    /// Fetch a stylesheet's text.
    ///
    /// # Errors
    ///
    /// Returns [`AssetError::Fetch`] when the
    /// request fails. The failure is not cached.
    pub async fn fetch_style(&self, url: &str, fetch: &dyn Fetch) -> AssetResult<String> {
        let cell = cell(&self.styles, url);
        let text = cell
            .get_or_try_init(|| async {
                debug!(url = %url, "Fetching style");
                fetch.fetch(url).await.map_err(AssetError::from)
            })
            .await?;
        Ok(text.clone())
    }

    /// Program text for every script record, in order. Inline records yield
    /// their content; external ones are fetched concurrently.
    ///
    /// # Errors
    ///
    /// Fails with the first fetch error.
    pub async fn fetch_scripts(
        &self,
        records: &[AssetRecord],
        fetch: &dyn Fetch,
    ) -> AssetResult<Vec<String>> {
        try_join_all(records.iter().map(|record| async move {
            match record.url() {
                Some(url) => self.fetch_script(url, fetch).await,
                None => Ok(record.payload.clone()),
            }
        }))
        .await
    }

    /// Stylesheet text for every style record, in order.
    ///
    /// # Errors
    ///
    /// Fails with the first fetch error.
    pub async fn fetch_styles(
        &self,
        records: &[AssetRecord],
        fetch: &dyn Fetch,
    ) -> AssetResult<Vec<String>> {
        try_join_all(records.iter().map(|record| async move {
            match record.url() {
                Some(url) => self.fetch_style(url, fetch).await,
                None => Ok(record.payload.clone()),
            }
        }))
        .await
    }

    /// The processed entry for `key`, computing it with `init` on first use.
    ///
    /// # Errors
    ///
    /// Propagates the error from `init`; nothing is cached in that case.
    pub async fn entry_or_try_init<F, Fut>(
        &self,
        key: &str,
        init: F,
    ) -> AssetResult<Arc<ResolvedAssets>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AssetResult<Arc<ResolvedAssets>>>,
    {
        cell(&self.entries, key)
            .get_or_try_init(init)
            .await
            .map(Arc::clone)
    }

    /// Cached script text, if already fetched.
    #[must_use]
    pub fn cached_script(&self, url: &str) -> Option<String> {
        peek(&self.scripts, url)
    }

    /// Cached stylesheet text, if already fetched.
    #[must_use]
    pub fn cached_style(&self, url: &str) -> Option<String> {
        peek(&self.styles, url)
    }

    /// Cached processed entry for `key`.
    #[must_use]
    pub fn cached_entry(&self, key: &str) -> Option<Arc<ResolvedAssets>> {
        peek(&self.entries, key)
    }
}

impl std::fmt::Debug for GlobalAssetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalAssetCache")
            .field("scripts", &self.scripts.len())
            .field("styles", &self.styles.len())
            .field("entries", &self.entries.len())
            .finish()
    }
}
