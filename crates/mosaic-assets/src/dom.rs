//! Inserting application assets into the host document and removing them.
//!
//! Every element inserted on behalf of an application carries
//! `mosaic="dynamic"` and `cache="<app>"`. Elements that were already present
//! when the runtime started are tagged `mosaic="static"` by
//! [`record_host_assets`] and are never removed.

use std::fmt;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use mosaic_host::{
    ASSET_MARKER_ATTR, DYNAMIC_MARKER, Element, ElementId, Fetch, Host, OWNER_ATTR, STATIC_MARKER,
};
use tracing::{debug, warn};

use crate::cache::GlobalAssetCache;
use crate::error::{AssetError, AssetResult};
use crate::record::AssetRecord;

/// Attributes the runtime manages itself on injected scripts.
const RESERVED_SCRIPT_ATTRIBUTES: [&str; 4] = [ASSET_MARKER_ATTR, "id", "src", "async"];

/// Extra attributes for injected `<script>` elements.
///
/// Entries are `name` or `name=value`.
#[derive(Clone)]
pub enum ScriptAttributes {
    /// The same attributes for every script.
    List(Vec<String>),
    /// Attributes computed from the script URL.
    Dynamic(Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>),
}

impl ScriptAttributes {
    /// The `(name, value)` pairs to apply to the script at `url`.
    #[must_use]
    pub fn for_url(&self, url: &str) -> Vec<(String, String)> {
        let raw = match self {
            Self::List(list) => list.clone(),
            Self::Dynamic(compute) => compute(url),
        };
        raw.iter()
            .filter_map(|entry| {
                let (name, value) = entry.split_once('=').unwrap_or((entry.as_str(), ""));
                let name = name.trim();
                if name.is_empty() {
                    return None;
                }
                if RESERVED_SCRIPT_ATTRIBUTES.contains(&name) {
                    warn!(attribute = %name, "Script attribute is managed by the runtime and was ignored");
                    return None;
                }
                Some((name.to_string(), value.trim().trim_matches('"').to_string()))
            })
            .collect()
    }
}

impl fmt::Debug for ScriptAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(list) => f.debug_tuple("List").field(list).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Decides whether an application asset is removed on unmount. Receives the
/// element's URL (absent for inline styles) and the element.
pub type ShouldRemove = Arc<dyn Fn(Option<&str>, &Element) -> bool + Send + Sync>;

/// Which dynamic elements an unmount may remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemovalScope {
    /// Every non-host element.
    All,
    /// Elements owned by this application, plus elements with no owner.
    Owner(String),
    /// Only elements with no owner; used when an application keeps its
    /// assets across unmounts.
    Unowned,
}

impl RemovalScope {
    fn admits(&self, element: &Element) -> bool {
        match self {
            Self::All => true,
            Self::Owner(name) => element.owner().is_none_or(|owner| owner == name),
            Self::Unowned => element.owner().is_none(),
        }
    }
}

fn tagged(element: Element, owner: &str) -> Element {
    element
        .with_attr(ASSET_MARKER_ATTR, DYNAMIC_MARKER)
        .with_attr(OWNER_ATTR, owner)
}

fn style_element(css: &str, owner: &str) -> Element {
    tagged(Element::new("style").with_text(css), owner)
}

fn link_element(url: &str, owner: &str) -> Element {
    tagged(
        Element::new("link")
            .with_attr("rel", "stylesheet")
            .with_attr("href", url),
        owner,
    )
}

/// Insert one style record. Inline styles become `<style>`; external ones
/// become `<link>`. A stylesheet that fails to load is logged and tolerated.
pub async fn append_css(host: &dyn Host, record: &AssetRecord, owner: &str) {
    let element = match record.url() {
        Some(url) => link_element(url, owner),
        None => style_element(&record.payload, owner),
    };
    if let Err(e) = host.append_to_head(element).await {
        warn!(app = %owner, url = ?record.url(), error = %e, "Stylesheet failed to load");
    }
}

/// Insert every style record, in order.
///
/// With a cache, external stylesheets are fetched through it and inserted as
/// inline `<style>` elements, falling back to `<link>` when the fetch fails.
pub async fn load_and_append_css(
    host: &dyn Host,
    styles: &[AssetRecord],
    owner: &str,
    cache: Option<(&GlobalAssetCache, &dyn Fetch)>,
) {
    let Some((cache, fetch)) = cache else {
        join_all(styles.iter().map(|record| append_css(host, record, owner))).await;
        return;
    };

    let fetched = join_all(styles.iter().map(|record| async move {
        match record.url() {
            Some(url) => cache.fetch_style(url, fetch).await.map_err(|e| (url, e)),
            None => Ok(record.payload.clone()),
        }
    }))
    .await;

    join_all(fetched.into_iter().zip(styles).map(|(text, record)| async move {
        match text {
            Ok(css) => {
                if let Err(e) = host.append_to_head(style_element(&css, owner)).await {
                    warn!(app = %owner, error = %e, "Inline style failed to attach");
                }
            },
            Err((url, e)) => {
                debug!(app = %owner, url = %url, error = %e, "Style fetch failed, falling back to <link>");
                append_css(host, record, owner).await;
            },
        }
    }))
    .await;
}

/// Insert one script record.
///
/// External scripts already referenced by a `<script>` element are skipped
/// and yield `None`.
///
/// # Errors
///
/// Returns [`AssetError::ScriptLoad`] when the element fires `error`.
pub async fn append_script(
    host: &dyn Host,
    record: &AssetRecord,
    owner: &str,
    attributes: Option<&ScriptAttributes>,
) -> AssetResult<Option<ElementId>> {
    let mut element = Element::new("script");
    if record.is_module {
        element = element.with_attr("type", "module");
    }

    match record.url() {
        Some(url) => {
            if host.document().references("script", url) {
                debug!(app = %owner, url = %url, "Script already present, skipping");
                return Ok(None);
            }
            element = element.with_attr("src", url);
            for (name, value) in attributes.map(|a| a.for_url(url)).unwrap_or_default() {
                element = element.with_attr(name, value);
            }
        },
        None => element = element.with_text(record.payload.clone()),
    }

    let url = record.url().unwrap_or("inline").to_string();
    host.append_to_head(tagged(element, owner))
        .await
        .map(Some)
        .map_err(|e| AssetError::ScriptLoad {
            url,
            message: e.to_string(),
        })
}

/// Insert every script record.
///
/// When any script is inline, insertion is strictly sequential so execution
/// order matches document order; otherwise scripts are inserted together.
///
/// # Errors
///
/// Fails with the first [`AssetError::ScriptLoad`].
pub async fn load_and_append_scripts(
    host: &dyn Host,
    scripts: &[AssetRecord],
    owner: &str,
    attributes: Option<&ScriptAttributes>,
) -> AssetResult<()> {
    if scripts.iter().any(AssetRecord::is_inline) {
        for record in scripts {
            append_script(host, record, owner, attributes).await?;
        }
        return Ok(());
    }
    try_join_all(
        scripts
            .iter()
            .map(|record| append_script(host, record, owner, attributes)),
    )
    .await?;
    Ok(())
}

/// Remove application assets from `<head>`, returning the removed elements in
/// document order.
///
/// Host-owned (`static`) elements are never removed. Other `style`, `link`
/// and `script` elements are removed when `scope` admits them and
/// `should_remove` (default: always) agrees.
pub fn empty_assets(
    host: &dyn Host,
    should_remove: Option<&ShouldRemove>,
    scope: &RemovalScope,
) -> Vec<Element> {
    let document = host.document();
    let mut removed = Vec::new();
    for (id, element) in document.head_elements() {
        if !matches!(element.tag.as_str(), "style" | "link" | "script")
            || element.is_static()
            || !scope.admits(&element)
        {
            continue;
        }
        let url = element.resource_url();
        if should_remove.is_some_and(|policy| !policy(url, &element)) {
            continue;
        }
        if let Some(element) = document.remove(id) {
            removed.push(element);
        }
    }
    debug!(count = removed.len(), scope = ?scope, "Removed application assets");
    removed
}

/// Put previously removed elements back into `<head>` without re-running them.
pub fn restore_assets(host: &dyn Host, elements: &[Element]) {
    for element in elements {
        host.document().insert_head(element.clone());
    }
}

/// Tag every untagged `style`, `link` and `script` element as host-owned.
/// Returns how many elements were tagged.
pub fn record_host_assets(host: &dyn Host) -> usize {
    let document = host.document();
    document
        .head_elements()
        .into_iter()
        .filter(|(_, el)| {
            matches!(el.tag.as_str(), "style" | "link" | "script")
                && el.attr(ASSET_MARKER_ATTR).is_none()
        })
        .filter(|(id, _)| document.set_attribute(*id, ASSET_MARKER_ATTR, STATIC_MARKER))
        .count()
}

#[cfg(test)]
mod tests {
    use mosaic_host::{HostValue, Scope};
    use mosaic_test::{MockEngine, MockFetcher, memory_host};

    use super::*;

    fn dynamic_count(host: &dyn Host, tag: &str) -> usize {
        host.document()
            .elements(tag)
            .iter()
            .filter(|(_, el)| el.is_dynamic())
            .count()
    }

    #[tokio::test]
    async fn scripts_and_styles_are_tagged_dynamic() {
        let fetcher = MockFetcher::new()
            .with_response("https://x/app.js", "app")
            .with_response("https://x/app.css", "body{}");
        let host = memory_host(MockEngine::new(), fetcher);

        load_and_append_css(&*host, &[AssetRecord::external_style("https://x/app.css")], "shop", None).await;
        load_and_append_scripts(
            &*host,
            &[AssetRecord::external_script("https://x/app.js")],
            "shop",
            None,
        )
        .await
        .unwrap();

        assert_eq!(dynamic_count(&*host, "link"), 1);
        assert_eq!(dynamic_count(&*host, "script"), 1);
        let (_, script) = &host.document().elements("script")[0];
        assert_eq!(script.owner(), Some("shop"));
    }

    #[tokio::test]
    async fn duplicate_script_urls_are_skipped() {
        let fetcher = MockFetcher::new().with_response("https://x/lib.js", "lib");
        let host = memory_host(MockEngine::new(), fetcher.clone());
        let record = AssetRecord::external_script("https://x/lib.js");

        assert!(append_script(&*host, &record, "a", None).await.unwrap().is_some());
        assert!(append_script(&*host, &record, "b", None).await.unwrap().is_none());
        assert_eq!(fetcher.fetch_count("https://x/lib.js"), 1);
    }

    #[tokio::test]
    async fn inline_scripts_run_in_document_order() {
        let engine = MockEngine::new()
            .assigning("first", "order", HostValue::from("first"))
            .on_script("second", |scope| {
                let seen = scope.get("order");
                scope.set("order", HostValue::from(format!("{}-second", seen.as_str().unwrap_or(""))));
                Ok(())
            });
        let fetcher = MockFetcher::new().with_response("https://x/first.js", "first");
        let host = memory_host(engine, fetcher);

        load_and_append_scripts(
            &*host,
            &[
                AssetRecord::external_script("https://x/first.js"),
                AssetRecord::inline_script("second"),
            ],
            "app",
            None,
        )
        .await
        .unwrap();

        assert_eq!(host.global().get("order"), HostValue::from("first-second"));
    }

    #[tokio::test]
    async fn failed_script_is_an_asset_load_error() {
        let host = memory_host(MockEngine::new(), MockFetcher::new());
        let err = append_script(&*host, &AssetRecord::external_script("https://x/gone.js"), "a", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AssetError::ScriptLoad { url, .. } if url == "https://x/gone.js"));
    }

    #[tokio::test]
    async fn failed_stylesheet_is_tolerated() {
        let host = memory_host(MockEngine::new(), MockFetcher::new());
        append_css(&*host, &AssetRecord::external_style("https://x/gone.css"), "a").await;
        assert_eq!(dynamic_count(&*host, "link"), 1);
    }

    #[tokio::test]
    async fn cached_styles_become_inline_with_link_fallback() {
        let fetcher = MockFetcher::new().with_response("https://x/ok.css", "a{}");
        let host = memory_host(MockEngine::new(), fetcher.clone());
        let cache = GlobalAssetCache::new();

        load_and_append_css(
            &*host,
            &[
                AssetRecord::external_style("https://x/ok.css"),
                AssetRecord::external_style("https://x/missing.css"),
            ],
            "a",
            Some((&cache, &fetcher as &dyn Fetch)),
        )
        .await;

        let styles = host.document().elements("style");
        assert_eq!(styles.len(), 1);
        assert_eq!(styles[0].1.text, "a{}");
        assert_eq!(dynamic_count(&*host, "link"), 1);
    }

    #[test]
    fn reserved_script_attributes_are_ignored() {
        let attrs = ScriptAttributes::List(vec![
            "crossorigin=anonymous".into(),
            "nomodule".into(),
            "src=evil.js".into(),
            "async".into(),
        ]);
        assert_eq!(
            attrs.for_url("https://x/a.js"),
            vec![
                ("crossorigin".to_string(), "anonymous".to_string()),
                ("nomodule".to_string(), String::new()),
            ]
        );

        let dynamic = ScriptAttributes::Dynamic(Arc::new(|url: &str| {
            if url.ends_with("legacy.js") { vec!["nomodule".into()] } else { Vec::new() }
        }));
        assert!(dynamic.for_url("https://x/a.js").is_empty());
        assert_eq!(dynamic.for_url("https://x/legacy.js").len(), 1);
    }

    #[test]
    fn removal_spares_host_assets_and_respects_owner() {
        let host = memory_host(MockEngine::new(), MockFetcher::new());
        let document = host.document();
        document.insert_head(Element::new("link").with_attr("rel", "stylesheet").with_attr("href", "/host.css"));
        assert_eq!(record_host_assets(&*host), 1);

        document.insert_head(style_element("a{}", "a"));
        document.insert_head(style_element("b{}", "b"));
        document.insert_head(Element::new("style").with_text("shared{}"));

        let removed = empty_assets(&*host, None, &RemovalScope::Owner("a".into()));
        assert_eq!(removed.len(), 2);
        assert_eq!(document.head_elements().len(), 2);

        let policy: ShouldRemove = Arc::new(|url, _| url.is_some());
        assert!(empty_assets(&*host, Some(&policy), &RemovalScope::All).is_empty());

        let removed = empty_assets(&*host, None, &RemovalScope::All);
        assert_eq!(removed.len(), 1);
        assert!(document.head_elements()[0].1.is_static());

        restore_assets(&*host, &removed);
        assert_eq!(document.head_elements().len(), 2);
    }

    #[test]
    fn unowned_scope_keeps_application_assets() {
        let host = memory_host(MockEngine::new(), MockFetcher::new());
        let document = host.document();
        document.insert_head(style_element("a{}", "a"));
        document.insert_head(Element::new("style").with_text("injected{}"));

        let removed = empty_assets(&*host, None, &RemovalScope::Unowned);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].text, "injected{}");
        assert_eq!(document.head_elements()[0].1.owner(), Some("a"));
    }
}
