//! Entry document processing.
//!
//! An entry document is scanned for `<script>`, `<style>` and stylesheet
//! `<link>` elements. Each one becomes an [`AssetRecord`] and is replaced in
//! the markup by a marker comment, so the remaining fragment can be inserted
//! into the host without loading anything twice. The document's `<base>` (or
//! the entry URL when there is none) decides how relative references resolve;
//! the `<base>` element itself never reaches the fragment.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::record::{AssetRecord, ResolvedAssets};
use crate::urls::{absolutize, is_absolute_url, resolve_url};

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("invalid regex"));

static ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<script\b(?P<script>[^>]*)>(?P<code>.*?)</script\s*>|<style\b(?P<style>[^>]*)>(?P<css>.*?)</style\s*>|<link\b(?P<link>[^>]*)>|<base\b(?P<base>[^>]*)>",
    )
    .expect("invalid regex")
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<key>[^\s=/>"']+)(?:\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)'|(?P<bare>[^\s"'>]+)))?"#)
        .expect("invalid regex")
});

static URL_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(?P<lead>\s(?:src|href)\s*=\s*)(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#)
        .expect("invalid regex")
});

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"import\s+?(?:(?:[\w*\s{},]*)\s+from\s+?|)(?:"(?P<dq>.*?)"|'(?P<sq>.*?)')"#)
        .expect("invalid regex")
});

/// How an element was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// The element was replaced by an equivalent the runtime inserts itself.
    Replaced,
    /// The element's content was taken over for execution.
    Processed,
}

impl fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replaced => "replaced",
            Self::Processed => "processed",
        })
    }
}

/// Text of the marker comment left in place of an extracted element.
#[must_use]
pub fn marker_comment(tag: &str, from: &str, kind: MarkerKind) -> String {
    format!("<!--{tag} {from} {kind} by mosaic-->")
}

/// Parse an attribute list (`src="a.js" async type=module`).
#[must_use]
pub fn parse_attributes(raw: &str) -> BTreeMap<String, String> {
    ATTRIBUTE
        .captures_iter(raw)
        .filter_map(|caps| {
            let key = caps.name("key")?.as_str().to_ascii_lowercase();
            let value = caps
                .name("dq")
                .or_else(|| caps.name("sq"))
                .or_else(|| caps.name("bare"))
                .map_or("", |m| m.as_str());
            Some((key, value.to_string()))
        })
        .collect()
}

fn is_stylesheet(attrs: &BTreeMap<String, String>) -> bool {
    attrs.get("rel").is_none_or(|rel| {
        rel.split_whitespace()
            .any(|r| r.eq_ignore_ascii_case("stylesheet"))
    })
}

/// Rewrite relative `import` specifiers in module source to absolute URLs.
#[must_use]
pub fn rewrite_module_imports(source: &str, entry: &str) -> String {
    IMPORT
        .replace_all(source, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let Some(specifier) = caps.name("dq").or_else(|| caps.name("sq")) else {
                return whole.to_string();
            };
            let specifier = specifier.as_str();
            let absolute = if specifier.starts_with("../") {
                absolutize(entry, specifier)
            } else if specifier.starts_with("./")
                || (specifier.starts_with('/') && !is_absolute_url(specifier))
            {
                resolve_url(entry, specifier)
            } else {
                return whole.to_string();
            };
            whole.replacen(specifier, &absolute, 1)
        })
        .into_owned()
}

fn effective_base(markup: &str, entry: &str) -> String {
    let declared = ELEMENT
        .captures_iter(markup)
        .find_map(|caps| caps.name("base").map(|m| parse_attributes(m.as_str())))
        .and_then(|attrs| attrs.get("href").cloned())
        .filter(|href| !href.is_empty());

    match declared {
        Some(href) if is_absolute_url(&href) => absolutize(entry, &href),
        Some(href) => resolve_url(entry, &href),
        None => entry.to_string(),
    }
}

fn absolutize_references(markup: &str, base: &str) -> String {
    URL_ATTRIBUTE
        .replace_all(markup, |caps: &Captures<'_>| {
            let whole = caps.get(0).map_or("", |m| m.as_str());
            let lead = caps.name("lead").map_or("", |m| m.as_str());
            let (value, quote) = match (caps.name("dq"), caps.name("sq")) {
                (Some(v), _) => (v.as_str(), '"'),
                (None, Some(v)) => (v.as_str(), '\''),
                (None, None) => return whole.to_string(),
            };
            let keep = value.is_empty()
                || value.starts_with('#')
                || value.contains(':') && !value.starts_with("//")
                || is_absolute_url(value);
            if keep {
                return whole.to_string();
            }
            format!("{lead}{quote}{}{quote}", absolutize(base, value))
        })
        .into_owned()
}

/// Extract the assets of an entry document.
///
/// `entry` is the document's own URL; relative references resolve against
/// it (or against its `<base>`). Without an entry, references are kept as
/// written.
#[must_use]
pub fn process_html(html: &str, entry: Option<&str>) -> ResolvedAssets {
    let markup = COMMENT.replace_all(html, "");
    let base = entry.map(|entry| effective_base(&markup, entry));
    let resolve = |reference: &str| match &base {
        Some(base) => absolutize(base, reference),
        None => reference.to_string(),
    };

    let mut assets = ResolvedAssets::default();
    let mut fragment = String::with_capacity(markup.len());
    let mut cursor = 0;

    for caps in ELEMENT.captures_iter(&markup) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        fragment.push_str(markup.get(cursor..whole.start()).unwrap_or_default());
        cursor = whole.end();

        if let Some(raw) = caps.name("script") {
            let attrs = parse_attributes(raw.as_str());
            let module = attrs.get("type").is_some_and(|t| t == "module");
            let record = match attrs.get("src").filter(|src| !src.is_empty()) {
                Some(src) => {
                    let url = resolve(src);
                    fragment.push_str(&marker_comment("script", &url, MarkerKind::Replaced));
                    AssetRecord::external_script(url)
                },
                None => {
                    let code = caps.name("code").map_or("", |m| m.as_str());
                    let code = match entry {
                        Some(entry) if module => rewrite_module_imports(code, entry),
                        _ => code.to_string(),
                    };
                    fragment.push_str(&marker_comment("script", "inline", MarkerKind::Processed));
                    AssetRecord::inline_script(code)
                },
            };
            assets
                .scripts
                .push(if module { record.module() } else { record });
        } else if caps.name("style").is_some() {
            let css = caps.name("css").map_or("", |m| m.as_str());
            fragment.push_str(&marker_comment("style", "inline", MarkerKind::Replaced));
            assets.styles.push(AssetRecord::inline_style(css));
        } else if let Some(raw) = caps.name("link") {
            let attrs = parse_attributes(raw.as_str());
            match attrs.get("href").filter(|href| !href.is_empty()) {
                Some(href) if is_stylesheet(&attrs) => {
                    let url = resolve(href);
                    fragment.push_str(&marker_comment("link", &url, MarkerKind::Processed));
                    assets.styles.push(AssetRecord::external_style(url));
                },
                _ => fragment.push_str(whole.as_str()),
            }
        }
        // `<base>` is dropped from the fragment.
    }
    fragment.push_str(markup.get(cursor..).unwrap_or_default());

    assets.fragment = Some(match &base {
        Some(base) => absolutize_references(&fragment, base),
        None => fragment,
    });
    assets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::AssetOrigin;

    const CATALOG: &str = r#"<!DOCTYPE html>
<html>
<head>
  <!-- <script src="commented.js"></script> -->
  <link rel="stylesheet" href="./catalog.css">
  <link rel="icon" href="/favicon.ico">
</head>
<body>
  <div id="root"><img src="img/logo.png"></div>
  <script>window.first = 1;</script>
  <script>window.second = 2;</script>
</body>
</html>"#;

    #[test]
    fn catalog_entry_yields_two_inline_scripts_and_one_style() {
        let assets = process_html(CATALOG, Some("https://cdn.test/catalog/index.html"));

        assert_eq!(assets.scripts.len(), 2);
        assert!(assets.scripts.iter().all(|s| s.origin == AssetOrigin::Inline));
        assert_eq!(assets.scripts[0].payload, "window.first = 1;");
        assert_eq!(assets.scripts[1].payload, "window.second = 2;");
        assert_eq!(
            assets.styles,
            vec![AssetRecord::external_style("https://cdn.test/catalog/catalog.css")]
        );

        let fragment = assets.fragment.unwrap();
        assert!(!fragment.contains("<script"));
        assert!(!fragment.contains("stylesheet"));
        assert!(!fragment.contains("commented.js"));
        assert_eq!(fragment.matches("processed by mosaic").count(), 3);
        assert!(fragment.contains(r#"<link rel="icon" href="https://cdn.test/favicon.ico">"#));
        assert!(fragment.contains(r#"src="https://cdn.test/catalog/img/logo.png""#));
    }

    #[test]
    fn external_scripts_resolve_and_keep_order() {
        let html = r#"<script src="/vendor.js"></script><script type="module" src="main.js"></script><style>.a{}</style>"#;
        let assets = process_html(html, Some("https://app.test/shop/"));
        assert_eq!(assets.scripts[0].payload, "https://app.test/vendor.js");
        assert_eq!(assets.scripts[1].payload, "https://app.test/shop/main.js");
        assert!(assets.scripts[1].is_module);
        assert_eq!(assets.styles, vec![AssetRecord::inline_style(".a{}")]);
        let fragment = assets.fragment.unwrap();
        assert!(fragment.contains("<!--script https://app.test/vendor.js replaced by mosaic-->"));
        assert!(fragment.contains("<!--style inline replaced by mosaic-->"));
    }

    #[test]
    fn declared_base_is_made_absolute_then_removed() {
        let html = r#"<head><base href="/static/"></head><script src="app.js"></script>"#;
        let assets = process_html(html, Some("https://app.test/index.html"));
        assert_eq!(assets.scripts[0].payload, "https://app.test/static/app.js");
        assert!(!assets.fragment.unwrap().contains("<base"));
    }

    #[test]
    fn module_imports_are_rewritten_against_entry() {
        let html = r#"<script type="module">import refresh from '/@refresh.js';
import { a } from "./a.js";
import React from "react";</script>"#;
        let assets = process_html(html, Some("https://app.test/sub/index.html"));
        let code = &assets.scripts[0].payload;
        assert!(code.contains("'https://app.test/@refresh.js'"));
        assert!(code.contains("\"https://app.test/sub/a.js\""));
        assert!(code.contains("\"react\""));
    }

    #[test]
    fn without_entry_references_stay_relative() {
        let assets = process_html(r#"<script src="a.js"></script>"#, None);
        assert_eq!(assets.scripts[0].payload, "a.js");
    }

    #[test]
    fn attribute_parsing() {
        let attrs = parse_attributes(r#" SRC="a.js" async type='module' data-x=1 /"#);
        assert_eq!(attrs.get("src").map(String::as_str), Some("a.js"));
        assert_eq!(attrs.get("async").map(String::as_str), Some(""));
        assert_eq!(attrs.get("type").map(String::as_str), Some("module"));
        assert_eq!(attrs.get("data-x").map(String::as_str), Some("1"));
    }
}
