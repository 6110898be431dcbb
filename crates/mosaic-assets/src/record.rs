//! Asset records.

use serde::{Deserialize, Serialize};

/// Whether an asset is code or a stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Program text.
    Script,
    /// Stylesheet.
    Style,
}

/// Where an asset's content lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetOrigin {
    /// The payload is the content itself.
    Inline,
    /// The payload is an absolute URL.
    External,
}

/// One script or style unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Script or style.
    pub kind: AssetKind,
    /// Inline content or external URL.
    pub origin: AssetOrigin,
    /// Content (inline) or URL (external).
    pub payload: String,
    /// `type="module"` script.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_module: bool,
}

impl AssetRecord {
    /// An external script.
    pub fn external_script(url: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Script,
            origin: AssetOrigin::External,
            payload: url.into(),
            is_module: false,
        }
    }

    /// An inline script.
    pub fn inline_script(source: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Script,
            origin: AssetOrigin::Inline,
            payload: source.into(),
            is_module: false,
        }
    }

    /// An external stylesheet.
    pub fn external_style(url: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Style,
            origin: AssetOrigin::External,
            payload: url.into(),
            is_module: false,
        }
    }

    /// An inline stylesheet.
    pub fn inline_style(css: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Style,
            origin: AssetOrigin::Inline,
            payload: css.into(),
            is_module: false,
        }
    }

    /// Mark as a module script.
    #[must_use]
    pub fn module(mut self) -> Self {
        self.is_module = true;
        self
    }

    /// Whether the payload is inline content.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.origin == AssetOrigin::Inline
    }

    /// The URL, for external records.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self.origin {
            AssetOrigin::External => Some(&self.payload),
            AssetOrigin::Inline => None,
        }
    }
}

/// The resolved assets of one application, in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAssets {
    /// Scripts, in document (or list) order.
    pub scripts: Vec<AssetRecord>,
    /// Stylesheets, in document (or list) order.
    pub styles: Vec<AssetRecord>,
    /// The entry document with every extracted element replaced by a marker
    /// comment. Absent for URL-list sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl ResolvedAssets {
    /// Whether any script is inline.
    #[must_use]
    pub fn has_inline_script(&self) -> bool {
        self.scripts.iter().any(AssetRecord::is_inline)
    }

    /// External script URLs.
    pub fn script_urls(&self) -> impl Iterator<Item = &str> {
        self.scripts.iter().filter_map(AssetRecord::url)
    }

    /// External stylesheet URLs.
    pub fn style_urls(&self) -> impl Iterator<Item = &str> {
        self.styles.iter().filter_map(AssetRecord::url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_shape() {
        let assets = ResolvedAssets {
            scripts: vec![
                AssetRecord::external_script("https://x/app.js"),
                AssetRecord::inline_script("run()").module(),
            ],
            styles: vec![AssetRecord::external_style("https://x/app.css")],
            fragment: None,
        };
        let value = serde_json::to_value(&assets).unwrap();
        assert_eq!(value["scripts"][0]["kind"], "script");
        assert_eq!(value["scripts"][0]["origin"], "external");
        assert!(value["scripts"][0].get("is_module").is_none());
        assert_eq!(value["scripts"][1]["is_module"], true);
        assert_eq!(value["styles"][0]["payload"], "https://x/app.css");
    }

    #[test]
    fn urls_skip_inline_records() {
        let assets = ResolvedAssets {
            scripts: vec![
                AssetRecord::inline_script("a()"),
                AssetRecord::external_script("https://x/b.js"),
            ],
            ..ResolvedAssets::default()
        };
        assert!(assets.has_inline_script());
        assert_eq!(assets.script_urls().collect::<Vec<_>>(), vec!["https://x/b.js"]);
        assert_eq!(assets.style_urls().count(), 0);
    }
}
