//! Configuration struct definitions.
//!
//! All types derive `Serialize` and `Deserialize` and use
//! `#[serde(default)]` so a partial file only overrides the keys it names.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// The complete Mosaic configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Runtime behaviour.
    pub runtime: RuntimeSection,
    /// Logging and tracing.
    pub logging: LoggingSection,
    /// Declarative application manifests (`[[app]]`).
    #[serde(rename = "app", skip_serializing_if = "Vec::is_empty")]
    pub apps: Vec<AppManifest>,
}

impl Config {
    /// The manifest named `name`.
    #[must_use]
    pub fn app(&self, name: &str) -> Option<&AppManifest> {
        self.apps.iter().find(|app| app.name == name)
    }
}

// ---------------------------------------------------------------------------
// RuntimeSection
// ---------------------------------------------------------------------------

/// Runtime settings applied at start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Framework basename prefixed to every activation path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basename: Option<String>,
    /// Which applications to prefetch after start.
    pub prefetch: PrefetchSetting,
    /// Timeout for network fetches, in seconds.
    pub fetch_timeout_secs: u64,
    /// Remove application assets from the document on unmount.
    pub remove_assets_on_unmount: bool,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            basename: None,
            prefetch: PrefetchSetting::default(),
            fetch_timeout_secs: 30,
            remove_assets_on_unmount: true,
        }
    }
}

/// `prefetch = true` or `prefetch = ["name", ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefetchSetting {
    /// Prefetch every not-yet-loaded application, or none.
    Enabled(bool),
    /// Prefetch the named applications.
    Names(Vec<String>),
}

impl Default for PrefetchSetting {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global log level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// Output format: `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate tracing directives (e.g. `["mosaic_runtime=debug"]`).
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppManifest
// ---------------------------------------------------------------------------

/// One `[[app]]` entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppManifest {
    /// Unique application name.
    pub name: String,
    /// Explicit script and stylesheet URLs, in load order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub url: Vec<String>,
    /// Entry document URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    /// Literal entry document content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_content: Option<String>,
    /// Activation paths. Empty means always active.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub active_path: Vec<ActivePathManifest>,
    /// Name of the host container to mount into.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Global isolation.
    pub sandbox: SandboxSetting,
    /// `"script"`, `"fetch"` or `"import"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_script_mode: Option<String>,
    /// The bundle exports a library global; implies the fetch strategy.
    pub umd: bool,
    /// Keep assets and sandbox across unmounts.
    pub cached: bool,
    /// Basename handed to the application's own router.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub basename: Option<String>,
    /// Document title set while the application loads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Props passed to `mount` as `customProps`.
    #[serde(skip_serializing_if = "serde_json::Value::is_null")]
    pub props: serde_json::Value,
    /// Extra `name` or `name=value` attributes for injected scripts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub script_attributes: Vec<String>,
}

/// One activation path: a bare pattern or a table with matching options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActivePathManifest {
    /// A bare path pattern with default options.
    Path(String),
    /// A pattern with explicit options.
    Rule(PathRuleManifest),
}

/// Matching options for one activation path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathRuleManifest {
    /// The path pattern (`/shop`, `/user/:id`, ...).
    pub value: String,
    /// Match the whole path rather than a prefix.
    pub exact: bool,
    /// A trailing slash is significant.
    pub strict: bool,
    /// Case-sensitive matching.
    pub sensitive: bool,
    /// Match against the fragment instead of the path.
    pub hash_type: bool,
}

/// `sandbox = true` or `sandbox = { multi_mode = true }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SandboxSetting {
    /// Default sandbox, or none.
    Enabled(bool),
    /// A sandbox with options.
    Options {
        /// Keep writes out of the host global.
        #[serde(default)]
        multi_mode: bool,
    },
}

impl Default for SandboxSetting {
    fn default() -> Self {
        Self::Enabled(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifests_deserialize() {
        let config: Config = toml::from_str(
            r#"
            [runtime]
            basename = "/portal"
            prefetch = ["catalog"]

            [[app]]
            name = "shop"
            url = ["https://x/app.js", "https://x/app.css"]
            active_path = ["/shop", { value = "/cart", exact = true }]
            sandbox = { multi_mode = true }
            props = { theme = "dark" }

            [[app]]
            name = "catalog"
            entry = "https://x/catalog/index.html"
            sandbox = true
            load_script_mode = "fetch"
            "#,
        )
        .unwrap();

        assert_eq!(config.runtime.basename.as_deref(), Some("/portal"));
        assert_eq!(
            config.runtime.prefetch,
            PrefetchSetting::Names(vec!["catalog".into()])
        );
        assert_eq!(config.runtime.fetch_timeout_secs, 30);

        let shop = config.app("shop").unwrap();
        assert_eq!(shop.active_path.len(), 2);
        assert!(matches!(
            &shop.active_path[1],
            ActivePathManifest::Rule(rule) if rule.exact && rule.value == "/cart"
        ));
        assert_eq!(shop.sandbox, SandboxSetting::Options { multi_mode: true });
        assert_eq!(shop.props["theme"], "dark");

        let catalog = config.app("catalog").unwrap();
        assert_eq!(catalog.sandbox, SandboxSetting::Enabled(true));
        assert_eq!(catalog.load_script_mode.as_deref(), Some("fetch"));
    }

    #[test]
    fn empty_document_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }
}
