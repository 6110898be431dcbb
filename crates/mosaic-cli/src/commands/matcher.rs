//! Match command: which configured applications a location activates.

use anyhow::{Context, Result};
use mosaic_config::Config;
use mosaic_runtime::{AppConfig, AppRegistry};
use serde::Serialize;

use crate::OutputFormat;
use crate::theme::Theme;

/// One configured application and whether it is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct MatchEntry {
    pub(crate) name: String,
    pub(crate) active: bool,
    /// The pattern that matched; empty for applications without paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) matched: Option<String>,
    pub(crate) strategy: String,
}

/// Evaluate every manifest in `config` against `url`.
///
/// `basename` overrides `[runtime] basename`.
pub(crate) fn evaluate(
    config: &Config,
    url: &str,
    basename: Option<&str>,
) -> Result<Vec<MatchEntry>> {
    let registry = AppRegistry::new();
    for manifest in &config.apps {
        let app = AppConfig::from_manifest(manifest)
            .with_context(|| format!("invalid application '{}'", manifest.name))?;
        registry.register(app)?;
    }
    registry.rebase(basename.or(config.runtime.basename.as_deref()))?;

    Ok(registry
        .list_all()
        .into_iter()
        .map(|app| {
            let matched = app.matcher.matched_path(url);
            MatchEntry {
                name: app.name().to_string(),
                active: matched.is_some(),
                matched,
                strategy: app.config.effective_strategy().to_string(),
            }
        })
        .collect())
}

/// Print the applications active at `url`.
pub(crate) fn run_match(
    config: &Config,
    url: &str,
    basename: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let entries = evaluate(config, url, basename)?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    println!("{}", Theme::header(&format!("Applications at {url}")));
    println!("{}", Theme::separator());
    if entries.is_empty() {
        println!("{}", Theme::warning("No applications configured"));
        return Ok(());
    }
    for entry in &entries {
        if let Some(pattern) = &entry.matched {
            let pattern = if pattern.is_empty() { "(always)" } else { pattern };
            println!(
                "{}  {}",
                Theme::success(&Theme::app_name(&entry.name)),
                Theme::kv("path", pattern)
            );
        } else {
            println!("  {}", Theme::dimmed(&entry.name));
        }
    }
    let active = entries.iter().filter(|e| e.active).count();
    println!();
    println!("{}", Theme::dimmed(&format!("{active} of {} active", entries.len())));
    Ok(())
}
