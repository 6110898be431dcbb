//! Resolve command: print the scripts and stylesheets an application loads.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use mosaic_assets::urls::is_css_url;
use mosaic_assets::{AssetOrigin, AssetRecord, AssetResolver, GlobalAssetCache, SourceLocator};
use mosaic_config::Config;
use mosaic_host::HttpFetcher;
use mosaic_runtime::AppConfig;
use tracing::debug;

use crate::OutputFormat;
use crate::theme::Theme;

/// Base URL for entries given only as inline content.
const FALLBACK_HREF: &str = "http://localhost/";

/// Resolve `sources` (or the configured application `app`) and print the
/// asset records.
pub(crate) async fn run_resolve(
    config: &Config,
    sources: &[String],
    app: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let (name, locator) = match app {
        Some(name) => {
            let manifest = config
                .app(name)
                .with_context(|| format!("no application named '{name}' in configuration"))?;
            (name.to_string(), AppConfig::from_manifest(manifest)?.source)
        },
        None => ("cli".to_string(), locator_for(sources)?),
    };
    let href = match &locator {
        SourceLocator::Entry {
            entry: Some(entry), ..
        } => entry.clone(),
        _ => FALLBACK_HREF.to_string(),
    };
    debug!(app = %name, ?locator, "Resolving");

    let fetcher = HttpFetcher::new(Duration::from_secs(config.runtime.fetch_timeout_secs))?;
    let resolver = AssetResolver::new(Arc::new(GlobalAssetCache::new()), Arc::new(fetcher));
    let assets = resolver.resolve(&locator, &name, &href).await?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&*assets)?);
        return Ok(());
    }

    println!("{}", Theme::header(&format!("Assets for {name}")));
    println!("{}", Theme::separator());
    print_section("Scripts", &assets.scripts);
    print_section("Styles", &assets.styles);
    if let Some(fragment) = &assets.fragment {
        println!();
        println!("{}", Theme::kv("Markup", &format!("{} bytes", fragment.len())));
    }
    Ok(())
}

/// A single non-asset URL is an entry document; anything else is an
/// explicit script/stylesheet list.
fn locator_for(sources: &[String]) -> Result<SourceLocator> {
    match sources {
        [] => anyhow::bail!("nothing to resolve: pass an entry URL, asset URLs or --app"),
        [single] if !is_css_url(single) && !is_script_url(single) => {
            Ok(SourceLocator::entry(single.clone()))
        },
        many => Ok(SourceLocator::urls(many.iter().cloned())),
    }
}

fn is_script_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.ends_with(".js") || path.ends_with(".mjs")
}

fn print_section(title: &str, records: &[AssetRecord]) {
    println!("{}", Theme::header(title));
    if records.is_empty() {
        println!("  {}", Theme::dimmed("(none)"));
    }
    for record in records {
        let module = if record.is_module { " module" } else { "" };
        match record.origin {
            AssetOrigin::External => println!("  {}{}", record.payload, Theme::dimmed(module)),
            AssetOrigin::Inline => println!(
                "  {}",
                Theme::dimmed(&format!("<inline{module}, {} bytes>", record.payload.len()))
            ),
        }
    }
}
