//! Config command: show and validate the layered configuration.

use std::path::Path;

use anyhow::{Context, Result};
use mosaic_config::{Config, ResolvedConfig, ShowFormat};

use crate::theme::Theme;

/// Load `path` alone, or the full layered configuration for the current
/// directory.
pub(crate) fn load(path: Option<&Path>) -> Result<ResolvedConfig> {
    if let Some(path) = path {
        let config = Config::load_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?;
        return Ok(ResolvedConfig {
            config,
            loaded_files: vec![path.display().to_string()],
        });
    }
    let workspace = std::env::current_dir().ok();
    Config::load(workspace.as_deref()).context("failed to load configuration")
}

/// Print the resolved configuration.
pub(crate) fn show_config(path: Option<&Path>, format: &str, section: Option<&str>) -> Result<()> {
    let resolved = load(path)?;
    let format = parse_format(format)?;
    let output = resolved.show(format, section).map_err(|_| match section {
        Some(name) => anyhow::anyhow!("unknown section '{name}'"),
        None => anyhow::anyhow!("failed to render configuration"),
    })?;
    println!("{output}");
    Ok(())
}

/// Load and validate the configuration, listing the applications it declares.
pub(crate) fn validate_config(path: Option<&Path>) -> Result<()> {
    let resolved = match load(path) {
        Ok(resolved) => resolved,
        Err(e) => {
            println!("{}", Theme::error(&format!("{e:#}")));
            return Err(e);
        },
    };

    println!("{}", Theme::success("Configuration is valid"));
    for file in &resolved.loaded_files {
        println!("  {}", Theme::dimmed(file));
    }
    if resolved.config.apps.is_empty() {
        println!("{}", Theme::warning("No applications declared"));
        return Ok(());
    }
    println!();
    println!("{}", Theme::header("Applications"));
    for app in &resolved.config.apps {
        let source = match &app.entry {
            Some(entry) => entry.clone(),
            None if app.entry_content.is_some() => "<inline entry>".to_string(),
            None => format!("{} url(s)", app.url.len()),
        };
        println!("  {} {}", Theme::app_name(&app.name), Theme::dimmed(&source));
    }
    Ok(())
}

fn parse_format(format: &str) -> Result<ShowFormat> {
    match format {
        "toml" => Ok(ShowFormat::Toml),
        "json" => Ok(ShowFormat::Json),
        other => anyhow::bail!("unknown format '{other}' (expected toml or json)"),
    }
}
