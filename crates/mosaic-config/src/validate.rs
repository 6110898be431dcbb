//! Post-merge configuration validation.

use std::collections::HashSet;

use crate::error::{ConfigError, ConfigResult};
use crate::types::{ActivePathManifest, AppManifest, Config};

/// Validate a fully-merged and deserialized configuration.
///
/// # Errors
///
/// Returns the first validation error found.
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_runtime(config)?;
    validate_logging(config)?;
    validate_apps(config)?;
    Ok(())
}

fn invalid(field: impl Into<String>, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate_runtime(config: &Config) -> ConfigResult<()> {
    let runtime = &config.runtime;
    if runtime.fetch_timeout_secs == 0 {
        return Err(invalid(
            "runtime.fetch_timeout_secs",
            "fetch_timeout_secs must be greater than zero",
        ));
    }
    if let Some(basename) = &runtime.basename
        && !basename.is_empty()
        && !basename.starts_with('/')
    {
        return Err(invalid(
            "runtime.basename",
            format!("basename '{basename}' must start with '/'"),
        ));
    }
    Ok(())
}

fn validate_logging(config: &Config) -> ConfigResult<()> {
    let logging = &config.logging;
    if !matches!(
        logging.level.to_ascii_lowercase().as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(invalid(
            "logging.level",
            format!(
                "unsupported level '{}'; expected one of: trace, debug, info, warn, error",
                logging.level
            ),
        ));
    }
    if !matches!(
        logging.format.as_str(),
        "pretty" | "compact" | "json" | "full"
    ) {
        return Err(invalid(
            "logging.format",
            format!(
                "unsupported format '{}'; expected one of: pretty, compact, json, full",
                logging.format
            ),
        ));
    }
    Ok(())
}

fn validate_apps(config: &Config) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for (index, app) in config.apps.iter().enumerate() {
        let field = format!("app[{index}]");
        if app.name.trim().is_empty() {
            return Err(invalid(format!("{field}.name"), "name must not be empty"));
        }
        if !seen.insert(app.name.as_str()) {
            return Err(invalid(
                format!("{field}.name"),
                format!("duplicate application name '{}'", app.name),
            ));
        }
        validate_app(&field, app)?;
    }
    Ok(())
}

fn validate_app(field: &str, app: &AppManifest) -> ConfigResult<()> {
    if app.url.is_empty() && app.entry.is_none() && app.entry_content.is_none() {
        return Err(invalid(
            field,
            format!("application '{}' needs `url`, `entry` or `entry_content`", app.name),
        ));
    }
    if let Some(mode) = &app.load_script_mode
        && !matches!(mode.as_str(), "script" | "fetch" | "import")
    {
        return Err(invalid(
            format!("{field}.load_script_mode"),
            format!("unsupported mode '{mode}'; expected one of: script, fetch, import"),
        ));
    }
    for path in &app.active_path {
        let value = match path {
            ActivePathManifest::Path(value) => value,
            ActivePathManifest::Rule(rule) => &rule.value,
        };
        if value.is_empty() {
            return Err(invalid(
                format!("{field}.active_path"),
                "activation paths must not be empty",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app(name: &str) -> AppManifest {
        AppManifest {
            name: name.to_owned(),
            url: vec!["https://x/app.js".to_owned()],
            ..AppManifest::default()
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let config = Config {
            apps: vec![app("shop"), app("shop")],
            ..Config::default()
        };
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("duplicate application name 'shop'"));
    }

    #[test]
    fn manifest_without_source_is_rejected() {
        let mut bare = app("bare");
        bare.url.clear();
        let config = Config {
            apps: vec![bare],
            ..Config::default()
        };
        assert!(matches!(
            validate(&config),
            Err(ConfigError::ValidationError { field, .. }) if field == "app[0]"
        ));
    }

    #[test]
    fn empty_name_and_bad_mode_are_rejected() {
        let config = Config {
            apps: vec![app(" ")],
            ..Config::default()
        };
        assert!(validate(&config).is_err());

        let mut moded = app("moded");
        moded.load_script_mode = Some("eval".to_owned());
        let config = Config {
            apps: vec![moded],
            ..Config::default()
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn bad_logging_is_rejected() {
        let mut config = Config::default();
        config.logging.format = "xml".to_owned();
        assert!(validate(&config).is_err());
    }
}
