//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge `~/.mosaic/config.toml` (user)
//! 3. Merge `{workspace}/mosaic.toml` (workspace)
//! 4. Apply `MOSAIC_*` env var fallbacks for fields no file set
//! 5. Deserialize merged tree → `Config`
//! 6. Validate

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::{apply_env_fallbacks, collect_env_vars};
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{collect_leaf_paths, deep_merge};
use crate::show::ResolvedConfig;
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Workspace config file name.
pub const WORKSPACE_FILE: &str = "mosaic.toml";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// Load the configuration with layered file precedence.
///
/// `workspace_root` is the directory holding `mosaic.toml`; if `None`, the
/// workspace layer is skipped. `mosaic_home_override` replaces the
/// `~/.mosaic` directory for user-level discovery.
///
/// # Errors
///
/// Returns a [`ConfigError`] if any config file is malformed, or if the
/// final merged configuration fails validation.
pub fn load(
    workspace_root: Option<&Path>,
    mosaic_home_override: Option<&Path>,
) -> ConfigResult<ResolvedConfig> {
    let env_vars = collect_env_vars();

    // 1. Embedded defaults.
    let mut merged: toml::Value =
        toml::from_str(DEFAULTS_TOML).map_err(|e| ConfigError::ParseError {
            path: "<embedded defaults>".to_owned(),
            source: e,
        })?;

    let mut file_fields = BTreeSet::new();
    let mut loaded_files = Vec::new();

    // 2. User config.
    let user_path = match mosaic_home_override {
        Some(home) => home.join("config.toml"),
        None => home_directory()?.join(".mosaic").join("config.toml"),
    };
    if let Some(overlay) = try_load_file(&user_path)? {
        collect_leaf_paths(&overlay, "", &mut file_fields);
        deep_merge(&mut merged, &overlay);
        loaded_files.push(user_path.display().to_string());
        info!(path = %user_path.display(), "Loaded user config");
    }

    // 3. Workspace config.
    if let Some(root) = workspace_root {
        let ws_path = root.join(WORKSPACE_FILE);
        if let Some(overlay) = try_load_file(&ws_path)? {
            collect_leaf_paths(&overlay, "", &mut file_fields);
            deep_merge(&mut merged, &overlay);
            loaded_files.push(ws_path.display().to_string());
            info!(path = %ws_path.display(), "Loaded workspace config");
        }
    }

    // 4. Env fallbacks.
    let env_count = apply_env_fallbacks(&mut merged, &file_fields, &env_vars);
    if env_count > 0 {
        debug!(count = env_count, "Applied environment variable fallbacks");
    }

    // 5. Deserialize.
    let config: Config =
        merged
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::ParseError {
                path: "<merged config>".to_owned(),
                source: e,
            })?;

    // 6. Validate.
    validate::validate(&config)?;

    Ok(ResolvedConfig {
        config,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed or
/// validated.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let content = read_bounded(path)?;
    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

fn read_bounded(path: &Path) -> ConfigResult<String> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    check_size(path, &content)?;
    Ok(content)
}

fn check_size(path: &Path, content: &str) -> ConfigResult<()> {
    if content.len() as u64 > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::ValidationError {
            field: path.display().to_string(),
            message: format!(
                "config file is {} bytes, exceeding the {MAX_CONFIG_FILE_SIZE} byte limit",
                content.len()
            ),
        });
    }
    Ok(())
}

/// Try to load a file, returning `None` if the file doesn't exist.
fn try_load_file(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Config file not found, skipping");
            return Ok(None);
        },
        Err(e) => {
            return Err(ConfigError::ReadError {
                path: path.display().to_string(),
                source: e,
            });
        },
    };
    check_size(path, &content)?;

    let value: toml::Value = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(Some(value))
}

/// Determine the user's home directory.
fn home_directory() -> ConfigResult<PathBuf> {
    directories::BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .ok_or(ConfigError::NoHomeDir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrefetchSetting;

    #[test]
    fn defaults_deserialize_to_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config.runtime.fetch_timeout_secs, 30);
        assert!(config.runtime.remove_assets_on_unmount);
        assert_eq!(config.logging.level, "info");
        assert!(config.apps.is_empty());
    }

    #[test]
    fn workspace_layer_overrides_user_layer() {
        let home = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        std::fs::write(
            home.path().join("config.toml"),
            "[runtime]\nbasename = \"/user\"\nfetch_timeout_secs = 10\n",
        )
        .unwrap();
        std::fs::write(
            workspace.path().join(WORKSPACE_FILE),
            r#"
            [runtime]
            basename = "/portal"
            prefetch = ["shop"]

            [[app]]
            name = "shop"
            url = ["https://x/app.js"]
            "#,
        )
        .unwrap();

        let resolved = load(Some(workspace.path()), Some(home.path())).unwrap();
        let config = resolved.config;
        assert_eq!(config.runtime.basename.as_deref(), Some("/portal"));
        assert_eq!(config.runtime.fetch_timeout_secs, 10);
        assert_eq!(config.runtime.prefetch, PrefetchSetting::Names(vec!["shop".into()]));
        assert_eq!(config.apps.len(), 1);
        assert_eq!(resolved.loaded_files.len(), 2);
    }

    #[test]
    fn missing_files_fall_back_to_defaults() {
        let home = tempfile::tempdir().unwrap();
        let resolved = load(None, Some(home.path())).unwrap();
        assert!(resolved.loaded_files.is_empty());
        assert!(resolved.config.apps.is_empty());
    }

    #[test]
    fn invalid_workspace_fails_validation() {
        let home = tempfile::tempdir().unwrap();
        let workspace = tempfile::tempdir().unwrap();
        std::fs::write(
            workspace.path().join(WORKSPACE_FILE),
            "[[app]]\nname = \"a\"\nurl = [\"x.js\"]\n[[app]]\nname = \"a\"\nurl = [\"y.js\"]\n",
        )
        .unwrap();
        assert!(matches!(
            load(Some(workspace.path()), Some(home.path())),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[runtime\n").unwrap();
        assert!(matches!(load_file(&path), Err(ConfigError::ParseError { .. })));
        assert!(matches!(
            load_file(&dir.path().join("absent.toml")),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = try_load_file(&file_path);
        assert!(
            matches!(result, Err(ConfigError::ValidationError { .. })),
            "Expected ValidationError for oversized config, got: {result:?}"
        );
    }
}
