//! Environment variable fallbacks.
//!
//! Env vars are **fallback**, not override: they only fill fields that no
//! config file set.

use std::collections::{BTreeSet, HashMap};

use tracing::{debug, warn};

/// Mapping from environment variable name to config field path.
struct EnvMapping {
    var_name: &'static str,
    field_path: &'static str,
    kind: EnvKind,
}

#[derive(Clone, Copy)]
enum EnvKind {
    String,
    Integer,
    Bool,
}

const ENV_MAPPINGS: &[EnvMapping] = &[
    EnvMapping {
        var_name: "MOSAIC_BASENAME",
        field_path: "runtime.basename",
        kind: EnvKind::String,
    },
    EnvMapping {
        var_name: "MOSAIC_PREFETCH",
        field_path: "runtime.prefetch",
        kind: EnvKind::Bool,
    },
    EnvMapping {
        var_name: "MOSAIC_FETCH_TIMEOUT_SECS",
        field_path: "runtime.fetch_timeout_secs",
        kind: EnvKind::Integer,
    },
    EnvMapping {
        var_name: "MOSAIC_REMOVE_ASSETS_ON_UNMOUNT",
        field_path: "runtime.remove_assets_on_unmount",
        kind: EnvKind::Bool,
    },
    EnvMapping {
        var_name: "MOSAIC_LOG_LEVEL",
        field_path: "logging.level",
        kind: EnvKind::String,
    },
    EnvMapping {
        var_name: "MOSAIC_LOG_FORMAT",
        field_path: "logging.format",
        kind: EnvKind::String,
    },
];

/// Snapshot every `MOSAIC_*` variable from the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with("MOSAIC_"))
        .collect()
}

fn parse(mapping: &EnvMapping, raw: &str) -> Option<toml::Value> {
    match mapping.kind {
        EnvKind::String => Some(toml::Value::String(raw.to_owned())),
        EnvKind::Integer => raw.trim().parse().ok().map(toml::Value::Integer),
        EnvKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(toml::Value::Boolean(true)),
            "0" | "false" | "no" | "off" => Some(toml::Value::Boolean(false)),
            _ => None,
        },
    }
}

fn set_path(root: &mut toml::Value, path: &str, value: toml::Value) {
    let mut current = root;
    let mut segments = path.split('.').peekable();
    while let Some(segment) = segments.next() {
        let Some(table) = current.as_table_mut() else {
            return;
        };
        if segments.peek().is_none() {
            table.insert(segment.to_owned(), value);
            return;
        }
        current = table
            .entry(segment)
            .or_insert_with(|| toml::Value::Table(toml::map::Map::new()));
    }
}

/// Apply env fallbacks to every mapped field not listed in `file_fields`.
/// Returns how many fields were filled.
pub fn apply_env_fallbacks(
    merged: &mut toml::Value,
    file_fields: &BTreeSet<String>,
    env_vars: &HashMap<String, String>,
) -> usize {
    let mut applied = 0usize;
    for mapping in ENV_MAPPINGS {
        if file_fields.contains(mapping.field_path) {
            continue;
        }
        let Some(raw) = env_vars.get(mapping.var_name) else {
            continue;
        };
        let Some(value) = parse(mapping, raw) else {
            warn!(var = mapping.var_name, value = %raw, "Ignoring unparseable environment variable");
            continue;
        };
        debug!(var = mapping.var_name, field = mapping.field_path, "Applied env fallback");
        set_path(merged, mapping.field_path, value);
        applied = applied.saturating_add(1);
    }
    applied
}
