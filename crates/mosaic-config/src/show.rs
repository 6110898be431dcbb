//! Resolved configuration display for `config show`.

use std::fmt::{self, Write as _};

use crate::types::Config;

/// A resolved configuration together with the files it was read from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final merged configuration.
    pub config: Config,
    /// Config file paths that were loaded (in precedence order).
    pub loaded_files: Vec<String>,
}

/// Output format for `config show`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// TOML with a header listing the loaded files.
    Toml,
    /// JSON (for programmatic consumption).
    Json,
}

impl ResolvedConfig {
    /// Render the configuration, or one top-level `section` of it.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or `section` does not exist.
    pub fn show(&self, format: ShowFormat, section: Option<&str>) -> Result<String, fmt::Error> {
        match format {
            ShowFormat::Toml => self.show_toml(section),
            ShowFormat::Json => self.show_json(section),
        }
    }

    fn show_toml(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        let body = if let Some(name) = section {
            let val = toml::Value::try_from(&self.config).map_err(|_| fmt::Error)?;
            let section_val = val.get(name).ok_or(fmt::Error)?;
            toml::to_string_pretty(section_val).map_err(|_| fmt::Error)?
        } else {
            toml::to_string_pretty(&self.config).map_err(|_| fmt::Error)?
        };

        let mut output = String::from("# Resolved Mosaic Configuration\n");
        if self.loaded_files.is_empty() {
            output.push_str("# (embedded defaults only)\n");
        } else {
            output.push_str("#\n# Loaded files (in precedence order):\n");
            for (i, path) in self.loaded_files.iter().enumerate() {
                writeln!(output, "#   {}. {path}", i.saturating_add(1))?;
            }
        }
        output.push('\n');
        output.push_str(&body);
        Ok(output)
    }

    fn show_json(&self, section: Option<&str>) -> Result<String, fmt::Error> {
        let value = serde_json::to_value(&self.config).map_err(|_| fmt::Error)?;
        let value = match section {
            Some(name) => value.get(name).cloned().ok_or(fmt::Error)?,
            None => value,
        };
        serde_json::to_string_pretty(&value).map_err(|_| fmt::Error)
    }
}
