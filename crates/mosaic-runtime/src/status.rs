//! Application status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Where an application is in its lifecycle.
///
/// ```text
/// NOT_LOADED -> LOADING_ASSETS -> NOT_MOUNTED <-> MOUNTED
///                     |
///                     +-> LOAD_ERROR
/// MOUNTED | LOADING_ASSETS | NOT_MOUNTED -> UNMOUNTED -> NOT_LOADED
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppStatus {
    /// Registered, nothing fetched.
    #[default]
    NotLoaded,
    /// Assets are being resolved and executed.
    LoadingAssets,
    /// The last load failed.
    LoadError,
    /// Loaded, not rendered.
    NotMounted,
    /// Rendered into its container.
    Mounted,
    /// Torn down; hooks are kept for a cheap re-mount.
    Unmounted,
}

impl AppStatus {
    /// Canonical name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotLoaded => "NOT_LOADED",
            Self::LoadingAssets => "LOADING_ASSETS",
            Self::LoadError => "LOAD_ERROR",
            Self::NotMounted => "NOT_MOUNTED",
            Self::Mounted => "MOUNTED",
            Self::Unmounted => "UNMOUNTED",
        }
    }

    /// Whether `unmount` applies in this status.
    #[must_use]
    pub fn can_unmount(self) -> bool {
        matches!(self, Self::Mounted | Self::LoadingAssets | Self::NotMounted)
    }

    /// Whether `mount` applies in this status.
    #[must_use]
    pub fn can_mount(self) -> bool {
        matches!(self, Self::NotMounted | Self::Unmounted)
    }
}

impl fmt::Display for AppStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
