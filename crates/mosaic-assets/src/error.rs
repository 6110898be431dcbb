//! Asset error types.

use mosaic_host::{FetchError, HostError};
use thiserror::Error;

/// Errors raised while resolving or loading assets.
#[derive(Debug, Clone, Error)]
pub enum AssetError {
    /// The entry document or a resource could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A `<script>` element fired `error`.
    #[error("The script resources loaded error: {url}: {message}")]
    ScriptLoad {
        /// Script URL.
        url: String,
        /// Failure reason.
        message: String,
    },

    /// The source locator names neither URLs nor an entry.
    #[error("Application {0} has neither url nor entry")]
    MissingSource(String),

    /// A host operation failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// A specialized Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;
