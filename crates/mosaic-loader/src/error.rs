//! Loader error types.

use mosaic_assets::AssetError;
use mosaic_host::ScriptError;
use mosaic_sandbox::SandboxError;
use thiserror::Error;

/// Errors raised while loading an application's code.
#[derive(Debug, Clone, Error)]
pub enum LoaderError {
    /// A script could not be loaded or fetched.
    #[error("The script resources loaded error: {url}: {message}")]
    AssetLoad {
        /// Script URL.
        url: String,
        /// Failure reason.
        message: String,
    },

    /// The script engine cannot import modules dynamically.
    #[error("You can not use load_script_mode = import where dynamic import is not supported")]
    UnsupportedImport,

    /// No lifecycle hooks were found. Only ever logged.
    #[error("Unable to retrieve lifecycles of {0} after loading it")]
    EmptyLifecycle(String),

    /// A program threw inside the sandbox.
    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    /// A program threw against the host global, or a module failed to import.
    #[error(transparent)]
    Script(#[from] ScriptError),

    /// Any other asset failure.
    #[error(transparent)]
    Asset(AssetError),
}

impl From<AssetError> for LoaderError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::ScriptLoad { url, message } => Self::AssetLoad { url, message },
            AssetError::Fetch(e) => Self::AssetLoad {
                url: e.url,
                message: e.message,
            },
            other => Self::Asset(other),
        }
    }
}

/// A specialized Result type for loader operations.
pub type LoaderResult<T> = Result<T, LoaderError>;
