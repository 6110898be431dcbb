//! Runtime error types.

use mosaic_assets::AssetError;
use mosaic_host::{HostError, ScriptError};
use mosaic_loader::LoaderError;
use thiserror::Error;

/// Errors raised by the registry, the orchestrator and the router.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An application with this name is already registered.
    #[error("Application {0} has already been registered")]
    DuplicateName(String),

    /// No application with this name is registered.
    #[error("Can not find app {0}")]
    MissingApp(String),

    /// Neither the start options nor the host provide a fetch capability.
    #[error("Current environment does not support fetch, please provide one through start options")]
    UnsupportedFetch,

    /// An activation path could not be compiled.
    #[error("Invalid activation path {pattern}: {message}")]
    InvalidPath {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        message: String,
    },

    /// A configured load strategy name is unknown.
    #[error("Invalid load strategy: {0}")]
    InvalidStrategy(String),

    /// Loading the application failed.
    #[error(transparent)]
    Loader(#[from] LoaderError),

    /// Resolving the application's assets failed.
    #[error(transparent)]
    Asset(#[from] AssetError),

    /// A lifecycle hook threw.
    #[error("Lifecycle hook {hook} of {app} failed: {source}")]
    Hook {
        /// Application name.
        app: String,
        /// Hook name (`bootstrap`, `mount`, `unmount`, `update`).
        hook: &'static str,
        /// What the hook threw.
        #[source]
        source: ScriptError,
    },

    /// The host rejected an operation.
    #[error(transparent)]
    Host(#[from] HostError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
