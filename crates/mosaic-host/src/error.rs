//! Host error types.

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors raised while evaluating or calling into application code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError {
    /// The program body threw while being evaluated.
    #[error("evaluation failed: {0}")]
    Evaluation(String),

    /// A value that is not a function was invoked.
    #[error("{0} is not a function")]
    NotCallable(String),

    /// A function call threw.
    #[error("call to {name} failed: {message}")]
    CallFailed {
        /// Name of the function that threw.
        name: String,
        /// What it threw.
        message: String,
    },

    /// The engine cannot perform dynamic `import()`.
    #[error("dynamic import is not supported by this script engine")]
    UnsupportedImport,

    /// A module could not be imported.
    #[error("failed to import module {url}: {message}")]
    Import {
        /// Module URL.
        url: String,
        /// Failure reason.
        message: String,
    },
}

/// Errors from host environment operations.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// A network fetch failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// An element fired its `error` event instead of `load`.
    #[error("<{tag}> failed to load {url}: {message}")]
    ElementLoad {
        /// Element tag (`script` or `link`).
        tag: String,
        /// The resource the element referenced.
        url: String,
        /// Failure reason.
        message: String,
    },

    /// A named mount container does not exist.
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    /// A location could not be parsed.
    #[error("invalid url {url}: {message}")]
    InvalidUrl {
        /// The offending URL.
        url: String,
        /// Parse error message.
        message: String,
    },

    /// Script evaluation failed.
    #[error(transparent)]
    Script(#[from] ScriptError),
}

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;
