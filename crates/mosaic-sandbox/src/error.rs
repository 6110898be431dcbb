use mosaic_host::ScriptError;
use thiserror::Error;

/// Errors that can occur inside a sandbox.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SandboxError {
    /// The program threw while executing in the sandbox.
    #[error("Error occurred while executing script in sandbox: {0}")]
    Execution(#[from] ScriptError),
}

/// A specialized Result type for sandbox operations.
pub type SandboxResult<T> = Result<T, SandboxError>;
