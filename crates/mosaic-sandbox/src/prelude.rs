//! Commonly used types.

pub use crate::{Sandbox, SandboxError, SandboxOptions, SandboxResult, SandboxState};
