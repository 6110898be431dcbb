//! Commonly used types.
//!
//! ```rust,ignore
//! use mosaic_runtime::prelude::*;
//! ```

pub use crate::{
    ActivePath, AppConfig, AppStatus, ExtensionHooks, HookStage, MicroApp, Mosaic, PathRule,
    PrefetchPolicy, RuntimeError, RuntimeResult, SandboxConfig, StartOptions,
};

pub use mosaic_assets::{ScriptAttributes, SourceLocator};
pub use mosaic_host::{Host, HostValue, MemoryHost};
pub use mosaic_loader::LoadStrategy;
