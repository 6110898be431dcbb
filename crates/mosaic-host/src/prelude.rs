//! Commonly used types.
//!
//! ```rust
//! use mosaic_host::prelude::*;
//! ```

pub use crate::{
    Document, Element, ElementId, Fetch, FetchError, Host, HostError, HostEvent, HostFunction,
    HostGlobal, HostResult, HostValue, MemoryGlobal, MemoryHost, NavigationKind, Scope, ScopeRef,
    ScriptEngine, ScriptError,
};
