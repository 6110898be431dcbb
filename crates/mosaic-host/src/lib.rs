//! Mosaic Host - the environment seams the Mosaic runtime is built against.
//!
//! Micro-applications are loaded into a single host page. Everything the core
//! needs from that page is expressed here as an explicit interface:
//!
//! - [`HostValue`] / [`HostFunction`]: dynamic values living on the global object
//! - [`Scope`]: the `get` / `set` / `has` capability through which scripts see globals
//! - [`HostGlobal`]: the single real global object (timers, event listeners)
//! - [`Document`]: head elements and named mount containers
//! - [`History`]: the navigable location and its mutation API
//! - [`Fetch`]: network access for entry documents, scripts and stylesheets
//! - [`ScriptEngine`]: the one place where program text is evaluated
//! - [`Host`]: the bundle of all of the above, with [`MemoryHost`] as the
//!   in-memory implementation used for headless embedding and tests
//!
//! # Asset tagging
//!
//! Elements inserted on behalf of applications carry
//! `mosaic="dynamic"`; elements that belonged to the host page before the
//! runtime started are tagged `mosaic="static"` and are never removed.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod document;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod global;
pub mod history;
pub mod host;
pub mod scope;
pub mod value;

pub use document::{
    ASSET_MARKER_ATTR, DYNAMIC_MARKER, Document, Element, ElementId, OWNER_ATTR, STATIC_MARKER,
};
pub use engine::{ModuleNamespace, ScriptEngine};
pub use error::{HostError, HostResult, ScriptError};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use fetch::{Fetch, FetchError};
pub use global::{
    HostEvent, HostGlobal, ListenerInterceptor, MemoryGlobal, SELF_KEYS, TimerHandle, handle_arg,
};
pub use history::{History, NavigationEvent, NavigationHook, NavigationKind};
pub use host::{Host, MemoryHost};
pub use scope::Scope;
pub use value::{CallArgs, HostFunction, HostValue, ScopeRef};
