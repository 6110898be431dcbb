//! Mosaic Loader - running an application's scripts and finding its lifecycle.
//!
//! Three strategies are supported:
//!
//! - [`LoadStrategy::Script`]: `<script>` elements are inserted into the host
//!   document; hooks come from a library export or a self-registration.
//! - [`LoadStrategy::Fetch`]: program text is fetched through the shared cache
//!   and evaluated in order, optionally inside a [`Sandbox`](mosaic_sandbox::Sandbox);
//!   the global the last script introduced is taken as the export.
//! - [`LoadStrategy::Import`]: scripts are imported as native modules and the
//!   namespace's `mount`/`unmount` are used.
//!
//! All three resolve to one [`LifecycleHooks`] value.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod hooks;
mod loader;

pub use error::{LoaderError, LoaderResult};
pub use hooks::{HookSource, LIBRARY_NAME_KEY, LifecycleHooks, SELF_REGISTRATION_KEY};
pub use loader::{LoadRequest, LoadStrategy, Loader};
