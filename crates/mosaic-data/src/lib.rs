//! Mosaic Data - cross-application data exchange.
//!
//! Three small collaborators, each an explicit instance rather than ambient
//! state:
//!
//! - [`Cache`]: a flat key/value namespace (the runtime keeps `basename` and
//!   `root` here)
//! - [`Store`]: observable state; callbacks fire whenever a key is set
//! - [`EventEmitter`]: publish/subscribe by [`EventKey`]

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod cache;
mod event;
mod key;
mod store;

pub use cache::Cache;
pub use event::{EventCallback, EventEmitter};
pub use key::EventKey;
pub use store::{Store, StoreCallback};

/// Cache key for the basename shared with applications.
pub const BASENAME_KEY: &str = "basename";
/// Cache key for the mount root shared with applications.
pub const ROOT_KEY: &str = "root";
