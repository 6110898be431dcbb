//! Mosaic Sandbox - an emulated, revertible view of the host global object.
//!
//! A [`Sandbox`] implements [`Scope`](mosaic_host::Scope) on top of the real
//! host global. Reads fall through to the host, writes are bookkept, and every
//! listener and timer registered through the sandbox is recorded so that
//! [`Sandbox::clear`] can replay the inverse of everything the application did.
//!
//! Isolation is best effort: code that reaches the host global by other means
//! is not contained.
//!
//! # Example
//!
//! ```rust,ignore
//! use mosaic_sandbox::{Sandbox, SandboxOptions};
//!
//! let sandbox = Sandbox::new(host.global(), host.engine(), SandboxOptions::default());
//! sandbox.execute("window.shop = {}")?;
//! sandbox.clear();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod sandbox;

pub use error::{SandboxError, SandboxResult};
pub use sandbox::{Sandbox, SandboxOptions, SandboxState};
