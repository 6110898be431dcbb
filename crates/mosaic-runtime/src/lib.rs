//! Mosaic Runtime - registering, activating and routing micro-frontends.
//!
//! This crate provides:
//! - [`AppConfig`] / [`MicroApp`]: what is registered, and its runtime state
//! - [`AppRegistry`]: the ordered, name-keyed set of applications
//! - [`ActivationMatcher`]: path patterns compiled against the framework basename
//! - [`LifecycleOrchestrator`]: the status state machine around the loader
//! - [`Router`]: navigation tracking and reconciliation
//! - [`Mosaic`]: the facade tying them together
//!
//! # Example
//!
//! ```rust,ignore
//! use mosaic_runtime::prelude::*;
//!
//! let mosaic = Mosaic::new(host);
//! mosaic.register(
//!     AppConfig::new("shop", SourceLocator::urls(["https://x/app.js", "https://x/app.css"]))
//!         .active_path("/shop")
//!         .container("root"),
//! )?;
//! mosaic.start(StartOptions::new().on_error(|app, e| eprintln!("{app}: {e}"))).await?;
//! mosaic.host().history().push_state(HostValue::Null, "/shop")?;
//! mosaic.settled().await;
//! assert_eq!(mosaic.status("shop"), Some(AppStatus::Mounted));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod activation;
pub mod app;
pub mod error;
pub mod hooks;
pub mod options;
pub mod orchestrator;
pub mod prefetch;
pub mod registry;
pub mod router;
pub mod runtime;
pub mod status;

pub use activation::{ActivationMatcher, ActivePath, PathRule};
pub use app::{AppConfig, AppRef, MicroApp, SandboxConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use hooks::{ExtensionHooks, HookStage};
pub use options::{RouteChange, StartOptions};
pub use orchestrator::LifecycleOrchestrator;
pub use prefetch::PrefetchPolicy;
pub use registry::AppRegistry;
pub use router::{CapturedListeners, Router};
pub use runtime::Mosaic;
pub use status::AppStatus;
