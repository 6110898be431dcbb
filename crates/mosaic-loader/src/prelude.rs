//! Commonly used types.

pub use crate::{LifecycleHooks, LoadRequest, LoadStrategy, Loader, LoaderError, LoaderResult};
