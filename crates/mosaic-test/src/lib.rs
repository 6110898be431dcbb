//! Mosaic Test - Shared test utilities for the Mosaic runtime.
//!
//! This crate provides mock implementations of the host seams and fixture
//! helpers that can be used across multiple Mosaic crates as a dev-dependency.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! mosaic-test.workspace = true
//! ```
//!
//! ```rust,ignore
//! use mosaic_test::{MockEngine, MockFetcher, memory_host};
//!
//! #[tokio::test]
//! async fn loads_once() {
//!     let fetcher = MockFetcher::new().with_response("https://x/app.js", "app");
//!     let host = memory_host(MockEngine::new(), fetcher.clone());
//!     // ...
//!     assert_eq!(fetcher.fetch_count("https://x/app.js"), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
