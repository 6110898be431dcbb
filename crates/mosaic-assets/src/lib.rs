//! Mosaic Assets - turning application sources into scripts and stylesheets.
//!
//! This crate provides:
//! - [`AssetRecord`] / [`ResolvedAssets`]: the ordered script and style units of one application
//! - [`SourceLocator`]: an explicit URL list, or an entry document
//! - [`AssetResolver`]: URL classification and entry-document processing
//! - [`GlobalAssetCache`]: write-once caches for processed entries and fetched resource text
//! - [`dom`]: inserting assets into the host document and removing them again
//!
//! # Example
//!
//! ```rust,ignore
//! use mosaic_assets::{AssetResolver, GlobalAssetCache, SourceLocator};
//!
//! let resolver = AssetResolver::new(Arc::new(GlobalAssetCache::new()), fetch);
//! let assets = resolver
//!     .resolve(&SourceLocator::urls(["https://x/app.js", "https://x/app.css"]), "shop", href)
//!     .await?;
//! assert_eq!(assets.scripts.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod cache;
pub mod dom;
pub mod error;
pub mod html;
pub mod record;
pub mod resolver;
pub mod urls;

pub use cache::GlobalAssetCache;
pub use dom::{RemovalScope, ScriptAttributes, ShouldRemove};
pub use error::{AssetError, AssetResult};
pub use record::{AssetKind, AssetOrigin, AssetRecord, ResolvedAssets};
pub use resolver::{AssetResolver, SourceLocator};
