//! Commonly used types.

pub use crate::{
    AssetError, AssetKind, AssetOrigin, AssetRecord, AssetResolver, AssetResult,
    GlobalAssetCache, ResolvedAssets, SourceLocator,
};
