//! Commonly used types.
//!
//! ```rust,ignore
//! use mosaic_telemetry::prelude::*;
//! ```

pub use crate::{
    FileRotation, LogConfig, LogFormat, LogTarget, TelemetryError, TelemetryResult,
    setup_default_logging, setup_logging,
};
