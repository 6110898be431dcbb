//! Mosaic Telemetry - Logging setup for the Mosaic runtime.
//!
//! This crate provides:
//! - Configurable `tracing` subscriber setup with several formats
//! - Output to stdout, stderr or rotating files
//! - Conversion from the `[logging]` config section (feature `config`)
//!
//! # Example
//!
//! ```rust,no_run
//! use mosaic_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), mosaic_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("mosaic_runtime=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("Runtime starting");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
