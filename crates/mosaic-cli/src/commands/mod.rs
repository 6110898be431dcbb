//! Subcommand implementations.

pub(crate) mod config;
pub(crate) mod matcher;
pub(crate) mod resolve;
