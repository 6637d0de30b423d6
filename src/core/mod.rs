//! Core plumbing shared by every subsystem: errors, configuration, diagnostics.

pub mod config;
pub mod errors;
#[cfg(feature = "cli")]
pub mod logging;
