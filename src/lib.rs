//! Universal ADB Debloater engine.
//!
//! Finds Android devices attached over `adb`, inventories their installed
//! packages, classifies each one against a per-manufacturer knowledge base and
//! applies disable, uninstall or re-enable batches. Every attempt lands in an
//! action history, and restore scripts can be written before anything changes.
//!
//! [`session::Engine`] is the entry point; the `uad` binary is a thin layer
//! over it.

pub mod adb;
pub mod core;
pub mod executor;
pub mod logger;
pub mod recommend;
pub mod scanner;
pub mod scripts;
pub mod session;
