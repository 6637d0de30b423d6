//! Reversal scripts for package operations.

pub mod restore;

pub use restore::{RestoreScriptGenerator, render_scripts};
