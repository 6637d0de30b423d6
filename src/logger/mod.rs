//! Auditable record of executed package operations.

pub mod history;

pub use history::{ActionHistory, HistoryEntry, HistorySummary};
