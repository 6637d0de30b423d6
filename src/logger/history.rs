//! Append-only, in-memory action history with a fixed-width text export.
//!
//! Appends never touch storage; exporting renders a string and leaves writing
//! it anywhere to the caller.

use std::fmt::Write as _;

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;

/// Title line of the text export.
pub const EXPORT_BANNER: &str = "ADB Debloater - Action History";

const RULE_WIDTH: usize = 80;
const OPERATION_WIDTH: usize = 9;

/// One executed operation. Never mutated after it is logged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub timestamp: DateTime<Local>,
    pub operation: String,
    pub package_identifier: String,
    pub succeeded: bool,
}

impl HistoryEntry {
    /// `[HH:MM:SS] ✓ DISABLE   - com.example.app`
    #[must_use]
    pub fn render(&self) -> String {
        let mark = if self.succeeded { '✓' } else { '✗' };
        format!(
            "[{}] {mark} {:<width$} - {}",
            self.timestamp.format("%H:%M:%S"),
            self.operation.to_uppercase(),
            self.package_identifier,
            width = OPERATION_WIDTH,
        )
    }
}

/// Success and failure counts over the whole log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HistorySummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Thread-safe append-only log, oldest entry first.
#[derive(Debug, Default)]
pub struct ActionHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl ActionHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current local time.
    pub fn log(&self, operation: &str, package_identifier: &str, succeeded: bool) -> HistoryEntry {
        let entry = HistoryEntry {
            timestamp: Local::now(),
            operation: operation.to_string(),
            package_identifier: package_identifier.to_string(),
            succeeded,
        };
        self.entries.lock().push(entry.clone());
        entry
    }

    /// Snapshot in execution order.
    #[must_use]
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.lock().clone()
    }

    /// Drop every entry. Irreversible.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[must_use]
    pub fn summary(&self) -> HistorySummary {
        let entries = self.entries.lock();
        let succeeded = entries.iter().filter(|e| e.succeeded).count();
        HistorySummary {
            total: entries.len(),
            succeeded,
            failed: entries.len() - succeeded,
        }
    }

    /// Banner, rule, blank line, then one rendered line per entry.
    #[must_use]
    pub fn export_to_text(&self) -> String {
        let entries = self.entries.lock();
        let mut text = String::with_capacity(128 + entries.len() * 64);
        text.push_str(EXPORT_BANNER);
        text.push('\n');
        text.push_str(&"=".repeat(RULE_WIDTH));
        text.push_str("\n\n");
        for entry in entries.iter() {
            let _ = writeln!(text, "{}", entry.render());
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn log_appends_in_order() {
        let history = ActionHistory::new();
        history.log("disable", "com.a", true);
        history.log("uninstall", "com.b", false);

        let entries = history.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].package_identifier, "com.a");
        assert_eq!(entries[1].package_identifier, "com.b");
        assert!(entries[0].timestamp <= entries[1].timestamp);
        assert_eq!(
            history.summary(),
            HistorySummary {
                total: 2,
                succeeded: 1,
                failed: 1
            }
        );
    }

    #[test]
    fn clear_empties_the_log() {
        let history = ActionHistory::new();
        history.log("enable", "com.a", true);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.summary(), HistorySummary::default());
    }

    #[test]
    fn render_is_fixed_width() {
        let entry = HistoryEntry {
            timestamp: Local
                .with_ymd_and_hms(2025, 11, 13, 9, 5, 7)
                .single()
                .expect("unambiguous time"),
            operation: "disable".to_string(),
            package_identifier: "com.facebook.appmanager".to_string(),
            succeeded: true,
        };
        assert_eq!(entry.render(), "[09:05:07] ✓ DISABLE   - com.facebook.appmanager");

        let failed = HistoryEntry {
            succeeded: false,
            operation: "uninstall".to_string(),
            ..entry
        };
        assert_eq!(failed.render(), "[09:05:07] ✗ UNINSTALL - com.facebook.appmanager");
    }

    #[test]
    fn export_has_banner_rule_and_one_line_per_entry() {
        let history = ActionHistory::new();
        history.log("disable", "com.a", true);
        history.log("enable", "com.b", false);

        let text = history.export_to_text();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], EXPORT_BANNER);
        assert_eq!(lines[1], "=".repeat(80));
        assert_eq!(lines[2], "");
        assert_eq!(lines.len(), 5);
        assert!(lines[3].ends_with("✓ DISABLE   - com.a"));
        assert!(lines[4].ends_with("✗ ENABLE    - com.b"));
    }

    #[test]
    fn empty_export_is_just_the_header() {
        let text = ActionHistory::new().export_to_text();
        assert_eq!(text, format!("{EXPORT_BANNER}\n{}\n\n", "=".repeat(80)));
    }
}
