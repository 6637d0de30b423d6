//! The package projection for the currently selected device.
//!
//! A session owns its records outright. Opening another device builds a new
//! session; nothing carries over.

use std::fmt::Write as _;
use std::sync::Arc;

use super::events::{EventBus, SessionEvent};
use crate::adb::DeviceIdentity;
use crate::recommend::{KnowledgeBase, RiskTier};
use crate::scanner::PackageRecord;

/// Header of the package-list CSV export.
pub const CSV_HEADER: &str = "Package,Label,Type,Risk,Recommended Action";

#[derive(Debug)]
pub struct DeviceSession {
    identity: DeviceIdentity,
    knowledge_base: Arc<KnowledgeBase>,
    records: Vec<PackageRecord>,
    /// Trimmed, lowercased query; empty shows everything.
    filter: String,
    bus: Option<Arc<EventBus>>,
}

impl DeviceSession {
    #[must_use]
    pub fn new(
        identity: DeviceIdentity,
        knowledge_base: Arc<KnowledgeBase>,
        records: Vec<PackageRecord>,
    ) -> Self {
        Self {
            identity,
            knowledge_base,
            records,
            filter: String::new(),
            bus: None,
        }
    }

    /// Emit [`SessionEvent::FilterApplied`] on `bus` when the filter changes.
    #[must_use]
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    #[must_use]
    pub fn serial(&self) -> &str {
        &self.identity.serial
    }

    #[must_use]
    pub fn knowledge_base(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge_base
    }

    #[must_use]
    pub fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Replace the filter and return how many rows are now visible.
    pub fn set_filter(&mut self, query: &str) -> usize {
        self.filter = query.trim().to_lowercase();
        let visible = self.visible().count();
        if let Some(bus) = &self.bus {
            bus.emit(SessionEvent::FilterApplied {
                query: self.filter.clone(),
                visible,
                total: self.records.len(),
            });
        }
        visible
    }

    /// Rows matching the filter, in scan order.
    pub fn visible(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.iter().filter(|r| r.matches(&self.filter))
    }

    fn visible_mut(&mut self) -> impl Iterator<Item = &mut PackageRecord> {
        let filter = self.filter.as_str();
        self.records.iter_mut().filter(move |r| r.matches(filter))
    }

    /// Select or clear every visible row; hidden rows keep their state.
    pub fn select_all(&mut self, selected: bool) -> usize {
        let mut touched = 0;
        for record in self.visible_mut() {
            record.selected = selected;
            touched += 1;
        }
        touched
    }

    /// Select exactly the visible rows whose recommendation is not `keep`.
    ///
    /// Visible rows without an actionable recommendation are deselected.
    pub fn select_recommended(&mut self) -> usize {
        let mut selected = 0;
        for record in self.visible_mut() {
            record.selected = record.is_recommended();
            selected += usize::from(record.selected);
        }
        selected
    }

    /// Returns `false` when no record has that identifier.
    pub fn select(&mut self, identifier: &str, selected: bool) -> bool {
        match self
            .records
            .iter_mut()
            .find(|r| r.identifier == identifier)
        {
            Some(record) => {
                record.selected = selected;
                true
            }
            None => false,
        }
    }

    /// Visible selected rows in scan order; what a batch acts on.
    pub fn selected(&self) -> impl Iterator<Item = &PackageRecord> {
        self.visible().filter(|r| r.selected)
    }

    #[must_use]
    pub fn selected_identifiers(&self) -> Vec<String> {
        self.selected().map(|r| r.identifier.clone()).collect()
    }

    #[must_use]
    pub fn high_risk_selected(&self) -> usize {
        self.selected()
            .filter(|r| r.risk_tier == Some(RiskTier::High))
            .count()
    }

    /// Visible rows as CSV, every field quoted.
    #[must_use]
    pub fn export_csv(&self) -> String {
        self.export_csv_rows(self.visible())
    }

    /// `rows` as CSV, every field quoted.
    ///
    /// Risk and action are written as the knowledge base spells them; rows
    /// without a knowledge-base entry fall back to their parsed values.
    #[must_use]
    pub fn export_csv_rows<'a>(&self, rows: impl IntoIterator<Item = &'a PackageRecord>) -> String {
        let mut csv = String::from(CSV_HEADER);
        csv.push('\n');
        for record in rows {
            let entry = self.knowledge_base.get(&record.identifier);
            let risk = entry.map_or_else(
                || record.risk_tier.map_or("", RiskTier::as_str),
                |e| e.risk.as_str(),
            );
            let action = entry.map_or_else(
                || {
                    record
                        .recommended_action
                        .as_ref()
                        .map_or("", |action| action.as_str())
                },
                |e| e.action.as_str(),
            );
            let fields = [
                record.identifier.as_str(),
                record.display_label.as_str(),
                record.origin.as_str(),
                risk,
                action,
            ];
            let quoted: Vec<String> = fields.iter().map(|f| quote(f)).collect();
            let _ = writeln!(csv, "{}", quoted.join(","));
        }
        csv
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
