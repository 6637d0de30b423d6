//! Manufacturer knowledge bases: recommended action, risk tier and rationale
//! per application identifier.

#![allow(missing_docs)]

pub mod store;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

pub use store::{RecommendationStore, normalize_manufacturer};

/// What the knowledge base suggests doing with a package.
///
/// Strings that are none of the known actions are kept verbatim in `Other`
/// and count as actionable for "select recommended".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecommendedAction {
    Keep,
    Disable,
    Uninstall,
    Other(String),
}

impl RecommendedAction {
    /// `None` for blank input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(match trimmed.to_ascii_lowercase().as_str() {
            "keep" => Self::Keep,
            "disable" => Self::Disable,
            "uninstall" => Self::Uninstall,
            _ => Self::Other(trimmed.to_string()),
        })
    }

    /// Anything but `keep` is a candidate for bulk selection.
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        !matches!(self, Self::Keep)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Keep => "keep",
            Self::Disable => "disable",
            Self::Uninstall => "uninstall",
            Self::Other(raw) => raw,
        }
    }
}

impl Serialize for RecommendedAction {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    /// `None` for blank or unrecognized input.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of a knowledge base, exactly as read (missing fields are `""`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecommendationEntry {
    pub identifier: String,
    pub action: String,
    pub risk: String,
    pub rationale: String,
}

impl RecommendationEntry {
    #[must_use]
    pub fn recommended_action(&self) -> Option<RecommendedAction> {
        RecommendedAction::parse(&self.action)
    }

    #[must_use]
    pub fn risk_tier(&self) -> Option<RiskTier> {
        RiskTier::parse(&self.risk)
    }

    #[must_use]
    pub fn rationale(&self) -> Option<&str> {
        let trimmed = self.rationale.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Parsed knowledge base for one manufacturer key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeBase {
    entries: HashMap<String, RecommendationEntry>,
    source: Option<PathBuf>,
    digest: Option<String>,
}

impl KnowledgeBase {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(
        entries: HashMap<String, RecommendationEntry>,
        source: Option<PathBuf>,
        digest: Option<String>,
    ) -> Self {
        Self {
            entries,
            source,
            digest,
        }
    }

    #[must_use]
    pub fn get(&self, identifier: &str) -> Option<&RecommendationEntry> {
        self.entries.get(identifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn entries(&self) -> &HashMap<String, RecommendationEntry> {
        &self.entries
    }

    /// Entries sorted by identifier, for stable listings.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<&RecommendationEntry> {
        let mut rows: Vec<_> = self.entries.values().collect();
        rows.sort_by(|left, right| left.identifier.cmp(&right.identifier));
        rows
    }

    /// Pack file the entries came from; `None` when no pack exists.
    #[must_use]
    pub fn source(&self) -> Option<&PathBuf> {
        self.source.as_ref()
    }

    /// Hex sha256 of the pack bytes.
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parsing_is_case_insensitive_and_permissive() {
        assert_eq!(RecommendedAction::parse("Disable"), Some(RecommendedAction::Disable));
        assert_eq!(RecommendedAction::parse(" KEEP "), Some(RecommendedAction::Keep));
        assert_eq!(RecommendedAction::parse(""), None);
        assert_eq!(
            RecommendedAction::parse("review"),
            Some(RecommendedAction::Other("review".to_string()))
        );
        assert!(RecommendedAction::Other("review".to_string()).is_actionable());
        assert!(!RecommendedAction::Keep.is_actionable());
    }

    #[test]
    fn risk_parsing_ignores_unknown_tiers() {
        assert_eq!(RiskTier::parse("HIGH"), Some(RiskTier::High));
        assert_eq!(RiskTier::parse("severe"), None);
        assert!(RiskTier::High > RiskTier::Low);
    }

    #[test]
    fn entry_accessors_treat_blank_as_absent() {
        let entry = RecommendationEntry {
            identifier: "com.facebook.appmanager".to_string(),
            action: "uninstall".to_string(),
            risk: String::new(),
            rationale: "  ".to_string(),
        };
        assert_eq!(entry.recommended_action(), Some(RecommendedAction::Uninstall));
        assert_eq!(entry.risk_tier(), None);
        assert_eq!(entry.rationale(), None);
    }
}
