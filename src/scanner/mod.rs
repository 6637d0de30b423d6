//! Installed-package inventory for one device.

#![allow(missing_docs)]

pub mod packages;

use std::fmt;

use serde::Serialize;

use crate::recommend::{RecommendedAction, RiskTier};

pub use packages::{PackageScanner, classify, display_label, parse_package_list};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageOrigin {
    System,
    User,
}

impl PackageOrigin {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "System",
            Self::User => "User",
        }
    }
}

impl fmt::Display for PackageOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One installed application as seen by a single scan.
///
/// Records are rebuilt on every scan; only `selected` changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageRecord {
    pub identifier: String,
    pub display_label: String,
    pub origin: PackageOrigin,
    pub recommended_action: Option<RecommendedAction>,
    pub risk_tier: Option<RiskTier>,
    pub rationale: Option<String>,
    pub selected: bool,
}

impl PackageRecord {
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        display_label: impl Into<String>,
        origin: PackageOrigin,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            display_label: display_label.into(),
            origin,
            recommended_action: None,
            risk_tier: None,
            rationale: None,
            selected: false,
        }
    }

    /// Case-insensitive substring match over identifier and label.
    #[must_use]
    pub fn matches(&self, needle_lower: &str) -> bool {
        needle_lower.is_empty()
            || self.identifier.to_lowercase().contains(needle_lower)
            || self.display_label.to_lowercase().contains(needle_lower)
    }

    #[must_use]
    pub fn is_recommended(&self) -> bool {
        self.recommended_action
            .as_ref()
            .is_some_and(RecommendedAction::is_actionable)
    }
}
