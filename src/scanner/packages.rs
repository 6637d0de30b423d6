//! `pm list packages -f` parsing and knowledge-base classification.

use std::collections::HashSet;
use std::sync::Arc;

use memchr::{memchr, memrchr};
use tracing::{debug, info};

use super::{PackageOrigin, PackageRecord};
use crate::adb::devices::capitalize;
use crate::adb::runner::{CommandExecutor, argv};
use crate::core::errors::{Result, UadError};
use crate::recommend::KnowledgeBase;

/// Install-path fragments that mark a package as shipped with the system image.
pub const SYSTEM_PARTITION_MARKERS: [&str; 3] = ["/system/", "/product/", "/system_ext/"];

/// `System` iff the install path contains a system partition marker.
#[must_use]
pub fn origin_for_path(path: &str) -> PackageOrigin {
    if SYSTEM_PARTITION_MARKERS
        .iter()
        .any(|marker| path.contains(marker))
    {
        PackageOrigin::System
    } else {
        PackageOrigin::User
    }
}

/// Capitalized last dot-separated segment: `com.android.chrome` -> `Chrome`.
#[must_use]
pub fn display_label(identifier: &str) -> String {
    identifier
        .rsplit('.')
        .find(|segment| !segment.is_empty())
        .map_or_else(|| identifier.to_string(), capitalize)
}

/// Split `prefix:<path>=<identifier>` into path and identifier.
///
/// The identifier follows the last `=`; recent Android releases put `=` inside
/// randomized install directories.
fn split_line(line: &str) -> Option<(&str, &str)> {
    let bytes = line.as_bytes();
    let colon = memchr(b':', bytes)?;
    let rest = &line[colon + 1..];
    let equals = memrchr(b'=', rest.as_bytes())?;
    let path = &rest[..equals];
    let identifier = rest[equals + 1..].trim();
    if identifier.is_empty() || identifier.contains(char::is_whitespace) {
        return None;
    }
    Some((path, identifier))
}

/// Parse a package listing into fresh, unclassified records.
///
/// Malformed lines are skipped; a repeated identifier keeps its first line.
#[must_use]
pub fn parse_package_list(output: &str) -> Vec<PackageRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut skipped = 0_usize;
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((path, identifier)) = split_line(line) else {
            skipped += 1;
            continue;
        };
        if !seen.insert(identifier.to_string()) {
            continue;
        }
        records.push(PackageRecord::new(
            identifier,
            display_label(identifier),
            origin_for_path(path),
        ));
    }
    if skipped > 0 {
        debug!(skipped, "skipped malformed package lines");
    }
    records
}

/// Merge recommendations into records, producing a fresh set.
///
/// Selection is reset; identifiers absent from the knowledge base keep empty
/// recommendation fields.
#[must_use]
pub fn classify(records: &[PackageRecord], kb: &KnowledgeBase) -> Vec<PackageRecord> {
    records
        .iter()
        .map(|record| {
            let mut merged = PackageRecord::new(
                record.identifier.clone(),
                record.display_label.clone(),
                record.origin,
            );
            if let Some(entry) = kb.get(&record.identifier) {
                merged.recommended_action = entry.recommended_action();
                merged.risk_tier = entry.risk_tier();
                merged.rationale = entry.rationale().map(str::to_string);
            }
            merged
        })
        .collect()
}

/// Enumerates installed packages on one device.
#[derive(Clone)]
pub struct PackageScanner {
    executor: Arc<dyn CommandExecutor>,
}

impl PackageScanner {
    #[must_use]
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// Installed packages with label and origin filled in.
    ///
    /// A non-zero exit is a connectivity failure. Zero packages is `Ok(vec![])`;
    /// callers report it separately from a failed scan.
    pub fn scan(&self, serial: &str) -> Result<Vec<PackageRecord>> {
        let result = self
            .executor
            .run(&argv(&["-s", serial, "shell", "pm", "list", "packages", "-f"]))?;
        if !result.is_success() {
            return Err(UadError::Connectivity {
                serial: serial.to_string(),
                details: format!(
                    "package listing exited with {}: {}",
                    result.exit_code,
                    result.excerpt()
                ),
            });
        }
        let records = parse_package_list(&result.output);
        let system = records
            .iter()
            .filter(|r| r.origin == PackageOrigin::System)
            .count();
        info!(
            serial,
            total = records.len(),
            system,
            user = records.len() - system,
            "packages scanned"
        );
        Ok(records)
    }
}
