//! Process-wide, manufacturer-keyed cache of parsed knowledge bases.
//!
//! Lookups never fail. A missing pack is a valid "no recommendations" state and
//! is cached like any other result; a pack that cannot be read or parsed is
//! logged and served empty without being cached, so a fixed file is picked up
//! on the next lookup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use super::{KnowledgeBase, RecommendationEntry};
use crate::core::errors::{Result, UadError};

/// Lowercase, whitespace runs to `-`, everything outside `[a-z0-9-]` dropped.
///
/// Idempotent: normalizing a normalized key returns it unchanged.
#[must_use]
pub fn normalize_manufacturer(manufacturer: &str) -> String {
    let mut key = String::with_capacity(manufacturer.len());
    let mut in_whitespace = false;
    for ch in manufacturer.trim().chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                key.push('-');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        let lower = ch.to_ascii_lowercase();
        if lower.is_ascii_lowercase() || lower.is_ascii_digit() || lower == '-' {
            key.push(lower);
        }
    }
    key
}

/// Parse pack bytes into entries keyed by identifier.
///
/// Rows without a usable `pkg` are skipped; other missing fields become `""`.
/// A later row for the same identifier replaces an earlier one.
pub fn parse_knowledge_base(bytes: &[u8]) -> Result<HashMap<String, RecommendationEntry>> {
    let document: Value = serde_json::from_slice(bytes)?;
    let mut entries = HashMap::new();
    let Some(rows) = document.get("packages").and_then(Value::as_array) else {
        return Ok(entries);
    };
    for row in rows {
        let identifier = text_field(row, "pkg");
        if identifier.trim().is_empty() {
            debug!("skipping knowledge-base row without pkg");
            continue;
        }
        let identifier = identifier.trim().to_string();
        let entry = RecommendationEntry {
            identifier: identifier.clone(),
            action: text_field(row, "recommendedAction"),
            risk: text_field(row, "risk"),
            rationale: text_field(row, "reason"),
        };
        if entries.insert(identifier, entry).is_some() {
            debug!("knowledge-base row replaces an earlier one for the same pkg");
        }
    }
    Ok(entries)
}

fn text_field(row: &Value, name: &str) -> String {
    row.get(name)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Shared knowledge-base cache rooted at one pack directory.
#[derive(Debug)]
pub struct RecommendationStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<KnowledgeBase>>>,
    file_reads: AtomicUsize,
}

impl RecommendationStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
            file_reads: AtomicUsize::new(0),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pack file consulted for a normalized key.
    #[must_use]
    pub fn pack_path(&self, key: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{key}{suffix}"))
    }

    /// Knowledge base for `manufacturer`, loading `<key><suffix>` on a miss.
    ///
    /// The cache is keyed by the normalized manufacturer only; the suffix is
    /// expected to be fixed for the lifetime of the store.
    pub fn load_for_manufacturer(&self, manufacturer: &str, suffix: &str) -> Arc<KnowledgeBase> {
        let key = normalize_manufacturer(manufacturer);
        if key.is_empty() {
            debug!(manufacturer, "manufacturer normalizes to an empty key");
            return Arc::new(KnowledgeBase::empty());
        }

        if let Some(hit) = self.cache.read().get(&key) {
            debug!(key = %key, "knowledge base cache hit");
            return Arc::clone(hit);
        }

        let path = self.pack_path(&key, suffix);
        let loaded = match self.read_pack(&path) {
            Ok(Some(kb)) => kb,
            Ok(None) => {
                debug!(path = %path.display(), "no knowledge base pack; caching empty");
                KnowledgeBase::empty()
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "unusable knowledge base pack");
                return Arc::new(KnowledgeBase::empty());
            }
        };

        // Two threads may both parse on a miss; the first insert is kept so
        // every caller shares one Arc.
        let mut cache = self.cache.write();
        Arc::clone(cache.entry(key).or_insert_with(|| Arc::new(loaded)))
    }

    /// `Ok(None)` when the pack does not exist.
    fn read_pack(&self, path: &Path) -> Result<Option<KnowledgeBase>> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(UadError::io(path, err)),
        };
        self.file_reads.fetch_add(1, Ordering::Relaxed);

        let entries = parse_knowledge_base(&bytes)?;
        let digest = format!("{:x}", Sha256::digest(&bytes));
        info!(
            path = %path.display(),
            entries = entries.len(),
            digest = %&digest[..12],
            "knowledge base loaded"
        );
        Ok(Some(KnowledgeBase::new(
            entries,
            Some(path.to_path_buf()),
            Some(digest),
        )))
    }

    /// Evict every manufacturer; the next lookup re-reads storage.
    pub fn clear_cache(&self) {
        let mut cache = self.cache.write();
        debug!(evicted = cache.len(), "knowledge base cache cleared");
        cache.clear();
    }

    /// Pack files read from storage since construction.
    #[must_use]
    pub fn file_reads(&self) -> usize {
        self.file_reads.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.cache.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUFFIX: &str = "-20251113.json";

    fn write_pack(dir: &Path, key: &str, body: &str) -> PathBuf {
        let path = dir.join(format!("{key}{SUFFIX}"));
        std::fs::write(&path, body).expect("write pack");
        path
    }

    const SAMSUNG_PACK: &str = r#"{
        "packages": [
            {"pkg": "com.samsung.android.bixby.agent", "recommendedAction": "disable", "risk": "medium", "reason": "Voice assistant"},
            {"pkg": "com.facebook.appmanager", "recommendedAction": "uninstall", "risk": "low"},
            {"recommendedAction": "uninstall", "risk": "low", "reason": "row without pkg"},
            {"pkg": "  ", "recommendedAction": "disable"}
        ]
    }"#;

    #[test]
    fn normalization_rules() {
        assert_eq!(normalize_manufacturer("Samsung"), "samsung");
        assert_eq!(normalize_manufacturer("  Sony  Mobile "), "sony-mobile");
        assert_eq!(normalize_manufacturer("HMD Global Oy."), "hmd-global-oy");
        assert_eq!(normalize_manufacturer("LGE\t(Korea)"), "lge-korea");
        assert_eq!(normalize_manufacturer("!!!"), "");
        let once = normalize_manufacturer("One Plus_Tech");
        assert_eq!(normalize_manufacturer(&once), once);
    }

    #[test]
    fn case_variants_share_one_cache_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pack(dir.path(), "samsung", SAMSUNG_PACK);
        let store = RecommendationStore::new(dir.path());

        let first = store.load_for_manufacturer("Samsung", SUFFIX);
        let second = store.load_for_manufacturer("samsung", SUFFIX);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.file_reads(), 1);
        assert_eq!(store.cached_keys(), vec!["samsung"]);
    }

    #[test]
    fn second_lookup_does_not_touch_storage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_pack(dir.path(), "samsung", SAMSUNG_PACK);
        let store = RecommendationStore::new(dir.path());

        let before = store.load_for_manufacturer("samsung", SUFFIX);
        std::fs::remove_file(&path).expect("remove pack");
        let after = store.load_for_manufacturer("samsung", SUFFIX);
        assert_eq!(store.file_reads(), 1);
        assert_eq!(before.len(), after.len());
    }

    #[test]
    fn rows_without_pkg_are_skipped_and_fields_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pack(dir.path(), "samsung", SAMSUNG_PACK);
        let store = RecommendationStore::new(dir.path());

        let kb = store.load_for_manufacturer("samsung", SUFFIX);
        assert_eq!(kb.len(), 2);
        let facebook = kb.get("com.facebook.appmanager").expect("entry");
        assert_eq!(facebook.rationale, "");
        assert_eq!(facebook.risk, "low");
        assert!(kb.digest().is_some_and(|d| d.len() == 64));
    }

    #[test]
    fn clear_then_reload_reproduces_the_mapping() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pack(dir.path(), "samsung", SAMSUNG_PACK);
        let store = RecommendationStore::new(dir.path());

        let before = store.load_for_manufacturer("samsung", SUFFIX);
        store.clear_cache();
        assert!(store.cached_keys().is_empty());
        let after = store.load_for_manufacturer("samsung", SUFFIX);

        assert_eq!(store.file_reads(), 2);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
    }

    #[test]
    fn absent_pack_is_cached_as_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecommendationStore::new(dir.path());

        assert!(store.load_for_manufacturer("Xiaomi", SUFFIX).is_empty());
        assert_eq!(store.cached_keys(), vec!["xiaomi"]);

        // A pack appearing later stays invisible until the cache is cleared.
        write_pack(dir.path(), "xiaomi", SAMSUNG_PACK);
        assert!(store.load_for_manufacturer("xiaomi", SUFFIX).is_empty());
        store.clear_cache();
        assert_eq!(store.load_for_manufacturer("xiaomi", SUFFIX).len(), 2);
    }

    #[test]
    fn malformed_pack_is_not_cached() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pack(dir.path(), "google", "{ not json");
        let store = RecommendationStore::new(dir.path());

        assert!(store.load_for_manufacturer("Google", SUFFIX).is_empty());
        assert!(store.cached_keys().is_empty());

        write_pack(dir.path(), "google", r#"{"packages":[{"pkg":"com.google.android.youtube"}]}"#);
        assert_eq!(store.load_for_manufacturer("Google", SUFFIX).len(), 1);
    }

    #[test]
    fn empty_key_returns_empty_without_caching() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = RecommendationStore::new(dir.path());
        assert!(store.load_for_manufacturer("", SUFFIX).is_empty());
        assert!(store.load_for_manufacturer("***", SUFFIX).is_empty());
        assert!(store.cached_keys().is_empty());
        assert_eq!(store.file_reads(), 0);
    }

    #[test]
    fn repeated_pkg_keeps_the_last_row() {
        let entries = parse_knowledge_base(
            br#"{"packages": [
                {"pkg": "com.facebook.appmanager", "recommendedAction": "disable", "risk": "low"},
                {"pkg": "com.facebook.appmanager", "recommendedAction": "uninstall", "risk": "high", "reason": "updated"}
            ]}"#,
        )
        .expect("valid json");
        assert_eq!(entries.len(), 1);
        let entry = &entries["com.facebook.appmanager"];
        assert_eq!(entry.action, "uninstall");
        assert_eq!(entry.risk, "high");
        assert_eq!(entry.rationale, "updated");
    }

    #[test]
    fn document_without_packages_array_is_empty() {
        let entries = parse_knowledge_base(br#"{"version": 3}"#).expect("valid json");
        assert!(entries.is_empty());
    }

    #[test]
    fn concurrent_lookups_converge_on_one_entry() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_pack(dir.path(), "samsung", SAMSUNG_PACK);
        let store = Arc::new(RecommendationStore::new(dir.path()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.load_for_manufacturer("SAMSUNG", SUFFIX))
            })
            .collect();
        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("thread"))
            .collect();

        let cached = store.load_for_manufacturer("samsung", SUFFIX);
        for kb in &results {
            assert_eq!(**kb, *cached);
        }
        assert_eq!(store.cached_keys().len(), 1);
    }
}
