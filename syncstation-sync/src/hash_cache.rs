//! Hash + stat cache (C1) — SHA-256 of file content with (size, mtime)-based
//! invalidation.
//!
//! Persists a single JSON document at `<config_dir>/hash-cache.json`. Reads
//! do not block other reads; writes are exclusive (`RwLock`).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{io_err, SyncError};
use syncstation_core::HashCacheEntry;

const DEFAULT_MAX_AGE_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HashCacheDocument {
    #[serde(default)]
    entries: HashMap<String, HashCacheEntry>,
}

/// In-memory hash cache, optionally backed by a JSON file.
pub struct HashCache {
    path: Option<PathBuf>,
    max_age_secs: i64,
    entries: RwLock<HashMap<String, HashCacheEntry>>,
}

impl HashCache {
    /// An unpersisted, in-memory-only cache.
    pub fn in_memory(max_age_secs: i64) -> Self {
        HashCache {
            path: None,
            max_age_secs,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Load (or create empty) a cache backed by `<config_dir>/hash-cache.json`.
    ///
    /// A corrupt document fails closed: it is treated as an empty cache
    /// rather than propagated as an error.
    pub fn load_at(config_dir: &Path) -> Result<Self, SyncError> {
        let path = config_dir.join("hash-cache.json");
        let entries = if path.exists() {
            std::fs::read_to_string(&path)
                .ok()
                .and_then(|contents| serde_json::from_str::<HashCacheDocument>(&contents).ok())
                .map(|doc| doc.entries)
                .unwrap_or_default()
        } else {
            HashMap::new()
        };
        Ok(HashCache {
            path: Some(path),
            max_age_secs: DEFAULT_MAX_AGE_SECS,
            entries: RwLock::new(entries),
        })
    }

    /// Persist the current cache contents atomically.
    pub fn save(&self) -> Result<(), SyncError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let doc = HashCacheDocument {
            entries: self.entries.read().unwrap().clone(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
        Ok(())
    }

    /// Return the cached hash iff the validity predicate holds.
    pub fn get(&self, path: &Path) -> Option<String> {
        let key = path.to_string_lossy().to_string();
        let entries = self.entries.read().unwrap();
        let entry = entries.get(&key)?;
        if self.is_valid(path, entry) {
            Some(entry.hash.clone())
        } else {
            None
        }
    }

    /// Return the cached hash, or compute, store, and return a fresh one.
    pub fn get_or_calculate(&self, path: &Path) -> Result<String, SyncError> {
        if let Some(hash) = self.get(path) {
            return Ok(hash);
        }
        let meta = std::fs::metadata(path).map_err(|e| io_err(path, e))?;
        let size = meta.len();
        let mtime = meta
            .modified()
            .map_err(|e| io_err(path, e))
            .map(DateTime::<Utc>::from)?;
        let hash = hash_file(path)?;

        let key = path.to_string_lossy().to_string();
        let entry = HashCacheEntry {
            hash: hash.clone(),
            size,
            mtime,
            cached_at: Utc::now(),
            max_age_secs: self.max_age_secs,
        };
        self.entries.write().unwrap().insert(key, entry);
        Ok(hash)
    }

    /// Drop entries whose stat no longer matches their cached (size, mtime).
    pub fn invalidate(&self, paths: &[PathBuf]) {
        let mut entries = self.entries.write().unwrap();
        for path in paths {
            let key = path.to_string_lossy().to_string();
            let Some(entry) = entries.get(&key) else {
                continue;
            };
            let matches = std::fs::metadata(path)
                .ok()
                .and_then(|meta| {
                    let mtime: DateTime<Utc> = meta.modified().ok()?.into();
                    Some(meta.len() == entry.size && mtime == entry.mtime)
                })
                .unwrap_or(false);
            if !matches {
                entries.remove(&key);
            }
        }
    }

    /// Drop entries older than their configured `max_age`.
    pub fn clean_expired(&self) {
        let now = Utc::now();
        self.entries.write().unwrap().retain(|_, entry| {
            now.signed_duration_since(entry.cached_at).num_seconds() <= entry.max_age_secs
        });
    }

    fn is_valid(&self, path: &Path, entry: &HashCacheEntry) -> bool {
        let age_ok = Utc::now()
            .signed_duration_since(entry.cached_at)
            .num_seconds()
            <= entry.max_age_secs;
        if !age_ok {
            return false;
        }
        match std::fs::metadata(path) {
            Ok(meta) => {
                let mtime: DateTime<Utc> = match meta.modified() {
                    Ok(m) => m.into(),
                    Err(_) => return false,
                };
                meta.len() == entry.size && mtime == entry.mtime
            }
            Err(_) => false,
        }
    }
}

/// SHA-256 over the raw byte stream, hex-encoded, prefixed with `sha256:`.
/// No line-ending normalization.
pub fn hash_file(path: &Path) -> Result<String, SyncError> {
    let mut file = std::fs::File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| io_err(path, e))?;
    Ok(format!("sha256:{}", hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::TempDir;

    #[test]
    fn hash_file_is_prefixed_and_deterministic() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let h1 = hash_file(&path).unwrap();
        let h2 = hash_file(&path).unwrap();
        assert_eq!(h1, h2);
        assert!(h1.starts_with("sha256:"));
        assert_eq!(h1.len(), "sha256:".len() + 64);
    }

    #[test]
    fn get_or_calculate_caches_and_get_returns_same_value() {
        let cache = HashCache::in_memory(3600);
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        let computed = cache.get_or_calculate(&path).unwrap();
        let cached = cache.get(&path).unwrap();
        assert_eq!(computed, cached);
    }

    #[test]
    fn modified_file_invalidates_cache_entry() {
        let cache = HashCache::in_memory(3600);
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, b"v1").unwrap();
        let h1 = cache.get_or_calculate(&path).unwrap();

        set_file_mtime(&path, FileTime::from_unix_time(0, 0)).unwrap();
        std::fs::write(&path, b"v2-longer-content").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(100, 0)).unwrap();

        assert!(cache.get(&path).is_none());
        let h2 = cache.get_or_calculate(&path).unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = HashCache::in_memory(-1); // already expired on insert
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        cache.get_or_calculate(&path).unwrap();
        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn invalidate_drops_entries_with_stale_stat() {
        let cache = HashCache::in_memory(3600);
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, b"v1").unwrap();
        cache.get_or_calculate(&path).unwrap();

        std::fs::write(&path, b"v2-different-size").unwrap();
        cache.invalidate(&[path.clone()]);
        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn corrupt_document_fails_closed_to_empty_cache() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("hash-cache.json"), "{ not json").unwrap();
        let cache = HashCache::load_at(tmp.path()).unwrap();
        let path = tmp.path().join("missing.txt");
        assert!(cache.get(&path).is_none());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.txt");
        std::fs::write(&file, b"hello").unwrap();

        let cache = HashCache::load_at(tmp.path()).unwrap();
        let hash = cache.get_or_calculate(&file).unwrap();
        cache.save().unwrap();

        let reloaded = HashCache::load_at(tmp.path()).unwrap();
        assert_eq!(reloaded.get(&file), Some(hash));
    }
}
