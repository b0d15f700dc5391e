//! Backup manager (C8) — content-addressed backup/restore/rollback with
//! age/count-based eviction.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use syncstation_core::{BackupEntry, BackupManifest};

use crate::atomic;
use crate::error::{io_err, SyncError};
use crate::hash_cache;

/// Status of a [`RollbackOperation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackStatus {
    Pending,
    Success,
    Failed,
}

/// Outcome of a [`BackupManager::rollback`] call.
#[derive(Debug, Clone)]
pub struct RollbackOperation {
    pub id: String,
    pub status: RollbackStatus,
    /// The id of the safety backup taken of `target` before the restore.
    pub pre_rollback_ref: String,
}

/// Aggregate statistics over a backup manifest.
#[derive(Debug, Clone, Default)]
pub struct BackupStats {
    pub total_entries: usize,
    pub total_bytes: u64,
    pub per_item: HashMap<String, usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

pub struct BackupManager {
    root: PathBuf,
    created_by: String,
    max_age: chrono::Duration,
    max_count: usize,
}

impl BackupManager {
    pub fn new(root: impl Into<PathBuf>, created_by: impl Into<String>) -> Self {
        BackupManager {
            root: root.into(),
            created_by: created_by.into(),
            max_age: chrono::Duration::days(30),
            max_count: 10,
        }
    }

    pub fn with_limits(mut self, max_age: chrono::Duration, max_count: usize) -> Self {
        self.max_age = max_age;
        self.max_count = max_count;
        self
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    fn files_dir(&self) -> PathBuf {
        self.root.join("files")
    }

    fn load_manifest(&self) -> Result<BackupManifest, SyncError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(BackupManifest::default());
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn save_manifest(&self, manifest: &BackupManifest) -> Result<(), SyncError> {
        let json = serde_json::to_string_pretty(manifest)?;
        atomic::write_safe(&self.manifest_path(), json.as_bytes(), None)
    }

    /// Back up `path` under `item`. If an entry for this (item, content hash)
    /// already exists, its timestamp/reason/tags are refreshed and no new
    /// copy is made (content-addressing dedup). Otherwise the file is copied
    /// into `{root}/files/{id}` and appended to the manifest.
    pub fn backup(
        &self,
        item: &str,
        path: &Path,
        reason: &str,
        tags: Vec<String>,
    ) -> Result<BackupEntry, SyncError> {
        let hash = hash_cache::hash_file(path)?;
        let mut manifest = self.load_manifest()?;

        if let Some(existing) = manifest
            .entries
            .iter_mut()
            .find(|e| e.item_name == item && e.hash == hash)
        {
            existing.created_at = Utc::now();
            existing.reason = reason.to_string();
            existing.tags = tags;
            let refreshed = existing.clone();
            self.save_manifest(&manifest)?;
            return Ok(refreshed);
        }

        let size = std::fs::metadata(path).map_err(|e| io_err(path, e))?.len();
        let id = backup_id(item, &hash);
        let backup_path = self.files_dir().join(&id);
        let bytes = std::fs::read(path).map_err(|e| io_err(path, e))?;
        atomic::write(&backup_path, &bytes, None)?;

        let entry = BackupEntry {
            id,
            item_name: item.to_string(),
            original_path: path.to_path_buf(),
            backup_path,
            hash,
            size,
            created_at: Utc::now(),
            created_by: self.created_by.clone(),
            reason: reason.to_string(),
            tags,
        };
        manifest.entries.push(entry.clone());
        evict(&mut manifest, item, self.max_age, self.max_count);
        self.save_manifest(&manifest)?;
        Ok(entry)
    }

    /// Restore the backup identified by `backup_id` over `target`.
    pub fn restore(&self, backup_id: &str, target: &Path) -> Result<(), SyncError> {
        let manifest = self.load_manifest()?;
        let entry = manifest
            .entries
            .iter()
            .find(|e| e.id == backup_id)
            .ok_or_else(|| SyncError::BackupNotFound(backup_id.to_string()))?;
        if !entry.backup_path.exists() {
            return Err(SyncError::BackupPayloadMissing(
                backup_id.to_string(),
                entry.backup_path.clone(),
            ));
        }
        let bytes = std::fs::read(&entry.backup_path).map_err(|e| io_err(&entry.backup_path, e))?;
        atomic::write(target, &bytes, None)
    }

    /// Back up the current `target` (tagged `rollback`) before restoring
    /// `backup_id` over it. On restore failure the status is `Failed` and
    /// the pre-rollback backup remains available as a recovery path.
    pub fn rollback(
        &self,
        item: &str,
        backup_id: &str,
        target: &Path,
    ) -> Result<RollbackOperation, SyncError> {
        let pre = self.backup(item, target, "rollback", vec!["rollback".to_string()])?;
        match self.restore(backup_id, target) {
            Ok(()) => Ok(RollbackOperation {
                id: backup_id.to_string(),
                status: RollbackStatus::Success,
                pre_rollback_ref: pre.id,
            }),
            Err(_) => Ok(RollbackOperation {
                id: backup_id.to_string(),
                status: RollbackStatus::Failed,
                pre_rollback_ref: pre.id,
            }),
        }
    }

    pub fn stats(&self) -> Result<BackupStats, SyncError> {
        let manifest = self.load_manifest()?;
        let mut stats = BackupStats {
            total_entries: manifest.entries.len(),
            ..Default::default()
        };
        for entry in &manifest.entries {
            stats.total_bytes += entry.size;
            *stats.per_item.entry(entry.item_name.clone()).or_insert(0) += 1;
            stats.oldest = Some(stats.oldest.map_or(entry.created_at, |o| o.min(entry.created_at)));
            stats.newest = Some(stats.newest.map_or(entry.created_at, |n| n.max(entry.created_at)));
        }
        Ok(stats)
    }
}

fn backup_id(item: &str, hash: &str) -> String {
    let hash_prefix: String = hash.trim_start_matches("sha256:").chars().take(12).collect();
    format!("{item}-{}-{hash_prefix}", Utc::now().timestamp_millis())
}

fn evict(manifest: &mut BackupManifest, item: &str, max_age: chrono::Duration, max_count: usize) {
    let now = Utc::now();
    let mut item_entries: Vec<usize> = manifest
        .entries
        .iter()
        .enumerate()
        .filter(|(_, e)| e.item_name == item)
        .map(|(i, _)| i)
        .collect();
    item_entries.sort_by_key(|&i| std::cmp::Reverse(manifest.entries[i].created_at));

    let mut keep = std::collections::HashSet::new();
    for (rank, &index) in item_entries.iter().enumerate() {
        let entry = &manifest.entries[index];
        let age_ok = now.signed_duration_since(entry.created_at) <= max_age;
        let count_ok = rank < max_count;
        if age_ok && count_ok {
            keep.insert(index);
        }
    }

    let mut kept_entries = Vec::new();
    for (i, entry) in manifest.entries.drain(..).enumerate() {
        if entry.item_name != item || keep.contains(&i) {
            kept_entries.push(entry);
        }
    }
    manifest.entries = kept_entries;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn backup_then_restore_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let manager = BackupManager::new(tmp.path().join("backups"), "laptop");
        let file = tmp.path().join("vimrc");
        std::fs::write(&file, b"set nocompatible").unwrap();

        let entry = manager.backup("Vim", &file, "pre-sync", vec![]).unwrap();

        let target = tmp.path().join("restored");
        manager.restore(&entry.id, &target).unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"set nocompatible");
    }

    #[test]
    fn identical_content_dedups_instead_of_new_copy() {
        let tmp = TempDir::new().unwrap();
        let manager = BackupManager::new(tmp.path().join("backups"), "laptop");
        let file = tmp.path().join("vimrc");
        std::fs::write(&file, b"content").unwrap();

        let first = manager.backup("Vim", &file, "a", vec![]).unwrap();
        let second = manager.backup("Vim", &file, "b", vec![]).unwrap();
        assert_eq!(first.id, second.id);

        let stats = manager.stats().unwrap();
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn different_content_creates_separate_entries() {
        let tmp = TempDir::new().unwrap();
        let manager = BackupManager::new(tmp.path().join("backups"), "laptop");
        let file = tmp.path().join("vimrc");

        std::fs::write(&file, b"v1").unwrap();
        manager.backup("Vim", &file, "a", vec![]).unwrap();
        std::fs::write(&file, b"v2").unwrap();
        manager.backup("Vim", &file, "b", vec![]).unwrap();

        let stats = manager.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
    }

    #[test]
    fn restore_missing_id_errors() {
        let tmp = TempDir::new().unwrap();
        let manager = BackupManager::new(tmp.path().join("backups"), "laptop");
        let target = tmp.path().join("out");
        let result = manager.restore("nope", &target);
        assert!(matches!(result, Err(SyncError::BackupNotFound(_))));
    }

    #[test]
    fn eviction_respects_max_count() {
        let tmp = TempDir::new().unwrap();
        let manager = BackupManager::new(tmp.path().join("backups"), "laptop")
            .with_limits(chrono::Duration::days(365), 2);
        let file = tmp.path().join("vimrc");

        for i in 0..5 {
            std::fs::write(&file, format!("v{i}")).unwrap();
            manager.backup("Vim", &file, "x", vec![]).unwrap();
        }

        let stats = manager.stats().unwrap();
        assert_eq!(stats.total_entries, 2);
    }

    #[test]
    fn rollback_backs_up_current_before_restoring() {
        let tmp = TempDir::new().unwrap();
        let manager = BackupManager::new(tmp.path().join("backups"), "laptop");
        let target = tmp.path().join("vimrc");

        std::fs::write(&target, b"v1").unwrap();
        let v1 = manager.backup("Vim", &target, "checkpoint", vec![]).unwrap();

        std::fs::write(&target, b"v2-current").unwrap();
        let op = manager.rollback("Vim", &v1.id, &target).unwrap();

        assert_eq!(op.status, RollbackStatus::Success);
        assert_eq!(std::fs::read(&target).unwrap(), b"v1");

        let stats = manager.stats().unwrap();
        assert_eq!(stats.total_entries, 2); // v1 plus the pre-rollback backup of v2
    }
}
