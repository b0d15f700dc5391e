//! Domain types for the sync engine.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem
//! paths. All types are serializable/deserializable via serde + serde_json,
//! matching the on-disk JSON shapes described by the sync-items / file-metadata
//! documents.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A strongly-typed, validated sync-item name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ItemName(pub String);

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ItemName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// A strongly-typed, DNS-hostname-shaped computer identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct ComputerId(pub String);

impl fmt::Display for ComputerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ComputerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ComputerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// SyncItem — shared document, one entry in the registry
// ---------------------------------------------------------------------------

/// Whether a sync item is a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Folder,
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::File => write!(f, "file"),
            ItemKind::Folder => write!(f, "folder"),
        }
    }
}

/// A named configuration (file or folder) that participates in synchronization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncItem {
    pub name: ItemName,
    #[serde(rename = "type")]
    pub kind: ItemKind,
    /// `computer_id -> absolute local path`. Exactly one entry per computer.
    pub paths: HashMap<String, PathBuf>,
    #[serde(default, rename = "excludePatterns")]
    pub exclude_patterns: Vec<String>,
}

impl SyncItem {
    /// Local path for the given computer, if this item is registered there.
    pub fn path_for(&self, computer: &str) -> Option<&PathBuf> {
        self.paths.get(computer)
    }
}

/// `sync-items.json` — the shared sync-item registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncItemRegistry {
    #[serde(rename = "syncItems", default)]
    pub sync_items: Vec<SyncItem>,
}

impl SyncItemRegistry {
    pub fn find(&self, name: &str) -> Option<&SyncItem> {
        self.sync_items.iter().find(|item| item.name.0 == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut SyncItem> {
        self.sync_items.iter_mut().find(|item| item.name.0 == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

// ---------------------------------------------------------------------------
// LocalConfig — local-only, one per computer
// ---------------------------------------------------------------------------

/// `config.json` — per-computer local configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Absolute path to the rendezvous root; empty ⇒ uninitialized.
    #[serde(rename = "cloudSyncDir", default)]
    pub cloud_sync_dir: PathBuf,
    #[serde(rename = "currentComputer")]
    pub current_computer: String,
    #[serde(rename = "gitMode", default)]
    pub git_mode: bool,
    #[serde(rename = "gitRepoRoot", default, skip_serializing_if = "Option::is_none")]
    pub git_repo_root: Option<PathBuf>,
}

impl LocalConfig {
    pub fn is_initialized(&self) -> bool {
        !self.cloud_sync_dir.as_os_str().is_empty()
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        LocalConfig {
            cloud_sync_dir: PathBuf::new(),
            current_computer: String::new(),
            git_mode: false,
            git_repo_root: None,
        }
    }
}

// ---------------------------------------------------------------------------
// FileState — local-only, per computer
// ---------------------------------------------------------------------------

/// Last observed committed local state for one (item, file) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    #[serde(rename = "localHash")]
    pub local_hash: String,
    pub mtime: DateTime<Utc>,
    pub size: u64,
    #[serde(rename = "lastChecked")]
    pub last_checked: DateTime<Utc>,
}

/// `file-states.json` — keyed by `"<item>\u{0}<path>"`, see [`state_key`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileStatesData {
    #[serde(default)]
    pub states: HashMap<String, FileState>,
}

/// Compose the composite key used by [`FileStatesData`] and [`FileMetadataDocument`].
pub fn state_key(item_name: &str, file_path: &str) -> String {
    format!("{item_name}\u{0}{file_path}")
}

// ---------------------------------------------------------------------------
// FileMetadata — shared document
// ---------------------------------------------------------------------------

/// One computer's last-known hash/mtime for a file, as recorded in the shared metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputerObservation {
    pub hash: String,
    #[serde(rename = "modTime")]
    pub mod_time: DateTime<Utc>,
}

/// Shared per-(item, file) metadata: what every computer last observed, and
/// what was last written to the rendezvous directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub computers: HashMap<String, ComputerObservation>,
    #[serde(rename = "cloudHash", skip_serializing_if = "Option::is_none", default)]
    pub cloud_hash: Option<String>,
    #[serde(rename = "cloudModTime", skip_serializing_if = "Option::is_none", default)]
    pub cloud_mod_time: Option<DateTime<Utc>>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    #[serde(rename = "updatedBy")]
    pub updated_by: String,
}

/// `file-metadata.json` — `{ metadata: { item_name: { file_path: FileMetadata } } }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileMetadataDocument {
    #[serde(default)]
    pub metadata: HashMap<String, HashMap<String, FileMetadata>>,
}

impl FileMetadataDocument {
    pub fn get(&self, item: &str, path: &str) -> Option<&FileMetadata> {
        self.metadata.get(item).and_then(|files| files.get(path))
    }

    pub fn set(&mut self, item: &str, path: &str, meta: FileMetadata) {
        self.metadata
            .entry(item.to_string())
            .or_default()
            .insert(path.to_string(), meta);
    }

    pub fn remove(&mut self, item: &str, path: &str) {
        if let Some(files) = self.metadata.get_mut(item) {
            files.remove(path);
            if files.is_empty() {
                self.metadata.remove(item);
            }
        }
    }

    pub fn remove_item(&mut self, item: &str) {
        self.metadata.remove(item);
    }
}

// ---------------------------------------------------------------------------
// HashCacheEntry
// ---------------------------------------------------------------------------

/// A cached content hash, valid only while size/mtime still match and the
/// entry has not expired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashCacheEntry {
    pub hash: String,
    pub size: u64,
    pub mtime: DateTime<Utc>,
    #[serde(rename = "cachedAt")]
    pub cached_at: DateTime<Utc>,
    /// Maximum entry age, in seconds.
    #[serde(rename = "maxAgeSecs")]
    pub max_age_secs: i64,
}

// ---------------------------------------------------------------------------
// BackupEntry
// ---------------------------------------------------------------------------

/// One manifest entry: content-addressed backup of a single (item, hash).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupEntry {
    pub id: String,
    #[serde(rename = "itemName")]
    pub item_name: String,
    #[serde(rename = "originalPath")]
    pub original_path: PathBuf,
    #[serde(rename = "backupPath")]
    pub backup_path: PathBuf,
    pub hash: String,
    pub size: u64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "createdBy")]
    pub created_by: String,
    pub reason: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `backups/manifest.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupManifest {
    #[serde(default)]
    pub entries: Vec<BackupEntry>,
}

// ---------------------------------------------------------------------------
// Decision engine output (C6)
// ---------------------------------------------------------------------------

/// The decision engine's verdict for a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    Skip,
    PushLocalToCloud,
    PullCloudToLocal,
    Conflict { reason: String },
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Skip => write!(f, "skip"),
            Decision::PushLocalToCloud => write!(f, "push"),
            Decision::PullCloudToLocal => write!(f, "pull"),
            Decision::Conflict { reason } => write!(f, "conflict: {reason}"),
        }
    }
}

/// Tri-state file presence, as observed by the diff probe — avoids treating
/// expected absences as exceptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    Present {
        hash: String,
        mtime: DateTime<Utc>,
    },
    Absent,
    Inaccessible {
        why: String,
    },
}

impl Presence {
    pub fn hash(&self) -> Option<&str> {
        match self {
            Presence::Present { hash, .. } => Some(hash),
            _ => None,
        }
    }

    pub fn mtime(&self) -> Option<DateTime<Utc>> {
        match self {
            Presence::Present { mtime, .. } => Some(*mtime),
            _ => None,
        }
    }

    pub fn exists(&self) -> bool {
        matches!(self, Presence::Present { .. })
    }
}

/// Result of probing both sides of one (item, file) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffProbe {
    pub local: Presence,
    pub cloud: Presence,
    /// `None` when either side is absent or inaccessible.
    pub content_equal: Option<bool>,
}

// ---------------------------------------------------------------------------
// SyncTask / SyncResult
// ---------------------------------------------------------------------------

/// The operation a [`SyncTask`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Push,
    Pull,
    Smart,
}

/// One unit of work: sync a single file (or a whole directory tree) of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncTask {
    pub operation: SyncOperation,
    pub item_name: ItemName,
    /// Relative file path within the item (empty for whole-item folder tasks).
    pub file_path: PathBuf,
    pub local_path: PathBuf,
    pub cloud_path: PathBuf,
}

/// The taxonomy of error kinds surfaced by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    FileNotFound,
    PermissionDenied,
    HashMismatch,
    Conflict,
    InvalidPath,
    GitOperation,
    ConfigLoad,
    ConfigSave,
    Network,
    Io,
    Validation,
    Internal,
}

/// A structured, user-addressable error record: `{ kind, op, item?, path?, cause? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncErrorRecord {
    pub kind: ErrorKind,
    pub op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl fmt::Display for SyncErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} during {}", self.kind, self.op)?;
        if let Some(item) = &self.item {
            write!(f, " (item '{item}')")?;
        }
        if let Some(path) = &self.path {
            write!(f, " at {}", path.display())?;
        }
        if let Some(cause) = &self.cause {
            write!(f, ": {cause}")?;
        }
        Ok(())
    }
}

/// Aggregated outcome of a batch sync invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResult {
    pub changed: u64,
    pub skipped: u64,
    pub errored: u64,
    pub errors: Vec<SyncErrorRecord>,
    pub message: String,
}

impl SyncResult {
    pub fn success(&self) -> bool {
        self.errored == 0
    }

    pub fn record_changed(&mut self) {
        self.changed += 1;
    }

    pub fn record_skipped(&mut self) {
        self.skipped += 1;
    }

    pub fn record_error(&mut self, error: SyncErrorRecord) {
        self.errored += 1;
        self.errors.push(error);
    }

    pub fn merge(&mut self, other: SyncResult) {
        self.changed += other.changed;
        self.skipped += other.skipped;
        self.errored += other.errored;
        self.errors.extend(other.errors);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newtype_display() {
        assert_eq!(ItemName::from("Vim").to_string(), "Vim");
        assert_eq!(ComputerId::from("laptop").to_string(), "laptop");
    }

    #[test]
    fn registry_find_and_contains() {
        let mut registry = SyncItemRegistry::default();
        registry.sync_items.push(SyncItem {
            name: ItemName::from("Vim"),
            kind: ItemKind::File,
            paths: HashMap::new(),
            exclude_patterns: vec![],
        });
        assert!(registry.contains("Vim"));
        assert!(registry.find("Vim").is_some());
        assert!(registry.find("Emacs").is_none());
    }

    #[test]
    fn local_config_uninitialized_by_default() {
        let config = LocalConfig::default();
        assert!(!config.is_initialized());
    }

    #[test]
    fn sync_result_success_iff_no_errors() {
        let mut result = SyncResult::default();
        result.record_changed();
        assert!(result.success());
        result.record_error(SyncErrorRecord {
            kind: ErrorKind::Io,
            op: "push".to_string(),
            item: None,
            path: None,
            cause: None,
        });
        assert!(!result.success());
    }

    #[test]
    fn decision_serde_tag_roundtrip() {
        let decision = Decision::Conflict {
            reason: "both modified".to_string(),
        };
        let json = serde_json::to_string(&decision).unwrap();
        assert!(json.contains("\"action\":\"conflict\""));
        let back: Decision = serde_json::from_str(&json).unwrap();
        assert_eq!(decision, back);
    }

    #[test]
    fn presence_hash_and_exists() {
        let now = Utc::now();
        let present = Presence::Present {
            hash: "sha256:abc".to_string(),
            mtime: now,
        };
        assert!(present.exists());
        assert_eq!(present.hash(), Some("sha256:abc"));
        assert!(!Presence::Absent.exists());
    }

    #[test]
    fn file_metadata_document_set_get_remove() {
        let mut doc = FileMetadataDocument::default();
        let meta = FileMetadata {
            computers: HashMap::new(),
            cloud_hash: Some("sha256:aaa".to_string()),
            cloud_mod_time: None,
            last_updated: Utc::now(),
            updated_by: "laptop".to_string(),
        };
        doc.set("Vim", "vimrc", meta.clone());
        assert_eq!(doc.get("Vim", "vimrc"), Some(&meta));
        doc.remove("Vim", "vimrc");
        assert_eq!(doc.get("Vim", "vimrc"), None);
    }
}
