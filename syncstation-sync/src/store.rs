//! Metadata store (C3) — the three shared/local document families.
//!
//! Each document loads lazily (a missing file is an empty document, not an
//! error) and persists through the atomic writer with pretty-printed JSON.
//! [`FileMetadataDocument`] additionally supports a Git-notes backend: when
//! `local_config.git_mode` is set, it is read from and written to a Git
//! *notes* ref attached to `HEAD` of the configured repo root instead of a
//! file under the rendezvous directory.

use std::path::Path;

use syncstation_core::{FileMetadataDocument, FileStatesData, LocalConfig, SyncItemRegistry};

use crate::atomic;
use crate::error::{io_err, SyncError};

const NOTES_REF: &str = "refs/notes/syncstation/file-metadata";

// ---------------------------------------------------------------------------
// sync-items.json (shared)
// ---------------------------------------------------------------------------

pub fn sync_items_path(cloud_sync_dir: &Path) -> std::path::PathBuf {
    cloud_sync_dir.join("sync-items.json")
}

pub fn load_sync_items(cloud_sync_dir: &Path) -> Result<SyncItemRegistry, SyncError> {
    let path = sync_items_path(cloud_sync_dir);
    if !path.exists() {
        return Ok(SyncItemRegistry::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_sync_items(
    cloud_sync_dir: &Path,
    registry: &SyncItemRegistry,
) -> Result<(), SyncError> {
    let path = sync_items_path(cloud_sync_dir);
    let json = serde_json::to_string_pretty(registry)?;
    atomic::write_safe(&path, json.as_bytes(), None)
}

// ---------------------------------------------------------------------------
// file-states.json (local-only)
// ---------------------------------------------------------------------------

pub fn file_states_path(config_dir: &Path) -> std::path::PathBuf {
    config_dir.join("file-states.json")
}

pub fn load_file_states(config_dir: &Path) -> Result<FileStatesData, SyncError> {
    let path = file_states_path(config_dir);
    if !path.exists() {
        return Ok(FileStatesData::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_file_states(config_dir: &Path, data: &FileStatesData) -> Result<(), SyncError> {
    let path = file_states_path(config_dir);
    let json = serde_json::to_string_pretty(data)?;
    atomic::write_safe(&path, json.as_bytes(), None)
}

// ---------------------------------------------------------------------------
// file-metadata.json (shared; or Git notes when `git_mode` is set)
// ---------------------------------------------------------------------------

pub fn file_metadata_path(cloud_sync_dir: &Path) -> std::path::PathBuf {
    cloud_sync_dir.join("file-metadata.json")
}

/// Load the shared [`FileMetadataDocument`], dispatching to the Git-notes
/// backend when `config.git_mode` is set.
pub fn load_file_metadata(
    config: &LocalConfig,
    cloud_sync_dir: &Path,
) -> Result<FileMetadataDocument, SyncError> {
    if config.git_mode {
        let repo_root = config
            .git_repo_root
            .as_deref()
            .unwrap_or(cloud_sync_dir);
        return load_file_metadata_git(repo_root);
    }
    let path = file_metadata_path(cloud_sync_dir);
    if !path.exists() {
        return Ok(FileMetadataDocument::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

pub fn save_file_metadata(
    config: &LocalConfig,
    cloud_sync_dir: &Path,
    doc: &FileMetadataDocument,
) -> Result<(), SyncError> {
    if config.git_mode {
        let repo_root = config
            .git_repo_root
            .as_deref()
            .unwrap_or(cloud_sync_dir);
        return save_file_metadata_git(repo_root, doc);
    }
    let path = file_metadata_path(cloud_sync_dir);
    let json = serde_json::to_string_pretty(doc)?;
    atomic::write_safe(&path, json.as_bytes(), None)
}

fn load_file_metadata_git(repo_root: &Path) -> Result<FileMetadataDocument, SyncError> {
    let repo = git2::Repository::open(repo_root)?;
    let oid = match repo.head() {
        Ok(head) => head.peel_to_commit()?.id(),
        Err(_) => return Ok(FileMetadataDocument::default()),
    };
    match repo.find_note(Some(NOTES_REF), oid) {
        Ok(note) => {
            let message = note.message().unwrap_or("{}");
            Ok(serde_json::from_str(message)?)
        }
        Err(_) => Ok(FileMetadataDocument::default()),
    }
}

fn save_file_metadata_git(repo_root: &Path, doc: &FileMetadataDocument) -> Result<(), SyncError> {
    let repo = git2::Repository::open(repo_root)?;
    let oid = ensure_head_commit(&repo)?;
    let sig = repo_signature(&repo)?;
    let json = serde_json::to_string_pretty(doc)?;
    repo.note(&sig, &sig, Some(NOTES_REF), oid, &json, true)?;
    Ok(())
}

/// Ensure `HEAD` resolves to a commit, bootstrapping an empty one if the
/// repository has no history yet.
fn ensure_head_commit(repo: &git2::Repository) -> Result<git2::Oid, SyncError> {
    if let Ok(head) = repo.head() {
        return Ok(head.peel_to_commit()?.id());
    }
    let sig = repo_signature(repo)?;
    let tree_id = {
        let mut index = repo.index()?;
        index.write_tree()?
    };
    let tree = repo.find_tree(tree_id)?;
    let oid = repo.commit(Some("HEAD"), &sig, &sig, "syncstation: bootstrap", &tree, &[])?;
    Ok(oid)
}

fn repo_signature(repo: &git2::Repository) -> Result<git2::Signature<'static>, SyncError> {
    match repo.signature() {
        Ok(sig) => Ok(sig),
        Err(_) => Ok(git2::Signature::now("syncstation", "syncstation@localhost")?),
    }
}
