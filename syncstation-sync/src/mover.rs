//! File mover (C7) — pushes/pulls at file or directory granularity, updating
//! the local and shared metadata documents after each successful write.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use syncstation_core::{
    state_key, ComputerObservation, FileMetadata, FileMetadataDocument, FileState,
    FileStatesData,
};

use crate::error::{io_err, SyncError};
use crate::hash_cache::HashCache;
use crate::{atomic, hash_cache};

/// What happened to one (item, file) pair during a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Copied,
    Deleted,
    Skipped,
}

/// Push `local` to `cloud`. If `local` does not exist, mirrors the absence
/// by deleting `cloud` (one-way "push" semantics — see [`crate::decision::decide_push`]).
pub fn push_file(
    item_name: &str,
    file_rel_path: &str,
    local: &Path,
    cloud: &Path,
    computer: &str,
    cache: &HashCache,
    file_states: &mut FileStatesData,
    file_metadata: &mut FileMetadataDocument,
) -> Result<MoveOutcome, SyncError> {
    if !local.exists() {
        if cloud.exists() {
            std::fs::remove_file(cloud).map_err(|e| io_err(cloud, e))?;
        }
        file_metadata.remove(item_name, file_rel_path);
        return Ok(MoveOutcome::Deleted);
    }

    copy_preserving_mode(local, cloud)?;
    record_after_write(
        item_name,
        file_rel_path,
        local,
        cloud,
        computer,
        cache,
        file_states,
        file_metadata,
    )?;
    Ok(MoveOutcome::Copied)
}

/// Pull `cloud` to `local`. If `cloud` does not exist, mirrors the absence
/// by deleting `local`.
pub fn pull_file(
    item_name: &str,
    file_rel_path: &str,
    local: &Path,
    cloud: &Path,
    computer: &str,
    cache: &HashCache,
    file_states: &mut FileStatesData,
    file_metadata: &mut FileMetadataDocument,
) -> Result<MoveOutcome, SyncError> {
    if !cloud.exists() {
        if local.exists() {
            std::fs::remove_file(local).map_err(|e| io_err(local, e))?;
        }
        file_states
            .states
            .remove(&state_key(item_name, file_rel_path));
        return Ok(MoveOutcome::Deleted);
    }

    copy_preserving_mode(cloud, local)?;
    record_after_write(
        item_name,
        file_rel_path,
        local,
        cloud,
        computer,
        cache,
        file_states,
        file_metadata,
    )?;
    Ok(MoveOutcome::Copied)
}

/// Recursively push every file under `local_root` into `cloud_root`,
/// creating missing parent directories at mode `0o755` and preserving
/// per-file mode bits.
pub fn push_tree(
    item_name: &str,
    local_root: &Path,
    cloud_root: &Path,
    computer: &str,
    cache: &HashCache,
    file_states: &mut FileStatesData,
    file_metadata: &mut FileMetadataDocument,
) -> Result<Vec<(PathBuf, MoveOutcome)>, SyncError> {
    let mut results = Vec::new();
    for rel in list_files_recursive(local_root)? {
        let local = local_root.join(&rel);
        let cloud = cloud_root.join(&rel);
        let rel_str = rel.to_string_lossy().to_string();
        let outcome = push_file(
            item_name, &rel_str, &local, &cloud, computer, cache, file_states, file_metadata,
        )?;
        results.push((rel, outcome));
    }
    Ok(results)
}

/// Recursively pull every file under `cloud_root` into `local_root`.
pub fn pull_tree(
    item_name: &str,
    local_root: &Path,
    cloud_root: &Path,
    computer: &str,
    cache: &HashCache,
    file_states: &mut FileStatesData,
    file_metadata: &mut FileMetadataDocument,
) -> Result<Vec<(PathBuf, MoveOutcome)>, SyncError> {
    let mut results = Vec::new();
    for rel in list_files_recursive(cloud_root)? {
        let local = local_root.join(&rel);
        let cloud = cloud_root.join(&rel);
        let rel_str = rel.to_string_lossy().to_string();
        let outcome = pull_file(
            item_name, &rel_str, &local, &cloud, computer, cache, file_states, file_metadata,
        )?;
        results.push((rel, outcome));
    }
    Ok(results)
}

pub(crate) fn list_files_recursive(root: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let mut out = Vec::new();
    if root.exists() {
        walk(root, root, &mut out)?;
    }
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), SyncError> {
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out)?;
        } else {
            out.push(path.strip_prefix(root).unwrap_or(&path).to_path_buf());
        }
    }
    Ok(())
}

fn copy_preserving_mode(source: &Path, dest: &Path) -> Result<(), SyncError> {
    if let Some(parent) = dest.parent() {
        create_dir_all_0755(parent)?;
    }
    let bytes = std::fs::read(source).map_err(|e| io_err(source, e))?;
    let mode = file_mode(source)?;
    atomic::write(dest, &bytes, mode)
}

#[cfg(unix)]
fn file_mode(path: &Path) -> Result<Option<u32>, SyncError> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path).map_err(|e| io_err(path, e))?;
    Ok(Some(meta.permissions().mode()))
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> Result<Option<u32>, SyncError> {
    Ok(None)
}

#[cfg(unix)]
fn create_dir_all_0755(dir: &Path) -> Result<(), SyncError> {
    use std::os::unix::fs::PermissionsExt;
    if dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| io_err(dir, e))
}

#[cfg(not(unix))]
fn create_dir_all_0755(dir: &Path) -> Result<(), SyncError> {
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))
}

#[allow(clippy::too_many_arguments)]
fn record_after_write(
    item_name: &str,
    file_rel_path: &str,
    local: &Path,
    _cloud: &Path,
    computer: &str,
    cache: &HashCache,
    file_states: &mut FileStatesData,
    file_metadata: &mut FileMetadataDocument,
) -> Result<(), SyncError> {
    let meta = std::fs::metadata(local).map_err(|e| io_err(local, e))?;
    let mtime: DateTime<Utc> = meta
        .modified()
        .map_err(|e| io_err(local, e))
        .map(DateTime::from)?;
    cache.invalidate(&[local.to_path_buf()]);
    let hash = hash_cache::hash_file(local)?;

    file_states.states.insert(
        state_key(item_name, file_rel_path),
        FileState {
            local_hash: hash.clone(),
            mtime,
            size: meta.len(),
            last_checked: Utc::now(),
        },
    );

    let now = Utc::now();
    let mut entry = file_metadata
        .get(item_name, file_rel_path)
        .cloned()
        .unwrap_or_else(|| FileMetadata {
            computers: Default::default(),
            cloud_hash: None,
            cloud_mod_time: None,
            last_updated: now,
            updated_by: computer.to_string(),
        });
    entry.computers.insert(
        computer.to_string(),
        ComputerObservation {
            hash: hash.clone(),
            mod_time: mtime,
        },
    );
    entry.cloud_hash = Some(hash);
    entry.cloud_mod_time = Some(mtime);
    entry.last_updated = now;
    entry.updated_by = computer.to_string();
    file_metadata.set(item_name, file_rel_path, entry);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache() -> HashCache {
        HashCache::in_memory(3600)
    }

    #[test]
    fn push_file_copies_content_and_records_metadata() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local.txt");
        let cloud = tmp.path().join("cloud.txt");
        std::fs::write(&local, b"hello").unwrap();

        let mut states = FileStatesData::default();
        let mut metadata = FileMetadataDocument::default();
        let outcome = push_file(
            "Vim", "vimrc", &local, &cloud, "laptop", &cache(), &mut states, &mut metadata,
        )
        .unwrap();

        assert_eq!(outcome, MoveOutcome::Copied);
        assert_eq!(std::fs::read(&cloud).unwrap(), b"hello");
        assert!(states.states.contains_key(&state_key("Vim", "vimrc")));
        assert!(metadata.get("Vim", "vimrc").is_some());
    }

    #[test]
    fn push_file_with_absent_local_deletes_cloud() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local.txt");
        let cloud = tmp.path().join("cloud.txt");
        std::fs::write(&cloud, b"stale").unwrap();

        let mut states = FileStatesData::default();
        let mut metadata = FileMetadataDocument::default();
        let outcome = push_file(
            "Vim", "vimrc", &local, &cloud, "laptop", &cache(), &mut states, &mut metadata,
        )
        .unwrap();

        assert_eq!(outcome, MoveOutcome::Deleted);
        assert!(!cloud.exists());
    }

    #[test]
    fn pull_file_copies_content() {
        let tmp = TempDir::new().unwrap();
        let local = tmp.path().join("local.txt");
        let cloud = tmp.path().join("cloud.txt");
        std::fs::write(&cloud, b"from cloud").unwrap();

        let mut states = FileStatesData::default();
        let mut metadata = FileMetadataDocument::default();
        let outcome = pull_file(
            "Vim", "vimrc", &local, &cloud, "laptop", &cache(), &mut states, &mut metadata,
        )
        .unwrap();

        assert_eq!(outcome, MoveOutcome::Copied);
        assert_eq!(std::fs::read(&local).unwrap(), b"from cloud");
    }

    #[test]
    fn push_tree_copies_nested_files() {
        let tmp = TempDir::new().unwrap();
        let local_root = tmp.path().join("local");
        let cloud_root = tmp.path().join("cloud");
        std::fs::create_dir_all(local_root.join("sub")).unwrap();
        std::fs::write(local_root.join("a.txt"), b"a").unwrap();
        std::fs::write(local_root.join("sub").join("b.txt"), b"b").unwrap();

        let mut states = FileStatesData::default();
        let mut metadata = FileMetadataDocument::default();
        let results = push_tree(
            "Dotfiles", &local_root, &cloud_root, "laptop", &cache(), &mut states, &mut metadata,
        )
        .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(std::fs::read(cloud_root.join("a.txt")).unwrap(), b"a");
        assert_eq!(
            std::fs::read(cloud_root.join("sub").join("b.txt")).unwrap(),
            b"b"
        );
    }
}
