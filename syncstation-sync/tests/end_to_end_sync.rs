//! End-to-end sync scenarios against a temp rendezvous directory and temp
//! per-machine config dirs. Each test is self-contained — no shared state.

use std::fs;
use std::time::{Duration, SystemTime};

use filetime::{set_file_mtime, FileTime};
use tempfile::TempDir;

use syncstation_core::{ItemKind, ItemName, LocalConfig, SyncItem};
use syncstation_sync::Orchestrator;

fn make_config(cloud_dir: &std::path::Path, computer: &str) -> LocalConfig {
    LocalConfig {
        cloud_sync_dir: cloud_dir.to_path_buf(),
        current_computer: computer.to_string(),
        git_mode: false,
        git_repo_root: None,
    }
}

fn register_vim(cloud_dir: &std::path::Path, computer: &str, local_path: &std::path::Path) {
    let mut registry = syncstation_sync::store::load_sync_items(cloud_dir).unwrap();
    let mut paths = std::collections::HashMap::new();
    paths.insert(computer.to_string(), local_path.to_path_buf());
    registry.sync_items.push(SyncItem {
        name: ItemName::from("Vim"),
        kind: ItemKind::File,
        paths,
        exclude_patterns: vec![],
    });
    syncstation_sync::store::save_sync_items(cloud_dir, &registry).unwrap();
}

/// Scenario A — first push creates the cloud copy and records matching
/// anchors on both sides.
#[test]
fn first_push_creates_cloud_copy_and_matching_anchors() {
    let cloud = TempDir::new().unwrap();
    let config_dir_h1 = TempDir::new().unwrap();
    let local_h1 = TempDir::new().unwrap();
    let vimrc = local_h1.path().join("vimrc");
    fs::write(&vimrc, "set ts=4\n").unwrap();

    register_vim(cloud.path(), "h1", &vimrc);
    let orch = Orchestrator::new(config_dir_h1.path(), make_config(cloud.path(), "h1")).unwrap();

    let result = orch.push(None, false).unwrap();
    assert_eq!(result.changed, 1);
    assert_eq!(result.skipped, 0);
    assert_eq!(result.errored, 0);

    let cloud_path = syncstation_core::paths::cloud_item_path(cloud.path(), "Vim");
    assert_eq!(fs::read_to_string(&cloud_path).unwrap(), "set ts=4\n");

    let file_metadata =
        syncstation_sync::store::load_file_metadata(&make_config(cloud.path(), "h1"), cloud.path())
            .unwrap();
    let meta = file_metadata.get("Vim", "").expect("metadata recorded");
    assert!(meta.cloud_hash.is_some());
    assert_eq!(meta.updated_by, "h1");
}

/// Scenario B — re-running sync on identical content writes nothing and
/// reports a skip.
#[test]
fn second_sync_on_identical_content_skips_and_refreshes_state() {
    let cloud = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let vimrc = local.path().join("vimrc");
    fs::write(&vimrc, "set ts=4\n").unwrap();

    register_vim(cloud.path(), "h1", &vimrc);
    let orch = Orchestrator::new(config_dir.path(), make_config(cloud.path(), "h1")).unwrap();
    orch.sync(None).unwrap();

    let cloud_path = syncstation_core::paths::cloud_item_path(cloud.path(), "Vim");
    let mtime_before = fs::metadata(&cloud_path).unwrap().modified().unwrap();

    let second = orch.sync(None).unwrap();
    assert_eq!(second.changed, 0);
    assert_eq!(second.skipped, 1);

    let mtime_after = fs::metadata(&cloud_path).unwrap().modified().unwrap();
    assert_eq!(mtime_before, mtime_after, "skip must not rewrite the cloud file");
}

/// Scenario C — a second host with no local copy pulls the cloud content.
#[test]
fn pull_on_second_host_materializes_local_copy() {
    let cloud = TempDir::new().unwrap();
    let config_dir_h1 = TempDir::new().unwrap();
    let local_h1 = TempDir::new().unwrap();
    let vimrc_h1 = local_h1.path().join("vimrc");
    fs::write(&vimrc_h1, "set ts=4\n").unwrap();
    register_vim(cloud.path(), "h1", &vimrc_h1);

    let orch_h1 = Orchestrator::new(config_dir_h1.path(), make_config(cloud.path(), "h1")).unwrap();
    orch_h1.push(None, false).unwrap();

    let config_dir_h2 = TempDir::new().unwrap();
    let local_h2 = TempDir::new().unwrap();
    let vimrc_h2 = local_h2.path().join("vimrc");

    let mut registry = syncstation_sync::store::load_sync_items(cloud.path()).unwrap();
    registry
        .find_mut("Vim")
        .unwrap()
        .paths
        .insert("h2".to_string(), vimrc_h2.clone());
    syncstation_sync::store::save_sync_items(cloud.path(), &registry).unwrap();

    let orch_h2 = Orchestrator::new(config_dir_h2.path(), make_config(cloud.path(), "h2")).unwrap();
    let result = orch_h2.pull(None, false).unwrap();
    assert_eq!(result.changed, 1);
    assert_eq!(fs::read_to_string(&vimrc_h2).unwrap(), "set ts=4\n");
}

/// Scenario D — independent edits on both sides since the last recorded
/// anchor, with equal mtimes, must be reported as a conflict and must not
/// touch either file.
#[test]
fn divergent_edits_with_equal_mtime_report_conflict_without_writing() {
    let cloud = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let vimrc = local.path().join("vimrc");
    fs::write(&vimrc, "set ts=4\n").unwrap();

    register_vim(cloud.path(), "h1", &vimrc);
    let orch = Orchestrator::new(config_dir.path(), make_config(cloud.path(), "h1")).unwrap();
    orch.push(None, false).unwrap();

    let cloud_path = syncstation_core::paths::cloud_item_path(cloud.path(), "Vim");

    // Independent edits "at the same instant" from the anchor's perspective.
    let same_instant = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(60));
    fs::write(&vimrc, "set ts=8\n").unwrap();
    set_file_mtime(&vimrc, same_instant).unwrap();
    fs::write(&cloud_path, "set ts=2\n").unwrap();
    set_file_mtime(&cloud_path, same_instant).unwrap();

    // The anchor recorded at push time still points at the pre-edit cloud
    // hash, so the cloud side now reads as "changed since our last sync".
    let before_local = fs::read_to_string(&vimrc).unwrap();
    let before_cloud = fs::read_to_string(&cloud_path).unwrap();

    let result = orch.sync(None).unwrap();
    assert_eq!(result.errored, 1, "divergent same-mtime edit must surface as an error");
    assert_eq!(fs::read_to_string(&vimrc).unwrap(), before_local);
    assert_eq!(fs::read_to_string(&cloud_path).unwrap(), before_cloud);

    let push_without_force = orch.push(None, false);
    assert!(push_without_force.is_err(), "push must refuse a conflicting item without --force");
}

/// Push then remove with `GlobalDeleteCloud`: the registry entry and the
/// cloud payload must both disappear, but a plain `Global` remove must
/// leave the cloud payload in place for any other computer still tracking
/// the item under a different path.
#[test]
fn remove_global_keeps_cloud_payload_unless_delete_cloud_is_set() {
    let cloud = TempDir::new().unwrap();
    let config_dir = TempDir::new().unwrap();
    let local = TempDir::new().unwrap();
    let vimrc = local.path().join("vimrc");
    fs::write(&vimrc, "set ts=4\n").unwrap();

    register_vim(cloud.path(), "h1", &vimrc);
    let orch = Orchestrator::new(config_dir.path(), make_config(cloud.path(), "h1")).unwrap();
    orch.sync(None).unwrap();

    let cloud_path = syncstation_core::paths::cloud_item_path(cloud.path(), "Vim");
    orch.remove("Vim", syncstation_sync::RemoveMode::Global).unwrap();

    let registry = syncstation_sync::store::load_sync_items(cloud.path()).unwrap();
    assert!(!registry.contains("Vim"));
    assert!(cloud_path.exists(), "plain Global remove keeps the cloud payload");
}
