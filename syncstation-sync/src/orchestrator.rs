//! Orchestrator (C11) — turns a selected operation and item set into tasks,
//! submits them to the worker pool (C9), and aggregates the results.

use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use syncstation_core::paths::{cloud_item_path, local_path};
use syncstation_core::{
    Decision, ErrorKind, FileMetadataDocument, FileStatesData, ItemKind, LocalConfig,
    SyncErrorRecord, SyncItem, SyncItemRegistry, SyncOperation, SyncResult,
};

use crate::decision::{decide, decide_pull, decide_push, decide_tree};
use crate::error::SyncError;
use crate::hash_cache::HashCache;
use crate::mover::{list_files_recursive, pull_file, pull_tree, push_file, push_tree};
use crate::probe::probe;
use crate::pool::WorkerPool;
use crate::store;

/// Wall-clock budget for one `run()` batch before unfinished items are
/// reported as timed out rather than awaited indefinitely.
const BATCH_TIMEOUT: Duration = Duration::from_secs(300);

/// A read-only status preview for one sync item.
#[derive(Debug, Clone)]
pub struct ItemStatus {
    pub name: String,
    pub kind: ItemKind,
    pub decision: Decision,
}

/// The three `remove` semantics exposed on the CLI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveMode {
    /// Drop this computer's path entry only.
    LocalOnly,
    /// Drop the item from the registry, keep the cloud files.
    Global,
    /// Drop the item from the registry and delete the cloud files + metadata.
    GlobalDeleteCloud,
}

pub struct Orchestrator {
    config_dir: PathBuf,
    pub(crate) config: LocalConfig,
    cache: Arc<HashCache>,
}

/// Per-item work handed to a worker thread; everything here is owned so it
/// can cross the thread boundary.
struct ItemJob {
    operation: SyncOperation,
    item: SyncItem,
    computer: String,
    cloud_sync_dir: PathBuf,
    cache: Arc<HashCache>,
    file_states: Arc<Mutex<FileStatesData>>,
    file_metadata: Arc<Mutex<FileMetadataDocument>>,
}

impl Orchestrator {
    pub fn new(config_dir: impl Into<PathBuf>, config: LocalConfig) -> Result<Self, SyncError> {
        let config_dir = config_dir.into();
        let cache = Arc::new(HashCache::load_at(&config_dir)?);
        Ok(Orchestrator {
            config_dir,
            config,
            cache,
        })
    }

    fn selected_items<'a>(
        &self,
        registry: &'a SyncItemRegistry,
        names: Option<&[String]>,
    ) -> Vec<&'a SyncItem> {
        match names {
            None => registry.sync_items.iter().collect(),
            Some(names) => registry
                .sync_items
                .iter()
                .filter(|item| names.iter().any(|n| n == &item.name.0))
                .collect(),
        }
    }

    /// Smart two-way sync: for every selected item (all, or the named
    /// subset), decide per file using the full three-way decision engine.
    pub fn sync(&self, names: Option<&[String]>) -> Result<SyncResult, SyncError> {
        self.run(SyncOperation::Smart, names, false)
    }

    /// One-way push, mirroring local → cloud. Gated by a conflict preview
    /// unless `force` is set.
    pub fn push(&self, names: Option<&[String]>, force: bool) -> Result<SyncResult, SyncError> {
        self.run(SyncOperation::Push, names, force)
    }

    /// One-way pull, mirroring cloud → local. Gated by a conflict preview
    /// unless `force` is set.
    pub fn pull(&self, names: Option<&[String]>, force: bool) -> Result<SyncResult, SyncError> {
        self.run(SyncOperation::Pull, names, force)
    }

    fn run(
        &self,
        operation: SyncOperation,
        names: Option<&[String]>,
        force: bool,
    ) -> Result<SyncResult, SyncError> {
        let registry = store::load_sync_items(&self.config.cloud_sync_dir)?;
        let file_metadata_doc =
            store::load_file_metadata(&self.config, &self.config.cloud_sync_dir)?;

        let items: Vec<SyncItem> = self
            .selected_items(&registry, names)
            .into_iter()
            .cloned()
            .collect();

        if matches!(operation, SyncOperation::Push | SyncOperation::Pull) && !force {
            let offenders = self.conflict_preview(&items, &file_metadata_doc)?;
            if !offenders.is_empty() {
                return Err(SyncError::Conflict(format!(
                    "conflicting item(s), re-run with --force to override: {}",
                    offenders.join(", ")
                )));
            }
        }

        let file_states = Arc::new(Mutex::new(store::load_file_states(&self.config_dir)?));
        let file_metadata = Arc::new(Mutex::new(file_metadata_doc));
        let result = Arc::new(Mutex::new(SyncResult::default()));

        let pool = WorkerPool::new(None, None);
        let mut submitted = 0usize;

        for item in &items {
            loop {
                let job = ItemJob {
                    operation,
                    item: item.clone(),
                    computer: self.config.current_computer.clone(),
                    cloud_sync_dir: self.config.cloud_sync_dir.clone(),
                    cache: Arc::clone(&self.cache),
                    file_states: Arc::clone(&file_states),
                    file_metadata: Arc::clone(&file_metadata),
                };
                let result = Arc::clone(&result);
                match pool.submit(move |_token| {
                    let outcome = process_item(job);
                    let mut result = result.lock().unwrap();
                    record_outcome(&mut result, outcome);
                    Ok(())
                }) {
                    Ok(_) => {
                        submitted += 1;
                        break;
                    }
                    // queue_capacity defaults to 2x workers; at capacity, wait
                    // for a slot to free up and rebuild the job for a fresh
                    // submit rather than reusing the closure submit() just
                    // consumed (and dropped) on the failed attempt.
                    Err(SyncError::QueueFull) => {
                        std::thread::sleep(Duration::from_millis(5));
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        let deadline = Instant::now() + BATCH_TIMEOUT;
        let mut received = 0usize;
        while received < submitted {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match pool
                .results()
                .recv_timeout(remaining.min(Duration::from_millis(200)))
            {
                Ok(_) => received += 1,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        pool.stop();
        let timed_out = submitted - received;

        let file_states = Arc::try_unwrap(file_states)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_default();
        let file_metadata = Arc::try_unwrap(file_metadata)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_default();
        let mut result = Arc::try_unwrap(result)
            .map(|m| m.into_inner().unwrap())
            .unwrap_or_default();

        store::save_file_states(&self.config_dir, &file_states)?;
        store::save_file_metadata(&self.config, &self.config.cloud_sync_dir, &file_metadata)?;
        self.cache.save()?;

        if timed_out > 0 {
            return Err(SyncError::TimedOut);
        }

        result.message = format!(
            "{} changed, {} skipped, {} errored",
            result.changed, result.skipped, result.errored
        );
        Ok(result)
    }

    fn conflict_preview(
        &self,
        items: &[SyncItem],
        file_metadata: &FileMetadataDocument,
    ) -> Result<Vec<String>, SyncError> {
        let mut offenders = Vec::new();
        for item in items {
            let decision = self.item_decision(item, file_metadata)?;
            if matches!(decision, Decision::Conflict { .. }) {
                offenders.push(item.name.0.clone());
            }
        }
        Ok(offenders)
    }

    fn item_decision(
        &self,
        item: &SyncItem,
        file_metadata: &FileMetadataDocument,
    ) -> Result<Decision, SyncError> {
        let Some(local_root) = local_path(item, &self.config.current_computer) else {
            return Ok(Decision::Skip);
        };
        let cloud_root = cloud_item_path(&self.config.cloud_sync_dir, &item.name.0);

        Ok(match item.kind {
            ItemKind::File => {
                let diff = probe(&local_root, &cloud_root, &self.cache);
                let anchor = file_metadata
                    .get(&item.name.0, "")
                    .and_then(|m| m.cloud_hash.clone());
                decide(&diff, anchor.as_deref())
            }
            ItemKind::Folder => {
                let local_mtime = tree_mtime(&local_root);
                let cloud_mtime = tree_mtime(&cloud_root);
                let differs = tree_content_differs(&local_root, &cloud_root, &self.cache)?;
                decide_tree(local_mtime, cloud_mtime, differs)
            }
        })
    }

    /// Read-only preview of what a `sync` would do for each selected item,
    /// without writing anything.
    pub fn status(&self, names: Option<&[String]>) -> Result<Vec<ItemStatus>, SyncError> {
        let registry = store::load_sync_items(&self.config.cloud_sync_dir)?;
        let file_metadata = store::load_file_metadata(&self.config, &self.config.cloud_sync_dir)?;
        let items = self.selected_items(&registry, names);

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let decision = self.item_decision(item, &file_metadata)?;
            out.push(ItemStatus {
                name: item.name.0.clone(),
                kind: item.kind,
                decision,
            });
        }
        Ok(out)
    }

    /// Three `remove` semantics: drop this computer's path, drop the item
    /// keeping cloud files, or drop the item and delete the cloud files.
    pub fn remove(&self, item_name: &str, mode: RemoveMode) -> Result<(), SyncError> {
        let mut registry = store::load_sync_items(&self.config.cloud_sync_dir)?;

        match mode {
            RemoveMode::LocalOnly => {
                if let Some(item) = registry.find_mut(item_name) {
                    item.paths.remove(&self.config.current_computer);
                }
                store::save_sync_items(&self.config.cloud_sync_dir, &registry)?;
            }
            RemoveMode::Global => {
                registry.sync_items.retain(|i| i.name.0 != item_name);
                store::save_sync_items(&self.config.cloud_sync_dir, &registry)?;
            }
            RemoveMode::GlobalDeleteCloud => {
                registry.sync_items.retain(|i| i.name.0 != item_name);
                store::save_sync_items(&self.config.cloud_sync_dir, &registry)?;

                let cloud_path = cloud_item_path(&self.config.cloud_sync_dir, item_name);
                if cloud_path.is_dir() {
                    std::fs::remove_dir_all(&cloud_path)
                        .map_err(|e| crate::error::io_err(&cloud_path, e))?;
                } else if cloud_path.exists() {
                    std::fs::remove_file(&cloud_path)
                        .map_err(|e| crate::error::io_err(&cloud_path, e))?;
                }

                let mut file_metadata =
                    store::load_file_metadata(&self.config, &self.config.cloud_sync_dir)?;
                file_metadata.remove_item(item_name);
                store::save_file_metadata(
                    &self.config,
                    &self.config.cloud_sync_dir,
                    &file_metadata,
                )?;
            }
        }
        Ok(())
    }
}

/// What a single [`ItemJob`] produced.
enum ItemOutcome {
    Skipped,
    Changed,
    Error(SyncErrorRecord),
}

fn record_outcome(result: &mut SyncResult, outcome: ItemOutcome) {
    match outcome {
        ItemOutcome::Skipped => result.record_skipped(),
        ItemOutcome::Changed => result.record_changed(),
        ItemOutcome::Error(record) => result.record_error(record),
    }
}

fn process_item(job: ItemJob) -> ItemOutcome {
    let Some(local_root) = local_path(&job.item, &job.computer) else {
        return ItemOutcome::Skipped;
    };
    let cloud_root = cloud_item_path(&job.cloud_sync_dir, &job.item.name.0);

    match job.item.kind {
        ItemKind::File => process_file(&job, &local_root, &cloud_root),
        ItemKind::Folder => process_tree(&job, &local_root, &cloud_root),
    }
}

fn process_file(job: &ItemJob, local: &Path, cloud: &Path) -> ItemOutcome {
    let diff = probe(local, cloud, &job.cache);
    let anchor = {
        let file_metadata = job.file_metadata.lock().unwrap();
        file_metadata
            .get(&job.item.name.0, "")
            .and_then(|m| m.cloud_hash.clone())
    };

    let decision = match job.operation {
        SyncOperation::Smart => decide(&diff, anchor.as_deref()),
        SyncOperation::Push => decide_push(&diff),
        SyncOperation::Pull => decide_pull(&diff),
    };

    apply_file_decision(job, decision, local, cloud)
}

fn apply_file_decision(job: &ItemJob, decision: Decision, local: &Path, cloud: &Path) -> ItemOutcome {
    match decision {
        Decision::Skip => ItemOutcome::Skipped,
        Decision::PushLocalToCloud => {
            let mut states = job.file_states.lock().unwrap();
            let mut metadata = job.file_metadata.lock().unwrap();
            match push_file(
                &job.item.name.0,
                "",
                local,
                cloud,
                &job.computer,
                &job.cache,
                &mut states,
                &mut metadata,
            ) {
                Ok(_) => ItemOutcome::Changed,
                Err(e) => ItemOutcome::Error(io_error_record(&job.item.name.0, local, e)),
            }
        }
        Decision::PullCloudToLocal => {
            let mut states = job.file_states.lock().unwrap();
            let mut metadata = job.file_metadata.lock().unwrap();
            match pull_file(
                &job.item.name.0,
                "",
                local,
                cloud,
                &job.computer,
                &job.cache,
                &mut states,
                &mut metadata,
            ) {
                Ok(_) => ItemOutcome::Changed,
                Err(e) => ItemOutcome::Error(io_error_record(&job.item.name.0, local, e)),
            }
        }
        Decision::Conflict { reason } => ItemOutcome::Error(SyncErrorRecord {
            kind: ErrorKind::Conflict,
            op: "sync".to_string(),
            item: Some(job.item.name.0.clone()),
            path: Some(local.to_path_buf()),
            cause: Some(reason),
        }),
    }
}

fn process_tree(job: &ItemJob, local_root: &Path, cloud_root: &Path) -> ItemOutcome {
    match job.operation {
        SyncOperation::Push => {
            let mut states = job.file_states.lock().unwrap();
            let mut metadata = job.file_metadata.lock().unwrap();
            match push_tree(
                &job.item.name.0,
                local_root,
                cloud_root,
                &job.computer,
                &job.cache,
                &mut states,
                &mut metadata,
            ) {
                Ok(_) => ItemOutcome::Changed,
                Err(e) => ItemOutcome::Error(io_error_record(&job.item.name.0, local_root, e)),
            }
        }
        SyncOperation::Pull => {
            let mut states = job.file_states.lock().unwrap();
            let mut metadata = job.file_metadata.lock().unwrap();
            match pull_tree(
                &job.item.name.0,
                local_root,
                cloud_root,
                &job.computer,
                &job.cache,
                &mut states,
                &mut metadata,
            ) {
                Ok(_) => ItemOutcome::Changed,
                Err(e) => ItemOutcome::Error(io_error_record(&job.item.name.0, local_root, e)),
            }
        }
        SyncOperation::Smart => {
            let local_mtime = tree_mtime(local_root);
            let cloud_mtime = tree_mtime(cloud_root);
            let content_differs = tree_content_differs(local_root, cloud_root, &job.cache)
                .unwrap_or(true);
            match decide_tree(local_mtime, cloud_mtime, content_differs) {
                Decision::Skip => ItemOutcome::Skipped,
                Decision::PushLocalToCloud => {
                    let mut states = job.file_states.lock().unwrap();
                    let mut metadata = job.file_metadata.lock().unwrap();
                    match push_tree(
                        &job.item.name.0,
                        local_root,
                        cloud_root,
                        &job.computer,
                        &job.cache,
                        &mut states,
                        &mut metadata,
                    ) {
                        Ok(_) => ItemOutcome::Changed,
                        Err(e) => {
                            ItemOutcome::Error(io_error_record(&job.item.name.0, local_root, e))
                        }
                    }
                }
                Decision::PullCloudToLocal => {
                    let mut states = job.file_states.lock().unwrap();
                    let mut metadata = job.file_metadata.lock().unwrap();
                    match pull_tree(
                        &job.item.name.0,
                        local_root,
                        cloud_root,
                        &job.computer,
                        &job.cache,
                        &mut states,
                        &mut metadata,
                    ) {
                        Ok(_) => ItemOutcome::Changed,
                        Err(e) => {
                            ItemOutcome::Error(io_error_record(&job.item.name.0, local_root, e))
                        }
                    }
                }
                Decision::Conflict { reason } => ItemOutcome::Error(SyncErrorRecord {
                    kind: ErrorKind::Conflict,
                    op: "sync".to_string(),
                    item: Some(job.item.name.0.clone()),
                    path: Some(local_root.to_path_buf()),
                    cause: Some(reason),
                }),
            }
        }
    }
}

fn io_error_record(item: &str, path: &Path, e: SyncError) -> SyncErrorRecord {
    SyncErrorRecord {
        kind: ErrorKind::Io,
        op: "sync".to_string(),
        item: Some(item.to_string()),
        path: Some(path.to_path_buf()),
        cause: Some(e.to_string()),
    }
}

fn tree_mtime(root: &Path) -> Option<chrono::DateTime<chrono::Utc>> {
    let meta = std::fs::metadata(root).ok()?;
    meta.modified().ok().map(chrono::DateTime::from)
}

fn tree_content_differs(
    local_root: &Path,
    cloud_root: &Path,
    cache: &HashCache,
) -> Result<bool, SyncError> {
    if !local_root.exists() || !cloud_root.exists() {
        return Ok(true);
    }
    let local_files = list_files_recursive(local_root)?;
    let cloud_files = list_files_recursive(cloud_root)?;
    if local_files.len() != cloud_files.len() {
        return Ok(true);
    }
    for rel in &local_files {
        let local_hash = cache.get_or_calculate(&local_root.join(rel)).ok();
        let cloud_path = cloud_root.join(rel);
        if !cloud_path.exists() {
            return Ok(true);
        }
        let cloud_hash = cache.get_or_calculate(&cloud_path).ok();
        if local_hash != cloud_hash {
            return Ok(true);
        }
    }
    Ok(false)
}
