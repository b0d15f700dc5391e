//! Error types for syncstation-sync.

use std::path::PathBuf;

use syncstation_core::CoreError;
use thiserror::Error;

/// Errors arising anywhere in the sync pipeline: hash cache, atomic writer,
/// metadata store, decision engine, mover, backup manager, worker pool.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    /// Atomic writer: commit attempted on an already-committed transaction.
    #[error("transaction already committed")]
    AlreadyCommitted,

    /// Atomic writer: write attempted after the writer was closed.
    #[error("writer already closed")]
    WriterClosed,

    /// Worker pool: `submit` called while at `queue_capacity`.
    #[error("worker pool queue is full")]
    QueueFull,

    /// Worker pool: `submit` called after `stop()`.
    #[error("worker pool is shutting down")]
    ShuttingDown,

    /// Worker pool: a batch's wall-clock deadline elapsed before every
    /// submitted task produced a result.
    #[error("operation timed out before all items completed")]
    TimedOut,

    /// Backup manager: manifest has no entry for the requested id.
    #[error("no backup entry with id '{0}'")]
    BackupNotFound(String),

    /// Backup manager: manifest entry exists but its payload file is gone.
    #[error("backup payload missing for id '{0}' at {1}")]
    BackupPayloadMissing(String, PathBuf),

    /// Decision engine / orchestrator: both sides changed since the last
    /// known-good sync.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Hash mismatch detected where byte-identical content was required.
    #[error("hash mismatch at {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
