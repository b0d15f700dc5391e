//! Shared data model, configuration, path resolution, and validation used by
//! both `syncstation-sync` and `syncstation-cli`.

pub mod config;
pub mod error;
pub mod paths;
pub mod types;
pub mod validate;

pub use error::CoreError;
pub use types::{
    state_key, BackupEntry, BackupManifest, ComputerId, ComputerObservation, Decision, DiffProbe,
    ErrorKind, FileMetadata, FileMetadataDocument, FileState, FileStatesData, HashCacheEntry,
    ItemKind, ItemName, LocalConfig, Presence, SyncErrorRecord, SyncItem, SyncItemRegistry,
    SyncOperation, SyncResult, SyncTask,
};
