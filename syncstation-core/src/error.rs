//! Error types for syncstation-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can arise from config loading, path resolution, and validation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure (file not found, permission denied, etc.).
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `dirs::config_dir()`/`dirs::home_dir()` returned `None`.
    #[error("cannot determine platform config directory; set $XDG_CONFIG_HOME or $HOME")]
    HomeNotFound,

    /// A validator rejected its input before any side effect occurred.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Convenience constructor for [`CoreError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}
