//! Local configuration persistence (`config.json`).
//!
//! # API pattern
//!
//! Every mutating function has two forms:
//! - `fn_at(config_dir: &Path, …)` — explicit directory; used in tests with `TempDir`
//! - `fn(…)` — derives the directory from [`platform_config_dir`], delegates to `_at`
//!
//! Tests must never call the no-arg wrappers; always use `_at`.

use std::path::{Path, PathBuf};

use crate::error::{io_err, CoreError};
use crate::types::LocalConfig;

/// `$XDG_CONFIG_HOME/syncstation`, falling back to the OS config dir
/// (`dirs::config_dir()`, which itself honors `$APPDATA` on Windows and
/// `$HOME` elsewhere) joined with `syncstation`.
pub fn platform_config_dir() -> Result<PathBuf, CoreError> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Ok(PathBuf::from(xdg).join("syncstation"));
        }
    }
    dirs::config_dir()
        .map(|dir| dir.join("syncstation"))
        .ok_or(CoreError::HomeNotFound)
}

/// `<config_dir>/config.json`.
pub fn config_path_at(config_dir: &Path) -> PathBuf {
    config_dir.join("config.json")
}

/// Load [`LocalConfig`] from `<config_dir>/config.json`.
///
/// Returns [`LocalConfig::default`] (uninitialized) if the file does not yet
/// exist — a missing document is not an error.
pub fn load_at(config_dir: &Path) -> Result<LocalConfig, CoreError> {
    let path = config_path_at(config_dir);
    if !path.exists() {
        return Ok(LocalConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// `load_at` convenience wrapper using [`platform_config_dir`].
pub fn load() -> Result<LocalConfig, CoreError> {
    load_at(&platform_config_dir()?)
}

/// Atomically save [`LocalConfig`] to `<config_dir>/config.json`.
///
/// Write flow: serialize (pretty) → `.json.tmp` sibling → `rename`.
pub fn save_at(config_dir: &Path, config: &LocalConfig) -> Result<(), CoreError> {
    std::fs::create_dir_all(config_dir).map_err(|e| io_err(config_dir, e))?;
    let path = config_path_at(config_dir);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))?;
    Ok(())
}

/// `save_at` convenience wrapper using [`platform_config_dir`].
pub fn save(config: &LocalConfig) -> Result<(), CoreError> {
    save_at(&platform_config_dir()?, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_at(tmp.path()).unwrap();
        assert!(!config.is_initialized());
    }

    #[test]
    fn roundtrip_save_load() {
        let tmp = TempDir::new().unwrap();
        let config = LocalConfig {
            cloud_sync_dir: PathBuf::from("/cloud"),
            current_computer: "laptop".to_string(),
            git_mode: false,
            git_repo_root: None,
        };
        save_at(tmp.path(), &config).unwrap();
        let loaded = load_at(tmp.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save_at(tmp.path(), &LocalConfig::default()).unwrap();
        let tmp_path = config_path_at(tmp.path()).with_extension("json.tmp");
        assert!(!tmp_path.exists());
    }

    #[test]
    fn git_mode_requires_repo_root_in_practice() {
        let tmp = TempDir::new().unwrap();
        let config = LocalConfig {
            cloud_sync_dir: PathBuf::from("/cloud"),
            current_computer: "laptop".to_string(),
            git_mode: true,
            git_repo_root: Some(PathBuf::from("/cloud/.git-root")),
        };
        save_at(tmp.path(), &config).unwrap();
        let loaded = load_at(tmp.path()).unwrap();
        assert!(loaded.git_mode);
        assert_eq!(loaded.git_repo_root, Some(PathBuf::from("/cloud/.git-root")));
    }
}
