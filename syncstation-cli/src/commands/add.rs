//! `syncstation add <name> <path> [--exclude <glob,...>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use syncstation_core::paths::slug;
use syncstation_core::validate::{validate_exclude_pattern, validate_item_name, validate_path, PathPolicy};
use syncstation_core::{ItemKind, ItemName, SyncItem};

use super::require_config;

/// Register a file or folder as a sync item.
#[derive(Args, Debug)]
pub struct AddArgs {
    /// Logical item name (e.g. "Vim", "SSH Config").
    pub name: String,

    /// Absolute path to the file or directory on this computer.
    pub path: PathBuf,

    /// Comma-separated glob patterns to exclude (folders only).
    #[arg(long, value_delimiter = ',')]
    pub exclude: Vec<String>,
}

impl AddArgs {
    pub fn run(self) -> Result<()> {
        validate_item_name(&self.name).map_err(|e| anyhow::anyhow!("{e}"))?;
        validate_path(&self.path, &PathPolicy::default()).map_err(|e| anyhow::anyhow!("{e}"))?;
        for pattern in &self.exclude {
            validate_exclude_pattern(pattern).map_err(|e| anyhow::anyhow!("{e}"))?;
        }

        let path = self
            .path
            .canonicalize()
            .with_context(|| format!("cannot resolve path '{}'", self.path.display()))?;
        let kind = if path.is_dir() {
            ItemKind::Folder
        } else {
            ItemKind::File
        };

        let config = require_config()?;
        let mut registry = syncstation_sync::store::load_sync_items(&config.cloud_sync_dir)
            .context("failed to load sync-items.json")?;

        if registry.contains(&self.name) {
            anyhow::bail!("item '{}' already exists", self.name);
        }
        let new_slug = slug(&self.name);
        if let Some(existing) = registry
            .sync_items
            .iter()
            .find(|item| slug(&item.name.0) == new_slug)
        {
            anyhow::bail!(
                "item '{}' collides with existing item '{}' (both slug to '{new_slug}')",
                self.name,
                existing.name.0
            );
        }

        let mut paths = std::collections::HashMap::new();
        paths.insert(config.current_computer.clone(), path.clone());
        registry.sync_items.push(SyncItem {
            name: ItemName::from(self.name.clone()),
            kind,
            paths,
            exclude_patterns: self.exclude.clone(),
        });

        syncstation_sync::store::save_sync_items(&config.cloud_sync_dir, &registry)
            .context("failed to save sync-items.json")?;

        println!("added '{}' ({kind}) at {}", self.name, path.display());
        Ok(())
    }
}
