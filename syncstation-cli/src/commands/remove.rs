//! `syncstation remove <name> [--global|--delete-cloud]`

use anyhow::{Context, Result};
use clap::Args;

use syncstation_sync::RemoveMode;

use super::{orchestrator, require_config};

/// Remove a sync item: by default only this computer's local path entry.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub name: String,

    /// Drop the item from the shared registry (cloud files are kept).
    #[arg(long, conflicts_with = "delete_cloud")]
    pub global: bool,

    /// Drop the item from the registry and delete the cloud files + metadata.
    #[arg(long)]
    pub delete_cloud: bool,
}

impl RemoveArgs {
    pub fn run(self) -> Result<()> {
        let mode = if self.delete_cloud {
            RemoveMode::GlobalDeleteCloud
        } else if self.global {
            RemoveMode::Global
        } else {
            RemoveMode::LocalOnly
        };

        let config = require_config()?;
        let orch = orchestrator(config)?;
        orch.remove(&self.name, mode)
            .with_context(|| format!("failed to remove '{}'", self.name))?;

        println!("removed '{}'", self.name);
        Ok(())
    }
}
