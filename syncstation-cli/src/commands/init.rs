//! `syncstation init [<cloud-dir>] [--git] [--name <id>]`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use syncstation_core::validate::validate_computer_id;
use syncstation_core::{config, LocalConfig, SyncItemRegistry};

/// Initialize this computer against a rendezvous directory.
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path to the shared rendezvous directory (defaults to the cwd).
    pub cloud_dir: Option<PathBuf>,

    /// Store FileMetadata in Git notes instead of file-metadata.json.
    #[arg(long)]
    pub git: bool,

    /// This computer's id (defaults to the hostname).
    #[arg(long)]
    pub name: Option<String>,
}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let cloud_dir = self
            .cloud_dir
            .unwrap_or_else(|| PathBuf::from("."))
            .canonicalize()
            .context("cannot resolve cloud directory")?;

        let computer = match self.name {
            Some(name) => name,
            None => default_computer_id()?,
        };
        validate_computer_id(&computer)
            .map_err(|e| anyhow::anyhow!("invalid computer id '{computer}': {e}"))?;

        if self.git {
            git2::Repository::open(&cloud_dir)
                .context("--git requires an existing Git repository at the cloud directory")?;
        }

        std::fs::create_dir_all(cloud_dir.join("configs"))
            .context("failed to create the rendezvous directory layout")?;

        if !syncstation_sync::store::sync_items_path(&cloud_dir).exists() {
            syncstation_sync::store::save_sync_items(&cloud_dir, &SyncItemRegistry::default())
                .context("failed to seed sync-items.json")?;
        }

        let local_config = LocalConfig {
            cloud_sync_dir: cloud_dir.clone(),
            current_computer: computer.clone(),
            git_mode: self.git,
            git_repo_root: if self.git { Some(cloud_dir.clone()) } else { None },
        };
        config::save(&local_config).context("failed to save local configuration")?;

        println!(
            "initialized '{computer}' against {}{}",
            cloud_dir.display(),
            if self.git { " (git-notes mode)" } else { "" }
        );
        Ok(())
    }
}

fn default_computer_id() -> Result<String> {
    if let Ok(hostname) = std::env::var("HOSTNAME") {
        if !hostname.is_empty() {
            return Ok(hostname);
        }
    }
    hostname_fallback()
}

#[cfg(unix)]
fn hostname_fallback() -> Result<String> {
    let output = std::process::Command::new("hostname")
        .output()
        .context("failed to run `hostname`")?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(not(unix))]
fn hostname_fallback() -> Result<String> {
    anyhow::bail!("could not determine a default computer id; pass --name")
}
