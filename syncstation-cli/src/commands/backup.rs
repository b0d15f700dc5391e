//! `syncstation backup stats`

use anyhow::{Context, Result};
use clap::Subcommand;

use syncstation_sync::BackupManager;

use super::require_config;

#[derive(Subcommand, Debug)]
pub enum BackupCommand {
    /// Show aggregate statistics over the local backup manifest.
    Stats,
}

impl BackupCommand {
    pub fn run(self) -> Result<()> {
        match self {
            BackupCommand::Stats => run_stats(),
        }
    }
}

fn run_stats() -> Result<()> {
    let config = require_config()?;
    let config_dir = syncstation_core::config::platform_config_dir()
        .context("could not determine platform config directory")?;
    let manager = BackupManager::new(config_dir.join("backups"), config.current_computer.clone());
    let stats = manager.stats().context("failed to read backup manifest")?;

    println!("{} backup entries, {} bytes total", stats.total_entries, stats.total_bytes);
    for (item, count) in &stats.per_item {
        println!("  {item}: {count}");
    }
    if let Some(oldest) = stats.oldest {
        println!("oldest: {}", oldest.to_rfc3339());
    }
    if let Some(newest) = stats.newest {
        println!("newest: {}", newest.to_rfc3339());
    }
    Ok(())
}
