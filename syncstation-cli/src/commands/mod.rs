pub mod add;
pub mod backup;
pub mod config;
pub mod init;
pub mod list;
pub mod remove;
pub mod status;
pub mod sync;

use anyhow::{Context, Result};
use syncstation_core::LocalConfig;
use syncstation_sync::Orchestrator;

/// Load the local configuration, failing with a helpful message if this
/// computer hasn't been initialized yet.
pub(crate) fn require_config() -> Result<LocalConfig> {
    let config = syncstation_core::config::load().context("failed to load local configuration")?;
    if !config.is_initialized() {
        anyhow::bail!("not initialized — run `syncstation init <cloud-dir>` first");
    }
    Ok(config)
}

pub(crate) fn orchestrator(config: LocalConfig) -> Result<Orchestrator> {
    let config_dir = syncstation_core::config::platform_config_dir()
        .context("could not determine platform config directory")?;
    Orchestrator::new(config_dir, config)
        .context("failed to construct orchestrator")
        .map_err(Into::into)
}
