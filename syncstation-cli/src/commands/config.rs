//! `syncstation config`

use anyhow::Result;

use super::require_config;

pub fn run() -> Result<()> {
    let config = require_config()?;
    println!("cloud sync dir : {}", config.cloud_sync_dir.display());
    println!("current computer: {}", config.current_computer);
    println!("git mode        : {}", config.git_mode);
    if let Some(root) = &config.git_repo_root {
        println!("git repo root   : {}", root.display());
    }
    Ok(())
}
