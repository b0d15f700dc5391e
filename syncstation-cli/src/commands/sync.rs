//! `syncstation sync|push|pull [<name>] [--force]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use syncstation_core::SyncResult;

use super::{orchestrator, require_config};

/// Shared arguments for `sync`, `push`, and `pull`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sync only this item (omit to sync every registered item).
    pub name: Option<String>,

    /// Override a conflict that would otherwise block a one-way push/pull.
    #[arg(long)]
    pub force: bool,
}

impl SyncArgs {
    pub fn run_smart(self) -> Result<()> {
        let config = require_config()?;
        let orch = orchestrator(config)?;
        let names = self.name.as_ref().map(std::slice::from_ref);
        let result = orch.sync(names).context("sync failed")?;
        print_result(&result);
        if result.success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("sync completed with {} error(s)", result.errored))
        }
    }

    pub fn run_push(self) -> Result<()> {
        let config = require_config()?;
        let orch = orchestrator(config)?;
        let names = self.name.as_ref().map(std::slice::from_ref);
        let result = orch.push(names, self.force).context("push failed")?;
        print_result(&result);
        if result.success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("push completed with {} error(s)", result.errored))
        }
    }

    pub fn run_pull(self) -> Result<()> {
        let config = require_config()?;
        let orch = orchestrator(config)?;
        let names = self.name.as_ref().map(std::slice::from_ref);
        let result = orch.pull(names, self.force).context("pull failed")?;
        print_result(&result);
        if result.success() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("pull completed with {} error(s)", result.errored))
        }
    }
}

fn print_result(result: &SyncResult) {
    println!(
        "{} {} changed, {} skipped, {} errored",
        if result.success() { "✓".green() } else { "✗".red() },
        result.changed,
        result.skipped,
        result.errored,
    );
    for error in &result.errors {
        println!("  {} {error}", "·".red());
    }
}
