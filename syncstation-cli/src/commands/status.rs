//! `syncstation status [<name>]`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use syncstation_core::Decision;
use tabled::{settings::Style, Table, Tabled};

use super::{orchestrator, require_config};

/// Show per-item sync status without writing anything.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show status for only this item.
    pub name: Option<String>,
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "item")]
    name: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "status")]
    status: String,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let config = require_config()?;
        let orch = orchestrator(config)?;
        let names = self.name.as_ref().map(std::slice::from_ref);
        let statuses = orch.status(names).context("failed to compute status")?;

        if statuses.is_empty() {
            println!("no sync items registered — run `syncstation add` first");
            return Ok(());
        }

        let rows: Vec<StatusRow> = statuses
            .iter()
            .map(|s| StatusRow {
                name: s.name.clone(),
                kind: s.kind.to_string(),
                status: label(&s.decision),
            })
            .collect();

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

fn label(decision: &Decision) -> String {
    match decision {
        Decision::Skip => "up to date".green().to_string(),
        Decision::PushLocalToCloud => "needs push".yellow().to_string(),
        Decision::PullCloudToLocal => "needs pull".yellow().to_string(),
        Decision::Conflict { reason } => format!("{} ({reason})", "conflict".red()),
    }
}
