//! `syncstation list`

use anyhow::{Context, Result};
use tabled::{settings::Style, Table, Tabled};

use super::require_config;

#[derive(Tabled)]
struct ItemRow {
    #[tabled(rename = "item")]
    name: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "this computer")]
    local_path: String,
    #[tabled(rename = "computers")]
    computer_count: usize,
}

pub fn run() -> Result<()> {
    let config = require_config()?;
    let registry = syncstation_sync::store::load_sync_items(&config.cloud_sync_dir)
        .context("failed to load sync-items.json")?;

    if registry.sync_items.is_empty() {
        println!("no sync items registered — run `syncstation add` first");
        return Ok(());
    }

    let rows: Vec<ItemRow> = registry
        .sync_items
        .iter()
        .map(|item| ItemRow {
            name: item.name.0.clone(),
            kind: item.kind.to_string(),
            local_path: item
                .path_for(&config.current_computer)
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".to_string()),
            computer_count: item.paths.len(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}
