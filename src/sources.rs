use anyhow::Result;
use serde::Serialize;

use crate::config::Config;

#[derive(Debug, Serialize)]
struct SourceRow {
    id: String,
    name: String,
}

/// Print the configured store universe in status-panel order.
pub fn list_sources(config: &Config, json: bool) -> Result<()> {
    let rows: Vec<SourceRow> = config
        .sources
        .descriptors()
        .into_iter()
        .map(|d| SourceRow {
            id: d.id.to_string(),
            name: d.display_name,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{:<16} NAME", "ID");
    for row in &rows {
        println!("{:<16} {}", row.id, row.name);
    }
    println!();
    println!("{} stores, endpoint {}", rows.len(), config.endpoint.search_url());

    Ok(())
}
