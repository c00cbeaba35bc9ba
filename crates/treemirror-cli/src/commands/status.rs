//! Status command - show mirror phase, node count, and orphan count

use anyhow::Result;
use clap::Args;

use treemirror_core::config::Config;
use treemirror_core::ports::IRecordStore;

use crate::commands::open_store;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusCommand {}

impl StatusCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        let store = open_store(config).await?;
        let state = store.load_state().await?;
        let nodes = store.count_nodes().await?;
        let orphans = store.find_unresolved().await?.len();

        formatter.print_json(&serde_json::json!({
            "phase": state.phase.as_str(),
            "nodes": nodes,
            "orphans": orphans,
            "has_token": state.change_token.is_some(),
            "root_id": state.root_id.as_ref().map(|r| r.as_str()),
            "updated_at": state.updated_at.to_rfc3339(),
        }));

        formatter.success(&format!("Mirror phase: {}", state.phase.as_str()));
        formatter.info(&format!("nodes:   {nodes}"));
        formatter.info(&format!("orphans: {orphans}"));
        formatter.info(&format!(
            "token:   {}",
            if state.change_token.is_some() {
                "anchored"
            } else {
                "none (next sync rebuilds)"
            }
        ));
        if state.needs_rebuild() {
            formatter.info("next sync will run a full rebuild");
        }

        Ok(())
    }
}
