//! Rebuild command - discard the mirror and rebuild from scratch
//!
//! Resets the persisted checkpoint so the coordinator's startup decision
//! lands on the full-rebuild branch, then runs one invocation.

use anyhow::{Context, Result};
use clap::Args;

use treemirror_core::config::Config;
use treemirror_core::domain::state::MirrorState;
use treemirror_core::ports::IRecordStore;

use crate::commands::{build_coordinator, open_store};
use crate::output::{get_formatter, OutputFormat};

use super::sync::print_report;

#[derive(Debug, Args)]
pub struct RebuildCommand {}

impl RebuildCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

        // Dropping the checkpoint (no token, no root) forces the rebuild
        // branch; the coordinator does the actual dropping of node rows
        let store = open_store(config).await?;
        store
            .save_state(&MirrorState::initial())
            .await
            .context("Failed to reset sync checkpoint")?;

        let coordinator = match build_coordinator(config).await {
            Ok(coordinator) => coordinator,
            Err(e) => {
                formatter.error(&format!("{e:#}"));
                return Ok(());
            }
        };
        let report = coordinator.run().await?;

        print_report(formatter.as_ref(), &report);
        Ok(())
    }
}
