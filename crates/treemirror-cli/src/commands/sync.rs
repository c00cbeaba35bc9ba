//! Sync command - run one sync cycle
//!
//! Wires the Drive client, the SQLite record store, and the coordinator,
//! then runs one invocation to its terminal condition and reports what it
//! did: the rebuild-vs-reconcile decision, node counts, and any persistent
//! orphan count.

use anyhow::Result;
use clap::Args;

use treemirror_core::config::Config;
use treemirror_sync::SyncReport;

use crate::commands::build_coordinator;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(matches!(format, OutputFormat::Json));

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

/// Renders a sync report in the selected format; shared with `rebuild`
pub(crate) fn print_report(formatter: &dyn OutputFormatter, report: &SyncReport) {
    formatter.print_json(&serde_json::json!({
        "run_id": report.run_id.to_string(),
        "mode": report.mode.as_str(),
        "nodes_written": report.nodes_written,
        "upserted": report.upserted,
        "deleted": report.deleted,
        "skipped": report.skipped,
        "orphans_remaining": report.orphans_remaining,
        "cycles_detected": report.cycles_detected,
        "duration_ms": report.duration_ms,
    }));

    formatter.success(&format!(
        "Sync complete ({}, {} ms)",
        report.mode.as_str(),
        report.duration_ms
    ));
    match report.mode {
        treemirror_sync::SyncMode::Rebuild => {
            formatter.info(&format!("nodes written: {}", report.nodes_written));
        }
        treemirror_sync::SyncMode::Reconcile => {
            formatter.info(&format!("upserted: {}", report.upserted));
            formatter.info(&format!("deleted:  {}", report.deleted));
        }
    }
    if report.skipped > 0 {
        formatter.info(&format!("skipped:  {}", report.skipped));
    }
    if report.orphans_remaining > 0 {
        formatter.info(&format!(
            "orphans awaiting ancestors: {}",
            report.orphans_remaining
        ));
    }
    if report.cycles_detected > 0 {
        formatter.info(&format!(
            "nodes in parent cycles: {}",
            report.cycles_detected
        ));
    }
}
