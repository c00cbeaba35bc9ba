//! Incremental change-feed application
//!
//! The [`ChangeReconciler`] drains the remote change feed from the persisted
//! continuation token and applies every event to the record store, producing
//! the same store state a full rebuild would as of the new token.
//!
//! ## Delivery semantics
//!
//! Events apply in feed order within a pass, so later events for the same
//! node win. The persisted token advances only after a page has been fully
//! applied; a failed page fetch leaves it at the previous page boundary, so
//! the next run re-reads from there. That makes delivery at-least-once, and
//! every operation here is idempotent to tolerate the re-application:
//! upserts replace, deletes of absent ids are no-ops.
//!
//! Path resolution is never attempted inline; nodes written here stay
//! orphaned until the resolver pass that follows reconciliation.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use treemirror_core::domain::newtypes::{ChangeToken, NodeId};
use treemirror_core::normalize::{NodeNormalizer, Normalized};
use treemirror_core::ports::tree_client::ChangeEvent;
use treemirror_core::ports::{IRecordStore, ITreeClient};

/// Counts reported by a completed reconciliation pass
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    /// Change pages applied
    pub pages: u32,
    /// Nodes inserted or replaced
    pub upserted: u64,
    /// Nodes deleted
    pub deleted: u64,
    /// Removal events for ids never mirrored (no-ops, counted separately)
    pub ghost_removals: u64,
    /// Events skipped (malformed, untracked kinds)
    pub skipped: u64,
    /// The token anchoring the next sync cycle, already persisted
    pub new_token: ChangeToken,
}

/// Applies the remote change feed against the record store
pub struct ChangeReconciler {
    tree: Arc<dyn ITreeClient>,
    store: Arc<dyn IRecordStore>,
    normalizer: Arc<NodeNormalizer>,
}

#[derive(Default)]
struct Counts {
    upserted: u64,
    deleted: u64,
    ghost_removals: u64,
    skipped: u64,
}

impl ChangeReconciler {
    pub fn new(
        tree: Arc<dyn ITreeClient>,
        store: Arc<dyn IRecordStore>,
        normalizer: Arc<NodeNormalizer>,
    ) -> Self {
        Self {
            tree,
            store,
            normalizer,
        }
    }

    /// Drains and applies every change page from `start`, advancing the
    /// persisted token page-by-page
    ///
    /// On error the token stays at the last fully applied page; the caller
    /// propagates the error without touching the checkpoint further.
    pub async fn apply_changes(&self, start: &ChangeToken) -> Result<ReconcileOutcome> {
        let mut state = self
            .store
            .load_state()
            .await
            .context("Failed to load checkpoint before reconciling")?;

        let mut cursor = start.clone();
        let mut counts = Counts::default();
        let mut pages: u32 = 0;

        info!(token = %cursor, "Starting change reconciliation");

        loop {
            let page = self
                .tree
                .list_changes(&cursor)
                .await
                .with_context(|| format!("Change feed fetch failed at token {cursor}"))?;

            pages += 1;
            let delivered = page.changes.len();

            for event in &page.changes {
                self.apply_event(event, &mut counts).await?;
            }

            debug!(page = pages, delivered, "Change page applied");

            match (page.next_cursor, page.new_start_token) {
                (Some(next), _) => {
                    // This page is applied in full; advancing the token here
                    // is what lets a later failure resume at this boundary
                    state.advance_token(next.clone());
                    self.store
                        .save_state(&state)
                        .await
                        .context("Failed to persist checkpoint after change page")?;
                    cursor = next;
                }
                (None, Some(new_start)) => {
                    state.advance_token(new_start.clone());
                    self.store
                        .save_state(&state)
                        .await
                        .context("Failed to persist final change token")?;

                    info!(
                        pages,
                        upserted = counts.upserted,
                        deleted = counts.deleted,
                        ghost_removals = counts.ghost_removals,
                        skipped = counts.skipped,
                        "Change reconciliation complete"
                    );

                    return Ok(ReconcileOutcome {
                        pages,
                        upserted: counts.upserted,
                        deleted: counts.deleted,
                        ghost_removals: counts.ghost_removals,
                        skipped: counts.skipped,
                        new_token: new_start,
                    });
                }
                (None, None) => {
                    anyhow::bail!("Change feed ended without a new start token");
                }
            }
        }
    }

    /// Applies one change event; malformed events are skipped with a
    /// diagnostic, never fatal, since the feed is allowed to be transiently
    /// inconsistent
    async fn apply_event(&self, event: &ChangeEvent, counts: &mut Counts) -> Result<()> {
        let id = match NodeId::new(event.node_id.clone()) {
            Ok(id) => id,
            Err(_) => {
                warn!("Change event with empty node id, skipping");
                counts.skipped += 1;
                return Ok(());
            }
        };

        // A trashed payload is a removal in everything but the flag
        let removed = event.removed || event.node.as_ref().is_some_and(|n| n.trashed);

        if removed {
            if self
                .store
                .delete(&id)
                .await
                .with_context(|| format!("Failed to delete node {id}"))?
            {
                counts.deleted += 1;
            } else {
                // Created and deleted between syncs; nothing to do
                debug!(node = %id, "Removal for a node never mirrored");
                counts.ghost_removals += 1;
            }
            return Ok(());
        }

        let Some(raw) = &event.node else {
            warn!(node = %id, "Non-removal change event without a node payload, skipping");
            counts.skipped += 1;
            return Ok(());
        };

        let mut node = match self.normalizer.normalize(raw) {
            Ok(Normalized::Tracked(node)) => node,
            Ok(Normalized::Skipped(reason)) => {
                debug!(node = %id, ?reason, "Skipping untracked change event");
                counts.skipped += 1;
                return Ok(());
            }
            Err(e) => {
                warn!(node = %id, error = %e, "Skipping malformed change event");
                counts.skipped += 1;
                return Ok(());
            }
        };

        if node.first_parent().is_none() {
            warn!(node = %id, "Change event without a parent reference, skipping");
            counts.skipped += 1;
            return Ok(());
        }

        let existing = self
            .store
            .find_by_id(&id)
            .await
            .with_context(|| format!("Failed to look up node {id}"))?;

        if let Some(existing) = &existing {
            let renamed = existing.name() != node.name();
            let moved = existing.first_parent() != node.first_parent();

            // A folder rename or move changes the ancestry every descendant
            // path spells out; invalidate them so the resolver recomputes
            if existing.is_folder() && (renamed || moved) {
                let cleared = self
                    .store
                    .clear_paths_beneath(&id)
                    .await
                    .with_context(|| format!("Failed to invalidate paths beneath {id}"))?;
                debug!(
                    node = %id,
                    renamed,
                    moved,
                    invalidated = cleared,
                    "Folder rename/move, descendant paths cleared"
                );
            }

            // The node's own path spells out its ancestors' names, which a
            // rename of the node itself does not touch; carry it over
            // unless the node moved
            if !moved {
                if let Some(path) = existing.path() {
                    node.set_path(path.clone());
                }
            }
        }

        self.store
            .upsert(&node)
            .await
            .with_context(|| format!("Failed to upsert node {id}"))?;
        counts.upserted += 1;

        Ok(())
    }
}
