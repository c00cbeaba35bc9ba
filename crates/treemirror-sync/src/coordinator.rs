//! The rebuild-vs-reconcile state machine
//!
//! The [`SyncCoordinator`] is the single entry point for one sync
//! invocation. On startup it reads the persisted checkpoint and decides:
//!
//! - no token, no root, or a rebuild left dirty → **full rebuild**: drop
//!   the store, re-walk from the mirror root, anchor a fresh token captured
//!   after the walk completes;
//! - otherwise → **reconcile**: apply the change feed from the stored
//!   token, then resolve orphan paths.
//!
//! A reconcile pass interrupted mid-flight is resumed rather than rebuilt:
//! change application is idempotent and the token never runs ahead of
//! applied pages. A continuation token the remote no longer accepts is not
//! an error loop either; the coordinator logs it and falls through to a
//! full rebuild in the same invocation.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use treemirror_core::domain::newtypes::{NodePath, RunId};
use treemirror_core::normalize::{NodeNormalizer, Normalized};
use treemirror_core::ports::tree_client::is_stale_token;
use treemirror_core::ports::{IRecordStore, ITreeClient};

use crate::reconciler::ChangeReconciler;
use crate::resolver::PathResolver;
use crate::walker::TreeWalker;

/// Which branch of the state machine an invocation took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Rebuild,
    Reconcile,
}

impl SyncMode {
    /// Stable lowercase name for display
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Rebuild => "rebuild",
            SyncMode::Reconcile => "reconcile",
        }
    }
}

/// What one coordinator invocation did, for operator display
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub run_id: RunId,
    pub mode: SyncMode,
    /// Nodes materialized by a rebuild (including the root)
    pub nodes_written: u64,
    /// Nodes inserted or replaced by a reconcile
    pub upserted: u64,
    /// Nodes deleted by a reconcile
    pub deleted: u64,
    /// Events or records skipped with a diagnostic
    pub skipped: u64,
    /// Orphans still unresolved at the end of the invocation
    pub orphans_remaining: u64,
    /// Orphans abandoned because of a parent cycle
    pub cycles_detected: u64,
    pub duration_ms: u64,
}

/// Top-level sync state machine
///
/// All collaborators are injected; the coordinator holds no globals and can
/// be constructed once and invoked repeatedly on a schedule.
pub struct SyncCoordinator {
    tree: Arc<dyn ITreeClient>,
    store: Arc<dyn IRecordStore>,
    normalizer: Arc<NodeNormalizer>,
    root_name: String,
    workers: usize,
}

impl SyncCoordinator {
    pub fn new(
        tree: Arc<dyn ITreeClient>,
        store: Arc<dyn IRecordStore>,
        normalizer: NodeNormalizer,
        root_name: impl Into<String>,
        workers: usize,
    ) -> Self {
        Self {
            tree,
            store,
            normalizer: Arc::new(normalizer),
            root_name: root_name.into(),
            workers,
        }
    }

    /// Runs one sync invocation to its terminal condition
    pub async fn run(&self) -> Result<SyncReport> {
        let run_id = RunId::new();
        let started = Instant::now();

        let state = self
            .store
            .load_state()
            .await
            .context("Failed to load sync checkpoint")?;

        if state.needs_rebuild() {
            info!(
                %run_id,
                phase = state.phase.as_str(),
                has_token = state.change_token.is_some(),
                "Mirror needs a full rebuild"
            );
            return self.rebuild(run_id, started).await;
        }

        match self.reconcile(run_id, started).await {
            Err(e) if is_stale_token(&e) => {
                warn!(%run_id, "Continuation token expired, falling back to full rebuild");
                self.rebuild(run_id, started).await
            }
            other => other,
        }
    }

    /// Full rebuild: drop, re-walk, re-anchor
    async fn rebuild(&self, run_id: RunId, started: Instant) -> Result<SyncReport> {
        let mut state = self.store.load_state().await?;
        state.begin_rebuild();
        self.store
            .save_state(&state)
            .await
            .context("Failed to mark rebuild in progress")?;

        self.store
            .drop_all()
            .await
            .context("Failed to drop mirror contents")?;

        // Root lookup failures (NotFound / Ambiguous) are fatal for the
        // invocation and surface to the operator unchanged
        let raw_root = self
            .tree
            .root_by_name(&self.root_name)
            .await
            .context("Mirror root lookup failed")?;

        let root = match self.normalizer.normalize(&raw_root) {
            Ok(Normalized::Tracked(node)) => node.with_path(NodePath::root()),
            Ok(Normalized::Skipped(reason)) => {
                anyhow::bail!("Mirror root '{}' is not trackable: {reason:?}", self.root_name)
            }
            Err(e) => return Err(e).context("Mirror root record is malformed"),
        };
        anyhow::ensure!(
            root.is_folder(),
            "Mirror root '{}' is not a folder",
            self.root_name
        );

        self.store
            .upsert(&root)
            .await
            .context("Failed to persist mirror root")?;

        let walker = TreeWalker::new(
            self.tree.clone(),
            self.store.clone(),
            self.normalizer.clone(),
            self.workers,
        );
        // On walk failure the checkpoint stays in the rebuilding phase, so
        // the next invocation rebuilds again instead of trusting a partial
        // mirror
        let summary = walker.walk(root.clone()).await?;

        // The token is captured after the walk completes; anything that
        // changed during the walk replays through the first reconcile
        let token = self
            .tree
            .current_token()
            .await
            .context("Failed to capture post-rebuild token")?;

        let mut state = self.store.load_state().await?;
        state.mark_clean(token, root.id().clone());
        self.store
            .save_state(&state)
            .await
            .context("Failed to persist clean checkpoint after rebuild")?;

        let report = SyncReport {
            run_id,
            mode: SyncMode::Rebuild,
            nodes_written: summary.nodes_written + 1,
            upserted: 0,
            deleted: 0,
            skipped: summary.skipped,
            orphans_remaining: 0,
            cycles_detected: 0,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            %run_id,
            nodes = report.nodes_written,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "Rebuild complete, mirror clean"
        );

        Ok(report)
    }

    /// Incremental pass: apply the feed, then resolve orphans
    async fn reconcile(&self, run_id: RunId, started: Instant) -> Result<SyncReport> {
        let mut state = self.store.load_state().await?;
        let token = state
            .change_token
            .clone()
            .context("Reconcile entered without a continuation token")?;
        let root_id = state
            .root_id
            .clone()
            .context("Reconcile entered without a mirror root")?;

        state.begin_reconcile();
        self.store
            .save_state(&state)
            .await
            .context("Failed to mark reconcile in progress")?;

        let reconciler = ChangeReconciler::new(
            self.tree.clone(),
            self.store.clone(),
            self.normalizer.clone(),
        );
        let outcome = reconciler.apply_changes(&token).await?;

        // Fresh resolver per pass: its memo cache must not survive into a
        // run that may have renamed ancestors
        let mut resolver = PathResolver::new(self.store.clone(), root_id.clone());
        let resolution = resolver.resolve_pending().await?;

        let mut state = self.store.load_state().await?;
        state.mark_clean(outcome.new_token.clone(), root_id);
        self.store
            .save_state(&state)
            .await
            .context("Failed to persist clean checkpoint after reconcile")?;

        let report = SyncReport {
            run_id,
            mode: SyncMode::Reconcile,
            nodes_written: 0,
            upserted: outcome.upserted,
            deleted: outcome.deleted + outcome.ghost_removals,
            skipped: outcome.skipped,
            orphans_remaining: resolution.missing,
            cycles_detected: resolution.cycles,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        info!(
            %run_id,
            pages = outcome.pages,
            upserted = report.upserted,
            deleted = report.deleted,
            skipped = report.skipped,
            orphans = report.orphans_remaining,
            duration_ms = report.duration_ms,
            "Reconcile complete, mirror clean"
        );

        Ok(report)
    }
}
