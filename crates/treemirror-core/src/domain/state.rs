//! Persisted mirror state
//!
//! A single [`MirrorState`] row records whether the mirror is consistent
//! ("clean") or mid-operation ("dirty"), the change-feed continuation token,
//! and the id of the mirror root. The coordinator reads it on startup to
//! decide between a full rebuild and an incremental reconcile, and is the
//! only writer of the `phase` field; the reconciler advances `change_token`
//! page-by-page as it applies the feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{ChangeToken, NodeId};

/// Coordinator state machine phase
///
/// `Rebuilding` and `Reconciling` are the dirty states: finding either at
/// startup means a prior run did not reach its terminal condition. A
/// half-finished rebuild leaves a partial mirror and forces a fresh rebuild;
/// a half-finished reconcile is resumed, since change application is
/// idempotent and the token never runs ahead of applied pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Clean,
    Rebuilding,
    Reconciling,
}

impl SyncPhase {
    /// Stable lowercase name, used for storage and display
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Clean => "clean",
            SyncPhase::Rebuilding => "rebuilding",
            SyncPhase::Reconciling => "reconciling",
        }
    }
}

/// The persisted sync checkpoint: phase, continuation token, mirror root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorState {
    pub phase: SyncPhase,
    pub change_token: Option<ChangeToken>,
    pub root_id: Option<NodeId>,
    pub updated_at: DateTime<Utc>,
}

impl MirrorState {
    /// State of a mirror that has never been built: clean phase, no token,
    /// no root. The missing token is what triggers the first rebuild.
    #[must_use]
    pub fn initial() -> Self {
        Self {
            phase: SyncPhase::Clean,
            change_token: None,
            root_id: None,
            updated_at: Utc::now(),
        }
    }

    /// True when the coordinator must run a full rebuild instead of an
    /// incremental reconcile: no token or root yet, or a rebuild was
    /// interrupted mid-flight.
    #[must_use]
    pub fn needs_rebuild(&self) -> bool {
        self.change_token.is_none()
            || self.root_id.is_none()
            || self.phase == SyncPhase::Rebuilding
    }

    /// Transition into the dirty rebuild phase
    pub fn begin_rebuild(&mut self) {
        self.phase = SyncPhase::Rebuilding;
        self.updated_at = Utc::now();
    }

    /// Transition into the dirty reconcile phase
    pub fn begin_reconcile(&mut self) {
        self.phase = SyncPhase::Reconciling;
        self.updated_at = Utc::now();
    }

    /// Record a new continuation token without changing phase
    pub fn advance_token(&mut self, token: ChangeToken) {
        self.change_token = Some(token);
        self.updated_at = Utc::now();
    }

    /// Terminal transition: token and root persisted, mirror consistent
    pub fn mark_clean(&mut self, token: ChangeToken, root_id: NodeId) {
        self.phase = SyncPhase::Clean;
        self.change_token = Some(token);
        self.root_id = Some(root_id);
        self.updated_at = Utc::now();
    }
}
