//! Tree client port (driven/secondary port)
//!
//! Interface to the remote hierarchical tree. The primary implementation
//! targets a Google-Drive-style REST API in `treemirror-drive`, but the
//! trait only exposes what the mirroring algorithms consume: paginated
//! child listings, the change feed, the "now" token, and root lookup.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification; the one
//!   exception is [`StaleTokenError`], which the coordinator must recognize
//!   to fall back to a full rebuild.
//! - `RawNode` and `ChangeEvent` are port-level DTOs, not domain entities;
//!   the [`NodeNormalizer`](crate::normalize::NodeNormalizer) maps them to
//!   [`Node`](crate::domain::Node).
//! - Implementations own bounded retry for transient transport failures;
//!   an error escaping these methods means retries are exhausted.

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{ChangeToken, NodeId, PageCursor};

// ============================================================================
// Port-level DTOs
// ============================================================================

/// A raw record from the remote tree, prior to normalization
///
/// Field names and optionality mirror what remote APIs actually deliver:
/// almost everything can be absent, and the normalizer decides what is
/// usable. `trashed` records surface here so change handling can treat
/// them as removals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNode {
    /// Remote identifier; empty means the record is malformed
    pub id: String,
    /// Display name; empty means the record is malformed
    pub name: String,
    /// MIME type, used for kind derivation and tracked-kind filtering
    pub mime_type: Option<String>,
    /// Ordered ancestor ids; the first entry is the authoritative parent
    pub parent_ids: Vec<String>,
    /// Content checksum, absent for folders
    pub checksum: Option<String>,
    /// Size in bytes, absent for folders
    pub size: Option<u64>,
    /// Whether the remote account making the calls owns this node
    pub owned_by_caller: bool,
    /// Whether the remote tree has trashed this node
    pub trashed: bool,
}

/// A single entry of the remote change feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Id of the node the event concerns
    pub node_id: String,
    /// True when the node was removed outright; `node` is absent then
    pub removed: bool,
    /// The node's current record, when the event is not a removal
    pub node: Option<RawNode>,
}

/// One page of a child listing
#[derive(Debug, Clone)]
pub struct ChildPage {
    /// Children delivered on this page
    pub nodes: Vec<RawNode>,
    /// Cursor for the next page; `None` on the last page
    pub next_cursor: Option<PageCursor>,
}

/// One page of the change feed
#[derive(Debug, Clone)]
pub struct ChangePage {
    /// Change events in feed order
    pub changes: Vec<ChangeEvent>,
    /// Token resuming the feed at the next page; `None` on the last page
    pub next_cursor: Option<ChangeToken>,
    /// Fresh start token for the following sync cycle; present only on the
    /// last page
    pub new_start_token: Option<ChangeToken>,
}

// ============================================================================
// Stale token marker
// ============================================================================

/// Marker error embedded in the `anyhow` chain when the remote reports that
/// a continuation token has expired and the feed cannot be resumed
///
/// The coordinator checks for this with [`is_stale_token`] and falls back
/// to a full rebuild instead of failing the invocation.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("change token is no longer valid; a full rebuild is required")]
pub struct StaleTokenError;

/// True when `err`'s cause chain contains a [`StaleTokenError`]
pub fn is_stale_token(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<StaleTokenError>().is_some())
}

// ============================================================================
// ITreeClient trait
// ============================================================================

/// Port trait for remote tree operations
///
/// All listing operations are filtered by the implementation to non-trashed
/// records where the underlying API supports it; the change feed is the
/// exception, since removals and trashed payloads are exactly what it must
/// deliver.
#[async_trait::async_trait]
pub trait ITreeClient: Send + Sync {
    /// Lists one page of a node's children
    ///
    /// Callers drain the listing by passing the returned cursor back in
    /// until it is `None`. A childless parent yields one page with zero
    /// nodes and no cursor.
    async fn list_children(
        &self,
        parent_id: &NodeId,
        cursor: Option<&PageCursor>,
    ) -> anyhow::Result<ChildPage>;

    /// Lists one page of the change feed starting at `cursor`
    ///
    /// The cursor is either the persisted continuation token or the
    /// `next_cursor` of the previous page; the two share one token space.
    /// Fails with [`StaleTokenError`] in the chain when the remote no
    /// longer accepts the token.
    async fn list_changes(&self, cursor: &ChangeToken) -> anyhow::Result<ChangePage>;

    /// Snapshot token representing "now" in the change feed
    ///
    /// Used to seed a fresh mirror and to re-anchor after a rebuild.
    async fn current_token(&self) -> anyhow::Result<ChangeToken>;

    /// Looks up the mirror root folder by display name
    ///
    /// Fails when zero or more than one non-trashed folder matches; both
    /// cases indicate remote-tree misconfiguration and are fatal for the
    /// invocation.
    async fn root_by_name(&self, name: &str) -> anyhow::Result<RawNode>;
}
