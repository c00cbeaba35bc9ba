//! Record store port (driven/secondary port)
//!
//! Interface for persisting and querying the mirrored node collection and
//! the sync checkpoint. Implemented on SQLite in `treemirror-store`.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific.
//! - Every operation is per-document except `drop_all` (rebuild only) and
//!   the two scan/bulk helpers; no multi-document transaction is assumed or
//!   required, because each node's consistency depends only on itself and
//!   its immediate parent.
//! - `delete` reports whether a row existed so the reconciler can count
//!   removals of never-seen nodes separately; deleting an absent id is a
//!   no-op, not an error.

use crate::domain::newtypes::{NodeId, NodePath};
use crate::domain::node::Node;
use crate::domain::state::MirrorState;

/// Port trait for the mirror's document store
#[async_trait::async_trait]
pub trait IRecordStore: Send + Sync {
    /// Inserts or fully replaces a node, keyed on its id
    async fn upsert(&self, node: &Node) -> anyhow::Result<()>;

    /// Upserts a batch of nodes; used by the walker to persist one folder's
    /// children in a single round trip
    async fn upsert_batch(&self, nodes: &[Node]) -> anyhow::Result<()>;

    /// Deletes a node by id; returns false when no such node was stored
    async fn delete(&self, id: &NodeId) -> anyhow::Result<bool>;

    /// Looks up a node by id
    async fn find_by_id(&self, id: &NodeId) -> anyhow::Result<Option<Node>>;

    /// All nodes whose path is unresolved, in unspecified order
    async fn find_unresolved(&self) -> anyhow::Result<Vec<Node>>;

    /// Writes a resolved path for one node, leaving other fields untouched
    async fn set_path(&self, id: &NodeId, path: &NodePath) -> anyhow::Result<()>;

    /// Clears the path of every descendant of `id` (children, their
    /// children, and so on), following first-parent links; returns how many
    /// nodes were invalidated
    ///
    /// Used when a folder is renamed or moved so the resolver recomputes
    /// descendant ancestry on the next pass.
    async fn clear_paths_beneath(&self, id: &NodeId) -> anyhow::Result<u64>;

    /// Number of stored nodes
    async fn count_nodes(&self) -> anyhow::Result<u64>;

    /// Drops every stored node; the checkpoint row survives
    async fn drop_all(&self) -> anyhow::Result<()>;

    /// Loads the sync checkpoint, or [`MirrorState::initial`] when none has
    /// been persisted yet
    async fn load_state(&self) -> anyhow::Result<MirrorState>;

    /// Persists the sync checkpoint (single row, overwritten in place)
    async fn save_state(&self, state: &MirrorState) -> anyhow::Result<()>;
}
