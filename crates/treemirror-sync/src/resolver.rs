//! Lazy path resolution for orphaned nodes
//!
//! A node written by the reconciler has no materialized path; its ancestry
//! may not even be in the store yet. The [`PathResolver`] computes paths on
//! demand by climbing first-parent links with an explicit stack, memoizing
//! along the way and persisting every path it derives so future lookups are
//! O(1).
//!
//! The memo cache lives only as long as the resolver instance; the
//! coordinator constructs a fresh resolver per reconciliation pass, which
//! is what keeps the cache from serving paths invalidated by renames in a
//! later pass.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use treemirror_core::domain::newtypes::{NodeId, NodePath};
use treemirror_core::domain::node::Node;
use treemirror_core::ports::IRecordStore;

/// Outcome of resolving one node's path
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The node's path, also persisted to the store
    Resolved(NodePath),
    /// The named ancestor is not in the store yet; retry on a later pass
    MissingAncestor(NodeId),
    /// The named ancestor closes a parent cycle; the node is left
    /// unresolved and the condition logged as a data-integrity warning
    Cycle(NodeId),
}

/// Counts reported by a batch resolution pass
#[derive(Debug, Clone, Default)]
pub struct ResolveSummary {
    /// Orphans that received a path this pass
    pub resolved: u64,
    /// Orphans still waiting on a missing ancestor
    pub missing: u64,
    /// Orphans abandoned because their ancestry closes a cycle
    pub cycles: u64,
}

/// Computes and persists materialized paths over the record store
///
/// Construct one per reconciliation pass; see the module docs for why the
/// memo cache must not outlive the pass.
pub struct PathResolver {
    store: Arc<dyn IRecordStore>,
    root_id: NodeId,
    /// node id -> the prefix that node's children inherit
    /// (the node's own path extended by its name)
    memo: HashMap<NodeId, NodePath>,
}

impl PathResolver {
    pub fn new(store: Arc<dyn IRecordStore>, root_id: NodeId) -> Self {
        Self {
            store,
            root_id,
            memo: HashMap::new(),
        }
    }

    /// Resolves one node's path, persisting it (and every ancestor path
    /// derived on the way) on success
    pub async fn resolve(&mut self, node: &Node) -> Result<Resolution> {
        // Base case: the mirror root carries the empty path
        if node.id() == &self.root_id {
            let path = NodePath::root();
            if !node.is_resolved() {
                self.store.set_path(node.id(), &path).await?;
            }
            self.memo
                .insert(node.id().clone(), path.child(node.name()));
            return Ok(Resolution::Resolved(path));
        }

        // Climb the parent chain until an ancestor with a known path (or
        // the root) is found, collecting the unresolved nodes passed over.
        // The chain is an explicit stack; remote trees are acyclic by
        // construction, but the mirror is built incrementally and must not
        // assume that.
        let mut pending: Vec<Node> = vec![node.clone()];
        let mut on_stack: HashSet<NodeId> = HashSet::new();
        on_stack.insert(node.id().clone());

        let base_prefix = loop {
            let parent_id = {
                let tip = &pending[pending.len() - 1];
                match tip.first_parent() {
                    Some(parent_id) => parent_id.clone(),
                    None => {
                        debug!(node = %tip.id(), "Orphan has no parent reference");
                        return Ok(Resolution::MissingAncestor(tip.id().clone()));
                    }
                }
            };

            if on_stack.contains(&parent_id) {
                warn!(
                    node = %node.id(),
                    closes_at = %parent_id,
                    "Parent cycle detected during path resolution"
                );
                return Ok(Resolution::Cycle(parent_id));
            }

            if let Some(prefix) = self.memo.get(&parent_id) {
                break prefix.clone();
            }

            let parent = match self.store.find_by_id(&parent_id).await? {
                Some(parent) => parent,
                None => {
                    debug!(node = %node.id(), missing = %parent_id, "Ancestor not yet mirrored");
                    return Ok(Resolution::MissingAncestor(parent_id));
                }
            };

            if let Some(parent_path) = parent.path() {
                let prefix = parent_path.child(parent.name());
                self.memo.insert(parent_id, prefix.clone());
                break prefix;
            }

            on_stack.insert(parent_id);
            pending.push(parent);
        };

        // Unwind: assign paths from the highest unresolved ancestor down,
        // persisting each so the work is never repeated
        let mut prefix = base_prefix;
        let mut node_path = NodePath::root();
        for entry in pending.iter().rev() {
            self.store.set_path(entry.id(), &prefix).await?;
            node_path = prefix.clone();
            let child_prefix = prefix.child(entry.name());
            self.memo.insert(entry.id().clone(), child_prefix.clone());
            prefix = child_prefix;
        }

        Ok(Resolution::Resolved(node_path))
    }

    /// Resolves every orphan currently in the store
    ///
    /// Orphans whose ancestors are still missing stay orphaned and are
    /// retried on the next sync cycle; that is a steady-state condition,
    /// not an error.
    pub async fn resolve_pending(&mut self) -> Result<ResolveSummary> {
        let orphans = self.store.find_unresolved().await?;
        let total = orphans.len();
        let mut summary = ResolveSummary::default();

        for orphan in orphans {
            // Already resolved earlier this pass as someone's ancestor
            if self.memo.contains_key(orphan.id()) {
                summary.resolved += 1;
                continue;
            }

            match self.resolve(&orphan).await? {
                Resolution::Resolved(_) => summary.resolved += 1,
                Resolution::MissingAncestor(_) => summary.missing += 1,
                Resolution::Cycle(_) => summary.cycles += 1,
            }
        }

        info!(
            orphans = total,
            resolved = summary.resolved,
            missing = summary.missing,
            cycles = summary.cycles,
            "Path resolution pass complete"
        );

        Ok(summary)
    }
}
