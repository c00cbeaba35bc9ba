//! The mirrored node entity
//!
//! A [`Node`] is one file or folder of the remote tree as the mirror tracks
//! it. Nodes are created by the normalizer during a full walk or change
//! application, mutated by later change events (rename, move, field updates)
//! or by the path resolver (path assignment only), and deleted when a change
//! event reports removal or a rebuild drops the collection. Removal is a
//! hard delete; the mirror never stores tombstones.

use serde::{Deserialize, Serialize};

use super::newtypes::{NodeId, NodePath};

/// Whether a node is a file or a folder
///
/// Folders may have children; files may not. The kind is derived from the
/// remote MIME type at normalization time and never changes afterwards
/// (the remote tree does not convert between the two).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Folder,
}

impl NodeKind {
    /// Stable lowercase name, used for storage and display
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Folder => "folder",
        }
    }
}

/// A mirrored file or folder record
///
/// Field semantics:
/// - `parent_ids` is the ordered ancestor list as reported by the remote
///   tree; the first entry is the authoritative parent (remote trees may
///   nominally allow multiple parents).
/// - `path` is the materialized ancestry ([`NodePath`]); `None` means the
///   node is an orphan awaiting resolution.
/// - `checksum`, `size`, `mime_type`, and `owned_by_caller` are descriptive
///   fields carried through unchanged; the mirroring algorithms never
///   interpret them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    id: NodeId,
    name: String,
    kind: NodeKind,
    parent_ids: Vec<NodeId>,
    mime_type: Option<String>,
    checksum: Option<String>,
    size: Option<u64>,
    owned_by_caller: bool,
    path: Option<NodePath>,
}

impl Node {
    /// Creates a node with an unresolved path
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: NodeId,
        name: impl Into<String>,
        kind: NodeKind,
        parent_ids: Vec<NodeId>,
        mime_type: Option<String>,
        checksum: Option<String>,
        size: Option<u64>,
        owned_by_caller: bool,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            parent_ids,
            mime_type,
            checksum,
            size,
            owned_by_caller,
            path: None,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_folder(&self) -> bool {
        self.kind == NodeKind::Folder
    }

    pub fn parent_ids(&self) -> &[NodeId] {
        &self.parent_ids
    }

    /// The authoritative parent: the first entry of `parent_ids`
    pub fn first_parent(&self) -> Option<&NodeId> {
        self.parent_ids.first()
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn checksum(&self) -> Option<&str> {
        self.checksum.as_deref()
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn owned_by_caller(&self) -> bool {
        self.owned_by_caller
    }

    pub fn path(&self) -> Option<&NodePath> {
        self.path.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.path.is_some()
    }

    /// Assigns the materialized path
    pub fn set_path(&mut self, path: NodePath) {
        self.path = Some(path);
    }

    /// Drops the materialized path, returning the node to orphan state
    pub fn clear_path(&mut self) {
        self.path = None;
    }

    /// Builder-style path assignment, used where a node is constructed and
    /// placed in one expression (the walker, test fixtures)
    #[must_use]
    pub fn with_path(mut self, path: NodePath) -> Self {
        self.path = Some(path);
        self
    }
}
