//! Node normalization
//!
//! Maps a [`RawNode`] wire record into the domain [`Node`] shape: derives
//! the kind from the MIME type, validates the fields the mirror cannot do
//! without, filters out untracked kinds, and discards everything else the
//! remote sends along. The walker and the reconciler both go through this
//! single mapping so a node looks identical regardless of which path wrote
//! it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::NodeId;
use crate::domain::node::{Node, NodeKind};
use crate::ports::tree_client::RawNode;

/// MIME type the remote tree uses to mark folders
pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

/// A raw record that cannot be normalized
///
/// These are skip-with-diagnostic conditions for the reconciler (the feed
/// is allowed to be transiently inconsistent) and hard errors only for the
/// root lookup.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// A field the mirror requires is missing or empty
    #[error("Record is missing required field '{0}'")]
    MissingField(&'static str),
}

/// Why a well-formed record was deliberately not tracked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// The remote tree has trashed the node
    Trashed,
    /// The node's MIME type is on the configured ignore list
    UntrackedKind(String),
}

/// Outcome of normalizing one raw record
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized {
    /// The record maps to a tracked node (path still unresolved)
    Tracked(Node),
    /// The record is well-formed but not mirrored
    Skipped(SkipReason),
}

/// Maps raw remote records into domain nodes
///
/// Holds the tracked-kind policy; construct once from configuration and
/// share by reference.
#[derive(Debug, Clone, Default)]
pub struct NodeNormalizer {
    ignored_mime_types: Vec<String>,
}

impl NodeNormalizer {
    /// Creates a normalizer that tracks every kind
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a normalizer skipping the given MIME types
    #[must_use]
    pub fn with_ignored_mime_types(ignored_mime_types: Vec<String>) -> Self {
        Self { ignored_mime_types }
    }

    /// Normalizes one raw record
    ///
    /// Returns `Err` only for malformed records (missing id or name);
    /// trashed and untracked records come back as `Normalized::Skipped`.
    pub fn normalize(&self, raw: &RawNode) -> Result<Normalized, NormalizeError> {
        if raw.id.is_empty() {
            return Err(NormalizeError::MissingField("id"));
        }
        if raw.name.is_empty() {
            return Err(NormalizeError::MissingField("name"));
        }

        if raw.trashed {
            return Ok(Normalized::Skipped(SkipReason::Trashed));
        }

        if let Some(mime) = &raw.mime_type {
            if self.ignored_mime_types.iter().any(|m| m == mime) {
                return Ok(Normalized::Skipped(SkipReason::UntrackedKind(
                    mime.clone(),
                )));
            }
        }

        let kind = match raw.mime_type.as_deref() {
            Some(FOLDER_MIME_TYPE) => NodeKind::Folder,
            _ => NodeKind::File,
        };

        // Parent entries the remote left empty are dropped rather than
        // failing the record; a node with no usable parent is still stored
        // and surfaces later as an orphan.
        let parent_ids = raw
            .parent_ids
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| NodeId::new(p.clone()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| NormalizeError::MissingField("parent_ids"))?;

        let id = NodeId::new(raw.id.clone()).map_err(|_| NormalizeError::MissingField("id"))?;

        Ok(Normalized::Tracked(Node::new(
            id,
            raw.name.clone(),
            kind,
            parent_ids,
            raw.mime_type.clone(),
            raw.checksum.clone(),
            raw.size,
            raw.owned_by_caller,
        )))
    }
}
