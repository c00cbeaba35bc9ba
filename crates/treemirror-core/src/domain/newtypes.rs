//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for remote identifiers, feed tokens, and
//! materialized paths. Each newtype ensures data validity at construction
//! time; the remote tree's identifiers are opaque strings, so validation
//! amounts to rejecting the empty string.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// NodeId
// ============================================================================

/// Identifier assigned by the remote tree to a file or folder
///
/// Stable, unique, and immutable for the node's lifetime. All record store
/// upserts and deletes key on this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a NodeId, rejecting the empty string
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::InvalidNodeId(
                "node id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for NodeId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// ============================================================================
// ChangeToken
// ============================================================================

/// Opaque cursor marking a position in the remote change feed
///
/// At most one value is persisted at a time; it is overwritten only after
/// the change pages it covers have been applied to the record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeToken(String);

impl ChangeToken {
    /// Create a ChangeToken, rejecting the empty string
    pub fn new(token: impl Into<String>) -> Result<Self, DomainError> {
        let token = token.into();
        if token.is_empty() {
            return Err(DomainError::InvalidChangeToken(
                "change token must not be empty".to_string(),
            ));
        }
        Ok(Self(token))
    }

    /// Get the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ChangeToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ChangeToken {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

// ============================================================================
// PageCursor
// ============================================================================

/// Opaque continuation cursor within a single paginated listing
///
/// Unlike [`ChangeToken`], a cursor is never persisted; it only lives for
/// the duration of one drain loop over a child listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(String);

impl PageCursor {
    /// Create a PageCursor, rejecting the empty string
    pub fn new(cursor: impl Into<String>) -> Result<Self, DomainError> {
        let cursor = cursor.into();
        if cursor.is_empty() {
            return Err(DomainError::InvalidPageCursor(
                "page cursor must not be empty".to_string(),
            ));
        }
        Ok(Self(cursor))
    }

    /// Get the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PageCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RunId
// ============================================================================

/// Identifier for a single coordinator invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Create a new random RunId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RunId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RunId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid RunId: {e}")))
    }
}

// ============================================================================
// NodePath
// ============================================================================

/// Materialized ancestry of a node: the ordered names of its ancestors
/// from the mirror root down to (and including) its parent
///
/// The node's own name is not part of its path, so the path of a child is
/// always `parent.path + [parent.name]`. The mirror root has the empty path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<String>);

impl NodePath {
    /// The empty path assigned to the mirror root
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Build a path from ancestor name segments
    pub fn new(segments: Vec<String>) -> Result<Self, DomainError> {
        for segment in &segments {
            if segment.is_empty() {
                return Err(DomainError::InvalidPathSegment(
                    "path segment must not be empty".to_string(),
                ));
            }
        }
        Ok(Self(segments))
    }

    /// The ancestor name segments, root first
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// True for the mirror root's (empty) path
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of ancestor segments
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// The path a child of a node with this path receives: this path
    /// extended by the node's own name
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    /// True if `other` is this path extended by zero or more segments
    #[must_use]
    pub fn is_prefix_of(&self, other: &NodePath) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

impl Display for NodePath {
    /// Renders as a slash-joined absolute path, `/` for the root
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            write!(f, "/")
        } else {
            write!(f, "/{}", self.0.join("/"))
        }
    }
}

impl From<Vec<String>> for NodePath {
    fn from(segments: Vec<String>) -> Self {
        Self(segments)
    }
}

// ============================================================================
// Tests
// ============================================================================
