//! Domain error types
//!
//! Validation failures raised when constructing domain values from
//! untrusted input (remote records, database rows, configuration).

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid remote node identifier
    #[error("Invalid node id: {0}")]
    InvalidNodeId(String),

    /// Invalid change-feed continuation token
    #[error("Invalid change token: {0}")]
    InvalidChangeToken(String),

    /// Invalid pagination cursor
    #[error("Invalid page cursor: {0}")]
    InvalidPageCursor(String),

    /// Invalid path segment (ancestor name)
    #[error("Invalid path segment: {0}")]
    InvalidPathSegment(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}
