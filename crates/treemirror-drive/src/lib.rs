//! TreeMirror Drive - Google Drive API tree client
//!
//! Driven adapter implementing the `ITreeClient` port from `treemirror-core`
//! against the Google Drive v3 REST API:
//! - paginated child listings (`files.list` with an `in parents` query)
//! - the change feed (`changes.list` / `changes.getStartPageToken`)
//! - mirror-root lookup by folder name
//!
//! ## Modules
//!
//! - [`client`] - Authenticated HTTP client with bounded retry
//! - [`files`] - `files.list` queries and wire DTOs
//! - [`changes`] - Change feed queries and wire DTOs
//! - [`provider`] - The [`DriveTreeClient`](provider::DriveTreeClient) port
//!   implementation

pub mod changes;
pub mod client;
pub mod files;
pub mod provider;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors produced by the Drive adapter
///
/// `Transport` covers failures below HTTP (connect, timeout, TLS) after
/// retries are exhausted; `Api` covers non-success statuses the adapter
/// does not retry. Root-lookup cardinality failures get their own variants
/// because the coordinator surfaces them verbatim to the operator.
#[derive(Debug, Error)]
pub enum DriveError {
    /// The HTTP request could not be completed
    #[error("Transport failure during {operation}: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// The API answered with a non-success status
    #[error("API error during {operation}: HTTP {status}")]
    Api {
        operation: &'static str,
        status: StatusCode,
    },

    /// The response body could not be decoded
    #[error("Failed to decode {operation} response: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Zero non-trashed folders match the configured root name
    #[error("Root folder '{0}' not found")]
    RootNotFound(String),

    /// More than one non-trashed folder matches the configured root name
    #[error("Root folder '{0}' is ambiguous: {1} matches")]
    RootAmbiguous(String, usize),
}
