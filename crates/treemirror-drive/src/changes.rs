//! Drive change feed queries
//!
//! Implements the incremental sync surface: `changes.getStartPageToken`
//! hands out an opaque token representing "now", and `changes.list` replays
//! everything that happened after the token it is given. Each page carries
//! either a `nextPageToken` (more pages follow; the tokens share one token
//! space with start tokens, so any of them is a valid resume point) or a
//! `newStartPageToken` anchoring the next sync cycle.
//!
//! See: <https://developers.google.com/drive/api/reference/rest/v3/changes/list>

use serde::Deserialize;
use tracing::debug;

use crate::client::DriveClient;
use crate::files::{file_fields, DriveFile};
use crate::DriveError;

// ============================================================================
// Drive API response types (JSON deserialization)
// ============================================================================

/// Response from `changes.getStartPageToken`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPageToken {
    /// Token representing the current head of the change feed
    pub start_page_token: String,
}

/// One page of a `changes.list` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeList {
    /// Change records in feed order
    #[serde(default)]
    pub changes: Vec<DriveChange>,

    /// Token resuming the feed at the next page (absent on the last page)
    pub next_page_token: Option<String>,

    /// Fresh start token for the next sync cycle (present only on the last
    /// page)
    pub new_start_page_token: Option<String>,
}

/// A single change record
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveChange {
    /// Id of the file the change concerns
    #[serde(default)]
    pub file_id: String,

    /// True when the file was removed outright; `file` is absent then
    #[serde(default)]
    pub removed: bool,

    /// The file's current state, when the change is not a removal
    pub file: Option<DriveFile>,
}

// ============================================================================
// Query functions
// ============================================================================

/// Fetches the token representing "now" in the change feed
pub async fn start_page_token(client: &DriveClient) -> Result<String, DriveError> {
    let response: StartPageToken = client
        .get_json("/changes/startPageToken", &[], "changes.getStartPageToken")
        .await?;

    debug!(token = %response.start_page_token, "Fetched change feed start token");

    Ok(response.start_page_token)
}

/// Fetches one page of changes after `page_token`
///
/// `includeRemoved` is on so deletions reach the mirror; trashed payloads
/// are delivered rather than filtered, for the same reason.
pub async fn list_changes_page(
    client: &DriveClient,
    page_token: &str,
) -> Result<ChangeList, DriveError> {
    let fields = format!(
        "changes(fileId,removed,file({})),nextPageToken,newStartPageToken",
        file_fields()
    );

    let query: Vec<(&str, String)> = vec![
        ("pageToken", page_token.to_string()),
        ("pageSize", client.page_size().to_string()),
        ("includeRemoved", "true".to_string()),
        ("fields", fields),
    ];

    let page: ChangeList = client.get_json("/changes", &query, "changes.list").await?;

    debug!(
        delivered = page.changes.len(),
        has_next = page.next_page_token.is_some(),
        has_new_start = page.new_start_page_token.is_some(),
        "Drive delivered change page"
    );

    Ok(page)
}

// ============================================================================
// Tests
// ============================================================================
