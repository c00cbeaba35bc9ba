//! Drive `files.list` queries
//!
//! Child listings and root lookup are both `files.list` calls distinguished
//! only by their `q` filter. The field projection is kept to exactly what
//! the mirror tracks; everything else never leaves the wire.
//!
//! See: <https://developers.google.com/drive/api/reference/rest/v3/files/list>

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::client::DriveClient;
use crate::DriveError;

/// Field projection for a single file resource
const FILE_FIELDS: &str = "id,name,mimeType,md5Checksum,size,ownedByMe,parents,trashed";

/// Full projection for a `files.list` response page
const LIST_FIELDS: &str =
    "files(id,name,mimeType,md5Checksum,size,ownedByMe,parents,trashed),nextPageToken";

// ============================================================================
// Drive API response types (JSON deserialization)
// ============================================================================

/// One page of a `files.list` response
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    /// Files on this page
    #[serde(default)]
    pub files: Vec<DriveFile>,

    /// Cursor for the next page (absent on the last page)
    pub next_page_token: Option<String>,
}

/// A file resource as the Drive API delivers it
///
/// Fields use camelCase to match the JSON format. `size` arrives as a
/// decimal string (the API serializes int64 as string); see [`de_size`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    /// Unique identifier of the file within the drive
    #[serde(default)]
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// MIME type; folders carry `application/vnd.google-apps.folder`
    pub mime_type: Option<String>,

    /// MD5 checksum of the content (absent for folders)
    pub md5_checksum: Option<String>,

    /// Size in bytes (absent for folders)
    #[serde(default, deserialize_with = "de_size")]
    pub size: Option<u64>,

    /// Whether the authenticated account owns this file
    #[serde(default)]
    pub owned_by_me: bool,

    /// Parent folder ids; effectively a single entry since the 2020 API
    /// change, but still delivered as an array
    #[serde(default)]
    pub parents: Vec<String>,

    /// Whether the file has been trashed
    #[serde(default)]
    pub trashed: bool,
}

/// Deserializes the `size` field, which the API encodes as a string
fn de_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SizeField {
        Number(u64),
        Text(String),
    }

    Ok(match Option::<SizeField>::deserialize(deserializer)? {
        None => None,
        Some(SizeField::Number(n)) => Some(n),
        Some(SizeField::Text(s)) => s.parse().ok(),
    })
}

// ============================================================================
// Query functions
// ============================================================================

/// Escapes a value for embedding in a `q` filter string
///
/// Drive query strings delimit values with single quotes; embedded quotes
/// are backslash-escaped.
fn escape_query_value(value: &str) -> String {
    value.replace('\'', "\\'")
}

/// Fetches one page of a folder's children
///
/// Trashed children are filtered server-side; the caller drains the listing
/// by passing `next_page_token` back in until it is absent.
pub async fn list_children_page(
    client: &DriveClient,
    parent_id: &str,
    page_token: Option<&str>,
) -> Result<FileList, DriveError> {
    let q = format!(
        "'{}' in parents and trashed = false",
        escape_query_value(parent_id)
    );

    let mut query: Vec<(&str, String)> = vec![
        ("q", q),
        ("pageSize", client.page_size().to_string()),
        ("fields", LIST_FIELDS.to_string()),
    ];
    if let Some(token) = page_token {
        query.push(("pageToken", token.to_string()));
    }

    let page: FileList = client.get_json("/files", &query, "files.list").await?;

    debug!(
        parent_id,
        delivered = page.files.len(),
        has_next = page.next_page_token.is_some(),
        "Drive delivered child page"
    );

    Ok(page)
}

/// Finds all non-trashed folders with the given display name
///
/// Used for mirror-root lookup; the caller decides what zero or multiple
/// matches mean.
pub async fn find_folders_by_name(
    client: &DriveClient,
    name: &str,
) -> Result<Vec<DriveFile>, DriveError> {
    let q = format!(
        "name = '{}' and mimeType = 'application/vnd.google-apps.folder' and trashed = false",
        escape_query_value(name)
    );

    let query: Vec<(&str, String)> = vec![("q", q), ("fields", LIST_FIELDS.to_string())];

    let page: FileList = client.get_json("/files", &query, "files.list").await?;

    Ok(page.files)
}

/// Field projection shared with the change feed (`file(...)` sub-selection)
pub(crate) fn file_fields() -> &'static str {
    FILE_FIELDS
}

// ============================================================================
// Tests
// ============================================================================
