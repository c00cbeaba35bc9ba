//! ITreeClient implementation over the Drive API
//!
//! [`DriveTreeClient`] adapts the wire-level modules ([`crate::files`],
//! [`crate::changes`]) to the `ITreeClient` port: wire DTOs become port
//! `RawNode`s, pagination fields become typed cursors, and the statuses
//! that mean "this change token is dead" become a [`StaleTokenError`] the
//! sync layer can recognize.

use anyhow::Context;
use reqwest::StatusCode;
use tracing::warn;

use treemirror_core::domain::newtypes::{ChangeToken, NodeId, PageCursor};
use treemirror_core::ports::tree_client::{
    ChangeEvent, ChangePage, ChildPage, ITreeClient, RawNode, StaleTokenError,
};

use crate::client::DriveClient;
use crate::files::DriveFile;
use crate::{changes, files, DriveError};

/// Port implementation of the remote tree over Google Drive
pub struct DriveTreeClient {
    client: DriveClient,
}

impl DriveTreeClient {
    /// Wraps an authenticated [`DriveClient`]
    pub fn new(client: DriveClient) -> Self {
        Self { client }
    }
}

/// Maps a wire file resource to the port DTO
fn raw_from_file(file: DriveFile) -> RawNode {
    RawNode {
        id: file.id,
        name: file.name,
        mime_type: file.mime_type,
        parent_ids: file.parents,
        checksum: file.md5_checksum,
        size: file.size,
        owned_by_caller: file.owned_by_me,
        trashed: file.trashed,
    }
}

/// Statuses Drive answers with when a change token has expired
fn is_stale_token_status(status: StatusCode) -> bool {
    status == StatusCode::NOT_FOUND || status == StatusCode::GONE
}

#[async_trait::async_trait]
impl ITreeClient for DriveTreeClient {
    async fn list_children(
        &self,
        parent_id: &NodeId,
        cursor: Option<&PageCursor>,
    ) -> anyhow::Result<ChildPage> {
        let page =
            files::list_children_page(&self.client, parent_id.as_str(), cursor.map(|c| c.as_str()))
                .await
                .with_context(|| format!("Failed to list children of {parent_id}"))?;

        let next_cursor = match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(token) => Some(PageCursor::new(token).context("Invalid child page cursor")?),
            None => None,
        };

        Ok(ChildPage {
            nodes: page.files.into_iter().map(raw_from_file).collect(),
            next_cursor,
        })
    }

    async fn list_changes(&self, cursor: &ChangeToken) -> anyhow::Result<ChangePage> {
        let page = match changes::list_changes_page(&self.client, cursor.as_str()).await {
            Ok(page) => page,
            Err(DriveError::Api { status, .. }) if is_stale_token_status(status) => {
                warn!(%status, "Change token rejected by the API");
                return Err(anyhow::Error::new(StaleTokenError))
                    .with_context(|| format!("Change token rejected with HTTP {status}"));
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to list changes from token {}", cursor.as_str())
                })
            }
        };

        let events = page
            .changes
            .into_iter()
            .map(|change| ChangeEvent {
                node_id: change.file_id,
                removed: change.removed,
                node: change.file.map(raw_from_file),
            })
            .collect();

        let next_cursor = match page.next_page_token.filter(|t| !t.is_empty()) {
            Some(token) => Some(ChangeToken::new(token).context("Invalid change page token")?),
            None => None,
        };

        let new_start_token = match page.new_start_page_token.filter(|t| !t.is_empty()) {
            Some(token) => Some(ChangeToken::new(token).context("Invalid new start token")?),
            None => None,
        };

        Ok(ChangePage {
            changes: events,
            next_cursor,
            new_start_token,
        })
    }

    async fn current_token(&self) -> anyhow::Result<ChangeToken> {
        let token = changes::start_page_token(&self.client)
            .await
            .context("Failed to fetch change feed start token")?;

        ChangeToken::new(token).context("API returned an unusable start token")
    }

    async fn root_by_name(&self, name: &str) -> anyhow::Result<RawNode> {
        let matches = files::find_folders_by_name(&self.client, name)
            .await
            .with_context(|| format!("Failed to look up root folder '{name}'"))?;

        if matches.len() > 1 {
            return Err(DriveError::RootAmbiguous(name.to_string(), matches.len()).into());
        }
        match matches.into_iter().next() {
            Some(file) => Ok(raw_from_file(file)),
            None => Err(DriveError::RootNotFound(name.to_string()).into()),
        }
    }
}
