//! CLI subcommands and shared adapter wiring

pub mod rebuild;
pub mod status;
pub mod sync;

use std::sync::Arc;

use anyhow::{Context, Result};

use treemirror_core::config::Config;
use treemirror_core::normalize::NodeNormalizer;
use treemirror_drive::client::DriveClient;
use treemirror_drive::provider::DriveTreeClient;
use treemirror_store::{DatabasePool, SqliteRecordStore};
use treemirror_sync::SyncCoordinator;

/// Opens (creating if needed) the record store configured in `config`
pub(crate) async fn open_store(config: &Config) -> Result<Arc<SqliteRecordStore>> {
    let db_path = config.database_path();
    let pool = DatabasePool::new(&db_path)
        .await
        .context("Failed to open record store database")?;
    Ok(Arc::new(SqliteRecordStore::new(pool.pool().clone())))
}

/// Builds the Drive tree client from config and the token environment
///
/// Token acquisition and refresh are external to TreeMirror; the CLI only
/// reads a ready access token from the configured environment variable.
pub(crate) fn build_tree_client(config: &Config) -> Result<Arc<DriveTreeClient>> {
    let access_token = std::env::var(&config.api.access_token_env).with_context(|| {
        format!(
            "No access token found; export one via {}",
            config.api.access_token_env
        )
    })?;

    let client = DriveClient::with_base_url(access_token, config.api.base_url.clone())
        .with_page_size(config.api.page_size)
        .with_max_retries(config.api.max_retries);

    Ok(Arc::new(DriveTreeClient::new(client)))
}

/// Assembles the coordinator over the configured adapters
pub(crate) async fn build_coordinator(config: &Config) -> Result<SyncCoordinator> {
    let store = open_store(config).await?;
    let tree = build_tree_client(config)?;
    let normalizer =
        NodeNormalizer::with_ignored_mime_types(config.mirror.ignored_mime_types.clone());

    Ok(SyncCoordinator::new(
        tree,
        store,
        normalizer,
        config.mirror.root_name.clone(),
        config.walker.workers,
    ))
}
