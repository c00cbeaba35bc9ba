//! SQLite implementation of IRecordStore
//!
//! Concrete SQLite-based implementation of the record store port defined in
//! treemirror-core. Handles all domain type serialization/deserialization
//! and SQL query construction.
//!
//! ## Type Mapping
//!
//! | Domain Type       | SQL Type | Strategy                                  |
//! |-------------------|----------|-------------------------------------------|
//! | NodeId            | TEXT     | String via `.as_str()` / `NodeId::new()`  |
//! | NodeKind          | TEXT     | `"file"` / `"folder"`                     |
//! | parent_ids        | TEXT     | serde_json array of id strings            |
//! | NodePath          | TEXT     | serde_json array of names; NULL = orphan  |
//! | ChangeToken       | TEXT     | String via `.as_str()` / `ChangeToken::new()` |
//! | SyncPhase         | TEXT     | `"clean"` / `"rebuilding"` / `"reconciling"` |
//! | DateTime<Utc>     | TEXT     | ISO 8601 via `to_rfc3339()`               |

use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use treemirror_core::domain::{
    newtypes::{ChangeToken, NodeId, NodePath},
    node::Node,
    state::{MirrorState, SyncPhase},
};
use treemirror_core::ports::IRecordStore;

use crate::StoreError;

/// SQLite-based implementation of the record store port
///
/// All operations go through a connection pool so fan-out walker workers
/// can upsert concurrently; every statement touches a single row (or, for
/// the descendant scan, a recursive CTE over indexed parent links).
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Serialize a SyncPhase to its stored string representation
fn phase_to_string(phase: SyncPhase) -> String {
    phase.as_str().to_string()
}

/// Deserialize a SyncPhase from its stored string representation
fn phase_from_string(s: &str) -> Result<SyncPhase, StoreError> {
    match s {
        "clean" => Ok(SyncPhase::Clean),
        "rebuilding" => Ok(SyncPhase::Rebuilding),
        "reconciling" => Ok(SyncPhase::Reconciling),
        other => Err(StoreError::Serialization(format!(
            "Unknown sync phase: {}",
            other
        ))),
    }
}

/// Parse a DateTime<Utc> from an ISO 8601 string
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::Serialization(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

// ============================================================================
// Row mapping
// ============================================================================

/// Reconstruct a Node from a database row
///
/// Uses serde JSON deserialization to reconstruct the Node since the struct
/// has private fields that can only be set through constructors or
/// deserialization.
fn node_from_row(row: &SqliteRow) -> Result<Node, StoreError> {
    let id: String = row.get("id");
    let name: String = row.get("name");
    let kind: String = row.get("kind");
    let parent_ids_json: String = row.get("parent_ids");
    let mime_type: Option<String> = row.get("mime_type");
    let checksum: Option<String> = row.get("checksum");
    let size: Option<i64> = row.get("size");
    let owned_by_caller: i64 = row.get("owned_by_caller");
    let path_json: Option<String> = row.get("path");

    let parent_ids: serde_json::Value = serde_json::from_str(&parent_ids_json)
        .map_err(|e| StoreError::Serialization(format!("Invalid parent_ids JSON: {}", e)))?;

    let path_val: serde_json::Value = match path_json {
        Some(ref s) => serde_json::from_str(s)
            .map_err(|e| StoreError::Serialization(format!("Invalid path JSON: {}", e)))?,
        None => serde_json::Value::Null,
    };

    let node_json = serde_json::json!({
        "id": id,
        "name": name,
        "kind": kind,
        "parent_ids": parent_ids,
        "mime_type": mime_type,
        "checksum": checksum,
        "size": size.map(|s| s as u64),
        "owned_by_caller": owned_by_caller != 0,
        "path": path_val,
    });

    let node: Node = serde_json::from_value(node_json).map_err(|e| {
        StoreError::Serialization(format!("Failed to reconstruct Node from row: {}", e))
    })?;

    Ok(node)
}

/// Reconstruct the MirrorState from its single row
fn state_from_row(row: &SqliteRow) -> Result<MirrorState, StoreError> {
    let phase_str: String = row.get("phase");
    let change_token_str: Option<String> = row.get("change_token");
    let root_id_str: Option<String> = row.get("root_id");
    let updated_at_str: String = row.get("updated_at");

    let phase = phase_from_string(&phase_str)?;
    let updated_at = parse_datetime(&updated_at_str)?;

    let change_token = match change_token_str {
        Some(ref s) if !s.is_empty() => Some(ChangeToken::new(s.clone()).map_err(|e| {
            StoreError::Serialization(format!("Invalid change token '{}': {}", s, e))
        })?),
        _ => None,
    };

    let root_id = match root_id_str {
        Some(ref s) if !s.is_empty() => Some(NodeId::from_str(s).map_err(|e| {
            StoreError::Serialization(format!("Invalid root id '{}': {}", s, e))
        })?),
        _ => None,
    };

    Ok(MirrorState {
        phase,
        change_token,
        root_id,
        updated_at,
    })
}

/// Bind parameters shared by `upsert` and `upsert_batch`
fn node_to_params(node: &Node) -> Result<NodeParams, StoreError> {
    let parent_ids_json = serde_json::to_string(
        &node
            .parent_ids()
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>(),
    )
    .map_err(|e| StoreError::Serialization(format!("Failed to serialize parent_ids: {}", e)))?;

    let path_json = match node.path() {
        Some(path) => Some(serde_json::to_string(path.segments()).map_err(|e| {
            StoreError::Serialization(format!("Failed to serialize path: {}", e))
        })?),
        None => None,
    };

    Ok(NodeParams {
        parent_id: node.first_parent().map(|p| p.as_str().to_string()),
        parent_ids_json,
        path_json,
    })
}

struct NodeParams {
    parent_id: Option<String>,
    parent_ids_json: String,
    path_json: Option<String>,
}

const UPSERT_NODE_SQL: &str = "INSERT INTO nodes \
    (id, name, kind, parent_id, parent_ids, mime_type, checksum, size, owned_by_caller, path) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
    ON CONFLICT(id) DO UPDATE SET \
    name = excluded.name, \
    kind = excluded.kind, \
    parent_id = excluded.parent_id, \
    parent_ids = excluded.parent_ids, \
    mime_type = excluded.mime_type, \
    checksum = excluded.checksum, \
    size = excluded.size, \
    owned_by_caller = excluded.owned_by_caller, \
    path = excluded.path";

// ============================================================================
// IRecordStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IRecordStore for SqliteRecordStore {
    async fn upsert(&self, node: &Node) -> anyhow::Result<()> {
        let params = node_to_params(node)?;

        sqlx::query(UPSERT_NODE_SQL)
            .bind(node.id().as_str())
            .bind(node.name())
            .bind(node.kind().as_str())
            .bind(&params.parent_id)
            .bind(&params.parent_ids_json)
            .bind(node.mime_type())
            .bind(node.checksum())
            .bind(node.size().map(|s| s as i64))
            .bind(node.owned_by_caller() as i64)
            .bind(&params.path_json)
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(())
    }

    async fn upsert_batch(&self, nodes: &[Node]) -> anyhow::Result<()> {
        if nodes.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        for node in nodes {
            let params = node_to_params(node)?;

            sqlx::query(UPSERT_NODE_SQL)
                .bind(node.id().as_str())
                .bind(node.name())
                .bind(node.kind().as_str())
                .bind(&params.parent_id)
                .bind(&params.parent_ids_json)
                .bind(node.mime_type())
                .bind(node.checksum())
                .bind(node.size().map(|s| s as i64))
                .bind(node.owned_by_caller() as i64)
                .bind(&params.path_json)
                .execute(&mut *tx)
                .await
                .map_err(StoreError::from)?;
        }

        tx.commit().await.map_err(StoreError::from)?;

        tracing::debug!(count = nodes.len(), "Persisted node batch");

        Ok(())
    }

    async fn delete(&self, id: &NodeId) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = ?1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_id(&self, id: &NodeId) -> anyhow::Result<Option<Node>> {
        let row = sqlx::query("SELECT * FROM nodes WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        match row {
            Some(row) => Ok(Some(node_from_row(&row)?)),
            None => Ok(None),
        }
    }

    async fn find_unresolved(&self) -> anyhow::Result<Vec<Node>> {
        let rows = sqlx::query("SELECT * FROM nodes WHERE path IS NULL")
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;

        rows.iter()
            .map(|row| node_from_row(row).map_err(anyhow::Error::from))
            .collect()
    }

    async fn set_path(&self, id: &NodeId, path: &NodePath) -> anyhow::Result<()> {
        let path_json = serde_json::to_string(path.segments())
            .map_err(|e| StoreError::Serialization(format!("Failed to serialize path: {}", e)))?;

        sqlx::query("UPDATE nodes SET path = ?1 WHERE id = ?2")
            .bind(&path_json)
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(())
    }

    async fn clear_paths_beneath(&self, id: &NodeId) -> anyhow::Result<u64> {
        // Walk first-parent links downward; the ancestor itself keeps its
        // path (a rename does not change the ancestor's own ancestry).
        let result = sqlx::query(
            "WITH RECURSIVE descendants(id) AS ( \
                SELECT id FROM nodes WHERE parent_id = ?1 \
                UNION \
                SELECT n.id FROM nodes n JOIN descendants d ON n.parent_id = d.id \
            ) \
            UPDATE nodes SET path = NULL \
            WHERE id IN (SELECT id FROM descendants) AND path IS NOT NULL",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(result.rows_affected())
    }

    async fn count_nodes(&self) -> anyhow::Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM nodes")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)?;

        let n: i64 = row.get("n");
        Ok(n as u64)
    }

    async fn drop_all(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM nodes")
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;

        tracing::info!("Dropped all mirrored nodes");

        Ok(())
    }

    async fn load_state(&self) -> anyhow::Result<MirrorState> {
        let row = sqlx::query("SELECT * FROM mirror_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        match row {
            Some(row) => Ok(state_from_row(&row)?),
            None => Ok(MirrorState::initial()),
        }
    }

    async fn save_state(&self, state: &MirrorState) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO mirror_state (id, phase, change_token, root_id, updated_at) \
             VALUES (1, ?1, ?2, ?3, ?4) \
             ON CONFLICT(id) DO UPDATE SET \
             phase = excluded.phase, \
             change_token = excluded.change_token, \
             root_id = excluded.root_id, \
             updated_at = excluded.updated_at",
        )
        .bind(phase_to_string(state.phase))
        .bind(state.change_token.as_ref().map(|t| t.as_str()))
        .bind(state.root_id.as_ref().map(|r| r.as_str()))
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(())
    }
}
