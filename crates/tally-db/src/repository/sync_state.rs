//! # Sync State Repository
//!
//! Reads and writes the persisted progress of each entity-type namespace.
//!
//! ## Row Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  get("customers")   no row ──► SyncState::default()   (nothing written)│
//! │                                                                         │
//! │  put("customers", s)        ──► INSERT .. ON CONFLICT DO UPDATE         │
//! │                                 (only after the blob is durable)        │
//! │                                                                         │
//! │  reset_all()                ──► DELETE FROM sync_state                  │
//! │                                 (every namespace back to defaults)      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;
use tally_core::{Cursor, SyncState};

/// Repository for `sync_state` rows.
#[derive(Debug, Clone)]
pub struct SyncStateRepository {
    pool: SqlitePool,
}

impl SyncStateRepository {
    /// Creates a new SyncStateRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncStateRepository { pool }
    }

    /// Loads the state of a namespace.
    ///
    /// A namespace that was never written yields `SyncState::default()`.
    pub async fn get(&self, namespace: &str) -> DbResult<SyncState> {
        let row: Option<(bool, Option<String>, Option<String>)> = sqlx::query_as(
            r#"
            SELECT initial_sync_complete, initial_sync_cursor, deltas_cursor
            FROM sync_state
            WHERE namespace = ?1
            "#,
        )
        .bind(namespace)
        .fetch_optional(&self.pool)
        .await?;

        let state = match row {
            Some((initial_sync_complete, initial_sync_cursor, deltas_cursor)) => SyncState {
                initial_sync_complete,
                initial_sync_cursor: initial_sync_cursor.map(Cursor::from),
                deltas_cursor: deltas_cursor.map(Cursor::from),
            },
            None => SyncState::default(),
        };

        debug!(
            namespace = %namespace,
            initial_sync_complete = state.initial_sync_complete,
            "Loaded sync state"
        );

        Ok(state)
    }

    /// Stores the state of a namespace, replacing any previous value.
    pub async fn put(&self, namespace: &str, state: &SyncState) -> DbResult<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO sync_state (
                namespace, initial_sync_complete, initial_sync_cursor,
                deltas_cursor, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(namespace) DO UPDATE SET
                initial_sync_complete = excluded.initial_sync_complete,
                initial_sync_cursor = excluded.initial_sync_cursor,
                deltas_cursor = excluded.deltas_cursor,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(state.initial_sync_complete)
        .bind(state.initial_sync_cursor.as_ref().map(Cursor::as_str))
        .bind(state.deltas_cursor.as_ref().map(Cursor::as_str))
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(
            namespace = %namespace,
            deltas_cursor = ?state.deltas_cursor,
            "Stored sync state"
        );

        Ok(())
    }

    /// Restores every namespace to defaults. Idempotent.
    ///
    /// ## Returns
    /// Number of namespaces that had stored state.
    pub async fn reset_all(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM sync_state")
            .execute(&self.pool)
            .await?;

        info!(namespaces = result.rows_affected(), "Sync state reset");
        Ok(result.rows_affected())
    }

    /// Namespaces with stored state, sorted.
    pub async fn namespaces(&self) -> DbResult<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT namespace FROM sync_state ORDER BY namespace")
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    async fn repository() -> SyncStateRepository {
        Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .sync_state()
    }

    fn initialized(deltas: &str) -> SyncState {
        SyncState {
            initial_sync_complete: true,
            initial_sync_cursor: Some(Cursor::from("item-cursor")),
            deltas_cursor: Some(Cursor::from(deltas)),
        }
    }

    #[tokio::test]
    async fn test_unknown_namespace_returns_defaults_without_writing() {
        let repo = repository().await;

        let state = repo.get("customers").await.unwrap();
        assert_eq!(state, SyncState::default());
        assert!(repo.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let repo = repository().await;

        repo.put("customers", &initialized("cur1")).await.unwrap();
        assert_eq!(repo.get("customers").await.unwrap(), initialized("cur1"));

        // Upsert replaces
        repo.put("customers", &initialized("cur2")).await.unwrap();
        assert_eq!(repo.get("customers").await.unwrap(), initialized("cur2"));
        assert_eq!(repo.namespaces().await.unwrap(), vec!["customers"]);
    }

    #[tokio::test]
    async fn test_null_cursors_round_trip() {
        let repo = repository().await;
        let state = SyncState {
            initial_sync_complete: true,
            initial_sync_cursor: None,
            deltas_cursor: None,
        };

        repo.put("projects", &state).await.unwrap();
        assert_eq!(repo.get("projects").await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let repo = repository().await;

        repo.put("customers", &initialized("c")).await.unwrap();
        assert_eq!(repo.get("timesheets").await.unwrap(), SyncState::default());
    }

    #[tokio::test]
    async fn test_reset_all_is_idempotent() {
        let repo = repository().await;

        // Safe on an empty store
        assert_eq!(repo.reset_all().await.unwrap(), 0);

        repo.put("customers", &initialized("c")).await.unwrap();
        repo.put("employees", &initialized("e")).await.unwrap();
        assert_eq!(repo.reset_all().await.unwrap(), 2);

        assert_eq!(repo.get("customers").await.unwrap(), SyncState::default());
        assert_eq!(repo.get("employees").await.unwrap(), SyncState::default());
        assert_eq!(repo.reset_all().await.unwrap(), 0);
    }
}
