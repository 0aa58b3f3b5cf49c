//! # State Store
//!
//! Per-namespace `SyncState` persistence as seen by the engine.
//!
//! Implemented by the SQLite repository of `tally-db` and by an in-memory
//! store for tests and one-off runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::error::SyncResult;
use tally_core::SyncState;
use tally_db::SyncStateRepository;

/// Durable key-value persistence of sync state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// State of `namespace`; defaults when never written.
    async fn get_state(&self, namespace: &str) -> SyncResult<SyncState>;

    /// Replaces the state of `namespace`.
    async fn put_state(&self, namespace: &str, state: &SyncState) -> SyncResult<()>;

    /// Restores every namespace to defaults.
    async fn reset_all_state(&self) -> SyncResult<()>;
}

#[async_trait]
impl StateStore for SyncStateRepository {
    async fn get_state(&self, namespace: &str) -> SyncResult<SyncState> {
        Ok(self.get(namespace).await?)
    }

    async fn put_state(&self, namespace: &str, state: &SyncState) -> SyncResult<()> {
        Ok(self.put(namespace, state).await?)
    }

    async fn reset_all_state(&self) -> SyncResult<()> {
        self.reset_all().await?;
        Ok(())
    }
}

/// Process-local state store.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    states: RwLock<HashMap<String, SyncState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with one namespace.
    pub fn with_state(namespace: &str, state: SyncState) -> Self {
        let mut states = HashMap::new();
        states.insert(namespace.to_string(), state);
        MemoryStateStore {
            states: RwLock::new(states),
        }
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get_state(&self, namespace: &str) -> SyncResult<SyncState> {
        Ok(self
            .states
            .read()
            .await
            .get(namespace)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_state(&self, namespace: &str, state: &SyncState) -> SyncResult<()> {
        self.states
            .write()
            .await
            .insert(namespace.to_string(), state.clone());
        Ok(())
    }

    async fn reset_all_state(&self) -> SyncResult<()> {
        self.states.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Cursor;
    use tally_db::{Database, DbConfig};

    fn initialized() -> SyncState {
        SyncState {
            initial_sync_complete: true,
            initial_sync_cursor: Some(Cursor::from("i")),
            deltas_cursor: Some(Cursor::from("d")),
        }
    }

    async fn exercise(store: &dyn StateStore) {
        assert_eq!(store.get_state("customers").await.unwrap(), SyncState::default());

        store.put_state("customers", &initialized()).await.unwrap();
        assert_eq!(store.get_state("customers").await.unwrap(), initialized());
        assert_eq!(store.get_state("projects").await.unwrap(), SyncState::default());

        store.reset_all_state().await.unwrap();
        store.reset_all_state().await.unwrap();
        assert_eq!(store.get_state("customers").await.unwrap(), SyncState::default());
    }

    #[tokio::test]
    async fn test_memory_store() {
        exercise(&MemoryStateStore::new()).await;
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        exercise(&db.sync_state()).await;
    }

    #[tokio::test]
    async fn test_seeded_memory_store() {
        let store = MemoryStateStore::with_state("customers", initialized());
        assert_eq!(store.get_state("customers").await.unwrap(), initialized());
    }
}
