//! Wiring of the collaborators and the one-off commands.

use std::sync::Arc;
use tracing::info;

use tally_core::SyncState;
use tally_db::migrations::migration_status;
use tally_db::{Database, DbConfig};
use tally_sync::{
    BlobStore, FsBlobStore, HttpClientConfig, HttpGraphQlClient, ReportExporter, StateStore,
    SyncEngine, SyncOutcome, SyncResult, TallyConfig,
};

/// Health of the state database and the progress of every entity.
#[derive(Debug)]
pub struct StatusReport {
    pub database_healthy: bool,
    /// `(known, applied)` migrations.
    pub migrations: (usize, usize),
    pub entities: Vec<(String, SyncState)>,
    /// Namespaces with stored state that no configured entity uses.
    pub orphaned: Vec<String>,
}

/// Collaborators shared by every engine of the process.
pub struct Worker {
    config: TallyConfig,
    transport: Arc<HttpGraphQlClient>,
    blobs: Arc<FsBlobStore>,
    db: Database,
}

impl Worker {
    /// Connects the transport, the blob store and the state database.
    pub async fn open(config: TallyConfig) -> anyhow::Result<Self> {
        let transport = Arc::new(HttpGraphQlClient::new(HttpClientConfig::from_settings(
            &config.api,
        )?)?);
        let blobs = Arc::new(blob_store(&config));

        if let Some(parent) = config.state.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let db = Database::new(
            DbConfig::new(&config.state.database_path).max_connections(config.state.max_connections),
        )
        .await?;

        info!(
            entities = config.entities.len(),
            reports = config.reports.len(),
            container = %blobs.container_path().display(),
            "Worker ready"
        );

        Ok(Worker {
            config,
            transport,
            blobs,
            db,
        })
    }

    pub fn config(&self) -> &TallyConfig {
        &self.config
    }

    /// Builds the engine of a configured entity.
    pub fn engine(&self, entity: &str) -> SyncResult<SyncEngine> {
        SyncEngine::from_config(
            self.config.entity(entity)?,
            &self.config.sync,
            self.transport.clone(),
            self.blobs.clone(),
            Arc::new(self.db.sync_state()),
        )
    }

    /// Report exporter sharing the transport's HTTP client.
    pub fn report_exporter(&self) -> ReportExporter {
        ReportExporter::new(self.transport.http().clone(), self.blobs.clone())
    }

    /// One cycle; `full` forces a full sync, otherwise the state decides.
    pub async fn sync_entity(&self, entity: &str, full: bool) -> SyncResult<SyncOutcome> {
        let engine = self.engine(entity)?;
        if full {
            engine.run(true).await
        } else {
            engine.sync().await
        }
    }

    pub async fn reset_state(&self) -> SyncResult<()> {
        self.db.sync_state().reset_all_state().await?;
        info!("Sync state reset for every entity");
        Ok(())
    }

    /// Database health plus the persisted state of every configured entity.
    pub async fn status(&self) -> SyncResult<StatusReport> {
        let database_healthy = self.db.health_check().await;
        let migrations = migration_status(self.db.pool()).await?;

        let repository = self.db.sync_state();
        let mut entities = Vec::with_capacity(self.config.entities.len());
        for entity in &self.config.entities {
            entities.push((entity.name.clone(), repository.get_state(&entity.name).await?));
        }

        let orphaned = repository
            .namespaces()
            .await?
            .into_iter()
            .filter(|namespace| self.config.entity(namespace).is_err())
            .collect();

        Ok(StatusReport {
            database_healthy,
            migrations,
            entities,
            orphaned,
        })
    }

    pub async fn close(&self) {
        self.db.close().await;
    }
}

fn blob_store(config: &TallyConfig) -> FsBlobStore {
    FsBlobStore::new(&config.storage.root, &config.storage.container)
}

/// Deletes the blobs of one entity, or of the whole container.
pub async fn wipe_storage(config: &TallyConfig, entity: Option<&str>) -> SyncResult<usize> {
    if let Some(name) = entity {
        config.entity(name)?;
    }
    blob_store(config).delete_all(entity).await
}

/// Output columns of an entity, `mutationType` last.
pub fn columns(config: &TallyConfig, entity: &str) -> SyncResult<Vec<String>> {
    let mut columns = config.entity(entity)?.columns()?;
    if !columns.iter().any(|c| c == tally_core::MUTATION_TYPE_FIELD) {
        columns.push(tally_core::MUTATION_TYPE_FIELD.to_string());
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::Cursor;
    use tally_sync::EntityConfig;

    fn config() -> TallyConfig {
        let mut config = TallyConfig::default();
        config.entities.push(EntityConfig {
            name: "customers".into(),
            items_query: "customers".into(),
            deltas_query: None,
            fields: "dbId company { name }".into(),
            columns: None,
            id_type: "Int".into(),
        });
        config
    }

    #[test]
    fn test_columns_end_with_mutation_type() {
        assert_eq!(
            columns(&config(), "customers").unwrap(),
            vec!["dbId", "company.name", "mutationType"]
        );
        assert!(columns(&config(), "projects").unwrap_err().is_config_error());
    }

    #[tokio::test]
    async fn test_wipe_unknown_entity_is_rejected() {
        assert!(wipe_storage(&config(), Some("projects"))
            .await
            .unwrap_err()
            .is_config_error());
    }

    #[tokio::test]
    async fn test_status_reports_database_and_orphans() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.api.endpoint = "https://api.example.com/graphql".into();
        config.api.api_key = "k".into();
        config.storage.root = dir.path().join("lake");
        config.storage.container = "ledger".into();
        config.state.database_path = dir.path().join("state/tally.db");

        let worker = Worker::open(config).await.unwrap();
        let retired = SyncState {
            initial_sync_complete: true,
            initial_sync_cursor: Some(Cursor::from("c")),
            deltas_cursor: None,
        };
        worker.db.sync_state().put("retired", &retired).await.unwrap();

        let report = worker.status().await.unwrap();
        assert!(report.database_healthy);
        assert_eq!(report.migrations.0, report.migrations.1);
        assert_eq!(
            report.entities,
            vec![("customers".to_string(), SyncState::default())]
        );
        assert_eq!(report.orphaned, vec!["retired"]);

        worker.close().await;
    }
}
