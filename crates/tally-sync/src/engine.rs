//! # Synchronization Engine
//!
//! Runs one replication cycle for one entity type.
//!
//! ## Cycle Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    FULL                       INCREMENTAL               │
//! │                                                                         │
//! │  1. snapshot change-log tail     1. deltas after deltas_cursor         │
//! │     (last: 1), if a delta           nothing? ──► return, no write      │
//! │     source exists                                                      │
//! │  2. scan every item              2. re-fetch additions, updates;       │
//! │     nothing? ──► return             stub deletions {id, DELETED}       │
//! │  3. tag ADDED                                                           │
//! │                                                                         │
//! │            ──────────── flatten · project · encode ────────────         │
//! │                                                                         │
//! │  4. write full_sync-<ts>-<e>     3. write sync_changes-<ts>-<e>        │
//! │                                                                         │
//! │  5. COMMIT state                 4. COMMIT deltas_cursor               │
//! │                                                                         │
//! │  WRITE-BEFORE-COMMIT: state only advances after the blob is durable.   │
//! │  Any failure returns before the commit; the next run repeats the same  │
//! │  mode from the pre-cycle state.                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! The engine takes no lock. The caller must not run two cycles of the same
//! namespace at once; the worker scheduler awaits each cycle before the next
//! tick of that entity.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::columnar::{ParquetEncoder, RowEncoder};
use crate::config::{EntityConfig, SyncSettings};
use crate::delta_fetcher::{DeltaFetcher, DeltaWindow};
use crate::error::{SyncError, SyncResult};
use crate::item_fetcher::ItemFetcher;
use crate::paginator::Paginator;
use crate::queries::EntityQueries;
use crate::state_store::StateStore;
use crate::storage::BlobStore;
use crate::transport::GraphQlTransport;
use tally_core::{
    blob_name, flatten_all, BlobKind, EntityId, MutationKind, SyncMode, Value,
    MUTATION_TYPE_FIELD,
};

// =============================================================================
// Outcome
// =============================================================================

/// What a cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Nothing to write; state untouched.
    NoChanges { mode: SyncMode },

    /// A full snapshot was written and committed.
    FullSync { rows: usize, blob: String },

    /// A change batch was written and committed.
    Incremental {
        added: usize,
        updated: usize,
        deleted: usize,
        blob: String,
    },
}

impl SyncOutcome {
    /// Location of the written blob, if any.
    pub fn blob(&self) -> Option<&str> {
        match self {
            SyncOutcome::NoChanges { .. } => None,
            SyncOutcome::FullSync { blob, .. } | SyncOutcome::Incremental { blob, .. } => {
                Some(blob)
            }
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Replication engine of one entity type.
pub struct SyncEngine {
    entity: String,
    columns: Vec<String>,
    id_field: String,
    page_size: usize,
    items: ItemFetcher,
    deltas: Option<DeltaFetcher>,
    encoder: Arc<dyn RowEncoder>,
    blobs: Arc<dyn BlobStore>,
    state: Arc<dyn StateStore>,
}

impl SyncEngine {
    /// Builds the engine of a configured entity.
    pub fn from_config(
        entity: &EntityConfig,
        settings: &SyncSettings,
        transport: Arc<dyn GraphQlTransport>,
        blobs: Arc<dyn BlobStore>,
        state: Arc<dyn StateStore>,
    ) -> SyncResult<Self> {
        let queries = EntityQueries::build(
            &entity.items_query,
            entity.deltas_query.as_deref(),
            &entity.fields,
            &settings.id_field,
            &entity.id_type,
        );
        let paginator = Paginator::new(transport);

        let mut builder = SyncEngineBuilder::new(&entity.name)
            .columns(entity.columns()?)
            .id_field(&settings.id_field)
            .page_size(settings.page_size)
            .item_fetcher(ItemFetcher::new(
                paginator.clone(),
                queries.by_ids,
                queries.after_cursor,
                settings.page_size,
            ))
            .blob_store(blobs)
            .state_store(state);

        if let Some(query) = queries.deltas {
            builder = builder.delta_fetcher(DeltaFetcher::new(paginator, query, &settings.id_field));
        }

        builder.build()
    }

    /// Namespace of this engine.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Output columns, `mutationType` last.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Whether incremental cycles are possible.
    pub fn has_delta_source(&self) -> bool {
        self.deltas.is_some()
    }

    /// Runs the cycle the persisted state calls for: full until the first
    /// full sync succeeded, incremental afterwards.
    pub async fn sync(&self) -> SyncResult<SyncOutcome> {
        let state = self.state.get_state(&self.entity).await?;
        self.run(state.next_mode() == SyncMode::Full).await
    }

    /// Runs one cycle.
    ///
    /// ## Arguments
    /// * `sync_from_scratch` - Full sync when true, incremental otherwise
    ///
    /// ## Errors
    /// `MissingDeltaSource` before any I/O when incremental is requested
    /// without a delta source. Otherwise the first transport, serialization,
    /// storage or state failure; in every error case nothing was committed.
    pub async fn run(&self, sync_from_scratch: bool) -> SyncResult<SyncOutcome> {
        let mode = if sync_from_scratch {
            SyncMode::Full
        } else {
            SyncMode::Incremental
        };

        if mode == SyncMode::Incremental && self.deltas.is_none() {
            return Err(SyncError::MissingDeltaSource {
                entity: self.entity.clone(),
            });
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("sync_cycle", entity = %self.entity, %run_id, %mode);

        async {
            info!("Cycle started");
            let outcome = match mode {
                SyncMode::Full => self.full_sync().await,
                SyncMode::Incremental => self.incremental_sync().await,
            }?;
            info!(?outcome, "Cycle finished");
            Ok::<_, SyncError>(outcome)
        }
        .instrument(span)
        .await
    }

    // =========================================================================
    // Full
    // =========================================================================

    async fn full_sync(&self) -> SyncResult<SyncOutcome> {
        let before = self.state.get_state(&self.entity).await?;

        // Snapshot first: changes made during the scan stay ahead of the cursor.
        let snapshot = match &self.deltas {
            Some(deltas) => Some(deltas.snapshot_tail().await?),
            None => None,
        };

        let items = self.items.fetch_all_after_cursor(None).await?;
        if items.is_empty() {
            info!("Source returned no items, nothing written");
            return Ok(SyncOutcome::NoChanges {
                mode: SyncMode::Full,
            });
        }

        let items_cursor = items.cursor.clone();
        let records = items.tagged(MUTATION_TYPE_FIELD, &MutationKind::Added.to_value());
        let rows = records.len();

        let blob = self.write(BlobKind::FullSync, &records).await?;

        let after = before.after_full_sync(items_cursor, snapshot);
        self.state.put_state(&self.entity, &after).await?;

        info!(rows, blob = %blob, "Full sync committed");
        Ok(SyncOutcome::FullSync { rows, blob })
    }

    // =========================================================================
    // Incremental
    // =========================================================================

    async fn incremental_sync(&self) -> SyncResult<SyncOutcome> {
        let deltas_source = self.deltas.as_ref().ok_or_else(|| SyncError::MissingDeltaSource {
            entity: self.entity.clone(),
        })?;

        let before = self.state.get_state(&self.entity).await?;
        let deltas = deltas_source
            .fetch_deltas(DeltaWindow::After {
                first: self.page_size,
                after: before.deltas_cursor.clone(),
            })
            .await?;

        if !deltas.has_changes() {
            info!(deltas_cursor = ?before.deltas_cursor, "No changes since cursor");
            return Ok(SyncOutcome::NoChanges {
                mode: SyncMode::Incremental,
            });
        }

        let added = self.refetch(deltas.additions(), MutationKind::Added).await?;
        let updated = self.refetch(deltas.updates(), MutationKind::Updated).await?;
        let deleted: Vec<Value> = deltas
            .deletions()
            .iter()
            .map(|id| self.deletion_stub(id))
            .collect();

        let counts = (added.len(), updated.len(), deleted.len());
        let records: Vec<Value> = added.into_iter().chain(updated).chain(deleted).collect();

        let blob = self.write(BlobKind::SyncChanges, &records).await?;

        let after = before.after_incremental(deltas.cursor.clone());
        self.state.put_state(&self.entity, &after).await?;

        let (added, updated, deleted) = counts;
        info!(added, updated, deleted, blob = %blob, "Changes committed");
        Ok(SyncOutcome::Incremental {
            added,
            updated,
            deleted,
            blob,
        })
    }

    async fn refetch<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a EntityId>,
        kind: MutationKind,
    ) -> SyncResult<Vec<Value>> {
        let ids: Vec<EntityId> = ids.into_iter().cloned().collect();
        let items = self.items.fetch_by_ids(&ids).await?;
        Ok(items.tagged(MUTATION_TYPE_FIELD, &kind.to_value()))
    }

    fn deletion_stub(&self, id: &EntityId) -> Value {
        Value::object([
            (self.id_field.as_str(), id.to_value()),
            (MUTATION_TYPE_FIELD, MutationKind::Deleted.to_value()),
        ])
    }

    // =========================================================================
    // Output
    // =========================================================================

    async fn write(&self, kind: BlobKind, records: &[Value]) -> SyncResult<String> {
        let rows = flatten_all(records);
        let bytes = self.encoder.encode(&rows, &self.columns)?;
        let name = blob_name(kind, Utc::now(), &self.entity, self.encoder.extension());
        self.blobs.write_blob(&self.entity, &name, bytes).await
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a SyncEngine with explicit collaborators.
pub struct SyncEngineBuilder {
    entity: String,
    columns: Vec<String>,
    id_field: String,
    page_size: usize,
    items: Option<ItemFetcher>,
    deltas: Option<DeltaFetcher>,
    encoder: Option<Arc<dyn RowEncoder>>,
    blobs: Option<Arc<dyn BlobStore>>,
    state: Option<Arc<dyn StateStore>>,
}

impl SyncEngineBuilder {
    /// Creates a new builder for the given entity namespace.
    pub fn new(entity: impl Into<String>) -> Self {
        SyncEngineBuilder {
            entity: entity.into(),
            columns: Vec::new(),
            id_field: tally_core::DEFAULT_ID_FIELD.to_string(),
            page_size: 10_000,
            items: None,
            deltas: None,
            encoder: None,
            blobs: None,
            state: None,
        }
    }

    /// Declared columns; `mutationType` is appended when absent.
    pub fn columns(mut self, columns: Vec<String>) -> Self {
        self.columns = columns;
        self
    }

    pub fn id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    /// Page size of change-log reads.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn item_fetcher(mut self, items: ItemFetcher) -> Self {
        self.items = Some(items);
        self
    }

    /// Enables incremental cycles and the pre-scan snapshot.
    pub fn delta_fetcher(mut self, deltas: DeltaFetcher) -> Self {
        self.deltas = Some(deltas);
        self
    }

    /// Defaults to Parquet.
    pub fn encoder(mut self, encoder: Arc<dyn RowEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn blob_store(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }

    pub fn state_store(mut self, state: Arc<dyn StateStore>) -> Self {
        self.state = Some(state);
        self
    }

    /// Builds the SyncEngine.
    pub fn build(self) -> SyncResult<SyncEngine> {
        let entity = self.entity;
        let missing =
            |what: &str| SyncError::Configuration(format!("Engine for '{}' requires {}", entity, what));

        let items = self.items.ok_or_else(|| missing("an item fetcher"))?;
        let blobs = self.blobs.ok_or_else(|| missing("a blob store"))?;
        let state = self.state.ok_or_else(|| missing("a state store"))?;

        if self.columns.is_empty() {
            return Err(missing("at least one column"));
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = self.columns.iter().find(|c| !seen.insert(c.as_str())) {
            return Err(SyncError::Configuration(format!(
                "Engine for '{}' declares column '{}' more than once",
                entity, duplicate
            )));
        }

        let mut columns = self.columns;
        if !columns.iter().any(|c| c == MUTATION_TYPE_FIELD) {
            columns.push(MUTATION_TYPE_FIELD.to_string());
        }

        Ok(SyncEngine {
            entity,
            columns,
            id_field: self.id_field,
            page_size: self.page_size,
            items,
            deltas: self.deltas,
            encoder: self
                .encoder
                .unwrap_or_else(|| Arc::new(ParquetEncoder) as Arc<dyn RowEncoder>),
            blobs,
            state,
        })
    }
}
