//! # tally-sync: Replication Engine for Tally
//!
//! Replicates entity collections of a GraphQL accounting API into a
//! columnar data lake, one namespace per entity type.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Replication Architecture                         │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                SyncEngine (one per entity type)                  │  │
//! │  │                                                                  │  │
//! │  │  sync(): full until the first snapshot lands, then incremental  │  │
//! │  │  Commits SyncState only after the blob is written                │  │
//! │  └───────┬───────────────────────┬────────────────────────┬─────────┘  │
//! │          ▼                       ▼                        ▼             │
//! │  ┌────────────────┐  ┌──────────────────────┐  ┌────────────────────┐  │
//! │  │  ItemFetcher   │  │    DeltaFetcher      │  │  ParquetEncoder    │  │
//! │  │                │  │                      │  │                    │  │
//! │  │ whole scan or  │  │ change log after a   │  │ flatten, project,  │  │
//! │  │ id lookups     │  │ cursor; tail snapshot│  │ encode             │  │
//! │  └───────┬────────┘  └──────────┬───────────┘  └─────────┬──────────┘  │
//! │          └──────────┬───────────┘                        │              │
//! │                     ▼                                    ▼              │
//! │  ┌──────────────────────────────────┐  ┌──────────────────────────────┐ │
//! │  │ Paginator → GraphQlTransport     │  │ BlobStore        StateStore  │ │
//! │  │ (HTTP, bounded backoff retries)  │  │ (files)          (SQLite)    │ │
//! │  └──────────────────────────────────┘  └──────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`engine`] - `SyncEngine` and its builder
//! - [`config`] - Worker configuration (TOML + environment)
//! - [`error`] - Sync error types
//! - [`transport`] - GraphQL transport trait and HTTP client
//! - [`paginator`] - Cursor pagination over a transport
//! - [`item_fetcher`] / [`delta_fetcher`] - Entity and change-log reads
//! - [`queries`] - Query text rendered from field selections
//! - [`columnar`] - Parquet encoding
//! - [`storage`] - Blob store trait and filesystem store
//! - [`state_store`] - Sync state persistence trait
//! - [`report`] - JSON report export
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tally_sync::{FsBlobStore, HttpClientConfig, HttpGraphQlClient, SyncEngine, TallyConfig};
//! use tally_db::{Database, DbConfig};
//!
//! let config = TallyConfig::load(None)?;
//! let transport = Arc::new(HttpGraphQlClient::new(HttpClientConfig::from_settings(&config.api)?)?);
//! let blobs = Arc::new(FsBlobStore::new(&config.storage.root, &config.storage.container));
//! let db = Database::new(DbConfig::new(&config.state.database_path)).await?;
//!
//! let engine = SyncEngine::from_config(
//!     config.entity("customers")?,
//!     &config.sync,
//!     transport,
//!     blobs,
//!     Arc::new(db.sync_state()),
//! )?;
//! let outcome = engine.sync().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod columnar;
pub mod config;
pub mod delta_fetcher;
pub mod engine;
pub mod error;
pub mod item_fetcher;
pub mod paginator;
pub mod queries;
pub mod report;
pub mod state_store;
pub mod storage;
pub mod transport;

// =============================================================================
// Re-exports
// =============================================================================

pub use columnar::{ParquetEncoder, RowEncoder};
pub use config::{
    ApiSettings, EntityConfig, ReportConfig, StateSettings, StorageSettings, SyncSettings,
    TallyConfig,
};
pub use delta_fetcher::{DeltaFetcher, DeltaWindow};
pub use engine::{SyncEngine, SyncEngineBuilder, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use item_fetcher::ItemFetcher;
pub use paginator::Paginator;
pub use queries::EntityQueries;
pub use report::{ReportExporter, ReportOutcome};
pub use state_store::{MemoryStateStore, StateStore};
pub use storage::{BlobStore, FsBlobStore};
pub use transport::{GraphQlTransport, HttpClientConfig, HttpGraphQlClient, Variables};
