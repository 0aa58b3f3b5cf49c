//! # tally-core: Pure Replication Model
//!
//! Types and algorithms shared by every layer of the replication engine.
//! Nothing in this crate performs I/O.
//!
//! ## Module Organization
//! - [`value`] - Generic nested record tree (`Value`, `Scalar`)
//! - [`row`] - Flattening records into dot-path rows, column projection
//! - [`items`] - Cursors, pages and accumulated item results
//! - [`delta`] - Change-log records and their classification
//! - [`state`] - Persisted per-namespace sync state and transitions
//! - [`fields`] - GraphQL field selection → column list
//! - [`naming`] - Output blob naming contract
//! - [`error`] - Core error types

pub mod delta;
pub mod error;
pub mod fields;
pub mod items;
pub mod naming;
pub mod row;
pub mod state;
pub mod value;

pub use delta::{DeltaRecord, DeltasResult, EntityId, MutationKind};
pub use error::{CoreError, CoreResult};
pub use fields::flatten_field_selection;
pub use items::{Cursor, Edge, ItemsResult, PageResult};
pub use naming::{blob_name, filename_timestamp, BlobKind, PARQUET_EXTENSION};
pub use row::{flatten, flatten_all, project, Row};
pub use state::{SyncMode, SyncState};
pub use value::{Scalar, Value};

/// Column carrying the mutation kind of every written row.
pub const MUTATION_TYPE_FIELD: &str = "mutationType";

/// Default id field of source entities.
pub const DEFAULT_ID_FIELD: &str = "dbId";
