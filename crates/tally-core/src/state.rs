//! # Sync State
//!
//! Persisted progress of one entity-type namespace.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌───────────────┐   full sync written    ┌───────────────┐          │
//! │   │ UNINITIALIZED │ ─────────────────────► │  INITIALIZED  │◄──┐      │
//! │   │ complete=false│                         │ complete=true │   │      │
//! │   └───────────────┘                         └───────┬───────┘   │      │
//! │          ▲                                          │ incremental│      │
//! │          │ reset                                    └────────────┘      │
//! │                                                                         │
//! │  There is no persisted "in progress" state. A crash mid-cycle leaves  │
//! │  the pre-cycle state, and the next run re-executes the same mode.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::items::Cursor;

/// Which algorithm a cycle runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Re-fetch and re-write the whole collection.
    Full,
    /// Apply change-log deltas since the last recorded cursor.
    Incremental,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Full => write!(f, "full"),
            SyncMode::Incremental => write!(f, "incremental"),
        }
    }
}

/// Persisted per-namespace sync progress.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    /// Whether a full sync has been written at least once.
    #[serde(default)]
    pub initial_sync_complete: bool,

    /// Cursor of the last item of the most recent full sync.
    #[serde(default)]
    pub initial_sync_cursor: Option<Cursor>,

    /// Cursor through which change-log records have been fully applied.
    #[serde(default)]
    pub deltas_cursor: Option<Cursor>,
}

impl SyncState {
    /// The mode a scheduled trigger should run for this state.
    pub fn next_mode(&self) -> SyncMode {
        if self.initial_sync_complete {
            SyncMode::Incremental
        } else {
            SyncMode::Full
        }
    }

    /// State after a full sync has been durably written.
    ///
    /// `snapshot` is `Some` when a change-log tail cursor was taken before
    /// the scan; it then replaces `deltas_cursor` (even when the tail was
    /// empty and the cursor itself is `None`).
    pub fn after_full_sync(&self, items_cursor: Option<Cursor>, snapshot: Option<Option<Cursor>>) -> Self {
        SyncState {
            initial_sync_complete: true,
            initial_sync_cursor: items_cursor,
            deltas_cursor: match snapshot {
                Some(cursor) => cursor,
                None => self.deltas_cursor.clone(),
            },
        }
    }

    /// State after an incremental batch has been durably written.
    ///
    /// A missing cursor never regresses the stored one.
    pub fn after_incremental(&self, deltas_cursor: Option<Cursor>) -> Self {
        SyncState {
            deltas_cursor: deltas_cursor.or_else(|| self.deltas_cursor.clone()),
            ..self.clone()
        }
    }
}
