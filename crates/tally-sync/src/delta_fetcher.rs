//! # Delta Fetcher
//!
//! Reads the change log of one entity type and classifies it.
//!
//! ## Windows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DeltaWindow::After { first, after }   forward read since a cursor     │
//! │     → every change record, all pages     (incremental cycles)          │
//! │                                                                         │
//! │  DeltaWindow::Tail                     { last: 1 }                     │
//! │     → only the newest record             (snapshot before a full scan) │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Change records expire at the source after about three days. A cursor
//! older than that no longer resumes where it left off.

use serde_json::{json, Value as Json};
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::paginator::{Paginator, AFTER_VARIABLE};
use crate::transport::Variables;
use tally_core::{Cursor, DeltaRecord, DeltasResult};

/// Pagination window of a change-log read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaWindow {
    /// All records after `after` (`None` = from the oldest retained record).
    After { first: usize, after: Option<Cursor> },
    /// Only the most recent record.
    Tail,
}

impl DeltaWindow {
    fn to_variables(&self) -> Variables {
        let mut variables = Variables::new();
        match self {
            DeltaWindow::After { first, after } => {
                variables.insert("first".into(), json!(first));
                variables.insert(
                    AFTER_VARIABLE.into(),
                    after
                        .as_ref()
                        .map_or(Json::Null, |c| Json::String(c.as_str().to_string())),
                );
            }
            DeltaWindow::Tail => {
                variables.insert("last".into(), json!(1));
            }
        }
        variables
    }
}

/// Fetches and classifies change-log records.
#[derive(Clone)]
pub struct DeltaFetcher {
    paginator: Paginator,
    query: String,
    id_field: String,
}

impl DeltaFetcher {
    pub fn new(paginator: Paginator, query: impl Into<String>, id_field: impl Into<String>) -> Self {
        DeltaFetcher {
            paginator,
            query: query.into(),
            id_field: id_field.into(),
        }
    }

    /// Reads the change log within `window` and classifies the records.
    ///
    /// Nodes without an id or with an unknown mutation kind are skipped. The
    /// cursor is that of the last record read, skipped or not.
    pub async fn fetch_deltas(&self, window: DeltaWindow) -> SyncResult<DeltasResult> {
        let result = self
            .paginator
            .paginate(&self.query, window.to_variables())
            .await?;

        let records = result.items.iter().filter_map(|node| {
            match DeltaRecord::from_node(node, &self.id_field) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable change record");
                    None
                }
            }
        });

        let deltas = DeltasResult::classify(records, result.cursor.clone());

        debug!(
            additions = deltas.additions.len(),
            updates = deltas.updates.len(),
            deletions = deltas.deletions.len(),
            "Deltas classified"
        );

        Ok(deltas)
    }

    /// Cursor of the newest change record, `None` if the log is empty.
    pub async fn snapshot_tail(&self) -> SyncResult<Option<Cursor>> {
        Ok(self.fetch_deltas(DeltaWindow::Tail).await?.cursor)
    }
}
