//! # Item Fetcher
//!
//! Fetches full entity records, either the whole collection or a specific
//! id set.

use serde_json::{json, Value as Json};
use tracing::debug;

use crate::error::SyncResult;
use crate::paginator::{Paginator, AFTER_VARIABLE};
use crate::queries::ID_LIST_VARIABLE;
use crate::transport::Variables;
use tally_core::{Cursor, EntityId, ItemsResult};

/// Fetches records of one entity type.
#[derive(Clone)]
pub struct ItemFetcher {
    paginator: Paginator,
    by_ids_query: String,
    after_cursor_query: String,
    page_size: usize,
}

impl ItemFetcher {
    pub fn new(
        paginator: Paginator,
        by_ids_query: impl Into<String>,
        after_cursor_query: impl Into<String>,
        page_size: usize,
    ) -> Self {
        ItemFetcher {
            paginator,
            by_ids_query: by_ids_query.into(),
            after_cursor_query: after_cursor_query.into(),
            page_size,
        }
    }

    /// Fetches the records whose id is in `ids`.
    ///
    /// An empty `ids` returns an empty result without querying: a filter on
    /// an empty list would be malformed.
    pub async fn fetch_by_ids(&self, ids: &[EntityId]) -> SyncResult<ItemsResult> {
        if ids.is_empty() {
            return Ok(ItemsResult::empty());
        }

        debug!(count = ids.len(), "Fetching items by id");

        let id_list: Vec<Json> = ids.iter().map(|id| Json::from(&id.to_value())).collect();
        let mut variables = Variables::new();
        variables.insert("first".into(), json!(self.page_size));
        variables.insert(ID_LIST_VARIABLE.into(), Json::Array(id_list));

        self.paginator.paginate(&self.by_ids_query, variables).await
    }

    /// Fetches every record after `after` (`None` = from the beginning).
    pub async fn fetch_all_after_cursor(&self, after: Option<&Cursor>) -> SyncResult<ItemsResult> {
        debug!(after = ?after, "Fetching all items after cursor");

        let mut variables = Variables::new();
        variables.insert("first".into(), json!(self.page_size));
        variables.insert(
            AFTER_VARIABLE.into(),
            after.map_or(Json::Null, |c| Json::String(c.as_str().to_string())),
        );

        self.paginator.paginate(&self.after_cursor_query, variables).await
    }
}
