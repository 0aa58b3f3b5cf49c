//! # Paginated Query Executor
//!
//! Drives a connection query page by page until the source is exhausted.
//!
//! ```text
//!   variables { first, after: null }
//!        │
//!        ▼
//!   ┌──────────┐  edges + hasNextPage   ┌──────────────────┐
//!   │ execute  │ ─────────────────────► │ accumulate nodes │
//!   └──────────┘                        └────────┬─────────┘
//!        ▲                                       │
//!        │  after = cursor of last edge          │ hasNextPage && edges
//!        └───────────────────────────────────────┘
//!
//!   Stops on: hasNextPage == false, an empty page, or a cursor that did
//!   not advance. Any failed page aborts the whole run.
//! ```

use serde_json::Value as Json;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::transport::{GraphQlTransport, Variables};
use tally_core::{Edge, ItemsResult};

/// Name of the forward pagination variable.
pub const AFTER_VARIABLE: &str = "after";

/// Repeatedly executes a connection query, following `after` cursors.
#[derive(Clone)]
pub struct Paginator {
    transport: Arc<dyn GraphQlTransport>,
}

impl Paginator {
    pub fn new(transport: Arc<dyn GraphQlTransport>) -> Self {
        Paginator { transport }
    }

    /// Runs `query` to exhaustion and returns every node in arrival order.
    ///
    /// ## Arguments
    /// * `query` - Connection query taking an `$after` variable
    /// * `variables` - Initial variables; `after` is overwritten per page
    ///
    /// ## Returns
    /// The accumulated nodes and the cursor of the last one (`None` when no
    /// node was returned).
    pub async fn paginate(&self, query: &str, mut variables: Variables) -> SyncResult<ItemsResult> {
        let mut edges: Vec<Edge> = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = self.transport.execute(query, &variables).await?;
            pages += 1;

            if page.edges.is_empty() {
                break;
            }

            let has_next_page = page.has_next_page;
            let next_cursor = page.last_cursor().cloned();
            edges.extend(page.edges);

            if !has_next_page {
                break;
            }

            let current = variables.get(AFTER_VARIABLE).and_then(Json::as_str);
            match next_cursor {
                Some(cursor) if current != Some(cursor.as_str()) => {
                    variables.insert(AFTER_VARIABLE.to_string(), Json::String(cursor.into_inner()));
                }
                _ => {
                    warn!(pages, "Page cursor did not advance, stopping pagination");
                    break;
                }
            }
        }

        debug!(pages, nodes = edges.len(), "Pagination complete");
        Ok(ItemsResult::from_edges(edges))
    }
}
