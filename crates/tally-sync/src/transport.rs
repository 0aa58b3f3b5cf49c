//! # GraphQL Transport
//!
//! Executes one GraphQL request and decodes one page of a connection.
//!
//! ## Request / Response
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  POST <endpoint>                                                       │
//! │  Authorization: token <api_key>                                        │
//! │  { "query": "...", "variables": { "first": 10000, "after": null } }   │
//! │                                                                         │
//! │  200 OK                                                                │
//! │  { "data": { "<collection>": {                                         │
//! │        "edges": [ { "node": {..}, "cursor": "c1" }, .. ],              │
//! │        "pageInfo": { "hasNextPage": true } } } }                       │
//! │                                                                         │
//! │  RETRIES (inside one request, never across a cycle)                    │
//! │  ──────────────────────────────────────────────────                    │
//! │  network error / timeout / 429 / 5xx  → exponential backoff, up to     │
//! │                                         max_retries                     │
//! │  4xx / `errors` array / bad body      → fail immediately               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use serde_json::{json, Value as Json};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::ApiSettings;
use crate::error::{SyncError, SyncResult};
use tally_core::{Cursor, Edge, PageResult, Value};

/// GraphQL variables of one request.
pub type Variables = serde_json::Map<String, Json>;

// =============================================================================
// Transport Trait
// =============================================================================

/// Executes a single GraphQL request against a connection-shaped query.
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    async fn execute(&self, query: &str, variables: &Variables) -> SyncResult<PageResult>;
}

// =============================================================================
// Response Decoding
// =============================================================================

/// Decodes a GraphQL response body into a page.
///
/// The connection is the first field of `data`. A non-empty `errors` array
/// fails the whole request, even when partial data is present.
pub fn parse_page(body: Json) -> SyncResult<PageResult> {
    if let Some(errors) = body.get("errors").and_then(Json::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .map(|e| e.get("message").and_then(Json::as_str).unwrap_or("unknown error"))
                .collect();
            return Err(SyncError::GraphQl(messages.join("; ")));
        }
    }

    let connection = body
        .get("data")
        .and_then(Json::as_object)
        .and_then(|data| data.values().next())
        .ok_or_else(|| SyncError::GraphQl("Response has no data".into()))?;

    let edges = connection
        .get("edges")
        .and_then(Json::as_array)
        .ok_or_else(|| SyncError::GraphQl("Connection has no edges".into()))?;

    let edges = edges
        .iter()
        .map(|edge| Edge {
            node: edge.get("node").cloned().map(Value::from).unwrap_or_default(),
            cursor: edge.get("cursor").and_then(Json::as_str).map(Cursor::from),
        })
        .collect();

    let has_next_page = connection
        .get("pageInfo")
        .and_then(|info| info.get("hasNextPage"))
        .and_then(Json::as_bool)
        .unwrap_or(false);

    Ok(PageResult {
        edges,
        has_next_page,
    })
}

// =============================================================================
// HTTP Client
// =============================================================================

/// Settings of the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub endpoint: Url,
    pub api_key: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl HttpClientConfig {
    pub fn from_settings(settings: &ApiSettings) -> SyncResult<Self> {
        Ok(HttpClientConfig {
            endpoint: Url::parse(&settings.endpoint)?,
            api_key: settings.api_key.clone(),
            timeout: settings.timeout(),
            max_retries: settings.max_retries,
            initial_backoff: Duration::from_millis(settings.initial_backoff_ms),
            max_backoff: Duration::from_secs(settings.max_backoff_secs),
        })
    }
}

/// GraphQL over HTTP with bounded retries of transient failures.
#[derive(Debug, Clone)]
pub struct HttpGraphQlClient {
    client: reqwest::Client,
    config: HttpClientConfig,
}

impl HttpGraphQlClient {
    pub fn new(config: HttpClientConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SyncError::Configuration(format!("Cannot build HTTP client: {}", e)))?;

        Ok(HttpGraphQlClient { client, config })
    }

    /// The underlying HTTP client, shared with report export.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.initial_backoff)
            .with_max_interval(self.config.max_backoff)
            .with_multiplier(2.0)
            .with_max_elapsed_time(None) // bounded by max_retries instead
            .build()
    }

    async fn post_once(&self, body: &Json) -> SyncResult<PageResult> {
        let response = self
            .client
            .post(self.config.endpoint.clone())
            .header("Authorization", format!("token {}", self.config.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SyncError::Timeout(self.config.timeout.as_secs())
                } else {
                    SyncError::from(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("HTTP {}: {}", status, text);
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                SyncError::Transport(message)
            } else {
                SyncError::GraphQl(message)
            });
        }

        let json: Json = response.json().await?;
        parse_page(json)
    }
}

#[async_trait]
impl GraphQlTransport for HttpGraphQlClient {
    async fn execute(&self, query: &str, variables: &Variables) -> SyncResult<PageResult> {
        let body = json!({ "query": query, "variables": variables });
        let mut backoff = self.create_backoff();
        let mut attempt: u32 = 0;

        loop {
            match self.post_once(&body).await {
                Ok(page) => {
                    debug!(edges = page.edges.len(), has_next_page = page.has_next_page, "Page received");
                    return Ok(page);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff.next_backoff().unwrap_or(self.config.max_backoff);
                    warn!(error = %e, attempt, ?delay, "GraphQL request failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
