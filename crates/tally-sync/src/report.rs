//! # Report Export
//!
//! Copies a JSON report document into the data lake on every schedule tick.
//!
//! ```text
//!   GET <url> ──► 2xx ──► parse JSON ──► <name>/<ts>-<name>.json
//!            └──► other status ──► warn, nothing written
//! ```

use serde_json::Value as Json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::ReportConfig;
use crate::error::{SyncError, SyncResult};
use crate::storage::BlobStore;
use tally_core::filename_timestamp;

/// Result of one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    Written { blob: String },
    Skipped { status: u16 },
}

/// Fetches report documents and stores them verbatim.
#[derive(Clone)]
pub struct ReportExporter {
    client: reqwest::Client,
    blobs: Arc<dyn BlobStore>,
}

impl ReportExporter {
    /// ## Arguments
    /// * `client` - Shared HTTP client (timeouts already configured)
    /// * `blobs` - Destination data lake
    pub fn new(client: reqwest::Client, blobs: Arc<dyn BlobStore>) -> Self {
        ReportExporter { client, blobs }
    }

    /// Fetches and stores one report.
    ///
    /// A non-success status is logged and skipped; it is not an error.
    pub async fn export(&self, report: &ReportConfig) -> SyncResult<ReportOutcome> {
        let response = self.client.get(&report.url).send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        self.handle_response(report, status, &body).await
    }

    /// Stores `body` when `status` is a success.
    pub async fn handle_response(
        &self,
        report: &ReportConfig,
        status: u16,
        body: &[u8],
    ) -> SyncResult<ReportOutcome> {
        if !(200..300).contains(&status) {
            warn!(report = %report.name, status, "Report fetch failed, skipping");
            return Ok(ReportOutcome::Skipped { status });
        }

        let document: Json = serde_json::from_slice(body)
            .map_err(|e| SyncError::Serialization(format!("Report '{}' is not JSON: {}", report.name, e)))?;
        let bytes = serde_json::to_vec(&document)?;

        let name = format!(
            "{}-{}.json",
            filename_timestamp(chrono::Utc::now()),
            report.name
        );
        let blob = self.blobs.write_blob(&report.name, &name, bytes).await?;

        info!(report = %report.name, blob = %blob, "Report exported");
        Ok(ReportOutcome::Written { blob })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        writes: Mutex<Vec<(String, String, Vec<u8>)>>,
    }

    #[async_trait]
    impl BlobStore for Recording {
        async fn write_blob(&self, namespace: &str, name: &str, bytes: Vec<u8>) -> SyncResult<String> {
            self.writes
                .lock()
                .await
                .push((namespace.to_string(), name.to_string(), bytes));
            Ok(format!("{}/{}", namespace, name))
        }

        async fn delete_all(&self, _namespace: Option<&str>) -> SyncResult<usize> {
            Ok(0)
        }
    }

    fn report() -> ReportConfig {
        ReportConfig {
            name: "balance".into(),
            url: "https://reports.example.com/balance.json".into(),
        }
    }

    #[tokio::test]
    async fn test_success_writes_document() {
        let blobs = Arc::new(Recording::default());
        let exporter = ReportExporter::new(reqwest::Client::new(), blobs.clone());

        let outcome = exporter
            .handle_response(&report(), 200, br#"{ "rows": [1, 2] }"#)
            .await
            .unwrap();

        let writes = blobs.writes.lock().await;
        assert_eq!(writes.len(), 1);
        let (namespace, name, bytes) = &writes[0];
        assert_eq!(namespace, "balance");
        assert!(name.ends_with("-balance.json"));
        assert_eq!(
            serde_json::from_slice::<Json>(bytes).unwrap(),
            serde_json::json!({ "rows": [1, 2] })
        );
        assert_eq!(
            outcome,
            ReportOutcome::Written {
                blob: format!("balance/{}", name)
            }
        );
    }

    #[tokio::test]
    async fn test_failure_status_is_skipped() {
        let blobs = Arc::new(Recording::default());
        let exporter = ReportExporter::new(reqwest::Client::new(), blobs.clone());

        let outcome = exporter
            .handle_response(&report(), 503, b"unavailable")
            .await
            .unwrap();

        assert_eq!(outcome, ReportOutcome::Skipped { status: 503 });
        assert!(blobs.writes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_json_is_error() {
        let blobs = Arc::new(Recording::default());
        let exporter = ReportExporter::new(reqwest::Client::new(), blobs.clone());

        let err = exporter
            .handle_response(&report(), 200, b"<html>")
            .await
            .unwrap_err();
        assert!(err.is_serialization_error());
        assert!(blobs.writes.lock().await.is_empty());
    }
}
