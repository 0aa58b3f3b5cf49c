//! # Sync Error Types
//!
//! Error types for replication cycles.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Storage             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Configuration  │  │  Transport      │  │  StoragePermission      │ │
//! │  │  MissingDelta.. │  │  GraphQl        │  │  StorageTransient       │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  Storage                │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │  Serialization  │  │     State       │                              │
//! │  │                 │  │                 │                              │
//! │  │  Serialization  │  │  State          │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! │                                                                         │
//! │  Every variant aborts the cycle before the state commit. The engine    │
//! │  never retries; the caller (scheduler) decides.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible cycle failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Incremental sync requested on an engine built without a delta source.
    #[error("Incremental sync for '{entity}' requires a delta source")]
    MissingDeltaSource { entity: String },

    /// Invalid endpoint URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Network or HTTP failure talking to the GraphQL source.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The GraphQL source answered with an `errors` array or a malformed body.
    #[error("GraphQL error: {0}")]
    GraphQl(String),

    /// Request timed out.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The blob store refused the operation.
    #[error("Storage permission denied: {0}")]
    StoragePermission(String),

    /// A blob store failure that may succeed on retry.
    #[error("Transient storage failure: {0}")]
    StorageTransient(String),

    /// Any other blob store failure.
    #[error("Storage error: {0}")]
    Storage(String),

    // =========================================================================
    // Serialization Errors
    // =========================================================================
    /// Row projection or columnar encoding failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // State Errors
    // =========================================================================
    /// Reading or writing the persisted sync state failed.
    #[error("State store error: {0}")]
    State(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<tally_db::DbError> for SyncError {
    fn from(err: tally_db::DbError) -> Self {
        SyncError::State(err.to_string())
    }
}

impl From<tally_core::CoreError> for SyncError {
    fn from(err: tally_core::CoreError) -> Self {
        use tally_core::CoreError;
        match err {
            CoreError::UnbalancedBraces { .. }
            | CoreError::OrphanSelection { .. }
            | CoreError::UnexpectedCharacter { .. } => SyncError::Configuration(err.to_string()),
            other => SyncError::Serialization(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Transport(format!("timed out: {}", err))
        } else if err.is_decode() {
            SyncError::GraphQl(err.to_string())
        } else {
            SyncError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for SyncError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<arrow_schema::ArrowError> for SyncError {
    fn from(err: arrow_schema::ArrowError) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => SyncError::StoragePermission(err.to_string()),
            _ => SyncError::StorageTransient(err.to_string()),
        }
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::Configuration(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if this error may go away when the cycle is re-run.
    ///
    /// ## Retryable Errors
    /// - Network failures and timeouts
    /// - Transient storage failures
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - GraphQL errors (malformed query, auth)
    /// - Permission errors
    /// - Serialization errors
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::Timeout(_) | SyncError::StorageTransient(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::Configuration(_)
                | SyncError::MissingDeltaSource { .. }
                | SyncError::InvalidUrl(_)
        )
    }

    /// Returns true if the GraphQL source could not be queried.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            SyncError::Transport(_) | SyncError::GraphQl(_) | SyncError::Timeout(_)
        )
    }

    /// Returns true if the blob store failed.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            SyncError::StoragePermission(_) | SyncError::StorageTransient(_) | SyncError::Storage(_)
        )
    }

    /// Returns true if rows could not be projected or encoded.
    pub fn is_serialization_error(&self) -> bool {
        matches!(self, SyncError::Serialization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert!(SyncError::Timeout(30).is_transport_error());
        assert!(SyncError::GraphQl("bad".into()).is_transport_error());
        assert!(SyncError::MissingDeltaSource { entity: "x".into() }.is_config_error());
        assert!(SyncError::StoragePermission("no".into()).is_storage_error());
        assert!(SyncError::Serialization("shape".into()).is_serialization_error());
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Transport("reset".into()).is_retryable());
        assert!(SyncError::StorageTransient("busy".into()).is_retryable());

        assert!(!SyncError::GraphQl("syntax".into()).is_retryable());
        assert!(!SyncError::StoragePermission("denied".into()).is_retryable());
        assert!(!SyncError::Configuration("missing".into()).is_retryable());
    }

    #[test]
    fn test_io_error_mapping() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(SyncError::from(denied), SyncError::StoragePermission(_)));

        let full = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert!(matches!(SyncError::from(full), SyncError::StorageTransient(_)));
    }

    #[test]
    fn test_core_error_mapping() {
        let selection = tally_core::CoreError::UnbalancedBraces { offset: 3 };
        assert!(SyncError::from(selection).is_config_error());

        let kind = tally_core::CoreError::UnknownMutationKind("MOVED".into());
        assert!(SyncError::from(kind).is_serialization_error());
    }
}
