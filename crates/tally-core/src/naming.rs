//! # Output Blob Names
//!
//! File naming contract for downstream consumers of the data lake.
//!
//! ```text
//!   full_sync-2024-05-01T13-00-00.000Z-customers.parquet
//!   sync_changes-2024-05-01T14-00-00.250Z-customers.parquet
//!   └───┬────┘ └───────────┬──────────┘ └───┬───┘ └──┬──┘
//!     kind          UTC timestamp         entity     ext
//! ```

use chrono::{DateTime, Utc};

/// Extension of the columnar blobs.
pub const PARQUET_EXTENSION: &str = "parquet";

/// Timestamp layout used in blob names (no `:` so it is filename safe).
///
/// Millisecond precision keeps back-to-back cycles of one entity apart.
pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.3fZ";

/// Which cycle produced a blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobKind {
    FullSync,
    SyncChanges,
}

impl BlobKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            BlobKind::FullSync => "full_sync",
            BlobKind::SyncChanges => "sync_changes",
        }
    }
}

/// Formats a timestamp for use in a file name.
pub fn filename_timestamp(at: DateTime<Utc>) -> String {
    at.format(FILENAME_TIMESTAMP_FORMAT).to_string()
}

/// `<kind>-<timestamp>-<entity>.<ext>`
pub fn blob_name(kind: BlobKind, at: DateTime<Utc>, entity: &str, extension: &str) -> String {
    format!(
        "{}-{}-{}.{}",
        kind.prefix(),
        filename_timestamp(at),
        entity,
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_blob_names() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 13, 7, 9).unwrap();
        assert_eq!(
            blob_name(BlobKind::FullSync, at, "customers", PARQUET_EXTENSION),
            "full_sync-2024-05-01T13-07-09.000Z-customers.parquet"
        );
        assert_eq!(
            blob_name(BlobKind::SyncChanges, at, "timesheets", PARQUET_EXTENSION),
            "sync_changes-2024-05-01T13-07-09.000Z-timesheets.parquet"
        );
    }

    #[test]
    fn test_same_second_names_differ() {
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 13, 7, 9).unwrap();
        let second = Utc.timestamp_millis_opt(first.timestamp_millis() + 40).unwrap();
        assert_eq!(filename_timestamp(second), "2024-05-01T13-07-09.040Z");
        assert_ne!(
            blob_name(BlobKind::FullSync, first, "customers", PARQUET_EXTENSION),
            blob_name(BlobKind::FullSync, second, "customers", PARQUET_EXTENSION)
        );
    }
}
