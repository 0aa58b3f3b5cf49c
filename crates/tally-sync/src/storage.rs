//! # Blob Storage
//!
//! Durable named-blob writes into the data lake.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  <root>/                                                               │
//! │  └── <container>/                       one data lake                  │
//! │      ├── customers/                     one namespace per entity type  │
//! │      │   ├── full_sync-2024-05-01T13-00-00.000Z-customers.parquet      │
//! │      │   └── sync_changes-2024-05-01T14-00-00.000Z-customers.parquet   │
//! │      └── balance/                       reports use their name         │
//! │          └── 2024-05-01T13-00-00.000Z-balance.json                     │
//! │                                                                         │
//! │  WRITE PROTOCOL                                                        │
//! │  1. create <container>/<namespace>/ if absent                          │
//! │  2. write bytes to a hidden temp file in the same directory            │
//! │  3. fsync, then rename onto the final name                             │
//! │  A failed write never leaves a partial blob under the final name.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Blob Store Trait
// =============================================================================

/// Durable blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` as `name` under `namespace`, creating the container
    /// and namespace if absent.
    ///
    /// ## Returns
    /// The location of the written blob, for logging.
    async fn write_blob(&self, namespace: &str, name: &str, bytes: Vec<u8>) -> SyncResult<String>;

    /// Deletes every blob of `namespace`, or of every namespace when `None`.
    /// Idempotent.
    ///
    /// ## Returns
    /// Number of namespaces removed.
    async fn delete_all(&self, namespace: Option<&str>) -> SyncResult<usize>;
}

// =============================================================================
// Filesystem Store
// =============================================================================

/// Whether `segment` names exactly one directory entry below its parent.
pub fn is_plain_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains(['/', '\\'])
}

/// Blob store on a local or mounted filesystem.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    container: PathBuf,
}

impl FsBlobStore {
    /// ## Arguments
    /// * `root` - Directory holding the containers
    /// * `container` - Directory of this data lake under `root`
    pub fn new(root: impl AsRef<Path>, container: &str) -> Self {
        FsBlobStore {
            container: root.as_ref().join(container),
        }
    }

    /// Directory of the container.
    pub fn container_path(&self) -> &Path {
        &self.container
    }

    fn checked_segment<'a>(kind: &str, segment: &'a str) -> SyncResult<&'a str> {
        if is_plain_segment(segment) {
            Ok(segment)
        } else {
            Err(SyncError::Storage(format!("Invalid {} '{}'", kind, segment)))
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn write_blob(&self, namespace: &str, name: &str, bytes: Vec<u8>) -> SyncResult<String> {
        let namespace = Self::checked_segment("namespace", namespace)?;
        let name = Self::checked_segment("blob name", name)?;

        let dir = self.container.join(namespace);
        tokio::fs::create_dir_all(&dir).await?;

        let target = dir.join(name);
        let temp = dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4()));

        let written = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            tokio::fs::rename(&temp, &target).await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
                debug!(error = %cleanup, "Temp file cleanup failed");
            }
            return Err(e.into());
        }

        debug!(path = %target.display(), size = bytes.len(), "Blob written");
        Ok(format!("{}/{}", namespace, name))
    }

    async fn delete_all(&self, namespace: Option<&str>) -> SyncResult<usize> {
        if let Some(namespace) = namespace {
            let dir = self.container.join(Self::checked_segment("namespace", namespace)?);
            return match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => {
                    info!(namespace = %namespace, "Namespace wiped");
                    Ok(1)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
                Err(e) => Err(e.into()),
            };
        }

        let mut entries = match tokio::fs::read_dir(&self.container).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.container.display(), "Container absent, nothing to wipe");
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
                removed += 1;
            } else {
                warn!(path = %path.display(), "Removing stray file in container");
                tokio::fs::remove_file(&path).await?;
            }
        }

        info!(namespaces = removed, "Container wiped");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_directories() {
        let root = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(root.path(), "ledger");

        let location = store
            .write_blob("customers", "full_sync-x-customers.parquet", b"PAR1".to_vec())
            .await
            .unwrap();
        assert_eq!(location, "customers/full_sync-x-customers.parquet");

        let path = root.path().join("ledger/customers/full_sync-x-customers.parquet");
        assert_eq!(std::fs::read(path).unwrap(), b"PAR1");

        // No temp files left behind
        let entries: Vec<_> = std::fs::read_dir(root.path().join("ledger/customers"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_path_segments() {
        let root = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(root.path(), "ledger");

        let err = store
            .write_blob("../escape", "a.parquet", Vec::new())
            .await
            .unwrap_err();
        assert!(err.is_storage_error());
    }

    #[tokio::test]
    async fn test_delete_all_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(root.path(), "ledger");

        // Never written: no-op
        assert_eq!(store.delete_all(None).await.unwrap(), 0);

        store.write_blob("customers", "a.parquet", vec![1]).await.unwrap();
        store.write_blob("projects", "b.parquet", vec![2]).await.unwrap();

        assert_eq!(store.delete_all(Some("projects")).await.unwrap(), 1);
        assert_eq!(store.delete_all(Some("projects")).await.unwrap(), 0);

        assert_eq!(store.delete_all(None).await.unwrap(), 1);
        assert_eq!(store.delete_all(None).await.unwrap(), 0);
        assert!(store.container_path().exists());
    }
}
