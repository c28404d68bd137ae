//! Staging object store abstraction.
//!
//! The staging store is a key/value blob interface: `list` a prefix,
//! `get` an object, `put` an object. Staged table payloads and the
//! watermark marker both live behind this trait; real backends (S3, GCS,
//! local disk) implement it, and [`MemoryBackend`] serves tests.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Metadata about a staged object.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    /// Object key (path-like string).
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
    /// Last modification timestamp.
    pub last_modified: DateTime<Utc>,
}

/// Object storage backend for the staging store.
///
/// **Ordering**: `list` results are returned in whatever order the backend
/// produces; callers must not rely on ordering across keys.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads an entire object.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if the object doesn't exist, or
    /// `Error::Retrieval` if the store is unreachable.
    async fn get(&self, key: &str) -> Result<Bytes>;

    /// Writes an object unconditionally (last-writer-wins).
    ///
    /// # Errors
    ///
    /// Returns `Error::Retrieval` if the store rejects the write.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Lists objects under the given prefix.
    ///
    /// Returns an empty vec if no objects match.
    ///
    /// # Errors
    ///
    /// Returns `Error::Listing` if the store cannot be listed.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;
}

/// In-memory storage backend for testing.
///
/// Thread-safe via `RwLock`. Not suitable for production.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes an object with a caller-chosen modification time.
    ///
    /// Tests use this to place objects on either side of a watermark.
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the backing lock is poisoned.
    pub fn put_at(&self, key: &str, data: Bytes, last_modified: DateTime<Utc>) -> Result<()> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| Error::internal("lock poisoned"))?;
        objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Bytes> {
        let objects = self
            .objects
            .read()
            .map_err(|_| Error::internal("lock poisoned"))?;

        objects
            .get(key)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::NotFound(format!("object not found: {key}")))
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        self.put_at(key, data, Utc::now())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self
            .objects
            .read()
            .map_err(|_| Error::internal("lock poisoned"))?;

        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(key, obj)| ObjectMeta {
                key: key.clone(),
                size: obj.data.len() as u64,
                last_modified: obj.last_modified,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello");

        backend
            .put("dim_currency.parquet", data.clone())
            .await
            .expect("put should succeed");

        let retrieved = backend
            .get("dim_currency.parquet")
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get("absent").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_prefix() {
        let backend = MemoryBackend::new();
        backend.put("a/1.parquet", Bytes::new()).await.unwrap();
        backend.put("a/2.parquet", Bytes::new()).await.unwrap();
        backend.put("b/1.parquet", Bytes::new()).await.unwrap();

        let listed = backend.list("a/").await.expect("list should succeed");
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn put_at_controls_last_modified() {
        let backend = MemoryBackend::new();
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        backend
            .put_at("old.parquet", Bytes::new(), ts)
            .expect("put_at should succeed");

        let listed = backend.list("").await.expect("list should succeed");
        assert_eq!(listed[0].last_modified, ts);
    }
}
