//! Watermark marker persistence.
//!
//! The watermark is a single timestamp stored as a small plain-text marker
//! object in the staging store. It is the exclusive lower bound of objects
//! already processed: read once at run start, written once at run end, and
//! owned exclusively by the run orchestrator. Last-writer-wins; no
//! atomicity beyond the store's own put semantics.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};

use silt_core::error::{Error, Result};
use silt_core::storage::StorageBackend;

/// Wire format of the marker content, offset included.
const MARKER_FORMAT: &str = "%Y-%m-%d %H:%M:%S%z";
/// Accepted fallback without an offset; assumed UTC.
const MARKER_FORMAT_NAIVE: &str = "%Y-%m-%d %H:%M:%S";

/// Reads and writes the watermark marker object.
#[derive(Clone)]
pub struct WatermarkStore {
    storage: Arc<dyn StorageBackend>,
    marker_key: String,
}

impl std::fmt::Debug for WatermarkStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatermarkStore")
            .field("marker_key", &self.marker_key)
            .finish_non_exhaustive()
    }
}

impl WatermarkStore {
    /// Creates a store over the given backend and marker key.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, marker_key: impl Into<String>) -> Self {
        Self {
            storage,
            marker_key: marker_key.into(),
        }
    }

    /// The marker object key.
    #[must_use]
    pub fn marker_key(&self) -> &str {
        &self.marker_key
    }

    /// Fetches the current watermark.
    ///
    /// An absent marker means this is the first-ever run and yields `None`.
    /// Any other retrieval fault is surfaced, not swallowed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Retrieval` if the store is unreachable, or
    /// `Error::Decode` if the marker content is not a valid timestamp.
    pub async fn read(&self) -> Result<Option<DateTime<FixedOffset>>> {
        let bytes = match self.storage.get(&self.marker_key).await {
            Ok(bytes) => bytes,
            Err(Error::NotFound(_)) => {
                tracing::info!(marker = %self.marker_key, "no watermark marker, first run");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let text = std::str::from_utf8(&bytes)
            .map_err(|e| Error::decode(format!("watermark marker is not UTF-8: {e}")))?;
        let ts = parse_watermark(text.trim())?;

        tracing::debug!(marker = %self.marker_key, watermark = %ts, "read watermark");
        Ok(Some(ts))
    }

    /// Overwrites the marker with the given timestamp.
    ///
    /// Subsequent `read` calls see the new value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Retrieval` if the store rejects the write.
    pub async fn write(&self, ts: DateTime<Utc>) -> Result<()> {
        let body = ts.format(MARKER_FORMAT).to_string();
        self.storage
            .put(&self.marker_key, Bytes::from(body))
            .await?;
        tracing::info!(marker = %self.marker_key, watermark = %ts, "advanced watermark");
        Ok(())
    }
}

/// Parses marker content: `YYYY-MM-DD HH:MM:SS[±TZ]`.
///
/// A bare timestamp without an offset is assumed UTC.
fn parse_watermark(text: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_str(text, MARKER_FORMAT) {
        return Ok(ts);
    }
    NaiveDateTime::parse_from_str(text, MARKER_FORMAT_NAIVE)
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|e| Error::decode(format!("invalid watermark marker '{text}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use silt_core::storage::{MemoryBackend, ObjectMeta};

    fn store(backend: Arc<MemoryBackend>) -> WatermarkStore {
        WatermarkStore::new(backend, "last_load.txt")
    }

    struct UnreachableBackend;

    #[async_trait]
    impl StorageBackend for UnreachableBackend {
        async fn get(&self, _key: &str) -> Result<Bytes> {
            Err(Error::retrieval("store unreachable"))
        }

        async fn put(&self, _key: &str, _data: Bytes) -> Result<()> {
            Err(Error::retrieval("store unreachable"))
        }

        async fn list(&self, _prefix: &str) -> Result<Vec<ObjectMeta>> {
            Err(Error::listing("store unreachable"))
        }
    }

    #[tokio::test]
    async fn absent_marker_is_first_run() {
        let ws = store(Arc::new(MemoryBackend::new()));
        assert_eq!(ws.read().await.expect("read"), None);
    }

    #[tokio::test]
    async fn write_then_read_roundtrips() {
        let ws = store(Arc::new(MemoryBackend::new()));
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap();

        ws.write(ts).await.expect("write");
        let read = ws.read().await.expect("read").expect("some watermark");
        assert_eq!(read, ts);
    }

    #[tokio::test]
    async fn bare_timestamp_is_assumed_utc() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .put("last_load.txt", Bytes::from("2024-01-01 00:00:00"))
            .await
            .expect("put");

        let read = store(backend)
            .read()
            .await
            .expect("read")
            .expect("some watermark");
        assert_eq!(read, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn storage_fault_is_not_mistaken_for_first_run() {
        let ws = WatermarkStore::new(Arc::new(UnreachableBackend), "last_load.txt");
        let err = ws.read().await.unwrap_err();
        assert!(matches!(err, Error::Retrieval { .. }));
    }

    #[tokio::test]
    async fn garbage_marker_is_a_decode_error() {
        let backend = Arc::new(MemoryBackend::new());
        backend
            .put("last_load.txt", Bytes::from("not a timestamp"))
            .await
            .expect("put");

        let err = store(backend).read().await.unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
