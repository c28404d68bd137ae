//! Stage reader: staged object fetch + materialization.
//!
//! Fetches one staged object and deserializes it into a [`Frame`]. Both
//! failure modes propagate: a missing/unreachable object is a retrieval
//! fault and a corrupt payload is a decode fault. Neither is skipped,
//! because a skipped file would fall permanently behind the advancing
//! watermark.

use silt_core::error::Result;
use silt_core::frame::Frame;
use silt_core::storage::StorageBackend;

use crate::codec;

/// Fetches and decodes one staged object.
///
/// # Errors
///
/// Returns `Error::NotFound`/`Error::Retrieval` if the object cannot be
/// fetched, or `Error::Decode` if the bytes are not a valid payload.
pub async fn read_frame(storage: &dyn StorageBackend, key: &str) -> Result<Frame> {
    let bytes = storage.get(key).await?;
    let frame = codec::decode_frame(&bytes)?;
    tracing::debug!(key, rows = frame.num_rows(), "materialized staged object");
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use silt_core::error::Error;
    use silt_core::frame::Value;
    use silt_core::storage::MemoryBackend;

    #[tokio::test]
    async fn reads_staged_frame() {
        let backend = MemoryBackend::new();
        let frame = Frame::new(
            vec!["currency_id".into(), "code".into()],
            vec![vec![Value::Int(1), Value::Text("GBP".into())]],
        )
        .expect("valid frame");
        backend
            .put(
                "dim_currency.parquet",
                codec::encode_frame(&frame).expect("encode"),
            )
            .await
            .expect("put");

        let read = read_frame(&backend, "dim_currency.parquet")
            .await
            .expect("read");
        assert_eq!(read, frame);
    }

    #[tokio::test]
    async fn missing_object_propagates() {
        let backend = MemoryBackend::new();
        let err = read_frame(&backend, "absent.parquet").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn corrupt_payload_is_a_decode_error() {
        let backend = MemoryBackend::new();
        backend
            .put("dim_currency.parquet", Bytes::from_static(b"corrupt"))
            .await
            .expect("put");

        let err = read_frame(&backend, "dim_currency.parquet")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }
}
