//! Object storage seam

use crate::error::SinkError;
use async_trait::async_trait;
use bytes::Bytes;

/// Write side of a remote object store.
///
/// One call stores one whole object. Implementations decide visibility
/// (the S3 implementation always writes public-read objects) and must be
/// safe to call from many transfer units at once.
#[async_trait]
pub trait ObjectSink: Send + Sync {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> Result<(), SinkError>;
}
