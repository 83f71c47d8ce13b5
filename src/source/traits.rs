use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use thiserror::Error;

/// Stream of body chunks as delivered by the source.
pub type ChunkStream = BoxStream<'static, Result<Bytes, SourceError>>;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status: HTTP {status}")]
    Status { status: u16 },
    #[error("body read failed: {0}")]
    Read(String),
}

/// An opened source body: declared length, if any, plus the chunk stream.
pub struct SourceBody {
    pub total_bytes: Option<u64>,
    pub chunks: ChunkStream,
}

// Manual impl: the chunk stream is opaque, so only the length is shown.
impl fmt::Debug for SourceBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceBody")
            .field("total_bytes", &self.total_bytes)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait DataSource: Send + Sync {
    async fn open(&self, url: &str) -> Result<SourceBody, SourceError>;
}
