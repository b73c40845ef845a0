use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use super::types::{CompletionRequest, ProviderError};

/// Raw response body chunks, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<Bytes, ProviderError>>;

#[async_trait]
pub trait CompletionTransport: Send + Sync {
    /// Send a streaming request. Fails with `RequestFailed` on a non-success status.
    async fn open_stream(&self, request: &CompletionRequest) -> Result<ChunkStream, ProviderError>;

    /// Send a non-streaming request and return the reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;
}
