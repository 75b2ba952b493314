use async_trait::async_trait;

use crate::error::StoreResult;

/// Trait for the external document-digitization + embedding provider.
///
/// A pure pass-through client: there is no local parsing fallback, and
/// failures are always attributed upstream.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embedding dimension produced by the configured model
    fn dimension(&self) -> u32;

    /// Embed a search query (query-side model)
    async fn embed_query(&self, text: &str) -> StoreResult<Vec<f32>>;

    /// Embed passages in batch, order preserved (passage-side model)
    async fn embed_passages(&self, texts: &[String]) -> StoreResult<Vec<Vec<f32>>>;

    /// Digitize a raw file into ordered page texts
    async fn digitize(&self, file_bytes: Vec<u8>, filename: &str) -> StoreResult<Vec<String>>;
}
