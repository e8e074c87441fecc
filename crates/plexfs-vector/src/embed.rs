//! Embedding-service capability interface.

use async_trait::async_trait;
use plexfs_types::FsResult;

/// Opaque embedding provider.
///
/// The vector dimension is fixed per provider instance and must match the
/// dimension declared when a namespace is created.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> FsResult<Vec<f32>>;

    /// Embed a batch of texts in one request.
    ///
    /// The default implementation embeds sequentially; providers with a
    /// batch endpoint should override it.
    async fn embed_batch(&self, texts: &[String]) -> FsResult<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Dimension of every vector this provider produces.
    fn dimension(&self) -> usize;
}
