// Embeddings module
// Chunking plus the embedding backends: Ollama over HTTP and an offline hashing embedder

pub mod chunking;
pub mod hashing;
pub mod ollama;

pub use chunking::{Chunk, Chunker, ChunkingConfig};
pub use hashing::HashingEmbedder;
pub use ollama::OllamaClient;

use std::sync::Arc;

use crate::Result;
use crate::config::{Config, EmbeddingBackend};

/// Maps text to fixed-length vectors
///
/// Implementations are deterministic for a fixed model and keep a constant
/// dimension for their whole lifetime. A backend that cannot produce a vector
/// returns [`crate::RagError::EmbeddingUnavailable`].
pub trait Embedder: Send + Sync {
    /// Identifier recorded in index manifests
    fn model_id(&self) -> String;

    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    #[inline]
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Build the embedder selected by `[embedding] backend`
#[inline]
pub fn embedder_from_config(config: &Config) -> Result<Arc<dyn Embedder>> {
    match config.embedding.backend {
        EmbeddingBackend::Ollama => Ok(Arc::new(OllamaClient::new(config)?)),
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.embedding.dimension as usize,
        )?)),
    }
}
