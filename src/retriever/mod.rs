
use std::sync::Arc;

use tracing::debug;

use crate::Result;
use crate::embeddings::Embedder;
use crate::index::{RetrievalResult, VectorIndex};

/// Embeds queries and searches the shared index
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    #[inline]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// The `k` passages most relevant to `query`
    #[inline]
    pub fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        let vector = self.embedder.embed(query)?;
        let result = self.index.search(&vector, k)?;
        debug!("Retrieved {} passages for query {:?}", result.len(), query);
        Ok(result)
    }

    /// Retrieve with a query that differs from what the user typed
    #[inline]
    pub fn retrieve_with_query_override(
        &self,
        effective_query: &str,
        k: usize,
    ) -> Result<RetrievalResult> {
        debug!("Re-querying with {:?}", effective_query);
        self.retrieve(effective_query, k)
    }
}
