// Pipeline assembly
// Wires config into the shared embedder, index, retriever, composer and indexer

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tracing::info;

use crate::Result;
use crate::answer::{AnswerComposer, OllamaComposer, TemplateComposer};
use crate::config::{AnswerBackend, Config};
use crate::database::{LanceSnapshotStore, SnapshotStore};
use crate::embeddings::{Embedder, OllamaClient, embedder_from_config};
use crate::index::VectorIndex;
use crate::indexer::Indexer;
use crate::retriever::Retriever;
use crate::session::ChatSession;

/// Shared components every chat session is created from
pub struct RagPipeline {
    config: Config,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    retriever: Arc<Retriever>,
    composer: Arc<dyn AnswerComposer>,
    indexer: Arc<Indexer>,
}

impl RagPipeline {
    /// Assemble the pipeline with the Lance store under `[storage] index_path`
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let store = LanceSnapshotStore::open(config.index_path()).await?;
        Self::with_store(config, Arc::new(store))
    }

    #[inline]
    pub fn with_store(config: &Config, store: Arc<dyn SnapshotStore>) -> Result<Self> {
        let embedder = embedder_from_config(config)?;
        Self::with_components(config, embedder, store)
    }

    #[inline]
    pub fn with_components(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn SnapshotStore>,
    ) -> Result<Self> {
        let index = Arc::new(VectorIndex::new(store, config.storage.index_id.clone()));
        let retriever = Arc::new(Retriever::new(Arc::clone(&embedder), Arc::clone(&index)));

        let composer: Arc<dyn AnswerComposer> = match config.generation.backend {
            AnswerBackend::Templates => Arc::new(TemplateComposer::new(
                Arc::clone(&retriever),
                config.retrieval.k,
                config.retrieval.entity_fallback,
            )),
            AnswerBackend::Ollama => Arc::new(OllamaComposer::new(
                OllamaClient::new(config)?,
                config.generation.model.clone(),
                config.generation.temperature,
            )),
        };

        let indexer = Arc::new(Indexer::new(
            config,
            Arc::clone(&embedder),
            Arc::clone(&index),
        )?);

        info!(
            "Pipeline assembled: embedder {}, {} composer, k = {}",
            embedder.model_id(),
            composer.name(),
            config.retrieval.k
        );

        Ok(Self {
            config: config.clone(),
            embedder,
            index,
            retriever,
            composer,
            indexer,
        })
    }

    /// Show an embedding progress bar during index builds
    ///
    /// Only takes effect before the first session is created.
    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        if let Some(indexer) = Arc::get_mut(&mut self.indexer) {
            indexer.set_progress(show_progress);
        }
        self
    }

    /// A fresh, uninitialized session sharing this pipeline's components
    #[inline]
    pub fn session(&self) -> ChatSession {
        ChatSession::new(
            Arc::clone(&self.indexer),
            Arc::clone(&self.retriever),
            Arc::clone(&self.composer),
            self.config.retrieval.k,
        )
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    #[inline]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    #[inline]
    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    #[inline]
    pub fn composer(&self) -> &Arc<dyn AnswerComposer> {
        &self.composer
    }

    #[inline]
    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }
}
