// Indexer module
// Loads the corpus, then either reuses the persisted index or rebuilds it

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::documents::{Document, corpus_fingerprint, load_documents};
use crate::embeddings::Embedder;
use crate::embeddings::chunking::Chunker;
use crate::index::{EmbeddedChunk, IndexManifest, VectorIndex};
use crate::{RagError, Result};

/// Statistics about one index build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    pub documents_loaded: usize,
    pub chunks_created: usize,
    pub embeddings_generated: usize,
    pub duration: Duration,
}

/// How `ensure_index` made the index available
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexOutcome {
    /// The persisted index matched the corpus and configuration
    Loaded { chunk_count: usize },
    Built(IndexingStats),
}

pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    chunker: Chunker,
    documents_path: PathBuf,
    batch_size: usize,
    show_progress: bool,
    /// Held for a whole load or build, so concurrent callers share one build
    build_lock: Mutex<()>,
}

impl Indexer {
    #[inline]
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Result<Self> {
        Ok(Self {
            embedder,
            index,
            chunker: Chunker::new(config.chunking.clone())?,
            documents_path: config.documents_path(),
            batch_size: config.ollama.batch_size.max(1) as usize,
            show_progress: false,
            build_lock: Mutex::new(()),
        })
    }

    /// Draw a progress bar on stderr while embedding, when a user is watching
    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.set_progress(show_progress);
        self
    }

    #[inline]
    pub fn set_progress(&mut self, show_progress: bool) {
        self.show_progress = show_progress;
    }

    #[inline]
    pub fn documents_path(&self) -> &Path {
        &self.documents_path
    }

    #[inline]
    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Make the index searchable, reusing the persisted one when it is still valid
    ///
    /// A persisted index is reused only if its manifest records the current
    /// embedding model, chunking parameters and corpus fingerprint. Storage
    /// errors while checking or loading fall back to a full rebuild.
    #[inline]
    pub async fn ensure_index(&self) -> Result<IndexOutcome> {
        let _build = self.build_lock.lock().await;
        self.load_or_build().await
    }

    /// Like [`Self::ensure_index`], but returns `None` without touching the
    /// store when the shared index is already serving
    ///
    /// The check happens under the build lock, so of several concurrent
    /// callers exactly one loads or builds and the rest see the result.
    #[inline]
    pub async fn ensure_available(&self) -> Result<Option<IndexOutcome>> {
        let _build = self.build_lock.lock().await;
        if self.index.is_built() {
            debug!("Index '{}' already available", self.index.id());
            return Ok(None);
        }
        self.load_or_build().await.map(Some)
    }

    async fn load_or_build(&self) -> Result<IndexOutcome> {
        let documents = self.load_corpus()?;
        let fingerprint = corpus_fingerprint(&documents);
        let model_id = self.embedder.model_id();

        match self.index.stored_manifest().await {
            Ok(Some(manifest))
                if manifest.matches(&model_id, self.chunker.config(), &fingerprint) =>
            {
                match self.index.load().await {
                    Ok(true) => {
                        info!(
                            "Reusing persisted index '{}' ({} chunks)",
                            self.index.id(),
                            manifest.chunk_count
                        );
                        return Ok(IndexOutcome::Loaded {
                            chunk_count: manifest.chunk_count,
                        });
                    }
                    Ok(false) => debug!("Persisted index disappeared before loading"),
                    Err(e) => warn!("Failed to load persisted index, rebuilding: {}", e),
                }
            }
            Ok(Some(_)) => info!("Persisted index is stale, rebuilding"),
            Ok(None) => info!("No persisted index found, building"),
            Err(e) => warn!("Failed to read persisted manifest, rebuilding: {}", e),
        }

        self.build_from(documents, fingerprint)
            .await
            .map(IndexOutcome::Built)
    }

    /// Rebuild and persist the index unconditionally
    #[inline]
    pub async fn rebuild(&self) -> Result<IndexingStats> {
        let _build = self.build_lock.lock().await;
        let documents = self.load_corpus()?;
        let fingerprint = corpus_fingerprint(&documents);
        self.build_from(documents, fingerprint).await
    }

    fn load_corpus(&self) -> Result<Vec<Document>> {
        let documents = load_documents(&self.documents_path)?;
        if documents.is_empty() {
            return Err(RagError::EmptyCorpus(format!(
                "no .txt documents found in {}",
                self.documents_path.display()
            )));
        }
        Ok(documents)
    }

    async fn build_from(&self, documents: Vec<Document>, fingerprint: String) -> Result<IndexingStats> {
        let start = Instant::now();

        let chunks = self.chunker.split_all(&documents)?;
        if chunks.is_empty() {
            return Err(RagError::EmptyCorpus(
                "splitting the documents produced no chunks".to_string(),
            ));
        }
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        let bar = self.progress_bar(chunks.len());
        let mut entries = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embedder = Arc::clone(&self.embedder);

            // Embedders block on HTTP
            let vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
                .await
                .map_err(|e| RagError::Other(anyhow::anyhow!("Embedding task failed: {}", e)))??;

            if vectors.len() != batch.len() {
                bar.abandon();
                return Err(RagError::EmbeddingUnavailable(format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                )));
            }

            entries.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, vector)| EmbeddedChunk { chunk, vector }),
            );
            bar.inc(batch.len() as u64);
        }
        bar.finish_and_clear();

        let dimension = entries.first().map_or(0, |entry| entry.vector.len());
        let manifest = IndexManifest::new(
            self.embedder.model_id(),
            dimension,
            self.chunker.config(),
            fingerprint,
            entries.len(),
        );

        let embeddings_generated = entries.len();
        self.index.publish(entries, manifest).await?;

        let stats = IndexingStats {
            documents_loaded: documents.len(),
            chunks_created: embeddings_generated,
            embeddings_generated,
            duration: start.elapsed(),
        };
        info!("Index build finished: {:?}", stats);
        Ok(stats)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !(self.show_progress && console::user_attended_stderr()) {
            return ProgressBar::hidden();
        }

        let bar = ProgressBar::new(len as u64);
        if let Ok(style) =
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} Embedding chunks ({eta})")
        {
            bar.set_style(style);
        }
        bar
    }
}
