#[cfg(test)]
mod tests;

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::database::SnapshotStore;
use crate::embeddings::chunking::{Chunk, ChunkingConfig};
use crate::{RagError, Result};

/// A chunk together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Describes how a snapshot was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embedding_model_id: String,
    pub dimension: usize,
    pub max_chunk_length: usize,
    pub overlap_length: usize,
    pub corpus_fingerprint: String,
    pub chunk_count: usize,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    #[inline]
    pub fn new(
        embedding_model_id: impl Into<String>,
        dimension: usize,
        chunking: &ChunkingConfig,
        corpus_fingerprint: impl Into<String>,
        chunk_count: usize,
    ) -> Self {
        Self {
            embedding_model_id: embedding_model_id.into(),
            dimension,
            max_chunk_length: chunking.max_chunk_length,
            overlap_length: chunking.overlap_length,
            corpus_fingerprint: corpus_fingerprint.into(),
            chunk_count,
            created_at: Utc::now(),
        }
    }

    /// Whether an index built under this manifest can serve the given setup
    #[inline]
    pub fn matches(
        &self,
        embedding_model_id: &str,
        chunking: &ChunkingConfig,
        corpus_fingerprint: &str,
    ) -> bool {
        self.embedding_model_id == embedding_model_id
            && self.max_chunk_length == chunking.max_chunk_length
            && self.overlap_length == chunking.overlap_length
            && self.corpus_fingerprint == corpus_fingerprint
    }
}

/// The unit swapped in memory and exchanged with a [`SnapshotStore`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub manifest: IndexManifest,
    /// Entries in insertion order
    pub entries: Vec<EmbeddedChunk>,
}

impl IndexSnapshot {
    /// Check that the snapshot is non-empty and every vector is finite with the manifest's dimension
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.entries.is_empty() {
            return Err(RagError::EmptyCorpus(
                "cannot build an index without chunks".to_string(),
            ));
        }

        if self.manifest.dimension == 0 {
            return Err(RagError::InvalidConfig(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }

        if self.manifest.chunk_count != self.entries.len() {
            return Err(RagError::Storage(format!(
                "manifest lists {} chunks but snapshot holds {}",
                self.manifest.chunk_count,
                self.entries.len()
            )));
        }

        for entry in &self.entries {
            if entry.vector.len() != self.manifest.dimension {
                return Err(RagError::DimensionMismatch {
                    expected: self.manifest.dimension,
                    actual: entry.vector.len(),
                });
            }
            if !is_finite(&entry.vector) {
                return Err(RagError::EmbeddingUnavailable(format!(
                    "vector for chunk {} has non-finite components",
                    entry.chunk.id
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine similarity to the query, in `[-1.0, 1.0]`
    pub score: f32,
}

/// Chunks ranked by descending similarity, at most `k` of them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    #[inline]
    pub fn new(hits: Vec<ScoredChunk>) -> Self {
        Self { hits }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    #[inline]
    pub fn top(&self) -> Option<&ScoredChunk> {
        self.hits.first()
    }

    #[inline]
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|hit| &hit.chunk)
    }

    /// Chunk texts joined by a blank line
    #[inline]
    pub fn context_text(&self) -> String {
        self.chunks().map(|chunk| chunk.text.as_str()).join("\n\n")
    }
}

/// Brute-force cosine index over an immutable snapshot
///
/// `build` swaps in a new snapshot under a short write lock. Searches clone
/// the current `Arc` and scan it without holding the lock, so a rebuild never
/// disturbs a search in flight.
pub struct VectorIndex {
    store: Arc<dyn SnapshotStore>,
    id: String,
    current: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl VectorIndex {
    #[inline]
    pub fn new(store: Arc<dyn SnapshotStore>, id: impl Into<String>) -> Self {
        Self {
            store,
            id: id.into(),
            current: RwLock::new(None),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the index contents with `entries`
    ///
    /// `manifest.chunk_count` is set from `entries`. Nothing changes if
    /// validation fails.
    #[inline]
    pub fn build(&self, entries: Vec<EmbeddedChunk>, mut manifest: IndexManifest) -> Result<()> {
        manifest.chunk_count = entries.len();
        let snapshot = IndexSnapshot { manifest, entries };
        snapshot.validate()?;

        info!(
            "Built index '{}' with {} chunks ({} dimensions)",
            self.id, snapshot.manifest.chunk_count, snapshot.manifest.dimension
        );
        self.swap(snapshot);
        Ok(())
    }

    /// Write a new snapshot to the store, then swap it in
    ///
    /// The in-memory index only changes once the snapshot is persisted, so a
    /// failed write leaves both the store and the served snapshot as they were.
    #[inline]
    pub async fn publish(
        &self,
        entries: Vec<EmbeddedChunk>,
        mut manifest: IndexManifest,
    ) -> Result<()> {
        manifest.chunk_count = entries.len();
        let snapshot = IndexSnapshot { manifest, entries };
        snapshot.validate()?;

        self.store.write(&self.id, &snapshot).await?;
        info!(
            "Persisted index '{}' with {} chunks ({} dimensions)",
            self.id, snapshot.manifest.chunk_count, snapshot.manifest.dimension
        );
        self.swap(snapshot);
        Ok(())
    }

    fn swap(&self, snapshot: IndexSnapshot) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(Arc::new(snapshot));
    }

    /// Current snapshot, if the index has been built or loaded
    #[inline]
    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[inline]
    pub fn is_built(&self) -> bool {
        self.snapshot().is_some()
    }

    #[inline]
    pub fn manifest(&self) -> Option<IndexManifest> {
        self.snapshot().map(|snapshot| snapshot.manifest.clone())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.snapshot().map_or(0, |snapshot| snapshot.entries.len())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `k` entries most similar to `query`, ties kept in insertion order
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        let snapshot = self.snapshot().ok_or(RagError::IndexEmpty)?;

        if query.len() != snapshot.manifest.dimension {
            return Err(RagError::DimensionMismatch {
                expected: snapshot.manifest.dimension,
                actual: query.len(),
            });
        }
        if !is_finite(query) {
            return Err(RagError::EmbeddingUnavailable(
                "query vector has non-finite components".to_string(),
            ));
        }

        let query_norm = norm(query);
        let mut scored: Vec<(usize, f32)> = snapshot
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(query, query_norm, &entry.vector)))
            .collect();

        // sort_by is stable, equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let hits: Vec<ScoredChunk> = scored
            .into_iter()
            .take(k)
            .map(|(position, score)| ScoredChunk {
                chunk: snapshot.entries[position].chunk.clone(),
                score,
            })
            .collect();

        debug!(
            "Search over {} entries returned {} hits",
            snapshot.entries.len(),
            hits.len()
        );

        Ok(RetrievalResult::new(hits))
    }

    /// Write the current snapshot to the store
    #[inline]
    pub async fn persist(&self) -> Result<()> {
        let snapshot = self.snapshot().ok_or(RagError::IndexEmpty)?;
        self.store.write(&self.id, &snapshot).await?;
        info!(
            "Persisted index '{}' ({} chunks)",
            self.id, snapshot.manifest.chunk_count
        );
        Ok(())
    }

    /// Replace the in-memory snapshot with the persisted one
    ///
    /// Returns `false` when nothing has been persisted under this id.
    #[inline]
    pub async fn load(&self) -> Result<bool> {
        if !self.store.exists(&self.id).await? {
            debug!("No persisted index '{}'", self.id);
            return Ok(false);
        }

        let snapshot = self.store.read(&self.id).await?;
        snapshot.validate().map_err(|e| {
            RagError::Storage(format!("persisted index '{}' is invalid: {}", self.id, e))
        })?;

        info!(
            "Loaded index '{}' with {} chunks",
            self.id, snapshot.manifest.chunk_count
        );
        self.swap(snapshot);
        Ok(true)
    }

    /// Manifest of the persisted index without loading its entries
    #[inline]
    pub async fn stored_manifest(&self) -> Result<Option<IndexManifest>> {
        self.store.read_manifest(&self.id).await
    }
}

fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|v| v.is_finite())
}

fn norm(vector: &[f32]) -> f32 {
    vector.iter().map(|v| v * v).sum::<f32>().sqrt()
}

/// Zero-length vectors score 0 against everything
fn cosine_similarity(query: &[f32], query_norm: f32, other: &[f32]) -> f32 {
    let other_norm = norm(other);
    if query_norm == 0.0 || other_norm == 0.0 {
        return 0.0;
    }
    let dot: f32 = query.iter().zip(other).map(|(a, b)| a * b).sum();
    dot / (query_norm * other_norm)
}
