use super::*;
use crate::database::MemorySnapshotStore;
use crate::embeddings::{Embedder, HashingEmbedder};
use async_trait::async_trait;

/// Store that accepts reads but fails every write
struct ReadOnlyStore;

#[async_trait]
impl SnapshotStore for ReadOnlyStore {
    async fn exists(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn write(&self, _id: &str, _snapshot: &IndexSnapshot) -> Result<()> {
        Err(RagError::Storage("disk full".to_string()))
    }

    async fn read(&self, id: &str) -> Result<IndexSnapshot> {
        Err(RagError::Storage(format!("No index stored under '{id}'")))
    }

    async fn read_manifest(&self, _id: &str) -> Result<Option<IndexManifest>> {
        Ok(None)
    }
}

fn chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        document_id: id.split('#').next().unwrap_or(id).to_string(),
        source_path: format!("/corpus/{id}"),
        text: text.to_string(),
        start_offset: 0,
    }
}

fn manifest(dimension: usize) -> IndexManifest {
    IndexManifest::new(
        format!("test:d{dimension}"),
        dimension,
        &ChunkingConfig::default(),
        "fingerprint",
        0,
    )
}

fn index() -> VectorIndex {
    VectorIndex::new(Arc::new(MemorySnapshotStore::new()), "corpus")
}

fn embedded(embedder: &HashingEmbedder, texts: &[&str]) -> Vec<EmbeddedChunk> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| EmbeddedChunk {
            chunk: chunk(&format!("doc.txt#{i}"), text),
            vector: embedder.embed(text).expect("embed"),
        })
        .collect()
}

const CORPUS: [&str; 4] = [
    "Python is a high-level programming language.",
    "Reina is a character in the Tekken series.",
    "The Devil Gene is passed down the Mishima bloodline.",
    "Data science relies on statistics and machine learning.",
];

#[test]
fn search_before_build_is_index_empty() {
    let index = index();
    assert!(!index.is_built());
    assert!(matches!(
        index.search(&[1.0, 0.0], 3),
        Err(RagError::IndexEmpty)
    ));
}

#[test]
fn indexed_text_retrieves_itself_at_similarity_one() {
    let embedder = HashingEmbedder::new(256).expect("valid dimension");
    let index = index();
    index
        .build(embedded(&embedder, &CORPUS), manifest(256))
        .expect("build should succeed");

    for (position, text) in CORPUS.iter().enumerate() {
        let query = embedder.embed(text).expect("embed");
        let result = index.search(&query, 3).expect("search");
        let top = result.top().expect("at least one hit");

        assert_eq!(top.chunk.text, *text);
        assert_eq!(top.chunk.id, format!("doc.txt#{position}"));
        assert!((top.score - 1.0).abs() < 1e-5);
    }
}

#[test]
fn results_are_sorted_and_bounded_by_k() {
    let index = index();
    let entries = vec![
        EmbeddedChunk { chunk: chunk("a#0", "a"), vector: vec![1.0, 0.0] },
        EmbeddedChunk { chunk: chunk("b#0", "b"), vector: vec![0.6, 0.8] },
        EmbeddedChunk { chunk: chunk("c#0", "c"), vector: vec![0.0, 1.0] },
        EmbeddedChunk { chunk: chunk("d#0", "d"), vector: vec![-1.0, 0.0] },
    ];
    index.build(entries, manifest(2)).expect("build");

    let result = index.search(&[1.0, 0.0], 3).expect("search");
    let ids: Vec<&str> = result.chunks().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["a#0", "b#0", "c#0"]);
    assert_eq!(result.len(), 3);

    let scores: Vec<f32> = result.hits.iter().map(|h| h.score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));

    let everything = index.search(&[1.0, 0.0], 10).expect("search");
    assert_eq!(everything.len(), 4);
    assert!(index.search(&[1.0, 0.0], 0).expect("search").is_empty());
}

#[test]
fn ties_keep_insertion_order() {
    let index = index();
    let entries = vec![
        EmbeddedChunk { chunk: chunk("first#0", "x"), vector: vec![0.0, 1.0] },
        EmbeddedChunk { chunk: chunk("second#0", "x"), vector: vec![2.0, 0.0] },
        EmbeddedChunk { chunk: chunk("third#0", "x"), vector: vec![1.0, 0.0] },
    ];
    index.build(entries, manifest(2)).expect("build");

    let result = index.search(&[1.0, 0.0], 3).expect("search");
    let ids: Vec<&str> = result.chunks().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["second#0", "third#0", "first#0"]);
}

#[test]
fn zero_vectors_score_zero() {
    let index = index();
    let entries = vec![EmbeddedChunk { chunk: chunk("z#0", "z"), vector: vec![0.0, 0.0] }];
    index.build(entries, manifest(2)).expect("build");

    let result = index.search(&[1.0, 0.0], 1).expect("search");
    assert_eq!(result.hits[0].score, 0.0);
}

#[test]
fn query_dimension_must_match() {
    let index = index();
    let entries = vec![EmbeddedChunk { chunk: chunk("a#0", "a"), vector: vec![1.0, 0.0] }];
    index.build(entries, manifest(2)).expect("build");

    assert!(matches!(
        index.search(&[1.0, 0.0, 0.0], 1),
        Err(RagError::DimensionMismatch { expected: 2, actual: 3 })
    ));
}

#[test]
fn build_rejects_empty_and_ragged_input() {
    let index = index();

    assert!(matches!(
        index.build(Vec::new(), manifest(2)),
        Err(RagError::EmptyCorpus(_))
    ));

    let ragged = vec![
        EmbeddedChunk { chunk: chunk("a#0", "a"), vector: vec![1.0, 0.0] },
        EmbeddedChunk { chunk: chunk("b#0", "b"), vector: vec![1.0] },
    ];
    assert!(matches!(
        index.build(ragged, manifest(2)),
        Err(RagError::DimensionMismatch { expected: 2, actual: 1 })
    ));

    assert!(!index.is_built());
}

#[test]
fn build_rejects_non_finite_vectors() {
    let index = index();

    for bad in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
        let entries = vec![
            EmbeddedChunk { chunk: chunk("a#0", "a"), vector: vec![1.0, 0.0] },
            EmbeddedChunk { chunk: chunk("b#0", "b"), vector: vec![bad, 0.0] },
        ];
        assert!(matches!(
            index.build(entries, manifest(2)),
            Err(RagError::EmbeddingUnavailable(_))
        ));
    }

    assert!(!index.is_built());
}

#[test]
fn non_finite_query_is_rejected() {
    let index = index();
    let entries = vec![EmbeddedChunk { chunk: chunk("a#0", "a"), vector: vec![1.0, 0.0] }];
    index.build(entries, manifest(2)).expect("build");

    assert!(matches!(
        index.search(&[f32::NAN, 0.0], 1),
        Err(RagError::EmbeddingUnavailable(_))
    ));
}

#[test]
fn failed_rebuild_keeps_previous_snapshot() {
    let index = index();
    let entries = vec![EmbeddedChunk { chunk: chunk("a#0", "a"), vector: vec![1.0, 0.0] }];
    index.build(entries, manifest(2)).expect("build");

    assert!(index.build(Vec::new(), manifest(2)).is_err());
    assert_eq!(index.len(), 1);
    assert_eq!(index.manifest().map(|m| m.chunk_count), Some(1));
}

#[test]
fn readers_keep_their_snapshot_across_rebuilds() {
    let index = index();
    let first = vec![EmbeddedChunk { chunk: chunk("old#0", "old"), vector: vec![1.0, 0.0] }];
    index.build(first, manifest(2)).expect("build");

    let held = index.snapshot().expect("snapshot");

    let second = vec![
        EmbeddedChunk { chunk: chunk("new#0", "new"), vector: vec![1.0, 0.0] },
        EmbeddedChunk { chunk: chunk("new#1", "new"), vector: vec![0.0, 1.0] },
    ];
    index.build(second, manifest(2)).expect("rebuild");

    assert_eq!(held.entries.len(), 1);
    assert_eq!(held.entries[0].chunk.id, "old#0");
    assert_eq!(index.len(), 2);
}

#[tokio::test]
async fn persist_then_load_reproduces_search_results() {
    let embedder = HashingEmbedder::new(128).expect("valid dimension");
    let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());

    let original = VectorIndex::new(Arc::clone(&store), "corpus");
    original
        .build(embedded(&embedder, &CORPUS), manifest(128))
        .expect("build");
    original.persist().await.expect("persist");

    let reloaded = VectorIndex::new(Arc::clone(&store), "corpus");
    assert!(reloaded.load().await.expect("load"));

    for query in ["What is Python?", "Who is Reina?", "Mishima family", "statistics"] {
        let vector = embedder.embed(query).expect("embed");
        assert_eq!(
            original.search(&vector, 3).expect("search"),
            reloaded.search(&vector, 3).expect("search")
        );
    }
    assert_eq!(original.manifest(), reloaded.manifest());
}

#[tokio::test]
async fn publish_persists_then_serves() {
    let store: Arc<dyn SnapshotStore> = Arc::new(MemorySnapshotStore::new());
    let index = VectorIndex::new(Arc::clone(&store), "corpus");
    let entries = vec![EmbeddedChunk { chunk: chunk("a#0", "a"), vector: vec![1.0, 0.0] }];

    index.publish(entries, manifest(2)).await.expect("publish");

    assert!(index.is_built());
    let stored = store.read("corpus").await.expect("read");
    assert_eq!(stored.manifest.chunk_count, 1);
    assert_eq!(Some(stored.manifest), index.manifest());
}

#[tokio::test]
async fn failed_publish_leaves_the_index_unchanged() {
    let index = VectorIndex::new(Arc::new(ReadOnlyStore), "corpus");
    let entries = vec![EmbeddedChunk { chunk: chunk("a#0", "a"), vector: vec![1.0, 0.0] }];

    assert!(matches!(
        index.publish(entries, manifest(2)).await,
        Err(RagError::Storage(_))
    ));
    assert!(!index.is_built());
}

#[tokio::test]
async fn load_without_persisted_state_returns_false() {
    let index = index();
    assert!(!index.load().await.expect("load"));
    assert!(!index.is_built());
    assert!(index.stored_manifest().await.expect("manifest").is_none());
}

#[tokio::test]
async fn persist_before_build_is_index_empty() {
    assert!(matches!(index().persist().await, Err(RagError::IndexEmpty)));
}

#[test]
fn manifest_matching() {
    let chunking = ChunkingConfig::default();
    let manifest = IndexManifest::new("ollama:all-minilm", 384, &chunking, "abc", 10);

    assert!(manifest.matches("ollama:all-minilm", &chunking, "abc"));
    assert!(!manifest.matches("ollama:nomic-embed-text", &chunking, "abc"));
    assert!(!manifest.matches("ollama:all-minilm", &chunking, "def"));

    let smaller = ChunkingConfig {
        max_chunk_length: 500,
        overlap_length: 100,
    };
    assert!(!manifest.matches("ollama:all-minilm", &smaller, "abc"));
}

#[test]
fn context_text_joins_with_blank_line() {
    let result = RetrievalResult::new(vec![
        ScoredChunk { chunk: chunk("a#0", "first"), score: 0.9 },
        ScoredChunk { chunk: chunk("b#0", "second"), score: 0.5 },
    ]);
    assert_eq!(result.context_text(), "first\n\nsecond");
    assert_eq!(RetrievalResult::default().context_text(), "");
}
