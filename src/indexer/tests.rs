use super::*;
use crate::config::EmbeddingBackend;
use crate::database::{MemorySnapshotStore, SnapshotStore};
use crate::embeddings::HashingEmbedder;
use crate::index::IndexSnapshot;
use async_trait::async_trait;
use std::fs;
use tempfile::TempDir;

struct Fixture {
    _temp_dir: TempDir,
    config: Config,
    store: Arc<MemorySnapshotStore>,
}

impl Fixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let mut config = Config::with_base_dir(temp_dir.path());
        config.embedding.backend = EmbeddingBackend::Hashing;
        config.embedding.dimension = 64;
        config.chunking.max_chunk_length = 120;
        config.chunking.overlap_length = 20;

        let docs = config.documents_path();
        fs::create_dir_all(&docs).expect("should create documents dir");
        fs::write(
            docs.join("python.txt"),
            "Python is a high-level programming language used for web development and data science.",
        )
        .expect("should write document");
        fs::write(
            docs.join("reina.txt"),
            "Reina Mishima is a Tekken 8 character. ".repeat(10),
        )
        .expect("should write document");

        Self {
            _temp_dir: temp_dir,
            config,
            store: Arc::new(MemorySnapshotStore::new()),
        }
    }

    fn indexer(&self) -> Indexer {
        self.indexer_with_store(Arc::clone(&self.store) as Arc<dyn SnapshotStore>)
    }

    fn indexer_with_store(&self, store: Arc<dyn SnapshotStore>) -> Indexer {
        let embedder = Arc::new(HashingEmbedder::new(64).expect("valid dimension"));
        let index = Arc::new(VectorIndex::new(store, "corpus"));
        Indexer::new(&self.config, embedder, index).expect("valid config")
    }
}

struct UnavailableEmbedder;

impl Embedder for UnavailableEmbedder {
    fn model_id(&self) -> String {
        "unavailable".to_string()
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingUnavailable("connection refused".to_string()))
    }
}

/// Store whose reads always fail, as if the files were corrupted
struct CorruptedStore(MemorySnapshotStore);

#[async_trait]
impl SnapshotStore for CorruptedStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        self.0.exists(id).await
    }

    async fn write(&self, id: &str, snapshot: &IndexSnapshot) -> Result<()> {
        self.0.write(id, snapshot).await
    }

    async fn read(&self, _id: &str) -> Result<IndexSnapshot> {
        Err(RagError::Storage("checksum mismatch".to_string()))
    }

    async fn read_manifest(&self, _id: &str) -> Result<Option<IndexManifest>> {
        Err(RagError::Storage("checksum mismatch".to_string()))
    }
}

/// Store that cannot persist anything
struct FullDiskStore;

#[async_trait]
impl SnapshotStore for FullDiskStore {
    async fn exists(&self, _id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn write(&self, _id: &str, _snapshot: &IndexSnapshot) -> Result<()> {
        Err(RagError::Storage("no space left on device".to_string()))
    }

    async fn read(&self, id: &str) -> Result<IndexSnapshot> {
        Err(RagError::Storage(format!("No index stored under '{id}'")))
    }

    async fn read_manifest(&self, _id: &str) -> Result<Option<IndexManifest>> {
        Ok(None)
    }
}

#[tokio::test]
async fn first_run_builds_and_persists() {
    let fixture = Fixture::new();
    let indexer = fixture.indexer();

    let outcome = indexer.ensure_index().await.expect("ensure_index");
    let IndexOutcome::Built(stats) = outcome else {
        panic!("expected a build, got {outcome:?}");
    };

    assert_eq!(stats.documents_loaded, 2);
    assert!(stats.chunks_created > 2);
    assert_eq!(stats.embeddings_generated, stats.chunks_created);
    assert!(indexer.index().is_built());
    assert!(fixture.store.exists("corpus").await.expect("exists"));

    let manifest = indexer.index().manifest().expect("manifest");
    assert_eq!(manifest.embedding_model_id, "hashing:d64");
    assert_eq!(manifest.dimension, 64);
    assert_eq!(manifest.max_chunk_length, 120);
    assert_eq!(manifest.chunk_count, stats.chunks_created);
}

#[tokio::test]
async fn unchanged_corpus_is_loaded_not_rebuilt() {
    let fixture = Fixture::new();
    let first = fixture.indexer();
    let IndexOutcome::Built(stats) = first.ensure_index().await.expect("first run") else {
        panic!("first run should build");
    };

    let second = fixture.indexer();
    let outcome = second.ensure_index().await.expect("second run");
    assert_eq!(
        outcome,
        IndexOutcome::Loaded {
            chunk_count: stats.chunks_created
        }
    );
    assert_eq!(second.index().manifest(), first.index().manifest());
}

#[tokio::test]
async fn edited_corpus_triggers_rebuild() {
    let fixture = Fixture::new();
    fixture.indexer().ensure_index().await.expect("first run");

    fs::write(
        fixture.config.documents_path().join("esther.txt"),
        "Esther is someone Reina likes.",
    )
    .expect("should write document");

    let outcome = fixture.indexer().ensure_index().await.expect("second run");
    let IndexOutcome::Built(stats) = outcome else {
        panic!("expected a rebuild, got {outcome:?}");
    };
    assert_eq!(stats.documents_loaded, 3);
}

#[tokio::test]
async fn changed_chunking_triggers_rebuild() {
    let mut fixture = Fixture::new();
    fixture.indexer().ensure_index().await.expect("first run");

    fixture.config.chunking.max_chunk_length = 200;
    let outcome = fixture.indexer().ensure_index().await.expect("second run");
    assert!(matches!(outcome, IndexOutcome::Built(_)));
}

#[tokio::test]
async fn unreadable_store_falls_back_to_rebuild() {
    let fixture = Fixture::new();
    let indexer = fixture.indexer_with_store(Arc::new(CorruptedStore(MemorySnapshotStore::new())));

    let outcome = indexer.ensure_index().await.expect("should rebuild");
    assert!(matches!(outcome, IndexOutcome::Built(_)));
    assert!(indexer.index().is_built());
}

#[tokio::test]
async fn rebuild_always_builds() {
    let fixture = Fixture::new();
    let indexer = fixture.indexer();
    indexer.ensure_index().await.expect("first run");

    let stats = indexer.rebuild().await.expect("rebuild");
    assert_eq!(stats.documents_loaded, 2);
}

#[tokio::test]
async fn empty_corpus_aborts_the_build() {
    let fixture = Fixture::new();
    let docs = fixture.config.documents_path();
    fs::remove_dir_all(&docs).expect("should remove documents");
    fs::create_dir_all(&docs).expect("should recreate documents dir");

    let indexer = fixture.indexer();
    assert!(matches!(
        indexer.ensure_index().await,
        Err(RagError::EmptyCorpus(_))
    ));
    assert!(!indexer.index().is_built());
    assert!(!fixture.store.exists("corpus").await.expect("exists"));
}

#[tokio::test]
async fn embedding_failure_leaves_index_unbuilt() {
    let fixture = Fixture::new();
    let index = Arc::new(VectorIndex::new(
        Arc::clone(&fixture.store) as Arc<dyn SnapshotStore>,
        "corpus",
    ));
    let indexer = Indexer::new(&fixture.config, Arc::new(UnavailableEmbedder), Arc::clone(&index))
        .expect("valid config");

    assert!(matches!(
        indexer.ensure_index().await,
        Err(RagError::EmbeddingUnavailable(_))
    ));
    assert!(!index.is_built());
}

#[test]
fn invalid_chunking_is_rejected() {
    let mut fixture = Fixture::new();
    fixture.config.chunking.overlap_length = fixture.config.chunking.max_chunk_length;

    let embedder = Arc::new(HashingEmbedder::new(8).expect("valid dimension"));
    let index = Arc::new(VectorIndex::new(Arc::new(MemorySnapshotStore::new()), "corpus"));
    assert!(matches!(
        Indexer::new(&fixture.config, embedder, index),
        Err(RagError::InvalidConfig(_))
    ));
}

#[tokio::test]
async fn failed_persist_does_not_publish_the_index() {
    let fixture = Fixture::new();
    let indexer = fixture.indexer_with_store(Arc::new(FullDiskStore));

    for _ in 0..2 {
        assert!(matches!(
            indexer.ensure_available().await,
            Err(RagError::Storage(_))
        ));
        assert!(!indexer.index().is_built());
    }
}

#[tokio::test]
async fn ensure_available_skips_a_serving_index() {
    let fixture = Fixture::new();
    let indexer = fixture.indexer();

    let first = indexer.ensure_available().await.expect("first call");
    assert!(matches!(first, Some(IndexOutcome::Built(_))));
    assert!(indexer.ensure_available().await.expect("second call").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_callers_share_one_build() {
    let fixture = Fixture::new();
    let indexer = fixture.indexer();

    let outcomes =
        futures::future::join_all((0..4).map(|_| indexer.ensure_available())).await;

    let mut built = 0;
    for outcome in outcomes {
        match outcome.expect("every caller should succeed") {
            Some(IndexOutcome::Built(_)) => built += 1,
            None => {}
            Some(other) => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(built, 1);
}
