use super::*;
use crate::config::EmbeddingBackend;
use crate::database::MemorySnapshotStore;
use std::fs;
use tempfile::TempDir;

fn hashing_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::with_base_dir(temp_dir.path());
    config.embedding.backend = EmbeddingBackend::Hashing;
    config.embedding.dimension = 64;
    config.storage.index_id = "pipeline".to_string();

    let docs = config.documents_path();
    fs::create_dir_all(&docs).expect("should create documents dir");
    fs::write(
        docs.join("tekken.txt"),
        "Tekken is a fighting game series about the Mishima family.",
    )
    .expect("should write document");
    config
}

#[test]
fn components_follow_the_config() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = hashing_config(&temp_dir);
    config.retrieval.k = 5;

    let pipeline =
        RagPipeline::with_store(&config, Arc::new(MemorySnapshotStore::new())).expect("pipeline");

    assert_eq!(pipeline.embedder().model_id(), "hashing:d64");
    assert_eq!(pipeline.composer().name(), "templates");
    assert_eq!(pipeline.index().id(), "pipeline");
    assert!(Arc::ptr_eq(pipeline.retriever().index(), pipeline.index()));
    assert!(Arc::ptr_eq(pipeline.indexer().index(), pipeline.index()));
    assert_eq!(pipeline.config().retrieval.k, 5);
}

#[test]
fn generative_backend_is_selectable() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut config = hashing_config(&temp_dir);
    config.generation.backend = AnswerBackend::Ollama;

    let pipeline =
        RagPipeline::with_store(&config, Arc::new(MemorySnapshotStore::new())).expect("pipeline");
    assert_eq!(pipeline.composer().name(), "ollama");
}

#[tokio::test]
async fn sessions_answer_from_the_shared_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = hashing_config(&temp_dir);
    let pipeline = RagPipeline::with_store(&config, Arc::new(MemorySnapshotStore::new()))
        .expect("pipeline")
        .with_progress(false);

    let mut session = pipeline.session();
    session.initialize().await.expect("initialize");
    assert!(pipeline.index().is_built());

    let answer = session.ask("Ceritakan tentang Tekken").expect("ask");
    assert!(answer.contains("Tekken is a fighting game series"));
}

#[tokio::test]
async fn lance_store_is_created_under_the_index_path() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = hashing_config(&temp_dir);

    let pipeline = RagPipeline::from_config(&config).await.expect("pipeline");
    pipeline.indexer().ensure_index().await.expect("ensure_index");

    assert!(config.index_path().exists());
}
