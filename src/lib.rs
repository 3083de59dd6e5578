use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Embedding backend unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("Vector index is empty, build or load it before searching")]
    IndexEmpty,

    #[error("Session is not ready, call initialize first")]
    NotReady,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Empty corpus: {0}")]
    EmptyCorpus(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Answer generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod answer;
pub mod commands;
pub mod config;
pub mod database;
pub mod documents;
pub mod embeddings;
pub mod index;
pub mod indexer;
pub mod pipeline;
pub mod retriever;
pub mod session;
