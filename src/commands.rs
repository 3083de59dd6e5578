use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use tracing::{error, info};

use crate::config::{AnswerBackend, Config, EmbeddingBackend};
use crate::documents::{corpus_fingerprint, load_documents};
use crate::embeddings::OllamaClient;
use crate::indexer::{IndexOutcome, IndexingStats};
use crate::pipeline::RagPipeline;
use crate::session::ChatSession;

const EXIT_WORDS: [&str; 3] = ["quit", "exit", "keluar"];
const RESET_COMMAND: &str = "/reset";

async fn open_pipeline(config: &Config) -> Result<RagPipeline> {
    Ok(RagPipeline::from_config(config)
        .await
        .context("Failed to assemble the question answering pipeline")?
        .with_progress(true))
}

async fn ready_session(pipeline: &RagPipeline) -> Result<ChatSession> {
    let mut session = pipeline.session();
    if let Some(outcome) = session
        .initialize()
        .await
        .context("Failed to prepare the vector index")?
    {
        print_outcome(&outcome);
    }
    Ok(session)
}

fn print_outcome(outcome: &IndexOutcome) {
    match outcome {
        IndexOutcome::Loaded { chunk_count } => {
            println!("Loaded persisted index ({} chunks)", chunk_count);
        }
        IndexOutcome::Built(stats) => print_stats(stats),
    }
}

fn print_stats(stats: &IndexingStats) {
    println!("Index built successfully!");
    println!("  Documents loaded: {}", stats.documents_loaded);
    println!("  Chunks created: {}", stats.chunks_created);
    println!("  Embeddings generated: {}", stats.embeddings_generated);
    println!("  Duration: {:?}", stats.duration);
}

/// Build the index, or load it when it is still fresh
#[inline]
pub async fn build_index(config: &Config, rebuild: bool) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let indexer = pipeline.indexer();

    info!("Indexing documents in {}", indexer.documents_path().display());

    if rebuild {
        let stats = indexer.rebuild().await.context("Failed to rebuild the index")?;
        print_stats(&stats);
    } else {
        let outcome = indexer
            .ensure_index()
            .await
            .context("Failed to prepare the vector index")?;
        print_outcome(&outcome);
    }

    Ok(())
}

/// Answer a single question and print the reply
#[inline]
pub async fn ask_question(config: &Config, question: &str) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let mut session = ready_session(&pipeline).await?;

    let answer = tokio::task::block_in_place(|| session.ask(question))?;
    println!("{}", answer);

    Ok(())
}

/// Interactive question loop on the terminal
#[inline]
pub async fn run_chat(config: &Config) -> Result<()> {
    let pipeline = open_pipeline(config).await?;
    let mut session = ready_session(&pipeline).await?;

    eprintln!("{}", style("💬 RAG Chat").bold().cyan());
    eprintln!(
        "Ask about the documents in {}. Type {} to clear the conversation, {} to leave.",
        style(config.documents_path().display()).cyan(),
        style(RESET_COMMAND).yellow(),
        style(EXIT_WORDS.join("/")).yellow()
    );
    eprintln!();

    loop {
        let line: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()
            .context("Failed to read input")?;
        let question = line.trim();

        if question.is_empty() {
            continue;
        }
        if EXIT_WORDS.contains(&question.to_lowercase().as_str()) {
            break;
        }
        if question == RESET_COMMAND {
            session.reset_session();
            eprintln!("{}", style("Conversation cleared").green());
            continue;
        }

        match tokio::task::block_in_place(|| session.ask(question)) {
            Ok(answer) => {
                println!("{} {}", style("Assistant:").bold().green(), answer);
                println!();
            }
            Err(e) => {
                error!("Failed to answer: {}", e);
                eprintln!("{} {}", style("Error:").bold().red(), e);
            }
        }
    }

    eprintln!("Goodbye!");
    Ok(())
}

/// Report configuration, backend health and persisted index freshness
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("📊 RAG Chat Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("📁 Corpus:");
    let documents_path = config.documents_path();
    println!("   Path: {}", documents_path.display());
    let documents = match load_documents(&documents_path) {
        Ok(documents) => {
            println!("   ✅ Documents: {}", documents.len());
            Some(documents)
        }
        Err(e) => {
            println!("   ❌ Documents: {}", e);
            None
        }
    };

    println!();
    println!("🤖 Backends:");
    println!("   Embedding model: {}", config.embedding.model_id());
    println!("   Answer backend: {:?}", config.generation.backend);
    let uses_ollama = config.embedding.backend == EmbeddingBackend::Ollama
        || config.generation.backend == AnswerBackend::Ollama;
    if uses_ollama {
        match OllamaClient::new(config) {
            Ok(client) => match tokio::task::block_in_place(|| client.health_check()) {
                Ok(()) => println!("   ✅ Ollama: Connected ({})", client.base_url()),
                Err(e) => println!("   ⚠️  Ollama: Connected but unhealthy - {:#}", e),
            },
            Err(e) => println!("   ❌ Ollama: Invalid configuration - {}", e),
        }
    }

    println!();
    println!("🔍 Vector Index:");
    println!("   Path: {}", config.index_path().display());
    let pipeline = match RagPipeline::from_config(config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            println!("   ❌ LanceDB: Failed to open - {}", e);
            return Ok(());
        }
    };

    match pipeline.index().stored_manifest().await {
        Ok(Some(manifest)) => {
            println!("   ✅ Index '{}': {} chunks", config.storage.index_id, manifest.chunk_count);
            println!("   Embedding model: {}", manifest.embedding_model_id);
            println!("   Dimension: {}", manifest.dimension);
            println!(
                "   Chunking: {} chars, {} overlap",
                manifest.max_chunk_length, manifest.overlap_length
            );
            println!(
                "   Created: {}",
                manifest.created_at.format("%Y-%m-%d %H:%M:%S")
            );

            if let Some(documents) = documents {
                let fresh = manifest.matches(
                    &pipeline.embedder().model_id(),
                    &config.chunking,
                    &corpus_fingerprint(&documents),
                );
                if fresh {
                    println!("   Freshness: up to date");
                } else {
                    println!("   Freshness: stale, will be rebuilt on next use");
                }
            }
        }
        Ok(None) => println!("   💤 Index '{}' has not been built yet", config.storage.index_id),
        Err(e) => println!("   ❌ Index '{}': unreadable - {}", config.storage.index_id, e),
    }

    Ok(())
}
