
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{AnswerBackend, Config, ConfigError, EmbeddingBackend, OllamaConfig};
use crate::embeddings::chunking::ChunkingConfig;

#[inline]
pub fn run_interactive_config(base_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 RAG Chat Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(base_dir);

    eprintln!("{}", style("Ollama Connection").bold().yellow());
    eprintln!("Used for embeddings and, optionally, for generated answers.");
    eprintln!();
    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Embeddings").bold().yellow());
    configure_embedding(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Chunking & Retrieval").bold().yellow());
    configure_chunking(&mut config.chunking)?;
    config.retrieval.k = Input::new()
        .with_prompt("Passages retrieved per question (k)")
        .default(config.retrieval.k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=50).contains(input) {
                Ok(())
            } else {
                Err("k must be between 1 and 50")
            }
        })
        .interact_text()?;

    eprintln!();
    eprintln!("{}", style("Answers").bold().yellow());
    configure_generation(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else if config.embedding.backend == EmbeddingBackend::Ollama {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before indexing.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(base_dir: &Path) -> Result<()> {
    let config = Config::load(base_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama:").bold().yellow());
    match config.ollama_url() {
        Ok(url) => eprintln!("  URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    eprintln!("  Timeout: {}s", style(config.ollama.timeout_secs).cyan());

    eprintln!("{}", style("Embeddings:").bold().yellow());
    eprintln!("  Model: {}", style(config.embedding.model_id()).cyan());

    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!(
        "  Max Length: {}",
        style(config.chunking.max_chunk_length).cyan()
    );
    eprintln!("  Overlap: {}", style(config.chunking.overlap_length).cyan());

    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  k: {}", style(config.retrieval.k).cyan());
    eprintln!(
        "  Entity Fallback: {}",
        style(format!("{:?}", config.retrieval.entity_fallback)).cyan()
    );

    eprintln!("{}", style("Answers:").bold().yellow());
    match config.generation.backend {
        AnswerBackend::Templates => eprintln!("  Backend: {}", style("templates").cyan()),
        AnswerBackend::Ollama => eprintln!(
            "  Backend: {} ({})",
            style("ollama").cyan(),
            style(&config.generation.model).cyan()
        ),
    }

    eprintln!("{}", style("Storage:").bold().yellow());
    eprintln!(
        "  Documents: {}",
        style(config.documents_path().display()).cyan()
    );
    eprintln!("  Index: {}", style(config.index_path().display()).cyan());
    eprintln!("  Index Id: {}", style(&config.storage.index_id).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(base_dir: &Path) -> Config {
    Config::load(base_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Config::with_base_dir(base_dir)
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let timeout_secs: u64 = Input::new()
        .with_prompt("Request timeout (seconds)")
        .default(ollama.timeout_secs)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 600 seconds")
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_timeout_secs(timeout_secs)?;

    Ok(())
}

fn configure_embedding(config: &mut Config) -> Result<()> {
    let backends = &["ollama", "hashing (offline)"];
    let default_index = match config.embedding.backend {
        EmbeddingBackend::Ollama => 0,
        EmbeddingBackend::Hashing => 1,
    };

    let backend_index = Select::new()
        .with_prompt("Embedding backend")
        .default(default_index)
        .items(backends)
        .interact()?;

    if backend_index == 0 {
        config.embedding.backend = EmbeddingBackend::Ollama;
        config.embedding.model = Input::new()
            .with_prompt("Embedding model")
            .default(config.embedding.model.clone())
            .validate_with(|input: &String| -> Result<(), &str> {
                if input.trim().is_empty() {
                    Err("Model name cannot be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;
    } else {
        config.embedding.backend = EmbeddingBackend::Hashing;
        config.embedding.dimension = Input::new()
            .with_prompt("Vector dimension")
            .default(config.embedding.dimension)
            .validate_with(|input: &u32| -> Result<(), &str> {
                if (8..=4096).contains(input) {
                    Ok(())
                } else {
                    Err("Dimension must be between 8 and 4096")
                }
            })
            .interact_text()?;
    }

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let max_chunk_length: usize = Input::new()
        .with_prompt("Maximum chunk length (characters)")
        .default(chunking.max_chunk_length)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Chunk length must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let overlap_length: usize = Input::new()
        .with_prompt("Overlap between chunks (characters)")
        .default(chunking.overlap_length.min(max_chunk_length - 1))
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input < max_chunk_length {
                Ok(())
            } else {
                Err("Overlap must be smaller than the chunk length")
            }
        })
        .interact_text()?;

    chunking.max_chunk_length = max_chunk_length;
    chunking.overlap_length = overlap_length;
    Ok(())
}

fn configure_generation(config: &mut Config) -> Result<()> {
    let backends = &["templates", "ollama chat model"];
    let default_index = match config.generation.backend {
        AnswerBackend::Templates => 0,
        AnswerBackend::Ollama => 1,
    };

    let backend_index = Select::new()
        .with_prompt("Answer backend")
        .default(default_index)
        .items(backends)
        .interact()?;

    if backend_index == 0 {
        config.generation.backend = AnswerBackend::Templates;
    } else {
        config.generation.backend = AnswerBackend::Ollama;
        config.generation.model = Input::new()
            .with_prompt("Chat model")
            .default(config.generation.model.clone())
            .interact_text()?;
    }

    Ok(())
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
