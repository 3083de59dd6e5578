use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rag_chat::Result;
use rag_chat::commands::{ask_question, build_index, run_chat, show_status};
use rag_chat::config::{Config, resolve_base_dir, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "rag-chat")]
#[command(about = "Answer questions from a local text corpus with retrieval-augmented generation")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, documents and the index (default: ~/.rag-chat)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection, embeddings and answer settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the vector index, or load it if the documents are unchanged
    Index {
        /// Rebuild even when the persisted index is up to date
        #[arg(long)]
        rebuild: bool,
    },
    /// Answer a single question
    Ask {
        /// The question to answer
        question: String,
    },
    /// Start an interactive chat session
    Chat,
    /// Show corpus, backend and index status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir)?;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Index { rebuild } => {
            build_index(&Config::load(&base_dir)?, rebuild).await?;
        }
        Commands::Ask { question } => {
            ask_question(&Config::load(&base_dir)?, &question).await?;
        }
        Commands::Chat => {
            run_chat(&Config::load(&base_dir)?).await?;
        }
        Commands::Status => {
            show_status(&Config::load(&base_dir)?).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn cli_parsing() {
        let cli = Cli::try_parse_from(["rag-chat", "status"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Status));
            assert_eq!(parsed.base_dir, None);
        }
    }

    #[test]
    fn ask_command_with_question() {
        let cli = Cli::try_parse_from(["rag-chat", "ask", "Apa itu Python?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ask { question } = parsed.command {
                assert_eq!(question, "Apa itu Python?");
            } else {
                panic!("expected the ask command");
            }
        }
    }

    #[test]
    fn ask_requires_a_question() {
        let cli = Cli::try_parse_from(["rag-chat", "ask"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn index_rebuild_flag() {
        let cli = Cli::try_parse_from(["rag-chat", "index", "--rebuild"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Index { rebuild: true }));
        }
    }

    #[test]
    fn global_base_dir_after_subcommand() {
        let cli = Cli::try_parse_from(["rag-chat", "chat", "--base-dir", "/tmp/rag"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Chat));
            assert_eq!(parsed.base_dir, Some(PathBuf::from("/tmp/rag")));
        }
    }

    #[test]
    fn config_show_flag() {
        let cli = Cli::try_parse_from(["rag-chat", "config", "--show"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert!(matches!(parsed.command, Commands::Config { show: true }));
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["rag-chat", "serve"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["rag-chat", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
