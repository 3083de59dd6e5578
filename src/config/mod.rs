// Configuration management module
// TOML settings under the base directory plus the interactive editor

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    AnswerBackend, Config, ConfigError, EmbeddingBackend, EmbeddingConfig, GenerationConfig,
    OllamaConfig, RetrievalConfig, StorageConfig,
};

/// Resolve the base directory: an explicit override, otherwise `~/.rag-chat`
#[inline]
pub fn resolve_base_dir(
    explicit: Option<std::path::PathBuf>,
) -> Result<std::path::PathBuf, ConfigError> {
    explicit.map_or_else(Config::default_base_dir, Ok)
}
