// Configuration management module
// TOML settings for Ollama, models, chunking, retrieval and storage

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbeddingConfig, GenerationConfig, OllamaConfig, RetrievalConfig,
    StorageConfig,
};
