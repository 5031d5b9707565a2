// Embeddings module
// Word-window chunking, vector normalization and the Ollama client

pub mod chunking;
pub mod embedder;
pub mod ollama;

pub use chunking::{Chunk, ChunkingConfig, chunk_document, chunk_documents, split_text};
pub use embedder::{EmbeddedChunk, Embedder, EmbeddingService, FailurePolicy, normalize_vector};
pub use ollama::OllamaClient;
