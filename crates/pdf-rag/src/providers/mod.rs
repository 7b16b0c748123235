//! Provider abstractions for embeddings and language models
//!
//! The pipeline only sees these traits; the Ollama implementations are the
//! default local backend.

pub mod embedding;
pub mod llm;
pub mod ollama;

pub use embedding::EmbeddingProvider;
pub use llm::LlmProvider;
pub use ollama::{OllamaEmbedder, OllamaLlm, OllamaProvider};
