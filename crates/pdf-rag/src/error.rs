//! Error types for the RAG pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// RAG pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source document missing at the configured path
    #[error("Source document not found at {}", .0.display())]
    SourceNotFound(PathBuf),

    /// Source document produced no chunks (e.g. a scanned PDF without a text layer)
    #[error("No text could be extracted from {}", .0.display())]
    EmptyDocument(PathBuf),

    /// Index build attempted with zero chunks
    #[error("Cannot build an index from zero chunks")]
    EmptyInput,

    /// No persisted index at the given location
    #[error("No vector index found at {}", .0.display())]
    IndexNotFound(PathBuf),

    /// Index and embedder disagree about the embedding space
    #[error("Embedding mismatch: index expects {expected}, embedder produced {actual}")]
    EmbeddingMismatch { expected: String, actual: String },

    /// Chunk failed validation at construction
    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    /// Caller passed an unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File parsing error
    #[error("Failed to parse file '{filename}': {message}")]
    FileParse { filename: String, message: String },

    /// Embedding error
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Language model failure while producing an answer
    #[error("Generation failed: {0}")]
    Generation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML config error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// SQLite error
    #[error("Index storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a file parse error
    pub fn file_parse(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FileParse {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding error
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    /// Create a generation error
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error is fatal to pipeline initialization
    pub fn is_initialization_error(&self) -> bool {
        matches!(
            self,
            Error::SourceNotFound(_)
                | Error::EmptyDocument(_)
                | Error::EmptyInput
                | Error::Config(_)
                | Error::EmbeddingMismatch { .. }
        )
    }
}
