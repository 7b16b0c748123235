//! pdf-rag: question answering over a single PDF with cited sources
//!
//! The document is chunked by page, embedded into a persisted vector index,
//! and queried with score-thresholded similarity search. Answers are streamed
//! from a language model constrained to the retrieved passages.

pub mod config;
pub mod error;
pub mod generation;
pub mod ingestion;
pub mod pipeline;
pub mod providers;
pub mod retrieval;
pub mod storage;
pub mod types;

pub use config::RagConfig;
pub use error::{Error, Result};
pub use generation::Generator;
pub use ingestion::{DocumentLoader, PdfLoader, TextChunker};
pub use pipeline::{QueryPipeline, NOT_FOUND_MESSAGE};
pub use providers::{EmbeddingProvider, LlmProvider, OllamaProvider};
pub use retrieval::VectorIndex;
pub use types::{AnswerStream, Chunk, PageText, QueryResponse, ScoredResult};
