//! Core types for the RAG pipeline

pub mod document;
pub mod response;

pub use document::{Chunk, PageText};
pub use response::{AnswerStream, QueryResponse, ScoredResult};
