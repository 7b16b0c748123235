//! Response types for RAG queries

use futures::stream::{BoxStream, StreamExt, TryStreamExt};

use super::document::Chunk;
use crate::error::Result;

/// Lazily produced answer fragments
///
/// Nothing is generated until the stream is polled; dropping it releases the
/// underlying generation request.
pub type AnswerStream = BoxStream<'static, Result<String>>;

/// A chunk paired with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredResult {
    /// The retrieved chunk
    pub chunk: Chunk,
    /// Cosine similarity (1 - cosine distance)
    pub score: f32,
}

impl ScoredResult {
    /// Format as an inline citation, e.g. `[Page 2, score 0.81]`
    pub fn format_inline(&self) -> String {
        format!("[{}, score {:.2}]", self.chunk.source_label(), self.score)
    }
}

/// Response from a RAG query
pub struct QueryResponse {
    /// Chunks that passed the score threshold, best first
    pub sources: Vec<ScoredResult>,
    /// Answer text, streamed
    pub answer: AnswerStream,
}

impl QueryResponse {
    /// Response with no sources and a single fixed message
    pub fn not_found(message: &str) -> Self {
        let message = message.to_string();
        Self {
            sources: Vec::new(),
            answer: futures::stream::once(async move { Ok(message) }).boxed(),
        }
    }

    /// Drain the answer stream into a single string
    pub async fn collect_answer(self) -> Result<String> {
        self.answer.try_collect::<Vec<String>>().await.map(|parts| parts.concat())
    }
}

impl std::fmt::Debug for QueryResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResponse")
            .field("sources", &self.sources)
            .field("answer", &"<stream>")
            .finish()
    }
}
