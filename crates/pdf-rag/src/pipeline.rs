//! Retrieval-augmented query pipeline
//!
//! Construction builds or loads the vector index once. Each query then runs
//! search, score filtering and generation independently of every other query.

use std::sync::Arc;
use std::time::Instant;

use crate::config::RagConfig;
use crate::error::{Error, Result};
use crate::generation::Generator;
use crate::ingestion::{write_chunk_files, DocumentLoader, PdfLoader, TextChunker};
use crate::providers::{EmbeddingProvider, LlmProvider};
use crate::retrieval::VectorIndex;
use crate::types::{QueryResponse, ScoredResult};

/// Returned in place of an answer when no chunk clears the score threshold
pub const NOT_FOUND_MESSAGE: &str = "I couldn't find an answer to that question in the document.";

/// Separator placed between chunk texts in the generation context
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Question answering over a single indexed document
pub struct QueryPipeline {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    index: VectorIndex,
    generator: Generator,
}

impl QueryPipeline {
    /// Build or load the index using the PDF loader
    pub async fn new(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
    ) -> Result<Self> {
        Self::with_loader(config, embedder, llm, Arc::new(PdfLoader::new())).await
    }

    /// Build or load the index with a custom document loader
    pub async fn with_loader(
        config: RagConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        llm: Arc<dyn LlmProvider>,
        loader: Arc<dyn DocumentLoader>,
    ) -> Result<Self> {
        config.validate()?;

        let index_dir = config.paths.index_dir.clone();
        let index = if VectorIndex::exists(&index_dir) {
            tracing::info!("Loading existing index from {}", index_dir.display());
            VectorIndex::load(&index_dir, embedder.as_ref()).await?
        } else {
            tracing::info!("No index at {}, building from source", index_dir.display());
            Self::build_index(&config, embedder.as_ref(), loader.as_ref()).await?
        };

        let generator = Generator::new(llm, &config.generation.template)?;

        tracing::info!(
            "Pipeline ready: {} chunks, embeddings {}, generation {}",
            index.count(),
            index.manifest().embedding_model,
            generator.model()
        );

        Ok(Self {
            config,
            embedder,
            index,
            generator,
        })
    }

    async fn build_index(
        config: &RagConfig,
        embedder: &dyn EmbeddingProvider,
        loader: &dyn DocumentLoader,
    ) -> Result<VectorIndex> {
        let source = &config.paths.source_pdf;
        if !source.exists() {
            return Err(Error::SourceNotFound(source.clone()));
        }

        let start = Instant::now();
        let pages = loader.load_pages(source).await?;
        let chunks = TextChunker::from_config(&config.chunking).chunk_pages(&pages);

        tracing::info!(
            "{} produced {} pages and {} chunks from {}",
            loader.name(),
            pages.len(),
            chunks.len(),
            source.display()
        );

        if chunks.is_empty() {
            return Err(Error::EmptyDocument(source.clone()));
        }

        if let Some(dir) = &config.paths.chunk_dir {
            write_chunk_files(dir, &chunks)?;
        }

        let index = VectorIndex::build(&config.paths.index_dir, &chunks, embedder).await?;
        tracing::info!("Index built in {:?}", start.elapsed());
        Ok(index)
    }

    /// Answer `question` from the `top_k` nearest chunks scoring at least `min_score`
    ///
    /// When no chunk passes the threshold the generator is not called and the
    /// answer stream holds only [`NOT_FOUND_MESSAGE`].
    pub async fn query(&self, question: &str, top_k: usize, min_score: f32) -> Result<QueryResponse> {
        if question.trim().is_empty() {
            return Err(Error::InvalidArgument("question must not be empty".to_string()));
        }

        let hits = self.index.search(question, top_k, self.embedder.as_ref()).await?;
        let retrieved = hits.len();

        let sources: Vec<ScoredResult> = hits.into_iter().filter(|r| r.score >= min_score).collect();

        tracing::info!(
            "Query kept {} of {} results (top_k={}, min_score={})",
            sources.len(),
            retrieved,
            top_k,
            min_score
        );

        if sources.is_empty() {
            return Ok(QueryResponse::not_found(NOT_FOUND_MESSAGE));
        }

        let context = sources
            .iter()
            .map(|r| r.chunk.text())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR);

        let answer = self.generator.answer(&context, question);
        Ok(QueryResponse { sources, answer })
    }

    /// Answer with the configured retrieval defaults
    pub async fn query_default(&self, question: &str) -> Result<QueryResponse> {
        self.query(question, self.config.retrieval.top_k, self.config.retrieval.min_score)
            .await
    }

    /// Number of indexed chunks
    pub fn index_count(&self) -> usize {
        self.index.count()
    }

    /// The underlying index
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Active configuration
    pub fn config(&self) -> &RagConfig {
        &self.config
    }
}

impl std::fmt::Debug for QueryPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPipeline")
            .field("index", &self.index)
            .field("embedder", &self.embedder.model())
            .field("generator", &self.generator.model())
            .finish()
    }
}
