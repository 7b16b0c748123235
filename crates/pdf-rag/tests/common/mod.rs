//! Deterministic stand-ins for the embedding model, language model and PDF loader

#![allow(dead_code)]

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use pdf_rag::{
    AnswerStream, DocumentLoader, EmbeddingProvider, Error, LlmProvider, PageText, RagConfig,
    Result,
};

const DIMENSIONS: usize = 1024;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "by", "for", "from", "in", "is", "it", "of", "on", "or",
    "that", "the", "to", "what", "which", "who", "with",
];

/// Bag-of-words embedder: each non-stopword is hashed onto one axis
pub struct KeywordEmbedder {
    model: String,
    pub batches: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::with_model("keyword-test")
    }

    pub fn with_model(model: &str) -> Self {
        Self {
            model: model.to_string(),
            batches: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .filter(|w| !w.is_empty() && !STOPWORDS.contains(&w.as_str()))
        {
            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            vector[(hasher.finish() % DIMENSIONS as u64) as usize] += 1.0;
        }
        Ok(vector)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

/// Counts live answer streams
struct StreamGuard(Arc<AtomicUsize>);

impl StreamGuard {
    fn new(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live)
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Language model that answers by echoing the context it was given, word by word
#[derive(Default)]
pub struct EchoLlm {
    /// Number of prompts received
    pub calls: AtomicUsize,
    /// Streams not yet dropped
    pub live_streams: Arc<AtomicUsize>,
    /// When set, the next stream fails instead of answering
    pub fail_next: AtomicBool,
}

impl EchoLlm {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for EchoLlm {
    fn generate_stream(&self, prompt: String) -> AnswerStream {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_next.swap(false, Ordering::SeqCst) {
            return stream::once(async { Err(Error::generation("model offline")) }).boxed();
        }

        let context = prompt
            .split_once("Context:\n---\n")
            .and_then(|(_, rest)| rest.split_once("\n---"))
            .map(|(context, _)| context.to_string())
            .unwrap_or_default();
        let fragments: Vec<String> = context.split(' ').map(|w| format!("{} ", w)).collect();

        let guard = StreamGuard::new(Arc::clone(&self.live_streams));
        stream::iter(fragments)
            .map(move |fragment| {
                let _held = &guard;
                Ok(fragment)
            })
            .boxed()
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "echo"
    }

    fn model(&self) -> &str {
        "echo-1"
    }
}

/// Serves fixed pages regardless of path
pub struct StaticLoader {
    pages: Vec<PageText>,
    pub loads: AtomicUsize,
}

impl StaticLoader {
    pub fn new(pages: &[&str]) -> Self {
        Self {
            pages: pages
                .iter()
                .enumerate()
                .map(|(i, text)| PageText::new(i as u32 + 1, *text))
                .collect(),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentLoader for StaticLoader {
    async fn load_pages(&self, _path: &Path) -> Result<Vec<PageText>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.pages.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

/// A workspace with a placeholder source file and an index directory
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("document.pdf"), b"%PDF-1.5 placeholder").unwrap();
        Self { dir }
    }

    pub fn source(&self) -> PathBuf {
        self.dir.path().join("document.pdf")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    pub fn config(&self) -> RagConfig {
        let mut config = RagConfig::default();
        config.paths.source_pdf = self.source();
        config.paths.index_dir = self.index_dir();
        config
    }
}

/// A short document about birds, France and PDFs
pub const PAGES: &[&str] = &[
    "The swallow is a small bird. Swallows migrate south for the winter and return in spring.",
    "The capital of France is Paris. Paris is known for the Eiffel Tower and its museums.",
    "A PDF file stores text in content streams. Each page is described separately.",
];
