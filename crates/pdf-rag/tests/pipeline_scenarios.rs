//! End-to-end behaviour of the query pipeline against deterministic models

mod common;

use futures::StreamExt;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use common::{EchoLlm, KeywordEmbedder, StaticLoader, Workspace, PAGES};
use pdf_rag::{Error, QueryPipeline, VectorIndex, NOT_FOUND_MESSAGE};

struct Fixture {
    workspace: Workspace,
    embedder: Arc<KeywordEmbedder>,
    llm: Arc<EchoLlm>,
    loader: Arc<StaticLoader>,
}

impl Fixture {
    fn new(pages: &[&str]) -> Self {
        Self {
            workspace: Workspace::new(),
            embedder: Arc::new(KeywordEmbedder::new()),
            llm: Arc::new(EchoLlm::default()),
            loader: Arc::new(StaticLoader::new(pages)),
        }
    }

    async fn pipeline(&self) -> pdf_rag::Result<QueryPipeline> {
        QueryPipeline::with_loader(
            self.workspace.config(),
            self.embedder.clone(),
            self.llm.clone(),
            self.loader.clone(),
        )
        .await
    }
}

#[tokio::test]
async fn test_capital_of_france_cites_page_two() {
    let fixture = Fixture::new(PAGES);
    let pipeline = assert_ok!(fixture.pipeline().await);
    assert_eq!(pipeline.index_count(), 3);

    let response = assert_ok!(pipeline.query("What is the capital of France?", 4, 0.0).await);

    assert!(!response.sources.is_empty());
    assert!(response.sources.len() <= 4);
    assert_eq!(response.sources[0].chunk.page(), 2);
    assert_eq!(response.sources[0].chunk.source_label(), "Page 2");
    assert!(response.sources.iter().any(|s| s.chunk.text().contains("Paris")));

    let answer = assert_ok!(response.collect_answer().await);
    assert!(answer.contains("Paris"));
    assert_eq!(fixture.llm.calls(), 1);
}

#[tokio::test]
async fn test_unanswerable_question_skips_generation() {
    let fixture = Fixture::new(PAGES);
    let pipeline = assert_ok!(fixture.pipeline().await);

    let response = assert_ok!(
        pipeline
            .query("What is the airspeed velocity of an unladen swallow?", 4, 0.9)
            .await
    );

    assert!(response.sources.is_empty());
    let answer = assert_ok!(response.collect_answer().await);
    assert_eq!(answer, NOT_FOUND_MESSAGE);
    assert!(answer.contains("couldn't find"));
    assert_eq!(fixture.llm.calls(), 0);
}

#[tokio::test]
async fn test_raising_threshold_only_removes_sources() {
    let fixture = Fixture::new(PAGES);
    let pipeline = assert_ok!(fixture.pipeline().await);
    let question = "Where do swallows go in winter?";

    let mut previous: Option<Vec<u32>> = None;
    for min_score in [0.0, 0.1, 0.2, 0.4, 0.8] {
        let response = assert_ok!(pipeline.query(question, 4, min_score).await);
        assert!(response.sources.iter().all(|s| s.score >= min_score));

        let kept: Vec<u32> = response.sources.iter().map(|s| s.chunk.index()).collect();
        if let Some(previous) = &previous {
            assert!(kept.iter().all(|i| previous.contains(i)));
        }
        previous = Some(kept);
    }
}

#[tokio::test]
async fn test_second_construction_loads_existing_index() {
    let fixture = Fixture::new(PAGES);

    let first = assert_ok!(fixture.pipeline().await);
    let before = assert_ok!(first.query("capital of France", 2, 0.0).await);
    drop(first);

    let second = assert_ok!(fixture.pipeline().await);
    let after = assert_ok!(second.query("capital of France", 2, 0.0).await);

    assert_eq!(fixture.loader.loads(), 1);
    assert_eq!(fixture.embedder.batches.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(before.sources, after.sources);
}

#[tokio::test]
async fn test_missing_source_fails_initialisation() {
    let fixture = Fixture::new(PAGES);
    std::fs::remove_file(fixture.workspace.source()).unwrap();

    let err = assert_err!(fixture.pipeline().await);
    assert!(matches!(err, Error::SourceNotFound(_)));
    assert!(err.is_initialization_error());
    assert_eq!(fixture.loader.loads(), 0);
}

#[tokio::test]
async fn test_textless_document_fails_initialisation() {
    let fixture = Fixture::new(&["", "   \n  ", ""]);

    let err = assert_err!(fixture.pipeline().await);
    assert!(matches!(err, Error::EmptyDocument(_)));
    assert!(!VectorIndex::exists(&fixture.workspace.index_dir()));
}

#[tokio::test]
async fn test_empty_build_persists_nothing() {
    let workspace = Workspace::new();
    let embedder = KeywordEmbedder::new();

    let err = assert_err!(VectorIndex::build(&workspace.index_dir(), &[], &embedder).await);
    assert!(matches!(err, Error::EmptyInput));
    assert!(!VectorIndex::exists(&workspace.index_dir()));
}

#[tokio::test]
async fn test_changed_embedding_model_is_rejected() {
    let fixture = Fixture::new(PAGES);
    assert_ok!(fixture.pipeline().await);

    let err = assert_err!(
        QueryPipeline::with_loader(
            fixture.workspace.config(),
            Arc::new(KeywordEmbedder::with_model("another-model")),
            fixture.llm.clone(),
            fixture.loader.clone(),
        )
        .await
    );
    assert!(matches!(err, Error::EmbeddingMismatch { .. }));
}

#[tokio::test]
async fn test_blank_question_rejected() {
    let fixture = Fixture::new(PAGES);
    let pipeline = assert_ok!(fixture.pipeline().await);

    let err = assert_err!(pipeline.query("   ", 4, 0.0).await);
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[tokio::test]
async fn test_generation_failure_is_per_query() {
    let fixture = Fixture::new(PAGES);
    let pipeline = assert_ok!(fixture.pipeline().await);

    fixture.llm.fail_next.store(true, std::sync::atomic::Ordering::SeqCst);
    let failed = assert_ok!(pipeline.query("capital of France", 4, 0.0).await);
    assert!(!failed.sources.is_empty());
    let err = assert_err!(failed.collect_answer().await);
    assert!(matches!(err, Error::Generation(_)));

    let retry = assert_ok!(pipeline.query("capital of France", 4, 0.0).await);
    let answer = assert_ok!(retry.collect_answer().await);
    assert!(answer.contains("Paris"));
}

#[tokio::test]
async fn test_dropping_answer_releases_generation() {
    let fixture = Fixture::new(PAGES);
    let pipeline = assert_ok!(fixture.pipeline().await);

    let mut response = assert_ok!(pipeline.query("capital of France", 4, 0.0).await);
    let first = response.answer.next().await;
    assert!(matches!(first, Some(Ok(_))));
    assert_eq!(fixture.llm.live_streams(), 1);

    drop(response);
    assert_eq!(fixture.llm.live_streams(), 0);
}

#[tokio::test]
async fn test_default_query_uses_configured_retrieval() {
    let fixture = Fixture::new(PAGES);
    let pipeline = assert_ok!(fixture.pipeline().await);

    let response = assert_ok!(pipeline.query_default("What is the capital of France?").await);
    let top_k = pipeline.config().retrieval.top_k;
    let min_score = pipeline.config().retrieval.min_score;

    assert!(response.sources.len() <= top_k);
    assert!(response.sources.iter().all(|s| s.score >= min_score));
    assert_eq!(response.sources[0].chunk.page(), 2);
}

#[tokio::test]
async fn test_chunk_dump_written_when_configured() {
    let fixture = Fixture::new(PAGES);
    let dump = fixture.workspace.dir.path().join("chunks");
    let mut config = fixture.workspace.config();
    config.paths.chunk_dir = Some(dump.clone());

    let pipeline = assert_ok!(
        QueryPipeline::with_loader(
            config,
            fixture.embedder.clone(),
            fixture.llm.clone(),
            fixture.loader.clone(),
        )
        .await
    );

    for i in 0..pipeline.index_count() {
        assert!(dump.join(format!("chunk_{}.txt", i)).is_file());
    }
    let first = std::fs::read_to_string(dump.join("chunk_0.txt")).unwrap();
    assert!(first.starts_with("The swallow is a small bird."));
}
