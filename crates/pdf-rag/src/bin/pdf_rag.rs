//! Command-line front end
//!
//! Run with: cargo run -p pdf-rag -- ask "What is this document about?"

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_rag::{LlmProvider, OllamaProvider, QueryPipeline, QueryResponse, RagConfig};

#[derive(Parser, Debug)]
#[command(name = "pdf-rag", about = "Ask questions about a PDF and get cited answers", version)]
struct Cli {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(long, global = true, env = "PDF_RAG_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the index if missing and report its size
    Index,
    /// Answer a single question
    Ask {
        question: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Minimum similarity for a chunk to be used
        #[arg(long)]
        min_score: Option<f32>,
    },
    /// Answer questions read line by line from stdin
    Chat,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only answers
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RagConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => RagConfig::default(),
    };

    tracing::info!("Configuration loaded");
    tracing::info!("  - Source PDF: {}", config.paths.source_pdf.display());
    tracing::info!("  - Index dir: {}", config.paths.index_dir.display());
    tracing::info!("  - Embedding model: {}", config.embeddings.model);
    tracing::info!("  - LLM model: {}", config.llm.generate_model);

    let provider = OllamaProvider::new(&config.llm, &config.embeddings)?;
    if !provider.llm().health_check().await.unwrap_or(false) {
        tracing::warn!("Ollama not available at {}", config.llm.base_url);
        tracing::warn!("  Start it with: ollama serve");
        tracing::warn!(
            "  Pull models: ollama pull {} && ollama pull {}",
            config.embeddings.model,
            config.llm.generate_model
        );
    }

    let (embedder, llm) = provider.split();
    let pipeline = QueryPipeline::new(config, Arc::new(embedder), Arc::new(llm))
        .await
        .context("failed to initialise the pipeline")?;

    match cli.command {
        Command::Index => {
            println!(
                "Index at {} holds {} chunks",
                pipeline.index().location().display(),
                pipeline.index_count()
            );
        }
        Command::Ask {
            question,
            top_k,
            min_score,
        } => {
            let defaults = &pipeline.config().retrieval;
            let response = pipeline
                .query(
                    &question,
                    top_k.unwrap_or(defaults.top_k),
                    min_score.unwrap_or(defaults.min_score),
                )
                .await?;
            print_response(response).await?;
        }
        Command::Chat => {
            println!("Ask a question about the document (Ctrl+D to quit).");
            let mut lines = BufReader::new(tokio::io::stdin()).lines();

            loop {
                print!("\n> ");
                std::io::stdout().flush()?;

                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }

                match pipeline.query_default(question).await {
                    Ok(response) => {
                        if let Err(e) = print_response(response).await {
                            eprintln!("Error: {:#}", e);
                        }
                    }
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
        }
    }

    Ok(())
}

/// Stream the answer to stdout, then list its sources
async fn print_response(response: QueryResponse) -> Result<()> {
    let QueryResponse { sources, mut answer } = response;
    let mut stdout = std::io::stdout();

    while let Some(fragment) = answer.next().await {
        let fragment = fragment.context("answer generation failed")?;
        write!(stdout, "{}", fragment)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    if !sources.is_empty() {
        writeln!(stdout, "\nSources:")?;
        for source in &sources {
            writeln!(stdout, "  {} {}", source.format_inline(), preview(source.chunk.text()))?;
        }
    }

    Ok(())
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 80;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(MAX_CHARS).collect();
        format!("{}...", cut)
    }
}
