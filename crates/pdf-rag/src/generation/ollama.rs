//! Ollama HTTP client for embeddings and streamed generation

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::sleep;

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::types::AnswerStream;

/// Ollama API client
///
/// Embedding requests are retried with exponential backoff and bounded as a
/// whole by `timeout_secs`. Generation requests are streamed and never
/// retried; `timeout_secs` only bounds each wait for more output, so a long
/// answer that keeps producing fragments is never cut off.
#[derive(Clone)]
pub struct OllamaClient {
    /// HTTP client
    client: Client,
    /// Configuration
    config: LlmConfig,
    /// Embedding model name
    embed_model: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One NDJSON line of a streamed `/api/generate` response
#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(config: &LlmConfig, embed_model: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
            embed_model: embed_model.into(),
        })
    }

    /// Generation model name
    pub fn generate_model(&self) -> &str {
        &self.config.generate_model
    }

    /// Embedding model name
    pub fn embed_model(&self) -> &str {
        &self.embed_model
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries {
                        let delay = Duration::from_secs(2u64.pow(attempt));
                        tracing::warn!(
                            "Request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::embedding("Unknown error")))
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.config.base_url);

        match self.client.get(&url).timeout(self.timeout()).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Generate an embedding using Ollama with retry
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.config.base_url);

        self.retry_request(|| {
            let request = EmbedRequest {
                model: self.embed_model.clone(),
                prompt: text.to_string(),
            };
            let url = url.clone();
            let client = self.client.clone();
            let timeout = self.timeout();

            async move {
                let response = client
                    .post(&url)
                    .timeout(timeout)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::embedding(format!("Embedding request failed: {}", e)))?;

                if !response.status().is_success() {
                    return Err(Error::embedding(format!(
                        "Embedding failed: HTTP {}",
                        response.status()
                    )));
                }

                let embed_response: EmbedResponse = response.json().await.map_err(|e| {
                    Error::embedding(format!("Failed to parse embedding response: {}", e))
                })?;

                if embed_response.embedding.is_empty() {
                    return Err(Error::embedding("Ollama returned an empty embedding"));
                }

                Ok(embed_response.embedding)
            }
        })
        .await
    }

    /// Stream a completion for a rendered prompt
    ///
    /// The HTTP request is only sent once the stream is first polled.
    pub fn generate_stream(&self, prompt: String) -> AnswerStream {
        let url = format!("{}/api/generate", self.config.base_url);
        let client = self.client.clone();
        let idle_timeout = self.timeout();
        let request = GenerateRequest {
            model: self.config.generate_model.clone(),
            prompt,
            stream: true,
            options: GenerateOptions {
                temperature: self.config.temperature,
            },
        };

        let start = async move {
            tracing::debug!("Starting generation with model: {}", request.model);

            let response = tokio::time::timeout(idle_timeout, client.post(&url).json(&request).send())
                .await
                .map_err(|_| {
                    Error::generation(format!("No response within {:?}", idle_timeout))
                })?
                .map_err(|e| Error::generation(format!("Generation request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::generation(format!(
                    "Generation failed: HTTP {} - {}",
                    status, body
                )));
            }

            Ok(decode_ndjson_stream(Box::pin(response.bytes_stream()), idle_timeout))
        };

        stream::once(start).try_flatten().boxed()
    }
}

/// Splits a byte stream into complete lines, holding back partial ones
#[derive(Debug, Default)]
struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every line completed by them
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..pos]).trim().to_string());
        }
        lines
    }

    /// Whatever remains once the stream has ended
    fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).trim().to_string();
        self.pending.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

struct DecodeState<S> {
    bytes: S,
    idle_timeout: Duration,
    buffer: LineBuffer,
    lines: VecDeque<String>,
    finished: bool,
}

/// Turn Ollama's NDJSON body into answer fragments
///
/// Fails if the body goes quiet for longer than `idle_timeout`.
fn decode_ndjson_stream<S, E>(bytes: S, idle_timeout: Duration) -> AnswerStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = DecodeState {
        bytes,
        idle_timeout,
        buffer: LineBuffer::default(),
        lines: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.lines.pop_front() {
                if line.is_empty() {
                    continue;
                }

                match serde_json::from_str::<StreamChunk>(&line) {
                    Ok(StreamChunk { error: Some(message), .. }) => {
                        state.lines.clear();
                        state.finished = true;
                        return Some((Err(Error::generation(message)), state));
                    }
                    Ok(chunk) => {
                        if chunk.done {
                            state.lines.clear();
                            state.finished = true;
                        }
                        if !chunk.response.is_empty() {
                            return Some((Ok(chunk.response), state));
                        }
                        continue;
                    }
                    Err(e) => {
                        state.lines.clear();
                        state.finished = true;
                        return Some((
                            Err(Error::generation(format!("Malformed stream line: {}", e))),
                            state,
                        ));
                    }
                }
            }

            if state.finished {
                return None;
            }

            let next = match tokio::time::timeout(state.idle_timeout, state.bytes.next()).await {
                Ok(next) => next,
                Err(_) => {
                    state.finished = true;
                    let message = format!("No output for {:?}", state.idle_timeout);
                    return Some((Err(Error::generation(message)), state));
                }
            };

            match next {
                Some(Ok(bytes)) => {
                    let lines = state.buffer.push(&bytes);
                    state.lines.extend(lines);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(Error::generation(format!("Stream error: {}", e))), state));
                }
                None => {
                    if let Some(rest) = state.buffer.finish() {
                        state.lines.push_back(rest);
                    }
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}
