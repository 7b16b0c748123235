//! LLM provider trait for streaming completions

use async_trait::async_trait;
use futures::TryStreamExt;

use crate::error::Result;
use crate::types::AnswerStream;

/// Trait for prompt-in, text-out language models
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama server (llama3.2, phi3, etc.)
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stream the completion of a fully rendered prompt
    ///
    /// The returned stream must not start any work before it is first polled,
    /// and must release the request when dropped.
    fn generate_stream(&self, prompt: String) -> AnswerStream;

    /// Generate the full completion at once
    async fn generate(&self, prompt: &str) -> Result<String> {
        let parts: Vec<String> = self.generate_stream(prompt.to_string()).try_collect().await?;
        Ok(parts.concat())
    }

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
