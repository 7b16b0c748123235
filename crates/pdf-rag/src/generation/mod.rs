//! Grounded answer generation

pub mod ollama;
pub mod prompt;

use std::sync::Arc;

pub use ollama::OllamaClient;
pub use prompt::{PromptTemplate, DEFAULT_TEMPLATE};

use crate::error::Result;
use crate::providers::LlmProvider;
use crate::types::AnswerStream;

/// Language model bound to a fixed grounding template
pub struct Generator {
    llm: Arc<dyn LlmProvider>,
    template: PromptTemplate,
}

impl Generator {
    /// Bind a provider to a template string
    pub fn new(llm: Arc<dyn LlmProvider>, template: &str) -> Result<Self> {
        Ok(Self {
            llm,
            template: PromptTemplate::new(template)?,
        })
    }

    /// Bind a provider to the default template
    pub fn with_default_template(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            template: PromptTemplate::default(),
        }
    }

    /// Stream an answer to `question` drawn from `context`
    pub fn answer(&self, context: &str, question: &str) -> AnswerStream {
        let prompt = self.template.render(context, question);
        tracing::debug!(
            "Prompting {} ({}) with {} chars of context",
            self.llm.name(),
            self.llm.model(),
            context.len()
        );
        self.llm.generate_stream(prompt)
    }

    /// Model used for generation
    pub fn model(&self) -> &str {
        self.llm.model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::StreamExt;
    use std::sync::Mutex;

    /// Records prompts it receives
    #[derive(Default)]
    struct Recorder {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LlmProvider for Recorder {
        fn generate_stream(&self, prompt: String) -> AnswerStream {
            self.prompts.lock().unwrap().push(prompt);
            futures::stream::iter(vec![Ok("Par".to_string()), Ok("is".to_string())]).boxed()
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "recorder"
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    #[tokio::test]
    async fn test_answer_renders_prompt_and_streams() {
        let llm = Arc::new(Recorder::default());
        let generator = Generator::with_default_template(llm.clone());

        let answer: Vec<String> = generator
            .answer("The capital of France is Paris.", "What is the capital of France?")
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(answer.concat(), "Paris");
        let prompts = llm.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("The capital of France is Paris."));
        assert!(prompts[0].contains("Question: What is the capital of France?"));
    }

    #[tokio::test]
    async fn test_generate_collects_stream() {
        let llm = Recorder::default();
        assert_eq!(llm.generate("prompt").await.unwrap(), "Paris");
    }

    #[test]
    fn test_invalid_template_fails_construction() {
        let llm = Arc::new(Recorder::default());
        assert!(Generator::new(llm, "no slots here").is_err());
    }
}
