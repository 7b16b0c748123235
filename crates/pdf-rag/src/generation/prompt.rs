//! Prompt template for grounded answers

use crate::error::{Error, Result};

/// Instruction template that keeps the model inside the retrieved context
pub const DEFAULT_TEMPLATE: &str = r#"You are an expert assistant. Answer the user's question using ONLY the context below.

IMPORTANT INSTRUCTIONS:
1. Use only facts stated in the context; do not rely on outside knowledge
2. Rephrase the relevant information in your own words, clearly and concisely
3. If the context does not contain the answer, say that you cannot answer based on the provided document

Context:
---
{context}
---

Question: {question}

Answer:"#;

const CONTEXT_SLOT: &str = "{context}";
const QUESTION_SLOT: &str = "{question}";

/// A validated prompt template with `{context}` and `{question}` slots
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Create a template, checking both slots are present
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();

        for slot in [CONTEXT_SLOT, QUESTION_SLOT] {
            if !template.contains(slot) {
                return Err(Error::Config(format!(
                    "prompt template is missing the {} placeholder",
                    slot
                )));
            }
        }

        Ok(Self { template })
    }

    /// Fill in context and question
    ///
    /// Slots are substituted in a single pass so text inside the context that
    /// looks like a placeholder is left alone.
    pub fn render(&self, context: &str, question: &str) -> String {
        let mut rendered = String::with_capacity(self.template.len() + context.len() + question.len());
        let mut rest = self.template.as_str();

        while let Some(start) = rest.find('{') {
            rendered.push_str(&rest[..start]);
            let tail = &rest[start..];

            if tail.starts_with(CONTEXT_SLOT) {
                rendered.push_str(context);
                rest = &tail[CONTEXT_SLOT.len()..];
            } else if tail.starts_with(QUESTION_SLOT) {
                rendered.push_str(question);
                rest = &tail[QUESTION_SLOT.len()..];
            } else {
                rendered.push('{');
                rest = &tail[1..];
            }
        }
        rendered.push_str(rest);

        rendered
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_renders_both_slots() {
        let prompt = PromptTemplate::default().render("Paris is in France.", "Where is Paris?");

        assert!(prompt.contains("Context:\n---\nParis is in France.\n---"));
        assert!(prompt.contains("Question: Where is Paris?"));
        assert!(prompt.contains("ONLY the context"));
        assert!(!prompt.contains("{context}"));
    }

    #[test]
    fn test_missing_slot_rejected() {
        let err = PromptTemplate::new("Answer {question} please").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_context_placeholders_not_expanded() {
        let template = PromptTemplate::new("C: {context} Q: {question} {other}").unwrap();
        let prompt = template.render("literal {question}", "why?");

        assert_eq!(prompt, "C: literal {question} Q: why? {other}");
    }
}
