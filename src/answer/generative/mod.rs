
use tracing::{debug, warn};

use super::AnswerComposer;
use crate::embeddings::OllamaClient;
use crate::index::RetrievalResult;
use crate::{RagError, Result};

pub const NO_RELEVANT_INFORMATION: &str =
    "Sorry, I couldn't find any relevant information for your question.";

const SYSTEM_PROMPT: &str = "You are an assistant that answers questions using the context provided.

Context:
{context}

Instructions:
1. Answer the question based on the context above.
2. If the context does not contain the information, say that you don't have it.
3. Keep the answer informative and helpful.
4. Where relevant, add an example or a short explanation.";

/// Answers with an Ollama chat model conditioned on the retrieved passages
pub struct OllamaComposer {
    client: OllamaClient,
    model: String,
    temperature: f32,
}

impl OllamaComposer {
    #[inline]
    pub fn new(client: OllamaClient, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            model: model.into(),
            temperature,
        }
    }

    #[inline]
    pub fn system_prompt(context: &RetrievalResult) -> String {
        SYSTEM_PROMPT.replace("{context}", &context.context_text())
    }
}

impl AnswerComposer for OllamaComposer {
    #[inline]
    fn compose(&self, question: &str, context: &RetrievalResult) -> Result<String> {
        if context.is_empty() {
            debug!("No passages retrieved, skipping the model call");
            return Ok(NO_RELEVANT_INFORMATION.to_string());
        }

        self.client
            .chat(
                &self.model,
                &Self::system_prompt(context),
                question,
                self.temperature,
            )
            .map_err(|e| {
                warn!("Chat model {} failed: {:#}", self.model, e);
                RagError::Generation(format!("{:#}", e))
            })
    }

    #[inline]
    fn name(&self) -> &'static str {
        "ollama"
    }
}
