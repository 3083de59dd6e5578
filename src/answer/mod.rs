// Answer composition
// Turns a question plus retrieved passages into the reply shown to the user

pub mod generative;
pub mod templates;

pub use generative::OllamaComposer;
pub use templates::{Matcher, Template, TemplateComposer, Topic};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::index::RetrievalResult;

/// Produces answer text from a question and its retrieved context
///
/// Implementations must be deterministic for a fixed corpus whenever their
/// backend is.
pub trait AnswerComposer: Send + Sync {
    fn compose(&self, question: &str, context: &RetrievalResult) -> Result<String>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// What to answer when a topic's entity filter matches none of the refined passages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityFallback {
    /// Use every refined passage as context
    #[default]
    KeepContext,
    /// Reply that nothing is known about the entity
    NoAnswer,
}
