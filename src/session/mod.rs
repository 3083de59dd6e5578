// Chat session
// Conversation history plus the ask/reset surface over the shared pipeline


use std::fmt;
use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::answer::AnswerComposer;
use crate::indexer::{IndexOutcome, Indexer};
use crate::retriever::Retriever;
use crate::{RagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Answering,
}

impl fmt::Display for SessionState {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Ready => write!(f, "ready"),
            Self::Answering => write!(f, "answering"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    #[inline]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    #[inline]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// One conversation over the shared index, embedder and composer
///
/// History belongs to the session. Everything else is shared through `Arc`s,
/// so any number of sessions can answer against one index.
pub struct ChatSession {
    id: Uuid,
    state: SessionState,
    history: Vec<ChatTurn>,
    indexer: Arc<Indexer>,
    retriever: Arc<Retriever>,
    composer: Arc<dyn AnswerComposer>,
    k: usize,
}

impl ChatSession {
    #[inline]
    pub fn new(
        indexer: Arc<Indexer>,
        retriever: Arc<Retriever>,
        composer: Arc<dyn AnswerComposer>,
        k: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SessionState::Uninitialized,
            history: Vec::new(),
            indexer,
            retriever,
            composer,
            k,
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    #[inline]
    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Make sure the index is built or loaded, then accept questions
    ///
    /// Returns `None` when the shared index was already available. On failure
    /// the session stays uninitialized.
    #[inline]
    pub async fn initialize(&mut self) -> Result<Option<IndexOutcome>> {
        let span = info_span!("session", id = %self.id);
        self.prepare().instrument(span).await
    }

    async fn prepare(&mut self) -> Result<Option<IndexOutcome>> {
        if self.state != SessionState::Uninitialized {
            return Ok(None);
        }

        let outcome = self.indexer.ensure_available().await?;

        self.state = SessionState::Ready;
        info!(
            "Session ready with {} indexed chunks",
            self.indexer.index().len()
        );
        Ok(outcome)
    }

    /// Answer `question` from the indexed corpus
    ///
    /// The question and the answer are appended to the history. If answering
    /// fails the question is removed again and the error is returned.
    #[inline]
    pub fn ask(&mut self, question: &str) -> Result<String> {
        let span = info_span!("session", id = %self.id);
        let _guard = span.enter();

        if self.state != SessionState::Ready {
            return Err(RagError::NotReady);
        }

        self.state = SessionState::Answering;
        self.history.push(ChatTurn::user(question));

        let result = self.answer(question);
        match &result {
            Ok(answer) => self.history.push(ChatTurn::assistant(answer.as_str())),
            Err(e) => {
                warn!("Failed to answer {:?}: {}", question, e);
                self.history.pop();
            }
        }

        self.state = SessionState::Ready;
        result
    }

    /// Forget the conversation so far
    #[inline]
    pub fn reset_session(&mut self) {
        debug!("Clearing {} turns from session {}", self.history.len(), self.id);
        self.history.clear();
    }

    fn answer(&self, question: &str) -> Result<String> {
        let context = self.retriever.retrieve(question, self.k)?;
        let answer = self.composer.compose(question, &context)?;

        if answer.trim().is_empty() {
            return Err(RagError::Generation(format!(
                "{} composer returned an empty answer",
                self.composer.name()
            )));
        }

        debug!(
            "Answered with {} composer from {} passages",
            self.composer.name(),
            context.len()
        );
        Ok(answer)
    }
}
