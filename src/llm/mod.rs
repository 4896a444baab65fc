/// LanguageModel trait and shared types for the embedding/completion service.
///
/// The core never talks to a provider directly; everything goes through
/// this trait so tests and offline runs can swap in [`mock::MockLlm`].
pub mod mock;
pub mod openai;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when calling the language-model service.
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("embedding request failed: {0}")]
    EmbeddingFailed(String),

    #[error("completion request failed: {0}")]
    CompletionFailed(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response shape: {0}")]
    BadResponse(String),
}

/// A single role-tagged chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Trait for the external language-model service.
///
/// All implementations must be `Send + Sync` to allow concurrent use
/// behind `Arc`.
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    /// Embed a single text string into a fixed-length vector.
    ///
    /// Implementations truncate the input to the provider's limit before
    /// sending it.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Generate a completion for an ordered list of role-tagged messages.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, LlmError>;

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}
