/// Mock language model for testing and offline demo mode.
///
/// Embeddings are deterministic hashes of the input text; completions
/// return either a scripted reply or a canned demo answer.
use std::hash::{DefaultHasher, Hash, Hasher};

use super::{ChatMessage, LanguageModel, LlmError};

const DEMO_ANSWER: &str =
    "This is a demo response. With a real provider configured, this answer \
     would be generated from your documents.";

/// A mock model that produces deterministic vectors from text hashes.
///
/// `reply` overrides the completion output, which lets tests script the
/// model's behavior (echoing input, fixed-length summaries, and so on).
pub struct MockLlm {
    pub dimensions: usize,
    pub reply: Option<String>,
}

impl MockLlm {
    /// Create a new `MockLlm` with the given dimensionality.
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            reply: None,
        }
    }

    /// Script every completion to return `reply` verbatim.
    #[must_use]
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }
}

impl Default for MockLlm {
    fn default() -> Self {
        Self::new(1536)
    }
}

#[async_trait::async_trait]
impl LanguageModel for MockLlm {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        // Generate a deterministic embedding based on text hash
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();

        let bytes = hash.to_le_bytes();
        let mut embedding = Vec::with_capacity(self.dimensions);
        for i in 0..self.dimensions {
            embedding.push(bytes[i % 8] as f32 / 255.0);
        }

        // L2 normalize
        let norm_sq: f32 = embedding.iter().map(|v| v * v).sum();
        if norm_sq > 0.0 {
            let inv = 1.0 / norm_sq.sqrt();
            for v in &mut embedding {
                *v *= inv;
            }
        }

        Ok(embedding)
    }

    async fn complete(
        &self,
        _messages: &[ChatMessage],
        _temperature: f32,
        _max_tokens: usize,
    ) -> Result<String, LlmError> {
        Ok(self
            .reply
            .clone()
            .unwrap_or_else(|| DEMO_ANSWER.to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_embed_dimensions() {
        let llm = MockLlm::new(1536);
        let result = llm.embed("hello world").await.unwrap();
        assert_eq!(result.len(), 1536);
    }

    #[tokio::test]
    async fn test_mock_embed_deterministic() {
        let llm = MockLlm::default();
        let a = llm.embed("hello").await.unwrap();
        let b = llm.embed("hello").await.unwrap();
        assert_eq!(a, b, "same input should produce same output");
    }

    #[tokio::test]
    async fn test_mock_embed_different_inputs() {
        let llm = MockLlm::default();
        let a = llm.embed("hello").await.unwrap();
        let b = llm.embed("world").await.unwrap();
        assert_ne!(a, b, "different inputs should produce different outputs");
    }

    #[tokio::test]
    async fn test_mock_embed_normalized() {
        let llm = MockLlm::default();
        let vec = llm.embed("test normalization").await.unwrap();
        let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!(
            (norm - 1.0).abs() < 0.01,
            "vector should be approximately unit length, got {norm}"
        );
    }

    #[tokio::test]
    async fn test_scripted_reply() {
        let llm = MockLlm::default().with_reply("exactly this");
        let msgs = [ChatMessage::user("anything")];
        let out = llm.complete(&msgs, 0.1, 100).await.unwrap();
        assert_eq!(out, "exactly this");
    }

    #[tokio::test]
    async fn test_default_reply_is_demo_text() {
        let llm = MockLlm::default();
        let out = llm.complete(&[], 0.1, 100).await.unwrap();
        assert!(out.contains("demo response"));
    }
}
