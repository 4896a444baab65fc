/// OpenAI-compatible HTTP client implementing [`LanguageModel`].
///
/// Speaks the `/embeddings` and `/chat/completions` JSON surface, which
/// most hosted and local providers accept.
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ChatMessage, LanguageModel, LlmError};

pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
    dimensions: usize,
    /// Provider-side input limit; embed() truncates to this many characters.
    embed_input_limit: usize,
}

impl OpenAiClient {
    pub fn new(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        dimensions: usize,
        embed_input_limit: usize,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            dimensions,
            embed_input_limit,
        }
    }

    /// Truncate text to the provider input limit on a char boundary.
    fn truncate_input<'a>(&self, text: &'a str) -> &'a str {
        match text.char_indices().nth(self.embed_input_limit) {
            Some((idx, _)) => &text[..idx],
            None => text,
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let input = self.truncate_input(text);
        debug!("embedding {} chars via {}", input.len(), self.embedding_model);

        let resp = self
            .http
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.embedding_model,
                "input": input,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::EmbeddingFailed(format!("{status}: {body}")));
        }

        let parsed: EmbeddingResponse = resp.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| LlmError::BadResponse("embedding response had no data".to_string()))
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: usize,
    ) -> Result<String, LlmError> {
        let resp = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.chat_model,
                "messages": messages,
                "temperature": temperature,
                "max_tokens": max_tokens,
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::CompletionFailed(format!("{status}: {body}")));
        }

        let parsed: CompletionResponse = resp.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::BadResponse("completion had no choices".to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
