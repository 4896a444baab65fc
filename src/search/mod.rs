//! Retrieval & answer engine: request/response models, result caching,
//! prompt composition, and the multi-strategy search engine itself.
use serde::{Deserialize, Serialize};

pub mod cache;
pub mod engine;
pub mod prompts;

use crate::store::Metadata;

fn default_search_top_k() -> usize {
    10
}

fn default_ask_top_k() -> usize {
    8
}

/// How retrieved context is combined into the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    /// Chunk-level context only.
    Basic,
    /// Chunks plus logical-group summaries.
    #[default]
    Enhanced,
    /// Chunks plus paragraph summaries for wider grounding.
    Paragraph,
}

/// Parameters for a raw multi-collection search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,

    #[serde(default = "default_search_top_k")]
    pub top_k: usize,

    /// Collections to search; all searchable tiers when omitted.
    #[serde(default)]
    pub collections: Option<Vec<String>>,

    /// Restrict to these document filenames.
    #[serde(default)]
    pub documents: Option<Vec<String>>,

    /// Exclude these document filenames.
    #[serde(default)]
    pub exclude_documents: Option<Vec<String>>,

    /// Minimum similarity score; results below it are dropped.
    #[serde(default)]
    pub threshold: Option<f32>,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: default_search_top_k(),
            collections: None,
            documents: None,
            exclude_documents: None,
            threshold: None,
        }
    }
}

/// One ranked hit from a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub content: String,
    /// Normalized similarity in [0, 1].
    pub score: f32,
    /// Source document filename.
    pub document: String,
    pub chunk_id: String,
    /// Which retrieval tier produced the hit.
    pub collection: String,
    pub metadata: Metadata,
}

/// A completed search, cached under `search_id` for later reuse.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub search_id: String,
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total_results: usize,
    pub unique_documents: Vec<String>,
    pub chunk_ids: Vec<String>,
    pub processing_time: f64,
    pub collections_searched: Vec<String>,
}

/// Parameters for the question-answering path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskRequest {
    pub question: String,

    #[serde(default = "default_ask_top_k")]
    pub top_k: usize,

    /// Restrict retrieval to these document filenames.
    #[serde(default)]
    pub documents: Option<Vec<String>>,

    /// Exclude these document filenames from retrieval.
    #[serde(default)]
    pub exclude_documents: Option<Vec<String>>,

    /// Use exactly these chunks instead of searching.
    #[serde(default)]
    pub chunk_ids: Option<Vec<String>>,

    /// Reuse the results of a previous search.
    #[serde(default)]
    pub search_id: Option<String>,

    #[serde(default)]
    pub conversation_history: String,

    #[serde(default)]
    pub search_strategy: SearchStrategy,
}

impl AskRequest {
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            top_k: default_ask_top_k(),
            documents: None,
            exclude_documents: None,
            chunk_ids: None,
            search_id: None,
            conversation_history: String::new(),
            search_strategy: SearchStrategy::default(),
        }
    }
}

/// The generated answer with per-origin source attribution.
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub sources: Vec<String>,
    pub processing_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_defaults_via_serde() {
        let request: SearchRequest = serde_json::from_str(r#"{"query": "q"}"#).unwrap();
        assert_eq!(request.top_k, 10);
        assert!(request.collections.is_none());
        assert!(request.threshold.is_none());
    }

    #[test]
    fn test_ask_request_defaults_via_serde() {
        let request: AskRequest = serde_json::from_str(r#"{"question": "why"}"#).unwrap();
        assert_eq!(request.top_k, 8);
        assert_eq!(request.search_strategy, SearchStrategy::Enhanced);
        assert!(request.conversation_history.is_empty());
    }

    #[test]
    fn test_strategy_serde_names() {
        assert_eq!(
            serde_json::to_string(&SearchStrategy::Paragraph).unwrap(),
            "\"paragraph\""
        );
        let parsed: SearchStrategy = serde_json::from_str("\"basic\"").unwrap();
        assert_eq!(parsed, SearchStrategy::Basic);
    }
}
