/// Multi-collection search and question answering.
///
/// Per request the engine gathers context (cached, explicit, or fresh),
/// composes a strategy-specific prompt, generates the answer, and
/// attributes sources by origin tier. Any single collection or chunk
/// failing is logged and skipped; only a total absence of context
/// short-circuits the request.
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::cache::SearchCache;
use super::prompts::{self, ContextBlocks};
use super::{AskRequest, ChatResponse, SearchRequest, SearchResponse, SearchResult, SearchStrategy};
use crate::config::Config;
use crate::llm::{ChatMessage, LanguageModel};
use crate::store::{DocumentFilter, VectorStore, collections, record_filename};

const NO_CONTEXT_ANSWER: &str =
    "No relevant documents found. Please upload some documents first.";

pub struct SearchEngine {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LanguageModel>,
    config: Arc<Config>,
    cache: SearchCache,
}

impl SearchEngine {
    pub fn new(store: Arc<dyn VectorStore>, llm: Arc<dyn LanguageModel>, config: Arc<Config>) -> Self {
        let cache = SearchCache::new(config.search_cache_capacity);
        Self {
            store,
            llm,
            config,
            cache,
        }
    }

    /// The process-wide search-result cache.
    #[must_use]
    pub fn cache(&self) -> &SearchCache {
        &self.cache
    }

    // ── Raw search ──────────────────────────────────────────────────

    /// Query each requested collection with the same embedding, merge and
    /// rank the hits, and cache the response for later reuse.
    ///
    /// A failing collection is omitted from `collections_searched`; it
    /// never aborts the whole search.
    pub async fn search_documents(&self, request: &SearchRequest) -> SearchResponse {
        let started = Instant::now();

        let requested: Vec<String> = request.collections.clone().unwrap_or_else(|| {
            collections::SEARCHABLE.iter().map(|s| (*s).to_string()).collect()
        });

        let filter = DocumentFilter {
            include: request.documents.clone(),
            exclude: request.exclude_documents.clone(),
        };
        let filter_ref = (!filter.is_empty()).then_some(&filter);

        let mut results: Vec<SearchResult> = Vec::new();
        let mut collections_searched = Vec::new();

        match self.llm.embed(&request.query).await {
            Ok(query_embedding) => {
                for name in &requested {
                    match self
                        .store
                        .query(name, &query_embedding, request.top_k, filter_ref)
                        .await
                    {
                        Ok(matches) => {
                            collections_searched.push(name.clone());
                            for m in matches {
                                // Defend against metrics that exceed [0, 1]
                                let score = if m.distance < 1.0 { 1.0 - m.distance } else { 0.0 };
                                if request.threshold.is_some_and(|t| score < t) {
                                    continue;
                                }
                                results.push(SearchResult {
                                    content: m.document,
                                    score,
                                    document: record_filename(&m.metadata)
                                        .unwrap_or("unknown")
                                        .to_string(),
                                    chunk_id: m.id,
                                    collection: name.clone(),
                                    metadata: m.metadata,
                                });
                            }
                        }
                        Err(e) => warn!("Search failed for collection '{name}': {e}"),
                    }
                }
            }
            Err(e) => error!("Query embedding failed: {e}"),
        }

        // Stable sort keeps per-collection arrival order on ties
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(request.top_k);

        let mut unique_documents: Vec<String> = Vec::new();
        for result in &results {
            if !unique_documents.contains(&result.document) {
                unique_documents.push(result.document.clone());
            }
        }
        let chunk_ids: Vec<String> = results.iter().map(|r| r.chunk_id.clone()).collect();

        let response = SearchResponse {
            search_id: Uuid::new_v4().to_string(),
            query: request.query.clone(),
            total_results: results.len(),
            unique_documents,
            chunk_ids,
            results,
            processing_time: started.elapsed().as_secs_f64(),
            collections_searched,
        };

        self.cache.insert(response.clone());
        response
    }

    // ── Ask ─────────────────────────────────────────────────────────

    /// Answer a question using cached, explicit, or freshly searched
    /// context, composed according to the requested strategy.
    pub async fn ask_with_context(&self, request: &AskRequest) -> ChatResponse {
        let started = Instant::now();
        info!("Ask request: {}", request.question);

        let results = self.gather_context(request).await;
        if results.is_empty() {
            return Self::no_context(started);
        }

        let (mut chunks, mut summaries, mut paragraphs) = partition(&results);
        if chunks.is_empty() {
            // No chunk-tier hits: treat whatever we have as the detail tier
            chunks = results.iter().collect();
            summaries = Vec::new();
            paragraphs = Vec::new();
        }

        let chunk_texts: Vec<String> = chunks.iter().map(|r| r.content.clone()).collect();
        let blocks = match request.search_strategy {
            SearchStrategy::Basic => ContextBlocks::Basic { chunks: chunk_texts },
            SearchStrategy::Enhanced => {
                if summaries.is_empty() {
                    ContextBlocks::Basic { chunks: chunk_texts }
                } else {
                    ContextBlocks::Enhanced {
                        chunks: chunk_texts,
                        summaries: summaries.iter().map(|r| r.content.clone()).collect(),
                    }
                }
            }
            SearchStrategy::Paragraph => {
                if paragraphs.is_empty() {
                    ContextBlocks::Basic { chunks: chunk_texts }
                } else {
                    ContextBlocks::Paragraph {
                        chunks: chunk_texts,
                        paragraphs: paragraphs.iter().map(|r| r.content.clone()).collect(),
                    }
                }
            }
        };

        let messages = prompts::compose(&blocks, &request.question, &request.conversation_history);
        let answer = self.generate(&messages).await;

        let mut sources = unique_docs(&chunks);
        match &blocks {
            ContextBlocks::Enhanced { .. } => sources.extend(tagged_docs(&summaries, "Summary")),
            ContextBlocks::Paragraph { .. } => {
                sources.extend(tagged_docs(&paragraphs, "Paragraph"));
            }
            _ => {}
        }

        ChatResponse {
            answer,
            sources,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Context selection in priority order: cached search, explicit chunk
    /// ids, fresh filtered search.
    async fn gather_context(&self, request: &AskRequest) -> Vec<SearchResult> {
        if let Some(search_id) = &request.search_id {
            if let Some(cached) = self.cache.get(search_id) {
                info!("Reusing cached search {search_id}");
                return cached.results;
            }
            debug!("search_id {search_id} not in cache, falling through");
        }

        if let Some(ids) = &request.chunk_ids {
            if !ids.is_empty() {
                return self.fetch_chunks_by_id(ids).await;
            }
        }

        let mut search_request = SearchRequest::new(request.question.clone());
        search_request.top_k = request.top_k;
        search_request.documents = request.documents.clone();
        search_request.exclude_documents = request.exclude_documents.clone();
        self.search_documents(&search_request).await.results
    }

    /// Fetch explicit chunk ids across every searchable tier; a tier that
    /// fails is skipped.
    async fn fetch_chunks_by_id(&self, ids: &[String]) -> Vec<SearchResult> {
        let mut out = Vec::new();
        for name in collections::SEARCHABLE {
            match self.store.get_by_ids(name, ids).await {
                Ok(records) => {
                    for r in records {
                        out.push(SearchResult {
                            content: r.document,
                            // Explicitly requested, not similarity-ranked
                            score: 1.0,
                            document: record_filename(&r.metadata).unwrap_or("unknown").to_string(),
                            chunk_id: r.id,
                            collection: name.to_string(),
                            metadata: r.metadata,
                        });
                    }
                }
                Err(e) => debug!("Chunk fetch skipped for '{name}': {e}"),
            }
        }
        out
    }

    // ── Direct strategy paths ───────────────────────────────────────

    /// Basic chunk-only search and answer.
    pub async fn search_and_answer(&self, query: &str, top_k: usize, history: &str) -> ChatResponse {
        let started = Instant::now();
        info!("Processing query: {query}");

        let mut request = SearchRequest::new(query);
        request.top_k = top_k;
        request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
        let search = self.search_documents(&request).await;

        if search.results.is_empty() {
            return Self::no_context(started);
        }
        info!(
            "Found {} relevant chunks from {} documents",
            search.results.len(),
            search.unique_documents.len()
        );

        let chunks: Vec<String> = search.results.iter().map(|r| r.content.clone()).collect();
        let messages = prompts::compose(&ContextBlocks::Basic { chunks }, query, history);
        let answer = self.generate(&messages).await;

        ChatResponse {
            answer,
            sources: search.unique_documents,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Chunk search plus logical-summary hits; degrades to basic when the
    /// summary tier has nothing.
    pub async fn search_enhanced(&self, query: &str, top_k: usize, history: &str) -> ChatResponse {
        let started = Instant::now();

        let mut chunk_request = SearchRequest::new(query);
        chunk_request.top_k = top_k;
        chunk_request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
        let chunk_search = self.search_documents(&chunk_request).await;

        if chunk_search.results.is_empty() {
            return Self::no_context(started);
        }

        let mut summary_request = SearchRequest::new(query);
        summary_request.top_k = self.config.summary_top_k;
        summary_request.collections = Some(vec![collections::LOGICAL_SUMMARIES.to_string()]);
        let summary_search = self.search_documents(&summary_request).await;

        let chunks: Vec<String> = chunk_search.results.iter().map(|r| r.content.clone()).collect();

        if summary_search.results.is_empty() {
            let messages = prompts::compose(&ContextBlocks::Basic { chunks }, query, history);
            let answer = self.generate(&messages).await;
            return ChatResponse {
                answer,
                sources: chunk_search.unique_documents,
                processing_time: started.elapsed().as_secs_f64(),
            };
        }

        let summaries: Vec<String> = summary_search
            .results
            .iter()
            .map(|r| r.content.clone())
            .collect();
        let messages =
            prompts::compose(&ContextBlocks::Enhanced { chunks, summaries }, query, history);
        let answer = self.generate(&messages).await;

        let mut sources = chunk_search.unique_documents;
        for document in &summary_search.unique_documents {
            sources.push(format!("Summary: {document}"));
        }

        ChatResponse {
            answer,
            sources,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Chunk search plus paragraph-summary hits for wider grounding;
    /// degrades to basic when the paragraph tier has nothing.
    pub async fn search_with_paragraphs(
        &self,
        query: &str,
        top_k_paragraphs: usize,
        top_k_chunks: usize,
        history: &str,
    ) -> ChatResponse {
        let started = Instant::now();
        info!("Processing query with paragraph context: {query}");

        let mut chunk_request = SearchRequest::new(query);
        chunk_request.top_k = top_k_chunks;
        chunk_request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
        let chunk_search = self.search_documents(&chunk_request).await;

        if chunk_search.results.is_empty() {
            return Self::no_context(started);
        }

        let mut paragraph_request = SearchRequest::new(query);
        paragraph_request.top_k = top_k_paragraphs;
        paragraph_request.collections = Some(vec![collections::PARAGRAPH_SUMMARIES.to_string()]);
        let paragraph_search = self.search_documents(&paragraph_request).await;

        let chunks: Vec<String> = chunk_search.results.iter().map(|r| r.content.clone()).collect();

        if paragraph_search.results.is_empty() {
            let messages = prompts::compose(&ContextBlocks::Basic { chunks }, query, history);
            let answer = self.generate(&messages).await;
            return ChatResponse {
                answer,
                sources: chunk_search.unique_documents,
                processing_time: started.elapsed().as_secs_f64(),
            };
        }
        info!(
            "Found {} paragraph contexts and {} detail chunks",
            paragraph_search.results.len(),
            chunk_search.results.len()
        );

        let paragraphs: Vec<String> = paragraph_search
            .results
            .iter()
            .map(|r| r.content.clone())
            .collect();
        let messages =
            prompts::compose(&ContextBlocks::Paragraph { chunks, paragraphs }, query, history);
        let answer = self.generate(&messages).await;

        let mut sources = chunk_search.unique_documents;
        for document in &paragraph_search.unique_documents {
            sources.push(format!("Paragraph: {document}"));
        }

        ChatResponse {
            answer,
            sources,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }

    /// Chunk search with `[Source: ...]` location tags in the prompt,
    /// independent of the strategy set.
    pub async fn search_with_location_info(
        &self,
        query: &str,
        top_k: usize,
        history: &str,
    ) -> ChatResponse {
        let started = Instant::now();

        let mut request = SearchRequest::new(query);
        request.top_k = top_k;
        request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
        let search = self.search_documents(&request).await;

        if search.results.is_empty() {
            return Self::no_context(started);
        }

        let mut annotated_chunks = Vec::with_capacity(search.results.len());
        let mut sources = Vec::with_capacity(search.results.len());
        for result in &search.results {
            let location = result
                .metadata
                .get("location_reference")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown location");
            let summary = result
                .metadata
                .get("chunk_summary")
                .and_then(|v| v.as_str())
                .unwrap_or("No summary available");

            annotated_chunks.push(format!(
                "[Source: {location}]\n{}\n[Summary: {summary}]\n",
                result.content
            ));
            sources.push(format!("{} ({location})", result.document));
        }

        let messages = prompts::compose(&ContextBlocks::Location { annotated_chunks }, query, history);
        let answer = self.generate(&messages).await;

        ChatResponse {
            answer,
            sources,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }

    // ── Shared helpers ──────────────────────────────────────────────

    async fn generate(&self, messages: &[ChatMessage]) -> String {
        match self
            .llm
            .complete(
                messages,
                self.config.llm.temperature,
                self.config.llm.max_answer_tokens,
            )
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                error!("Answer generation failed: {e}");
                format!("Sorry, I encountered an error: {e}")
            }
        }
    }

    fn no_context(started: Instant) -> ChatResponse {
        ChatResponse {
            answer: NO_CONTEXT_ANSWER.to_string(),
            sources: Vec::new(),
            processing_time: started.elapsed().as_secs_f64(),
        }
    }
}

fn partition(
    results: &[SearchResult],
) -> (
    Vec<&SearchResult>,
    Vec<&SearchResult>,
    Vec<&SearchResult>,
) {
    let mut chunks = Vec::new();
    let mut summaries = Vec::new();
    let mut paragraphs = Vec::new();

    for result in results {
        if result.collection == collections::LOGICAL_SUMMARIES {
            summaries.push(result);
        } else if result.collection == collections::PARAGRAPH_SUMMARIES {
            paragraphs.push(result);
        } else {
            chunks.push(result);
        }
    }

    (chunks, summaries, paragraphs)
}

fn unique_docs(results: &[&SearchResult]) -> Vec<String> {
    let mut docs = Vec::new();
    for result in results {
        if !docs.contains(&result.document) {
            docs.push(result.document.clone());
        }
    }
    docs
}

fn tagged_docs(results: &[&SearchResult], tag: &str) -> Vec<String> {
    unique_docs(results)
        .into_iter()
        .map(|d| format!("{tag}: {d}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use crate::llm::LlmError;
    use crate::store::memory::MemoryStore;
    use crate::store::{Metadata, QueryMatch, StoreError, StoredRecord, VectorRecord};

    /// Maps known texts to fixed vectors so distances are hand-checkable.
    struct FixedLlm {
        table: HashMap<String, Vec<f32>>,
    }

    impl FixedLlm {
        fn new(entries: &[(&str, [f32; 4])]) -> Self {
            let table = entries
                .iter()
                .map(|(text, v)| ((*text).to_string(), v.to_vec()))
                .collect();
            Self { table }
        }
    }

    #[async_trait::async_trait]
    impl LanguageModel for FixedLlm {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
            Ok(self
                .table
                .get(text)
                .cloned()
                .unwrap_or_else(|| vec![1.0, 0.0, 0.0, 0.0]))
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _temperature: f32,
            _max_tokens: usize,
        ) -> Result<String, LlmError> {
            Ok("answer from context".to_string())
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    /// Delegates to MemoryStore while counting similarity queries.
    struct CountingStore {
        inner: MemoryStore,
        queries: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                queries: AtomicUsize::new(0),
            }
        }

        fn query_count(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl VectorStore for CountingStore {
        async fn add(&self, collection: &str, records: Vec<VectorRecord>) -> Result<(), StoreError> {
            self.inner.add(collection, records).await
        }

        async fn query(
            &self,
            collection: &str,
            embedding: &[f32],
            n_results: usize,
            filter: Option<&DocumentFilter>,
        ) -> Result<Vec<QueryMatch>, StoreError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.query(collection, embedding, n_results, filter).await
        }

        async fn get_by_ids(
            &self,
            collection: &str,
            ids: &[String],
        ) -> Result<Vec<StoredRecord>, StoreError> {
            self.inner.get_by_ids(collection, ids).await
        }

        async fn get_by_document(
            &self,
            collection: &str,
            filename: &str,
            limit: usize,
        ) -> Result<Vec<StoredRecord>, StoreError> {
            self.inner.get_by_document(collection, filename, limit).await
        }

        async fn delete(&self, collection: &str, ids: &[String]) -> Result<(), StoreError> {
            self.inner.delete(collection, ids).await
        }

        async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
            self.inner.list_collections().await
        }
    }

    async fn seed(
        store: &dyn VectorStore,
        collection: &str,
        id: &str,
        embedding: [f32; 4],
        text: &str,
        filename: &str,
    ) {
        let mut metadata = Metadata::new();
        metadata.insert("filename".to_string(), json!(filename));
        store
            .add(
                collection,
                vec![VectorRecord {
                    id: id.to_string(),
                    embedding: embedding.to_vec(),
                    document: text.to_string(),
                    metadata,
                }],
            )
            .await
            .unwrap();
    }

    fn engine_with(store: Arc<dyn VectorStore>, llm: Arc<dyn LanguageModel>) -> SearchEngine {
        SearchEngine::new(store, llm, Arc::new(Config::default()))
    }

    #[tokio::test]
    async fn test_scores_are_non_increasing() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, collections::DOCUMENTS, "a", [1.0, 0.0, 0.0, 0.0], "exact", "a.txt").await;
        seed(&*store, collections::DOCUMENTS, "b", [0.9, 0.4, 0.0, 0.0], "close", "b.txt").await;
        seed(&*store, collections::DOCUMENTS, "c", [0.0, 1.0, 0.0, 0.0], "orthogonal", "c.txt")
            .await;

        let llm = Arc::new(FixedLlm::new(&[("find it", [1.0, 0.0, 0.0, 0.0])]));
        let engine = engine_with(store, llm);

        let mut request = SearchRequest::new("find it");
        request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
        let response = engine.search_documents(&request).await;

        assert_eq!(response.total_results, 3);
        for pair in response.results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert!((response.results[0].score - 1.0).abs() < 1e-6);
        assert_eq!(response.results[0].chunk_id, "a");
        // Orthogonal vector sits at distance 1.0, which converts to 0
        assert_eq!(response.results[2].score, 0.0);
    }

    #[tokio::test]
    async fn test_threshold_drops_low_scores() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, collections::DOCUMENTS, "a", [1.0, 0.0, 0.0, 0.0], "exact", "a.txt").await;
        seed(&*store, collections::DOCUMENTS, "b", [0.9, 0.4, 0.0, 0.0], "close", "b.txt").await;
        seed(&*store, collections::DOCUMENTS, "c", [0.0, 1.0, 0.0, 0.0], "orthogonal", "c.txt")
            .await;

        let llm = Arc::new(FixedLlm::new(&[("find it", [1.0, 0.0, 0.0, 0.0])]));
        let engine = engine_with(store, llm);

        let mut request = SearchRequest::new("find it");
        request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
        request.threshold = Some(0.5);
        let response = engine.search_documents(&request).await;

        assert_eq!(response.total_results, 2);
        for result in &response.results {
            assert!(result.score >= 0.5);
        }
    }

    #[tokio::test]
    async fn test_unreachable_collection_is_omitted_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = engine_with(store, llm);

        let mut request = SearchRequest::new("x");
        request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
        let response = engine.search_documents(&request).await;

        assert!(response.results.is_empty());
        assert!(response.collections_searched.is_empty());
    }

    #[tokio::test]
    async fn test_default_search_skips_missing_tiers() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, collections::DOCUMENTS, "a", [1.0, 0.0, 0.0, 0.0], "only tier", "a.txt")
            .await;

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = engine_with(store, llm);

        let response = engine.search_documents(&SearchRequest::new("q")).await;
        assert_eq!(
            response.collections_searched,
            vec![collections::DOCUMENTS.to_string()]
        );
        assert_eq!(response.total_results, 1);
    }

    #[tokio::test]
    async fn test_merge_across_collections() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, collections::DOCUMENTS, "chunk", [1.0, 0.0, 0.0, 0.0], "chunk text", "a.txt")
            .await;
        seed(
            &*store,
            collections::LOGICAL_SUMMARIES,
            "summary",
            [0.9, 0.4, 0.0, 0.0],
            "summary text",
            "a.txt",
        )
        .await;

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = engine_with(store, llm);

        let response = engine.search_documents(&SearchRequest::new("q")).await;
        assert_eq!(response.total_results, 2);
        assert_eq!(response.collections_searched.len(), 2);
        assert_eq!(response.results[0].collection, collections::DOCUMENTS);
        assert_eq!(response.results[1].collection, collections::LOGICAL_SUMMARIES);
        // One filename across two tiers stays a single unique document
        assert_eq!(response.unique_documents, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_document_filters_applied() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, collections::DOCUMENTS, "a", [1.0, 0.0, 0.0, 0.0], "A", "a.txt").await;
        seed(&*store, collections::DOCUMENTS, "b", [1.0, 0.0, 0.0, 0.0], "B", "b.txt").await;

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = engine_with(store, llm);

        let mut request = SearchRequest::new("q");
        request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
        request.exclude_documents = Some(vec!["a.txt".to_string()]);
        let response = engine.search_documents(&request).await;

        assert_eq!(response.unique_documents, vec!["b.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_cache_round_trip_issues_no_new_query() {
        let store = Arc::new(CountingStore::new());
        seed(&*store, collections::DOCUMENTS, "a", [1.0, 0.0, 0.0, 0.0], "chunk text", "a.txt")
            .await;

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = SearchEngine::new(store.clone(), llm, Arc::new(Config::default()));

        let mut request = SearchRequest::new("q");
        request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
        let search = engine.search_documents(&request).await;
        assert_eq!(search.total_results, 1);

        let queries_before = store.query_count();

        let mut ask = AskRequest::new("what does it say?");
        ask.search_id = Some(search.search_id.clone());
        let response = engine.ask_with_context(&ask).await;

        assert_eq!(store.query_count(), queries_before, "cached ask must not re-query");
        assert_eq!(response.answer, "answer from context");
        assert_eq!(response.sources, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_search_id_falls_through_to_fresh_search() {
        let store = Arc::new(CountingStore::new());
        seed(&*store, collections::DOCUMENTS, "a", [1.0, 0.0, 0.0, 0.0], "chunk text", "a.txt")
            .await;

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = SearchEngine::new(store.clone(), llm, Arc::new(Config::default()));

        let queries_before = store.query_count();
        let mut ask = AskRequest::new("question");
        ask.search_id = Some("not-a-real-id".to_string());
        let response = engine.ask_with_context(&ask).await;

        assert!(store.query_count() > queries_before);
        assert_eq!(response.answer, "answer from context");
    }

    #[tokio::test]
    async fn test_ask_with_explicit_chunk_ids() {
        let store = Arc::new(CountingStore::new());
        seed(&*store, collections::DOCUMENTS, "wanted", [1.0, 0.0, 0.0, 0.0], "the chunk", "a.txt")
            .await;
        seed(&*store, collections::DOCUMENTS, "other", [1.0, 0.0, 0.0, 0.0], "noise", "b.txt")
            .await;

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = SearchEngine::new(store.clone(), llm, Arc::new(Config::default()));

        let mut ask = AskRequest::new("question");
        ask.chunk_ids = Some(vec!["wanted".to_string()]);
        let response = engine.ask_with_context(&ask).await;

        assert_eq!(store.query_count(), 0, "explicit ids must not trigger a search");
        assert_eq!(response.sources, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_ask_enhanced_tags_summary_sources() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, collections::DOCUMENTS, "chunk", [1.0, 0.0, 0.0, 0.0], "chunk text", "a.txt")
            .await;
        seed(
            &*store,
            collections::LOGICAL_SUMMARIES,
            "summary",
            [0.9, 0.4, 0.0, 0.0],
            "summary text",
            "a.txt",
        )
        .await;

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = engine_with(store, llm);

        let ask = AskRequest::new("question");
        let response = engine.ask_with_context(&ask).await;

        assert!(response.sources.contains(&"a.txt".to_string()));
        assert!(response.sources.contains(&"Summary: a.txt".to_string()));
    }

    #[tokio::test]
    async fn test_paragraph_strategy_without_paragraph_tier_degrades() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, collections::DOCUMENTS, "chunk", [1.0, 0.0, 0.0, 0.0], "chunk text", "a.txt")
            .await;

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = engine_with(store, llm);

        let mut ask = AskRequest::new("question");
        ask.search_strategy = SearchStrategy::Paragraph;
        let response = engine.ask_with_context(&ask).await;

        assert_eq!(response.answer, "answer from context");
        assert_eq!(response.sources, vec!["a.txt".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_store_yields_no_context_answer() {
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = engine_with(store, llm);

        let response = engine.ask_with_context(&AskRequest::new("anything")).await;
        assert_eq!(response.answer, NO_CONTEXT_ANSWER);
        assert!(response.sources.is_empty());
    }

    #[tokio::test]
    async fn test_search_with_location_info_annotates_sources() {
        let store = Arc::new(MemoryStore::new());
        let mut metadata = Metadata::new();
        metadata.insert("filename".to_string(), json!("report.pdf"));
        metadata.insert(
            "location_reference".to_string(),
            json!("Page 2, Section: Results, Paragraph 3"),
        );
        metadata.insert("chunk_summary".to_string(), json!("results blurb"));
        store
            .add(
                collections::DOCUMENTS,
                vec![VectorRecord {
                    id: "r0".to_string(),
                    embedding: vec![1.0, 0.0, 0.0, 0.0],
                    document: "the results chunk".to_string(),
                    metadata,
                }],
            )
            .await
            .unwrap();

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = engine_with(store, llm);

        let response = engine.search_with_location_info("results?", 3, "").await;
        assert_eq!(
            response.sources,
            vec!["report.pdf (Page 2, Section: Results, Paragraph 3)".to_string()]
        );
    }

    #[tokio::test]
    async fn test_search_enhanced_degrades_without_summaries() {
        let store = Arc::new(MemoryStore::new());
        seed(&*store, collections::DOCUMENTS, "chunk", [1.0, 0.0, 0.0, 0.0], "chunk text", "a.txt")
            .await;

        let llm = Arc::new(FixedLlm::new(&[]));
        let engine = engine_with(store, llm);

        let response = engine.search_enhanced("q", 5, "").await;
        assert_eq!(response.answer, "answer from context");
        assert_eq!(response.sources, vec!["a.txt".to_string()]);
    }
}
