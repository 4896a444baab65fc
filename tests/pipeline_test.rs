/// End-to-end integration tests for the docchat pipeline.
///
/// Tests the complete flow:
///   Config → Store → Ingest → Hierarchical → Paragraphs → Search → Ask
use std::sync::Arc;

use docchat::config::Config;
use docchat::hierarchy::HierarchicalProcessor;
use docchat::ingest::{DocumentProcessor, ProcessStatus};
use docchat::llm::mock::MockLlm;
use docchat::paragraphs::ParagraphProcessor;
use docchat::search::engine::SearchEngine;
use docchat::search::{AskRequest, SearchRequest, SearchStrategy};
use docchat::store::memory::MemoryStore;
use docchat::store::{VectorStore, collections};

const DOCUMENT: &str = "\
# Quarterly Report

Page 1

INTRODUCTION

Dr. Smith presented the quarterly revenue figures to the board on Monday morning. \
The revenue grew by twelve percent compared to the previous quarter across all regions. \
Growth was driven primarily by the subscription business and the new enterprise tier.

Page 2

OPERATIONS

The operations team expanded hiring in three offices during the quarter under review. \
However the hiring pipeline slowed considerably toward the end of the period. \
Retention stayed strong because the new onboarding process reduced early attrition.

The budget planning process for next year starts with a procedure of four steps. \
First the teams submit their estimates. Then finance consolidates the numbers into one plan. \
Finally the board reviews the consolidated plan during the January session.";

fn test_config() -> Arc<Config> {
    let mut config = Config::default();
    config.chunk_size = 300;
    config.chunk_overlap = 60;
    Arc::new(config)
}

/// Full pipeline: ingest → summarize → search → ask
#[tokio::test]
async fn test_full_pipeline() {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(MockLlm::default());

    // 1. Ingest
    let processor = DocumentProcessor::new(store.clone(), llm.clone(), &config);
    let ingested = processor.process_document(DOCUMENT, "report.md").await;
    assert_eq!(ingested.status, ProcessStatus::Success);
    assert!(ingested.chunks_created >= 2, "expected multiple chunks");

    // Chunk metadata picked up structure markers
    let chunks = store
        .get_by_document(collections::DOCUMENTS, "report.md", 100)
        .await
        .unwrap();
    assert_eq!(chunks.len(), ingested.chunks_created);
    assert!(
        chunks
            .iter()
            .any(|c| c.metadata["location_reference"].as_str().unwrap().contains("Page")),
        "chunks should carry location references"
    );

    // 2. Hierarchical summaries
    let hierarchical = HierarchicalProcessor::new(store.clone(), llm.clone());
    let hier_result = hierarchical.process_document_hierarchically("report.md").await;
    assert_eq!(hier_result.status, ProcessStatus::Success);
    assert!(hier_result.logical_groups_created > 1);
    assert_eq!(hier_result.summaries_created, hier_result.logical_groups_created);
    assert!(hier_result.compression_stats.total_input_words > 0);

    // 3. Paragraph summaries
    let paragraphs = ParagraphProcessor::new(store.clone(), llm.clone());
    let para_result = paragraphs.process_document_paragraphs("report.md").await;
    assert_eq!(para_result.status, ProcessStatus::Success);
    assert!(para_result.paragraphs_processed >= 2);
    assert_eq!(para_result.summaries_created, para_result.paragraphs_processed);

    // 4. Search across every tier
    let engine = SearchEngine::new(store.clone(), llm.clone(), config.clone());
    let search = engine
        .search_documents(&SearchRequest::new("quarterly revenue growth"))
        .await;

    assert!(!search.results.is_empty(), "search should return results");
    assert_eq!(search.collections_searched.len(), 3, "all tiers populated");
    assert_eq!(search.total_results, search.results.len());
    assert_eq!(search.chunk_ids.len(), search.results.len());
    assert!(search.unique_documents.contains(&"report.md".to_string()));
    for pair in search.results.windows(2) {
        assert!(pair[0].score >= pair[1].score, "scores must be non-increasing");
    }
    for result in &search.results {
        assert!((0.0..=1.0).contains(&result.score));
    }

    // 5. Ask reusing the cached search
    let mut ask = AskRequest::new("How much did revenue grow?");
    ask.search_id = Some(search.search_id.clone());
    let answer = engine.ask_with_context(&ask).await;
    assert!(!answer.answer.is_empty());
    assert!(answer.sources.iter().any(|s| s.contains("report.md")));

    // 6. Ask with the paragraph strategy
    let mut ask_para = AskRequest::new("What is the budget process?");
    ask_para.search_strategy = SearchStrategy::Paragraph;
    let para_answer = engine.ask_with_context(&ask_para).await;
    assert!(!para_answer.answer.is_empty());
    assert!(!para_answer.sources.is_empty());
}

/// Sentence-boundary handling survives the whole ingest path
#[tokio::test]
async fn test_abbreviations_do_not_split_chunks_mid_sentence() {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(MockLlm::default());

    let text = "Dr. Smith went home. She was tired.";
    let sentences = docchat::ingest::splitter::split_sentences(text);
    assert_eq!(sentences.len(), 2);
    assert_eq!(sentences[0], "Dr. Smith went home.");

    let processor = DocumentProcessor::new(store.clone(), llm, &config);
    let response = processor.process_document(text, "note.txt").await;
    assert_eq!(response.status, ProcessStatus::Success);
    assert_eq!(response.chunks_created, 1);
}

/// Batch-style error handling: bad inputs come back as values
#[tokio::test]
async fn test_error_results_are_values_not_faults() {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(MockLlm::default());

    let processor = DocumentProcessor::new(store.clone(), llm.clone(), &config);
    let empty = processor.process_document("", "empty.txt").await;
    assert_eq!(empty.status, ProcessStatus::Error);

    let hierarchical = HierarchicalProcessor::new(store.clone(), llm.clone());
    let missing = hierarchical.process_document_hierarchically("absent.txt").await;
    assert_eq!(missing.status, ProcessStatus::Error);

    let paragraphs = ParagraphProcessor::new(store.clone(), llm.clone());
    let missing_para = paragraphs.process_document_paragraphs("absent.txt").await;
    assert_eq!(missing_para.status, ProcessStatus::Error);

    // Searching an entirely empty store is not a fault either
    let engine = SearchEngine::new(store, llm, config);
    let mut request = SearchRequest::new("anything");
    request.collections = Some(vec![collections::DOCUMENTS.to_string()]);
    let search = engine.search_documents(&request).await;
    assert!(search.results.is_empty());
    assert!(search.collections_searched.is_empty());
}

/// Re-ingesting the same document does not duplicate records
#[tokio::test]
async fn test_reingestion_is_idempotent_end_to_end() {
    let config = test_config();
    let store = Arc::new(MemoryStore::new());
    let llm = Arc::new(MockLlm::default());

    let processor = DocumentProcessor::new(store.clone(), llm.clone(), &config);
    let first = processor.process_document(DOCUMENT, "report.md").await;
    let second = processor.process_document(DOCUMENT, "report.md").await;
    assert_eq!(first.chunks_created, second.chunks_created);

    let chunks = store
        .get_by_document(collections::DOCUMENTS, "report.md", 100)
        .await
        .unwrap();
    assert_eq!(chunks.len(), first.chunks_created);

    // Hashes (and therefore ids) are stable across runs
    let mut ids: Vec<String> = chunks.iter().map(|c| c.id.clone()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), chunks.len());
}
