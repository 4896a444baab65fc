//! Hierarchical processing: logical grouping plus adaptive compression.
//!
//! Re-reads an ingested document, groups its sentences into idea units,
//! compresses each unit, and stores the summaries in the
//! `logical_summaries` retrieval tier.
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{error, info};

pub mod compressor;
pub mod grouper;

use crate::ingest::ProcessStatus;
use crate::llm::LanguageModel;
use crate::store::{Metadata, VectorRecord, VectorStore, collections};
use compressor::{AdaptiveCompressor, CompressedGroup};
use grouper::SentenceGrouper;

/// Aggregate compression statistics for one processing run.
#[derive(Debug, Clone, Default)]
pub struct CompressionStats {
    pub total_input_words: usize,
    pub total_output_words: usize,
    pub overall_compression_ratio: f64,
    pub average_group_size: f64,
}

/// Result of hierarchical processing; errors are carried in `status`.
#[derive(Debug)]
pub struct HierarchicalResult {
    pub status: ProcessStatus,
    pub message: String,
    pub filename: String,
    pub logical_groups_created: usize,
    pub summaries_created: usize,
    pub total_processing_time: f64,
    pub compression_stats: CompressionStats,
    pub groups: Vec<CompressedGroup>,
}

impl HierarchicalResult {
    fn error(filename: &str, message: impl Into<String>, started: Instant) -> Self {
        Self {
            status: ProcessStatus::Error,
            message: message.into(),
            filename: filename.to_string(),
            logical_groups_created: 0,
            summaries_created: 0,
            total_processing_time: started.elapsed().as_secs_f64(),
            compression_stats: CompressionStats::default(),
            groups: Vec::new(),
        }
    }
}

/// Coordinates grouping and compression for already-ingested documents.
pub struct HierarchicalProcessor {
    store: Arc<dyn VectorStore>,
    grouper: SentenceGrouper,
    compressor: AdaptiveCompressor,
    llm: Arc<dyn LanguageModel>,
}

impl HierarchicalProcessor {
    pub fn new(store: Arc<dyn VectorStore>, llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            store,
            grouper: SentenceGrouper::new(),
            compressor: AdaptiveCompressor::new(llm.clone()),
            llm,
        }
    }

    /// Process an already-ingested document with hierarchical compression.
    pub async fn process_document_hierarchically(&self, filename: &str) -> HierarchicalResult {
        let started = Instant::now();
        info!("Starting hierarchical processing for: {filename}");

        let Some(text) = self.get_document_text(filename).await else {
            return HierarchicalResult::error(
                filename,
                format!("Could not find document text for {filename}"),
                started,
            );
        };

        let logical_groups = self.grouper.group_text(&text);
        info!("Created {} logical groups", logical_groups.len());
        let groups_created = logical_groups.len();

        // Compress groups one at a time; each call is its own failure
        // boundary, so a stalled provider affects only that group.
        let mut compressed_groups = Vec::with_capacity(groups_created);
        let mut total_input_words = 0usize;
        let mut total_output_words = 0usize;

        for group in logical_groups {
            total_input_words += group.word_count;
            let compressed = self.compressor.compress(group).await;
            total_output_words += compressed.summary.split_whitespace().count();
            compressed_groups.push(compressed);
        }

        let summaries_created = self.store_summaries(&compressed_groups, filename).await;

        let overall_ratio = if total_output_words > 0 {
            total_input_words as f64 / total_output_words as f64
        } else {
            1.0
        };
        let compression_stats = CompressionStats {
            total_input_words,
            total_output_words,
            overall_compression_ratio: overall_ratio,
            average_group_size: if groups_created > 0 {
                total_input_words as f64 / groups_created as f64
            } else {
                0.0
            },
        };

        let total_processing_time = started.elapsed().as_secs_f64();
        info!(
            "Hierarchical processing complete: {groups_created} groups, {overall_ratio:.1}:1 compression"
        );

        HierarchicalResult {
            status: ProcessStatus::Success,
            message: format!(
                "Created {groups_created} logical groups with {overall_ratio:.1}:1 compression"
            ),
            filename: filename.to_string(),
            logical_groups_created: groups_created,
            summaries_created,
            total_processing_time,
            compression_stats,
            groups: compressed_groups,
        }
    }

    /// Re-assemble the original text from stored chunks, ordered by
    /// `chunk_index`.
    async fn get_document_text(&self, filename: &str) -> Option<String> {
        let records = match self
            .store
            .get_by_document(collections::DOCUMENTS, filename, 2000)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("Failed to retrieve document text: {e}");
                return None;
            }
        };

        if records.is_empty() {
            return None;
        }

        let mut chunks: Vec<(u64, String)> = records
            .into_iter()
            .map(|r| {
                let index = r
                    .metadata
                    .get("chunk_index")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0);
                (index, r.document)
            })
            .collect();
        chunks.sort_by_key(|(index, _)| *index);

        Some(
            chunks
                .into_iter()
                .map(|(_, text)| text)
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Embed and store summaries in production order; individual failures
    /// are logged and skipped.
    async fn store_summaries(&self, compressed: &[CompressedGroup], filename: &str) -> usize {
        let mut stored = 0usize;

        for item in compressed {
            let embedding = match self.llm.embed(&item.summary).await {
                Ok(v) => v,
                Err(e) => {
                    error!("Failed to embed summary {}: {e}", item.group.group_id);
                    continue;
                }
            };

            let mut metadata = Metadata::new();
            metadata.insert("filename".to_string(), json!(filename));
            metadata.insert("group_id".to_string(), json!(item.group.group_id));
            metadata.insert("content_type".to_string(), json!("logical_summary"));
            metadata.insert("original_words".to_string(), json!(item.group.word_count));
            metadata.insert(
                "summary_words".to_string(),
                json!(item.summary.split_whitespace().count()),
            );
            metadata.insert(
                "compression_ratio".to_string(),
                json!(item.compression_ratio),
            );
            metadata.insert(
                "strategy_used".to_string(),
                json!(item.strategy_used.as_str()),
            );

            let record = VectorRecord {
                id: format!("{filename}_{}", item.group.group_id),
                embedding,
                document: item.summary.clone(),
                metadata,
            };

            match self
                .store
                .add(collections::LOGICAL_SUMMARIES, vec![record])
                .await
            {
                Ok(()) => stored += 1,
                Err(e) => error!("Failed to store summary {}: {e}", item.group.group_id),
            }
        }

        stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ingest::DocumentProcessor;
    use crate::llm::mock::MockLlm;
    use crate::store::memory::MemoryStore;

    const SAMPLE: &str = "The cat sat on the warm mat near the door. \
However the dog barked loudly at the postman outside. \
Quantum computing reshapes modern cryptography entirely.";

    async fn ingest(store: Arc<MemoryStore>, llm: Arc<MockLlm>) {
        let mut config = Config::default();
        config.chunk_size = 500;
        let processor = DocumentProcessor::new(store, llm, &config);
        let response = processor.process_document(SAMPLE, "story.txt").await;
        assert_eq!(response.status, ProcessStatus::Success);
    }

    #[tokio::test]
    async fn test_hierarchical_processing_stores_summaries() {
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(MockLlm::default());
        ingest(store.clone(), llm.clone()).await;

        let processor = HierarchicalProcessor::new(store.clone(), llm);
        let result = processor.process_document_hierarchically("story.txt").await;

        assert_eq!(result.status, ProcessStatus::Success);
        assert!(result.logical_groups_created >= 2);
        assert_eq!(result.summaries_created, result.logical_groups_created);
        assert_eq!(result.groups.len(), result.logical_groups_created);

        let stored = store
            .get_by_document(collections::LOGICAL_SUMMARIES, "story.txt", 100)
            .await
            .unwrap();
        assert_eq!(stored.len(), result.summaries_created);
        for record in &stored {
            assert_eq!(record.metadata["content_type"], "logical_summary");
        }
    }

    #[tokio::test]
    async fn test_unknown_document_is_error_value() {
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(MockLlm::default());

        let processor = HierarchicalProcessor::new(store, llm);
        let result = processor.process_document_hierarchically("missing.txt").await;

        assert_eq!(result.status, ProcessStatus::Error);
        assert_eq!(result.logical_groups_created, 0);
        assert!(result.message.contains("missing.txt"));
    }

    #[tokio::test]
    async fn test_stats_cover_all_groups() {
        let store = Arc::new(MemoryStore::new());
        let llm = Arc::new(MockLlm::default());
        ingest(store.clone(), llm.clone()).await;

        let processor = HierarchicalProcessor::new(store, llm);
        let result = processor.process_document_hierarchically("story.txt").await;

        let input_words: usize = result.groups.iter().map(|g| g.group.word_count).sum();
        assert_eq!(result.compression_stats.total_input_words, input_words);
        assert!(result.compression_stats.overall_compression_ratio > 0.0);
        assert!(result.compression_stats.average_group_size > 0.0);
    }
}
