//! Document ingestion: chunk, annotate, embed, and store.
//!
//! Populates the primary `documents` collection and keeps the full text
//! in `original_texts` for the summary processors to re-read later.
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

pub mod metadata;
pub mod splitter;

use crate::config::Config;
use crate::llm::LanguageModel;
use crate::store::{Metadata, VectorRecord, VectorStore, collections};
use metadata::{ChunkMetadata, MetadataExtractor, chunk_hash};
use splitter::LogicalTextSplitter;

/// Outcome marker for batch-style callers; failures are values, not faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessStatus {
    Success,
    Error,
}

/// Result of processing one document into the retrieval collection.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub status: ProcessStatus,
    pub message: String,
    pub chunks_created: usize,
    pub processing_time: f64,
}

impl DocumentResponse {
    fn error(message: impl Into<String>, started: Instant) -> Self {
        Self {
            status: ProcessStatus::Error,
            message: message.into(),
            chunks_created: 0,
            processing_time: started.elapsed().as_secs_f64(),
        }
    }
}

/// Chunks pre-extracted document text, annotates each chunk with
/// position/section/content metadata, embeds it, and stores it.
pub struct DocumentProcessor {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LanguageModel>,
    splitter: LogicalTextSplitter,
    extractor: MetadataExtractor,
}

impl DocumentProcessor {
    pub fn new(store: Arc<dyn VectorStore>, llm: Arc<dyn LanguageModel>, config: &Config) -> Self {
        Self {
            store,
            llm,
            splitter: LogicalTextSplitter::new(config.chunk_size, config.chunk_overlap),
            extractor: MetadataExtractor::new(),
        }
    }

    /// Process extracted text: chunk, annotate, embed, store.
    ///
    /// Re-processing identical text produces identical record ids, so
    /// ingestion is idempotent.
    pub async fn process_document(&self, text: &str, filename: &str) -> DocumentResponse {
        let started = Instant::now();
        info!("Processing document: {filename}");

        if text.trim().is_empty() {
            return DocumentResponse::error("No text content found in document", started);
        }

        // Keep the full text around for the summary processors
        self.store_original_text(text, filename).await;

        let annotated = self.annotate_chunks(text, filename);
        if annotated.is_empty() {
            return DocumentResponse::error("Failed to create text chunks", started);
        }
        info!("Created {} logical chunks", annotated.len());

        let stored = self.store_chunks(&annotated).await;

        let processing_time = started.elapsed().as_secs_f64();
        info!("Processed {filename} in {processing_time:.2}s");

        DocumentResponse {
            status: ProcessStatus::Success,
            message: format!("Successfully processed {stored} logical chunks"),
            chunks_created: stored,
            processing_time,
        }
    }

    /// Split text and attach full metadata to every chunk.
    #[must_use]
    pub fn annotate_chunks(&self, text: &str, filename: &str) -> Vec<(String, ChunkMetadata)> {
        let page_positions = self.extractor.extract_page_positions(text);
        let section_positions = self.extractor.extract_section_positions(text);

        let chunks = self.splitter.split_text(text);
        let total_chunks = chunks.len();

        let mut annotated = Vec::with_capacity(total_chunks);
        let mut current_position = 0usize;

        for (i, chunk_text) in chunks.into_iter().enumerate() {
            // Whitespace normalization can keep the chunk from matching the
            // source exactly; fall back to the running position.
            let search_from = metadata::floor_char_boundary(text, current_position.min(text.len()));
            let start = text[search_from..]
                .find(&chunk_text)
                .map_or(search_from, |offset| search_from + offset);
            let start = metadata::floor_char_boundary(text, start.min(text.len().saturating_sub(1)));
            let end = metadata::floor_char_boundary(text, (start + chunk_text.len()).min(text.len()));
            let end = end.max(start + 1).min(text.len());
            current_position = end;

            let metadata = ChunkMetadata {
                filename: filename.to_string(),
                chunk_index: i,
                total_chunks,
                chunk_size: chunk_text.len(),
                chunk_summary: self.extractor.chunk_summary(&chunk_text, 120),
                page_number: MetadataExtractor::nearest_preceding(&page_positions, start),
                section_title: MetadataExtractor::nearest_preceding(&section_positions, start),
                start_char: start,
                end_char: end,
                paragraph_number: MetadataExtractor::paragraph_number(text, start),
                content_type: self.extractor.content_type(&chunk_text),
                key_terms: self.extractor.key_terms(&chunk_text, 5),
                chunk_hash: chunk_hash(&chunk_text),
            };

            annotated.push((chunk_text, metadata));
        }

        annotated
    }

    /// Embed and store chunks one at a time; a failing chunk is logged
    /// and skipped so the rest of the document still lands.
    async fn store_chunks(&self, annotated: &[(String, ChunkMetadata)]) -> usize {
        let mut stored = 0usize;

        for (chunk_text, metadata) in annotated {
            let embedding = match self.llm.embed(chunk_text).await {
                Ok(v) => v,
                Err(e) => {
                    error!("Failed to embed chunk {}: {e}", metadata.chunk_index);
                    continue;
                }
            };

            let record = VectorRecord {
                id: metadata.record_id(),
                embedding,
                document: chunk_text.clone(),
                metadata: metadata.to_metadata_map(),
            };

            match self.store.add(collections::DOCUMENTS, vec![record]).await {
                Ok(()) => stored += 1,
                Err(e) => error!("Failed to store chunk {}: {e}", metadata.chunk_index),
            }
        }

        stored
    }

    /// Store the complete document text with a zero vector; it is fetched
    /// by filename, never searched.
    async fn store_original_text(&self, text: &str, filename: &str) {
        let mut map = Metadata::new();
        map.insert("filename".to_string(), json!(filename));
        map.insert("content_type".to_string(), json!("original_text"));
        map.insert("character_count".to_string(), json!(text.len()));
        map.insert(
            "word_count".to_string(),
            json!(text.split_whitespace().count()),
        );
        map.insert("indexed_at".to_string(), json!(Utc::now().to_rfc3339()));

        let record = VectorRecord {
            id: format!("fulltext_{filename}"),
            embedding: vec![0.0; self.llm.dimensions()],
            document: text.to_string(),
            metadata: map,
        };

        if let Err(e) = self.store.add(collections::ORIGINAL_TEXTS, vec![record]).await {
            error!("Failed to store original text for {filename}: {e}");
        }
    }
}
