//! Paragraph-level summarization for wider context search.
//!
//! Simpler sibling of the hierarchical pipeline: fixed ~3:1 compression
//! on natural paragraph boundaries, stored in `paragraph_summaries`.
use std::sync::Arc;
use std::time::Instant;

use serde_json::json;
use tracing::{error, info, warn};

use crate::hierarchy::compressor::truncate_words;
use crate::ingest::ProcessStatus;
use crate::ingest::splitter::split_paragraphs;
use crate::llm::{ChatMessage, LanguageModel};
use crate::store::{Metadata, VectorRecord, VectorStore, collections};

/// Paragraphs at or under this many characters are dropped as
/// non-substantive.
const MIN_PARAGRAPH_CHARS: usize = 50;
/// Bounds on the target summary length, in words.
const MIN_TARGET_WORDS: usize = 15;
const MAX_TARGET_WORDS: usize = 50;

/// A paragraph with its generated summary.
#[derive(Debug, Clone)]
pub struct ParagraphSummary {
    pub paragraph_id: String,
    pub original_text: String,
    pub summary: String,
    pub word_count: usize,
    pub summary_word_count: usize,
    pub compression_ratio: f64,
    pub paragraph_index: usize,
    pub total_paragraphs: usize,
    pub processing_time: f64,
}

/// Aggregate statistics for one paragraph-processing run.
#[derive(Debug, Clone, Default)]
pub struct ParagraphStats {
    pub total_input_words: usize,
    pub total_output_words: usize,
    pub overall_compression_ratio: f64,
    pub average_paragraph_size: f64,
    pub average_summary_size: f64,
}

/// Result of paragraph processing; errors are carried in `status`.
#[derive(Debug)]
pub struct ParagraphResult {
    pub status: ProcessStatus,
    pub message: String,
    pub filename: String,
    pub paragraphs_processed: usize,
    pub summaries_created: usize,
    pub total_processing_time: f64,
    pub compression_stats: ParagraphStats,
    pub paragraphs: Vec<ParagraphSummary>,
}

impl ParagraphResult {
    fn error(filename: &str, message: impl Into<String>, started: Instant) -> Self {
        Self {
            status: ProcessStatus::Error,
            message: message.into(),
            filename: filename.to_string(),
            paragraphs_processed: 0,
            summaries_created: 0,
            total_processing_time: started.elapsed().as_secs_f64(),
            compression_stats: ParagraphStats::default(),
            paragraphs: Vec::new(),
        }
    }
}

/// Processes documents at paragraph level for wider context search.
pub struct ParagraphProcessor {
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn LanguageModel>,
}

impl ParagraphProcessor {
    pub fn new(store: Arc<dyn VectorStore>, llm: Arc<dyn LanguageModel>) -> Self {
        Self { store, llm }
    }

    /// Paragraphs on blank-line boundaries, substantive ones only.
    #[must_use]
    pub fn split_into_paragraphs(text: &str) -> Vec<String> {
        split_paragraphs(text)
            .into_iter()
            .filter(|p| p.len() > MIN_PARAGRAPH_CHARS)
            .collect()
    }

    /// Summarize one paragraph; paragraphs already at or under the target
    /// length are returned unchanged.
    pub async fn summarize_paragraph(&self, paragraph: &str, target_length: usize) -> String {
        let word_count = paragraph.split_whitespace().count();
        if word_count <= target_length {
            return paragraph.to_string();
        }

        let prompt = format!(
            "Summarize this paragraph in exactly {target_length} words or less while \
preserving the key information and main ideas.\n\n\
Requirements:\n\
- Keep the most important information\n\
- Maintain searchable keywords\n\
- Preserve proper nouns and key concepts\n\
- Write in clear, concise language\n\n\
Paragraph:\n{paragraph}\n\n\
Summary ({target_length} words max):"
        );

        let messages = [
            ChatMessage::system(format!(
                "You are an expert at creating {target_length}-word paragraph summaries \
that preserve essential information."
            )),
            ChatMessage::user(prompt),
        ];

        match self.llm.complete(&messages, 0.1, target_length * 2).await {
            Ok(summary) => summary.trim().to_string(),
            Err(e) => {
                warn!("Paragraph summarization failed: {e}");
                truncate_words(paragraph, target_length)
            }
        }
    }

    /// Process a document into stored paragraph summaries.
    pub async fn process_document_paragraphs(&self, filename: &str) -> ParagraphResult {
        let started = Instant::now();
        info!("Starting paragraph processing for: {filename}");

        let Some(text) = self.get_document_text(filename).await else {
            return ParagraphResult::error(
                filename,
                format!("Could not find document text for {filename}"),
                started,
            );
        };

        let paragraphs = Self::split_into_paragraphs(&text);
        info!("Found {} paragraphs", paragraphs.len());

        if paragraphs.is_empty() {
            return ParagraphResult::error(filename, "No paragraphs found in document", started);
        }

        let total_paragraphs = paragraphs.len();
        let mut processed = Vec::with_capacity(total_paragraphs);
        let mut total_input_words = 0usize;
        let mut total_output_words = 0usize;

        for (i, paragraph) in paragraphs.into_iter().enumerate() {
            let para_started = Instant::now();

            let word_count = paragraph.split_whitespace().count();
            // Aim for 3:1 compression within sane bounds
            let target_length = (word_count / 3).clamp(MIN_TARGET_WORDS, MAX_TARGET_WORDS);

            let summary = self.summarize_paragraph(&paragraph, target_length).await;
            let summary_word_count = summary.split_whitespace().count();

            total_input_words += word_count;
            total_output_words += summary_word_count;

            processed.push(ParagraphSummary {
                paragraph_id: format!("{filename}_para_{i}"),
                original_text: paragraph,
                summary,
                word_count,
                summary_word_count,
                compression_ratio: if summary_word_count > 0 {
                    word_count as f64 / summary_word_count as f64
                } else {
                    1.0
                },
                paragraph_index: i,
                total_paragraphs,
                processing_time: para_started.elapsed().as_secs_f64(),
            });
        }

        let summaries_created = self.store_paragraph_summaries(&processed, filename).await;

        let overall_ratio = if total_output_words > 0 {
            total_input_words as f64 / total_output_words as f64
        } else {
            1.0
        };
        let compression_stats = ParagraphStats {
            total_input_words,
            total_output_words,
            overall_compression_ratio: overall_ratio,
            average_paragraph_size: total_input_words as f64 / total_paragraphs as f64,
            average_summary_size: total_output_words as f64 / total_paragraphs as f64,
        };

        let total_processing_time = started.elapsed().as_secs_f64();
        info!(
            "Paragraph processing complete: {total_paragraphs} paragraphs, {overall_ratio:.1}:1 compression"
        );

        ParagraphResult {
            status: ProcessStatus::Success,
            message: format!(
                "Processed {total_paragraphs} paragraphs with {overall_ratio:.1}:1 compression"
            ),
            filename: filename.to_string(),
            paragraphs_processed: total_paragraphs,
            summaries_created,
            total_processing_time,
            compression_stats,
            paragraphs: processed,
        }
    }

    /// Full document text as stored at ingestion time.
    async fn get_document_text(&self, filename: &str) -> Option<String> {
        match self
            .store
            .get_by_document(collections::ORIGINAL_TEXTS, filename, 1)
            .await
        {
            Ok(records) => records.into_iter().next().map(|r| r.document),
            Err(e) => {
                error!("Failed to retrieve document text: {e}");
                None
            }
        }
    }

    /// Embed and store summaries in production order; individual failures
    /// are logged and skipped.
    async fn store_paragraph_summaries(
        &self,
        paragraphs: &[ParagraphSummary],
        filename: &str,
    ) -> usize {
        let mut stored = 0usize;

        for paragraph in paragraphs {
            let embedding = match self.llm.embed(&paragraph.summary).await {
                Ok(v) => v,
                Err(e) => {
                    error!("Failed to embed {}: {e}", paragraph.paragraph_id);
                    continue;
                }
            };

            let original_excerpt = if paragraph.original_text.len() > 500 {
                let cut: String = paragraph.original_text.chars().take(500).collect();
                format!("{cut}...")
            } else {
                paragraph.original_text.clone()
            };

            let mut metadata = Metadata::new();
            metadata.insert("filename".to_string(), json!(filename));
            metadata.insert(
                "paragraph_index".to_string(),
                json!(paragraph.paragraph_index),
            );
            metadata.insert(
                "total_paragraphs".to_string(),
                json!(paragraph.total_paragraphs),
            );
            metadata.insert("content_type".to_string(), json!("paragraph_summary"));
            metadata.insert("original_words".to_string(), json!(paragraph.word_count));
            metadata.insert(
                "summary_words".to_string(),
                json!(paragraph.summary_word_count),
            );
            metadata.insert(
                "compression_ratio".to_string(),
                json!(paragraph.compression_ratio),
            );
            metadata.insert("original_text".to_string(), json!(original_excerpt));

            let record = VectorRecord {
                id: paragraph.paragraph_id.clone(),
                embedding,
                document: paragraph.summary.clone(),
                metadata,
            };

            match self
                .store
                .add(collections::PARAGRAPH_SUMMARIES, vec![record])
                .await
            {
                Ok(()) => stored += 1,
                Err(e) => error!("Failed to store {}: {e}", paragraph.paragraph_id),
            }
        }

        stored
    }
}
